//! Persistence of the test manifest.
//!
//! A test lives in a folder: `manifest.json` holds the [`Test`] and `scorm/`
//! is reserved for exported packages. [`Autosave`] flushes a dirty document
//! on a fixed interval.

use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info};

use crate::manager::DocumentManager;
use crate::model::Test;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const EXPORT_DIR: &str = "scorm";

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no valid test found in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no manifest at {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait Storage {
    fn load(&self) -> Result<Test, StorageError>;
    fn store(&mut self, test: &Test) -> Result<(), StorageError>;
}

/// Serializes `test` the way it is written to disk: pretty JSON with
/// four-space indentation.
pub fn to_manifest_json(test: &Test) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    test.serialize(&mut serializer)?;
    out.push(b'\n');
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[derive(Clone, Debug)]
pub struct FolderStorage {
    root: PathBuf,
}

impl FolderStorage {
    /// Storage for an existing folder. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the folder layout (including `scorm/`) if it is missing.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage = Self::new(root);
        let export_dir = storage.export_dir();
        fs::create_dir_all(&export_dir).map_err(|source| StorageError::Io {
            path: export_dir.clone(),
            source,
        })?;
        info!(root = %storage.root.display(), "test folder prepared");
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join(EXPORT_DIR)
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest_path().is_file()
    }
}

impl Storage for FolderStorage {
    fn load(&self) -> Result<Test, StorageError> {
        let path = self.manifest_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound { path });
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        let test: Test = serde_json::from_str(&contents)
            .map_err(|source| StorageError::Malformed { path: path.clone(), source })?;
        info!(path = %path.display(), questions = test.questions.len(), "manifest loaded");
        Ok(test)
    }

    fn store(&mut self, test: &Test) -> Result<(), StorageError> {
        let path = self.manifest_path();
        let contents = to_manifest_json(test)?;
        // Staged next to the manifest, then renamed over it.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, contents).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "manifest written");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    manifest: Option<String>,
    writes: usize,
    failing: bool,
}

/// In-memory storage. Clones share the same state, so a caller can keep a
/// handle after giving one to the manager.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(test: &Test) -> Result<Self, StorageError> {
        let storage = Self::new();
        storage.state.borrow_mut().manifest = Some(to_manifest_json(test)?);
        Ok(storage)
    }

    /// Makes every following `store` fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.state.borrow_mut().failing = failing;
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn manifest(&self) -> Option<String> {
        self.state.borrow().manifest.clone()
    }

    fn path() -> PathBuf {
        PathBuf::from("<memory>").join(MANIFEST_FILE)
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Test, StorageError> {
        let state = self.state.borrow();
        let Some(manifest) = state.manifest.as_deref() else {
            return Err(StorageError::NotFound { path: Self::path() });
        };
        serde_json::from_str(manifest).map_err(|source| StorageError::Malformed {
            path: Self::path(),
            source,
        })
    }

    fn store(&mut self, test: &Test) -> Result<(), StorageError> {
        let contents = to_manifest_json(test)?;
        let mut state = self.state.borrow_mut();
        if state.failing {
            return Err(StorageError::Io {
                path: Self::path(),
                source: std::io::Error::other("storage is failing"),
            });
        }
        state.manifest = Some(contents);
        state.writes += 1;
        Ok(())
    }
}

/// Interval timer that saves the document whenever it is dirty.
#[derive(Debug)]
pub struct Autosave {
    interval: Duration,
    last: Instant,
    stopped: bool,
}

impl Autosave {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
            stopped: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.stopped && now.duration_since(self.last) >= self.interval
    }

    /// Runs one tick. Returns the save result when a save was attempted.
    /// A failed save leaves the document dirty, so the next tick retries.
    pub fn tick(
        &mut self,
        now: Instant,
        manager: &mut DocumentManager,
    ) -> Option<Result<(), StorageError>> {
        if !self.is_due(now) {
            return None;
        }
        self.last = now;
        if manager.is_closed() {
            debug!("test closed, autosave stopped");
            self.stopped = true;
            return None;
        }
        if !manager.has_changed() {
            return None;
        }
        Some(manager.save_now())
    }
}

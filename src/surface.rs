//! The two shared editing widgets.
//!
//! A surface is attached to one block at a time. Instead of storing save and
//! cancel callbacks, `save()` and `cancel()` hand back a [`Completion`] naming
//! the block that was being edited; the manager routes it to that block's
//! close operation. A completion is produced at most once per attachment.

mod image;
mod text;

pub use image::{ImageDraft, ImageSurface, MAX_IMAGE_SIZE, MIN_IMAGE_SIZE};
pub use text::{TextCursor, TextSurface};

use crate::block::BlockId;

#[derive(Clone, Debug, PartialEq)]
pub enum Completion<T> {
    Save { target: BlockId, value: T },
    Cancel { target: BlockId },
}

impl<T> Completion<T> {
    pub fn target(&self) -> BlockId {
        match self {
            Completion::Save { target, .. } | Completion::Cancel { target } => *target,
        }
    }
}

pub trait EditSurface {
    /// What the surface is seeded with when it is attached.
    type Seed: ?Sized;
    /// What a save hands back.
    type Value;

    /// Detaches from any previous target and seeds the surface for `target`.
    /// The surface is fully initialized when this returns.
    fn attach_to(&mut self, target: BlockId, initial: &Self::Seed);

    fn detach(&mut self);

    fn target(&self) -> Option<BlockId>;

    fn is_attached_to(&self, block: BlockId) -> bool {
        self.target() == Some(block)
    }

    /// The value a save would hand back right now.
    fn current_value(&self) -> Self::Value;

    fn save(&mut self) -> Option<Completion<Self::Value>> {
        let target = self.target()?;
        let value = self.current_value();
        self.detach();
        Some(Completion::Save { target, value })
    }

    fn cancel(&mut self) -> Option<Completion<Self::Value>> {
        let target = self.target()?;
        self.detach();
        Some(Completion::Cancel { target })
    }
}

/// The singleton pair owned by the document manager.
#[derive(Debug, Default)]
pub struct Surfaces {
    pub text: TextSurface,
    pub image: ImageSurface,
}

impl Surfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detach_all(&mut self) {
        self.text.detach();
        self.image.detach();
    }
}

use tracing::debug;

use super::EditSurface;
use crate::block::BlockId;
use crate::model::{DEFAULT_IMAGE_SIZE, Image};

pub const MIN_IMAGE_SIZE: u32 = 100;
pub const MAX_IMAGE_SIZE: u32 = 800;

/// The image being edited. `source` is `None` while no image is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDraft {
    pub source: Option<String>,
    pub width: u32,
    pub height: u32,
    pub collapsed: bool,
}

impl Default for ImageDraft {
    fn default() -> Self {
        Self {
            source: None,
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            collapsed: false,
        }
    }
}

impl ImageDraft {
    pub fn from_image(image: Option<&Image>) -> Self {
        match image {
            Some(image) => Self {
                source: Some(image.source.clone()),
                width: image.width,
                height: image.height,
                collapsed: image.collapsed,
            },
            None => Self::default(),
        }
    }

    pub fn to_image(&self) -> Option<Image> {
        self.source.as_ref().map(|source| Image {
            source: source.clone(),
            width: self.width,
            height: self.height,
            collapsed: self.collapsed,
        })
    }
}

/// Image surface with width/height sliders and an optional aspect lock.
#[derive(Debug)]
pub struct ImageSurface {
    target: Option<BlockId>,
    draft: ImageDraft,
    aspect_ratio: f64,
    lock_ratio: bool,
}

impl Default for ImageSurface {
    fn default() -> Self {
        Self {
            target: None,
            draft: ImageDraft::default(),
            aspect_ratio: 1.0,
            lock_ratio: true,
        }
    }
}

impl EditSurface for ImageSurface {
    type Seed = Option<Image>;
    type Value = Option<Image>;

    fn attach_to(&mut self, target: BlockId, initial: &Option<Image>) {
        self.detach();
        self.draft = ImageDraft::from_image(initial.as_ref());
        self.aspect_ratio = if self.draft.width > 0 && self.draft.height > 0 {
            f64::from(self.draft.width) / f64::from(self.draft.height)
        } else {
            1.0
        };
        self.target = Some(target);
    }

    fn detach(&mut self) {
        self.target = None;
    }

    fn target(&self) -> Option<BlockId> {
        self.target
    }

    fn current_value(&self) -> Option<Image> {
        self.draft.to_image()
    }
}

impl ImageSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live editing state.
    pub fn image_data(&self) -> &ImageDraft {
        &self.draft
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    pub fn is_ratio_locked(&self) -> bool {
        self.lock_ratio
    }

    pub fn set_ratio_locked(&mut self, locked: bool) {
        self.lock_ratio = locked;
    }

    pub fn toggle_ratio_lock(&mut self) {
        self.lock_ratio = !self.lock_ratio;
    }

    /// Picks a new image. Size resets to the default square.
    pub fn set_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        debug!(%source, "image source chosen");
        self.draft.source = Some(source);
        self.draft.width = DEFAULT_IMAGE_SIZE;
        self.draft.height = DEFAULT_IMAGE_SIZE;
        self.aspect_ratio = 1.0;
    }

    pub fn remove_source(&mut self) {
        self.draft.source = None;
    }

    pub fn set_width(&mut self, width: u32) {
        let width = clamp_size(width);
        self.draft.width = width;
        if self.lock_ratio {
            let height = (f64::from(width) / self.aspect_ratio).round() as u32;
            self.draft.height = clamp_size(height);
        } else {
            self.aspect_ratio = f64::from(width) / f64::from(self.draft.height.max(1));
        }
    }

    pub fn set_height(&mut self, height: u32) {
        let height = clamp_size(height);
        self.draft.height = height;
        if self.lock_ratio {
            let width = (f64::from(height) * self.aspect_ratio).round() as u32;
            self.draft.width = clamp_size(width);
        } else {
            self.aspect_ratio = f64::from(self.draft.width) / f64::from(height.max(1));
        }
    }

    pub fn adjust_width(&mut self, delta: i32) {
        self.set_width(self.draft.width.saturating_add_signed(delta));
    }

    pub fn adjust_height(&mut self, delta: i32) {
        self.set_height(self.draft.height.saturating_add_signed(delta));
    }
}

fn clamp_size(value: u32) -> u32 {
    value.clamp(MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Completion;

    fn image(width: u32, height: u32) -> Image {
        Image {
            source: "cat.png".into(),
            width,
            height,
            collapsed: false,
        }
    }

    #[test]
    fn attach_takes_ratio_from_image() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &Some(image(400, 200)));
        assert_eq!(surface.aspect_ratio(), 2.0);
        assert_eq!(surface.image_data().source.as_deref(), Some("cat.png"));
    }

    #[test]
    fn locked_width_change_recomputes_height() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &Some(image(400, 200)));
        surface.set_width(300);
        assert_eq!(surface.image_data().width, 300);
        assert_eq!(surface.image_data().height, 150);

        surface.set_height(250);
        assert_eq!(surface.image_data().width, 500);
    }

    #[test]
    fn unlocked_change_updates_stored_ratio() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &Some(image(400, 200)));
        surface.set_ratio_locked(false);
        surface.set_width(600);
        assert_eq!(surface.image_data().height, 200);
        assert_eq!(surface.aspect_ratio(), 3.0);

        surface.set_ratio_locked(true);
        surface.set_height(100);
        assert_eq!(surface.image_data().width, 300);
    }

    #[test]
    fn sizes_stay_within_slider_range() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &Some(image(300, 300)));
        surface.adjust_width(-1000);
        assert_eq!(surface.image_data().width, MIN_IMAGE_SIZE);
        surface.adjust_height(5000);
        assert_eq!(surface.image_data().height, MAX_IMAGE_SIZE);
    }

    #[test]
    fn choosing_a_source_resets_to_default_square() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &Some(image(640, 320)));
        surface.set_source("dog.png");
        let draft = surface.image_data();
        assert_eq!((draft.width, draft.height), (DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE));
        assert_eq!(surface.aspect_ratio(), 1.0);
    }

    #[test]
    fn saving_without_source_hands_back_none() {
        let mut surface = ImageSurface::new();
        let block = BlockId::new();
        surface.attach_to(block, &Some(image(300, 300)));
        surface.remove_source();
        assert_eq!(
            surface.save(),
            Some(Completion::Save {
                target: block,
                value: None
            })
        );
        assert!(surface.target().is_none());
    }

    #[test]
    fn attaching_without_image_starts_empty() {
        let mut surface = ImageSurface::new();
        surface.attach_to(BlockId::new(), &None);
        assert_eq!(surface.image_data(), &ImageDraft::default());
        assert_eq!(surface.current_value(), None);
    }
}

//! Editable projections of questions and answers.
//!
//! A block never owns its document node. The manager keeps blocks and nodes
//! in parallel collections and passes the node in whenever a block needs to
//! read or change it, together with an [`EditContext`] that lends out the
//! shared surfaces, the coordinator and the dirty flag.

mod answer;
mod question;

pub use answer::AnswerBlock;
pub use question::QuestionBlock;

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::coordinator::{Coordinator, Decision, EditMode};
use crate::manager::ChangeTracker;
use crate::markup;
use crate::model::{Image, Node};
use crate::surface::{Completion, EditSurface, ImageDraft, Surfaces};

/// Stable identity of a block for the lifetime of the editing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(Uuid);

impl BlockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// Editing-time snapshot used to detect unsaved changes.
#[derive(Clone, Debug, PartialEq)]
enum Baseline {
    Text(String),
    Image(Option<Image>),
}

#[derive(Clone, Debug)]
pub struct BlockState {
    editing: Option<EditMode>,
    baseline: Option<Baseline>,
    visible: bool,
    collapsed: bool,
    preview: String,
}

impl BlockState {
    pub fn new(node: &impl Node, visible: bool, collapsed: bool) -> Self {
        Self {
            editing: None,
            baseline: None,
            visible,
            collapsed,
            preview: markup::plain_text(node.text()),
        }
    }

    pub fn editing(&self) -> Option<EditMode> {
        self.editing
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    /// Plain-text rendering of the node text as of the last refresh.
    pub fn preview(&self) -> &str {
        &self.preview
    }
}

/// Borrowed pieces of the manager a block needs while editing.
pub struct EditContext<'a> {
    pub surfaces: &'a mut Surfaces,
    pub coordinator: &'a mut Coordinator,
    pub changes: &'a mut ChangeTracker,
}

/// How an edit is being closed.
#[derive(Clone, Debug, PartialEq)]
pub enum Closing<T> {
    Commit(T),
    Discard,
}

impl<T> From<Completion<T>> for Closing<T> {
    fn from(completion: Completion<T>) -> Self {
        match completion {
            Completion::Save { value, .. } => Closing::Commit(value),
            Completion::Cancel { .. } => Closing::Discard,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAttempt {
    /// Nothing unsaved; the edit is closed.
    Closed,
    /// The author has to choose save, discard or cancel.
    NeedsConfirmation,
}

pub trait Block {
    type Node: Node;

    fn id(&self) -> BlockId;
    fn state(&self) -> &BlockState;
    fn state_mut(&mut self) -> &mut BlockState;
    fn supports(&self, mode: EditMode) -> bool;

    fn is_editing_text(&self) -> bool {
        self.state().editing == Some(EditMode::Text)
    }

    fn is_editing_image(&self) -> bool {
        self.state().editing == Some(EditMode::Image)
    }

    fn is_editing(&self) -> bool {
        self.state().editing.is_some()
    }

    /// Re-derives the visual state from the node.
    fn refresh(&mut self, node: &Self::Node) {
        self.state_mut().preview = markup::plain_text(node.text());
    }

    fn start_edit(&mut self, node: &Self::Node, mode: EditMode, surfaces: &mut Surfaces) {
        match mode {
            EditMode::Text => self.start_text_edit(node, surfaces),
            EditMode::Image => self.start_image_edit(node, surfaces),
        }
    }

    fn start_text_edit(&mut self, node: &Self::Node, surfaces: &mut Surfaces) {
        if self.is_editing_text() {
            return;
        }
        surfaces.text.attach_to(self.id(), node.text());
        // The surface has normalized the seed by now; compare against that.
        let baseline = surfaces.text.content();
        let state = self.state_mut();
        state.editing = Some(EditMode::Text);
        state.baseline = Some(Baseline::Text(baseline));
    }

    fn start_image_edit(&mut self, node: &Self::Node, surfaces: &mut Surfaces) {
        if !self.supports(EditMode::Image) || self.is_editing_image() {
            return;
        }
        let original = node.image().cloned();
        surfaces.image.attach_to(self.id(), &original);
        let state = self.state_mut();
        state.editing = Some(EditMode::Image);
        state.baseline = Some(Baseline::Image(original));
    }

    fn has_unsaved_changes(&self, surfaces: &Surfaces) -> bool {
        let state = self.state();
        match (state.editing, &state.baseline) {
            (Some(EditMode::Text), Some(Baseline::Text(original))) => {
                surfaces.text.is_attached_to(self.id()) && surfaces.text.content() != *original
            }
            (Some(EditMode::Image), Some(Baseline::Image(original))) => {
                surfaces.image.is_attached_to(self.id())
                    && image_changed(original.as_ref(), surfaces.image.image_data())
            }
            // A missing baseline never reports unsaved work.
            _ => false,
        }
    }

    /// Closes the current edit right away if nothing would be lost.
    fn attempt_close(&mut self, node: &mut Self::Node, cx: &mut EditContext<'_>) -> CloseAttempt {
        if self.has_unsaved_changes(cx.surfaces) {
            debug!(block = %self.id(), "unsaved changes, asking before closing");
            return CloseAttempt::NeedsConfirmation;
        }
        self.close_current(node, false, cx);
        CloseAttempt::Closed
    }

    /// Applies the author's answer to the unsaved-changes prompt. Returns
    /// whether the edit is now closed.
    fn resolve_close(
        &mut self,
        node: &mut Self::Node,
        decision: Decision,
        cx: &mut EditContext<'_>,
    ) -> bool {
        match decision {
            Decision::Save => {
                self.close_current(node, true, cx);
                true
            }
            Decision::Discard => {
                self.close_current(node, false, cx);
                true
            }
            Decision::Cancel => false,
        }
    }

    /// Closes whatever edit is open, committing the live surface state when
    /// `save` is set.
    fn close_current(&mut self, node: &mut Self::Node, save: bool, cx: &mut EditContext<'_>) {
        match self.state().editing {
            Some(EditMode::Text) => {
                let closing = if save {
                    Closing::Commit(cx.surfaces.text.content())
                } else {
                    Closing::Discard
                };
                self.close_text_edit(node, closing, cx);
            }
            Some(EditMode::Image) => {
                let closing = if save {
                    Closing::Commit(cx.surfaces.image.current_value())
                } else {
                    Closing::Discard
                };
                self.close_image_edit(node, closing, cx);
            }
            None => {}
        }
    }

    fn close_text_edit(
        &mut self,
        node: &mut Self::Node,
        closing: Closing<String>,
        cx: &mut EditContext<'_>,
    ) {
        if let Closing::Commit(text) = closing {
            node.set_text(text);
            cx.changes.mark();
        }
        if cx.surfaces.text.is_attached_to(self.id()) {
            cx.surfaces.text.detach();
        }
        self.finish_edit(node, cx.coordinator);
    }

    fn close_image_edit(
        &mut self,
        node: &mut Self::Node,
        closing: Closing<Option<Image>>,
        cx: &mut EditContext<'_>,
    ) {
        if let Closing::Commit(image) = closing {
            node.set_image(image);
            cx.changes.mark();
        }
        if cx.surfaces.image.is_attached_to(self.id()) {
            cx.surfaces.image.detach();
        }
        self.finish_edit(node, cx.coordinator);
    }

    fn finish_edit(&mut self, node: &Self::Node, coordinator: &mut Coordinator) {
        let state = self.state_mut();
        state.editing = None;
        state.baseline = None;
        if coordinator.slot().is_held_by(self.id()) {
            coordinator.clear_active();
        }
        self.refresh(node);
    }

    /// Drops any edit without saving or asking. Used when the block is
    /// about to be destroyed.
    fn abandon_edit(&mut self, surfaces: &mut Surfaces, coordinator: &mut Coordinator) {
        if surfaces.text.is_attached_to(self.id()) {
            surfaces.text.detach();
        }
        if surfaces.image.is_attached_to(self.id()) {
            surfaces.image.detach();
        }
        let state = self.state_mut();
        state.editing = None;
        state.baseline = None;
        if coordinator.slot().is_held_by(self.id()) {
            coordinator.clear_active();
        }
    }
}

fn image_changed(original: Option<&Image>, current: &ImageDraft) -> bool {
    match (original, current.source.as_deref()) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(original), Some(source)) => {
            original.source != source
                || original.width != current.width
                || original.height != current.height
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ActiveEdit;
    use crate::input::InputBus;
    use crate::model::{Answer, Question};

    struct Fixture {
        surfaces: Surfaces,
        coordinator: Coordinator,
        changes: ChangeTracker,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                surfaces: Surfaces::new(),
                coordinator: Coordinator::new(),
                changes: ChangeTracker::default(),
            }
        }

        fn cx(&mut self) -> EditContext<'_> {
            EditContext {
                surfaces: &mut self.surfaces,
                coordinator: &mut self.coordinator,
                changes: &mut self.changes,
            }
        }
    }

    fn question_with_image() -> Question {
        Question {
            image: Some(Image::new("map.png")),
            ..Question::default()
        }
    }

    #[test]
    fn fresh_text_edit_has_no_unsaved_changes() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut question = Question::default();
        let mut block = QuestionBlock::new(&question, &bus);

        block.start_text_edit(&question, &mut fixture.surfaces);
        assert!(block.is_editing_text());
        assert!(!block.has_unsaved_changes(&fixture.surfaces));

        let mut cx = fixture.cx();
        assert_eq!(block.attempt_close(&mut question, &mut cx), CloseAttempt::Closed);
        assert!(!block.is_editing());
        assert!(fixture.surfaces.text.target().is_none());
        assert!(!fixture.changes.has_changed());
    }

    #[test]
    fn typing_makes_the_edit_dirty() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut answer = Answer::default();
        let mut block = AnswerBlock::new(&answer, &bus);

        block.start_text_edit(&answer, &mut fixture.surfaces);
        fixture.surfaces.text.insert_char('!');
        assert!(block.has_unsaved_changes(&fixture.surfaces));

        let mut cx = fixture.cx();
        assert_eq!(
            block.attempt_close(&mut answer, &mut cx),
            CloseAttempt::NeedsConfirmation
        );
        assert!(block.is_editing_text());
    }

    #[test]
    fn save_decision_commits_and_marks_dirty() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut answer = Answer::default();
        let mut block = AnswerBlock::new(&answer, &bus);
        fixture.coordinator.set_active(ActiveEdit {
            block: block.id(),
            mode: EditMode::Text,
        });

        block.start_text_edit(&answer, &mut fixture.surfaces);
        fixture.surfaces.text.insert_str(" now");
        let mut cx = fixture.cx();
        assert!(block.resolve_close(&mut answer, Decision::Save, &mut cx));

        assert!(markup::plain_text(&answer.text).ends_with(" now"));
        assert!(block.state().preview().ends_with(" now"));
        assert!(fixture.changes.has_changed());
        assert_eq!(fixture.coordinator.active(), None);
    }

    #[test]
    fn discard_decision_leaves_node_untouched() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut answer = Answer::default();
        let original = answer.clone();
        let mut block = AnswerBlock::new(&answer, &bus);

        block.start_text_edit(&answer, &mut fixture.surfaces);
        fixture.surfaces.text.insert_str("zzz");
        let mut cx = fixture.cx();
        assert!(block.resolve_close(&mut answer, Decision::Discard, &mut cx));
        assert_eq!(answer, original);
        assert!(!fixture.changes.has_changed());
    }

    #[test]
    fn cancel_decision_keeps_editing() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut answer = Answer::default();
        let mut block = AnswerBlock::new(&answer, &bus);

        block.start_text_edit(&answer, &mut fixture.surfaces);
        fixture.surfaces.text.insert_str("zzz");
        let mut cx = fixture.cx();
        assert!(!block.resolve_close(&mut answer, Decision::Cancel, &mut cx));
        assert!(block.is_editing_text());
        assert!(fixture.surfaces.text.is_attached_to(block.id()));
    }

    #[test]
    fn answers_never_edit_images() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let answer = Answer::default();
        let mut block = AnswerBlock::new(&answer, &bus);
        block.start_image_edit(&answer, &mut fixture.surfaces);
        assert!(!block.is_editing_image());
        assert!(fixture.surfaces.image.target().is_none());
    }

    #[test]
    fn image_resize_is_an_unsaved_change() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let question = question_with_image();
        let mut block = QuestionBlock::new(&question, &bus);

        block.start_image_edit(&question, &mut fixture.surfaces);
        assert!(!block.has_unsaved_changes(&fixture.surfaces));
        fixture.surfaces.image.adjust_width(50);
        assert!(block.has_unsaved_changes(&fixture.surfaces));
    }

    #[test]
    fn adding_or_removing_an_image_is_an_unsaved_change() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();

        let bare = Question::default();
        let mut block = QuestionBlock::new(&bare, &bus);
        block.start_image_edit(&bare, &mut fixture.surfaces);
        fixture.surfaces.image.set_source("new.png");
        assert!(block.has_unsaved_changes(&fixture.surfaces));

        let illustrated = question_with_image();
        let mut other = QuestionBlock::new(&illustrated, &bus);
        other.start_image_edit(&illustrated, &mut fixture.surfaces);
        fixture.surfaces.image.remove_source();
        assert!(other.has_unsaved_changes(&fixture.surfaces));
    }

    #[test]
    fn saving_an_empty_image_removes_it() {
        let bus = InputBus::new();
        let mut fixture = Fixture::new();
        let mut question = question_with_image();
        let mut block = QuestionBlock::new(&question, &bus);

        block.start_image_edit(&question, &mut fixture.surfaces);
        fixture.surfaces.image.remove_source();
        let mut cx = fixture.cx();
        block.close_current(&mut question, true, &mut cx);
        assert_eq!(question.image, None);
        assert!(fixture.changes.has_changed());
        assert!(fixture.surfaces.image.target().is_none());
    }

    #[test]
    fn missing_baseline_is_not_unsaved() {
        let bus = InputBus::new();
        let surfaces = Surfaces::new();
        let question = Question::default();
        let mut block = QuestionBlock::new(&question, &bus);
        block.state_mut().editing = Some(EditMode::Text);
        assert!(!block.has_unsaved_changes(&surfaces));
    }

    #[test]
    fn display_id_is_short() {
        assert_eq!(BlockId::new().to_string().len(), 8);
    }
}

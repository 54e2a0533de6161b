//! The document manager owns the test, its blocks, both edit surfaces and the
//! coordinator. Every structural change goes through here so that the block
//! list and the question list never drift apart.

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::block::{
    AnswerBlock, Block, BlockId, CloseAttempt, Closing, EditContext, QuestionBlock,
};
use crate::coordinator::{
    ActiveEdit, Coordinator, Decision, EditMode, PendingClose, Plan, Resume,
};
use crate::input::{BlockAction, InputBus};
use crate::model::{
    AdaptiveVariant, Answer, Image, MIN_TIMED_MINUTES, Parameters, Question, ScoreProvider, Test,
};
use crate::storage::{Storage, StorageError};
use crate::surface::{EditSurface, Surfaces};

/// The dirty flag.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    changed: bool,
}

impl ChangeTracker {
    pub fn mark(&mut self) {
        self.changed = true;
    }

    pub fn clear(&mut self) {
        self.changed = false;
    }

    pub fn has_changed(&self) -> bool {
        self.changed
    }
}

/// Where a block sits in the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Question(usize),
    Answer { question: usize, answer: usize },
}

impl Location {
    pub fn question(self) -> usize {
        match self {
            Location::Question(index) | Location::Answer { question: index, .. } => index,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// Unknown block, unsupported mode, closed test or open prompt.
    Ignored,
    /// The block already edits in that mode.
    Unchanged,
    Started,
    /// The current holder has unsaved changes; waiting for a decision.
    Prompting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    NoPrompt,
    /// The original edit stays open.
    Cancelled,
    Activated(ActiveEdit),
    TestClosed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Prompting,
}

/// Keystrokes forwarded to the text surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInput {
    Char(char),
    Backspace,
    Delete,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

/// Adjustments forwarded to the image surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageInput {
    Width(i32),
    Height(i32),
    ToggleRatioLock,
    SetSource(String),
    RemoveSource,
}

enum Target<'a> {
    Question(&'a mut QuestionBlock, &'a mut Question),
    Answer(&'a mut AnswerBlock, &'a mut Answer),
}

impl Target<'_> {
    fn start_edit(self, mode: EditMode, surfaces: &mut Surfaces) {
        match self {
            Target::Question(block, node) => block.start_edit(node, mode, surfaces),
            Target::Answer(block, node) => block.start_edit(node, mode, surfaces),
        }
    }

    fn attempt_close(self, cx: &mut EditContext<'_>) -> CloseAttempt {
        match self {
            Target::Question(block, node) => block.attempt_close(node, cx),
            Target::Answer(block, node) => block.attempt_close(node, cx),
        }
    }

    fn resolve_close(self, decision: Decision, cx: &mut EditContext<'_>) -> bool {
        match self {
            Target::Question(block, node) => block.resolve_close(node, decision, cx),
            Target::Answer(block, node) => block.resolve_close(node, decision, cx),
        }
    }

    fn close_text_edit(self, closing: Closing<String>, cx: &mut EditContext<'_>) {
        match self {
            Target::Question(block, node) => block.close_text_edit(node, closing, cx),
            Target::Answer(block, node) => block.close_text_edit(node, closing, cx),
        }
    }

    fn close_image_edit(self, closing: Closing<Option<Image>>, cx: &mut EditContext<'_>) {
        match self {
            Target::Question(block, node) => block.close_image_edit(node, closing, cx),
            Target::Answer(block, node) => block.close_image_edit(node, closing, cx),
        }
    }
}

pub struct DocumentManager {
    test: Test,
    blocks: Vec<QuestionBlock>,
    surfaces: Surfaces,
    coordinator: Coordinator,
    bus: InputBus,
    changes: ChangeTracker,
    storage: Box<dyn Storage>,
    closed: bool,
}

impl DocumentManager {
    /// A fresh test with default parameters and no questions.
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self::with_test(Test::new(), storage)
    }

    /// Loads the test from `storage`. Nothing is built on failure.
    pub fn open(storage: Box<dyn Storage>) -> Result<Self, StorageError> {
        let test = storage.load()?;
        Ok(Self::with_test(test, storage))
    }

    pub fn with_test(test: Test, storage: Box<dyn Storage>) -> Self {
        let bus = InputBus::new();
        let blocks = test
            .questions
            .iter()
            .map(|question| QuestionBlock::new(question, &bus))
            .collect();
        Self {
            test,
            blocks,
            surfaces: Surfaces::new(),
            coordinator: Coordinator::new(),
            bus,
            changes: ChangeTracker::default(),
            storage,
            closed: false,
        }
    }

    pub fn test(&self) -> &Test {
        &self.test
    }

    pub fn parameters(&self) -> &Parameters {
        &self.test.parameters
    }

    pub fn blocks(&self) -> &[QuestionBlock] {
        &self.blocks
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn active(&self) -> Option<ActiveEdit> {
        self.coordinator.active()
    }

    pub fn pending(&self) -> Option<&PendingClose> {
        self.coordinator.pending()
    }

    pub fn input_bus(&self) -> &InputBus {
        &self.bus
    }

    pub fn has_changed(&self) -> bool {
        self.changes.has_changed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn question_index(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| block.id() == id)
    }

    pub fn locate(&self, id: BlockId) -> Option<Location> {
        self.blocks.iter().enumerate().find_map(|(question, block)| {
            if block.id() == id {
                return Some(Location::Question(question));
            }
            block
                .answer_index(id)
                .map(|answer| Location::Answer { question, answer })
        })
    }

    /// Whether `id` exists and listens to `action`.
    pub fn accepts(&self, id: BlockId, action: BlockAction) -> bool {
        self.bus.accepts(id, action)
    }

    fn split(&mut self, location: Location) -> Option<(Target<'_>, EditContext<'_>)> {
        let Self {
            test,
            blocks,
            surfaces,
            coordinator,
            changes,
            ..
        } = self;
        let target = match location {
            Location::Question(index) => {
                Target::Question(blocks.get_mut(index)?, test.questions.get_mut(index)?)
            }
            Location::Answer { question, answer } => Target::Answer(
                blocks.get_mut(question)?.answer_mut(answer)?,
                test.questions.get_mut(question)?.answers.get_mut(answer)?,
            ),
        };
        Some((
            target,
            EditContext {
                surfaces,
                coordinator,
                changes,
            },
        ))
    }

    /// Runs `f` on block `id` and its node. `None` when the block is gone.
    fn with_target<R>(
        &mut self,
        id: BlockId,
        f: impl FnOnce(Target<'_>, &mut EditContext<'_>) -> R,
    ) -> Option<R> {
        let location = self.locate(id)?;
        let (target, mut cx) = self.split(location)?;
        Some(f(target, &mut cx))
    }

    /// Structural changes are refused while a prompt is open or after close.
    fn is_locked(&self, operation: &str) -> bool {
        if self.closed || self.coordinator.is_prompting() {
            debug!(operation, "ignored while locked");
            return true;
        }
        false
    }

    // Editing protocol

    pub fn request_activation(&mut self, block: BlockId, mode: EditMode) -> Activation {
        if self.closed {
            return Activation::Ignored;
        }
        let Some(location) = self.locate(block) else {
            debug!(%block, "activation of unknown block");
            return Activation::Ignored;
        };
        if mode == EditMode::Image && matches!(location, Location::Answer { .. }) {
            debug!(%block, "answers have no image");
            return Activation::Ignored;
        }

        let request = ActiveEdit { block, mode };
        match self.coordinator.plan(request) {
            Plan::Drop => Activation::Ignored,
            Plan::Nothing => Activation::Unchanged,
            Plan::Activate => {
                self.activate(request);
                Activation::Started
            }
            Plan::CloseFirst { close } => match self.attempt_close(close) {
                CloseAttempt::Closed => {
                    self.activate(request);
                    Activation::Started
                }
                CloseAttempt::NeedsConfirmation => {
                    self.coordinator.park(PendingClose {
                        block: close,
                        resume: Resume::Activate(request),
                    });
                    Activation::Prompting
                }
            },
        }
    }

    fn activate(&mut self, edit: ActiveEdit) -> bool {
        self.with_target(edit.block, |target, cx| {
            target.start_edit(edit.mode, cx.surfaces);
            cx.coordinator.set_active(edit);
        })
        .is_some()
    }

    fn attempt_close(&mut self, block: BlockId) -> CloseAttempt {
        match self.with_target(block, |target, cx| target.attempt_close(cx)) {
            Some(attempt) => attempt,
            None => {
                debug!(%block, "holder no longer exists, releasing slot");
                self.surfaces.detach_all();
                self.coordinator.clear_active();
                CloseAttempt::Closed
            }
        }
    }

    /// Applies the author's answer to the open save/discard/cancel prompt.
    pub fn resolve_prompt(&mut self, decision: Decision) -> Result<PromptOutcome, StorageError> {
        let Some(pending) = self.coordinator.take_pending() else {
            return Ok(PromptOutcome::NoPrompt);
        };
        debug!(block = %pending.block, ?decision, "prompt answered");

        let closed = match self.with_target(pending.block, |target, cx| {
            target.resolve_close(decision, cx)
        }) {
            Some(closed) => closed,
            None => {
                self.coordinator.clear_active();
                true
            }
        };
        if !closed {
            return Ok(PromptOutcome::Cancelled);
        }

        match pending.resume {
            Resume::Activate(edit) => {
                if self.activate(edit) {
                    Ok(PromptOutcome::Activated(edit))
                } else {
                    Ok(PromptOutcome::Cancelled)
                }
            }
            Resume::CloseTest => {
                self.finish_close()?;
                Ok(PromptOutcome::TestClosed)
            }
        }
    }

    /// Saves the active edit through its surface.
    pub fn save_edit(&mut self) -> bool {
        self.complete_edit(true)
    }

    /// Cancels the active edit through its surface.
    pub fn cancel_edit(&mut self) -> bool {
        self.complete_edit(false)
    }

    fn complete_edit(&mut self, save: bool) -> bool {
        if self.coordinator.is_prompting() {
            return false;
        }
        let Some(active) = self.coordinator.active() else {
            return false;
        };
        match active.mode {
            EditMode::Text => {
                let completion = if save {
                    self.surfaces.text.save()
                } else {
                    self.surfaces.text.cancel()
                };
                let Some(completion) = completion else {
                    return false;
                };
                let block = completion.target();
                let closing = completion.into();
                if self
                    .with_target(block, |target, cx| target.close_text_edit(closing, cx))
                    .is_none()
                {
                    self.coordinator.clear_active();
                }
            }
            EditMode::Image => {
                let completion = if save {
                    self.surfaces.image.save()
                } else {
                    self.surfaces.image.cancel()
                };
                let Some(completion) = completion else {
                    return false;
                };
                let block = completion.target();
                let closing = completion.into();
                if self
                    .with_target(block, |target, cx| target.close_image_edit(closing, cx))
                    .is_none()
                {
                    self.coordinator.clear_active();
                }
            }
        }
        true
    }

    pub fn text_input(&mut self, input: TextInput) -> bool {
        if self.coordinator.is_prompting() {
            return false;
        }
        let text = &mut self.surfaces.text;
        match input {
            TextInput::Char(ch) => text.insert_char(ch),
            TextInput::Backspace => text.backspace(),
            TextInput::Delete => text.delete(),
            TextInput::Enter => text.insert_paragraph_break(),
            TextInput::Left => text.move_left(),
            TextInput::Right => text.move_right(),
            TextInput::Up => text.move_up(),
            TextInput::Down => text.move_down(),
            TextInput::Home => text.move_home(),
            TextInput::End => text.move_end(),
        }
    }

    pub fn image_input(&mut self, input: ImageInput) -> bool {
        if self.coordinator.is_prompting() || self.surfaces.image.target().is_none() {
            return false;
        }
        let image = &mut self.surfaces.image;
        match input {
            ImageInput::Width(delta) => image.adjust_width(delta),
            ImageInput::Height(delta) => image.adjust_height(delta),
            ImageInput::ToggleRatioLock => image.toggle_ratio_lock(),
            ImageInput::SetSource(source) => image.set_source(source),
            ImageInput::RemoveSource => image.remove_source(),
        }
        true
    }

    // Structure

    pub fn add_block(&mut self) -> Option<BlockId> {
        if self.is_locked("add_block") {
            return None;
        }
        let question = Question {
            answers: vec![Answer::default(), Answer::default()],
            ..Question::default()
        };
        let block = QuestionBlock::new(&question, &self.bus);
        let id = block.id();
        self.test.questions.push(question);
        self.blocks.push(block);
        self.changes.mark();
        debug!(block = %id, "question added");
        Some(id)
    }

    pub fn move_block_up(&mut self, id: BlockId) -> bool {
        if self.is_locked("move_block_up") {
            return false;
        }
        match self.question_index(id) {
            Some(index) if index > 0 => {
                self.swap(index - 1, index);
                true
            }
            _ => false,
        }
    }

    pub fn move_block_down(&mut self, id: BlockId) -> bool {
        if self.is_locked("move_block_down") {
            return false;
        }
        match self.question_index(id) {
            Some(index) if index + 1 < self.blocks.len() => {
                self.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.test.questions.swap(a, b);
        self.blocks.swap(a, b);
        self.changes.mark();
    }

    /// Moves `source` to the position `target` had before the move: dropping
    /// onto a later block lands after it, onto an earlier block before it.
    pub fn handle_reorder(&mut self, source: BlockId, target: BlockId) -> bool {
        if self.is_locked("handle_reorder") || source == target {
            return false;
        }
        let (Some(from), Some(to)) = (self.question_index(source), self.question_index(target))
        else {
            debug!(%source, %target, "reorder with unknown block");
            return false;
        };
        let question = self.test.questions.remove(from);
        self.test.questions.insert(to, question);
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.changes.mark();
        true
    }

    /// Removes a question and its answers. An open edit inside it is dropped
    /// without asking.
    pub fn remove_block(&mut self, id: BlockId) -> bool {
        if self.is_locked("remove_block") {
            return false;
        }
        let Some(index) = self.question_index(id) else {
            debug!(block = %id, "remove of unknown block");
            return false;
        };
        let mut block = self.blocks.remove(index);
        block.abandon_all(&mut self.surfaces, &mut self.coordinator);
        self.test.questions.remove(index);
        self.changes.mark();
        debug!(block = %id, "question removed");
        true
    }

    pub fn add_answer(&mut self, question: BlockId) -> Option<BlockId> {
        if self.is_locked("add_answer") {
            return None;
        }
        let index = self.question_index(question)?;
        let id = self.blocks[index].add_answer(
            &mut self.test.questions[index],
            &self.bus,
            &mut self.changes,
        );
        Some(id)
    }

    pub fn remove_answer(&mut self, answer: BlockId) -> bool {
        if self.is_locked("remove_answer") {
            return false;
        }
        let Some(Location::Answer { question, .. }) = self.locate(answer) else {
            debug!(block = %answer, "remove of unknown answer");
            return false;
        };
        self.blocks[question].remove_answer(
            &mut self.test.questions[question],
            answer,
            &mut self.surfaces,
            &mut self.coordinator,
            &mut self.changes,
        )
    }

    pub fn toggle_correct(&mut self, id: BlockId) -> bool {
        if self.is_locked("toggle_correct") {
            return false;
        }
        let Some(Location::Answer { question, answer }) = self.locate(id) else {
            return false;
        };
        let Some(block) = self.blocks[question].answer_mut(answer) else {
            return false;
        };
        block.toggle_correct(
            &mut self.test.questions[question].answers[answer],
            &mut self.changes,
        );
        true
    }

    pub fn toggle_visibility(&mut self, id: BlockId) -> bool {
        if self.is_locked("toggle_visibility") {
            return false;
        }
        let Some(index) = self.question_index(id) else {
            return false;
        };
        self.blocks[index].toggle_visibility(&mut self.test.questions[index], &mut self.changes);
        true
    }

    pub fn toggle_collapsed(&mut self, id: BlockId) -> bool {
        if self.is_locked("toggle_collapsed") {
            return false;
        }
        let Some(index) = self.question_index(id) else {
            return false;
        };
        self.blocks[index].toggle_collapsed(&mut self.test.questions[index], &mut self.changes);
        true
    }

    pub fn set_all_collapsed(&mut self, collapsed: bool) {
        if self.is_locked("set_all_collapsed") {
            return;
        }
        for (block, question) in self.blocks.iter_mut().zip(&mut self.test.questions) {
            block.set_collapsed(question, collapsed, &mut self.changes);
        }
    }

    pub fn toggle_image_collapsed(&mut self, id: BlockId) -> bool {
        if self.is_locked("toggle_image_collapsed") {
            return false;
        }
        let Some(index) = self.question_index(id) else {
            return false;
        };
        self.blocks[index].toggle_image_collapsed(&mut self.test.questions[index], &mut self.changes)
    }

    // Parameters

    /// Enabling timing raises the duration to at least the minimum.
    pub fn set_timing(&mut self, enabled: bool, minutes: u32) {
        if self.is_locked("set_timing") {
            return;
        }
        let parameters = &mut self.test.parameters;
        parameters.timed = enabled;
        parameters.minutes = if enabled {
            minutes.max(MIN_TIMED_MINUTES)
        } else {
            minutes
        };
        self.changes.mark();
    }

    pub fn set_shuffle_questions(&mut self, enabled: bool) {
        if self.is_locked("set_shuffle_questions") {
            return;
        }
        self.test.parameters.mix_questions = enabled;
        self.changes.mark();
    }

    pub fn set_shuffle_answers(&mut self, enabled: bool) {
        if self.is_locked("set_shuffle_answers") {
            return;
        }
        self.test.parameters.mix_answers = enabled;
        self.changes.mark();
    }

    /// Switching adaptive scoring on without a variant selects the standard
    /// one; switching it off clears the variant.
    pub fn set_adaptive(&mut self, enabled: bool, variant: AdaptiveVariant) {
        if self.is_locked("set_adaptive") {
            return;
        }
        let parameters = &mut self.test.parameters;
        parameters.adaptive = enabled;
        parameters.adaptive_variant = match (enabled, variant) {
            (false, _) => AdaptiveVariant::Unset,
            (true, AdaptiveVariant::Unset) => AdaptiveVariant::Standard,
            (true, variant) => variant,
        };
        self.changes.mark();
    }

    /// Switching score saving off drops the provider and its configuration.
    pub fn set_score_saving(
        &mut self,
        enabled: bool,
        provider: ScoreProvider,
        config: Map<String, Value>,
    ) {
        if self.is_locked("set_score_saving") {
            return;
        }
        let parameters = &mut self.test.parameters;
        parameters.save_scores = enabled;
        if enabled {
            parameters.score_provider = provider;
            parameters.provider_config = config;
        } else {
            parameters.score_provider = ScoreProvider::Unset;
            parameters.provider_config = Map::new();
        }
        self.changes.mark();
    }

    // Persistence

    /// Writes the test. A failure is logged and the document stays dirty.
    pub fn save_now(&mut self) -> Result<(), StorageError> {
        match self.storage.store(&self.test) {
            Ok(()) => {
                self.changes.clear();
                debug!("test saved");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to save test");
                Err(err)
            }
        }
    }

    /// Closes the test. An open edit goes through its close protocol first;
    /// if that needs a decision the close resumes from `resolve_prompt`.
    pub fn close_test(&mut self) -> Result<CloseOutcome, StorageError> {
        if self.closed {
            return Ok(CloseOutcome::Closed);
        }
        if self.coordinator.is_prompting() {
            return Ok(CloseOutcome::Prompting);
        }
        if let Some(active) = self.coordinator.active()
            && self.attempt_close(active.block) == CloseAttempt::NeedsConfirmation
        {
            self.coordinator.park(PendingClose {
                block: active.block,
                resume: Resume::CloseTest,
            });
            return Ok(CloseOutcome::Prompting);
        }
        self.finish_close()?;
        Ok(CloseOutcome::Closed)
    }

    fn finish_close(&mut self) -> Result<(), StorageError> {
        self.save_now()?;
        self.surfaces.detach_all();
        self.coordinator.clear_active();
        self.blocks.clear();
        self.closed = true;
        info!(questions = self.test.questions.len(), "test closed");
        Ok(())
    }
}

impl std::fmt::Debug for DocumentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentManager")
            .field("questions", &self.test.questions.len())
            .field("active", &self.coordinator.active())
            .field("changed", &self.changes.has_changed())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

use super::{Block, BlockId, BlockState};
use crate::coordinator::EditMode;
use crate::input::{ANSWER_ACTIONS, InputBus, Subscriptions};
use crate::manager::ChangeTracker;
use crate::markup;
use crate::model::Answer;

/// One answer option inside a question. Text only.
#[derive(Debug)]
pub struct AnswerBlock {
    id: BlockId,
    state: BlockState,
    correct: bool,
    _subscriptions: Subscriptions,
}

impl AnswerBlock {
    pub fn new(answer: &Answer, bus: &InputBus) -> Self {
        let id = BlockId::new();
        Self {
            id,
            state: BlockState::new(answer, true, false),
            correct: answer.is_correct,
            _subscriptions: bus.subscribe(id, ANSWER_ACTIONS),
        }
    }

    pub fn is_correct(&self) -> bool {
        self.correct
    }

    /// Flips the correctness flag. This never involves an edit surface.
    pub fn toggle_correct(&mut self, answer: &mut Answer, changes: &mut ChangeTracker) {
        answer.is_correct = !answer.is_correct;
        self.correct = answer.is_correct;
        changes.mark();
    }
}

impl Block for AnswerBlock {
    type Node = Answer;

    fn id(&self) -> BlockId {
        self.id
    }

    fn state(&self) -> &BlockState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut BlockState {
        &mut self.state
    }

    fn supports(&self, mode: EditMode) -> bool {
        mode == EditMode::Text
    }

    fn is_editing_image(&self) -> bool {
        false
    }

    fn refresh(&mut self, answer: &Answer) {
        self.state.preview = markup::plain_text(&answer.text);
        self.correct = answer.is_correct;
    }
}

use super::{AnswerBlock, Block, BlockId, BlockState};
use crate::coordinator::{Coordinator, EditMode};
use crate::input::{InputBus, QUESTION_ACTIONS, Subscriptions};
use crate::manager::ChangeTracker;
use crate::markup;
use crate::model::{Answer, Question};
use crate::surface::Surfaces;

/// A question with its optional image and its answer blocks. The answer
/// blocks are kept index-aligned with `Question::answers`.
#[derive(Debug)]
pub struct QuestionBlock {
    id: BlockId,
    state: BlockState,
    answers: Vec<AnswerBlock>,
    _subscriptions: Subscriptions,
}

impl QuestionBlock {
    /// Builds the block and one answer block per existing answer.
    pub fn new(question: &Question, bus: &InputBus) -> Self {
        let id = BlockId::new();
        Self {
            id,
            state: BlockState::new(question, question.visible, question.collapsed),
            answers: question
                .answers
                .iter()
                .map(|answer| AnswerBlock::new(answer, bus))
                .collect(),
            _subscriptions: bus.subscribe(id, QUESTION_ACTIONS),
        }
    }

    pub fn answers(&self) -> &[AnswerBlock] {
        &self.answers
    }

    pub fn answer_index(&self, id: BlockId) -> Option<usize> {
        self.answers.iter().position(|answer| answer.id() == id)
    }

    pub fn answer_mut(&mut self, index: usize) -> Option<&mut AnswerBlock> {
        self.answers.get_mut(index)
    }

    /// Appends a default answer and returns the new block's id.
    pub fn add_answer(
        &mut self,
        question: &mut Question,
        bus: &InputBus,
        changes: &mut ChangeTracker,
    ) -> BlockId {
        let answer = Answer::default();
        let block = AnswerBlock::new(&answer, bus);
        let id = block.id();
        question.answers.push(answer);
        self.answers.push(block);
        changes.mark();
        id
    }

    /// Removes the answer block `id` and its node. An open edit on that
    /// answer is dropped without a prompt.
    pub fn remove_answer(
        &mut self,
        question: &mut Question,
        id: BlockId,
        surfaces: &mut Surfaces,
        coordinator: &mut Coordinator,
        changes: &mut ChangeTracker,
    ) -> bool {
        let Some(index) = self.answer_index(id) else {
            return false;
        };
        let mut block = self.answers.remove(index);
        block.abandon_edit(surfaces, coordinator);
        question.answers.remove(index);
        changes.mark();
        true
    }

    pub fn toggle_visibility(&mut self, question: &mut Question, changes: &mut ChangeTracker) {
        question.visible = !question.visible;
        self.state.set_visible(question.visible);
        changes.mark();
    }

    pub fn toggle_collapsed(&mut self, question: &mut Question, changes: &mut ChangeTracker) {
        self.set_collapsed(question, !question.collapsed, changes);
    }

    pub fn set_collapsed(
        &mut self,
        question: &mut Question,
        collapsed: bool,
        changes: &mut ChangeTracker,
    ) {
        if question.collapsed == collapsed {
            return;
        }
        question.collapsed = collapsed;
        self.state.set_collapsed(collapsed);
        changes.mark();
    }

    /// Returns false when the question has no image.
    pub fn toggle_image_collapsed(
        &mut self,
        question: &mut Question,
        changes: &mut ChangeTracker,
    ) -> bool {
        let Some(image) = question.image.as_mut() else {
            return false;
        };
        image.collapsed = !image.collapsed;
        changes.mark();
        true
    }

    /// Drops open edits on this block and all of its answers.
    pub(crate) fn abandon_all(&mut self, surfaces: &mut Surfaces, coordinator: &mut Coordinator) {
        self.abandon_edit(surfaces, coordinator);
        for answer in &mut self.answers {
            answer.abandon_edit(surfaces, coordinator);
        }
    }
}

impl Block for QuestionBlock {
    type Node = Question;

    fn id(&self) -> BlockId {
        self.id
    }

    fn state(&self) -> &BlockState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut BlockState {
        &mut self.state
    }

    fn supports(&self, _mode: EditMode) -> bool {
        true
    }

    fn refresh(&mut self, question: &Question) {
        self.state.preview = markup::plain_text(&question.text);
        self.state.visible = question.visible;
        self.state.collapsed = question.collapsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ActiveEdit;
    use crate::model::Image;
    use crate::surface::EditSurface;

    #[test]
    fn builds_one_answer_block_per_answer() {
        let bus = InputBus::new();
        let question = Question {
            answers: vec![Answer::default(), Answer::default(), Answer::default()],
            ..Question::default()
        };
        let block = QuestionBlock::new(&question, &bus);
        assert_eq!(block.answers().len(), 3);
        assert_eq!(bus.subscriber_count(), 4);
    }

    #[test]
    fn add_and_remove_answer_keep_collections_aligned() {
        let bus = InputBus::new();
        let mut surfaces = Surfaces::new();
        let mut coordinator = Coordinator::new();
        let mut changes = ChangeTracker::default();
        let mut question = Question::default();
        let mut block = QuestionBlock::new(&question, &bus);

        let first = block.add_answer(&mut question, &bus, &mut changes);
        let second = block.add_answer(&mut question, &bus, &mut changes);
        assert_eq!(question.answers.len(), 2);
        assert_eq!(block.answer_index(second), Some(1));

        assert!(block.remove_answer(
            &mut question,
            first,
            &mut surfaces,
            &mut coordinator,
            &mut changes
        ));
        assert_eq!(question.answers.len(), 1);
        assert_eq!(block.answers().len(), 1);
        assert_eq!(block.answer_index(second), Some(0));
        assert!(!bus.accepts(first, crate::input::BlockAction::ToggleCorrect));
    }

    #[test]
    fn removing_the_edited_answer_frees_the_slot() {
        let bus = InputBus::new();
        let mut surfaces = Surfaces::new();
        let mut coordinator = Coordinator::new();
        let mut changes = ChangeTracker::default();
        let mut question = Question::default();
        let mut block = QuestionBlock::new(&question, &bus);
        let id = block.add_answer(&mut question, &bus, &mut changes);

        let answer_block = block.answer_mut(0).unwrap();
        answer_block.start_text_edit(&question.answers[0], &mut surfaces);
        coordinator.set_active(ActiveEdit {
            block: id,
            mode: EditMode::Text,
        });

        block.remove_answer(&mut question, id, &mut surfaces, &mut coordinator, &mut changes);
        assert_eq!(coordinator.active(), None);
        assert!(surfaces.text.target().is_none());
    }

    #[test]
    fn toggles_write_through_to_the_question() {
        let bus = InputBus::new();
        let mut changes = ChangeTracker::default();
        let mut question = Question {
            image: Some(Image::new("a.png")),
            ..Question::default()
        };
        let mut block = QuestionBlock::new(&question, &bus);

        block.toggle_visibility(&mut question, &mut changes);
        assert!(!question.visible);
        assert!(!block.state().is_visible());

        block.toggle_collapsed(&mut question, &mut changes);
        assert!(question.collapsed);
        assert!(block.state().is_collapsed());

        assert!(block.toggle_image_collapsed(&mut question, &mut changes));
        assert!(question.image.as_ref().is_some_and(|image| image.collapsed));
    }

    #[test]
    fn image_collapse_without_image_is_ignored() {
        let bus = InputBus::new();
        let mut changes = ChangeTracker::default();
        let mut question = Question::default();
        let mut block = QuestionBlock::new(&question, &bus);
        assert!(!block.toggle_image_collapsed(&mut question, &mut changes));
        assert!(!changes.has_changed());
    }
}

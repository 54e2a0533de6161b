//! Routing of block-level input actions.
//!
//! Every block subscribes to the actions it reacts to when it is built and
//! holds the returned [`Subscriptions`]. Dropping the block drops the guard,
//! which removes all of its registrations in one step.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::{Rc, Weak};

use crate::block::BlockId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockAction {
    EditText,
    EditImage,
    ToggleCollapsed,
    ToggleVisibility,
    ToggleImageCollapsed,
    Delete,
    MoveUp,
    MoveDown,
    DropTarget,
    AddAnswer,
    ToggleCorrect,
}

pub const QUESTION_ACTIONS: &[BlockAction] = &[
    BlockAction::EditText,
    BlockAction::EditImage,
    BlockAction::ToggleCollapsed,
    BlockAction::ToggleVisibility,
    BlockAction::ToggleImageCollapsed,
    BlockAction::Delete,
    BlockAction::MoveUp,
    BlockAction::MoveDown,
    BlockAction::DropTarget,
    BlockAction::AddAnswer,
];

pub const ANSWER_ACTIONS: &[BlockAction] = &[
    BlockAction::EditText,
    BlockAction::ToggleCorrect,
    BlockAction::Delete,
];

type Registry = HashMap<BlockId, BTreeSet<BlockAction>>;

/// Shared table of which block listens to which action.
#[derive(Clone, Default)]
pub struct InputBus {
    inner: Rc<RefCell<Registry>>,
}

impl InputBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, block: BlockId, actions: &[BlockAction]) -> Subscriptions {
        self.inner
            .borrow_mut()
            .entry(block)
            .or_default()
            .extend(actions.iter().copied());
        Subscriptions {
            block,
            registry: Rc::downgrade(&self.inner),
        }
    }

    pub fn accepts(&self, block: BlockId, action: BlockAction) -> bool {
        self.inner
            .borrow()
            .get(&block)
            .is_some_and(|actions| actions.contains(&action))
    }

    pub fn actions_for(&self, block: BlockId) -> Vec<BlockAction> {
        self.inner
            .borrow()
            .get(&block)
            .map(|actions| actions.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of blocks that currently hold subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().len()
    }
}

impl std::fmt::Debug for InputBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Guard for all registrations of one block.
pub struct Subscriptions {
    block: BlockId,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(&self.block);
        }
    }
}

impl std::fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriptions")
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

//! Single-editor arbitration.
//!
//! [`ActiveSlot`] is the ownership token for "the block that holds an edit
//! surface". Anyone can ask who holds it; only [`Coordinator::set_active`]
//! and [`Coordinator::clear_active`] change it. When the holder has unsaved
//! work, switching away parks the request in a [`PendingClose`] until the
//! author answers the save/discard/cancel prompt.

use tracing::debug;

use crate::block::BlockId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditMode {
    Text,
    Image,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveEdit {
    pub block: BlockId,
    pub mode: EditMode,
}

#[derive(Debug, Default)]
pub struct ActiveSlot {
    holder: Option<ActiveEdit>,
}

impl ActiveSlot {
    pub fn holder(&self) -> Option<ActiveEdit> {
        self.holder
    }

    pub fn is_held_by(&self, block: BlockId) -> bool {
        self.holder.is_some_and(|edit| edit.block == block)
    }
}

/// The author's answer to the unsaved-changes prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Save,
    Discard,
    Cancel,
}

/// What happens once the pending close succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    Activate(ActiveEdit),
    CloseTest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingClose {
    pub block: BlockId,
    pub resume: Resume,
}

/// How `request_activation` should be carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plan {
    /// Already editing in that mode.
    Nothing,
    /// Nothing to close; start editing right away.
    Activate,
    /// `close` must be closed first, possibly through the prompt.
    CloseFirst { close: BlockId },
    /// A prompt is open; the request is dropped.
    Drop,
}

#[derive(Debug, Default)]
pub struct Coordinator {
    slot: ActiveSlot,
    pending: Option<PendingClose>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self) -> &ActiveSlot {
        &self.slot
    }

    pub fn active(&self) -> Option<ActiveEdit> {
        self.slot.holder()
    }

    pub fn pending(&self) -> Option<&PendingClose> {
        self.pending.as_ref()
    }

    pub fn is_prompting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn plan(&self, request: ActiveEdit) -> Plan {
        if self.pending.is_some() {
            debug!(?request, "activation dropped while a prompt is open");
            return Plan::Drop;
        }
        match self.slot.holder {
            Some(current) if current == request => Plan::Nothing,
            Some(current) => Plan::CloseFirst {
                close: current.block,
            },
            None => Plan::Activate,
        }
    }

    /// Records `edit` as the holder. Callers start the edit on the block
    /// themselves; this is only reached once nothing else holds the slot.
    pub fn set_active(&mut self, edit: ActiveEdit) {
        debug_assert!(
            self.slot.holder.is_none() || self.slot.holder == Some(edit),
            "slot already held by {:?}",
            self.slot.holder
        );
        debug!(block = %edit.block, mode = ?edit.mode, "edit surface granted");
        self.slot.holder = Some(edit);
    }

    pub fn clear_active(&mut self) {
        if let Some(edit) = self.slot.holder.take() {
            debug!(block = %edit.block, "edit surface released");
        }
    }

    pub(crate) fn park(&mut self, pending: PendingClose) {
        self.pending = Some(pending);
    }

    pub(crate) fn take_pending(&mut self) -> Option<PendingClose> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(block: BlockId, mode: EditMode) -> ActiveEdit {
        ActiveEdit { block, mode }
    }

    #[test]
    fn empty_slot_activates_directly() {
        let coordinator = Coordinator::new();
        assert_eq!(
            coordinator.plan(edit(BlockId::new(), EditMode::Text)),
            Plan::Activate
        );
    }

    #[test]
    fn same_block_same_mode_is_a_no_op() {
        let mut coordinator = Coordinator::new();
        let block = BlockId::new();
        coordinator.set_active(edit(block, EditMode::Text));
        assert_eq!(coordinator.plan(edit(block, EditMode::Text)), Plan::Nothing);
    }

    #[test]
    fn mode_switch_closes_the_same_block_first() {
        let mut coordinator = Coordinator::new();
        let block = BlockId::new();
        coordinator.set_active(edit(block, EditMode::Text));
        assert_eq!(
            coordinator.plan(edit(block, EditMode::Image)),
            Plan::CloseFirst { close: block }
        );
    }

    #[test]
    fn other_block_closes_the_holder_first() {
        let mut coordinator = Coordinator::new();
        let holder = BlockId::new();
        coordinator.set_active(edit(holder, EditMode::Image));
        assert_eq!(
            coordinator.plan(edit(BlockId::new(), EditMode::Text)),
            Plan::CloseFirst { close: holder }
        );
    }

    #[test]
    fn requests_are_dropped_while_prompting() {
        let mut coordinator = Coordinator::new();
        let holder = BlockId::new();
        coordinator.set_active(edit(holder, EditMode::Text));
        coordinator.park(PendingClose {
            block: holder,
            resume: Resume::CloseTest,
        });
        assert_eq!(
            coordinator.plan(edit(BlockId::new(), EditMode::Text)),
            Plan::Drop
        );
        assert!(coordinator.take_pending().is_some());
        assert!(!coordinator.is_prompting());
    }

    #[test]
    fn clear_releases_the_slot() {
        let mut coordinator = Coordinator::new();
        let block = BlockId::new();
        coordinator.set_active(edit(block, EditMode::Text));
        assert!(coordinator.slot().is_held_by(block));
        coordinator.clear_active();
        assert_eq!(coordinator.active(), None);
    }
}

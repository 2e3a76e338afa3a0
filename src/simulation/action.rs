//! Player changes to attribute limits, applied after a propagation delay

use serde::Serialize;

use super::types::ComponentId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAction {
    pub component_id: ComponentId,
    pub attribute_id: String,
    pub new_value: f64,
    /// Ticks left before the change lands
    pub remaining_ticks: u32,
}

/// Independent countdowns; each action lands on its own
#[derive(Debug, Clone, Default)]
pub struct ActionQueue {
    pending: Vec<PendingAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: PendingAction) {
        self.pending.push(action);
    }

    /// Count every action down one tick and return those that reached zero
    pub fn advance(&mut self) -> Vec<PendingAction> {
        let mut due = Vec::new();
        self.pending.retain_mut(|action| {
            action.remaining_ticks = action.remaining_ticks.saturating_sub(1);
            if action.remaining_ticks == 0 {
                due.push(action.clone());
                false
            } else {
                true
            }
        });
        due
    }

    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

//! Transient per-tick messages for the UI

use serde::Serialize;

use super::types::ComponentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Warning,
    Materialized,
    Resolved,
    TicketOpened,
    ActionApplied,
    JobFired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub tick: u64,
    pub kind: NotificationKind,
    pub component_id: Option<ComponentId>,
    pub message: String,
}

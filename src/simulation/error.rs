//! Errors the engine raises at its entry points

use super::types::{ComponentId, TicketId};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Component not found: {0}")]
    UnknownComponent(ComponentId),

    #[error("Component {component} has no attribute '{attribute}'")]
    UnknownAttribute {
        component: ComponentId,
        attribute: String,
    },

    #[error("Ticket not found: {0}")]
    UnknownTicket(TicketId),

    #[error("Cannot reopen {ticket}: {open} is already tracking {component}/{alert}")]
    DuplicateTicket {
        ticket: TicketId,
        open: TicketId,
        component: ComponentId,
        alert: String,
    },

    #[error("Dependency cycle through component {0}")]
    DependencyCycle(ComponentId),

    #[error("Level '{0}' has no components")]
    EmptyLevel(String),
}

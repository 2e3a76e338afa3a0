//! Threshold alerts and the incident tickets they open

use log::info;
use serde::{Deserialize, Serialize};

use super::component::{ComponentState, ComponentStatus, SyntheticAlert};
use super::error::SimError;
use super::types::{ComponentId, TicketId};

/// Which side of a threshold is bad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    #[default]
    Above,
    Below,
}

impl AlertDirection {
    pub fn breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above => value >= threshold,
            Self::Below => value <= threshold,
        }
    }
}

/// What an alert observes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    /// A metric's value
    Metric(String),
    /// An attribute's utilization percentage
    Attribute(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub name: String,
    pub source: AlertSource,
    #[serde(default)]
    pub warning_threshold: Option<f64>,
    #[serde(default)]
    pub critical_threshold: Option<f64>,
    #[serde(default)]
    pub direction: AlertDirection,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AlertConfig {
    /// Current observed value, `None` when the component lacks the source
    pub fn observe(&self, state: &ComponentState) -> Option<f64> {
        match &self.source {
            AlertSource::Metric(key) => state.metric_value(key),
            AlertSource::Attribute(key) => state.attribute(key).map(|a| a.utilization()),
        }
    }

    pub fn level(&self, value: f64) -> ComponentStatus {
        let breached = |threshold: Option<f64>| {
            threshold.is_some_and(|t| self.direction.breached(value, t))
        };
        if breached(self.critical_threshold) {
            ComponentStatus::Critical
        } else if breached(self.warning_threshold) {
            ComponentStatus::Warning
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// A critical condition found on one component this tick
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalAlert {
    pub alert_name: String,
    pub title: String,
    pub description: String,
}

/// Evaluate configured and synthetic alerts, updating status and triggers.
///
/// Returns every alert that is critical this tick.
pub fn evaluate_alerts(
    state: &mut ComponentState,
    synthetic: Vec<SyntheticAlert>,
) -> Vec<CriticalAlert> {
    let mut status = ComponentStatus::Healthy;
    let mut critical = Vec::new();

    for alert in &state.alerts {
        let Some(value) = alert.observe(state) else {
            continue;
        };
        let level = alert.level(value);
        status = status.max(level);
        if level == ComponentStatus::Critical {
            critical.push(CriticalAlert {
                alert_name: alert.name.clone(),
                title: alert
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("{}: {} is critical", state.name, alert.name)),
                description: alert.description.clone().unwrap_or_else(|| {
                    format!("{} observed {:.2} on {}", alert.name, value, state.name)
                }),
            });
        }
    }

    for alert in synthetic {
        status = ComponentStatus::Critical;
        critical.push(CriticalAlert {
            alert_name: alert.name,
            title: alert.title,
            description: alert.description,
        });
    }

    for alert in &critical {
        state.triggered_alerts.insert(alert.alert_name.clone());
    }
    state.status = status;
    critical
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Investigating,
    Resolved,
}

/// A player-facing incident
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    pub component_id: ComponentId,
    pub alert_name: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_tick: u64,
    pub resolved_tick: Option<u64>,
}

impl Ticket {
    pub fn is_unresolved(&self) -> bool {
        self.status != TicketStatus::Resolved
    }
}

/// Append-only ticket log, deduplicated on (component, alert)
#[derive(Debug, Clone, Default)]
pub struct TicketBook {
    tickets: Vec<Ticket>,
    next_id: u64,
}

impl TicketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_unresolved(&self, component_id: &ComponentId, alert_name: &str) -> bool {
        self.tickets.iter().any(|t| {
            t.is_unresolved() && &t.component_id == component_id && t.alert_name == alert_name
        })
    }

    /// Open a ticket unless one with the same key is still unresolved
    pub fn open_if_absent(
        &mut self,
        component_id: &ComponentId,
        alert_name: &str,
        title: &str,
        description: &str,
        tick: u64,
    ) -> Option<TicketId> {
        if self.has_unresolved(component_id, alert_name) {
            return None;
        }
        self.next_id += 1;
        let id = TicketId(self.next_id);
        info!("Opened {} for {}/{}: {}", id, component_id, alert_name, title);
        self.tickets.push(Ticket {
            id,
            component_id: component_id.clone(),
            alert_name: alert_name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status: TicketStatus::Open,
            created_tick: tick,
            resolved_tick: None,
        });
        Some(id)
    }

    /// Move a ticket to `status`.
    ///
    /// A resolved ticket cannot be reopened while a newer ticket for the same
    /// component and alert is still unresolved.
    pub fn set_status(
        &mut self,
        id: TicketId,
        status: TicketStatus,
        tick: u64,
    ) -> Result<(), SimError> {
        let ticket = self.get(id).ok_or(SimError::UnknownTicket(id))?;
        if status != TicketStatus::Resolved {
            let duplicate = self.tickets.iter().find(|t| {
                t.id != id
                    && t.is_unresolved()
                    && t.component_id == ticket.component_id
                    && t.alert_name == ticket.alert_name
            });
            if let Some(open) = duplicate {
                return Err(SimError::DuplicateTicket {
                    ticket: id,
                    open: open.id,
                    component: ticket.component_id.clone(),
                    alert: ticket.alert_name.clone(),
                });
            }
        }

        let ticket = self
            .tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SimError::UnknownTicket(id))?;
        ticket.status = status;
        ticket.resolved_tick = match status {
            TicketStatus::Resolved => Some(tick),
            _ => None,
        };
        Ok(())
    }

    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == id)
    }

    pub fn all(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.iter().filter(|t| t.is_unresolved())
    }
}

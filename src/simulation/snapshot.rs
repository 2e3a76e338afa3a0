//! Read-only view of the world produced between ticks

use serde::Serialize;
use std::collections::BTreeMap;

use super::action::PendingAction;
use super::alert::Ticket;
use super::component::{ComponentStatus, SimComponent};
use super::notification::Notification;
use super::traffic::{SimTraffic, TrafficType};
use super::types::{ComponentId, TrafficId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSnapshot {
    pub limit: f64,
    pub current: f64,
    pub utilization: f64,
    pub cost_per_unit: f64,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub value: f64,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSnapshot {
    pub id: ComponentId,
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: &'static str,
    pub status: ComponentStatus,
    pub attributes: BTreeMap<String, AttributeSnapshot>,
    pub metrics: BTreeMap<String, MetricSnapshot>,
    pub triggered_alerts: Vec<String>,
}

impl From<&SimComponent> for ComponentSnapshot {
    fn from(component: &SimComponent) -> Self {
        let state = &component.state;
        Self {
            id: state.id.clone(),
            name: state.name.clone(),
            component_type: component.type_name(),
            status: state.status,
            attributes: state
                .attributes
                .iter()
                .map(|(key, a)| {
                    (
                        key.clone(),
                        AttributeSnapshot {
                            limit: a.effective_limit(),
                            current: a.effective_current(),
                            utilization: a.utilization(),
                            cost_per_unit: a.cost_per_unit,
                            history: a.history.iter().collect(),
                        },
                    )
                })
                .collect(),
            metrics: state
                .metrics
                .iter()
                .map(|(key, m)| {
                    (
                        key.clone(),
                        MetricSnapshot {
                            value: m.value,
                            history: m.history.iter().collect(),
                        },
                    )
                })
                .collect(),
            triggered_alerts: state.triggered_alerts.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSnapshot {
    pub id: TrafficId,
    #[serde(rename = "type")]
    pub traffic_type: TrafficType,
    pub target: ComponentId,
    pub volume: f64,
    pub successful: f64,
    pub failed: f64,
    pub average_latency: f64,
    pub success_history: Vec<f64>,
    pub failure_history: Vec<f64>,
    pub latency_history: Vec<f64>,
}

impl From<&SimTraffic> for TrafficSnapshot {
    fn from(traffic: &SimTraffic) -> Self {
        let tally = traffic.tally();
        Self {
            id: traffic.id.clone(),
            traffic_type: traffic.traffic_type,
            target: traffic.target.clone(),
            volume: traffic.volume,
            successful: tally.successful,
            failed: tally.failed(),
            average_latency: tally.average_latency(),
            success_history: traffic.success_history.iter().collect(),
            failure_history: traffic.failure_history.iter().collect(),
            latency_history: traffic.latency_history.iter().collect(),
        }
    }
}

/// Everything a UI needs after a completed tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub level_id: String,
    pub tick: u64,
    pub total_cost: f64,
    pub components: Vec<ComponentSnapshot>,
    pub traffics: Vec<TrafficSnapshot>,
    pub tickets: Vec<Ticket>,
    pub pending_actions: Vec<PendingAction>,
    pub notifications: Vec<Notification>,
}

impl Snapshot {
    pub fn component(&self, id: &str) -> Option<&ComponentSnapshot> {
        self.components.iter().find(|c| c.id.as_str() == id)
    }

    pub fn traffic(&self, id: &str) -> Option<&TrafficSnapshot> {
        self.traffics.iter().find(|t| t.id.as_str() == id)
    }
}

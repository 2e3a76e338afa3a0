//! Queue node physics.
//!
//! A queue is a decoupling boundary: it absorbs pass-1 demand rather than
//! forwarding it, admits ingress against the space it can offer this tick, and
//! drains its backlog to consumers in a separate push step after pass 2.
//! Only successful pushes leave the backlog; failed ones retry next tick.

use rand::rngs::StdRng;
use serde::Deserialize;

use super::{ComponentModel, ComponentState, SyntheticAlert};
use crate::simulation::types::overload_failure_rate;

pub const METRIC_BACKLOG: &str = "backlog";
pub const METRIC_EGRESS_FAILURES: &str = "egress_failures";
pub const METRIC_DROPPED: &str = "dropped";

pub const ALERT_LARGE_FILL_RATE: &str = "large_fill_rate";
pub const ALERT_QUEUE_NEAR_FULL: &str = "Queue Near Full";

/// Outcome of one tick's push to consumers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueuePushReport {
    /// Ingress admitted this tick
    pub accepted_ingress: f64,
    pub attempted_push: f64,
    /// Minimum delivered across all fan-out targets
    pub successful_outgoing: f64,
    pub egress_failures: f64,
    pub backlog: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueNode {
    pub backlog_attribute: String,
    pub egress_attribute: String,
    pub base_latency: f64,
    #[serde(skip)]
    last_push: QueuePushReport,
    /// Ingress already folded into the backlog by this tick's push
    #[serde(skip)]
    pushed_ingress: f64,
}

impl Default for QueueNode {
    fn default() -> Self {
        Self {
            backlog_attribute: "backlog".to_string(),
            egress_attribute: "egress_rate".to_string(),
            base_latency: 1.0,
            last_push: QueuePushReport::default(),
            pushed_ingress: 0.0,
        }
    }
}

impl QueueNode {
    pub fn backlog(&self, state: &ComponentState) -> f64 {
        state
            .attribute(&self.backlog_attribute)
            .map(|a| a.current())
            .unwrap_or(0.0)
    }

    pub fn backlog_limit(&self, state: &ComponentState) -> f64 {
        state
            .attribute(&self.backlog_attribute)
            .map(|a| a.effective_limit())
            .unwrap_or(0.0)
    }

    pub fn egress_limit(&self, state: &ComponentState) -> f64 {
        state
            .attribute(&self.egress_attribute)
            .map(|a| a.effective_limit())
            .unwrap_or(0.0)
    }

    /// Admission space: free buffer plus what this tick's drain will free up
    pub fn available_space(&self, state: &ComponentState, demand: f64) -> f64 {
        let backlog = self.backlog(state);
        let drain = self.egress_limit(state).min(backlog + demand);
        (self.backlog_limit(state) - backlog + drain).max(0.0)
    }

    /// Volume the queue tries to hand to consumers this tick
    pub fn attempted_push(&self, state: &ComponentState) -> f64 {
        let accepted = state.accumulator.successful_count;
        self.egress_limit(state)
            .min(self.backlog(state) + accepted)
            .max(0.0)
    }

    /// Fold this tick's admitted ingress and delivered egress into the backlog
    pub fn complete_push(
        &mut self,
        state: &mut ComponentState,
        attempted_push: f64,
        successful_outgoing: f64,
    ) -> QueuePushReport {
        let accepted = state.accumulator.successful_count;
        let successful = successful_outgoing.clamp(0.0, attempted_push.max(0.0));
        let limit = self.backlog_limit(state);
        let backlog = (self.backlog(state) + accepted - successful).clamp(0.0, limit);
        if let Some(attribute) = state.attribute_mut(&self.backlog_attribute) {
            attribute.set_current(backlog);
        }
        self.pushed_ingress = accepted;
        self.last_push = QueuePushReport {
            accepted_ingress: accepted,
            attempted_push,
            successful_outgoing: successful,
            egress_failures: (attempted_push - successful).max(0.0),
            backlog,
        };
        self.last_push
    }

    pub fn last_push(&self) -> QueuePushReport {
        self.last_push
    }
}

impl ComponentModel for QueueNode {
    fn failure_rate(&self, state: &ComponentState, demand: f64) -> f64 {
        overload_failure_rate(demand, self.available_space(state, demand))
    }

    fn local_latency(
        &self,
        _state: &ComponentState,
        route_latency: Option<f64>,
        _volume: f64,
        _rng: &mut StdRng,
    ) -> f64 {
        route_latency.unwrap_or(self.base_latency)
    }

    fn finish_tick(&mut self, state: &mut ComponentState, _rng: &mut StdRng) {
        // ingress admitted after this queue already pushed (an upstream queue
        // drained into it later in the tick) still lands in the backlog
        let late = state.accumulator.successful_count - self.pushed_ingress;
        if late > 0.0 {
            let limit = self.backlog_limit(state);
            let backlog = (self.backlog(state) + late).min(limit);
            if let Some(attribute) = state.attribute_mut(&self.backlog_attribute) {
                attribute.set_current(backlog);
            }
            self.last_push.accepted_ingress += late;
            self.last_push.backlog = backlog;
        }
        self.pushed_ingress = 0.0;

        let report = self.last_push;
        state.set_metric(METRIC_BACKLOG, self.backlog(state));
        state.set_metric(METRIC_EGRESS_FAILURES, report.egress_failures);
        state.set_metric(METRIC_DROPPED, state.accumulator.unsuccessful_volume);
    }

    fn forwards_demand(&self) -> bool {
        false
    }

    fn synthetic_alerts(&self, state: &ComponentState) -> Vec<SyntheticAlert> {
        let mut alerts = Vec::new();
        let incoming = state.accumulator.incoming_volume;
        if self.last_push.successful_outgoing < incoming {
            alerts.push(SyntheticAlert {
                name: ALERT_LARGE_FILL_RATE.to_string(),
                title: format!("{} is filling faster than it drains", state.name),
                description: format!(
                    "Received {:.0} but delivered {:.0} this tick; backlog is {:.0}.",
                    incoming,
                    self.last_push.successful_outgoing,
                    self.backlog(state)
                ),
            });
        }
        let limit = self.backlog_limit(state);
        if limit > 0.0 && self.backlog(state) >= limit {
            alerts.push(SyntheticAlert {
                name: ALERT_QUEUE_NEAR_FULL.to_string(),
                title: format!("{} is at capacity", state.name),
                description: format!(
                    "Backlog reached its limit of {:.0}; new messages are being dropped.",
                    limit
                ),
            });
        }
        alerts
    }

    fn variant_metrics(&self) -> &'static [&'static str] {
        &[METRIC_BACKLOG, METRIC_EGRESS_FAILURES, METRIC_DROPPED]
    }
}

//! Database node physics: one connection serves one request, with a flat
//! contention penalty once the pool runs hot.

use rand::rngs::StdRng;
use serde::Deserialize;

use super::{ComponentModel, ComponentState};
use crate::simulation::types::{overload_failure_rate, percentage};

pub const METRIC_CONNECTIONS: &str = "connections";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseNode {
    pub connection_attribute: String,
    pub storage_attribute: String,
    pub base_latency: f64,
    /// Latency added per open connection
    pub load_factor: f64,
    /// Pool utilization (percent) above which the contention penalty applies
    pub contention_threshold: f64,
    pub contention_penalty: f64,
    /// Storage consumed per successful request
    pub storage_growth_rate: f64,
}

impl Default for DatabaseNode {
    fn default() -> Self {
        Self {
            connection_attribute: "connections".to_string(),
            storage_attribute: "storage".to_string(),
            base_latency: 5.0,
            load_factor: 0.05,
            contention_threshold: 90.0,
            contention_penalty: 4.0,
            storage_growth_rate: 0.0,
        }
    }
}

impl DatabaseNode {
    pub fn connection_limit(&self, state: &ComponentState) -> Option<f64> {
        state
            .attribute(&self.connection_attribute)
            .map(|a| a.effective_limit())
    }

    /// Connections the pass-1 demand holds open, at most the pool size
    pub fn open_connections(&self, state: &ComponentState) -> f64 {
        let demand = state.accumulator.expected_volume;
        match self.connection_limit(state) {
            Some(limit) => demand.min(limit),
            None => demand,
        }
    }
}

impl ComponentModel for DatabaseNode {
    fn failure_rate(&self, state: &ComponentState, demand: f64) -> f64 {
        match self.connection_limit(state) {
            Some(limit) => overload_failure_rate(demand, limit),
            None => 0.0,
        }
    }

    fn local_latency(
        &self,
        state: &ComponentState,
        route_latency: Option<f64>,
        _volume: f64,
        _rng: &mut StdRng,
    ) -> f64 {
        let base = route_latency.unwrap_or(self.base_latency);
        let connections = self.open_connections(state);
        let latency = base + connections * self.load_factor;
        let pool_utilization = match self.connection_limit(state) {
            Some(limit) => percentage(connections, limit),
            None => 0.0,
        };
        if pool_utilization > self.contention_threshold {
            latency * self.contention_penalty
        } else {
            latency
        }
    }

    fn finish_tick(&mut self, state: &mut ComponentState, _rng: &mut StdRng) {
        let incoming = state.accumulator.incoming_volume;
        let successful = state.accumulator.successful_count;

        let mut connections = incoming;
        if let Some(pool) = state.attribute_mut(&self.connection_attribute) {
            connections = incoming.min(pool.effective_limit());
            pool.set_current(connections);
        }
        state.set_metric(METRIC_CONNECTIONS, connections);

        // grows monotonically; overflow belongs to a dedicated storage node
        if let Some(storage) = state.attribute_mut(&self.storage_attribute) {
            let grown = storage.current() + successful * self.storage_growth_rate.max(0.0);
            let limit = storage.effective_limit();
            storage.set_current(grown.min(limit));
        }
    }

    fn variant_metrics(&self) -> &'static [&'static str] {
        &[METRIC_CONNECTIONS]
    }
}

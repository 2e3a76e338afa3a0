//! Storage node physics: no rate limit, but a hard cliff once full.

use rand::rngs::StdRng;
use serde::Deserialize;

use super::{ComponentModel, ComponentState};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageNode {
    pub capacity_attribute: String,
    pub base_latency: f64,
    /// Capacity consumed per successful write
    pub write_rate: f64,
}

impl Default for StorageNode {
    fn default() -> Self {
        Self {
            capacity_attribute: "storage".to_string(),
            base_latency: 2.0,
            write_rate: 1.0,
        }
    }
}

impl StorageNode {
    pub fn is_full(&self, state: &ComponentState) -> bool {
        state
            .attribute(&self.capacity_attribute)
            .is_some_and(|a| a.effective_limit() > 0.0 && a.utilization() >= 100.0)
    }
}

impl ComponentModel for StorageNode {
    fn failure_rate(&self, state: &ComponentState, _demand: f64) -> f64 {
        if self.is_full(state) {
            1.0
        } else {
            0.0
        }
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
        let written = state.accumulator.successful_count * self.write_rate.max(0.0);
        if let Some(capacity) = state.attribute_mut(&self.capacity_attribute) {
            let limit = capacity.effective_limit();
            let used = (capacity.current() + written).min(limit);
            capacity.set_current(used);
        }
    }
}

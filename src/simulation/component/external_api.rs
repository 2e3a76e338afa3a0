//! Third-party API physics: load-independent latency and a hard quota.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{ComponentModel, ComponentState};
use crate::simulation::types::overload_failure_rate;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExternalApiNode {
    pub quota_attribute: String,
    pub base_latency: f64,
    /// Half-width of the symmetric latency jitter
    pub latency_noise: f64,
}

impl Default for ExternalApiNode {
    fn default() -> Self {
        Self {
            quota_attribute: "quota".to_string(),
            base_latency: 100.0,
            latency_noise: 20.0,
        }
    }
}

impl ComponentModel for ExternalApiNode {
    fn failure_rate(&self, state: &ComponentState, demand: f64) -> f64 {
        match state.attribute(&self.quota_attribute) {
            Some(quota) => overload_failure_rate(demand, quota.effective_limit()),
            None => 0.0,
        }
    }

    fn local_latency(
        &self,
        _state: &ComponentState,
        route_latency: Option<f64>,
        _volume: f64,
        rng: &mut StdRng,
    ) -> f64 {
        let base = route_latency.unwrap_or(self.base_latency);
        let jitter = if self.latency_noise > 0.0 {
            rng.random_range(-self.latency_noise..=self.latency_noise)
        } else {
            0.0
        };
        (base + jitter).max(0.0)
    }

    fn finish_tick(&mut self, state: &mut ComponentState, _rng: &mut StdRng) {
        let incoming = state.accumulator.incoming_volume;
        if let Some(quota) = state.attribute_mut(&self.quota_attribute) {
            let limit = quota.effective_limit();
            quota.set_current(incoming.min(limit));
        }
    }
}

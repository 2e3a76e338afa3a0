//! Compute node physics: request capacity per unit of a primary resource,
//! with a bounded non-linear latency spike past saturation.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Deserialize;

use super::{ComponentModel, ComponentState, DEFAULT_SATURATION_THRESHOLD};
use crate::simulation::types::{overload_failure_rate, percentage};

/// Ceiling on the saturation latency multiplier
pub const MAX_SATURATION_MULTIPLIER: f64 = 100.0;

/// A resource that tracks traffic but does not limit it (memory, disk io)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecondaryResource {
    pub attribute: String,
    #[serde(default)]
    pub base: f64,
    #[serde(default)]
    pub consumption_rate: f64,
    /// Half-width of the uniform noise added each tick
    #[serde(default)]
    pub noise: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComputeNode {
    pub primary_attribute: String,
    /// Units of the primary resource consumed before any request is served
    pub base_overhead: f64,
    pub request_capacity_per_unit: f64,
    pub base_latency: f64,
    /// Latency added per request of volume
    pub load_factor: f64,
    pub saturation_threshold: f64,
    pub saturation_penalty_factor: f64,
    pub secondary_resources: Vec<SecondaryResource>,
}

impl Default for ComputeNode {
    fn default() -> Self {
        Self {
            primary_attribute: "cpu".to_string(),
            base_overhead: 0.0,
            request_capacity_per_unit: 1.0,
            base_latency: 10.0,
            load_factor: 0.01,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            saturation_penalty_factor: 0.1,
            secondary_resources: Vec::new(),
        }
    }
}

impl ComputeNode {
    /// Requests per tick the node can serve, `None` when it has no primary resource
    pub fn capacity(&self, state: &ComponentState) -> Option<f64> {
        let primary = state.attribute(&self.primary_attribute)?;
        Some(
            ((primary.effective_limit() - self.base_overhead) * self.request_capacity_per_unit)
                .max(0.0),
        )
    }

    fn units_for(&self, volume: f64) -> f64 {
        if self.request_capacity_per_unit <= 0.0 {
            return self.base_overhead;
        }
        self.base_overhead + volume / self.request_capacity_per_unit
    }

    /// Utilization the pass-1 demand would need, not capped at 100
    pub fn raw_utilization(&self, state: &ComponentState) -> f64 {
        match state.attribute(&self.primary_attribute) {
            Some(primary) => percentage(
                self.units_for(state.accumulator.expected_volume),
                primary.effective_limit(),
            ),
            None => 0.0,
        }
    }

    pub fn saturation_multiplier(&self, raw_utilization: f64) -> f64 {
        if raw_utilization <= self.saturation_threshold {
            return 1.0;
        }
        let excess = (raw_utilization - self.saturation_threshold) * self.saturation_penalty_factor;
        (1.0 + excess * excess).min(MAX_SATURATION_MULTIPLIER)
    }
}

impl ComponentModel for ComputeNode {
    fn failure_rate(&self, state: &ComponentState, demand: f64) -> f64 {
        match self.capacity(state) {
            Some(capacity) => overload_failure_rate(demand, capacity),
            None => 0.0,
        }
    }

    fn local_latency(
        &self,
        state: &ComponentState,
        route_latency: Option<f64>,
        volume: f64,
        _rng: &mut StdRng,
    ) -> f64 {
        let base = route_latency.unwrap_or(self.base_latency);
        let latency = base + volume * self.load_factor;
        latency * self.saturation_multiplier(self.raw_utilization(state))
    }

    fn finish_tick(&mut self, state: &mut ComponentState, rng: &mut StdRng) {
        let incoming = state.accumulator.incoming_volume;
        let served = match self.capacity(state) {
            Some(capacity) => incoming.min(capacity),
            None => incoming,
        };
        let used = self.units_for(served);
        if let Some(primary) = state.attribute_mut(&self.primary_attribute) {
            let limit = primary.effective_limit();
            primary.set_current(used.min(limit));
        }

        for resource in &self.secondary_resources {
            let noise = if resource.noise > 0.0 {
                rng.random_range(-resource.noise..=resource.noise)
            } else {
                0.0
            };
            let Some(attribute) = state.attribute_mut(&resource.attribute) else {
                continue;
            };
            let value = resource.base + resource.consumption_rate * incoming + noise;
            // capped for display; secondary resources never reject traffic
            let limit = attribute.effective_limit();
            attribute.set_current(value.min(limit));
        }
    }
}

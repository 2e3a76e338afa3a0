//! Named traffic flows and the registry the resolver looks them up in

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{floor_volume, ComponentId, RollingHistory, TrafficId};

/// Where a flow originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficType {
    /// Injected by users every tick
    External,
    /// Produced by a component's route
    Internal,
}

/// Level-file shape of a traffic flow
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficConfig {
    pub id: TrafficId,
    #[serde(rename = "type")]
    pub traffic_type: TrafficType,
    pub target_component_id: ComponentId,
    /// Nominal requests per tick for external flows
    #[serde(default)]
    pub value: f64,
    /// Half-width of the uniform jitter applied to `value`
    #[serde(default)]
    pub variance: f64,
}

/// Per-tick counters for one flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrafficTally {
    pub sent: f64,
    pub successful: f64,
    pub latency_sum: f64,
}

impl TrafficTally {
    pub fn failed(&self) -> f64 {
        (self.sent - self.successful).max(0.0)
    }

    pub fn average_latency(&self) -> f64 {
        if self.successful <= 0.0 {
            0.0
        } else {
            self.latency_sum / self.successful
        }
    }
}

/// A traffic flow bound to its target component
#[derive(Debug, Clone, Serialize)]
pub struct SimTraffic {
    pub id: TrafficId,
    pub traffic_type: TrafficType,
    pub target: ComponentId,
    pub value: f64,
    pub variance: f64,
    /// Volume injected this tick, after variance and status effects
    pub volume: f64,
    #[serde(skip)]
    tally: TrafficTally,
    pub success_history: RollingHistory,
    pub failure_history: RollingHistory,
    pub latency_history: RollingHistory,
}

impl SimTraffic {
    pub fn from_config(config: &TrafficConfig, max_history: usize) -> Self {
        Self {
            id: config.id.clone(),
            traffic_type: config.traffic_type,
            target: config.target_component_id.clone(),
            value: config.value,
            variance: config.variance,
            volume: 0.0,
            tally: TrafficTally::default(),
            success_history: RollingHistory::with_capacity(max_history),
            failure_history: RollingHistory::with_capacity(max_history),
            latency_history: RollingHistory::with_capacity(max_history),
        }
    }

    pub fn is_external(&self) -> bool {
        self.traffic_type == TrafficType::External
    }

    /// Nominal value jittered by the configured variance, in whole requests
    pub fn sample_volume(&self, rng: &mut StdRng) -> f64 {
        let jitter = if self.variance > 0.0 {
            rng.random_range(-self.variance..=self.variance)
        } else {
            0.0
        };
        floor_volume(self.value + jitter)
    }

    pub fn tally(&self) -> TrafficTally {
        self.tally
    }

    pub fn record(&mut self, volume: f64, successful: f64, latency: f64) {
        self.tally.sent += volume;
        self.tally.successful += successful;
        self.tally.latency_sum += latency * successful;
    }

    pub fn begin_tick(&mut self) {
        self.tally = TrafficTally::default();
        self.volume = 0.0;
    }

    pub fn finish_tick(&mut self) {
        self.success_history.push(self.tally.successful);
        self.failure_history.push(self.tally.failed());
        self.latency_history.push(self.tally.average_latency());
    }
}

/// Flows in level order with a name index
#[derive(Debug, Clone, Default)]
pub struct TrafficRegistry {
    traffics: Vec<SimTraffic>,
    index: HashMap<TrafficId, usize>,
}

impl TrafficRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, traffic: SimTraffic) {
        match self.index.get(&traffic.id) {
            Some(&slot) => self.traffics[slot] = traffic,
            None => {
                self.index.insert(traffic.id.clone(), self.traffics.len());
                self.traffics.push(traffic);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SimTraffic> {
        self.index.get(name).map(|&slot| &self.traffics[slot])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SimTraffic> {
        match self.index.get(name) {
            Some(&slot) => self.traffics.get_mut(slot),
            None => None,
        }
    }

    /// The component a flow is delivered to
    pub fn target_of(&self, name: &str) -> Option<&ComponentId> {
        self.get(name).map(|t| &t.target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimTraffic> {
        self.traffics.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SimTraffic> {
        self.traffics.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.traffics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traffics.is_empty()
    }
}

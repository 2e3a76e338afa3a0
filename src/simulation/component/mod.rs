//! Components of the simulated infrastructure
//!
//! Every component shares [`ComponentState`] (attributes, metrics, routes, alerts and
//! the per-tick accumulators) and carries one [`ComponentKind`] variant holding the
//! physics for its type. The resolver only talks to the [`ComponentModel`] contract.

mod compute;
mod database;
mod external_api;
mod queue;
mod storage;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use compute::{ComputeNode, SecondaryResource, MAX_SATURATION_MULTIPLIER};
pub use database::{DatabaseNode, METRIC_CONNECTIONS};
pub use external_api::ExternalApiNode;
pub use queue::{
    QueueNode, QueuePushReport, ALERT_LARGE_FILL_RATE, ALERT_QUEUE_NEAR_FULL, METRIC_BACKLOG,
    METRIC_DROPPED, METRIC_EGRESS_FAILURES,
};
pub use storage::StorageNode;

use super::alert::AlertConfig;
use super::attribute::{Attribute, AttributeConfig, Metric};
use super::types::{percentage, ComponentId, TrafficId};

pub const METRIC_THROUGHPUT: &str = "throughput";
pub const METRIC_ERROR_RATE: &str = "error_rate";
pub const METRIC_LATENCY: &str = "latency";

/// Default saturation threshold (percent) for compute latency spikes
pub const DEFAULT_SATURATION_THRESHOLD: f64 = 80.0;

/// One outgoing call made while serving a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTraffic {
    pub name: TrafficId,
    /// Downstream requests issued per incoming request
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

/// How a component serves one incoming traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRoute {
    pub incoming: TrafficId,
    #[serde(default)]
    pub base_latency: Option<f64>,
    #[serde(default)]
    pub outgoing: Vec<OutgoingTraffic>,
}

/// Health reported to the player, worst condition wins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

/// Totals gathered during one tick's two passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TickAccumulator {
    /// Demand registered in pass 1
    pub expected_volume: f64,
    /// Volume actually offered in pass 2
    pub incoming_volume: f64,
    pub unsuccessful_volume: f64,
    /// Sum of route latency weighted by successful volume
    pub latency_sum: f64,
    pub successful_count: f64,
}

impl TickAccumulator {
    pub fn record(&mut self, volume: f64, successful: f64, latency: f64) {
        self.incoming_volume += volume;
        self.unsuccessful_volume += (volume - successful).max(0.0);
        self.successful_count += successful;
        self.latency_sum += latency * successful;
    }

    pub fn average_latency(&self) -> f64 {
        if self.successful_count <= 0.0 {
            0.0
        } else {
            self.latency_sum / self.successful_count
        }
    }

    pub fn error_rate(&self) -> f64 {
        percentage(self.unsuccessful_volume, self.incoming_volume)
    }
}

/// A critical condition a component raises on its own, outside its alert configs
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticAlert {
    pub name: String,
    pub title: String,
    pub description: String,
}

/// State every component type shares
#[derive(Debug, Clone)]
pub struct ComponentState {
    pub id: ComponentId,
    pub name: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub metrics: BTreeMap<String, Metric>,
    pub routes: Vec<TrafficRoute>,
    pub alerts: Vec<AlertConfig>,
    pub status: ComponentStatus,
    /// Alert names that breached their critical threshold this tick
    pub triggered_alerts: BTreeSet<String>,
    pub accumulator: TickAccumulator,
    max_history: usize,
}

impl ComponentState {
    pub fn new(id: ComponentId, name: impl Into<String>, max_history: usize) -> Self {
        Self {
            id,
            name: name.into(),
            attributes: BTreeMap::new(),
            metrics: BTreeMap::new(),
            routes: Vec::new(),
            alerts: Vec::new(),
            status: ComponentStatus::Healthy,
            triggered_alerts: BTreeSet::new(),
            accumulator: TickAccumulator::default(),
            max_history,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }

    pub fn insert_attribute(&mut self, name: impl Into<String>, config: &AttributeConfig) {
        self.attributes
            .insert(name.into(), Attribute::from_config(config, self.max_history));
    }

    pub fn metric_value(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|m| m.value)
    }

    /// Write a physics-derived metric, creating it on first use
    pub fn set_metric(&mut self, name: &str, value: f64) {
        let max_history = self.max_history;
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Metric::new(0.0, max_history))
            .set(value);
    }

    pub fn ensure_metric(&mut self, name: &str) {
        let max_history = self.max_history;
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| Metric::new(0.0, max_history));
    }

    pub fn route_for(&self, traffic: &str) -> Option<&TrafficRoute> {
        self.routes.iter().find(|r| r.incoming.as_str() == traffic)
    }

    /// Every outgoing traffic across all routes, in declaration order
    pub fn downstream(&self) -> Vec<OutgoingTraffic> {
        self.routes
            .iter()
            .flat_map(|r| r.outgoing.iter().cloned())
            .collect()
    }

    pub fn begin_tick(&mut self) {
        self.accumulator = TickAccumulator::default();
        self.triggered_alerts.clear();
        for attribute in self.attributes.values_mut() {
            attribute.clear_modifiers();
        }
    }

    fn write_core_metrics(&mut self) {
        let accumulator = self.accumulator;
        self.set_metric(METRIC_THROUGHPUT, accumulator.successful_count);
        self.set_metric(METRIC_ERROR_RATE, accumulator.error_rate());
        self.set_metric(METRIC_LATENCY, accumulator.average_latency());
    }
}

/// The contract the two-pass resolver dispatches through.
pub trait ComponentModel {
    /// Fraction of traffic that fails given this tick's total pass-1 demand
    fn failure_rate(&self, state: &ComponentState, demand: f64) -> f64;

    /// Latency added by this component for `volume` on a route
    fn local_latency(
        &self,
        state: &ComponentState,
        route_latency: Option<f64>,
        volume: f64,
        rng: &mut StdRng,
    ) -> f64;

    /// Update attributes and variant metrics once both passes are complete
    fn finish_tick(&mut self, state: &mut ComponentState, rng: &mut StdRng);

    /// Decoupling boundaries absorb pass-1 demand instead of forwarding it
    fn forwards_demand(&self) -> bool {
        true
    }

    fn synthetic_alerts(&self, _state: &ComponentState) -> Vec<SyntheticAlert> {
        Vec::new()
    }

    /// Metrics this type always reports, created at load
    fn variant_metrics(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Physics variant, tagged by the `type` field in level files
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    Compute(ComputeNode),
    Database(DatabaseNode),
    Storage(StorageNode),
    Queue(QueueNode),
    ExternalApi(ExternalApiNode),
}

impl ComponentKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Compute(_) => "compute",
            Self::Database(_) => "database",
            Self::Storage(_) => "storage",
            Self::Queue(_) => "queue",
            Self::ExternalApi(_) => "external_api",
        }
    }

    fn model(&self) -> &dyn ComponentModel {
        match self {
            Self::Compute(node) => node,
            Self::Database(node) => node,
            Self::Storage(node) => node,
            Self::Queue(node) => node,
            Self::ExternalApi(node) => node,
        }
    }

    fn model_mut(&mut self) -> &mut dyn ComponentModel {
        match self {
            Self::Compute(node) => node,
            Self::Database(node) => node,
            Self::Storage(node) => node,
            Self::Queue(node) => node,
            Self::ExternalApi(node) => node,
        }
    }
}

/// A component: shared state plus its physics variant
#[derive(Debug, Clone)]
pub struct SimComponent {
    pub state: ComponentState,
    pub kind: ComponentKind,
}

impl SimComponent {
    pub fn new(mut state: ComponentState, kind: ComponentKind) -> Self {
        for name in [METRIC_THROUGHPUT, METRIC_ERROR_RATE, METRIC_LATENCY] {
            state.ensure_metric(name);
        }
        for name in kind.model().variant_metrics() {
            state.ensure_metric(name);
        }
        Self { state, kind }
    }

    pub fn id(&self) -> &ComponentId {
        &self.state.id
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn as_queue(&self) -> Option<&QueueNode> {
        match &self.kind {
            ComponentKind::Queue(queue) => Some(queue),
            _ => None,
        }
    }

    /// Settle a queue's backlog after its push; `None` for other types
    pub fn complete_queue_push(
        &mut self,
        attempted: f64,
        successful: f64,
    ) -> Option<QueuePushReport> {
        match &mut self.kind {
            ComponentKind::Queue(queue) => {
                Some(queue.complete_push(&mut self.state, attempted, successful))
            }
            _ => None,
        }
    }

    pub fn forwards_demand(&self) -> bool {
        self.kind.model().forwards_demand()
    }

    pub fn failure_rate(&self, demand: f64) -> f64 {
        self.kind.model().failure_rate(&self.state, demand)
    }

    pub fn local_latency(&self, route_latency: Option<f64>, volume: f64, rng: &mut StdRng) -> f64 {
        self.kind
            .model()
            .local_latency(&self.state, route_latency, volume, rng)
    }

    /// Finalize this tick's attributes and metrics
    pub fn finish_tick(&mut self, rng: &mut StdRng) {
        self.kind.model_mut().finish_tick(&mut self.state, rng);
        self.state.write_core_metrics();
    }

    pub fn synthetic_alerts(&self) -> Vec<SyntheticAlert> {
        self.kind.model().synthetic_alerts(&self.state)
    }
}

/// Components in level order with an id index
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<SimComponent>,
    index: HashMap<ComponentId, usize>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, component: SimComponent) {
        let id = component.id().clone();
        match self.index.get(&id) {
            Some(&slot) => self.components[slot] = component,
            None => {
                self.index.insert(id, self.components.len());
                self.components.push(component);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&SimComponent> {
        self.index.get(id).map(|&slot| &self.components[slot])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SimComponent> {
        match self.index.get(id) {
            Some(&slot) => self.components.get_mut(slot),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimComponent> {
        self.components.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SimComponent> {
        self.components.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

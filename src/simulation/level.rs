//! Level configuration: the pre-validated topology a run is built from

use anyhow::{Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::alert::AlertConfig;
use super::attribute::{AttributeConfig, Metric};
use super::component::{
    ComponentKind, ComponentRegistry, ComponentState, SimComponent, TrafficRoute,
};
use super::error::SimError;
use super::scheduled_job::ScheduledJob;
use super::status_effect::{EffectTarget, StatusEffect};
use super::traffic::{SimTraffic, TrafficConfig, TrafficRegistry, TrafficType};
use super::types::{ComponentId, TrafficId, DEFAULT_MAX_HISTORY};

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig {
    pub id: ComponentId,
    #[serde(default)]
    pub name: String,
    /// Physics, selected by the `type` field
    #[serde(flatten)]
    pub kind: ComponentKind,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeConfig>,
    /// Initial metric values
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub routes: Vec<TrafficRoute>,
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
}

impl ComponentConfig {
    pub fn build(&self, max_history: usize) -> SimComponent {
        let name = if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        };
        let mut state = ComponentState::new(self.id.clone(), name, max_history);
        for (key, attribute) in &self.attributes {
            state.insert_attribute(key.clone(), attribute);
        }
        for (key, value) in &self.metrics {
            state
                .metrics
                .insert(key.clone(), Metric::new(*value, max_history));
        }
        state.routes = self.routes.clone();
        state.alerts = self.alerts.clone();
        SimComponent::new(state, self.kind.clone())
    }
}

/// A complete level as handed over by the level validator
#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub traffics: Vec<TrafficConfig>,
    #[serde(default)]
    pub status_effects: Vec<StatusEffect>,
    #[serde(default)]
    pub scheduled_jobs: Vec<ScheduledJob>,
}

impl LevelConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse level JSON")
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Failed to parse level JSON")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read level file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Invalid level file {}", path.display()))
    }

    /// Structural checks the engine cannot run without
    pub fn check(&self) -> Result<(), SimError> {
        if self.components.is_empty() {
            return Err(SimError::EmptyLevel(self.id.clone()));
        }
        self.check_acyclic()
    }

    /// Ids of traffic-targeted effects that can never change a volume.
    ///
    /// Traffic effects scale injected volume only, so an effect aimed at an
    /// internal flow that no scheduled job emits has nothing to act on.
    pub fn inert_traffic_effects(&self) -> Vec<&str> {
        self.status_effects
            .iter()
            .filter(|effect| match &effect.target {
                EffectTarget::Traffic { traffic_id } => {
                    let external = self
                        .traffics
                        .iter()
                        .any(|t| &t.id == traffic_id && t.traffic_type == TrafficType::External);
                    let emitted = self
                        .scheduled_jobs
                        .iter()
                        .flat_map(|job| &job.emitted_traffic)
                        .any(|e| &e.traffic == traffic_id);
                    !external && !emitted
                }
                EffectTarget::Component { .. } => false,
            })
            .map(|effect| effect.id.as_str())
            .collect()
    }

    /// Component-to-component call graph; edges out of queues are left out
    /// because a queue decouples its producers from its consumers.
    pub fn dependency_graph(&self) -> DiGraph<ComponentId, TrafficId> {
        let mut graph = DiGraph::new();
        let nodes: HashMap<&ComponentId, NodeIndex> = self
            .components
            .iter()
            .map(|c| (&c.id, graph.add_node(c.id.clone())))
            .collect();
        let targets: HashMap<&TrafficId, &ComponentId> = self
            .traffics
            .iter()
            .map(|t| (&t.id, &t.target_component_id))
            .collect();

        for component in &self.components {
            if matches!(component.kind, ComponentKind::Queue(_)) {
                continue;
            }
            let from = nodes[&component.id];
            for route in &component.routes {
                for outgoing in &route.outgoing {
                    let Some(to) = targets.get(&outgoing.name).and_then(|t| nodes.get(t)) else {
                        continue;
                    };
                    graph.add_edge(from, *to, outgoing.name.clone());
                }
            }
        }
        graph
    }

    fn check_acyclic(&self) -> Result<(), SimError> {
        let graph = self.dependency_graph();
        toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| SimError::DependencyCycle(graph[cycle.node_id()].clone()))
    }

    pub fn build_components(&self) -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        for config in &self.components {
            registry.insert(config.build(self.max_history));
        }
        registry
    }

    pub fn build_traffics(&self) -> TrafficRegistry {
        let mut registry = TrafficRegistry::new();
        for config in &self.traffics {
            registry.insert(SimTraffic::from_config(config, self.max_history));
        }
        registry
    }
}

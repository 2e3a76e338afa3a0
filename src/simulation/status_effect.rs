//! Status effects: probabilistic or scripted incidents that modify a component
//! metric/attribute or a traffic volume while active.
//!
//! Lifecycle: `Dormant -> [Warning] -> Active -> (Dormant)`.

use log::info;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::attribute::AttributeField;
use super::types::{ComponentId, Modifier, TrafficId};

/// What an effect modifies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectTarget {
    /// A metric, or an attribute field, of one component
    Component {
        component_id: ComponentId,
        key: String,
        #[serde(default)]
        field: AttributeField,
    },
    /// The injected volume of a traffic flow
    Traffic { traffic_id: TrafficId },
}

/// Early-warning phase before an effect turns active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningConfig {
    pub delay_ticks: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EffectPhase {
    #[default]
    Dormant,
    Warning { remaining: u32 },
    /// `remaining` is `None` for permanent effects
    Active { remaining: Option<u32> },
}

/// Transition reported by [`StatusEffect::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectEvent {
    WarningStarted,
    Materialized,
    Resolved,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusEffect {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub target: EffectTarget,
    #[serde(default)]
    pub multiplier: f64,
    #[serde(default)]
    pub offset: f64,
    /// Chance per dormant tick of materializing
    #[serde(default)]
    pub materialization_probability: f64,
    /// Materialize exactly at this tick instead of rolling
    #[serde(default)]
    pub trigger_tick: Option<u64>,
    #[serde(default)]
    pub warning: Option<WarningConfig>,
    /// Ticks the effect stays active; permanent when absent
    #[serde(default)]
    pub resolution_ticks: Option<u32>,
    /// Whether a resolved effect may materialize again
    #[serde(default)]
    pub rearmable: bool,
    #[serde(skip)]
    phase: EffectPhase,
    #[serde(skip)]
    exhausted: bool,
}

impl StatusEffect {
    pub fn new(id: impl Into<String>, name: impl Into<String>, target: EffectTarget) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            target,
            multiplier: 0.0,
            offset: 0.0,
            materialization_probability: 0.0,
            trigger_tick: None,
            warning: None,
            resolution_ticks: None,
            rearmable: false,
            phase: EffectPhase::Dormant,
            exhausted: false,
        }
    }

    pub fn phase(&self) -> EffectPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, EffectPhase::Active { .. })
    }

    pub fn modifier(&self) -> Modifier {
        Modifier::new(self.multiplier, self.offset)
    }

    fn should_materialize(&self, tick: u64, rng: &mut StdRng) -> bool {
        if self.exhausted {
            return false;
        }
        match self.trigger_tick {
            Some(trigger) => trigger == tick,
            None => {
                let p = self.materialization_probability;
                p > 0.0 && rng.random_bool(p.min(1.0))
            }
        }
    }

    fn activate(&mut self) -> EffectEvent {
        self.phase = EffectPhase::Active {
            remaining: self.resolution_ticks,
        };
        info!("Status effect '{}' materialized", self.name);
        EffectEvent::Materialized
    }

    /// Move the lifecycle forward one tick
    pub fn advance(&mut self, tick: u64, rng: &mut StdRng) -> Option<EffectEvent> {
        match self.phase {
            EffectPhase::Dormant => {
                if !self.should_materialize(tick, rng) {
                    return None;
                }
                let delay = self.warning.as_ref().map_or(0, |w| w.delay_ticks);
                if delay == 0 {
                    return Some(self.activate());
                }
                self.phase = EffectPhase::Warning { remaining: delay };
                info!(
                    "Status effect '{}' warning, {} ticks until active",
                    self.name, delay
                );
                Some(EffectEvent::WarningStarted)
            }
            EffectPhase::Warning { remaining } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    Some(self.activate())
                } else {
                    self.phase = EffectPhase::Warning { remaining };
                    None
                }
            }
            EffectPhase::Active {
                remaining: Some(remaining),
            } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.phase = EffectPhase::Dormant;
                    self.exhausted = !self.rearmable;
                    info!("Status effect '{}' resolved", self.name);
                    Some(EffectEvent::Resolved)
                } else {
                    self.phase = EffectPhase::Active {
                        remaining: Some(remaining),
                    };
                    None
                }
            }
            EffectPhase::Active { remaining: None } => None,
        }
    }
}

/// Summed modifiers from every active effect, applied once per target
#[derive(Debug, Clone, Default)]
pub struct EffectModifiers {
    pub components: HashMap<(ComponentId, String, AttributeField), Modifier>,
    pub traffics: HashMap<TrafficId, Modifier>,
}

impl EffectModifiers {
    pub fn collect<'a>(effects: impl IntoIterator<Item = &'a StatusEffect>) -> Self {
        let mut modifiers = Self::default();
        for effect in effects.into_iter().filter(|e| e.is_active()) {
            match &effect.target {
                EffectTarget::Component {
                    component_id,
                    key,
                    field,
                } => modifiers
                    .components
                    .entry((component_id.clone(), key.clone(), *field))
                    .or_default()
                    .stack(effect.modifier()),
                EffectTarget::Traffic { traffic_id } => modifiers
                    .traffics
                    .entry(traffic_id.clone())
                    .or_default()
                    .stack(effect.modifier()),
            }
        }
        modifiers
    }

    pub fn for_traffic(&self, traffic: &TrafficId) -> Option<Modifier> {
        self.traffics.get(traffic).copied()
    }

    /// Modifiers aimed at one component, as (key, field, modifier)
    pub fn for_component<'a>(
        &'a self,
        component: &'a ComponentId,
    ) -> impl Iterator<Item = (&'a str, AttributeField, Modifier)> + 'a {
        self.components
            .iter()
            .filter(move |((id, _, _), _)| id == component)
            .map(|((_, key, field), modifier)| (key.as_str(), *field, *modifier))
    }

    /// Metric modifiers ignore the attribute field selector
    pub fn for_metric(&self, component: &ComponentId, metric: &str) -> Option<Modifier> {
        let mut total: Option<Modifier> = None;
        for ((id, key, _), modifier) in &self.components {
            if id == component && key == metric {
                total.get_or_insert_with(Modifier::default).stack(*modifier);
            }
        }
        total
    }
}

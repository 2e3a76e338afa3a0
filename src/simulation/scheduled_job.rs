//! Background jobs that fire on a fixed tick interval

use serde::{Deserialize, Serialize};

use super::attribute::AttributeField;
use super::component::SimComponent;
use super::types::{ComponentId, Modifier, TrafficId};

/// `new = max(0, base + base * multiplier + offset)` on one attribute field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMutation {
    pub attribute: String,
    /// Field read as the base and written back
    #[serde(default)]
    pub target: AttributeField,
    #[serde(default)]
    pub multiplier: f64,
    #[serde(default)]
    pub offset: f64,
}

impl AttributeMutation {
    pub fn apply(&self, base: f64) -> f64 {
        Modifier::new(self.multiplier, self.offset).apply(base).max(0.0)
    }
}

/// Traffic a job injects when it fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedTraffic {
    pub traffic: TrafficId,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub component_id: ComponentId,
    pub interval_ticks: u64,
    #[serde(default)]
    pub affected_attributes: Vec<AttributeMutation>,
    #[serde(default)]
    pub emitted_traffic: Vec<EmittedTraffic>,
}

impl ScheduledJob {
    pub fn is_due(&self, tick: u64) -> bool {
        tick > 0 && self.interval_ticks > 0 && tick % self.interval_ticks == 0
    }

    /// Apply every attribute mutation; attributes the component lacks are skipped
    pub fn mutate(&self, component: &mut SimComponent) -> usize {
        let mut applied = 0;
        for mutation in &self.affected_attributes {
            let Some(attribute) = component.state.attribute_mut(&mutation.attribute) else {
                continue;
            };
            let value = mutation.apply(attribute.field(mutation.target));
            attribute.write_field(mutation.target, value);
            applied += 1;
        }
        applied
    }
}

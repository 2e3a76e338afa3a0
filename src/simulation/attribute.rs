//! Attributes (player-scalable capacity knobs) and metrics (read-only telemetry)

use serde::{Deserialize, Serialize};

use super::types::{percentage, Modifier, RollingHistory};

/// Which field of an attribute a mutation or effect writes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeField {
    /// The capacity knob
    Limit,
    /// The computed usage
    #[default]
    Value,
}

/// Level-file shape of an attribute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttributeConfig {
    pub limit: f64,
    #[serde(default)]
    pub current: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub cost_per_unit: f64,
    /// Ticks a player change takes to propagate
    #[serde(default)]
    pub apply_delay: u32,
}

/// A bounded capacity attribute such as cpu, connections or storage
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    pub limit: f64,
    current: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub cost_per_unit: f64,
    pub apply_delay: u32,
    pub history: RollingHistory,
    /// Transient per-tick adjustments from status effects
    #[serde(skip)]
    limit_modifier: Modifier,
    #[serde(skip)]
    value_modifier: Modifier,
}

impl Attribute {
    pub fn new(limit: f64, current: f64) -> Self {
        Self {
            limit,
            current: current.max(0.0),
            min: None,
            max: None,
            cost_per_unit: 0.0,
            apply_delay: 0,
            history: RollingHistory::default(),
            limit_modifier: Modifier::default(),
            value_modifier: Modifier::default(),
        }
    }

    pub fn from_config(config: &AttributeConfig, max_history: usize) -> Self {
        let mut attribute = Self::new(config.limit, config.current);
        attribute.min = config.min;
        attribute.max = config.max;
        attribute.cost_per_unit = config.cost_per_unit;
        attribute.apply_delay = config.apply_delay;
        attribute.history = RollingHistory::with_capacity(max_history);
        attribute
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// Usage never goes negative
    pub fn set_current(&mut self, value: f64) {
        self.current = if value.is_finite() { value.max(0.0) } else { 0.0 };
    }

    pub fn effective_limit(&self) -> f64 {
        self.limit_modifier.apply(self.limit).max(0.0)
    }

    pub fn effective_current(&self) -> f64 {
        self.value_modifier.apply(self.current).max(0.0)
    }

    /// `current / limit * 100`, 0 when the limit is 0
    pub fn utilization(&self) -> f64 {
        percentage(self.effective_current(), self.effective_limit())
    }

    /// Set the capacity knob, honoring the configured bounds
    pub fn set_limit(&mut self, value: f64) {
        let mut limit = value.max(0.0);
        if let Some(min) = self.min {
            limit = limit.max(min);
        }
        if let Some(max) = self.max {
            limit = limit.min(max);
        }
        self.limit = limit;
    }

    pub fn field(&self, field: AttributeField) -> f64 {
        match field {
            AttributeField::Limit => self.limit,
            AttributeField::Value => self.current,
        }
    }

    /// Raw write used by scheduled jobs; bypasses min/max
    pub fn write_field(&mut self, field: AttributeField, value: f64) {
        match field {
            AttributeField::Limit => self.limit = value.max(0.0),
            AttributeField::Value => self.set_current(value),
        }
    }

    pub fn set_modifier(&mut self, field: AttributeField, modifier: Modifier) {
        match field {
            AttributeField::Limit => self.limit_modifier = modifier,
            AttributeField::Value => self.value_modifier = modifier,
        }
    }

    pub fn clear_modifiers(&mut self) {
        self.limit_modifier = Modifier::default();
        self.value_modifier = Modifier::default();
    }

    pub fn tick_cost(&self) -> f64 {
        self.limit * self.cost_per_unit
    }

    pub fn record_history(&mut self) {
        let sample = self.effective_current();
        self.history.push(sample);
    }
}

/// Telemetry value written by component physics
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    /// Displayed value after status effects
    pub value: f64,
    /// Value as produced by physics before status effects
    #[serde(skip)]
    base: f64,
    pub history: RollingHistory,
}

impl Metric {
    pub fn new(value: f64, max_history: usize) -> Self {
        Self {
            value,
            base: value,
            history: RollingHistory::with_capacity(max_history),
        }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set(&mut self, value: f64) {
        self.base = value;
        self.value = value;
    }

    /// Recompute the displayed value from the base, so effects never compound
    pub fn settle(&mut self, modifier: Option<Modifier>) {
        self.value = match modifier {
            Some(modifier) => modifier.apply(self.base),
            None => self.base,
        };
    }

    pub fn record_history(&mut self) {
        self.history.push(self.value);
    }
}

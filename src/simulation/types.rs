//! Core types for the incident simulation
//!
//! Identifier wrappers, the bounded history buffer, and the additive modifier
//! shared by status effects and scheduled jobs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;

/// Default number of samples kept by every history buffer
pub const DEFAULT_MAX_HISTORY: usize = 60;

/// Deepest recursive traffic resolution allowed before a flow is dropped
pub const MAX_TRAFFIC_DEPTH: usize = 64;

/// Tolerance used when flooring volumes so 99.99999 still counts as 100
const VOLUME_EPSILON: f64 = 1e-9;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a component in the level topology
    ComponentId
);

string_id!(
    /// Name of a traffic flow; routes refer to flows by this name
    TrafficId
);

/// A unique identifier for tickets, assigned in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

/// Fixed-capacity FIFO of samples; the oldest sample is evicted first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RollingHistory {
    #[serde(skip)]
    capacity: usize,
    samples: VecDeque<f64>,
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }
}

impl RollingHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Change the bound, evicting the oldest samples if the buffer shrinks
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }
}

/// Additive `base + base * multiplier + offset` adjustment.
///
/// Stacking adds multipliers and offsets together, so two effects never
/// compound multiplicatively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    #[serde(default)]
    pub multiplier: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Modifier {
    pub fn new(multiplier: f64, offset: f64) -> Self {
        Self { multiplier, offset }
    }

    pub fn stack(&mut self, other: Modifier) {
        self.multiplier += other.multiplier;
        self.offset += other.offset;
    }

    pub fn apply(&self, base: f64) -> f64 {
        base + base * self.multiplier + self.offset
    }
}

/// Round a volume down to whole requests
pub fn floor_volume(volume: f64) -> f64 {
    if volume <= 0.0 || !volume.is_finite() {
        return 0.0;
    }
    (volume + VOLUME_EPSILON).floor()
}

/// `part / whole * 100`, or 0 when the whole is not positive
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// `max(0, (demand - capacity) / demand)`, or 0 without demand
pub fn overload_failure_rate(demand: f64, capacity: f64) -> f64 {
    if demand <= 0.0 {
        return 0.0;
    }
    ((demand - capacity.max(0.0)) / demand).clamp(0.0, 1.0)
}

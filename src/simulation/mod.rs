//! Standalone incident-response simulation engine
//!
//! This module contains the tick loop, traffic resolution and component
//! physics. It has no rendering concerns and can be driven headless from
//! the console or from tests.

mod action;
mod alert;
mod attribute;
mod component;
mod error;
mod level;
mod notification;
mod resolver;
mod scheduled_job;
mod snapshot;
mod status_effect;
mod traffic;
mod types;
mod world;

// Re-export public types for external use
pub use action::{ActionQueue, PendingAction};
pub use alert::{
    evaluate_alerts, AlertConfig, AlertDirection, AlertSource, CriticalAlert, Ticket, TicketBook,
    TicketStatus,
};
pub use attribute::{Attribute, AttributeConfig, AttributeField, Metric};
pub use component::{
    ComponentKind, ComponentModel, ComponentRegistry, ComponentState, ComponentStatus,
    ComputeNode, DatabaseNode, ExternalApiNode, OutgoingTraffic, QueueNode, QueuePushReport,
    SecondaryResource, SimComponent, StorageNode, SyntheticAlert, TickAccumulator, TrafficRoute,
    ALERT_LARGE_FILL_RATE, ALERT_QUEUE_NEAR_FULL, DEFAULT_SATURATION_THRESHOLD,
    MAX_SATURATION_MULTIPLIER, METRIC_BACKLOG, METRIC_CONNECTIONS, METRIC_DROPPED,
    METRIC_EGRESS_FAILURES, METRIC_ERROR_RATE, METRIC_LATENCY, METRIC_THROUGHPUT,
};
pub use error::SimError;
pub use level::{ComponentConfig, LevelConfig};
pub use notification::{Notification, NotificationKind};
pub use resolver::{
    handle_traffic, push_queues, record_demand, reserve_queue_egress, TrafficContext,
    TrafficOutcome,
};
pub use scheduled_job::{AttributeMutation, EmittedTraffic, ScheduledJob};
pub use snapshot::{
    AttributeSnapshot, ComponentSnapshot, MetricSnapshot, Snapshot, TrafficSnapshot,
};
pub use status_effect::{
    EffectEvent, EffectModifiers, EffectPhase, EffectTarget, StatusEffect, WarningConfig,
};
pub use traffic::{SimTraffic, TrafficConfig, TrafficRegistry, TrafficTally, TrafficType};
pub use types::{
    floor_volume, overload_failure_rate, percentage, ComponentId, Modifier, RollingHistory,
    TicketId, TrafficId, DEFAULT_MAX_HISTORY, MAX_TRAFFIC_DEPTH,
};
pub use world::SimWorld;

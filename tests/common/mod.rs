#![allow(dead_code)]

use incident_sim::simulation::{LevelConfig, SimComponent, SimWorld};
use serde_json::{json, Value};

pub const TEST_SEED: u64 = 42;

/// Build a seeded world from an inline level
pub fn world_from(level: Value) -> SimWorld {
    let level = LevelConfig::from_value(level).expect("level should parse");
    SimWorld::from_level_with_seed(level, Some(TEST_SEED)).expect("level should load")
}

/// Wrap components and traffics in a minimal level
pub fn level(components: Value, traffics: Value) -> Value {
    json!({
        "id": "test",
        "name": "Test Level",
        "components": components,
        "traffics": traffics,
    })
}

pub fn external(id: &str, target: &str, value: f64) -> Value {
    json!({ "id": id, "type": "external", "target_component_id": target, "value": value })
}

pub fn internal(id: &str, target: &str) -> Value {
    json!({ "id": id, "type": "internal", "target_component_id": target })
}

/// A compute node with `cpu` requests per tick of capacity
pub fn compute(id: &str, cpu: f64, routes: Value) -> Value {
    json!({
        "id": id,
        "type": "compute",
        "attributes": { "cpu": { "limit": cpu } },
        "routes": routes,
    })
}

pub fn component<'a>(world: &'a SimWorld, id: &str) -> &'a SimComponent {
    world
        .component(id)
        .unwrap_or_else(|| panic!("missing component {}", id))
}

pub fn successful(world: &SimWorld, traffic: &str) -> f64 {
    world
        .traffic(traffic)
        .unwrap_or_else(|| panic!("missing traffic {}", traffic))
        .tally()
        .successful
}

pub fn sent(world: &SimWorld, traffic: &str) -> f64 {
    world
        .traffic(traffic)
        .unwrap_or_else(|| panic!("missing traffic {}", traffic))
        .tally()
        .sent
}

pub fn metric(world: &SimWorld, component_id: &str, name: &str) -> f64 {
    component(world, component_id)
        .state
        .metric_value(name)
        .unwrap_or_else(|| panic!("missing metric {}.{}", component_id, name))
}

pub fn attribute_current(world: &SimWorld, component_id: &str, name: &str) -> f64 {
    component(world, component_id)
        .state
        .attribute(name)
        .unwrap_or_else(|| panic!("missing attribute {}.{}", component_id, name))
        .current()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

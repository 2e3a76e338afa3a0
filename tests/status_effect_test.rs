mod common;

use common::*;
use incident_sim::simulation::{EffectPhase, NotificationKind, SimWorld};
use serde_json::{json, Value};

fn api_with_metric(effects: Value) -> SimWorld {
    let mut level = level(
        json!([{
            "id": "api",
            "type": "compute",
            "attributes": { "cpu": { "limit": 200 } },
            "metrics": { "requests_per_user": 100 }
        }]),
        json!([external("in", "api", 50.0)]),
    );
    level["status_effects"] = effects;
    world_from(level)
}

fn metric_effect(id: &str, multiplier: f64, offset: f64) -> Value {
    json!({
        "id": id,
        "name": id,
        "target": { "kind": "component", "component_id": "api", "key": "requests_per_user" },
        "multiplier": multiplier,
        "offset": offset,
        "trigger_tick": 1
    })
}

/// multiplier 3 on a base of 100 yields 400
#[test]
fn test_metric_effect_applies_additive_formula() {
    let mut world = api_with_metric(json!([metric_effect("surge", 3.0, 0.0)]));
    world.tick();

    assert_close(metric(&world, "api", "requests_per_user"), 400.0);
}

/// Simultaneous effects sum their multipliers and offsets
#[test]
fn test_effects_stack_additively() {
    let mut world = api_with_metric(json!([
        metric_effect("first", 0.5, 10.0),
        metric_effect("second", 1.0, 5.0)
    ]));
    world.tick();

    let value = metric(&world, "api", "requests_per_user");
    assert_close(value, 100.0 + 100.0 * 1.5 + 15.0);
    assert!((value - (100.0 * 1.5 * 2.0 + 15.0)).abs() > 1.0);
}

/// The metric base is kept, so an active effect never compounds across ticks
#[test]
fn test_metric_effect_does_not_compound() {
    let mut world = api_with_metric(json!([metric_effect("surge", 3.0, 0.0)]));
    world.advance(5);

    assert_close(metric(&world, "api", "requests_per_user"), 400.0);
}

#[test]
fn test_lifecycle_warning_active_resolved() {
    let mut effect = metric_effect("disk_failure", 1.0, 0.0);
    effect["trigger_tick"] = json!(2);
    effect["warning"] = json!({ "delay_ticks": 2, "title": "SMART errors on api disk" });
    effect["resolution_ticks"] = json!(3);
    let mut world = api_with_metric(json!([effect]));

    world.tick();
    assert_eq!(world.status_effects()[0].phase(), EffectPhase::Dormant);
    assert_close(metric(&world, "api", "requests_per_user"), 100.0);

    world.tick();
    assert_eq!(
        world.status_effects()[0].phase(),
        EffectPhase::Warning { remaining: 2 }
    );
    assert!(world
        .notifications()
        .iter()
        .any(|n| n.kind == NotificationKind::Warning));
    let ticket = world
        .tickets()
        .iter()
        .find(|t| t.alert_name == "disk_failure")
        .expect("warning should open a pre-incident ticket");
    assert_eq!(ticket.component_id.as_str(), "api");
    assert_eq!(ticket.title, "SMART errors on api disk");
    assert_close(metric(&world, "api", "requests_per_user"), 100.0);

    world.tick();
    assert_eq!(
        world.status_effects()[0].phase(),
        EffectPhase::Warning { remaining: 1 }
    );

    world.tick();
    assert!(world.status_effects()[0].is_active());
    assert!(world
        .notifications()
        .iter()
        .any(|n| n.kind == NotificationKind::Materialized));
    assert_close(metric(&world, "api", "requests_per_user"), 200.0);

    world.advance(2);
    assert!(world.status_effects()[0].is_active());

    world.tick();
    assert_eq!(world.status_effects()[0].phase(), EffectPhase::Dormant);
    assert!(world
        .notifications()
        .iter()
        .any(|n| n.kind == NotificationKind::Resolved));
    assert_close(metric(&world, "api", "requests_per_user"), 100.0);

    world.advance(10);
    assert_eq!(world.status_effects()[0].phase(), EffectPhase::Dormant);
}

/// Effects without a resolution duration stay active for good
#[test]
fn test_effect_without_resolution_is_permanent() {
    let mut world = api_with_metric(json!([metric_effect("leak", 0.1, 0.0)]));
    world.advance(50);

    assert!(world.status_effects()[0].is_active());
}

#[test]
fn test_probability_one_materializes_immediately() {
    let mut effect = metric_effect("flaky", 1.0, 0.0);
    effect.as_object_mut().expect("object").remove("trigger_tick");
    effect["materialization_probability"] = json!(1.0);
    let mut world = api_with_metric(json!([effect]));
    world.tick();

    assert!(world.status_effects()[0].is_active());
}

#[test]
fn test_probability_zero_never_materializes() {
    let mut effect = metric_effect("never", 1.0, 0.0);
    effect.as_object_mut().expect("object").remove("trigger_tick");
    let mut world = api_with_metric(json!([effect]));
    world.advance(100);

    assert_eq!(world.status_effects()[0].phase(), EffectPhase::Dormant);
}

#[test]
fn test_rearmable_effect_returns() {
    let make = |rearmable: bool| {
        let mut effect = metric_effect("blip", 1.0, 0.0);
        effect.as_object_mut().expect("object").remove("trigger_tick");
        effect["materialization_probability"] = json!(1.0);
        effect["resolution_ticks"] = json!(1);
        effect["rearmable"] = json!(rearmable);
        api_with_metric(json!([effect]))
    };

    let mut rearmable = make(true);
    let mut one_shot = make(false);
    rearmable.advance(2);
    one_shot.advance(2);
    assert_eq!(rearmable.status_effects()[0].phase(), EffectPhase::Dormant);
    assert_eq!(one_shot.status_effects()[0].phase(), EffectPhase::Dormant);

    rearmable.tick();
    one_shot.tick();
    assert!(rearmable.status_effects()[0].is_active());
    assert_eq!(one_shot.status_effects()[0].phase(), EffectPhase::Dormant);
}

/// Limit-field effects shrink capacity while active
#[test]
fn test_attribute_limit_effect_reduces_capacity() {
    let mut world = world_from({
        let mut level = level(
            json!([compute("api", 100.0, json!([]))]),
            json!([external("in", "api", 100.0)]),
        );
        level["status_effects"] = json!([{
            "id": "noisy_neighbour",
            "name": "Noisy neighbour",
            "target": { "kind": "component", "component_id": "api", "key": "cpu", "field": "limit" },
            "multiplier": -0.5,
            "trigger_tick": 1,
            "resolution_ticks": 2
        }]);
        level
    });

    world.tick();
    assert_close(successful(&world, "in"), 50.0);
    let cpu = component(&world, "api")
        .state
        .attribute("cpu")
        .expect("cpu attribute");
    assert_close(cpu.effective_limit(), 50.0);
    assert_close(cpu.limit, 100.0);

    world.advance(2);
    assert_close(successful(&world, "in"), 100.0);
}

/// Traffic effects scale the injected volume
#[test]
fn test_traffic_effect_scales_volume() {
    let mut world = world_from({
        let mut level = level(
            json!([compute("api", 200.0, json!([]))]),
            json!([external("in", "api", 50.0)]),
        );
        level["status_effects"] = json!([{
            "id": "viral",
            "name": "Viral post",
            "target": { "kind": "traffic", "traffic_id": "in" },
            "multiplier": 1.0,
            "trigger_tick": 1
        }]);
        level
    });
    world.tick();

    assert_close(sent(&world, "in"), 100.0);
    assert_close(world.traffic("in").expect("in").volume, 100.0);
}

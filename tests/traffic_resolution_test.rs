mod common;

use common::*;
use incident_sim::simulation::{METRIC_BACKLOG, METRIC_DROPPED, METRIC_ERROR_RATE, METRIC_LATENCY};
use serde_json::json;

/// Two flows of 100 into a compute node with capacity 100 split it evenly
#[test]
fn test_compute_overload_splits_capacity_evenly() {
    let mut world = world_from(level(
        json!([compute("api", 100.0, json!([]))]),
        json!([external("a", "api", 100.0), external("b", "api", 100.0)]),
    ));
    world.tick();

    assert_close(component(&world, "api").failure_rate(200.0), 0.5);
    assert_close(successful(&world, "a"), 50.0);
    assert_close(successful(&world, "b"), 50.0);
    assert_close(metric(&world, "api", METRIC_ERROR_RATE), 50.0);
}

/// Every flow into an overloaded component degrades by the same fraction,
/// whatever order the flows are resolved in
#[test]
fn test_fairness_is_independent_of_resolution_order() {
    let flows = [("small", 40.0), ("medium", 60.0), ("large", 100.0)];
    let forward: Vec<_> = flows
        .iter()
        .map(|(id, v)| external(id, "api", *v))
        .collect();
    let reversed: Vec<_> = forward.iter().rev().cloned().collect();

    let mut first = world_from(level(
        json!([compute("api", 100.0, json!([]))]),
        json!(forward),
    ));
    let mut second = world_from(level(
        json!([compute("api", 100.0, json!([]))]),
        json!(reversed),
    ));
    first.tick();
    second.tick();

    for (id, volume) in flows {
        assert_close(successful(&first, id), volume * 0.5);
        assert_close(successful(&second, id), volume * 0.5);
    }
}

/// Bounded-buffer admission: limit 20, egress 10, 50 arriving
#[test]
fn test_queue_admission_and_push() {
    let mut world = world_from(level(
        json!([
            {
                "id": "jobs",
                "type": "queue",
                "attributes": {
                    "backlog": { "limit": 20 },
                    "egress_rate": { "limit": 10 }
                },
                "routes": [{ "incoming": "enqueue", "outgoing": [{ "name": "drain" }] }]
            },
            compute("worker", 100.0, json!([]))
        ]),
        json!([external("enqueue", "jobs", 50.0), internal("drain", "worker")]),
    ));

    let queue = component(&world, "jobs");
    let node = queue.as_queue().expect("jobs is a queue");
    assert_close(node.available_space(&queue.state, 50.0), 30.0);
    assert_close(queue.failure_rate(50.0), 0.4);

    world.tick();

    let report = component(&world, "jobs")
        .as_queue()
        .expect("jobs is a queue")
        .last_push();
    assert_close(report.accepted_ingress, 30.0);
    assert_close(report.attempted_push, 10.0);
    assert_close(report.successful_outgoing, 10.0);
    assert_close(report.backlog, 20.0);
    assert_close(metric(&world, "jobs", METRIC_BACKLOG), 20.0);
    assert_close(metric(&world, "jobs", METRIC_DROPPED), 20.0);
    assert_close(successful(&world, "drain"), 10.0);
}

/// The backlog only loses what consumers actually took
#[test]
fn test_queue_conservation_over_many_ticks() {
    let mut world = world_from(level(
        json!([
            {
                "id": "jobs",
                "type": "queue",
                "attributes": {
                    "backlog": { "limit": 50 },
                    "egress_rate": { "limit": 20 }
                },
                "routes": [{ "incoming": "enqueue", "outgoing": [{ "name": "drain" }] }]
            },
            compute("worker", 12.0, json!([]))
        ]),
        json!([
            { "id": "enqueue", "type": "external", "target_component_id": "jobs", "value": 30, "variance": 15 },
            internal("drain", "worker")
        ]),
    ));

    for _ in 0..25 {
        let old = attribute_current(&world, "jobs", "backlog");
        world.tick();
        let report = component(&world, "jobs")
            .as_queue()
            .expect("jobs is a queue")
            .last_push();

        assert!(report.successful_outgoing <= report.attempted_push + 1e-9);
        assert!(report.attempted_push <= 20.0_f64.min(old + report.accepted_ingress) + 1e-9);
        let expected = (old + report.accepted_ingress - report.successful_outgoing).clamp(0.0, 50.0);
        assert_close(report.backlog, expected);
        assert_close(attribute_current(&world, "jobs", "backlog"), expected);
        assert!(report.successful_outgoing <= 12.0 + 1e-9);
        assert_close(
            report.egress_failures,
            report.attempted_push - report.successful_outgoing,
        );
    }
}

/// Queues absorb demand, so a consumer sees the egress reservation only
#[test]
fn test_queue_reserves_egress_on_consumers() {
    let mut world = world_from(level(
        json!([
            {
                "id": "jobs",
                "type": "queue",
                "attributes": {
                    "backlog": { "limit": 1000 },
                    "egress_rate": { "limit": 15 }
                },
                "routes": [{ "incoming": "enqueue", "outgoing": [{ "name": "drain", "multiplier": 2 }] }]
            },
            compute("worker", 100.0, json!([]))
        ]),
        json!([external("enqueue", "jobs", 500.0), internal("drain", "worker")]),
    ));
    world.tick();

    let worker = component(&world, "worker");
    assert_close(worker.state.accumulator.expected_volume, 30.0);
    assert_close(successful(&world, "drain"), 30.0);
    assert_close(
        component(&world, "jobs")
            .as_queue()
            .expect("jobs is a queue")
            .last_push()
            .successful_outgoing,
        15.0,
    );
}

#[test]
fn test_database_connection_overload() {
    let mut world = world_from(level(
        json!([{
            "id": "db",
            "type": "database",
            "attributes": { "connections": { "limit": 100 } }
        }]),
        json!([external("queries", "db", 150.0)]),
    ));
    assert_close(component(&world, "db").failure_rate(150.0), 1.0 / 3.0);

    world.tick();

    assert_close(successful(&world, "queries"), 100.0);
    assert!((metric(&world, "db", METRIC_ERROR_RATE) - 33.333).abs() < 0.01);
    assert_close(attribute_current(&world, "db", "connections"), 100.0);
}

/// Pool contention multiplies latency by a flat penalty
#[test]
fn test_database_contention_penalty() {
    let mut world = world_from(level(
        json!([{
            "id": "db",
            "type": "database",
            "attributes": { "connections": { "limit": 100 } }
        }]),
        json!([external("queries", "db", 95.0)]),
    ));
    world.tick();

    // (5 + 95 * 0.05) * 4
    assert_close(metric(&world, "db", METRIC_LATENCY), 39.0);
}

/// A storage node that fills on tick N starts failing on tick N + 1
#[test]
fn test_storage_cliff_lags_one_tick() {
    let mut world = world_from(level(
        json!([{
            "id": "disk",
            "type": "storage",
            "attributes": { "storage": { "limit": 100, "current": 90 } }
        }]),
        json!([external("writes", "disk", 10.0)]),
    ));

    world.tick();
    assert_close(successful(&world, "writes"), 10.0);
    assert_close(attribute_current(&world, "disk", "storage"), 100.0);

    world.tick();
    assert_close(successful(&world, "writes"), 0.0);
    assert_close(metric(&world, "disk", METRIC_ERROR_RATE), 100.0);
    assert_close(attribute_current(&world, "disk", "storage"), 100.0);
}

#[test]
fn test_external_api_quota_and_flat_latency() {
    let mut world = world_from(level(
        json!([{
            "id": "payments",
            "type": "external_api",
            "base_latency": 100,
            "latency_noise": 0,
            "attributes": { "quota": { "limit": 60 } }
        }]),
        json!([external("charge", "payments", 100.0)]),
    ));
    world.tick();

    assert_close(successful(&world, "charge"), 60.0);
    assert_close(metric(&world, "payments", METRIC_LATENCY), 100.0);
}

/// Above the saturation threshold latency grows by 1 + (excess * factor)^2
#[test]
fn test_compute_saturation_latency() {
    let mut world = world_from(level(
        json!([compute("api", 100.0, json!([]))]),
        json!([external("in", "api", 90.0)]),
    ));
    world.tick();

    // (10 + 90 * 0.01) * (1 + (10 * 0.1)^2)
    assert_close(metric(&world, "api", METRIC_LATENCY), 21.8);
}

/// Once a route's success reaches zero, later dependencies get nothing
#[test]
fn test_failed_dependency_short_circuits_route() {
    let mut world = world_from(level(
        json!([
            compute(
                "front",
                100.0,
                json!([{ "incoming": "in", "outgoing": [{ "name": "dead" }, { "name": "later" }] }])
            ),
            compute("broken", 0.0, json!([])),
            compute("backend", 100.0, json!([]))
        ]),
        json!([
            external("in", "front", 10.0),
            internal("dead", "broken"),
            internal("later", "backend")
        ]),
    ));
    world.tick();

    assert_close(successful(&world, "in"), 0.0);
    assert_close(sent(&world, "later"), 0.0);
    let backend = component(&world, "backend");
    assert_close(backend.state.accumulator.expected_volume, 10.0);
    assert_close(backend.state.accumulator.incoming_volume, 0.0);
}

/// Dependency results are converted back to parent units through the multiplier
#[test]
fn test_dependency_multiplier_clamps_parent_success() {
    let mut world = world_from(level(
        json!([
            compute(
                "front",
                100.0,
                json!([{ "incoming": "in", "outgoing": [{ "name": "lookups", "multiplier": 3 }] }])
            ),
            {
                "id": "db",
                "type": "database",
                "attributes": { "connections": { "limit": 60 } }
            }
        ]),
        json!([external("in", "front", 40.0), internal("lookups", "db")]),
    ));
    world.tick();

    // 120 lookups against 60 connections: 60 succeed, 20 parent requests
    assert_close(sent(&world, "lookups"), 120.0);
    assert_close(successful(&world, "lookups"), 60.0);
    assert_close(successful(&world, "in"), 20.0);
}

/// An unregistered traffic name passes through; a registered one with no
/// target component swallows everything
#[test]
fn test_missing_traffic_passes_through_but_missing_target_drops() {
    let mut world = world_from(level(
        json!([
            compute(
                "open",
                100.0,
                json!([{ "incoming": "a", "outgoing": [{ "name": "ghost" }] }])
            ),
            compute(
                "closed",
                100.0,
                json!([{ "incoming": "b", "outgoing": [{ "name": "void" }] }])
            )
        ]),
        json!([
            external("a", "open", 10.0),
            external("b", "closed", 10.0),
            internal("void", "nowhere")
        ]),
    ));
    world.tick();

    assert_close(successful(&world, "a"), 10.0);
    assert_close(successful(&world, "b"), 0.0);
    assert_close(sent(&world, "void"), 10.0);
    assert_close(successful(&world, "void"), 0.0);
}

/// Job-emitted traffic goes through both passes alongside regular flows
#[test]
fn test_job_traffic_competes_fairly() {
    let mut level = level(
        json!([{
            "id": "db",
            "type": "database",
            "attributes": { "connections": { "limit": 100 } }
        }]),
        json!([external("reads", "db", 100.0), internal("batch", "db")]),
    );
    level["scheduled_jobs"] = json!([{
        "id": "export",
        "component_id": "db",
        "interval_ticks": 2,
        "emitted_traffic": [{ "traffic": "batch", "volume": 100 }]
    }]);
    let mut world = world_from(level);

    world.tick();
    assert_close(successful(&world, "reads"), 100.0);
    assert_close(sent(&world, "batch"), 0.0);

    world.tick();
    assert_close(successful(&world, "reads"), 50.0);
    assert_close(successful(&world, "batch"), 50.0);
}

/// Flows too small to yield a whole request still get their fair share
#[test]
fn test_fairness_holds_for_fractional_shares() {
    let mut world = world_from(level(
        json!([compute("api", 100.0, json!([]))]),
        json!([external("tiny", "api", 1.0), external("big", "api", 149.0)]),
    ));
    world.tick();

    assert_close(successful(&world, "tiny"), 2.0 / 3.0);
    assert_close(successful(&world, "big"), 149.0 * 2.0 / 3.0);
    assert_close(
        successful(&world, "tiny") + successful(&world, "big"),
        100.0,
    );

    let mut crowded = world_from(level(
        json!([compute("api", 2.0, json!([]))]),
        json!([
            external("a", "api", 1.0),
            external("b", "api", 1.0),
            external("c", "api", 1.0)
        ]),
    ));
    crowded.tick();

    for id in ["a", "b", "c"] {
        assert_close(successful(&crowded, id), 2.0 / 3.0);
    }
    assert_close(
        component(&crowded, "api").state.accumulator.successful_count,
        2.0,
    );
}

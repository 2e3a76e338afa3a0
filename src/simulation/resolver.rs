//! Two-pass traffic resolution across the component graph.
//!
//! Pass 1 ([`record_demand`]) walks every flow and totals the demand each
//! component will see this tick. Pass 2 ([`handle_traffic`]) then resolves the
//! same flows, deriving each component's failure rate from its pass-1 total so
//! every flow into a component degrades by the same fraction regardless of the
//! order flows are resolved in. Pass 1 must finish for the whole graph before
//! the first pass-2 call.

use log::{debug, warn};
use rand::rngs::StdRng;

use super::component::ComponentRegistry;
use super::traffic::TrafficRegistry;
use super::types::{floor_volume, ComponentId, MAX_TRAFFIC_DEPTH};

/// Result of resolving a volume of one flow
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficOutcome {
    pub successful_volume: f64,
    pub average_latency: f64,
}

impl TrafficOutcome {
    fn pass_through(volume: f64) -> Self {
        Self {
            successful_volume: volume,
            average_latency: 0.0,
        }
    }

    fn black_hole() -> Self {
        Self::default()
    }
}

/// Lookups shared by every recursive resolver call
pub struct TrafficContext<'a> {
    pub components: &'a mut ComponentRegistry,
    pub traffics: &'a mut TrafficRegistry,
    pub rng: &'a mut StdRng,
    depth: usize,
}

impl<'a> TrafficContext<'a> {
    pub fn new(
        components: &'a mut ComponentRegistry,
        traffics: &'a mut TrafficRegistry,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            components,
            traffics,
            rng,
            depth: 0,
        }
    }
}

/// Pass 1: add `volume` to the target's demand and forward it along the route.
///
/// Unknown flows are ignored. Decoupling boundaries keep the demand.
pub fn record_demand(ctx: &mut TrafficContext<'_>, traffic: &str, volume: f64) {
    if ctx.depth >= MAX_TRAFFIC_DEPTH {
        warn!("Demand for '{}' exceeded traversal depth {}", traffic, MAX_TRAFFIC_DEPTH);
        return;
    }
    let Some(target) = ctx.traffics.target_of(traffic).cloned() else {
        debug!("No traffic registered as '{}', demand ignored", traffic);
        return;
    };
    let Some(component) = ctx.components.get_mut(target.as_str()) else {
        return;
    };

    component.state.accumulator.expected_volume += volume;
    if !component.forwards_demand() {
        return;
    }
    let outgoing = match component.state.route_for(traffic) {
        Some(route) => route.outgoing.clone(),
        None => return,
    };

    ctx.depth += 1;
    for dependency in &outgoing {
        record_demand(ctx, dependency.name.as_str(), volume * dependency.multiplier);
    }
    ctx.depth -= 1;
}

/// Pass 2: resolve `volume` of a flow, walking the route's dependencies in order.
///
/// Tentative success is not rounded, so a flow of one request into a component
/// failing a third of its demand still succeeds two thirds of a request. Only
/// the conversion back from dependency units is floored.
///
/// A flow nobody registered passes through untouched, while a registered flow
/// whose target component is missing swallows everything.
pub fn handle_traffic(ctx: &mut TrafficContext<'_>, traffic: &str, volume: f64) -> TrafficOutcome {
    if volume <= 0.0 {
        return TrafficOutcome::default();
    }
    if ctx.depth >= MAX_TRAFFIC_DEPTH {
        warn!("Traffic '{}' exceeded traversal depth {}, dropped", traffic, MAX_TRAFFIC_DEPTH);
        return TrafficOutcome::black_hole();
    }
    let Some(target) = ctx.traffics.target_of(traffic).cloned() else {
        warn!("No traffic registered as '{}', passing {} through", traffic, volume);
        return TrafficOutcome::pass_through(volume);
    };

    let Some(component) = ctx.components.get(target.as_str()) else {
        warn!("Traffic '{}' targets missing component '{}', dropped", traffic, target);
        if let Some(flow) = ctx.traffics.get_mut(traffic) {
            flow.record(volume, 0.0, 0.0);
        }
        return TrafficOutcome::black_hole();
    };

    let demand = component.state.accumulator.expected_volume.max(volume);
    let failure_rate = component.failure_rate(demand);
    let mut successful = volume * (1.0 - failure_rate);
    let route = component.state.route_for(traffic).cloned();
    let route_latency = route.as_ref().and_then(|r| r.base_latency);
    let local_latency = component.local_latency(route_latency, volume, ctx.rng);
    let dependencies = match (&route, component.forwards_demand()) {
        (Some(route), true) => route.outgoing.clone(),
        _ => Vec::new(),
    };
    debug!(
        "{} <- {} x{}: failure rate {:.3}, tentative success {:.3}",
        target, traffic, volume, failure_rate, successful
    );

    let mut dependency_latency = 0.0;
    ctx.depth += 1;
    for dependency in &dependencies {
        if successful <= 0.0 {
            debug!("{} short-circuited before '{}'", target, dependency.name);
            break;
        }
        if dependency.multiplier <= 0.0 {
            continue;
        }
        let outcome = handle_traffic(
            ctx,
            dependency.name.as_str(),
            successful * dependency.multiplier,
        );
        let parent_equivalent = floor_volume(outcome.successful_volume / dependency.multiplier);
        successful = successful.min(parent_equivalent);
        dependency_latency += outcome.average_latency * dependency.multiplier;
    }
    ctx.depth -= 1;

    let latency = local_latency + dependency_latency;
    settle(ctx, &target, traffic, volume, successful, latency);
    TrafficOutcome {
        successful_volume: successful,
        average_latency: latency,
    }
}

fn settle(
    ctx: &mut TrafficContext<'_>,
    target: &ComponentId,
    traffic: &str,
    volume: f64,
    successful: f64,
    latency: f64,
) {
    if let Some(component) = ctx.components.get_mut(target.as_str()) {
        component
            .state
            .accumulator
            .record(volume, successful, latency);
    }
    if let Some(flow) = ctx.traffics.get_mut(traffic) {
        flow.record(volume, successful, latency);
    }
}

/// Before pass 1: every queue reserves its full egress rate on each consumer.
pub fn reserve_queue_egress(ctx: &mut TrafficContext<'_>) {
    for queue_id in queue_ids(ctx.components) {
        let Some(component) = ctx.components.get(queue_id.as_str()) else {
            continue;
        };
        let Some(queue) = component.as_queue() else {
            continue;
        };
        let egress = queue.egress_limit(&component.state);
        let downstream = component.state.downstream();
        for consumer in &downstream {
            record_demand(ctx, consumer.name.as_str(), egress * consumer.multiplier);
        }
    }
}

/// After pass 2: every queue pushes to all consumers and settles its backlog.
pub fn push_queues(ctx: &mut TrafficContext<'_>) {
    for queue_id in queue_ids(ctx.components) {
        let Some(component) = ctx.components.get(queue_id.as_str()) else {
            continue;
        };
        let Some(queue) = component.as_queue() else {
            continue;
        };
        let attempted = queue.attempted_push(&component.state);
        let downstream = component.state.downstream();

        let mut delivered: Option<f64> = None;
        for consumer in &downstream {
            if consumer.multiplier <= 0.0 {
                continue;
            }
            let outcome = handle_traffic(ctx, consumer.name.as_str(), attempted * consumer.multiplier);
            let equivalent = floor_volume(outcome.successful_volume / consumer.multiplier);
            delivered = Some(delivered.map_or(equivalent, |d| d.min(equivalent)));
        }
        // a queue with no consumers never drains
        let successful = delivered.unwrap_or(0.0).min(attempted);

        let report = ctx
            .components
            .get_mut(queue_id.as_str())
            .and_then(|c| c.complete_queue_push(attempted, successful));
        if let Some(report) = report {
            debug!(
                "{} pushed {}/{} (backlog {})",
                queue_id, report.successful_outgoing, report.attempted_push, report.backlog
            );
        }
    }
}

fn queue_ids(components: &ComponentRegistry) -> Vec<ComponentId> {
    components
        .iter()
        .filter(|c| c.as_queue().is_some())
        .map(|c| c.id().clone())
        .collect()
}

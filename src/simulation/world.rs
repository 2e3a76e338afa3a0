//! Main simulation world that ties everything together
//!
//! `SimWorld::tick` sequences one simulated second: player actions, status
//! effects, scheduled jobs, the two traffic passes, queue pushes, metric
//! finalization and ticket generation. A tick runs to completion before any
//! caller can observe the world again.

use anyhow::Result;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::action::{ActionQueue, PendingAction};
use super::alert::{evaluate_alerts, Ticket, TicketBook, TicketStatus};
use super::component::{ComponentRegistry, SimComponent};
use super::error::SimError;
use super::level::LevelConfig;
use super::notification::{Notification, NotificationKind};
use super::resolver::{self, TrafficContext};
use super::scheduled_job::ScheduledJob;
use super::snapshot::Snapshot;
use super::status_effect::{EffectEvent, EffectModifiers, EffectTarget, StatusEffect};
use super::traffic::{SimTraffic, TrafficRegistry};
use super::types::{floor_volume, ComponentId, TicketId, TrafficId};

/// The running simulation for one level
pub struct SimWorld {
    level_id: String,
    level_name: String,
    tick: u64,
    components: ComponentRegistry,
    traffics: TrafficRegistry,
    effects: Vec<StatusEffect>,
    jobs: Vec<ScheduledJob>,
    tickets: TicketBook,
    actions: ActionQueue,
    notifications: Vec<Notification>,
    total_cost: f64,
    rng: StdRng,
}

impl SimWorld {
    fn new_internal(level: LevelConfig, rng: StdRng) -> Result<Self> {
        level.check()?;
        for effect_id in level.inert_traffic_effects() {
            warn!(
                "Status effect '{}' targets a flow that is never injected; it will have no effect",
                effect_id
            );
        }
        let world = Self {
            components: level.build_components(),
            traffics: level.build_traffics(),
            effects: level.status_effects,
            jobs: level.scheduled_jobs,
            level_id: level.id,
            level_name: level.name,
            tick: 0,
            tickets: TicketBook::new(),
            actions: ActionQueue::new(),
            notifications: Vec::new(),
            total_cost: 0.0,
            rng,
        };
        info!(
            "Loaded level '{}' with {} components and {} traffics",
            world.level_id,
            world.components.len(),
            world.traffics.len()
        );
        Ok(world)
    }

    /// Build a world from a level, seeded by the level's seed when it has one
    pub fn from_level(level: LevelConfig) -> Result<Self> {
        let seed = level.seed;
        Self::from_level_with_seed(level, seed)
    }

    /// Build a world, overriding the level seed; `None` seeds from the OS
    pub fn from_level_with_seed(level: LevelConfig, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new_internal(level, rng)
    }

    /// Discard all state and start the given level from tick 0
    pub fn load_level(&mut self, level: LevelConfig) -> Result<()> {
        *self = Self::from_level(level)?;
        Ok(())
    }

    pub fn level_id(&self) -> &str {
        &self.level_id
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn component(&self, id: &str) -> Option<&SimComponent> {
        self.components.get(id)
    }

    pub fn components(&self) -> impl Iterator<Item = &SimComponent> {
        self.components.iter()
    }

    pub fn traffic(&self, id: &str) -> Option<&SimTraffic> {
        self.traffics.get(id)
    }

    pub fn traffics(&self) -> impl Iterator<Item = &SimTraffic> {
        self.traffics.iter()
    }

    pub fn status_effects(&self) -> &[StatusEffect] {
        &self.effects
    }

    pub fn tickets(&self) -> &[Ticket] {
        self.tickets.all()
    }

    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(id)
    }

    pub fn open_tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.unresolved()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn pending_actions(&self) -> &[PendingAction] {
        self.actions.pending()
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Queue a change to an attribute's limit.
    ///
    /// The change lands after `delay_ticks` ticks, or the attribute's own
    /// apply delay when none is given.
    pub fn queue_action(
        &mut self,
        component_id: &str,
        attribute_id: &str,
        new_value: f64,
        delay_ticks: Option<u32>,
    ) -> Result<(), SimError> {
        let component = self
            .components
            .get(component_id)
            .ok_or_else(|| SimError::UnknownComponent(component_id.into()))?;
        let attribute = component.state.attribute(attribute_id).ok_or_else(|| {
            SimError::UnknownAttribute {
                component: component_id.into(),
                attribute: attribute_id.to_string(),
            }
        })?;
        let remaining_ticks = delay_ticks.unwrap_or(attribute.apply_delay);
        debug!(
            "Queued {}.{} -> {} in {} ticks",
            component_id, attribute_id, new_value, remaining_ticks
        );
        self.actions.push(PendingAction {
            component_id: component_id.into(),
            attribute_id: attribute_id.to_string(),
            new_value,
            remaining_ticks,
        });
        Ok(())
    }

    /// Set a ticket's status on behalf of the player
    pub fn set_ticket_status(&mut self, id: TicketId, status: TicketStatus) -> Result<(), SimError> {
        self.tickets.set_status(id, status, self.tick)
    }

    /// Run `ticks` ticks back to back
    pub fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Main simulation tick
    pub fn tick(&mut self) {
        self.tick += 1;
        self.notifications.clear();

        self.apply_due_actions();
        self.advance_status_effects();
        let modifiers = EffectModifiers::collect(&self.effects);
        let due_jobs: Vec<usize> = (0..self.jobs.len())
            .filter(|&i| self.jobs[i].is_due(self.tick))
            .collect();

        for component in self.components.iter_mut() {
            component.state.begin_tick();
        }
        for traffic in self.traffics.iter_mut() {
            traffic.begin_tick();
        }
        self.run_job_mutations(&due_jobs);
        self.apply_attribute_effects(&modifiers);
        let injections = self.prepare_injections(&due_jobs, &modifiers);

        {
            let mut ctx =
                TrafficContext::new(&mut self.components, &mut self.traffics, &mut self.rng);
            resolver::reserve_queue_egress(&mut ctx);
            for (traffic, volume) in &injections {
                resolver::record_demand(&mut ctx, traffic.as_str(), *volume);
            }
            for (traffic, volume) in &injections {
                resolver::handle_traffic(&mut ctx, traffic.as_str(), *volume);
            }
            resolver::push_queues(&mut ctx);
        }

        self.finish_components(&modifiers);
        for traffic in self.traffics.iter_mut() {
            traffic.finish_tick();
        }
        self.raise_tickets();
        self.accrue_cost();

        debug!(
            "Tick {} done: {} open tickets, {} notifications",
            self.tick,
            self.tickets.unresolved().count(),
            self.notifications.len()
        );
    }

    /// Produce a read-only view of the world as of the last completed tick
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            level_id: self.level_id.clone(),
            tick: self.tick,
            total_cost: self.total_cost,
            components: self.components.iter().map(Into::into).collect(),
            traffics: self.traffics.iter().map(Into::into).collect(),
            tickets: self.tickets.all().to_vec(),
            pending_actions: self.actions.pending().to_vec(),
            notifications: self.notifications.clone(),
        }
    }

    fn notify(&mut self, kind: NotificationKind, component_id: Option<ComponentId>, message: String) {
        self.notifications.push(Notification {
            tick: self.tick,
            kind,
            component_id,
            message,
        });
    }

    fn apply_due_actions(&mut self) {
        if self.actions.is_empty() {
            return;
        }
        for action in self.actions.advance() {
            let Some(component) = self.components.get_mut(action.component_id.as_str()) else {
                warn!("Dropping action for missing component {}", action.component_id);
                continue;
            };
            let Some(attribute) = component.state.attribute_mut(&action.attribute_id) else {
                warn!(
                    "Dropping action for missing attribute {}.{}",
                    action.component_id, action.attribute_id
                );
                continue;
            };
            attribute.set_limit(action.new_value);
            let limit = attribute.limit;
            info!(
                "Applied {}.{} limit -> {}",
                action.component_id, action.attribute_id, limit
            );
            self.notify(
                NotificationKind::ActionApplied,
                Some(action.component_id.clone()),
                format!("{} limit is now {}", action.attribute_id, limit),
            );
        }
    }

    /// The component an effect is reported against
    fn effect_component(&self, target: &EffectTarget) -> Option<ComponentId> {
        match target {
            EffectTarget::Component { component_id, .. } => Some(component_id.clone()),
            EffectTarget::Traffic { traffic_id } => {
                self.traffics.target_of(traffic_id.as_str()).cloned()
            }
        }
    }

    fn advance_status_effects(&mut self) {
        let tick = self.tick;
        let mut events = Vec::new();
        for (index, effect) in self.effects.iter_mut().enumerate() {
            if let Some(event) = effect.advance(tick, &mut self.rng) {
                events.push((index, event));
            }
        }

        for (index, event) in events {
            let effect = &self.effects[index];
            let component_id = self.effect_component(&effect.target);
            let name = effect.name.clone();
            match event {
                EffectEvent::WarningStarted => {
                    let warning = effect.warning.clone();
                    let title = warning
                        .as_ref()
                        .and_then(|w| w.title.clone())
                        .unwrap_or_else(|| format!("Early warning: {}", name));
                    let description = warning
                        .as_ref()
                        .and_then(|w| w.description.clone())
                        .unwrap_or_else(|| effect.description.clone());
                    let effect_id = effect.id.clone();
                    if let Some(component_id) = &component_id {
                        self.tickets
                            .open_if_absent(component_id, &effect_id, &title, &description, tick);
                    }
                    self.notify(NotificationKind::Warning, component_id, title);
                }
                EffectEvent::Materialized => {
                    self.notify(
                        NotificationKind::Materialized,
                        component_id,
                        format!("{} has materialized", name),
                    );
                }
                EffectEvent::Resolved => {
                    self.notify(
                        NotificationKind::Resolved,
                        component_id,
                        format!("{} has subsided", name),
                    );
                }
            }
        }
    }

    fn run_job_mutations(&mut self, due_jobs: &[usize]) {
        for &index in due_jobs {
            let job = &self.jobs[index];
            let Some(component) = self.components.get_mut(job.component_id.as_str()) else {
                warn!("Job '{}' targets missing component {}", job.id, job.component_id);
                continue;
            };
            let applied = job.mutate(component);
            let label = if job.name.is_empty() { job.id.clone() } else { job.name.clone() };
            let component_id = job.component_id.clone();
            info!("Job '{}' fired on {} ({} mutations)", label, component_id, applied);
            self.notify(
                NotificationKind::JobFired,
                Some(component_id),
                format!("{} ran", label),
            );
        }
    }

    fn apply_attribute_effects(&mut self, modifiers: &EffectModifiers) {
        for component in self.components.iter_mut() {
            let id = component.state.id.clone();
            for (key, field, modifier) in modifiers.for_component(&id) {
                if let Some(attribute) = component.state.attributes.get_mut(key) {
                    attribute.set_modifier(field, modifier);
                }
            }
        }
    }

    /// External flows plus job emissions, each with this tick's volume
    fn prepare_injections(
        &mut self,
        due_jobs: &[usize],
        modifiers: &EffectModifiers,
    ) -> Vec<(TrafficId, f64)> {
        let mut injections = Vec::new();
        for traffic in self.traffics.iter_mut().filter(|t| t.is_external()) {
            let mut volume = traffic.sample_volume(&mut self.rng);
            if let Some(modifier) = modifiers.for_traffic(&traffic.id) {
                volume = floor_volume(modifier.apply(volume));
            }
            traffic.volume = volume;
            injections.push((traffic.id.clone(), volume));
        }

        for &index in due_jobs {
            for emitted in &self.jobs[index].emitted_traffic {
                let mut volume = emitted.volume;
                if let Some(modifier) = modifiers.for_traffic(&emitted.traffic) {
                    volume = floor_volume(modifier.apply(volume));
                }
                if let Some(traffic) = self.traffics.get_mut(emitted.traffic.as_str()) {
                    traffic.volume += volume;
                }
                injections.push((emitted.traffic.clone(), volume));
            }
        }
        injections
    }

    fn finish_components(&mut self, modifiers: &EffectModifiers) {
        for component in self.components.iter_mut() {
            component.finish_tick(&mut self.rng);

            let state = &mut component.state;
            for (key, metric) in state.metrics.iter_mut() {
                // an attribute with the same key takes the effect instead
                let modifier = if state.attributes.contains_key(key) {
                    None
                } else {
                    modifiers.for_metric(&state.id, key)
                };
                metric.settle(modifier);
                metric.record_history();
            }
            for attribute in state.attributes.values_mut() {
                attribute.record_history();
            }
        }
    }

    fn raise_tickets(&mut self) {
        let tick = self.tick;
        let mut opened = Vec::new();
        for component in self.components.iter_mut() {
            let synthetic = component.synthetic_alerts();
            let critical = evaluate_alerts(&mut component.state, synthetic);
            for alert in critical {
                let id = &component.state.id;
                if let Some(ticket) = self.tickets.open_if_absent(
                    id,
                    &alert.alert_name,
                    &alert.title,
                    &alert.description,
                    tick,
                ) {
                    opened.push((id.clone(), format!("{}: {}", ticket, alert.title)));
                }
            }
        }
        for (component_id, message) in opened {
            self.notify(NotificationKind::TicketOpened, Some(component_id), message);
        }
    }

    fn accrue_cost(&mut self) {
        let cost: f64 = self
            .components
            .iter()
            .flat_map(|c| c.state.attributes.values())
            .map(|a| a.tick_cost())
            .sum();
        self.total_cost += cost;
    }
}

use super::World;
use crate::agent::Agent;
use crate::config::Parameters;
use crate::entity::FoodSource;
use crate::events::{DomainEvent, EventKind};
use crate::navigation::StepOutcome;
use crate::rng::create_rng;
use crate::vector::Vec2;
use rand::Rng;
use serde_json::json;
use std::f64::consts::TAU;
use tracing::{debug, info, warn};

/// Placement attempts per clump in [`World::add_random_clumps`].
pub const CLUMP_PLACEMENT_ATTEMPTS: usize = 500;
/// Extra spacing between random clumps on top of two clump diameters.
pub const CLUMP_MIN_SEPARATION: f64 = 200.0;
/// Height of the band along the bottom edge kept free of random clumps.
pub const NEST_BAND_HEIGHT: f64 = 300.0;

impl World {
    fn emit(&mut self, event: DomainEvent) {
        self.hook.on_event(&event);
    }

    pub(crate) fn announce_start(&mut self, params: &Parameters) {
        let pending: usize = self.nests.iter().map(|n| n.pending_agents()).sum();
        info!(
            seed = self.config.seed,
            nests = self.nests.len(),
            agents = pending + self.agents.len(),
            clumps = self.clumps.len(),
            obstacles = self.obstacles.len(),
            "simulation started"
        );
        let event = DomainEvent::new(self.elapsed, EventKind::ExperimentStart, "experiment started")
            .with_data(json!({
                "seed": self.config.seed,
                "nests": self.nests.len(),
                "agents": pending + self.agents.len(),
                "food": self.food.len(),
                "clumps": self.clumps.len(),
                "parameters": params,
            }));
        self.emit(event);
    }

    /// Spawn agents for nests and food for clumps that have not been
    /// activated yet.
    pub(crate) fn spawn_pending(&mut self) {
        for nest_idx in 0..self.nests.len() {
            if !self.nests[nest_idx].enabled {
                continue;
            }
            let count = self.nests[nest_idx].take_spawn_request();
            if count > 0 {
                self.spawn_agents(nest_idx, count);
            }
        }

        for clump_idx in 0..self.clumps.len() {
            if self.clumps[clump_idx].is_spawned() || !self.clumps[clump_idx].enabled {
                continue;
            }
            let positions = self.clumps[clump_idx].spawn_positions(&mut self.rng);
            if positions.is_empty() {
                // empty clump: nothing will ever exhaust it
                self.clumps[clump_idx].enabled = false;
                continue;
            }
            for position in positions {
                let position = self.free_food_position(position);
                let id = self.next_food_id;
                self.next_food_id += 1;
                self.food.push(FoodSource {
                    clump: Some(clump_idx),
                    ..FoodSource::new(id, position)
                });
            }
            debug!(clump = clump_idx, size = self.clumps[clump_idx].size, "clump spawned food");
        }
    }

    fn spawn_agents(&mut self, nest_idx: usize, count: usize) {
        let available = crate::config::SimConfig::MAX_AGENTS.saturating_sub(self.agents.len());
        if count > available {
            warn!(
                nest = nest_idx,
                requested = count,
                available,
                "agent cap reached; spawning fewer agents"
            );
        }
        let count = count.min(available);
        let nest = &self.nests[nest_idx];
        let (position, mode) = (nest.position, nest.mode);
        self.agents.reserve(count);
        for _ in 0..count {
            let heading = Vec2::from_angle(self.rng.random::<f64>() * TAU);
            let id = self.next_agent_id;
            self.next_agent_id += 1;
            self.agents.push(Agent::new(
                id,
                position,
                heading,
                mode,
                nest_idx,
                self.config.seed,
                self.elapsed,
            ));
        }
        info!(nest = nest_idx, count, ?mode, "nest spawned agents");
    }

    /// Clamp into the map and move out of any obstacle.
    pub(crate) fn free_food_position(&self, position: Vec2) -> Vec2 {
        let (w, h) = (self.config.map_width, self.config.map_height);
        let clamped = Vec2::new(position.x.clamp(0.0, w), position.y.clamp(0.0, h));
        self.obstacles
            .nearest_free_position(clamped, self.config.food_size / 2.0, w, h)
    }

    /// Apply the deposits and rate-limited agent events produced by the
    /// parallel navigation pass, in agent order.
    pub(crate) fn apply_outcomes(
        &mut self,
        params: &Parameters,
        now: f64,
        outcomes: &[Option<StepOutcome>],
    ) {
        let want_snapshots = self.hook.wants(EventKind::AgentSnapshot);
        let want_decisions = self.hook.wants(EventKind::AgentDecision);
        for (agent, outcome) in self.agents.iter().zip(outcomes) {
            let Some(outcome) = outcome else {
                continue;
            };
            if outcome.escaped {
                self.escapes_last_step += 1;
            }
            if let Some(deposit) = outcome.deposit {
                self.field
                    .deposit_with(params, deposit.position, deposit.channel, deposit.amount);
            }
            if want_snapshots && outcome.snapshot_due {
                let event = DomainEvent::new(now, EventKind::AgentSnapshot, "agent snapshot")
                    .at(agent.position)
                    .with_data(json!({
                        "agent_id": agent.id,
                        "state": agent.state(),
                        "heading": agent.heading,
                        "carrying": agent.carrying,
                        "signal_ema": agent.signal_ema(),
                        "trip_count": agent.trip.trip_count,
                    }));
                self.hook.on_event(&event);
            }
            if want_decisions && outcome.decision_due {
                let event = DomainEvent::new(now, EventKind::AgentDecision, "agent decision")
                    .at(agent.position)
                    .with_data(json!({
                        "agent_id": agent.id,
                        "decision": outcome.decision,
                        "used_pheromones": outcome.decision.used_pheromones(),
                        "sensed": outcome.sensed,
                    }));
                self.hook.on_event(&event);
            }
        }
    }

    /// Searching agents take the closest enabled food within pickup reach.
    pub(crate) fn resolve_pickups(&mut self, now: f64) {
        let reach = self.config.pickup_radius();
        for agent_idx in 0..self.agents.len() {
            let agent = &self.agents[agent_idx];
            if !agent.enabled || agent.carrying.is_some() {
                continue;
            }
            let position = agent.position;
            let food = &self.food;
            let mut best: Option<(usize, f64)> = None;
            self.food_index.for_each_near(position, reach, |index, _| {
                let Some(source) = food.get(index) else {
                    return;
                };
                if !source.enabled {
                    return;
                }
                let d = source.position.distance(position);
                if d < reach && best.map_or(true, |(_, b)| d < b) {
                    best = Some((index, d));
                }
            });
            let Some((food_idx, _)) = best else {
                continue;
            };

            let source = &mut self.food[food_idx];
            source.enabled = false;
            let (food_id, food_pos, clump) = (source.id, source.position, source.clump);
            let agent = &mut self.agents[agent_idx];
            agent.pick_up(food_id, now);
            let agent_id = agent.id;
            self.pickups_last_step += 1;
            self.total_pickups += 1;
            debug!(agent = agent_id, food = food_id, "food picked up");
            self.emit(
                DomainEvent::new(now, EventKind::FoodPickedUp, "food picked up")
                    .at(food_pos)
                    .with_data(json!({ "agent_id": agent_id, "food_id": food_id })),
            );

            if let Some(clump_idx) = clump {
                let exhausted = self
                    .clumps
                    .get_mut(clump_idx)
                    .is_some_and(|c| c.take_one());
                if exhausted {
                    let center = self.clumps[clump_idx].center;
                    info!(clump = clump_idx, "food clump exhausted");
                    self.emit(
                        DomainEvent::new(now, EventKind::ClumpExhausted, "food clump exhausted")
                            .at(center)
                            .with_data(json!({ "clump": clump_idx })),
                    );
                }
            }
        }
    }

    /// Carrying agents inside their nest's drop radius deliver.
    pub(crate) fn resolve_drops(&mut self, now: f64) {
        let reach = self.config.drop_radius();
        let mut events = Vec::new();
        for agent in self.agents.iter_mut() {
            if !agent.enabled || agent.carrying.is_none() {
                continue;
            }
            let Some(nest) = self.nests.get_mut(agent.nest) else {
                continue;
            };
            if !nest.enabled || agent.position.distance(nest.position) >= reach {
                continue;
            }
            if let Some(food_id) = agent.drop_at_nest(now) {
                nest.record_delivery();
                self.deliveries_last_step += 1;
                debug!(agent = agent.id, food = food_id, delivered = nest.delivered(), "food delivered");
                events.push(
                    DomainEvent::new(now, EventKind::FoodDropped, "food delivered to nest")
                        .at(nest.position)
                        .with_data(json!({
                            "agent_id": agent.id,
                            "food_id": food_id,
                            "nest": agent.nest,
                            "delivered": nest.delivered(),
                            "trip_time": agent.trip.last_trip_time,
                        })),
                );
            }
        }
        for event in events {
            self.emit(event);
        }
    }

    /// Place up to `count` clumps of `size` pieces at random spots, keeping
    /// them apart from each other, from nests, and off the bottom band.
    /// Returns how many were placed.
    pub fn add_random_clumps(&mut self, count: usize, size: usize) -> usize {
        let radius = self.config.clump_radius;
        let margin = radius * 2.0;
        let min_separation = CLUMP_MIN_SEPARATION + 2.0 * margin;
        let (w, h) = (self.config.map_width, self.config.map_height);
        let x_max = (w - margin).max(margin);
        let y_max = (h - NEST_BAND_HEIGHT).max(margin);

        let mut placed = 0;
        for _ in 0..count {
            for _ in 0..CLUMP_PLACEMENT_ATTEMPTS {
                let center = Vec2::new(
                    self.rng.random_range(margin..=x_max),
                    self.rng.random_range(margin..=y_max),
                );
                let clear_of_clumps = self
                    .clumps
                    .iter()
                    .all(|c| c.center.distance(center) >= min_separation);
                let clear_of_nests = self
                    .nests
                    .iter()
                    .all(|n| n.position.distance(center) >= min_separation);
                if clear_of_clumps && clear_of_nests && !self.obstacles.intersects(center, radius) {
                    self.add_clump(center, size);
                    placed += 1;
                    break;
                }
            }
        }
        if placed < count {
            warn!(requested = count, placed, "could not place every random clump");
        }
        placed
    }

    /// Scatter `count` loose food pieces uniformly over the map.
    pub fn scatter_food(&mut self, count: usize) {
        let margin = self.config.food_size;
        let (w, h) = (self.config.map_width, self.config.map_height);
        for _ in 0..count {
            let position = Vec2::new(
                self.rng.random_range(margin..=(w - margin).max(margin)),
                self.rng.random_range(margin..=(h - margin).max(margin)),
            );
            self.add_food(position);
        }
    }

    /// Drop disabled food and agents from their lists. Indices into them
    /// are only valid until the next call.
    pub(crate) fn prune_disabled(&mut self) {
        let before = self.food.len();
        self.food.retain(|f| f.enabled);
        self.agents.retain(|a| a.enabled);
        if self.food.len() != before {
            debug!(removed = before - self.food.len(), "pruned collected food");
        }
    }

    fn clear_entities(&mut self) -> (usize, usize) {
        for agent in &mut self.agents {
            agent.enabled = false;
        }
        for food in &mut self.food {
            food.enabled = false;
        }
        for nest in &mut self.nests {
            nest.enabled = false;
        }
        for clump in &mut self.clumps {
            clump.enabled = false;
        }
        let removed = (self.agents.len(), self.food.len());
        self.agents.clear();
        self.food.clear();
        self.nests.clear();
        self.clumps.clear();
        self.agent_index.rebuild(&self.agents);
        self.food_index.rebuild(&self.food);
        self.field.clear();
        self.pending_field_dt = 0.0;
        self.ticks_since_field = 0;
        removed
    }

    /// Stop the simulation: every entity is disabled and removed and the
    /// field is cleared. Later ticks do nothing. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        let (agents, food) = self.clear_entities();
        self.stopped = true;
        info!(step = self.step_index, agents, food, "simulation stopped");
        let event = DomainEvent::new(self.elapsed, EventKind::SimulationStopped, "simulation stopped")
            .with_data(json!({ "agents": agents, "food": food, "step": self.step_index }));
        self.emit(event);
    }

    /// Clear the scene and rewind the clock so a new one can be built.
    /// Obstacles, parameters and the event hook are kept.
    pub fn reset(&mut self) {
        self.clear_entities();
        self.rng = create_rng(self.config.seed);
        self.elapsed = 0.0;
        self.step_index = 0;
        self.started = false;
        self.stopped = false;
        self.next_agent_id = 0;
        self.next_food_id = 0;
        self.last_tick_at = None;
        self.pickups_last_step = 0;
        self.deliveries_last_step = 0;
        self.escapes_last_step = 0;
        self.total_pickups = 0;
        info!("simulation reset");
    }
}

pub mod lifecycle;
pub mod metrics;

pub use metrics::*;

use crate::agent::{Agent, BehaviorMode};
use crate::config::{ParameterStore, SimConfig, SimConfigError};
use crate::density::DensityField;
use crate::entity::{FoodClump, FoodSource, Nest};
use crate::events::{EventHook, NullEventHook, StatsCallback, TickStats};
use crate::navigation::{self, NavigationContext, StepOutcome};
use crate::obstacle::{Obstacle, ObstacleField};
use crate::rng::create_rng;
use crate::spatial::SpatialIndex;
use crate::vector::Vec2;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::time::Instant;
use std::{error::Error, fmt};
use tracing::debug;

pub struct World {
    pub agents: Vec<Agent>,
    pub food: Vec<FoodSource>,
    pub nests: Vec<Nest>,
    pub clumps: Vec<FoodClump>,
    pub(crate) config: SimConfig,
    pub(crate) params: ParameterStore,
    pub(crate) field: DensityField,
    pub(crate) obstacles: ObstacleField,
    pub(crate) agent_index: SpatialIndex,
    pub(crate) food_index: SpatialIndex,
    pub(crate) rng: ChaCha12Rng,
    pub(crate) hook: Box<dyn EventHook>,
    pub(crate) stats_callback: Option<StatsCallback>,
    pub(crate) elapsed: f64,
    pub(crate) step_index: usize,
    /// Simulated time not yet applied to the density field.
    pub(crate) pending_field_dt: f64,
    pub(crate) ticks_since_field: u32,
    pub(crate) started: bool,
    pub(crate) stopped: bool,
    pub(crate) next_agent_id: u64,
    pub(crate) next_food_id: u64,
    pub(crate) last_tick_at: Option<Instant>,
    pub(crate) pickups_last_step: usize,
    pub(crate) deliveries_last_step: usize,
    pub(crate) escapes_last_step: usize,
    pub(crate) total_pickups: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldInitError {
    Config(SimConfigError),
    TooManyAgents { max: usize, actual: usize },
    OutOfBounds { x: f64, y: f64 },
}

impl fmt::Display for WorldInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldInitError::Config(e) => write!(f, "{}", e),
            WorldInitError::TooManyAgents { max, actual } => {
                write!(f, "total agents ({actual}) exceeds supported maximum ({max})")
            }
            WorldInitError::OutOfBounds { x, y } => {
                write!(f, "position ({x}, {y}) lies outside the map")
            }
        }
    }
}

impl From<SimConfigError> for WorldInitError {
    fn from(err: SimConfigError) -> Self {
        WorldInitError::Config(err)
    }
}

impl Error for WorldInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldInitError::Config(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    InvalidDt,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::InvalidDt => write!(f, "dt must be positive and finite"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

impl World {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;
    /// Disabled food is dropped from the list this often (in ticks).
    pub const COMPACTION_INTERVAL: usize = 600;
    const FIELD_LOG_INTERVAL: usize = 120;

    pub fn new(config: SimConfig, params: ParameterStore) -> Self {
        Self::try_new(config, params).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig, params: ParameterStore) -> Result<Self, WorldInitError> {
        config.validate()?;
        let field = DensityField::new(
            config.map_width,
            config.map_height,
            config.cell_size,
            params.clone(),
        );
        Ok(Self {
            agents: Vec::new(),
            food: Vec::new(),
            nests: Vec::new(),
            clumps: Vec::new(),
            params,
            field,
            obstacles: ObstacleField::default(),
            agent_index: SpatialIndex::new(config.spatial_cell_size),
            food_index: SpatialIndex::new(config.spatial_cell_size),
            rng: create_rng(config.seed),
            hook: Box::new(NullEventHook),
            stats_callback: None,
            elapsed: 0.0,
            step_index: 0,
            pending_field_dt: 0.0,
            ticks_since_field: 0,
            started: false,
            stopped: false,
            next_agent_id: 0,
            next_food_id: 0,
            last_tick_at: None,
            pickups_last_step: 0,
            deliveries_last_step: 0,
            escapes_last_step: 0,
            total_pickups: 0,
            config,
        })
    }

    pub fn with_event_hook<H: EventHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn set_event_hook<H: EventHook + 'static>(&mut self, hook: H) {
        self.hook = Box::new(hook);
    }

    /// Install the per-tick statistics callback. It runs at most once per tick.
    pub fn set_stats_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&TickStats) + Send + 'static,
    {
        self.stats_callback = Some(Box::new(callback));
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn field(&self) -> &DensityField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut DensityField {
        &mut self.field
    }

    pub fn obstacles(&self) -> &ObstacleField {
        &self.obstacles
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn map_size(&self) -> Vec2 {
        Vec2::new(self.config.map_width, self.config.map_height)
    }

    fn contains(&self, position: Vec2) -> bool {
        position.is_finite()
            && (0.0..=self.config.map_width).contains(&position.x)
            && (0.0..=self.config.map_height).contains(&position.y)
    }

    /// Register a nest that spawns `agent_count` agents on the next tick.
    pub fn add_nest(
        &mut self,
        position: Vec2,
        mode: BehaviorMode,
        agent_count: usize,
    ) -> Result<usize, WorldInitError> {
        if !self.contains(position) {
            return Err(WorldInitError::OutOfBounds {
                x: position.x,
                y: position.y,
            });
        }
        let queued: usize = self
            .nests
            .iter()
            .map(|n| n.pending_agents())
            .sum::<usize>()
            .saturating_add(self.agents.len());
        let total = queued.saturating_add(agent_count);
        if total > SimConfig::MAX_AGENTS {
            return Err(WorldInitError::TooManyAgents {
                max: SimConfig::MAX_AGENTS,
                actual: total,
            });
        }
        self.nests
            .push(Nest::new(position, self.config.nest_size, mode, agent_count));
        Ok(self.nests.len() - 1)
    }

    /// Place one loose food piece, moved out of any obstacle it lands in.
    pub fn add_food(&mut self, position: Vec2) -> usize {
        let position = self.free_food_position(position);
        let id = self.next_food_id;
        self.next_food_id += 1;
        self.food.push(FoodSource::new(id, position));
        self.food.len() - 1
    }

    /// Register a clump that spawns `size` pieces on the next tick.
    pub fn add_clump(&mut self, center: Vec2, size: usize) -> usize {
        self.clumps
            .push(FoodClump::new(center, self.config.clump_radius, size));
        self.clumps.len() - 1
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.insert(obstacle);
    }

    pub fn active_agent_count(&self) -> usize {
        self.agents.iter().filter(|a| a.enabled).count()
    }

    pub fn active_food_count(&self) -> usize {
        self.food.iter().filter(|f| f.enabled).count()
    }

    pub fn total_delivered(&self) -> u64 {
        self.nests.iter().map(|n| n.delivered()).sum()
    }

    /// Indices of agents within `radius` of `position`, as of the last
    /// spatial rebuild.
    pub fn agents_near(&self, position: Vec2, radius: f64) -> Vec<usize> {
        let r_sq = radius * radius;
        let mut out = Vec::new();
        self.agent_index.for_each_near(position, radius, |index, p| {
            if p.distance_squared(position) <= r_sq {
                out.push(index);
            }
        });
        out
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Does nothing once stopped. Negative or non-finite `dt` counts as 0.
    pub fn tick(&mut self, dt: f64) -> StepTimings {
        if self.stopped {
            return StepTimings::default();
        }
        let total_start = Instant::now();
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let params = self.params.snapshot();
        self.elapsed += dt;
        let now = self.elapsed;
        self.pickups_last_step = 0;
        self.deliveries_last_step = 0;
        self.escapes_last_step = 0;

        if !self.started {
            self.started = true;
            self.announce_start(&params);
        }
        self.spawn_pending();

        // 1. Rebuild spatial indices
        let t0 = Instant::now();
        self.agent_index.rebuild(&self.agents);
        self.food_index.rebuild(&self.food);
        let spatial_build_us = t0.elapsed().as_micros() as u64;

        // 2. Sense, steer and move every agent in parallel
        let t1 = Instant::now();
        let ctx = NavigationContext {
            params: &params,
            field: &self.field,
            obstacles: &self.obstacles,
            food_index: &self.food_index,
            nests: &self.nests,
            map_size: Vec2::new(self.config.map_width, self.config.map_height),
            now,
            dt,
            collision_radius: self.config.collision_radius,
            snapshot_interval: self.config.snapshot_interval,
        };
        let outcomes: Vec<Option<StepOutcome>> = self
            .agents
            .par_iter_mut()
            .map(|agent| {
                if agent.enabled {
                    Some(navigation::step_agent(agent, &ctx))
                } else {
                    None
                }
            })
            .collect();
        let navigation_us = t1.elapsed().as_micros() as u64;

        // 3. Deposits, pickups and drops, in agent order
        let t2 = Instant::now();
        self.apply_outcomes(&params, now, &outcomes);
        self.resolve_pickups(now);
        self.resolve_drops(now);
        let interaction_us = t2.elapsed().as_micros() as u64;

        // 4. Density field, every `field_frame_skip` ticks with the skipped time folded in
        let t3 = Instant::now();
        self.pending_field_dt += dt;
        self.ticks_since_field += 1;
        if self.ticks_since_field >= self.config.field_frame_skip {
            self.flush_field();
        }
        let field_us = t3.elapsed().as_micros() as u64;

        self.step_index += 1;
        if self.step_index % Self::COMPACTION_INTERVAL == 0 {
            self.prune_disabled();
        }
        if self.step_index % Self::FIELD_LOG_INTERVAL == 0 {
            debug!(
                step = self.step_index,
                food_cells = self.field.active_cells(crate::density::Channel::Food),
                home_cells = self.field.active_cells(crate::density::Channel::Home),
                delivered = self.total_delivered(),
                "density field status"
            );
        }
        self.report_stats();

        StepTimings {
            spatial_build_us,
            navigation_us,
            interaction_us,
            field_us,
            total_us: total_start.elapsed().as_micros() as u64,
        }
    }

    /// Apply any density-field time held back by frame skipping.
    pub fn flush_field(&mut self) {
        let dt = std::mem::take(&mut self.pending_field_dt);
        self.ticks_since_field = 0;
        self.field.tick(dt);
    }

    fn report_stats(&mut self) {
        let tick_at = Instant::now();
        let frames_per_second = self
            .last_tick_at
            .map(|prev| {
                let secs = tick_at.duration_since(prev).as_secs_f64();
                if secs > 0.0 {
                    1.0 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);
        self.last_tick_at = Some(tick_at);
        if self.stats_callback.is_none() {
            return;
        }
        let stats = TickStats {
            active_agents: self.active_agent_count(),
            active_food: self.active_food_count(),
            frames_per_second,
        };
        if let Some(callback) = self.stats_callback.as_mut() {
            callback(&stats);
        }
    }

    pub fn run_experiment(&mut self, steps: usize, dt: f64, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, dt, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        dt: f64,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ExperimentError::InvalidDt);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let pickups_before = self.total_pickups;
        let delivered_before = self.total_delivered();
        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            self.tick(dt);
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics(step));
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            steps,
            dt,
            sample_every,
            final_active_agents: self.active_agent_count(),
            final_active_food: self.active_food_count(),
            total_pickups: self.total_pickups - pickups_before,
            total_delivered: self.total_delivered().saturating_sub(delivered_before),
            samples,
        })
    }
}

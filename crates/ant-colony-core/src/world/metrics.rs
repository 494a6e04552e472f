use super::World;
use crate::agent::AgentState;
use crate::density::Channel;
use serde::{Deserialize, Serialize};

/// Wall-clock cost of the phases of one tick, in microseconds.
#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    pub spatial_build_us: u64,
    pub navigation_us: u64,
    pub interaction_us: u64,
    pub field_us: u64,
    pub total_us: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub elapsed: f64,
    pub active_agents: usize,
    pub active_food: usize,
    pub carrying_agents: usize,
    pub delivered_total: u64,
    pub pickups: usize,
    pub deliveries: usize,
    pub escapes: usize,
    pub food_total: f64,
    pub home_total: f64,
    pub food_active_cells: usize,
    pub home_active_cells: usize,
    pub food_mean_intensity: f64,
    pub home_mean_intensity: f64,
    /// Mean of the per-agent running trip means, over agents with a completed trip.
    pub mean_trip_time: f64,
    pub completed_trips: u64,
    /// Agents within sight radius of any nest, as of the last spatial rebuild.
    pub agents_near_nests: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub dt: f64,
    pub sample_every: usize,
    pub final_active_agents: usize,
    pub final_active_food: usize,
    pub total_pickups: usize,
    pub total_delivered: u64,
    pub samples: Vec<StepMetrics>,
}

impl World {
    pub fn collect_step_metrics(&self, step: usize) -> StepMetrics {
        let mut active_agents = 0;
        let mut carrying_agents = 0;
        let mut trip_mean_sum = 0.0;
        let mut agents_with_trips = 0usize;
        let mut completed_trips = 0u64;
        for agent in self.agents.iter().filter(|a| a.enabled) {
            active_agents += 1;
            if agent.state() == AgentState::Returning {
                carrying_agents += 1;
            }
            if agent.trip.trip_count > 0 {
                agents_with_trips += 1;
                trip_mean_sum += agent.trip.mean_trip_time;
                completed_trips += u64::from(agent.trip.trip_count);
            }
        }
        let mean_trip_time = if agents_with_trips > 0 {
            trip_mean_sum / agents_with_trips as f64
        } else {
            0.0
        };

        let sight = self.params.snapshot().sight_radius;
        let mut near = vec![false; self.agents.len()];
        for nest in self.nests.iter().filter(|n| n.enabled) {
            for index in self.agents_near(nest.position, sight + nest.size / 2.0) {
                if let Some(flag) = near.get_mut(index) {
                    *flag = true;
                }
            }
        }

        StepMetrics {
            step,
            elapsed: self.elapsed,
            active_agents,
            active_food: self.active_food_count(),
            carrying_agents,
            delivered_total: self.total_delivered(),
            pickups: self.pickups_last_step,
            deliveries: self.deliveries_last_step,
            escapes: self.escapes_last_step,
            food_total: self.field.total(Channel::Food),
            home_total: self.field.total(Channel::Home),
            food_active_cells: self.field.active_cells(Channel::Food),
            home_active_cells: self.field.active_cells(Channel::Home),
            food_mean_intensity: self.field.average_intensity(Channel::Food),
            home_mean_intensity: self.field.average_intensity(Channel::Home),
            mean_trip_time,
            completed_trips,
            agents_near_nests: near.iter().filter(|&&n| n).count(),
        }
    }
}

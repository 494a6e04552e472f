use crate::agent::BehaviorMode;
use crate::spatial::Located;
use crate::vector::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodSource {
    pub id: u64,
    pub position: Vec2,
    pub enabled: bool,
    /// Index of the owning clump, if any.
    pub clump: Option<usize>,
}

impl FoodSource {
    pub fn new(id: u64, position: Vec2) -> Self {
        Self {
            id,
            position,
            enabled: true,
            clump: None,
        }
    }
}

impl Located for FoodSource {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Cluster of food that spawns its pieces on first activation and switches
/// itself off once every piece has been taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FoodClump {
    pub center: Vec2,
    pub radius: f64,
    pub size: usize,
    pub enabled: bool,
    pub(crate) spawned: bool,
    pub(crate) remaining: usize,
}

impl FoodClump {
    pub fn new(center: Vec2, radius: f64, size: usize) -> Self {
        Self {
            center,
            radius,
            size,
            enabled: true,
            spawned: false,
            remaining: 0,
        }
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    /// Pieces spawned and not yet picked up.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Uniform positions inside the clump disc. Returns nothing after the
    /// first call.
    pub(crate) fn spawn_positions<R: Rng>(&mut self, rng: &mut R) -> Vec<Vec2> {
        if self.spawned || !self.enabled {
            return Vec::new();
        }
        self.spawned = true;
        self.remaining = self.size;
        (0..self.size)
            .map(|_| self.center + random_in_disc(rng, self.radius))
            .collect()
    }

    /// Record one piece taken. Returns true when this emptied the clump.
    pub(crate) fn take_one(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.spawned && self.remaining == 0 && self.enabled {
            self.enabled = false;
            return true;
        }
        false
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Nest {
    pub position: Vec2,
    pub size: f64,
    pub mode: BehaviorMode,
    pub enabled: bool,
    delivered: u64,
    pending_agents: usize,
}

impl Nest {
    pub fn new(position: Vec2, size: f64, mode: BehaviorMode, agent_count: usize) -> Self {
        Self {
            position,
            size,
            mode,
            enabled: true,
            delivered: 0,
            pending_agents: agent_count,
        }
    }

    /// Food delivered so far. Never decreases.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Agents still waiting to be spawned.
    pub fn pending_agents(&self) -> usize {
        self.pending_agents
    }

    pub(crate) fn record_delivery(&mut self) {
        self.delivered = self.delivered.saturating_add(1);
    }

    /// One-shot spawn request: the configured agent count the first time,
    /// zero afterwards.
    pub(crate) fn take_spawn_request(&mut self) -> usize {
        std::mem::take(&mut self.pending_agents)
    }
}

/// Uniformly distributed offset inside a disc of `radius`.
pub fn random_in_disc<R: Rng>(rng: &mut R, radius: f64) -> Vec2 {
    if !(radius > 0.0) {
        return Vec2::ZERO;
    }
    let angle = rng.random::<f64>() * TAU;
    let r = radius * rng.random::<f64>().sqrt();
    Vec2::from_angle(angle) * r
}

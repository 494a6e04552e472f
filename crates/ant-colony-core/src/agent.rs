use crate::rng::derive_agent_rng;
use crate::spatial::Located;
use crate::vector::Vec2;
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Weight of a new direction when blended into the current heading.
pub const SMOOTHING_FACTOR: f64 = 0.2;
/// Full width of the random offset added to a turn-around.
pub const TURN_AROUND_SPREAD: f64 = PI / 4.0;
const RANDOM_HEADING_ATTEMPTS: usize = 16;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    /// Ignores both pheromone channels.
    Random,
    /// Follows FOOD while searching, heads straight home while returning.
    FoodTrailOnly,
    /// Follows FOOD while searching and HOME while returning.
    #[default]
    BothTrails,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Searching,
    Returning,
}

/// Per-trip timers. Times are simulation seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    pub trip_started_at: f64,
    pub picked_up_at: Option<f64>,
    /// Time from trip start to finding food.
    pub last_food_discovery: Option<f64>,
    /// Time from pickup to reaching the nest.
    pub last_nest_discovery: Option<f64>,
    pub last_trip_time: Option<f64>,
    pub mean_trip_time: f64,
    pub trip_count: u32,
}

impl TripStats {
    fn found_food(&mut self, now: f64) {
        self.last_food_discovery = Some((now - self.trip_started_at).max(0.0));
        self.picked_up_at = Some(now);
    }

    fn complete_trip(&mut self, now: f64) {
        let trip = (now - self.trip_started_at).max(0.0);
        let n = self.trip_count as f64;
        self.mean_trip_time = (self.mean_trip_time * n + trip) / (n + 1.0);
        self.trip_count += 1;
        self.last_trip_time = Some(trip);
        let carried_from = self.picked_up_at.take().unwrap_or(self.trip_started_at);
        self.last_nest_discovery = Some((now - carried_from).max(0.0));
        self.trip_started_at = now;
    }
}

/// Reference point for trail-intensity fading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub position: Vec2,
    pub time: f64,
}

#[derive(Clone, Debug)]
pub struct Agent {
    pub id: u64,
    pub position: Vec2,
    pub heading: Vec2,
    pub mode: BehaviorMode,
    /// Index of the home nest in the world's nest list.
    pub nest: usize,
    /// Id of the carried food source.
    pub carrying: Option<u64>,
    pub enabled: bool,
    pub trip: TripStats,
    pub(crate) milestone: Milestone,
    pub(crate) last_deposit: Option<(Vec2, f64)>,
    pub(crate) signal_ema: f64,
    pub(crate) last_snapshot_at: Option<f64>,
    pub(crate) last_decision_at: Option<f64>,
    pub(crate) rng: ChaCha12Rng,
}

impl Agent {
    pub fn new(
        id: u64,
        position: Vec2,
        heading: Vec2,
        mode: BehaviorMode,
        nest: usize,
        seed: u64,
        now: f64,
    ) -> Self {
        Self {
            id,
            position,
            heading: heading.normalized(),
            mode,
            nest,
            carrying: None,
            enabled: true,
            trip: TripStats {
                trip_started_at: now,
                ..TripStats::default()
            },
            milestone: Milestone {
                position,
                time: now,
            },
            last_deposit: None,
            signal_ema: 0.0,
            last_snapshot_at: None,
            last_decision_at: None,
            rng: derive_agent_rng(seed, id),
        }
    }

    pub fn state(&self) -> AgentState {
        if self.carrying.is_some() {
            AgentState::Returning
        } else {
            AgentState::Searching
        }
    }

    pub fn milestone(&self) -> Milestone {
        self.milestone
    }

    pub fn signal_ema(&self) -> f64 {
        self.signal_ema
    }

    /// Deposit gating: true on a fresh trail, otherwise only once the agent
    /// has moved `min_distance` and waited `min_interval` since its last
    /// deposit.
    pub fn should_deposit(&self, now: f64, min_distance: f64, min_interval: f64) -> bool {
        match self.last_deposit {
            None => true,
            Some((position, time)) => {
                self.position.distance(position) >= min_distance && now - time >= min_interval
            }
        }
    }

    pub(crate) fn record_deposit(&mut self, now: f64) {
        self.last_deposit = Some((self.position, now));
    }

    fn reset_milestone(&mut self, now: f64) {
        self.milestone = Milestone {
            position: self.position,
            time: now,
        };
    }

    /// Take hold of food `food_id` and head back.
    pub fn pick_up(&mut self, food_id: u64, now: f64) {
        self.carrying = Some(food_id);
        self.trip.found_food(now);
        self.reset_milestone(now);
        self.turn_around();
    }

    /// Deliver the carried food. Returns the food id, or `None` when the
    /// agent was not carrying anything (no state changes in that case).
    pub fn drop_at_nest(&mut self, now: f64) -> Option<u64> {
        let food = self.carrying.take()?;
        self.trip.complete_trip(now);
        self.last_deposit = None;
        self.reset_milestone(now);
        self.turn_around();
        Some(food)
    }

    /// Reverse the heading with a random offset of up to ±22.5°.
    pub fn turn_around(&mut self) {
        self.heading = self.turn_around_direction();
    }

    /// The reversed heading with a random offset, without applying it.
    pub fn turn_around_direction(&mut self) -> Vec2 {
        let offset = (self.rng.random::<f64>() - 0.5) * TURN_AROUND_SPREAD;
        Vec2::from_angle(self.heading.angle() + PI + offset)
    }

    /// Blend `direction` into the heading and renormalize.
    pub fn steer_toward(&mut self, direction: Vec2) {
        let blended = (self.heading + direction.normalized() * SMOOTHING_FACTOR).normalized();
        if blended.is_zero() {
            self.set_heading(direction);
        } else {
            self.heading = blended;
        }
    }

    /// Replace the heading outright. Zero directions are ignored.
    pub fn set_heading(&mut self, direction: Vec2) {
        let direction = direction.normalized();
        if !direction.is_zero() && direction.is_finite() {
            self.heading = direction;
        }
    }

    /// Random unit vector in the half-plane ahead of the heading.
    pub fn random_forward_direction(&mut self) -> Vec2 {
        for _ in 0..RANDOM_HEADING_ATTEMPTS {
            let candidate = Vec2::new(
                self.rng.random_range(-1.0..=1.0),
                self.rng.random_range(-1.0..=1.0),
            );
            if candidate.is_zero() {
                continue;
            }
            if self.heading.is_zero() || candidate.dot(self.heading) > 0.0 {
                return candidate.normalized();
            }
        }
        self.heading
    }

    pub(crate) fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    pub(crate) fn random_offset(&mut self, radius: f64) -> Vec2 {
        crate::entity::random_in_disc(&mut self.rng, radius)
    }

    /// True when a snapshot is due at `now` given the minimum `interval`;
    /// marks it emitted.
    pub(crate) fn take_snapshot_slot(&mut self, now: f64, interval: f64) -> bool {
        take_slot(&mut self.last_snapshot_at, now, interval)
    }

    pub(crate) fn take_decision_slot(&mut self, now: f64, interval: f64) -> bool {
        take_slot(&mut self.last_decision_at, now, interval)
    }
}

fn take_slot(last: &mut Option<f64>, now: f64, interval: f64) -> bool {
    let due = last.map_or(true, |t| now - t >= interval);
    if due {
        *last = Some(now);
    }
    due
}

impl Located for Agent {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new(
            1,
            Vec2::new(10.0, 10.0),
            Vec2::new(1.0, 0.0),
            BehaviorMode::BothTrails,
            0,
            42,
            0.0,
        )
    }

    #[test]
    fn state_follows_carried_food() {
        let mut a = agent();
        assert_eq!(a.state(), AgentState::Searching);
        a.pick_up(7, 1.0);
        assert_eq!(a.state(), AgentState::Returning);
        assert_eq!(a.trip.last_food_discovery, Some(1.0));
    }

    #[test]
    fn pick_up_reverses_heading() {
        let mut a = agent();
        a.pick_up(3, 0.5);
        assert!(a.heading.x < -0.9);
        assert!((a.heading.length() - 1.0).abs() < 1e-9);
        assert_eq!(a.milestone().time, 0.5);
    }

    #[test]
    fn drop_resets_trip_and_gating() {
        let mut a = agent();
        a.record_deposit(0.1);
        a.pick_up(3, 2.0);
        a.position = Vec2::new(10.5, 10.0);
        a.record_deposit(2.5);
        assert!(!a.should_deposit(2.51, 2.0, 0.008));

        assert_eq!(a.drop_at_nest(4.0), Some(3));
        assert!(a.carrying.is_none());
        assert_eq!(a.trip.trip_count, 1);
        assert_eq!(a.trip.last_trip_time, Some(4.0));
        assert_eq!(a.trip.mean_trip_time, 4.0);
        assert_eq!(a.trip.last_food_discovery, Some(2.0));
        assert_eq!(a.trip.last_nest_discovery, Some(2.0));
        assert_eq!(a.trip.picked_up_at, None);
        assert_eq!(a.milestone().position, Vec2::new(10.5, 10.0));
        assert!(a.should_deposit(4.0, 2.0, 0.008));
    }

    #[test]
    fn discovery_timers_are_durations() {
        let mut a = Agent::new(
            2,
            Vec2::new(10.0, 10.0),
            Vec2::new(1.0, 0.0),
            BehaviorMode::BothTrails,
            0,
            42,
            10.0,
        );
        a.pick_up(4, 15.0);
        assert_eq!(a.trip.last_food_discovery, Some(5.0));
        a.drop_at_nest(18.0);
        assert_eq!(a.trip.last_nest_discovery, Some(3.0));
        assert_eq!(a.trip.last_trip_time, Some(8.0));
        a.pick_up(5, 20.0);
        assert_eq!(a.trip.last_food_discovery, Some(2.0));
    }

    #[test]
    fn drop_without_food_is_noop() {
        let mut a = agent();
        let heading = a.heading;
        assert_eq!(a.drop_at_nest(1.0), None);
        assert_eq!(a.trip.trip_count, 0);
        assert_eq!(a.heading, heading);
    }

    #[test]
    fn running_mean_trip_time() {
        let mut a = agent();
        a.pick_up(1, 1.0);
        a.drop_at_nest(2.0);
        a.pick_up(2, 3.0);
        a.drop_at_nest(6.0);
        assert_eq!(a.trip.trip_count, 2);
        assert_eq!(a.trip.last_trip_time, Some(4.0));
        assert_eq!(a.trip.mean_trip_time, 3.0);
    }

    #[test]
    fn deposit_gating_needs_distance_and_time() {
        let mut a = agent();
        assert!(a.should_deposit(0.0, 2.0, 0.01));
        a.record_deposit(0.0);
        a.position = Vec2::new(13.0, 10.0);
        assert!(!a.should_deposit(0.005, 2.0, 0.01));
        assert!(a.should_deposit(0.02, 2.0, 0.01));
        a.position = Vec2::new(11.0, 10.0);
        assert!(!a.should_deposit(1.0, 2.0, 0.01));
    }

    #[test]
    fn steering_blends_heading() {
        let mut a = agent();
        a.steer_toward(Vec2::new(0.0, 1.0));
        assert!(a.heading.x > 0.9 && a.heading.y > 0.0);
        assert!((a.heading.length() - 1.0).abs() < 1e-12);
        a.set_heading(Vec2::ZERO);
        assert!((a.heading.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_forward_direction_stays_ahead() {
        let mut a = agent();
        for _ in 0..200 {
            let d = a.random_forward_direction();
            assert!(d.dot(a.heading) >= 0.0);
            assert!((d.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn slots_are_rate_limited() {
        let mut a = agent();
        assert!(a.take_snapshot_slot(0.0, 0.5));
        assert!(!a.take_snapshot_slot(0.4, 0.5));
        assert!(a.take_snapshot_slot(0.5, 0.5));
    }
}

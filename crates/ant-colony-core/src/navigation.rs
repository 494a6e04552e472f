//! Per-agent sensing, direction choice, movement and trail deposition.
//!
//! Everything here reads shared state through a [`NavigationContext`] and
//! mutates only the agent it is given, so agents can be stepped in parallel.
//! Deposits come back as [`Deposit`] requests and are applied by the world.

use crate::agent::{Agent, AgentState, BehaviorMode, Milestone};
use crate::config::{Parameters, TrailDecay};
use crate::density::{Channel, DensityField};
use crate::entity::Nest;
use crate::obstacle::ObstacleField;
use crate::spatial::SpatialIndex;
use crate::vector::Vec2;
use serde::{Deserialize, Serialize};

/// Deposit jitter radius as a fraction of the minimum deposit spacing.
pub const JITTER_FRACTION: f64 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSide {
    Front,
    Left,
    Right,
}

impl SensorSide {
    /// Selection order used when drawing a sensor.
    pub const ORDER: [SensorSide; 3] = [SensorSide::Front, SensorSide::Left, SensorSide::Right];

    /// Heading offset: left is `+angle`, right is `-angle`.
    pub fn offset(self, angle: f64) -> f64 {
        match self {
            SensorSide::Front => 0.0,
            SensorSide::Left => angle,
            SensorSide::Right => -angle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub side: SensorSide,
    pub direction: Vec2,
    pub intensity: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "sensor", rename_all = "snake_case")]
pub enum Decision {
    /// Food within feel radius; heading set straight at it.
    ApproachFood,
    /// Heading set straight at the home nest.
    ApproachNest,
    /// Trail followed through the given sensor.
    FollowTrail(SensorSide),
    /// Signal lost after having been strong.
    TurnAround,
    /// Random forward steering.
    Wander,
}

impl Decision {
    pub fn used_pheromones(self) -> bool {
        matches!(self, Decision::FollowTrail(_) | Decision::TurnAround)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deposit {
    pub position: Vec2,
    pub channel: Channel,
    pub amount: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub decision: Decision,
    /// Strongest sensor reading this tick, 0 when sensors were not used.
    pub sensed: f64,
    pub deposit: Option<Deposit>,
    pub escaped: bool,
    pub snapshot_due: bool,
    pub decision_due: bool,
}

/// Read-only view of the world handed to every agent for one tick.
pub struct NavigationContext<'a> {
    pub params: &'a Parameters,
    pub field: &'a DensityField,
    pub obstacles: &'a ObstacleField,
    pub food_index: &'a SpatialIndex,
    pub nests: &'a [Nest],
    pub map_size: Vec2,
    pub now: f64,
    pub dt: f64,
    pub collision_radius: f64,
    pub snapshot_interval: f64,
}

/// Unit direction of a sensor offset by `angle` from `heading`.
pub fn sensor_direction(heading: Vec2, angle: f64) -> Vec2 {
    heading.normalized().rotated(angle)
}

/// The three sensors in selection order (front, left, right), each placed
/// `distance` ahead along its direction.
pub fn read_sensors(
    field: &DensityField,
    channel: Channel,
    position: Vec2,
    heading: Vec2,
    params: &Parameters,
) -> [SensorReading; 3] {
    SensorSide::ORDER.map(|side| {
        let direction = sensor_direction(heading, side.offset(params.sensor_angle));
        let at = position + direction * params.feel_radius;
        SensorReading {
            side,
            direction,
            intensity: field.sample_mean(at, channel, params.sensor_radius),
        }
    })
}

/// Share of the reading sum plus `exploration / 3`, renormalized. Falls back
/// to uniform odds when nothing was sensed.
pub fn selection_probabilities(readings: &[SensorReading; 3], exploration: f64) -> [f64; 3] {
    let sum: f64 = readings.iter().map(|r| r.intensity.max(0.0)).sum();
    if !(sum > 0.0 && sum.is_finite()) {
        return [1.0 / 3.0; 3];
    }
    let bonus = exploration.max(0.0) / 3.0;
    let raw = readings.map(|r| r.intensity.max(0.0) / sum + bonus);
    let total: f64 = raw.iter().sum();
    raw.map(|p| p / total)
}

/// Sensor whose cumulative interval contains `draw` (in `[0, 1)`).
pub fn select_sensor(readings: &[SensorReading; 3], exploration: f64, draw: f64) -> SensorReading {
    let probabilities = selection_probabilities(readings, exploration);
    let mut cumulative = 0.0;
    for (reading, p) in readings.iter().zip(probabilities) {
        cumulative += p;
        if draw < cumulative {
            return *reading;
        }
    }
    readings[2]
}

/// Deposit intensity for an agent `elapsed`/`travelled` past its milestone.
///
/// Fades linearly from `initial_intensity` toward a floor of
/// `min_intensity`, and drops to zero once past the trail horizon.
pub fn trail_intensity(params: &Parameters, milestone: Milestone, position: Vec2, now: f64) -> f64 {
    let progress = match params.trail_decay {
        TrailDecay::Time => {
            let horizon = params.max_trail_length / params.speed;
            (now - milestone.time) / horizon
        }
        TrailDecay::Distance => position.distance(milestone.position) / params.max_trail_length,
    }
    .max(0.0);
    if progress >= 1.0 {
        0.0
    } else {
        (params.initial_intensity * (1.0 - progress)).max(params.min_intensity)
    }
}

fn sense_and_steer(
    agent: &mut Agent,
    ctx: &NavigationContext<'_>,
    channel: Channel,
    exploration: f64,
) -> (Decision, f64) {
    let params = ctx.params;
    let readings = read_sensors(ctx.field, channel, agent.position, agent.heading, params);
    let strongest = readings.iter().map(|r| r.intensity).fold(0.0, f64::max);
    agent.signal_ema =
        (1.0 - params.ema_alpha) * agent.signal_ema + params.ema_alpha * strongest;

    if strongest <= params.min_intensity {
        if agent.signal_ema > params.min_intensity {
            let reversed = agent.turn_around_direction();
            agent.steer_toward(reversed);
            return (Decision::TurnAround, strongest);
        }
        let direction = agent.random_forward_direction();
        agent.steer_toward(direction);
        return (Decision::Wander, strongest);
    }

    let draw = agent.uniform();
    let chosen = select_sensor(&readings, exploration, draw);
    agent.steer_toward(chosen.direction);
    (Decision::FollowTrail(chosen.side), strongest)
}

fn wander(agent: &mut Agent) -> (Decision, f64) {
    let direction = agent.random_forward_direction();
    agent.steer_toward(direction);
    (Decision::Wander, 0.0)
}

/// Update the agent's heading for this tick.
pub fn decide(agent: &mut Agent, ctx: &NavigationContext<'_>) -> (Decision, f64) {
    let params = ctx.params;
    match agent.state() {
        AgentState::Searching => match agent.mode {
            BehaviorMode::Random => wander(agent),
            BehaviorMode::FoodTrailOnly | BehaviorMode::BothTrails => {
                if let Some(direction) = ctx
                    .food_index
                    .nearest_direction(agent.position, params.feel_radius)
                {
                    agent.set_heading(direction);
                    return (Decision::ApproachFood, 0.0);
                }
                sense_and_steer(agent, ctx, Channel::Food, params.exploration_rate)
            }
        },
        AgentState::Returning => {
            let Some(nest) = ctx.nests.get(agent.nest) else {
                return wander(agent);
            };
            let to_nest = nest.position - agent.position;
            match agent.mode {
                BehaviorMode::Random | BehaviorMode::FoodTrailOnly => {
                    agent.steer_toward(to_nest);
                    (Decision::ApproachNest, 0.0)
                }
                BehaviorMode::BothTrails if to_nest.length() <= params.sight_radius + nest.size => {
                    agent.set_heading(to_nest);
                    (Decision::ApproachNest, 0.0)
                }
                // no exploration while homing
                BehaviorMode::BothTrails => sense_and_steer(agent, ctx, Channel::Home, 0.0),
            }
        }
    }
}

fn boundary_escape(position: Vec2, displacement: Vec2, map_size: Vec2) -> Option<Vec2> {
    let proposed = position + displacement;
    let mut normal = Vec2::ZERO;
    if proposed.x < 0.0 && displacement.x < 0.0 {
        normal.x += 1.0;
    }
    if proposed.x > map_size.x && displacement.x > 0.0 {
        normal.x -= 1.0;
    }
    if proposed.y < 0.0 && displacement.y < 0.0 {
        normal.y += 1.0;
    }
    if proposed.y > map_size.y && displacement.y > 0.0 {
        normal.y -= 1.0;
    }
    (!normal.is_zero()).then(|| normal.normalized())
}

/// Advance the agent along its heading. On a boundary or obstacle hit the
/// agent moves along an escape heading for this tick instead. The result is
/// always inside the map. Returns true when an escape was taken.
pub fn move_agent(agent: &mut Agent, ctx: &NavigationContext<'_>) -> bool {
    let step = ctx.params.speed * ctx.dt;
    let position = agent.position;
    let displacement = agent.heading * step;
    let radius = ctx.collision_radius;

    let escape = boundary_escape(position, displacement, ctx.map_size).or_else(|| {
        ctx.obstacles
            .segment_blocked(position, position + displacement, radius)
            .then(|| {
                ctx.obstacles
                    .find_escape_heading(position, agent.heading, radius)
            })
    });

    match escape {
        None => agent.position = position + displacement,
        Some(direction) => {
            let direction = if direction.is_zero() {
                agent.turn_around();
                agent.heading
            } else {
                direction
            };
            let target = position + direction * step;
            if !ctx.obstacles.segment_blocked(position, target, radius)
                || ctx.obstacles.intersects(position, radius)
            {
                agent.position = target;
            }
            agent.steer_toward(direction);
        }
    }

    agent.position = Vec2::new(
        agent.position.x.clamp(0.0, ctx.map_size.x),
        agent.position.y.clamp(0.0, ctx.map_size.y),
    );
    escape.is_some()
}

/// Trail channel laid in the agent's current state, if its mode lays one.
pub fn trail_channel(mode: BehaviorMode, state: AgentState) -> Option<Channel> {
    match (mode, state) {
        (BehaviorMode::Random, _) => None,
        (BehaviorMode::FoodTrailOnly, AgentState::Searching) => None,
        (_, AgentState::Searching) => Some(Channel::Home),
        (_, AgentState::Returning) => Some(Channel::Food),
    }
}

fn plan_deposit(agent: &mut Agent, ctx: &NavigationContext<'_>) -> Option<Deposit> {
    let channel = trail_channel(agent.mode, agent.state())?;
    let params = ctx.params;
    let cell_size = ctx.field.cell_size();
    let min_distance = params.min_deposit_distance(cell_size);
    if !agent.should_deposit(ctx.now, min_distance, params.min_deposit_interval(cell_size)) {
        return None;
    }
    let amount =
        trail_intensity(params, agent.milestone(), agent.position, ctx.now) * channel.booster();
    // the field ignores amounts at or below the floor
    if !(amount > params.min_intensity) {
        return None;
    }
    agent.record_deposit(ctx.now);
    let jitter = agent.random_offset(min_distance * JITTER_FRACTION);
    Some(Deposit {
        position: agent.position + jitter,
        channel,
        amount,
    })
}

/// Full per-tick update of one agent: decide, move, plan a deposit.
pub fn step_agent(agent: &mut Agent, ctx: &NavigationContext<'_>) -> StepOutcome {
    let (decision, sensed) = decide(agent, ctx);
    let escaped = move_agent(agent, ctx);
    let deposit = plan_deposit(agent, ctx);
    StepOutcome {
        decision,
        sensed,
        deposit,
        escaped,
        snapshot_due: agent.take_snapshot_slot(ctx.now, ctx.snapshot_interval),
        decision_due: agent.take_decision_slot(ctx.now, ctx.snapshot_interval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParameterStore;
    use crate::entity::FoodSource;
    use crate::obstacle::Obstacle;
    use std::f64::consts::PI;

    struct Fixture {
        params: Parameters,
        field: DensityField,
        obstacles: ObstacleField,
        food_index: SpatialIndex,
        nests: Vec<Nest>,
    }

    impl Fixture {
        fn new() -> Self {
            let params = Parameters::default();
            Self {
                params,
                field: DensityField::new(1000.0, 800.0, 2.0, ParameterStore::new(params)),
                obstacles: ObstacleField::default(),
                food_index: SpatialIndex::default(),
                nests: vec![Nest::new(
                    Vec2::new(200.0, 400.0),
                    50.0,
                    BehaviorMode::BothTrails,
                    0,
                )],
            }
        }

        fn ctx(&self, now: f64) -> NavigationContext<'_> {
            NavigationContext {
                params: &self.params,
                field: &self.field,
                obstacles: &self.obstacles,
                food_index: &self.food_index,
                nests: &self.nests,
                map_size: Vec2::new(1000.0, 800.0),
                now,
                dt: 1.0 / 60.0,
                collision_radius: 0.0,
                snapshot_interval: 0.5,
            }
        }
    }

    fn agent_at(x: f64, y: f64, heading: Vec2, mode: BehaviorMode) -> Agent {
        Agent::new(0, Vec2::new(x, y), heading, mode, 0, 7, 0.0)
    }

    fn readings(front: f64, left: f64, right: f64) -> [SensorReading; 3] {
        let mk = |side, intensity| SensorReading {
            side,
            direction: Vec2::ZERO,
            intensity,
        };
        [
            mk(SensorSide::Front, front),
            mk(SensorSide::Left, left),
            mk(SensorSide::Right, right),
        ]
    }

    #[test]
    fn sensor_directions_are_symmetric() {
        let heading = Vec2::new(1.0, 0.0);
        let left = sensor_direction(heading, SensorSide::Left.offset(PI / 3.0));
        let right = sensor_direction(heading, SensorSide::Right.offset(PI / 3.0));
        assert!((left.y + right.y).abs() < 1e-12);
        assert!((left.x - 0.5).abs() < 1e-12);
        assert!(left.y > 0.0);
    }

    #[test]
    fn sensors_read_the_field_ahead() {
        let mut fx = Fixture::new();
        fx.field.deposit(Vec2::new(140.0, 100.0), Channel::Food, 2.0);
        let r = read_sensors(
            &fx.field,
            Channel::Food,
            Vec2::new(100.0, 100.0),
            Vec2::new(1.0, 0.0),
            &fx.params,
        );
        assert_eq!(r[0].side, SensorSide::Front);
        assert_eq!(r[0].intensity, 2.0);
        assert_eq!(r[1].intensity, 0.0);
        assert_eq!(r[2].intensity, 0.0);
    }

    #[test]
    fn probabilities_include_exploration_and_sum_to_one() {
        let p = selection_probabilities(&readings(2.0, 1.0, 1.0), 0.6);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // (0.5 + 0.2) / 1.6
        assert!((p[0] - 0.4375).abs() < 1e-12);
        let p = selection_probabilities(&readings(0.0, 0.0, 0.0), 0.0);
        assert_eq!(p, [1.0 / 3.0; 3]);
    }

    #[test]
    fn selection_walks_front_left_right() {
        let r = readings(1.0, 1.0, 2.0);
        assert_eq!(select_sensor(&r, 0.0, 0.0).side, SensorSide::Front);
        assert_eq!(select_sensor(&r, 0.0, 0.24).side, SensorSide::Front);
        assert_eq!(select_sensor(&r, 0.0, 0.26).side, SensorSide::Left);
        assert_eq!(select_sensor(&r, 0.0, 0.51).side, SensorSide::Right);
        assert_eq!(select_sensor(&r, 0.0, 0.999_999).side, SensorSide::Right);
    }

    #[test]
    fn no_exploration_picks_only_signal() {
        let r = readings(0.0, 3.0, 0.0);
        for draw in [0.0, 0.3, 0.7, 0.99] {
            assert_eq!(select_sensor(&r, 0.0, draw).side, SensorSide::Left);
        }
    }

    #[test]
    fn trail_intensity_time_mode() {
        let p = Parameters::default();
        let m = Milestone {
            position: Vec2::ZERO,
            time: 0.0,
        };
        // horizon = 700 / 250 = 2.8 s
        assert_eq!(trail_intensity(&p, m, Vec2::ZERO, 0.0), 1.0);
        assert!((trail_intensity(&p, m, Vec2::ZERO, 1.4) - 0.5).abs() < 1e-12);
        assert_eq!(trail_intensity(&p, m, Vec2::ZERO, 2.79), p.min_intensity);
        assert_eq!(trail_intensity(&p, m, Vec2::ZERO, 2.8), 0.0);
    }

    #[test]
    fn trail_intensity_distance_mode() {
        let p = Parameters {
            trail_decay: TrailDecay::Distance,
            ..Parameters::default()
        };
        let m = Milestone {
            position: Vec2::ZERO,
            time: 0.0,
        };
        assert!((trail_intensity(&p, m, Vec2::new(350.0, 0.0), 99.0) - 0.5).abs() < 1e-12);
        assert_eq!(trail_intensity(&p, m, Vec2::new(700.0, 0.0), 0.0), 0.0);
    }

    #[test]
    fn searching_agent_approaches_food_in_reach() {
        let mut fx = Fixture::new();
        let food = vec![FoodSource::new(0, Vec2::new(500.0, 530.0))];
        fx.food_index.rebuild(&food);
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        let (decision, _) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::ApproachFood);
        assert!((a.heading.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn random_searcher_wanders_past_food_in_reach() {
        let mut fx = Fixture::new();
        let food = vec![FoodSource::new(0, Vec2::new(500.0, 530.0))];
        fx.food_index.rebuild(&food);
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::Random);
        let (decision, _) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::Wander);
        assert!(a.heading.x > 0.5);
    }

    #[test]
    fn random_mode_ignores_pheromones() {
        let mut fx = Fixture::new();
        fx.field.deposit(Vec2::new(540.0, 500.0), Channel::Food, 5.0);
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::Random);
        let (decision, sensed) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::Wander);
        assert_eq!(sensed, 0.0);
        assert_eq!(a.signal_ema(), 0.0);
    }

    #[test]
    fn searching_agent_follows_food_trail() {
        let mut fx = Fixture::new();
        fx.params.exploration_rate = 0.0;
        fx.field.deposit(Vec2::new(540.0, 500.0), Channel::Food, 3.0);
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        let (decision, sensed) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::FollowTrail(SensorSide::Front));
        assert_eq!(sensed, 3.0);
        assert!(a.signal_ema() > 0.0);
    }

    #[test]
    fn lost_signal_blends_turn_around_while_average_decays() {
        let fx = Fixture::new();
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        a.signal_ema = 1.0;
        let (decision, _) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::TurnAround);
        assert!((a.signal_ema() - 0.95).abs() < 1e-12);
        // smoothed, not flipped in one tick
        assert!(a.heading.x > 0.9 && a.heading.x < 1.0);
        assert!((a.heading.length() - 1.0).abs() < 1e-12);

        // 0.95^58 > 0.05 >= 0.95^59
        let mut turns = 1;
        loop {
            let (decision, _) = decide(&mut a, &fx.ctx(0.1 * turns as f64));
            if decision != Decision::TurnAround {
                assert_eq!(decision, Decision::Wander);
                break;
            }
            turns += 1;
        }
        assert_eq!(turns, 58);
    }

    #[test]
    fn weak_signal_without_sensor_hit_wanders() {
        let mut fx = Fixture::new();
        // beside the agent, outside all three sensors
        fx.field.deposit(Vec2::new(501.0, 541.0), Channel::Food, 2.0);
        let mut a = agent_at(501.0, 501.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        let (decision, sensed) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::Wander);
        assert_eq!(sensed, 0.0);
        assert!(a.heading.x > 0.0);
    }

    #[test]
    fn returning_agents_head_home() {
        let fx = Fixture::new();
        let mut a = agent_at(230.0, 400.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        a.carrying = Some(1);
        let (decision, _) = decide(&mut a, &fx.ctx(0.0));
        assert_eq!(decision, Decision::ApproachNest);
        assert!((a.heading.x + 1.0).abs() < 1e-12);

        let mut far = agent_at(800.0, 400.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        far.carrying = Some(1);
        let (decision, _) = decide(&mut far, &fx.ctx(0.0));
        assert_ne!(decision, Decision::ApproachNest);

        for mode in [BehaviorMode::FoodTrailOnly, BehaviorMode::Random] {
            let mut direct = agent_at(800.0, 400.0, Vec2::new(0.0, 1.0), mode);
            direct.carrying = Some(1);
            let (decision, _) = decide(&mut direct, &fx.ctx(0.0));
            assert_eq!(decision, Decision::ApproachNest);
            // (0, 1) + 0.2 * (-1, 0), renormalized
            let expected = Vec2::new(-0.2, 1.0).normalized();
            assert!(direct.heading.distance(expected) < 1e-12, "{mode:?}");
        }
    }

    #[test]
    fn movement_escapes_map_edges() {
        let fx = Fixture::new();
        let mut a = agent_at(1.0, 400.0, Vec2::new(-1.0, 0.0), BehaviorMode::Random);
        assert!(move_agent(&mut a, &fx.ctx(0.0)));
        assert!(a.position.x > 1.0);
        assert!(a.position.x <= 1000.0);

        let mut corner = agent_at(999.0, 799.0, Vec2::new(1.0, 1.0), BehaviorMode::Random);
        assert!(move_agent(&mut corner, &fx.ctx(0.0)));
        assert!(corner.position.x < 999.0 && corner.position.y < 799.0);
    }

    #[test]
    fn movement_avoids_obstacles() {
        let mut fx = Fixture::new();
        fx.obstacles
            .insert(Obstacle::rectangle(Vec2::new(505.0, 500.0), 4.0, 400.0));
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::Random);
        assert!(move_agent(&mut a, &fx.ctx(0.0)));
        assert!(a.position.x <= 500.0);
        assert!(!fx.obstacles.intersects(a.position, 0.0));
    }

    #[test]
    fn free_movement_follows_heading() {
        let fx = Fixture::new();
        let mut a = agent_at(500.0, 500.0, Vec2::new(0.0, 1.0), BehaviorMode::Random);
        assert!(!move_agent(&mut a, &fx.ctx(0.0)));
        assert!((a.position.y - (500.0 + 250.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn trail_channels_by_mode_and_state() {
        use AgentState::*;
        assert_eq!(trail_channel(BehaviorMode::Random, Returning), None);
        assert_eq!(trail_channel(BehaviorMode::FoodTrailOnly, Searching), None);
        assert_eq!(
            trail_channel(BehaviorMode::FoodTrailOnly, Returning),
            Some(Channel::Food)
        );
        assert_eq!(
            trail_channel(BehaviorMode::BothTrails, Searching),
            Some(Channel::Home)
        );
    }

    #[test]
    fn deposits_are_gated_and_boosted() {
        let fx = Fixture::new();
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        a.carrying = Some(4);
        let first = plan_deposit(&mut a, &fx.ctx(0.0)).unwrap();
        assert_eq!(first.channel, Channel::Food);
        assert!((first.amount - 1.75).abs() < 1e-12);
        assert!(first.position.distance(a.position) <= 2.0 * JITTER_FRACTION + 1e-12);
        // neither moved nor waited
        assert!(plan_deposit(&mut a, &fx.ctx(0.0)).is_none());
        a.position = Vec2::new(503.0, 500.0);
        assert!(plan_deposit(&mut a, &fx.ctx(0.1)).is_some());
    }

    #[test]
    fn deposit_at_intensity_floor_leaves_gate_open() {
        let fx = Fixture::new();
        let params = &fx.params;
        let min_distance = params.min_deposit_distance(2.0);
        let interval = params.min_deposit_interval(2.0);
        // searching trail agent lays HOME (booster 1.0) at the floor by 2.79 s
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::BothTrails);
        assert!(plan_deposit(&mut a, &fx.ctx(2.79)).is_none());
        assert!(a.should_deposit(2.79, min_distance, interval));

        // FOOD at the same fade clears the floor thanks to its booster
        a.carrying = Some(4);
        let deposit = plan_deposit(&mut a, &fx.ctx(2.79)).unwrap();
        assert!((deposit.amount - params.min_intensity * 1.75).abs() < 1e-12);
        assert!(!a.should_deposit(2.79, min_distance, interval));
    }

    #[test]
    fn step_reports_rate_limited_snapshots() {
        let fx = Fixture::new();
        let mut a = agent_at(500.0, 500.0, Vec2::new(1.0, 0.0), BehaviorMode::Random);
        assert!(step_agent(&mut a, &fx.ctx(0.0)).snapshot_due);
        assert!(!step_agent(&mut a, &fx.ctx(0.1)).snapshot_due);
        assert!(step_agent(&mut a, &fx.ctx(0.6)).snapshot_due);
    }
}

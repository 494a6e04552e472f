use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::{Arc, PoisonError, RwLock};

/// Static setup of a simulation. Validated once by `World::try_new`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// Width of the rectangular map in world units.
    pub map_width: f64,
    /// Height of the rectangular map in world units.
    pub map_height: f64,
    /// Edge length of one density-field cell.
    pub cell_size: f64,
    /// Edge length of one spatial-index bucket.
    pub spatial_cell_size: f64,
    /// The density field advances once every `field_frame_skip` ticks.
    pub field_frame_skip: u32,
    /// Agent footprint; pickup reach is `agent_size + food_size / 2`.
    pub agent_size: f64,
    pub food_size: f64,
    /// Nest diameter. Food is dropped within half of it.
    pub nest_size: f64,
    /// Radius of the disc a clump spawns its food into.
    pub clump_radius: f64,
    /// Minimum seconds between two snapshot events of the same agent.
    pub snapshot_interval: f64,
    /// Collision radius used against obstacles.
    pub collision_radius: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            map_width: 1000.0,
            map_height: 800.0,
            cell_size: 2.0,
            spatial_cell_size: 10.0,
            field_frame_skip: 3,
            agent_size: 20.0,
            food_size: 5.0,
            nest_size: 50.0,
            clump_radius: 50.0,
            snapshot_interval: 0.5,
            collision_radius: 0.0,
        }
    }
}

macro_rules! define_sim_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SimConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SimConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_sim_config_error! {
    InvalidMapSize => "map_width and map_height must be positive and finite";
    MapTooLarge { max: f64, actual: f64 } => "map extent ({actual}) exceeds supported maximum ({max})";
    InvalidCellSize => "cell_size must be positive and finite";
    TooManyCells { max: usize, actual: usize } => "density grid cell count ({actual}) exceeds supported maximum ({max})";
    InvalidSpatialCellSize => "spatial_cell_size must be positive and finite";
    InvalidFrameSkip => "field_frame_skip must be at least 1";
    InvalidAgentSize => "agent_size must be finite and non-negative";
    InvalidFoodSize => "food_size must be finite and non-negative";
    InvalidNestSize => "nest_size must be positive and finite";
    InvalidClumpRadius => "clump_radius must be finite and non-negative";
    InvalidSnapshotInterval => "snapshot_interval must be finite and non-negative";
    InvalidCollisionRadius => "collision_radius must be finite and non-negative";
}

impl std::error::Error for SimConfigError {}

impl SimConfig {
    pub const MAX_MAP_EXTENT: f64 = 8192.0;
    pub const MAX_GRID_CELLS: usize = 8_388_608;
    pub const MAX_AGENTS: usize = 100_000;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_map()?;
        self.validate_sizes()?;
        self.validate_timing()?;
        Ok(())
    }

    fn validate_map(&self) -> Result<(), SimConfigError> {
        if !(self.map_width.is_finite()
            && self.map_width > 0.0
            && self.map_height.is_finite()
            && self.map_height > 0.0)
        {
            return Err(SimConfigError::InvalidMapSize);
        }
        let extent = self.map_width.max(self.map_height);
        if extent > Self::MAX_MAP_EXTENT {
            return Err(SimConfigError::MapTooLarge {
                max: Self::MAX_MAP_EXTENT,
                actual: extent,
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(SimConfigError::InvalidCellSize);
        }
        let (columns, rows) = self.grid_dimensions();
        let cells = columns.saturating_mul(rows);
        if cells > Self::MAX_GRID_CELLS {
            return Err(SimConfigError::TooManyCells {
                max: Self::MAX_GRID_CELLS,
                actual: cells,
            });
        }
        if !(self.spatial_cell_size.is_finite() && self.spatial_cell_size > 0.0) {
            return Err(SimConfigError::InvalidSpatialCellSize);
        }
        Ok(())
    }

    fn validate_sizes(&self) -> Result<(), SimConfigError> {
        if !(self.agent_size.is_finite() && self.agent_size >= 0.0) {
            return Err(SimConfigError::InvalidAgentSize);
        }
        if !(self.food_size.is_finite() && self.food_size >= 0.0) {
            return Err(SimConfigError::InvalidFoodSize);
        }
        if !(self.nest_size.is_finite() && self.nest_size > 0.0) {
            return Err(SimConfigError::InvalidNestSize);
        }
        if !(self.clump_radius.is_finite() && self.clump_radius >= 0.0) {
            return Err(SimConfigError::InvalidClumpRadius);
        }
        if !(self.collision_radius.is_finite() && self.collision_radius >= 0.0) {
            return Err(SimConfigError::InvalidCollisionRadius);
        }
        Ok(())
    }

    fn validate_timing(&self) -> Result<(), SimConfigError> {
        if self.field_frame_skip == 0 {
            return Err(SimConfigError::InvalidFrameSkip);
        }
        if !(self.snapshot_interval.is_finite() && self.snapshot_interval >= 0.0) {
            return Err(SimConfigError::InvalidSnapshotInterval);
        }
        Ok(())
    }

    /// Density grid dimensions `(columns, rows)` for this map.
    pub fn grid_dimensions(&self) -> (usize, usize) {
        let columns = (self.map_width / self.cell_size).ceil().max(1.0) as usize;
        let rows = (self.map_height / self.cell_size).ceil().max(1.0) as usize;
        (columns, rows)
    }

    /// Distance within which a searching agent picks food up.
    pub fn pickup_radius(&self) -> f64 {
        self.agent_size + self.food_size * 0.5
    }

    /// Distance within which a returning agent drops food at its nest.
    pub fn drop_radius(&self) -> f64 {
        self.nest_size * 0.5
    }
}

/// How deposit intensity fades along a trail.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrailDecay {
    /// Fade by time elapsed since the milestone, against `max_trail_length / speed`.
    #[default]
    Time,
    /// Fade by distance from the milestone position, against `max_trail_length`.
    Distance,
}

/// Runtime parameters read by the density field and the navigator every tick.
///
/// All values are clamped to their documented ranges by [`Parameters::clamped`];
/// non-finite values fall back to the default.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub evaporation_rate: f64,
    pub max_intensity: f64,
    pub min_intensity: f64,
    pub initial_intensity: f64,
    pub max_trail_length: f64,
    pub sight_radius: f64,
    pub feel_radius: f64,
    pub sensor_radius: f64,
    pub sensor_angle: f64,
    pub speed: f64,
    pub exploration_rate: f64,
    pub diffusion_rate: f64,
    pub ema_alpha: f64,
    pub trail_decay: TrailDecay,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            evaporation_rate: 0.15,
            max_intensity: 5.0,
            min_intensity: 0.05,
            initial_intensity: 1.0,
            max_trail_length: 700.0,
            sight_radius: 70.0,
            feel_radius: 40.0,
            sensor_radius: 7.0,
            sensor_angle: PI / 3.0,
            speed: 250.0,
            exploration_rate: 0.5,
            diffusion_rate: 0.3,
            ema_alpha: 0.05,
            trail_decay: TrailDecay::Time,
        }
    }
}

fn clamp_or_default(value: f64, default: f64, range: (f64, f64)) -> f64 {
    if value.is_finite() {
        value.clamp(range.0, range.1)
    } else {
        default
    }
}

impl Parameters {
    pub const EVAPORATION_RATE_RANGE: (f64, f64) = (0.1, 0.99);
    pub const MAX_INTENSITY_RANGE: (f64, f64) = (1.0, 10.0);
    pub const MIN_INTENSITY_RANGE: (f64, f64) = (0.01, 0.5);
    pub const INITIAL_INTENSITY_RANGE: (f64, f64) = (0.1, 5.0);
    pub const MAX_TRAIL_LENGTH_RANGE: (f64, f64) = (100.0, 1500.0);
    pub const SIGHT_RADIUS_RANGE: (f64, f64) = (20.0, 150.0);
    pub const FEEL_RADIUS_RANGE: (f64, f64) = (10.0, 100.0);
    pub const SENSOR_RADIUS_RANGE: (f64, f64) = (1.0, 30.0);
    pub const SENSOR_ANGLE_RANGE: (f64, f64) = (PI / 12.0, PI / 2.0);
    pub const SPEED_RANGE: (f64, f64) = (50.0, 500.0);
    pub const EXPLORATION_RATE_RANGE: (f64, f64) = (0.0, 1.0);
    pub const DIFFUSION_RATE_RANGE: (f64, f64) = (0.0, 0.8);
    pub const EMA_ALPHA_RANGE: (f64, f64) = (0.01, 1.0);

    /// Returns a copy with every field inside its range.
    pub fn clamped(self) -> Self {
        let d = Self::default();
        Self {
            evaporation_rate: clamp_or_default(
                self.evaporation_rate,
                d.evaporation_rate,
                Self::EVAPORATION_RATE_RANGE,
            ),
            max_intensity: clamp_or_default(
                self.max_intensity,
                d.max_intensity,
                Self::MAX_INTENSITY_RANGE,
            ),
            min_intensity: clamp_or_default(
                self.min_intensity,
                d.min_intensity,
                Self::MIN_INTENSITY_RANGE,
            ),
            initial_intensity: clamp_or_default(
                self.initial_intensity,
                d.initial_intensity,
                Self::INITIAL_INTENSITY_RANGE,
            ),
            max_trail_length: clamp_or_default(
                self.max_trail_length,
                d.max_trail_length,
                Self::MAX_TRAIL_LENGTH_RANGE,
            ),
            sight_radius: clamp_or_default(
                self.sight_radius,
                d.sight_radius,
                Self::SIGHT_RADIUS_RANGE,
            ),
            feel_radius: clamp_or_default(self.feel_radius, d.feel_radius, Self::FEEL_RADIUS_RANGE),
            sensor_radius: clamp_or_default(
                self.sensor_radius,
                d.sensor_radius,
                Self::SENSOR_RADIUS_RANGE,
            ),
            sensor_angle: clamp_or_default(
                self.sensor_angle,
                d.sensor_angle,
                Self::SENSOR_ANGLE_RANGE,
            ),
            speed: clamp_or_default(self.speed, d.speed, Self::SPEED_RANGE),
            exploration_rate: clamp_or_default(
                self.exploration_rate,
                d.exploration_rate,
                Self::EXPLORATION_RATE_RANGE,
            ),
            diffusion_rate: clamp_or_default(
                self.diffusion_rate,
                d.diffusion_rate,
                Self::DIFFUSION_RATE_RANGE,
            ),
            ema_alpha: clamp_or_default(self.ema_alpha, d.ema_alpha, Self::EMA_ALPHA_RANGE),
            trail_decay: self.trail_decay,
        }
    }

    /// Minimum spacing between two deposits of one agent: one field cell.
    pub fn min_deposit_distance(&self, cell_size: f64) -> f64 {
        cell_size
    }

    /// Minimum time between two deposits of one agent.
    pub fn min_deposit_interval(&self, cell_size: f64) -> f64 {
        self.min_deposit_distance(cell_size) / self.speed
    }
}

/// Shared, hot-reloadable parameter handle.
///
/// Cloning the store shares the underlying values. Readers take a
/// [`snapshot`](ParameterStore::snapshot) once per tick; writers go through
/// [`update`](ParameterStore::update) or [`replace`](ParameterStore::replace),
/// both of which clamp.
#[derive(Clone, Debug, Default)]
pub struct ParameterStore {
    inner: Arc<RwLock<Parameters>>,
}

impl ParameterStore {
    pub fn new(params: Parameters) -> Self {
        Self {
            inner: Arc::new(RwLock::new(params.clamped())),
        }
    }

    pub fn snapshot(&self) -> Parameters {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the current values, clamp, and return the stored result.
    pub fn update<F>(&self, f: F) -> Parameters
    where
        F: FnOnce(&mut Parameters),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = *guard;
        f(&mut next);
        *guard = next.clamped();
        *guard
    }

    pub fn replace(&self, params: Parameters) -> Parameters {
        self.update(|p| *p = params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_finite_map() {
        let config = SimConfig {
            map_width: f64::NAN,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(SimConfigError::InvalidMapSize));
    }

    #[test]
    fn rejects_oversized_map() {
        let config = SimConfig {
            map_width: 10_000.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::MapTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_too_many_cells() {
        let config = SimConfig {
            map_width: 8000.0,
            map_height: 8000.0,
            cell_size: 1.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimConfigError::TooManyCells { .. })
        ));
    }

    #[test]
    fn rejects_zero_frame_skip() {
        let config = SimConfig {
            field_frame_skip: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(SimConfigError::InvalidFrameSkip));
    }

    #[test]
    fn grid_dimensions_round_up() {
        let config = SimConfig {
            map_width: 1001.0,
            map_height: 800.0,
            cell_size: 2.0,
            ..SimConfig::default()
        };
        assert_eq!(config.grid_dimensions(), (501, 400));
    }

    #[test]
    fn error_messages_name_the_field() {
        let msg = SimConfigError::InvalidCellSize.to_string();
        assert!(msg.contains("cell_size"));
        let msg = SimConfigError::MapTooLarge {
            max: 10.0,
            actual: 20.0,
        }
        .to_string();
        assert!(msg.contains("20") && msg.contains("10"));
    }

    #[test]
    fn parameters_clamp_into_range() {
        let p = Parameters {
            evaporation_rate: 5.0,
            min_intensity: -1.0,
            speed: 10_000.0,
            exploration_rate: f64::NAN,
            ..Parameters::default()
        }
        .clamped();
        assert_eq!(p.evaporation_rate, 0.99);
        assert_eq!(p.min_intensity, 0.01);
        assert_eq!(p.speed, 500.0);
        assert_eq!(p.exploration_rate, Parameters::default().exploration_rate);
    }

    #[test]
    fn defaults_are_already_in_range() {
        assert_eq!(Parameters::default().clamped(), Parameters::default());
    }

    #[test]
    fn store_updates_are_visible_to_clones() {
        let store = ParameterStore::default();
        let reader = store.clone();
        store.update(|p| p.diffusion_rate = 2.0);
        assert_eq!(reader.snapshot().diffusion_rate, 0.8);
        store.replace(Parameters::default());
        assert_eq!(reader.snapshot(), Parameters::default());
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let p: Parameters =
            serde_json::from_str(r#"{"speed": 120.0, "trail_decay": "distance"}"#).unwrap();
        assert_eq!(p.speed, 120.0);
        assert_eq!(p.trail_decay, TrailDecay::Distance);
        assert_eq!(p.feel_radius, 40.0);
    }
}

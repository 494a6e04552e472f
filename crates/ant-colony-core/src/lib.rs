//! Ant-colony pheromone engine: a two-channel density field, agents that
//! sense and lay trails in it, obstacles, and the tick loop that ties them
//! together.

pub mod agent;
pub mod config;
pub mod density;
pub mod entity;
pub mod events;
pub mod handle;
pub mod navigation;
pub mod obstacle;
pub mod rng;
pub mod spatial;
pub mod vector;
pub mod world;

pub use agent::{Agent, AgentState, BehaviorMode};
pub use config::{ParameterStore, Parameters, SimConfig, SimConfigError, TrailDecay};
pub use density::{Channel, DensityField};
pub use entity::{FoodClump, FoodSource, Nest};
pub use events::{DomainEvent, EventHook, EventKind, NullEventHook, RecordingEventHook, TickStats};
pub use handle::SimulationHandle;
pub use obstacle::{Obstacle, ObstacleField, Shape};
pub use spatial::SpatialIndex;
pub use vector::Vec2;
pub use world::{ExperimentError, RunSummary, StepMetrics, StepTimings, World, WorldInitError};

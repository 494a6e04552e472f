use crate::vector::Vec2;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ExperimentStart,
    FoodPickedUp,
    FoodDropped,
    AgentSnapshot,
    AgentDecision,
    ClumpExhausted,
    SimulationStopped,
}

/// Discrete simulation event handed to the [`EventHook`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Simulation time in seconds.
    pub timestamp: f64,
    pub kind: EventKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl DomainEvent {
    pub fn new(timestamp: f64, kind: EventKind, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            description: description.into(),
            position: None,
            data: None,
        }
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Sink for domain events (CSV exporters, loggers, test recorders).
pub trait EventHook: Send {
    fn on_event(&mut self, event: &DomainEvent);

    /// Whether events of `kind` should be built at all. Per-agent events are
    /// skipped entirely when this returns false.
    fn wants(&self, _kind: EventKind) -> bool {
        true
    }
}

/// No-op event sink.
#[derive(Debug, Default)]
pub struct NullEventHook;

impl EventHook for NullEventHook {
    fn on_event(&mut self, _event: &DomainEvent) {}

    fn wants(&self, _kind: EventKind) -> bool {
        false
    }
}

/// Keeps every event in memory. Clones share the same buffer, so a clone can
/// be kept to inspect what the world emitted.
#[derive(Clone, Debug, Default)]
pub struct RecordingEventHook {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingEventHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl EventHook for RecordingEventHook {
    fn on_event(&mut self, event: &DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Per-tick statistics passed to the stats callback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    pub active_agents: usize,
    pub active_food: usize,
    pub frames_per_second: f64,
}

pub type StatsCallback = Box<dyn FnMut(&TickStats) + Send>;

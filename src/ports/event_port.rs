//! Port for simulation event delivery.

use crate::domain::engine::EngineEvent;

/// Receives engine events as the simulation produces them.
///
/// Sinks observe; they never influence the run. A sink that fails should
/// log and carry on rather than surface an error into the engine loop.
pub trait EventSink {
    fn publish(&mut self, event: &EngineEvent);
}

/// Sink that discards every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&mut self, _event: &EngineEvent) {}
}

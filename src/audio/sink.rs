use crate::audio_api::{GraphCommand, GraphEvent};
use crate::player::EngineError;

/// Where the engine's signal graph actually runs, plus the clock that paces it.
///
/// The binding is handed to the engine at construction, so each engine owns
/// exactly one output and two engines never share one.
pub trait OutputSink {
    fn sample_rate(&self) -> u32;

    /// Seconds of audio the sink has rendered. Stands still while suspended.
    fn now(&self) -> f64;

    fn is_suspended(&self) -> bool;

    fn resume(&mut self) -> Result<(), EngineError>;

    fn suspend(&mut self);

    fn send(&mut self, cmd: GraphCommand);

    fn poll_event(&mut self) -> Option<GraphEvent>;
}

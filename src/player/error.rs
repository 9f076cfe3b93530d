//! Engine error types

use thiserror::Error;

/// Errors surfaced by the playback engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input bytes were not a format the decoder understands
    #[error("Could not decode audio: {0}")]
    Decode(String),

    /// Render requested before any file was loaded
    #[error("No audio file loaded")]
    NoSignalLoaded,

    /// The output device declined to start its clock
    #[error("Audio output could not be started: {0}")]
    ClockResume(String),

    /// A background job was superseded before it finished
    #[error("Cancelled")]
    Cancelled,

    /// Writing the rendered file failed
    #[error("Failed to encode wav: {0}")]
    Encode(#[from] hound::Error),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

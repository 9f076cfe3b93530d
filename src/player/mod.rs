mod engine;
mod error;
mod jobs;
pub mod params;
mod render;

pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, EngineResult};
pub use jobs::CancelFlag;
pub use params::EffectParams;


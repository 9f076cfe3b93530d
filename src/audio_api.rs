pub use crate::audio::{ConvolverKernel, Source};

#[derive(Clone)]
pub enum GraphCommand {
    // The graph can't decode or build kernels (interrupts the audio thread),
    // so sources and impulse kernels are prepared first and handed over whole.
    Start { source: Box<Source>, rate: f32 },
    StopSource,

    SetPlaybackRate(f32),
    SetReverbMix(f32),
    SetImpulse(Box<ConvolverKernel>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    // A source played through to its last frame without being stopped
    SourceEnded { generation: u64 },
}

// What the audio thread lets go of. Sent back so kernels and signals are freed
// on the control side instead of inside the callback.
pub enum Retired {
    Source(Source),
    Kernel(Box<ConvolverKernel>),
}

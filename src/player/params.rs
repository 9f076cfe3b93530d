use serde::{Deserialize, Serialize};

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 4.0;
pub const MIN_TAIL: f32 = 0.01;
pub const MAX_TAIL: f32 = 30.0;

/// The three effect controls. Always defined; every setter sanitises.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub playback_rate: f32, // 1.0 = original speed, pitch follows
    pub reverb_mix: f32,    // wet gain at the output, 0.0 to 1.0
    pub reverb_tail: f32,   // impulse response length in seconds
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            playback_rate: 0.85,
            reverb_mix: 0.35,
            reverb_tail: 3.0,
        }
    }
}

impl EffectParams {
    // Clamp everything into range, e.g. after loading hand-edited settings
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            playback_rate: sanitize_rate(self.playback_rate).unwrap_or(d.playback_rate),
            reverb_mix: sanitize_mix(self.reverb_mix).unwrap_or(d.reverb_mix),
            reverb_tail: sanitize_tail(self.reverb_tail).unwrap_or(d.reverb_tail),
        }
    }
}

pub fn sanitize_rate(rate: f32) -> Option<f32> {
    rate.is_finite().then(|| rate.clamp(MIN_RATE, MAX_RATE))
}

pub fn sanitize_mix(mix: f32) -> Option<f32> {
    mix.is_finite().then(|| mix.clamp(0.0, 1.0))
}

pub fn sanitize_tail(seconds: f32) -> Option<f32> {
    seconds.is_finite().then(|| seconds.clamp(MIN_TAIL, MAX_TAIL))
}

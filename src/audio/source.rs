use std::sync::Arc;

use super::frame::StereoFrame;
use super::signal::LoadedSignal;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

// One playthrough of the loaded signal. Speed and pitch move together:
// the read head advances `rate` source frames per output frame.
#[derive(Clone, Debug)]
pub struct Source {
    signal: Arc<LoadedSignal>,
    pos: f64,
    generation: u64,
    active: bool,
}

impl Source {
    pub fn new(signal: Arc<LoadedSignal>, offset_seconds: f64, generation: u64) -> Self {
        let pos = (offset_seconds.max(0.0) * signal.sample_rate() as f64).min(signal.len() as f64);
        Self {
            signal,
            pos,
            generation,
            active: true,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        !self.active
    }

    // Position of the read head in seconds of source material
    pub fn position(&self) -> f64 {
        self.pos / self.signal.sample_rate() as f64
    }

    // Next output frame at `rate`, or None once the signal has run out
    #[inline]
    pub fn next_frame(&mut self, rate: f32) -> Option<StereoFrame> {
        if !self.active {
            return None;
        }
        let data = self.signal.frames();
        if self.pos >= data.len() as f64 {
            self.active = false;
            return None;
        }

        // read sample at current position
        let i = self.pos as usize;
        let frac = (self.pos - i as f64) as f32;
        let s0 = data[i];
        let s1 = data.get(i + 1).copied().unwrap_or(s0);
        let sample = StereoFrame {
            left: lerp(s0.left, s1.left, frac),
            right: lerp(s0.right, s1.right, frac),
        };

        // advance position
        self.pos += rate.max(0.0) as f64;
        Some(sample)
    }
}

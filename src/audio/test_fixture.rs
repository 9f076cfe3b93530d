// Purely for testing: synthesised sine fixtures, as encoded files and as loaded signals.

use std::sync::Arc;

use super::frame::StereoFrame;
use super::signal::LoadedSignal;
use super::wav;

pub fn sine_frames(seconds: f64, rate: u32) -> Vec<StereoFrame> {
    (0..(seconds * rate as f64).round() as usize)
        .map(|i| StereoFrame::splat((i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin() * 0.5))
        .collect()
}

// A 440 Hz sine at half scale, encoded as a 16-bit wav file
pub fn sine_wav(seconds: f64, rate: u32, channels: u16) -> Vec<u8> {
    wav::encode(&sine_frames(seconds, rate), channels, rate).unwrap()
}

pub fn sine_signal(seconds: f64, rate: u32, channels: u16) -> Arc<LoadedSignal> {
    Arc::new(LoadedSignal::from_frames(sine_frames(seconds, rate), channels, rate))
}

// Types passed between the tui and the middle layer.
//
// The tui only resolves keys into `InputEvent`s and draws whatever
// `DisplayState` the middle layer hands it each frame. All playback and
// parameter state lives behind the middle layer.
//
// Keys:
//   Space         //  TogglePlay
//   s             //  Stop
//   Left / Right  //  SeekBy(-step / +step)
//   [ / ]         //  RateBy(-0.01 / 0.01)
//   - / =         //  MixBy(-0.05 / 0.05)
//   , / .         //  TailBy(-0.25 / 0.25)
//   e             //  Export
//   Esc / q       //  Quit
//   paste a path  //  LoadPath
//   media keys    //  Media(..)
//   focus gained  //  VisibilityRegained

use std::path::PathBuf;

use crate::mirror::TransportCommand;

pub const RATE_STEP: f32 = 0.01;
pub const MIX_STEP: f32 = 0.05;
pub const TAIL_STEP: f32 = 0.25;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    TogglePlay,
    Stop,
    SeekBy(f64), // in units of the seek step
    RateBy(f32),
    MixBy(f32),
    TailBy(f32),
    Export,
    LoadPath(PathBuf),
    Media(TransportCommand),
    VisibilityRegained,
    Quit,
}

#[derive(Clone, Debug, Default)]
pub struct DisplayState {
    pub title: String, // file name, or a hint when nothing is loaded
    pub has_signal: bool,
    pub playing: bool,
    pub position: f64,
    pub duration: f64,
    pub rate: f32,
    pub mix: f32,
    pub tail: f32,
    pub busy: Option<&'static str>, // "decoding" / "rendering" while a job is out
    pub message: Option<String>,
    pub clock_suspended: bool,
}

impl DisplayState {
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

// m:ss, or h:mm:ss past an hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

// everything about a session worth keeping between runs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mirror::{DEFAULT_INTERVAL, DEFAULT_SEEK_STEP};
use crate::player::EffectParams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub effects: EffectParams,

    // how often the media session is refreshed
    pub mirror_interval_ms: u64,
    // seconds skipped by arrow keys and seek media buttons
    pub seek_step: f64,
    // exports land next to the project unless this is set
    pub export_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            effects: EffectParams::default(),
            mirror_interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            seek_step: DEFAULT_SEEK_STEP,
            export_dir: None,
        }
    }
}

impl Settings {
    pub fn mirror_interval(&self) -> Duration {
        Duration::from_millis(self.mirror_interval_ms.max(1))
    }

    pub fn seek_step(&self) -> f64 {
        if self.seek_step.is_finite() && self.seek_step > 0.0 {
            self.seek_step
        } else {
            DEFAULT_SEEK_STEP
        }
    }
}

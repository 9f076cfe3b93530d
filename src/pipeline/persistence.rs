// to be called on startup and quit; saves settings so the next session picks up where this one left off
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::settings::Settings;

const SLOWVERB_DIR: &str = ".slowverb";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "slowverb.log";

// <project_dir>/.slowverb/
pub fn app_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(SLOWVERB_DIR)
}

// <project_dir>/.slowverb/settings.json
fn settings_file_path(project_dir: &Path) -> PathBuf {
    app_dir(project_dir).join(SETTINGS_FILE)
}

// <project_dir>/.slowverb/slowverb.log
pub fn log_file_path(project_dir: &Path) -> PathBuf {
    app_dir(project_dir).join(LOG_FILE)
}

pub fn load_settings(project_dir: &Path) -> Option<Settings> {
    let path = settings_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Settings>(&data) {
        Ok(mut settings) => {
            settings.effects = settings.effects.sanitized();
            Some(settings)
        }
        Err(e) => {
            log::warn!("ignoring unreadable {}: {e}", path.display());
            None
        }
    }
}

// Save settings to disk, making the files if they don't exist already
pub fn save_settings(project_dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    let path = settings_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?; // create .slowverb/ if needed
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

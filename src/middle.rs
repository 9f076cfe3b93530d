// The middle layer: turns tui input into engine calls, reacts to what the
// engine reports back, and builds the DisplayState the tui draws each frame.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::audio::{OutputSink, wav};
use crate::loader::file_loader;
use crate::mirror::{MediaKeys, MediaSession, TransportMirror};
use crate::pipeline::Settings;
use crate::player::{Engine, EngineEvent};
use crate::shared::{DisplayState, InputEvent};

const EMPTY_TITLE: &str = "drop an audio file here (paste its path)";

pub struct Middle<S: OutputSink, M: MediaSession> {
    engine: Engine<S>,
    mirror: TransportMirror<M>,
    media_keys: Option<MediaKeys>,
    settings: Settings,
    export_dir: PathBuf,
    pending_export: Option<String>, // source name of the render in flight
    message: Option<String>,
}

impl<S: OutputSink, M: MediaSession> Middle<S, M> {
    pub fn new(engine: Engine<S>, mirror: TransportMirror<M>, settings: Settings, project_dir: &Path) -> Self {
        let export_dir = settings
            .export_dir
            .clone()
            .unwrap_or_else(|| project_dir.to_path_buf());
        Self {
            engine,
            mirror,
            media_keys: None,
            settings,
            export_dir,
            pending_export: None,
            message: None,
        }
    }

    // route terminal media keys through the mirror's session
    pub fn with_media_keys(mut self, keys: MediaKeys) -> Self {
        self.media_keys = Some(keys);
        self
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    pub fn mirror(&self) -> &TransportMirror<M> {
        &self.mirror
    }

    // settings as they should be saved right now
    pub fn settings(&self) -> Settings {
        Settings {
            effects: self.engine.params(),
            ..self.settings.clone()
        }
    }

    pub fn load_path(&mut self, path: &Path) {
        match file_loader::read_input(path) {
            Ok(input) => {
                self.message = Some(format!("loading {}", input.name));
                self.engine.begin_load(input.name, input.extension, input.bytes);
            }
            Err(e) => {
                log::warn!("{e:#}");
                self.message = Some(format!("{e:#}"));
            }
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::TogglePlay => {
                if self.engine.is_playing() {
                    self.engine.pause();
                } else if let Err(e) = self.engine.play() {
                    self.message = Some(e.to_string());
                }
            }
            InputEvent::Stop => self.engine.stop(),
            InputEvent::SeekBy(steps) => {
                let target = self.engine.position() + steps * self.settings.seek_step();
                if let Err(e) = self.engine.seek(target) {
                    self.message = Some(e.to_string());
                }
            }
            InputEvent::RateBy(delta) => {
                let rate = self.engine.playback_rate() + delta;
                self.engine.set_playback_rate(rate);
            }
            InputEvent::MixBy(delta) => {
                let mix = self.engine.reverb_volume() + delta;
                self.engine.set_reverb_volume(mix);
            }
            InputEvent::TailBy(delta) => {
                let tail = self.engine.reverb_length() + delta;
                self.engine.set_reverb_length(tail);
            }
            InputEvent::Export => self.export(),
            InputEvent::LoadPath(path) => self.load_path(&path),
            InputEvent::Media(cmd) => match &self.media_keys {
                Some(keys) => keys.press(cmd),
                None => log::debug!("no media session for {cmd:?}"),
            },
            InputEvent::VisibilityRegained => self.mirror.visibility_regained(),
            InputEvent::Quit => {} // handled by the main loop
        }
    }

    // once per frame: pick up finished jobs, then let the mirror catch up
    pub fn tick(&mut self, now: Instant) {
        for event in self.engine.poll() {
            match event {
                EngineEvent::Loaded { name, .. } => self.message = Some(format!("loaded {name}")),
                EngineEvent::LoadFailed(e) => self.message = Some(e.to_string()),
                EngineEvent::Rendered(bytes) => self.finish_export(&bytes),
                EngineEvent::RenderFailed(e) => {
                    self.pending_export = None;
                    self.message = Some(e.to_string());
                }
                EngineEvent::PlaybackEnded => {}
            }
        }
        self.mirror.tick(&mut self.engine, now);
    }

    fn export(&mut self) {
        let Some(name) = self.engine.file_name().map(str::to_string) else {
            self.message = Some("nothing to export, load a file first".into());
            return;
        };
        if self.engine.is_rendering() {
            self.message = Some("already rendering, one export at a time".into());
            return;
        }
        match self.engine.begin_render() {
            Ok(()) => {
                self.message = Some(format!("rendering {}", file_loader::export_file_name(&name)));
                self.pending_export = Some(name);
            }
            Err(e) => self.message = Some(e.to_string()),
        }
    }

    fn finish_export(&mut self, bytes: &[u8]) {
        let name = self.pending_export.take().unwrap_or_default();
        match file_loader::write_export(&self.export_dir, &name, bytes) {
            Ok(path) => {
                log::info!("exported {} ({}, {} bytes)", path.display(), wav::MIME_TYPE, bytes.len());
                self.message = Some(format!("exported {}", path.display()));
            }
            Err(e) => {
                log::error!("export failed: {e:#}");
                self.message = Some(format!("export failed: {e:#}"));
            }
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let busy = if self.engine.is_loading() {
            Some("decoding")
        } else if self.engine.is_rendering() {
            Some("rendering")
        } else {
            None
        };
        DisplayState {
            title: self.engine.file_name().unwrap_or(EMPTY_TITLE).to_string(),
            has_signal: self.engine.has_signal(),
            playing: self.engine.is_playing(),
            position: self.engine.position(),
            duration: self.engine.duration(),
            rate: self.engine.playback_rate(),
            mix: self.engine.reverb_volume(),
            tail: self.engine.reverb_length(),
            busy,
            message: self.message.clone(),
            clock_suspended: self.engine.clock_suspended(),
        }
    }
}

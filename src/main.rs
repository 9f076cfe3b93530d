mod audio;
mod audio_api;
mod loader;
mod middle;
mod mirror;
mod pipeline;
mod player;
mod shared;
mod tui;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{
    DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use middle::Middle;
use mirror::{TerminalSession, TransportMirror};
use pipeline::persistence;
use player::Engine;
use shared::InputEvent;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// first argument: a project directory, or an audio file to open (its directory becomes the project)
fn resolve_args(arg: Option<String>) -> (PathBuf, Option<PathBuf>) {
    let cwd = || std::env::current_dir().unwrap_or_default();
    match arg.map(PathBuf::from) {
        Some(path) if path.is_dir() => (path, None),
        Some(path) => (cwd(), Some(path)),
        None => (cwd(), None),
    }
}

// the terminal belongs to the ui, so logs go to <project>/.slowverb/slowverb.log
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let path = persistence::log_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let (project_dir, input) = resolve_args(std::env::args().nth(1));
    init_logging(&project_dir)?;
    log::info!("project dir {}", project_dir.display());

    let settings = persistence::load_settings(&project_dir).unwrap_or_default();
    let sink = audio::start_audio()?;
    let engine = Engine::new(sink, settings.effects);
    let (session, media_keys) = TerminalSession::new();
    let mirror = TransportMirror::new(session, settings.mirror_interval(), settings.seek_step());
    let mut middle = Middle::new(engine, mirror, settings, &project_dir).with_media_keys(media_keys);
    if let Some(path) = input {
        middle.load_path(&path);
    }

    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnableBracketedPaste, EnableFocusChange)?;
    // Enable keyboard enhancement for media keys and key repeat reporting.
    // Falls back gracefully if the terminal doesn't support it.
    let _ = crossterm::execute!(
        std::io::stdout(),
        PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        middle.tick(Instant::now());
        let ds = middle.display_state();
        let now_playing = middle.mirror().session().now_playing().map(|s| s.to_string());

        tui_state.playing = ds.playing;
        tui_state.has_signal = ds.has_signal;
        if ds.busy.is_some() {
            tui_state.spinner = tui_state.spinner.wrapping_add(1);
        }

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, now_playing, tui_state.spinner / 6);
        })?;

        for event in tui::input::poll_input(tick_rate, &tui_state)? {
            if event == InputEvent::Quit {
                // save before quitting
                if let Err(e) = persistence::save_settings(&project_dir, &middle.settings()) {
                    log::error!("could not save settings: {e:#}");
                }
                drop(term);
                return Ok(());
            }
            middle.handle_input(event);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            PopKeyboardEnhancementFlags,
            DisableFocusChange,
            DisableBracketedPaste
        );
        let _ = terminal::disable_raw_mode();
    }
}

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MediaKeyCode};

use super::mode::TuiState;
use crate::loader::file_loader;
use crate::mirror::TransportCommand;
use crate::shared::{InputEvent, MIX_STEP, RATE_STEP, TAIL_STEP};

// poll for input from the terminal and resolve it into input events for the middle layer
pub fn poll_input(timeout: Duration, ts: &TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    let events = match event::read()? {
        Event::Key(key) => match key.kind {
            KeyEventKind::Press => handle_key(key.code, ts),
            KeyEventKind::Repeat => handle_repeat(key.code),
            KeyEventKind::Release => vec![],
        },
        // terminals deliver a dropped file as a paste of its path
        Event::Paste(text) => match file_loader::parse_pasted_path(&text) {
            Some(path) => vec![InputEvent::LoadPath(path)],
            None => vec![],
        },
        Event::FocusGained => vec![InputEvent::VisibilityRegained],
        _ => vec![],
    };
    Ok(events)
}

fn handle_key(code: KeyCode, ts: &TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::TogglePlay],
        KeyCode::Char('s') => vec![InputEvent::Stop],
        KeyCode::Char('e') => vec![InputEvent::Export],
        KeyCode::Media(media) => resolve_media(media, ts),
        other => handle_repeat(other),
    }
}

// keys that keep nudging while held
fn handle_repeat(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Left => vec![InputEvent::SeekBy(-1.0)],
        KeyCode::Right => vec![InputEvent::SeekBy(1.0)],

        KeyCode::Char('[') => vec![InputEvent::RateBy(-RATE_STEP)],
        KeyCode::Char(']') => vec![InputEvent::RateBy(RATE_STEP)],
        KeyCode::Char('-') => vec![InputEvent::MixBy(-MIX_STEP)],
        KeyCode::Char('=') => vec![InputEvent::MixBy(MIX_STEP)],
        KeyCode::Char(',') => vec![InputEvent::TailBy(-TAIL_STEP)],
        KeyCode::Char('.') => vec![InputEvent::TailBy(TAIL_STEP)],

        _ => vec![],
    }
}

// media keys become transport commands for the media session
fn resolve_media(media: MediaKeyCode, ts: &TuiState) -> Vec<InputEvent> {
    let cmd = match media {
        MediaKeyCode::Play => TransportCommand::Play,
        MediaKeyCode::Pause => TransportCommand::Pause,
        MediaKeyCode::PlayPause if ts.playing => TransportCommand::Pause,
        MediaKeyCode::PlayPause => TransportCommand::Play,
        MediaKeyCode::Stop => TransportCommand::Stop,
        MediaKeyCode::FastForward | MediaKeyCode::TrackNext => TransportCommand::SeekForward(None),
        MediaKeyCode::Rewind | MediaKeyCode::TrackPrevious => TransportCommand::SeekBackward(None),
        _ => return vec![],
    };
    vec![InputEvent::Media(cmd)]
}

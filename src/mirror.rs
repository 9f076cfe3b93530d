//! Transport mirror — keeps an OS-style "now playing" session in step with
//! the engine, and relays the session's transport buttons back into it.
//!
//! The mirror only talks to the engine through its public surface. Session
//! failures never reach the caller; a platform without media integration
//! gets a session that reports itself unsupported and the mirror idles.

use std::fmt;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::OutputSink;
use crate::player::Engine;
use crate::shared::format_time;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_SEEK_STEP: f64 = 10.0;

/// The fixed vocabulary a media session can send. Seek steps are optional;
/// without one the mirror's own step is used.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportCommand {
    Play,
    Pause,
    Stop,
    SeekBackward(Option<f64>),
    SeekForward(Option<f64>),
    SeekTo(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    None,
    Paused,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub duration: f64,
    pub position: f64,
    pub rate: f32,
}

impl PlaybackSnapshot {
    pub fn capture<S: OutputSink>(engine: &Engine<S>) -> Self {
        let status = if engine.is_playing() {
            PlaybackStatus::Playing
        } else if engine.has_signal() {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::None
        };
        Self {
            status,
            duration: engine.duration(),
            position: engine.position(),
            rate: engine.playback_rate(),
        }
    }
}

impl fmt::Display for PlaybackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.status {
            PlaybackStatus::Playing => "▶",
            PlaybackStatus::Paused => "⏸",
            PlaybackStatus::None => "■",
        };
        write!(
            f,
            "{icon} {} / {} @ {:.2}x",
            format_time(self.position),
            format_time(self.duration),
            self.rate
        )
    }
}

/// Whatever the host offers for "now playing" integration.
pub trait MediaSession {
    fn is_supported(&self) -> bool;

    fn publish(&mut self, snapshot: &PlaybackSnapshot) -> anyhow::Result<()>;

    fn next_command(&mut self) -> Option<TransportCommand>;
}

/// No media integration on this host.
#[derive(Default)]
pub struct UnsupportedSession;

impl MediaSession for UnsupportedSession {
    fn is_supported(&self) -> bool {
        false
    }

    fn publish(&mut self, _snapshot: &PlaybackSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    fn next_command(&mut self) -> Option<TransportCommand> {
        None
    }
}

/// Media keys as reported by the terminal, fed in through a `MediaKeys` handle.
pub struct TerminalSession {
    commands: Receiver<TransportCommand>,
    now_playing: Option<PlaybackSnapshot>,
}

#[derive(Clone)]
pub struct MediaKeys(Sender<TransportCommand>);

impl MediaKeys {
    pub fn press(&self, cmd: TransportCommand) {
        if self.0.send(cmd).is_err() {
            log::debug!("media session gone, dropping {cmd:?}");
        }
    }
}

impl TerminalSession {
    pub fn new() -> (Self, MediaKeys) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let session = Self {
            commands: rx,
            now_playing: None,
        };
        (session, MediaKeys(tx))
    }

    pub fn now_playing(&self) -> Option<&PlaybackSnapshot> {
        self.now_playing.as_ref()
    }
}

impl MediaSession for TerminalSession {
    fn is_supported(&self) -> bool {
        true
    }

    fn publish(&mut self, snapshot: &PlaybackSnapshot) -> anyhow::Result<()> {
        self.now_playing = Some(*snapshot);
        Ok(())
    }

    fn next_command(&mut self) -> Option<TransportCommand> {
        self.commands.try_recv().ok()
    }
}

pub struct TransportMirror<M: MediaSession> {
    session: M,
    interval: Duration,
    seek_step: f64,
    last_publish: Option<Instant>, // None = publish on the next tick
}

impl<M: MediaSession> TransportMirror<M> {
    pub fn new(session: M, interval: Duration, seek_step: f64) -> Self {
        Self {
            session,
            interval,
            seek_step,
            last_publish: None,
        }
    }

    pub fn session(&self) -> &M {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut M {
        &mut self.session
    }

    /// Republish on the next tick regardless of the interval.
    pub fn visibility_regained(&mut self) {
        self.last_publish = None;
    }

    /// Relay any pending session commands, then republish if due.
    pub fn tick<S: OutputSink>(&mut self, engine: &mut Engine<S>, now: Instant) {
        if !self.session.is_supported() {
            return;
        }
        while let Some(cmd) = self.session.next_command() {
            self.relay(engine, cmd);
        }
        let due = self
            .last_publish
            .is_none_or(|at| now.saturating_duration_since(at) >= self.interval);
        if due {
            if let Err(e) = self.session.publish(&PlaybackSnapshot::capture(engine)) {
                log::debug!("media session publish failed: {e:#}");
            }
            self.last_publish = Some(now);
        }
    }

    fn relay<S: OutputSink>(&mut self, engine: &mut Engine<S>, cmd: TransportCommand) {
        let result = match cmd {
            TransportCommand::Play => engine.play(),
            TransportCommand::Pause => {
                engine.pause();
                Ok(())
            }
            TransportCommand::Stop => {
                engine.stop();
                Ok(())
            }
            TransportCommand::SeekBackward(step) => {
                engine.seek(engine.position() - step.unwrap_or(self.seek_step))
            }
            TransportCommand::SeekForward(step) => {
                engine.seek(engine.position() + step.unwrap_or(self.seek_step))
            }
            TransportCommand::SeekTo(t) => engine.seek(t),
        };
        if let Err(e) = result {
            log::debug!("media command {cmd:?} failed: {e}");
        }
        // the session should see the effect right away, not half an interval later
        self.last_publish = None;
    }
}

/// Test helper: a session that records what it was shown and can fail on demand.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSession {
    pub queued: std::collections::VecDeque<TransportCommand>,
    pub published: Vec<PlaybackSnapshot>,
    pub failing: bool,
}

#[cfg(test)]
impl MediaSession for RecordingSession {
    fn is_supported(&self) -> bool {
        true
    }

    fn publish(&mut self, snapshot: &PlaybackSnapshot) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("session went away");
        }
        self.published.push(*snapshot);
        Ok(())
    }

    fn next_command(&mut self) -> Option<TransportCommand> {
        self.queued.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualSink;
    use crate::audio::test_fixture::sine_wav;
    use crate::player::EffectParams;

    const SR: u32 = 8000;

    fn engine(seconds: f64) -> Engine<ManualSink> {
        let params = EffectParams { playback_rate: 1.0, reverb_mix: 0.0, reverb_tail: 0.1 };
        let mut e = Engine::new(ManualSink::new(SR), params);
        e.load("sine.wav", Some("wav"), sine_wav(seconds, SR, 1)).unwrap();
        e
    }

    fn mirror() -> TransportMirror<RecordingSession> {
        TransportMirror::new(RecordingSession::default(), DEFAULT_INTERVAL, DEFAULT_SEEK_STEP)
    }

    #[test]
    fn relays_commands_into_engine() {
        let mut e = engine(30.0);
        let mut m = mirror();
        let t0 = Instant::now();

        m.session_mut().queued.push_back(TransportCommand::Play);
        m.tick(&mut e, t0);
        assert!(e.is_playing());

        m.session_mut().queued.extend([
            TransportCommand::Pause,
            TransportCommand::SeekTo(12.0),
            TransportCommand::SeekForward(None),
            TransportCommand::SeekBackward(Some(5.0)),
        ]);
        m.tick(&mut e, t0);
        assert!(!e.is_playing());
        assert_eq!(e.position(), 17.0);

        m.session_mut().queued.push_back(TransportCommand::Stop);
        m.tick(&mut e, t0);
        assert_eq!(e.position(), 0.0);
    }

    #[test]
    fn seeks_clamp_to_the_file() {
        let mut e = engine(4.0);
        let mut m = mirror();
        m.session_mut().queued.extend([TransportCommand::SeekForward(None)]);
        m.tick(&mut e, Instant::now());
        assert_eq!(e.position(), 4.0);
        m.session_mut().queued.extend([TransportCommand::SeekBackward(Some(100.0))]);
        m.tick(&mut e, Instant::now());
        assert_eq!(e.position(), 0.0);
    }

    #[test]
    fn publishes_at_the_interval() {
        let mut e = engine(2.0);
        let mut m = mirror();
        let t0 = Instant::now();

        m.tick(&mut e, t0);
        m.tick(&mut e, t0 + Duration::from_millis(100));
        m.tick(&mut e, t0 + Duration::from_millis(499));
        assert_eq!(m.session().published.len(), 1);

        m.tick(&mut e, t0 + Duration::from_millis(500));
        assert_eq!(m.session().published.len(), 2);

        let last = m.session().published[1];
        assert_eq!(last.status, PlaybackStatus::Paused);
        assert_eq!(last.duration, 2.0);
        assert_eq!(last.rate, 1.0);
    }

    #[test]
    fn visibility_regain_forces_a_publish() {
        let mut e = engine(2.0);
        let mut m = mirror();
        let t0 = Instant::now();
        m.tick(&mut e, t0);
        m.visibility_regained();
        m.tick(&mut e, t0 + Duration::from_millis(10));
        assert_eq!(m.session().published.len(), 2);
    }

    #[test]
    fn snapshot_tracks_playback() {
        let mut e = engine(2.0);
        e.set_playback_rate(0.5);
        e.play().unwrap();
        e.sink_mut().advance(1.0);

        let snap = PlaybackSnapshot::capture(&e);
        assert_eq!(snap.status, PlaybackStatus::Playing);
        assert_eq!(snap.position, 0.5);
        assert_eq!(snap.rate, 0.5);
        assert_eq!(snap.to_string(), "▶ 0:00 / 0:02 @ 0.50x");
    }

    #[test]
    fn session_failures_are_swallowed() {
        let mut e = engine(2.0);
        let mut m = mirror();
        m.session_mut().failing = true;
        m.session_mut().queued.push_back(TransportCommand::Play);
        m.tick(&mut e, Instant::now());
        assert!(e.is_playing());
        assert!(m.session().published.is_empty());
    }

    #[test]
    fn unsupported_host_is_a_no_op() {
        let mut e = engine(2.0);
        let mut m = TransportMirror::new(UnsupportedSession, DEFAULT_INTERVAL, DEFAULT_SEEK_STEP);
        m.tick(&mut e, Instant::now());
        m.visibility_regained();
        m.tick(&mut e, Instant::now());
        assert!(!e.is_playing());
    }

    #[test]
    fn terminal_media_keys_reach_the_engine() {
        let mut e = engine(2.0);
        let (session, keys) = TerminalSession::new();
        let mut m = TransportMirror::new(session, DEFAULT_INTERVAL, DEFAULT_SEEK_STEP);

        keys.press(TransportCommand::Play);
        m.tick(&mut e, Instant::now());
        assert!(e.is_playing());
        let shown = m.session().now_playing().unwrap();
        assert_eq!(shown.status, PlaybackStatus::Playing);
    }
}

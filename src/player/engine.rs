//! Playback engine — transport state machine over an output sink.
//!
//! Position is never stored as a running counter while playing. It is
//! projected from the sink's clock on demand, `(now - started_at) * rate`,
//! so polling cadence can't drift away from what is actually heard.

use std::sync::Arc;

use crate::audio::impulse::{self, DECAY_SHAPE};
use crate::audio::{ConvolverKernel, LoadedSignal, OutputSink, Source};
use crate::audio_api::{GraphCommand, GraphEvent};
use crate::mirror::PlaybackSnapshot;

use super::error::{EngineError, EngineResult};
use super::jobs::{CancelFlag, JobOutcome, Jobs};
use super::params::{self, EffectParams};
use super::render;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Transport {
    Empty,
    Paused { at: f64 },
    Playing { started_at: f64 },
}

/// Things that happened since the last `poll`, for the presentation layer.
#[derive(Debug)]
pub enum EngineEvent {
    Loaded { name: String, duration: f64 },
    LoadFailed(EngineError),
    Rendered(Vec<u8>),
    RenderFailed(EngineError),
    PlaybackEnded,
}

pub struct Engine<S: OutputSink> {
    sink: S,
    params: EffectParams,
    signal: Option<Arc<LoadedSignal>>,
    file_name: Option<String>,
    transport: Transport,
    generation: u64, // of the most recently started source
    jobs: Jobs,
}

impl<S: OutputSink> Engine<S> {
    pub fn new(sink: S, params: EffectParams) -> Self {
        let mut engine = Self {
            sink,
            params: params.sanitized(),
            signal: None,
            file_name: None,
            transport: Transport::Empty,
            generation: 0,
            jobs: Jobs::new(),
        };
        // the sink's graph is a fresh materialisation; copy every parameter across
        let p = engine.params;
        engine.sink.send(GraphCommand::SetPlaybackRate(p.playback_rate));
        engine.sink.send(GraphCommand::SetReverbMix(p.reverb_mix));
        engine.install_impulse(p.reverb_tail);
        engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Decode and install a file right away. Playback stops first either
    /// way; on failure the previously loaded file stays loaded.
    pub fn load(&mut self, name: &str, extension: Option<&str>, bytes: Vec<u8>) -> EngineResult<()> {
        self.stop();
        self.jobs.cancel_load();
        let signal = LoadedSignal::decode(bytes, extension, self.sink.sample_rate())?;
        self.install(signal, name.to_string());
        Ok(())
    }

    /// Decode on a worker thread; the result is installed by a later `poll`.
    /// A newer `begin_load` supersedes any still in flight.
    pub fn begin_load(&mut self, name: String, extension: Option<String>, bytes: Vec<u8>) {
        self.stop();
        let generation = self.jobs.submit_load(name, extension, bytes, self.sink.sample_rate());
        log::debug!("load {generation} submitted");
    }

    pub fn is_loading(&self) -> bool {
        self.jobs.is_loading()
    }

    fn install(&mut self, signal: LoadedSignal, name: String) {
        // anything started while the decode was in flight belongs to the old file
        if let Transport::Playing { .. } = self.transport {
            self.sink.send(GraphCommand::StopSource);
        }
        log::info!("loaded {name}: {:.2}s, {} ch", signal.duration(), signal.channels());
        self.signal = Some(Arc::new(signal));
        self.file_name = Some(name);
        self.transport = Transport::Paused { at: 0.0 };
    }

    // ── Transport ────────────────────────────────────────────────

    /// Start playing from the paused position. A no-op when already playing
    /// or when nothing is loaded. If the output clock refuses to start, the
    /// engine stays paused and the error says why.
    pub fn play(&mut self) -> EngineResult<()> {
        self.poll_sink();
        let (Some(signal), Transport::Paused { at }) = (self.signal.clone(), self.transport) else {
            return Ok(());
        };
        if self.sink.is_suspended() {
            self.sink.resume()?;
        }

        self.generation += 1;
        let rate = self.params.playback_rate;
        let source = Source::new(signal, at, self.generation);
        self.sink.send(GraphCommand::Start { source: Box::new(source), rate });
        self.transport = Transport::Playing {
            started_at: self.sink.now() - at / rate as f64,
        };
        Ok(())
    }

    pub fn pause(&mut self) {
        self.poll_sink();
        if let Transport::Playing { .. } = self.transport {
            let at = self.position();
            self.sink.send(GraphCommand::StopSource);
            self.transport = Transport::Paused { at };
        }
    }

    pub fn stop(&mut self) {
        self.pause();
        if self.transport != Transport::Empty {
            self.transport = Transport::Paused { at: 0.0 };
        }
    }

    /// Reposition to `target` seconds. While playing this is pause, move,
    /// resume; a live source is never scrubbed.
    pub fn seek(&mut self, target: f64) -> EngineResult<()> {
        self.poll_sink();
        if self.transport == Transport::Empty {
            return Ok(());
        }
        let target = if target.is_finite() { target.clamp(0.0, self.duration()) } else { 0.0 };
        let was_playing = self.is_playing();
        self.pause();
        self.transport = Transport::Paused { at: target };
        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn position(&self) -> f64 {
        match self.transport {
            Transport::Empty => 0.0,
            Transport::Paused { at } => at,
            Transport::Playing { started_at } => {
                let elapsed = self.sink.now() - started_at;
                (elapsed * self.params.playback_rate as f64).clamp(0.0, self.duration())
            }
        }
    }

    pub fn duration(&self) -> f64 {
        self.signal.as_ref().map_or(0.0, |s| s.duration())
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.transport, Transport::Playing { .. })
    }

    pub fn has_signal(&self) -> bool {
        self.signal.is_some()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn params(&self) -> EffectParams {
        self.params
    }

    pub fn playback_rate(&self) -> f32 {
        self.params.playback_rate
    }

    pub fn reverb_volume(&self) -> f32 {
        self.params.reverb_mix
    }

    pub fn reverb_length(&self) -> f32 {
        self.params.reverb_tail
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot::capture(self)
    }

    // ── Parameters ───────────────────────────────────────────────

    pub fn set_playback_rate(&mut self, rate: f32) {
        let Some(rate) = params::sanitize_rate(rate) else {
            log::warn!("ignoring playback rate {rate}");
            return;
        };
        self.poll_sink();
        if let Transport::Playing { .. } = self.transport {
            // re-anchor so the reported position doesn't jump
            let at = self.position();
            self.transport = Transport::Playing {
                started_at: self.sink.now() - at / rate as f64,
            };
        }
        self.params.playback_rate = rate;
        self.sink.send(GraphCommand::SetPlaybackRate(rate));
    }

    pub fn set_reverb_volume(&mut self, mix: f32) {
        let Some(mix) = params::sanitize_mix(mix) else {
            log::warn!("ignoring reverb volume {mix}");
            return;
        };
        self.params.reverb_mix = mix;
        self.sink.send(GraphCommand::SetReverbMix(mix));
    }

    pub fn set_reverb_length(&mut self, seconds: f32) {
        let Some(seconds) = params::sanitize_tail(seconds) else {
            log::warn!("ignoring reverb length {seconds}");
            return;
        };
        self.params.reverb_tail = seconds;
        self.install_impulse(seconds);
    }

    fn install_impulse(&mut self, seconds: f32) {
        let ir = impulse::generate(self.sink.sample_rate(), seconds, DECAY_SHAPE);
        let kernel = ConvolverKernel::new(&ir);
        self.sink.send(GraphCommand::SetImpulse(Box::new(kernel)));
    }

    // ── Output clock ─────────────────────────────────────────────

    pub fn clock_suspended(&self) -> bool {
        self.sink.is_suspended()
    }

    pub fn resume_clock(&mut self) -> EngineResult<()> {
        self.sink.resume()
    }

    // ── Rendering ────────────────────────────────────────────────

    /// Render the loaded file with the current parameters to wav bytes.
    /// Independent of transport state.
    pub fn render(&self) -> EngineResult<Vec<u8>> {
        let signal = self.signal.as_ref().ok_or(EngineError::NoSignalLoaded)?;
        render::render_wav(signal, &self.params, &CancelFlag::default())
    }

    /// Like `render`, on a worker thread; bytes arrive through `poll`.
    pub fn begin_render(&mut self) -> EngineResult<()> {
        let signal = self.signal.clone().ok_or(EngineError::NoSignalLoaded)?;
        let generation = self.jobs.submit_render(signal, self.params);
        log::debug!("render {generation} submitted");
        Ok(())
    }

    pub fn is_rendering(&self) -> bool {
        self.jobs.is_rendering()
    }

    // ── Housekeeping ─────────────────────────────────────────────

    /// Apply end-of-source notices and finished jobs. Call once per UI tick.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.poll_sink() {
            events.push(EngineEvent::PlaybackEnded);
        }
        for outcome in self.jobs.poll() {
            match outcome {
                JobOutcome::Loaded { name, result: Ok(signal) } => {
                    let duration = signal.duration();
                    self.install(signal, name.clone());
                    events.push(EngineEvent::Loaded { name, duration });
                }
                JobOutcome::Loaded { name, result: Err(e) } => {
                    log::warn!("failed to load {name}: {e}");
                    events.push(EngineEvent::LoadFailed(e));
                }
                JobOutcome::Rendered { result: Ok(bytes) } => events.push(EngineEvent::Rendered(bytes)),
                JobOutcome::Rendered { result: Err(e) } => {
                    log::warn!("render failed: {e}");
                    events.push(EngineEvent::RenderFailed(e));
                }
            }
        }
        events
    }

    // Returns true if the current source ran out since the last check
    fn poll_sink(&mut self) -> bool {
        let mut ended = false;
        while let Some(event) = self.sink.poll_event() {
            match event {
                GraphEvent::SourceEnded { generation }
                    if generation == self.generation && self.is_playing() =>
                {
                    // end of track behaves like stop: back to the top, paused
                    self.transport = Transport::Paused { at: 0.0 };
                    ended = true;
                }
                GraphEvent::SourceEnded { generation } => {
                    log::debug!("ignoring end of stale source {generation}");
                }
            }
        }
        ended
    }
}

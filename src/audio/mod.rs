use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::audio_api::{GraphCommand, GraphEvent, Retired};
use crate::player::EngineError;

mod convolver;
mod frame;
mod graph;
pub mod impulse;
mod signal;
mod sink;
mod smoothing;
mod source;
pub mod wav;

#[cfg(test)]
pub mod test_fixture;

pub use convolver::{BLOCK_SIZE, ConvolverKernel};
pub use frame::StereoFrame;
pub use graph::SignalGraph;
pub use signal::LoadedSignal;
pub use sink::OutputSink;
pub use source::Source;

#[cfg(test)]
pub use sink::manual::ManualSink;

// Frames of scratch space the callback starts with; grows if a device asks for more
const SCRATCH_FRAMES: usize = 4096;
const COMMAND_CAPACITY: usize = 1024;
const RETIRE_CAPACITY: usize = 64;

/// Commands on their way to the audio thread.
///
/// Parameter changes are settings, not events: only the newest rate, mix and
/// impulse matter. While the stream is paused nothing drains the channel, so
/// those are held here, one of each, and sent when the stream runs again. A
/// parameter that meets a full channel is held the same way and retried.
struct CommandQueue {
    tx: Sender<GraphCommand>,
    rate: Option<f32>,
    mix: Option<f32>,
    kernel: Option<Box<ConvolverKernel>>,
}

impl CommandQueue {
    fn new(tx: Sender<GraphCommand>) -> Self {
        Self { tx, rate: None, mix: None, kernel: None }
    }

    fn send(&mut self, cmd: GraphCommand, hold_params: bool) {
        if hold_params {
            if let Some(cmd) = self.hold(cmd) {
                self.push(cmd);
            }
            return;
        }
        // held parameters were issued before this command, so they go first
        self.flush();
        self.push(cmd);
    }

    fn flush(&mut self) {
        if let Some(kernel) = self.kernel.take() {
            self.push(GraphCommand::SetImpulse(kernel));
        }
        if let Some(rate) = self.rate.take() {
            self.push(GraphCommand::SetPlaybackRate(rate));
        }
        if let Some(mix) = self.mix.take() {
            self.push(GraphCommand::SetReverbMix(mix));
        }
    }

    fn has_held(&self) -> bool {
        self.rate.is_some() || self.mix.is_some() || self.kernel.is_some()
    }

    // Keep a parameter command, replacing any older one of its kind.
    // Anything else is handed back.
    fn hold(&mut self, cmd: GraphCommand) -> Option<GraphCommand> {
        match cmd {
            GraphCommand::SetPlaybackRate(rate) => self.rate = Some(rate),
            GraphCommand::SetReverbMix(mix) => self.mix = Some(mix),
            GraphCommand::SetImpulse(kernel) => self.kernel = Some(kernel),
            other => return Some(other),
        }
        None
    }

    fn push(&mut self, cmd: GraphCommand) {
        match self.tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                if self.hold(cmd).is_some() {
                    log::warn!("audio command queue full, dropping transport command");
                } else {
                    log::debug!("audio command queue full, holding parameter for retry");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("audio thread is gone, command not delivered");
            }
        }
    }
}

/// The live output: a cpal stream running a `SignalGraph` in its callback.
pub struct CpalSink {
    queue: CommandQueue,
    event_rx: Receiver<GraphEvent>,
    retired_rx: Receiver<Retired>,
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
    suspended: bool,
    stream: cpal::Stream,
}

impl OutputSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.stream
            .play()
            .map_err(|e| EngineError::ClockResume(e.to_string()))?;
        self.suspended = false;
        self.queue.flush();
        Ok(())
    }

    fn suspend(&mut self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("could not suspend output stream: {e}");
        }
        self.suspended = true;
    }

    fn send(&mut self, cmd: GraphCommand) {
        self.free_retired();
        self.queue.send(cmd, self.suspended);
    }

    fn poll_event(&mut self) -> Option<GraphEvent> {
        self.free_retired();
        if !self.suspended && self.queue.has_held() {
            self.queue.flush();
        }
        self.event_rx.try_recv().ok()
    }
}

impl CpalSink {
    // Drop what the audio thread handed back, here rather than in the callback
    fn free_retired(&self) {
        self.retired_rx.try_iter().for_each(drop);
    }
}

pub fn start_audio() -> anyhow::Result<CpalSink> {
    let (tx, rx) = crossbeam_channel::bounded::<GraphCommand>(COMMAND_CAPACITY);
    let (event_tx, event_rx) = crossbeam_channel::bounded::<GraphEvent>(64);
    let (retire_tx, retired_rx) = crossbeam_channel::bounded::<Retired>(RETIRE_CAPACITY);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    let frames_rendered = Arc::new(AtomicU64::new(0));

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let stream = build_output_stream_f32(
                &device,
                &config.into(),
                rx,
                event_tx,
                retire_tx,
                frames_rendered.clone(),
                channels,
            )?;
            // the clock starts suspended; the first play resumes it
            if let Err(e) = stream.pause() {
                log::debug!("stream could not start paused: {e}");
            }
            log::info!("audio output: {channels} ch @ {sample_rate} Hz");

            Ok(CpalSink {
                queue: CommandQueue::new(tx),
                event_rx,
                retired_rx,
                frames_rendered,
                sample_rate,
                suspended: true,
                stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<GraphCommand>,
    event_tx: Sender<GraphEvent>,
    retire_tx: Sender<Retired>,
    frames_rendered: Arc<AtomicU64>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut graph = SignalGraph::new(config.sample_rate);
    let mut scratch = vec![StereoFrame::zero(); SCRATCH_FRAMES];

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() { // set up command handling
                if let Some(retired) = graph.handle_cmd(cmd) {
                    // only dropped here if the control side stopped collecting
                    let _ = retire_tx.try_send(retired);
                }
            }

            let n_frames = data.len() / channels;
            if scratch.len() < n_frames {
                scratch.resize(n_frames, StereoFrame::zero());
            }
            let frames = &mut scratch[..n_frames];
            if let Some(generation) = graph.render_block(frames) {
                let _ = event_tx.try_send(GraphEvent::SourceEnded { generation });
            }
            write_interleaved(frames, data, channels);
            frames_rendered.fetch_add(n_frames as u64, Ordering::Relaxed);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// Spread stereo frames over however many channels the device has
fn write_interleaved(frames: &[StereoFrame], data: &mut [f32], channels: usize) {
    for (frame, out) in frames.iter().zip(data.chunks_exact_mut(channels)) {
        match out {
            [mono] => *mono = frame.mono(),
            [l, r, rest @ ..] => {
                *l = frame.left;
                *r = frame.right;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::impulse::DECAY_SHAPE;
    use crate::audio::test_fixture::sine_signal;

    fn kernel(seconds: f32) -> Box<ConvolverKernel> {
        Box::new(ConvolverKernel::new(&impulse::generate(8000, seconds, DECAY_SHAPE)))
    }

    fn start_cmd() -> GraphCommand {
        GraphCommand::Start { source: Box::new(Source::new(sine_signal(0.1, 8000, 1), 0.0, 1)), rate: 1.0 }
    }

    #[test]
    fn paused_stream_keeps_only_the_newest_parameters() {
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_CAPACITY);
        let mut queue = CommandQueue::new(tx);

        // far more tail changes than the channel holds, none of them drained
        for i in 0..COMMAND_CAPACITY * 2 {
            queue.send(GraphCommand::SetReverbMix(i as f32 / 10_000.0), true);
            queue.send(GraphCommand::SetPlaybackRate(0.5), true);
            if i % 256 == 0 {
                queue.send(GraphCommand::SetImpulse(kernel(0.1)), true);
            }
        }
        queue.send(GraphCommand::SetImpulse(kernel(0.3)), true);
        assert!(rx.is_empty());

        queue.flush();
        let sent: Vec<GraphCommand> = rx.try_iter().collect();
        assert_eq!(sent.len(), 3);
        assert!(matches!(&sent[0], GraphCommand::SetImpulse(k) if k.num_partitions() == 5));
        assert!(matches!(sent[1], GraphCommand::SetPlaybackRate(r) if r == 0.5));
        let last_mix = (COMMAND_CAPACITY * 2 - 1) as f32 / 10_000.0;
        assert!(matches!(sent[2], GraphCommand::SetReverbMix(m) if m == last_mix));
        assert!(!queue.has_held());
    }

    #[test]
    fn transport_commands_are_never_held() {
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_CAPACITY);
        let mut queue = CommandQueue::new(tx);
        queue.send(GraphCommand::SetReverbMix(0.2), true);
        queue.send(start_cmd(), true);
        queue.send(GraphCommand::StopSource, true);

        let sent: Vec<GraphCommand> = rx.try_iter().collect();
        assert!(matches!(sent.as_slice(), [GraphCommand::Start { .. }, GraphCommand::StopSource]));
        assert!(queue.has_held());
    }

    #[test]
    fn held_parameters_go_out_ahead_of_the_next_command() {
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_CAPACITY);
        let mut queue = CommandQueue::new(tx);
        queue.send(GraphCommand::SetPlaybackRate(0.7), true);
        queue.send(start_cmd(), false);

        let sent: Vec<GraphCommand> = rx.try_iter().collect();
        assert!(matches!(
            sent.as_slice(),
            [GraphCommand::SetPlaybackRate(_), GraphCommand::Start { .. }]
        ));
    }

    #[test]
    fn parameter_meeting_a_full_channel_is_retried_not_lost() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut queue = CommandQueue::new(tx);
        queue.send(GraphCommand::SetReverbMix(0.1), false);
        queue.send(GraphCommand::SetReverbMix(0.2), false);
        queue.send(GraphCommand::SetReverbMix(0.3), false);
        assert!(queue.has_held());

        assert!(matches!(rx.try_recv(), Ok(GraphCommand::SetReverbMix(m)) if m == 0.1));
        queue.flush();
        assert!(matches!(rx.try_recv(), Ok(GraphCommand::SetReverbMix(m)) if m == 0.3));
        assert!(rx.is_empty());
        assert!(!queue.has_held());
    }

    #[test]
    fn interleaves_for_any_channel_count() {
        let frames = [StereoFrame { left: 0.2, right: 0.4 }, StereoFrame { left: -1.0, right: 1.0 }];

        let mut mono = [9.0; 2];
        write_interleaved(&frames, &mut mono, 1);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert_eq!(mono[1], 0.0);

        let mut quad = [9.0; 8];
        write_interleaved(&frames, &mut quad, 4);
        assert_eq!(quad, [0.2, 0.4, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0]);
    }
}

//! Signal graph — source → dry → out, source → convolver → wet gain → out.
//!
//! The same graph renders the live device stream and the offline export, so
//! both paths produce the same signal from the same parameters.

use crate::audio_api::{GraphCommand, Retired};
use crate::player::EffectParams;

use super::convolver::{Convolver, ConvolverKernel};
use super::frame::StereoFrame;
use super::impulse::{self, DECAY_SHAPE};
use super::smoothing::SmoothedParam;
use super::source::Source;

const DRY_GAIN: f32 = 1.0;

pub struct SignalGraph {
    sample_rate: u32,
    source: Option<Source>,
    rate: SmoothedParam,
    wet_gain: SmoothedParam,
    convolver: Convolver,
}

impl SignalGraph {
    pub fn new(sample_rate: u32) -> Self {
        let defaults = EffectParams::default();
        Self {
            sample_rate,
            source: None,
            rate: SmoothedParam::new(defaults.playback_rate, sample_rate),
            wet_gain: SmoothedParam::new(defaults.reverb_mix, sample_rate),
            convolver: Convolver::new(ConvolverKernel::silent()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Apply one command. Whatever it displaced comes back to the caller.
    pub fn handle_cmd(&mut self, cmd: GraphCommand) -> Option<Retired> {
        match cmd {
            GraphCommand::Start { source, rate } => self.start(*source, rate).map(Retired::Source),
            GraphCommand::StopSource => self.stop_source().map(Retired::Source),
            GraphCommand::SetPlaybackRate(rate) => {
                self.set_playback_rate(rate);
                None
            }
            GraphCommand::SetReverbMix(mix) => {
                self.set_reverb_mix(mix);
                None
            }
            GraphCommand::SetImpulse(kernel) => Some(Retired::Kernel(self.set_impulse(kernel))),
        }
    }

    // Copy a full parameter set across with no ramps; a fresh graph starts here
    pub fn apply(&mut self, params: &EffectParams) {
        self.rate.set_immediate(params.playback_rate);
        self.wet_gain.set_immediate(params.reverb_mix);
        self.set_reverb_tail(params.reverb_tail);
    }

    pub fn start(&mut self, source: Source, rate: f32) -> Option<Source> {
        self.rate.set_immediate(rate); // not yet playing, so no ramp
        self.source.replace(source)
    }

    pub fn stop_source(&mut self) -> Option<Source> {
        self.source.take()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn set_playback_rate(&mut self, rate: f32) {
        if self.source.is_some() {
            self.rate.set_target(rate);
        } else {
            self.rate.set_immediate(rate);
        }
    }

    // Same rule as the rate: glide only when something is audible
    pub fn set_reverb_mix(&mut self, mix: f32) {
        if self.source.is_some() {
            self.wet_gain.set_target(mix);
        } else {
            self.wet_gain.set_immediate(mix);
        }
    }

    pub fn set_impulse(&mut self, kernel: Box<ConvolverKernel>) -> Box<ConvolverKernel> {
        self.convolver.set_kernel(kernel)
    }

    pub fn set_reverb_tail(&mut self, seconds: f32) {
        let ir = impulse::generate(self.sample_rate, seconds, DECAY_SHAPE);
        self.set_impulse(Box::new(ConvolverKernel::new(&ir)));
    }

    /// Overwrite `out` with the next block. Returns the generation of a
    /// source that reached its natural end during this block.
    pub fn render_block(&mut self, out: &mut [StereoFrame]) -> Option<u64> {
        let mut ended = None;
        for frame in out.iter_mut() {
            let rate = self.rate.next();
            let dry = match self.source.as_mut().map(|s| s.next_frame(rate)) {
                Some(Some(sample)) => sample,
                Some(None) => {
                    ended = self.source.take().map(|s| s.generation());
                    StereoFrame::zero()
                }
                None => StereoFrame::zero(),
            };
            // the convolver keeps ringing after the source is gone
            let wet = self.convolver.process_frame(dry).scale(self.wet_gain.next());
            *frame = dry.scale(DRY_GAIN).add(wet);
        }
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_fixture::sine_signal;

    fn params(mix: f32, tail: f32) -> EffectParams {
        EffectParams { playback_rate: 1.0, reverb_mix: mix, reverb_tail: tail }
    }

    #[test]
    fn dry_path_passes_source_through_when_mix_is_zero() {
        let signal = sine_signal(0.1, 8000, 1);
        let mut graph = SignalGraph::new(8000);
        graph.apply(&params(0.0, 0.2));
        graph.start(Source::new(signal.clone(), 0.0, 1), 1.0);

        let mut out = vec![StereoFrame::zero(); 800];
        assert_eq!(graph.render_block(&mut out), None);
        assert_eq!(&out[..], signal.frames());
    }

    #[test]
    fn reports_natural_end_once() {
        let mut graph = SignalGraph::new(8000);
        graph.apply(&params(0.0, 0.05));
        graph.start(Source::new(sine_signal(0.01, 8000, 1), 0.0, 42), 1.0);

        let mut out = vec![StereoFrame::zero(); 128];
        assert_eq!(graph.render_block(&mut out), Some(42));
        assert!(!graph.has_source());
        assert_eq!(graph.render_block(&mut out), None);
    }

    #[test]
    fn wet_tail_rings_after_source_stops() {
        let mut graph = SignalGraph::new(8000);
        graph.apply(&params(1.0, 0.5));
        graph.start(Source::new(sine_signal(0.2, 8000, 1), 0.0, 1), 1.0);

        let mut out = vec![StereoFrame::zero(); 1600];
        graph.render_block(&mut out);
        assert!(graph.stop_source().is_some());
        let mut tail = vec![StereoFrame::zero(); 1600];
        graph.render_block(&mut tail);
        assert!(tail.iter().any(|f| f.left.abs() > 1e-4), "reverb tail should outlive the source");
    }

    #[test]
    fn rate_ramps_only_while_a_source_plays() {
        let mut graph = SignalGraph::new(8000);
        graph.set_playback_rate(0.5);
        assert!(!graph.rate.is_ramping());
        assert_eq!(graph.rate.current(), 0.5);

        graph.start(Source::new(sine_signal(1.0, 8000, 1), 0.0, 1), 0.5);
        graph.set_playback_rate(1.5);
        assert!(graph.rate.is_ramping());
        assert_eq!(graph.rate.target(), 1.5);
    }

    #[test]
    fn mix_jumps_while_idle_and_glides_while_playing() {
        let mut graph = SignalGraph::new(44100);
        graph.set_reverb_mix(0.0);
        assert!(!graph.wet_gain.is_ramping());
        assert_eq!(graph.wet_gain.current(), 0.0);

        graph.start(Source::new(sine_signal(1.0, 44100, 1), 0.0, 1), 1.0);
        graph.set_reverb_mix(0.8);
        assert!(graph.wet_gain.is_ramping());
        assert_eq!(graph.wet_gain.target(), 0.8);
    }

    #[test]
    fn displaced_sources_and_kernels_come_back() {
        let mut graph = SignalGraph::new(8000);
        let first = Source::new(sine_signal(0.5, 8000, 1), 0.0, 1);
        let second = Source::new(sine_signal(0.5, 8000, 1), 0.0, 2);

        assert!(graph.handle_cmd(GraphCommand::Start { source: Box::new(first), rate: 1.0 }).is_none());
        let Some(Retired::Source(old)) =
            graph.handle_cmd(GraphCommand::Start { source: Box::new(second), rate: 1.0 })
        else {
            panic!("replacing a source should hand the old one back");
        };
        assert_eq!(old.generation(), 1);

        let Some(Retired::Source(stopped)) = graph.handle_cmd(GraphCommand::StopSource) else {
            panic!("stopping should hand the source back");
        };
        assert_eq!(stopped.generation(), 2);
        assert!(graph.handle_cmd(GraphCommand::StopSource).is_none());

        let ir = impulse::generate(8000, 0.2, DECAY_SHAPE);
        let kernel = Box::new(ConvolverKernel::new(&ir));
        let Some(Retired::Kernel(silent)) = graph.handle_cmd(GraphCommand::SetImpulse(kernel)) else {
            panic!("a new impulse should hand the old kernel back");
        };
        assert_eq!(silent.num_partitions(), 1);
        assert!(graph.handle_cmd(GraphCommand::SetReverbMix(0.5)).is_none());
    }
}

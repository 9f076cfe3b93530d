//! Offline render — runs a fresh signal graph over the whole file as fast as
//! possible and hands the result to the wav encoder.

use std::sync::Arc;

use crate::audio::{LoadedSignal, SignalGraph, Source, StereoFrame, wav};

use super::error::{EngineError, EngineResult};
use super::jobs::CancelFlag;
use super::params::EffectParams;

const RENDER_BLOCK: usize = 1024;

/// A fully rendered signal, ready for encoding.
#[derive(Clone, Debug)]
pub struct RenderedSignal {
    pub frames: Vec<StereoFrame>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl RenderedSignal {
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    pub fn encode(&self) -> EngineResult<Vec<u8>> {
        Ok(wav::encode(&self.frames, self.channels, self.sample_rate)?)
    }
}

/// Frames needed for the slowed signal plus its full reverb tail.
pub fn output_frames(duration: f64, params: &EffectParams, sample_rate: u32) -> usize {
    let seconds = duration / params.playback_rate as f64 + params.reverb_tail as f64;
    (seconds * sample_rate as f64).round() as usize
}

/// Render the whole file. `cancel` is checked between blocks.
pub fn render_offline(
    signal: &Arc<LoadedSignal>,
    params: &EffectParams,
    cancel: &CancelFlag,
) -> EngineResult<RenderedSignal> {
    let sample_rate = signal.sample_rate();
    let total = output_frames(signal.duration(), params, sample_rate);

    // graph nodes never cross between live and offline rendering; build fresh ones
    let mut graph = SignalGraph::new(sample_rate);
    graph.apply(params);
    graph.start(Source::new(signal.clone(), 0.0, 0), params.playback_rate);

    let mut frames = vec![StereoFrame::zero(); total];
    for block in frames.chunks_mut(RENDER_BLOCK) {
        if cancel.is_cancelled() {
            log::debug!("render cancelled");
            return Err(EngineError::Cancelled);
        }
        graph.render_block(block);
    }
    log::info!(
        "rendered {:.2}s at rate {:.2}, mix {:.2}, tail {:.2}s",
        total as f64 / sample_rate as f64,
        params.playback_rate,
        params.reverb_mix,
        params.reverb_tail
    );

    Ok(RenderedSignal {
        frames,
        channels: signal.channels(),
        sample_rate,
    })
}

pub fn render_wav(signal: &Arc<LoadedSignal>, params: &EffectParams, cancel: &CancelFlag) -> EngineResult<Vec<u8>> {
    render_offline(signal, params, cancel)?.encode()
}

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::frame::StereoFrame;
use crate::player::{CancelFlag, EngineError};

/// A decoded, read-only waveform at the engine's operating sample rate.
#[derive(Clone, Debug)]
pub struct LoadedSignal {
    frames: Vec<StereoFrame>, // the audio data array
    channels: u16,
    sample_rate: u32,
}

impl LoadedSignal {
    pub fn from_frames(frames: Vec<StereoFrame>, channels: u16, sample_rate: u32) -> Self {
        Self {
            frames,
            channels: channels.clamp(1, 2),
            sample_rate,
        }
    }

    // Decode any container/codec symphonia knows, straight from memory
    pub fn decode(bytes: Vec<u8>, extension: Option<&str>, target_rate: u32) -> Result<Self, EngineError> {
        Self::decode_with(bytes, extension, target_rate, &CancelFlag::default())
    }

    /// `decode`, checking `cancel` between packets.
    pub fn decode_with(
        bytes: Vec<u8>,
        extension: Option<&str>,
        target_rate: u32,
        cancel: &CancelFlag,
    ) -> Result<Self, EngineError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        let probed = get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| EngineError::Decode("no default track".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let mut decoder = get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let mut file_rate = codec_params.sample_rate;
        let mut file_channels = codec_params.channels.map(|c| c.count());

        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut samples: Vec<f32> = Vec::new();
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(_)) => break, // end of stream
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(EngineError::Decode(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("skipping corrupt packet: {e}");
                    continue;
                }
                Err(e) => return Err(EngineError::Decode(e.to_string())),
            };
            let spec = *decoded.spec();
            file_rate.get_or_insert(spec.rate);
            file_channels.get_or_insert(spec.channels.count());
            let needed = decoded.capacity() * spec.channels.count();
            if sample_buf.as_ref().is_none_or(|b| b.capacity() < needed) {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else { continue };
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        let (Some(file_rate), Some(file_channels)) = (file_rate, file_channels) else {
            return Err(EngineError::Decode("stream has no audio format".into()));
        };
        if samples.is_empty() || file_channels == 0 || file_rate == 0 {
            return Err(EngineError::Decode("no audio frames".into()));
        }

        let mut frames: Vec<StereoFrame> = if file_channels == 1 {
            samples.into_iter().map(StereoFrame::splat).collect() // mono, duplicate
        } else {
            samples
                .chunks_exact(file_channels)
                .map(|c| StereoFrame { left: c[0], right: c[1] }) // extra channels dropped
                .collect()
        };

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }
        log::info!(
            "decoded {} frames, {} ch @ {} Hz (resampled to {} Hz)",
            frames.len(),
            file_channels,
            file_rate,
            target_rate
        );

        Ok(Self::from_frames(frames, file_channels.min(2) as u16, target_rate))
    }

    pub fn frames(&self) -> &[StereoFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

pub fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        // fractional position in the source buffer
        let src_pos = i as f64 / ratio; // ex. 3.7
        let idx = src_pos.floor() as usize; // ex. 3
        let frac = (src_pos - idx as f64) as f32; // ex. 0.7
        if idx >= frames.len().saturating_sub(1) { // edge case
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            let a = frames[idx]; // ex. frame 3
            let b = frames[idx + 1]; // ex. frame 4
            out.push(StereoFrame { // blend via frac and linear interpolation
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_fixture::sine_wav;

    #[test]
    fn decodes_wav_bytes() {
        let signal = LoadedSignal::decode(sine_wav(1.0, 8000, 1), Some("wav"), 8000).unwrap();
        assert_eq!(signal.len(), 8000);
        assert_eq!(signal.channels(), 1);
        assert!((signal.duration() - 1.0).abs() < 1e-9);
        assert!(signal.frames().iter().any(|f| f.left.abs() > 0.4));
    }

    #[test]
    fn resamples_to_operating_rate() {
        let signal = LoadedSignal::decode(sine_wav(0.5, 8000, 2), None, 16000).unwrap();
        assert_eq!(signal.channels(), 2);
        assert_eq!(signal.sample_rate(), 16000);
        assert_eq!(signal.len(), 8000);
        assert!((signal.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        let err = LoadedSignal::decode(b"definitely not audio".to_vec(), Some("mp3"), 44100).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn cancelled_decode_stops_early() {
        let cancel = CancelFlag::default();
        cancel.cancel();
        let err = LoadedSignal::decode_with(sine_wav(1.0, 8000, 1), Some("wav"), 8000, &cancel).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn linear_resample_interpolates() {
        let frames = vec![StereoFrame::splat(0.0), StereoFrame::splat(1.0)];
        let out = resample_linear(&frames, 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1].left - 0.5).abs() < 1e-6);
        assert_eq!(out[3].left, 1.0);
    }
}

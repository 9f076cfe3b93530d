//! WAV encoder — canonical 44-byte header followed by interleaved 16-bit PCM.

use std::io::Cursor;

use super::frame::StereoFrame;

pub const MIME_TYPE: &str = "audio/wav";

/// Map a nominal [-1, 1] float onto the full i16 range. Out-of-range input
/// is clipped, never rejected; negatives scale by 32768 and the rest by
/// 32767 to match two's complement.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode stereo frames as a `channels`-channel (1 or 2) wav file in memory.
/// Mono output folds both sides of each frame together.
pub fn encode(frames: &[StereoFrame], channels: u16, sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let channels = channels.clamp(1, 2);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let data_len = frames.len() * channels as usize * 2;
    let mut cursor = Cursor::new(Vec::with_capacity(44 + data_len));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let mut samples = writer.get_i16_writer((frames.len() * channels as usize) as u32);
        for f in frames {
            if channels == 1 {
                samples.write_sample(to_i16(f.mono()));
            } else {
                samples.write_sample(to_i16(f.left));
                samples.write_sample(to_i16(f.right));
            }
        }
        samples.flush()?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

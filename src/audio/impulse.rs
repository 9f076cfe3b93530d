//! Synthetic impulse responses for the reverb path.
//!
//! A reverberant tail is approximated by a burst of white noise shaped by a
//! polynomial decay envelope. Every call draws fresh noise, so two responses
//! with the same tail length share an envelope but not their samples.

use rand::Rng;

/// Exponent of the decay envelope `(1 - i/len)^shape`.
pub const DECAY_SHAPE: f32 = 2.8;

/// A two-channel impulse response at a fixed sample rate.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Number of frames for a tail of `tail_seconds`, never less than one.
pub fn impulse_len(sample_rate: u32, tail_seconds: f32) -> usize {
    let len = (sample_rate as f64 * tail_seconds.max(0.0) as f64).round();
    (len as usize).max(1)
}

pub fn generate(sample_rate: u32, tail_seconds: f32, decay_shape: f32) -> ImpulseResponse {
    generate_with(&mut rand::rng(), sample_rate, tail_seconds, decay_shape)
}

pub fn generate_with<R: Rng>(
    rng: &mut R,
    sample_rate: u32,
    tail_seconds: f32,
    decay_shape: f32,
) -> ImpulseResponse {
    let len = impulse_len(sample_rate, tail_seconds);
    let mut channel = || -> Vec<f32> {
        (0..len)
            .map(|i| {
                let envelope = (1.0 - i as f32 / len as f32).powf(decay_shape);
                rng.random_range(-1.0f32..1.0) * envelope
            })
            .collect()
    };
    let left = channel();
    let right = channel();
    ImpulseResponse { left, right, sample_rate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn length_follows_tail_and_rate() {
        let ir = generate(44100, 2.0, DECAY_SHAPE);
        assert_eq!(ir.left.len(), 88200);
        assert_eq!(ir.right.len(), 88200);
        assert!((ir.duration() - 2.0).abs() < 1e-9);

        let ir = generate(8000, 0.00001, DECAY_SHAPE);
        assert_eq!(ir.len(), 1, "zero-length tails still produce one frame");
    }

    #[test]
    fn samples_stay_inside_envelope() {
        let mut rng = StdRng::seed_from_u64(7);
        let ir = generate_with(&mut rng, 8000, 0.5, DECAY_SHAPE);
        let len = ir.len() as f32;
        for (i, (&l, &r)) in ir.left.iter().zip(&ir.right).enumerate() {
            let envelope = (1.0 - i as f32 / len).powf(DECAY_SHAPE);
            assert!(l.abs() <= envelope + 1e-6, "left sample {i} escaped envelope");
            assert!(r.abs() <= envelope + 1e-6, "right sample {i} escaped envelope");
        }
    }

    #[test]
    fn energy_decays_over_the_tail() {
        let ir = generate(8000, 1.0, DECAY_SHAPE);
        let quarter = ir.len() / 4;
        let head = energy(&ir.left[..quarter]);
        let tail = energy(&ir.left[ir.len() - quarter..]);
        assert!(head > tail * 10.0, "head {head} should dominate tail {tail}");
    }

    #[test]
    fn regenerations_differ_in_content() {
        let a = generate(8000, 0.25, DECAY_SHAPE);
        let b = generate(8000, 0.25, DECAY_SHAPE);
        assert_eq!(a.len(), b.len());
        assert_ne!(a.left, b.left);
        assert_ne!(a.left, a.right, "channels are drawn independently");
    }
}

//! Convolution node for the wet path.
//!
//! Uniformly partitioned overlap-save convolution: the impulse response is
//! cut into `BLOCK_SIZE` slices whose spectra are multiplied against a
//! frequency-domain history of the input. Output lags input by one block.
//!
//! Kernels are prepared off the audio thread and swapped in whole, so a new
//! impulse response takes effect at the next block boundary. A kernel brings
//! its own zeroed history and leaves with the one it replaced, so a swap
//! neither allocates nor frees on the audio thread.

use std::sync::Arc;

use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::frame::StereoFrame;
use super::impulse::ImpulseResponse;

pub const BLOCK_SIZE: usize = 512;
const FFT_SIZE: usize = BLOCK_SIZE * 2;
const BINS: usize = BLOCK_SIZE + 1;

// Standard convolver loudness calibration: scale the IR to a fixed RMS reference
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Scale applied to an impulse response before convolution.
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let len = ir.len();
    if len == 0 {
        return 0.0;
    }
    let sum_sq: f32 = ir.left.iter().chain(&ir.right).map(|s| s * s).sum();
    let mut power = (sum_sq / (2 * len) as f32).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    (1.0 / power) * GAIN_CALIBRATION * GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate as f32
}

/// Partitioned spectra of a normalised two-channel impulse response.
#[derive(Clone)]
pub struct ConvolverKernel {
    partitions: [Vec<Vec<Complex32>>; 2],
    // history buffers the convolver swaps in along with this kernel
    spare: [Vec<Vec<Complex32>>; 2],
}

impl ConvolverKernel {
    pub fn new(ir: &ImpulseResponse) -> Self {
        let scale = normalization_scale(ir);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let left = partition(&ir.left, scale, fft.as_ref());
        let right = partition(&ir.right, scale, fft.as_ref());
        Self::with_spare([left, right])
    }

    // Passes nothing through; used until the first real impulse arrives
    pub fn silent() -> Self {
        let zero = vec![vec![Complex32::new(0.0, 0.0); BINS]];
        Self::with_spare([zero.clone(), zero])
    }

    fn with_spare(partitions: [Vec<Vec<Complex32>>; 2]) -> Self {
        let parts = partitions[0].len();
        Self { partitions, spare: [empty_history(parts), empty_history(parts)] }
    }

    pub fn num_partitions(&self) -> usize {
        self.partitions[0].len()
    }
}

fn partition(samples: &[f32], scale: f32, fft: &dyn RealToComplex<f32>) -> Vec<Vec<Complex32>> {
    let mut time = vec![0.0f32; FFT_SIZE];
    let mut scratch = fft.make_scratch_vec();
    samples
        .chunks(BLOCK_SIZE)
        .map(|chunk| {
            time.fill(0.0);
            for (t, s) in time.iter_mut().zip(chunk) {
                *t = s * scale;
            }
            let mut spectrum = fft.make_output_vec();
            if fft.process_with_scratch(&mut time, &mut spectrum, &mut scratch).is_err() {
                spectrum.fill(Complex32::new(0.0, 0.0));
            }
            spectrum
        })
        .collect()
}

pub struct Convolver {
    kernel: Box<ConvolverKernel>,
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    input: [Vec<f32>; 2],
    output: [Vec<f32>; 2],
    prev: [Vec<f32>; 2],
    // frequency-domain delay line, newest block at `head`
    history: [Vec<Vec<Complex32>>; 2],
    head: usize,
    fill: usize,
    time: Vec<f32>,
    acc: Vec<Complex32>,
    fwd_scratch: Vec<Complex32>,
    inv_scratch: Vec<Complex32>,
}

impl Convolver {
    pub fn new(mut kernel: ConvolverKernel) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let history = std::mem::take(&mut kernel.spare);
        let fwd_scratch = fft.make_scratch_vec();
        let inv_scratch = ifft.make_scratch_vec();
        Self {
            kernel: Box::new(kernel),
            fft,
            ifft,
            input: [vec![0.0; BLOCK_SIZE], vec![0.0; BLOCK_SIZE]],
            output: [vec![0.0; BLOCK_SIZE], vec![0.0; BLOCK_SIZE]],
            prev: [vec![0.0; BLOCK_SIZE], vec![0.0; BLOCK_SIZE]],
            history,
            head: 0,
            fill: 0,
            time: vec![0.0; FFT_SIZE],
            acc: vec![Complex32::new(0.0, 0.0); BINS],
            fwd_scratch,
            inv_scratch,
        }
    }

    /// Install a new kernel and hand back the one it replaces, carrying the
    /// old history, for the caller to free. Input history is kept, so the
    /// tail of what was already fed in continues through the new response.
    pub fn set_kernel(&mut self, mut kernel: Box<ConvolverKernel>) -> Box<ConvolverKernel> {
        let mut fresh = std::mem::take(&mut kernel.spare);
        if fresh[0].is_empty() {
            // a kernel that has been installed before arrives without buffers
            let parts = kernel.num_partitions();
            fresh = [empty_history(parts), empty_history(parts)];
        }
        let parts = fresh[0].len();
        for (ch, resized) in fresh.iter_mut().enumerate() {
            let old = &self.history[ch];
            // copy newest-first so the most recent input survives a shrink
            for k in 0..parts.min(old.len()) {
                let src = (self.head + old.len() - k) % old.len();
                let dst = (parts - k) % parts;
                resized[dst].copy_from_slice(&old[src]);
            }
        }
        self.head = 0;
        let old_history = std::mem::replace(&mut self.history, fresh);
        let mut retired = std::mem::replace(&mut self.kernel, kernel);
        retired.spare = old_history;
        retired
    }

    #[inline]
    pub fn process_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let out = StereoFrame {
            left: self.output[0][self.fill],
            right: self.output[1][self.fill],
        };
        self.input[0][self.fill] = input.left;
        self.input[1][self.fill] = input.right;
        self.fill += 1;
        if self.fill == BLOCK_SIZE {
            self.run_block();
            self.fill = 0;
        }
        out
    }

    fn run_block(&mut self) {
        let parts = self.history[0].len();
        self.head = (self.head + 1) % parts;
        for ch in 0..2 {
            self.time[..BLOCK_SIZE].copy_from_slice(&self.prev[ch]);
            self.time[BLOCK_SIZE..].copy_from_slice(&self.input[ch]);
            self.prev[ch].copy_from_slice(&self.input[ch]);

            let slot = &mut self.history[ch][self.head];
            if self
                .fft
                .process_with_scratch(&mut self.time, slot, &mut self.fwd_scratch)
                .is_err()
            {
                slot.fill(Complex32::new(0.0, 0.0));
            }

            self.acc.fill(Complex32::new(0.0, 0.0));
            for (k, h) in self.kernel.partitions[ch].iter().enumerate() {
                let x = &self.history[ch][(self.head + parts - k) % parts];
                for ((a, xv), hv) in self.acc.iter_mut().zip(x).zip(h) {
                    *a += xv * hv;
                }
            }
            // DC and Nyquist bins of a real signal carry no imaginary part
            self.acc[0].im = 0.0;
            self.acc[BINS - 1].im = 0.0;

            let out = &mut self.output[ch];
            if self
                .ifft
                .process_with_scratch(&mut self.acc, &mut self.time, &mut self.inv_scratch)
                .is_err()
            {
                out.fill(0.0);
                continue;
            }
            let norm = 1.0 / FFT_SIZE as f32;
            for (o, t) in out.iter_mut().zip(&self.time[BLOCK_SIZE..]) {
                *o = t * norm;
            }
        }
    }
}

fn empty_history(parts: usize) -> Vec<Vec<Complex32>> {
    vec![vec![Complex32::new(0.0, 0.0); BINS]; parts.max(1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(conv: &mut Convolver, input: &[f32]) -> Vec<f32> {
        input
            .iter()
            .map(|&x| conv.process_frame(StereoFrame::splat(x)).left)
            .collect()
    }

    fn direct(signal: &[f32], ir: &[f32], scale: f32) -> Vec<f32> {
        let mut out = vec![0.0f32; signal.len()];
        for n in 0..signal.len() {
            for (k, h) in ir.iter().enumerate().take(n + 1) {
                out[n] += signal[n - k] * h * scale;
            }
        }
        out
    }

    fn test_ir(len: usize) -> ImpulseResponse {
        let left: Vec<f32> = (0..len).map(|i| ((i * 7919) % 13) as f32 / 13.0 - 0.5).collect();
        ImpulseResponse { right: left.clone(), left, sample_rate: 44100 }
    }

    #[test]
    fn matches_direct_convolution_after_one_block() {
        let ir = test_ir(1300); // spans three partitions
        let scale = normalization_scale(&ir);
        let mut conv = Convolver::new(ConvolverKernel::new(&ir));

        let signal: Vec<f32> = (0..BLOCK_SIZE * 6).map(|i| ((i as f32) * 0.05).sin()).collect();
        let out = run(&mut conv, &signal);
        let expected = direct(&signal, &ir.left, scale);

        for n in 0..signal.len() - BLOCK_SIZE {
            let got = out[n + BLOCK_SIZE];
            assert!(
                (got - expected[n]).abs() < 1e-3,
                "sample {n}: got {got}, expected {}",
                expected[n]
            );
        }
    }

    #[test]
    fn silent_kernel_outputs_silence() {
        let mut conv = Convolver::new(ConvolverKernel::silent());
        let out = run(&mut conv, &vec![0.9; BLOCK_SIZE * 3]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn swapping_kernel_keeps_running() {
        let mut conv = Convolver::new(ConvolverKernel::new(&test_ir(2000)));
        run(&mut conv, &vec![0.5; BLOCK_SIZE * 2]);
        conv.set_kernel(Box::new(ConvolverKernel::new(&test_ir(600))));
        let out = run(&mut conv, &vec![0.5; BLOCK_SIZE * 4]);
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn swap_hands_back_old_kernel_with_its_history() {
        let mut conv = Convolver::new(ConvolverKernel::new(&test_ir(2000)));
        run(&mut conv, &vec![0.5; BLOCK_SIZE * 2]);

        let incoming = Box::new(ConvolverKernel::new(&test_ir(600)));
        assert_eq!(incoming.spare[0].len(), 2);
        let retired = conv.set_kernel(incoming);

        // the old kernel leaves with the four-block history it was running on
        assert_eq!(retired.num_partitions(), 4);
        assert_eq!(retired.spare[0].len(), 4);
        assert_eq!(retired.spare[1].len(), 4);
        assert!(retired.spare[0].iter().flatten().any(|c| c.norm() > 0.0));
        // and the convolver now runs on the buffers the new kernel brought
        assert_eq!(conv.history[0].len(), 2);
        assert_eq!(conv.kernel.spare[0].len(), 0);
    }

    #[test]
    fn swap_carries_the_newest_input_into_the_new_history() {
        let ir = test_ir(1300);
        let scale = normalization_scale(&ir);
        let mut conv = Convolver::new(ConvolverKernel::new(&test_ir(900)));
        let signal: Vec<f32> = (0..BLOCK_SIZE * 6).map(|i| ((i as f32) * 0.05).sin()).collect();

        let mut out = run(&mut conv, &signal[..BLOCK_SIZE * 3]);
        conv.set_kernel(Box::new(ConvolverKernel::new(&ir)));
        out.extend(run(&mut conv, &signal[BLOCK_SIZE * 3..]));

        // once the swap block has gone through, the output is the new response over
        // the input history, as if the new kernel had been in place all along
        let expected = direct(&signal, &ir.left, scale);
        for n in BLOCK_SIZE * 3..signal.len() - BLOCK_SIZE {
            let got = out[n + BLOCK_SIZE];
            assert!((got - expected[n]).abs() < 1e-3, "sample {n}: got {got}, expected {}", expected[n]);
        }
    }

    #[test]
    fn normalization_follows_calibration() {
        let ir = ImpulseResponse { left: vec![1.0; 4], right: vec![1.0; 4], sample_rate: 44100 };
        assert!((normalization_scale(&ir) - GAIN_CALIBRATION).abs() < 1e-9);

        let quiet = ImpulseResponse { left: vec![0.0; 4], right: vec![0.0; 4], sample_rate: 22050 };
        let expected = (1.0 / MIN_POWER) * GAIN_CALIBRATION * 2.0;
        assert!((normalization_scale(&quiet) - expected).abs() < 1e-3);
    }
}

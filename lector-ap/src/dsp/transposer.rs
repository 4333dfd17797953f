//! Linear-interpolation rate transposer
//!
//! Resamples a stream by walking the source at `rate` frames per output
//! frame and interpolating linearly between the two nearest source frames.
//! Changes pitch and duration together.

use super::fifo::{SampleFifo, CHANNELS};
use super::SamplePipe;

/// Rate transposer stage
#[derive(Debug, Clone)]
pub struct RateTransposer {
    rate: f32,
    /// Fractional read position between the current and next source frame
    slope_count: f32,
    /// Last frame of the previous call, bridges call boundaries
    prev_left: f32,
    prev_right: f32,
}

impl Default for RateTransposer {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTransposer {
    /// Create a transposer at rate 1.0
    pub fn new() -> Self {
        Self {
            rate: 1.0,
            slope_count: 0.0,
            prev_left: 0.0,
            prev_right: 0.0,
        }
    }

    /// Current rate (source frames consumed per output frame)
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Set the rate; must be positive
    pub fn set_rate(&mut self, rate: f32) {
        debug_assert!(rate > 0.0, "rate must be positive");
        self.rate = rate;
    }

    /// Forget interpolation state
    pub fn reset(&mut self) {
        self.slope_count = 0.0;
        self.prev_left = 0.0;
        self.prev_right = 0.0;
    }

    /// Transpose all `num_frames` live frames of `input` into the spare
    /// capacity of `output` (starting at its end index).
    ///
    /// # Returns
    /// Number of output frames written; the caller commits them with `put`
    fn transpose(&mut self, input: &SampleFifo, output: &mut SampleFifo, num_frames: usize) -> usize {
        if num_frames == 0 {
            return 0;
        }
        let src = &input.vector()[input.start_index()..input.end_index()];
        let dest_offset = output.end_index();
        let dest = output.vector_mut();
        let rate = self.rate;

        let mut used = 0usize;
        let mut i = 0usize;

        while self.slope_count < 1.0 {
            let d = dest_offset + CHANNELS * i;
            dest[d] = (1.0 - self.slope_count) * self.prev_left + self.slope_count * src[0];
            dest[d + 1] = (1.0 - self.slope_count) * self.prev_right + self.slope_count * src[1];
            i += 1;
            self.slope_count += rate;
        }
        self.slope_count -= 1.0;

        if num_frames != 1 {
            'out: loop {
                while self.slope_count > 1.0 {
                    self.slope_count -= 1.0;
                    used += 1;
                    if used >= num_frames - 1 {
                        break 'out;
                    }
                }
                let s = CHANNELS * used;
                let d = dest_offset + CHANNELS * i;
                dest[d] = (1.0 - self.slope_count) * src[s] + self.slope_count * src[s + 2];
                dest[d + 1] = (1.0 - self.slope_count) * src[s + 1] + self.slope_count * src[s + 3];
                i += 1;
                self.slope_count += rate;
            }
        }

        self.prev_left = src[CHANNELS * num_frames - 2];
        self.prev_right = src[CHANNELS * num_frames - 1];
        i
    }
}

impl SamplePipe for RateTransposer {
    fn process(&mut self, input: &mut SampleFifo, output: &mut SampleFifo) {
        let num_frames = input.frame_count();
        if num_frames == 0 {
            return;
        }
        let max_output = (num_frames as f64 / self.rate as f64).ceil() as usize + 4;
        output.ensure_additional_capacity(max_output);
        let produced = self.transpose(input, output, num_frames);
        input.receive(num_frames);
        output.put(produced);
    }

    fn clear(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_ramp(frames: usize) -> Vec<f32> {
        (0..frames).flat_map(|i| [i as f32, -(i as f32)]).collect()
    }

    fn run(transposer: &mut RateTransposer, samples: &[f32]) -> Vec<f32> {
        let mut input = SampleFifo::new();
        let mut output = SampleFifo::new();
        input.put_samples(samples, 0, samples.len() / CHANNELS);
        transposer.process(&mut input, &mut output);
        assert_eq!(input.frame_count(), 0);
        let mut out = vec![0.0; output.frame_count() * CHANNELS];
        output.receive_samples(&mut out, output.frame_count());
        out
    }

    #[test]
    fn test_unit_rate_is_identity_after_first_frame() {
        let mut transposer = RateTransposer::new();
        let input = stereo_ramp(100);
        let out = run(&mut transposer, &input);

        // First output frame blends with the (silent) previous call
        assert_eq!(&out[..2], &[0.0, 0.0]);
        for (frame, pair) in out.chunks(2).enumerate().skip(1) {
            let expected = (frame - 1) as f32;
            assert!((pair[0] - expected).abs() < 1e-4, "frame {frame}");
            assert!((pair[1] + expected).abs() < 1e-4, "frame {frame}");
        }
    }

    #[test]
    fn test_unit_rate_continues_across_calls() {
        let mut transposer = RateTransposer::new();
        let input = stereo_ramp(64);
        let first = run(&mut transposer, &input[..64]);
        let second = run(&mut transposer, &input[64..]);

        let total: Vec<f32> = first.into_iter().chain(second).collect();
        let frames = total.len() / CHANNELS;
        assert!((frames as i64 - 64).abs() <= 2);
        // Values remain a monotone ramp across the call boundary
        for pair in total.chunks(2).collect::<Vec<_>>().windows(2) {
            assert!(pair[1][0] >= pair[0][0] - 1e-4);
        }
    }

    #[test]
    fn test_double_rate_halves_frames() {
        let mut transposer = RateTransposer::new();
        transposer.set_rate(2.0);
        let out = run(&mut transposer, &stereo_ramp(1000));
        let frames = out.len() / CHANNELS;
        assert!((frames as i64 - 500).abs() <= 2, "got {frames}");
    }

    #[test]
    fn test_half_rate_doubles_frames_and_interpolates() {
        let mut transposer = RateTransposer::new();
        transposer.set_rate(0.5);
        let out = run(&mut transposer, &stereo_ramp(100));
        let frames = out.len() / CHANNELS;
        assert!((frames as i64 - 200).abs() <= 3, "got {frames}");
        // Midpoints appear between integer source frames
        assert!(out.chunks(2).any(|pair| (pair[0] - 10.5).abs() < 1e-4));
    }

    #[test]
    fn test_single_frame_input() {
        let mut transposer = RateTransposer::new();
        let out = run(&mut transposer, &[0.5, -0.5]);
        assert_eq!(out.len(), 2);
        assert_eq!(out, vec![0.0, 0.0]);
        let out = run(&mut transposer, &[1.0, -1.0]);
        assert_eq!(out, vec![0.5, -0.5]);
    }
}

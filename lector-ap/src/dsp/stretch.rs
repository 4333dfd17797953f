//! WSOLA time-stretcher
//!
//! Changes duration by `tempo` without altering pitch. Each processing cycle
//! picks the input offset whose start best matches the tail of the previous
//! output segment (cross-correlation against a triangular-weighted copy of
//! the tail), cross-fades the two over `overlap_length` frames, copies the
//! verbatim middle of the window, stores the new tail, and then skips ahead
//! by a fractional amount that averages to `tempo * (window - overlap)`.
//!
//! # Parameters
//!
//! Sequence and seek-window lengths follow a linear auto formula on tempo
//! unless set explicitly through [`Stretch::set_parameters`]:
//!
//! | tempo | sequence ms | seek window ms |
//! |-------|-------------|----------------|
//! | ≤ 0.5 | 125         | 25             |
//! | ≥ 2.0 | 50          | 15             |

use super::fifo::{SampleFifo, CHANNELS};
use super::SamplePipe;

/// Default cross-fade length
pub const DEFAULT_OVERLAP_MS: u32 = 8;

/// Sample rate assumed until [`Stretch::set_parameters`] is called
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Overlap never drops below this many frames
const MIN_OVERLAP_FRAMES: usize = 16;

/// Overlap is rounded down to a multiple of this
const OVERLAP_ALIGN: usize = 8;

const AUTOSEQ_TEMPO_LOW: f64 = 0.5;
const AUTOSEQ_TEMPO_TOP: f64 = 2.0;
const AUTOSEQ_AT_MIN: f64 = 125.0;
const AUTOSEQ_AT_MAX: f64 = 50.0;
const AUTOSEQ_K: f64 = (AUTOSEQ_AT_MAX - AUTOSEQ_AT_MIN) / (AUTOSEQ_TEMPO_TOP - AUTOSEQ_TEMPO_LOW);
const AUTOSEQ_C: f64 = AUTOSEQ_AT_MIN - AUTOSEQ_K * AUTOSEQ_TEMPO_LOW;

const AUTOSEEK_AT_MIN: f64 = 25.0;
const AUTOSEEK_AT_MAX: f64 = 15.0;
const AUTOSEEK_K: f64 = (AUTOSEEK_AT_MAX - AUTOSEEK_AT_MIN) / (AUTOSEQ_TEMPO_TOP - AUTOSEQ_TEMPO_LOW);
const AUTOSEEK_C: f64 = AUTOSEEK_AT_MIN - AUTOSEEK_K * AUTOSEQ_TEMPO_LOW;

/// Offset tables for the hierarchical quick seek, coarse to fine.
/// A zero entry terminates a table.
const SCAN_OFFSETS: [[i32; 24]; 4] = [
    [
        124, 186, 248, 310, 372, 434, 496, 558, 620, 682, 744, 806, 868, 930, 992, 1054, 1116,
        1178, 1240, 1302, 1364, 1426, 1488, 0,
    ],
    [
        -100, -75, -50, -25, 25, 50, 75, 100, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [
        -20, -15, -10, -5, 5, 10, 15, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [
        -4, -3, -2, -1, 1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ],
];

/// Overlap-offset search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Successive refinement over the four offset tables (default)
    Quick,
    /// Every offset in `[0, seek_length)`
    Exhaustive,
}

/// WSOLA time-stretch stage
#[derive(Debug, Clone)]
pub struct Stretch {
    sample_rate: u32,
    sequence_ms: u32,
    seek_window_ms: u32,
    overlap_ms: u32,
    auto_sequence: bool,
    auto_seek_window: bool,
    seek_mode: SeekMode,

    tempo: f32,
    overlap_length: usize,
    seek_window_length: usize,
    seek_length: usize,
    nominal_skip: f32,
    skip_fract: f32,
    sample_req: usize,

    /// Tail of the previous output segment; `None` until primed
    mid_buffer: Option<Vec<f32>>,
    /// `mid_buffer` weighted by `i * (overlap - i)`
    ref_mid_buffer: Vec<f32>,
}

impl Default for Stretch {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl Stretch {
    /// Create a stretcher at tempo 1.0 with auto sequence/seek lengths
    pub fn new(sample_rate: u32) -> Self {
        let mut stretch = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            sequence_ms: 0,
            seek_window_ms: 0,
            overlap_ms: DEFAULT_OVERLAP_MS,
            auto_sequence: true,
            auto_seek_window: true,
            seek_mode: SeekMode::Quick,
            tempo: 1.0,
            overlap_length: 0,
            seek_window_length: 0,
            seek_length: 0,
            nominal_skip: 0.0,
            skip_fract: 0.0,
            sample_req: 0,
            mid_buffer: None,
            ref_mid_buffer: Vec::new(),
        };
        stretch.set_parameters(sample_rate, 0, 0, DEFAULT_OVERLAP_MS);
        stretch
    }

    /// Reconfigure window sizes.
    ///
    /// # Arguments
    /// * `sample_rate` - Hz; `0` keeps the current rate
    /// * `sequence_ms` - processing window; `0` selects the auto formula
    /// * `seek_window_ms` - offset search range; `0` selects the auto formula
    /// * `overlap_ms` - cross-fade length; `0` keeps the current value
    pub fn set_parameters(&mut self, sample_rate: u32, sequence_ms: u32, seek_window_ms: u32, overlap_ms: u32) {
        if sample_rate > 0 {
            self.sample_rate = sample_rate;
        }
        if overlap_ms > 0 {
            self.overlap_ms = overlap_ms;
        }
        self.auto_sequence = sequence_ms == 0;
        if !self.auto_sequence {
            self.sequence_ms = sequence_ms;
        }
        self.auto_seek_window = seek_window_ms == 0;
        if !self.auto_seek_window {
            self.seek_window_ms = seek_window_ms;
        }

        self.calculate_sequence_parameters();
        self.calculate_overlap_length();
        self.set_tempo(self.tempo);
    }

    /// Current tempo
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Set tempo and re-derive the skip and input requirement
    pub fn set_tempo(&mut self, tempo: f32) {
        self.tempo = tempo;
        self.calculate_sequence_parameters();

        let stride = self.seek_window_length as f32 - self.overlap_length as f32;
        self.nominal_skip = self.tempo * stride;
        self.skip_fract = 0.0;
        let int_skip = (self.nominal_skip + 0.5).floor().max(0.0) as usize;
        self.sample_req = (int_skip + self.overlap_length).max(self.seek_window_length) + self.seek_length;
    }

    /// Select the overlap search strategy
    pub fn set_seek_mode(&mut self, mode: SeekMode) {
        self.seek_mode = mode;
    }

    /// Current overlap search strategy
    pub fn seek_mode(&self) -> SeekMode {
        self.seek_mode
    }

    /// Sample rate the window lengths are derived from
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Input frames needed before one processing cycle can run
    pub fn input_chunk_size(&self) -> usize {
        self.sample_req
    }

    /// Output frames produced by one processing cycle
    pub fn output_chunk_size(&self) -> usize {
        self.overlap_length + self.seek_window_length.saturating_sub(2 * self.overlap_length)
    }

    /// Cross-fade length in frames
    pub fn overlap_length(&self) -> usize {
        self.overlap_length
    }

    /// Processing window in frames
    pub fn seek_window_length(&self) -> usize {
        self.seek_window_length
    }

    /// Offset search range in frames
    pub fn seek_length(&self) -> usize {
        self.seek_length
    }

    /// Processing window in milliseconds (auto or explicit)
    pub fn sequence_ms(&self) -> u32 {
        self.sequence_ms
    }

    /// Offset search range in milliseconds (auto or explicit)
    pub fn seek_window_ms(&self) -> u32 {
        self.seek_window_ms
    }

    /// Fractional input skip per cycle
    pub fn nominal_skip(&self) -> f32 {
        self.nominal_skip
    }

    fn calculate_overlap_length(&mut self) {
        let mut overlap = (self.sample_rate as u64 * self.overlap_ms as u64 / 1000) as usize;
        overlap = overlap.max(MIN_OVERLAP_FRAMES);
        overlap -= overlap % OVERLAP_ALIGN;
        if overlap != self.overlap_length {
            self.mid_buffer = None;
        }
        self.overlap_length = overlap;
        self.ref_mid_buffer = vec![0.0; overlap * CHANNELS];
    }

    fn calculate_sequence_parameters(&mut self) {
        let tempo = self.tempo as f64;
        if self.auto_sequence {
            let seq = (AUTOSEQ_C + AUTOSEQ_K * tempo).clamp(AUTOSEQ_AT_MAX, AUTOSEQ_AT_MIN);
            self.sequence_ms = (seq + 0.5).floor() as u32;
        }
        if self.auto_seek_window {
            let seek = (AUTOSEEK_C + AUTOSEEK_K * tempo).clamp(AUTOSEEK_AT_MAX, AUTOSEEK_AT_MIN);
            self.seek_window_ms = (seek + 0.5).floor() as u32;
        }
        self.seek_window_length = (self.sample_rate as u64 * self.sequence_ms as u64 / 1000) as usize;
        // The window must advance past the cross-fade or no input is consumed
        self.seek_window_length = self.seek_window_length.max(2 * self.overlap_length);
        self.seek_length = (self.sample_rate as u64 * self.seek_window_ms as u64 / 1000) as usize;
    }

    fn seek_best_overlap_position(&mut self, input: &SampleFifo) -> usize {
        self.precalculate_correlation_reference();
        match self.seek_mode {
            SeekMode::Quick => self.seek_quick(input),
            SeekMode::Exhaustive => self.seek_exhaustive(input),
        }
    }

    fn seek_exhaustive(&self, input: &SampleFifo) -> usize {
        let mut best_offset = 0;
        let mut best_correlation = f32::MIN_POSITIVE;
        for offset in 0..self.seek_length {
            let correlation = self.cross_correlation(input, offset);
            if correlation > best_correlation {
                best_correlation = correlation;
                best_offset = offset;
            }
        }
        best_offset
    }

    fn seek_quick(&self, input: &SampleFifo) -> usize {
        let mut best_offset = 0usize;
        let mut best_correlation = f32::MIN_POSITIVE;
        let mut correlation_offset = 0i64;

        for table in SCAN_OFFSETS.iter() {
            for &step in table.iter().take_while(|&&step| step != 0) {
                let candidate = correlation_offset + step as i64;
                if candidate >= self.seek_length as i64 {
                    break;
                }
                // Refinements around offset 0 may point before the window
                if candidate < 0 {
                    continue;
                }
                let candidate = candidate as usize;
                let correlation = self.cross_correlation(input, candidate);
                if correlation > best_correlation {
                    best_correlation = correlation;
                    best_offset = candidate;
                }
            }
            correlation_offset = best_offset as i64;
        }
        best_offset
    }

    fn precalculate_correlation_reference(&mut self) {
        let Some(mid) = self.mid_buffer.as_ref() else {
            return;
        };
        let overlap = self.overlap_length;
        for i in 0..overlap {
            let weight = (i * (overlap - i)) as f32;
            let c = i * CHANNELS;
            self.ref_mid_buffer[c] = mid[c] * weight;
            self.ref_mid_buffer[c + 1] = mid[c + 1] * weight;
        }
    }

    /// Dot product of the input window at `offset` against the weighted tail
    fn cross_correlation(&self, input: &SampleFifo, offset: usize) -> f32 {
        let mixing = &input.vector()[input.start_index() + offset * CHANNELS..];
        let compare = &self.ref_mid_buffer;
        // Frame 0 carries zero weight
        (CHANNELS..self.overlap_length * CHANNELS)
            .step_by(CHANNELS)
            .map(|i| mixing[i] * compare[i] + mixing[i + 1] * compare[i + 1])
            .sum()
    }

    /// Cross-fade the stored tail into the input at `offset`, writing
    /// `overlap_length` frames past the end of `output`
    fn overlap(&self, mid: &[f32], input: &SampleFifo, output: &mut SampleFifo, offset: usize) {
        let overlap = self.overlap_length;
        let input_pos = input.start_index() + offset * CHANNELS;
        let src = &input.vector()[input_pos..input_pos + overlap * CHANNELS];
        let output_pos = output.end_index();
        let dest = &mut output.vector_mut()[output_pos..output_pos + overlap * CHANNELS];
        let scale = 1.0 / overlap as f32;

        for i in 0..overlap {
            let fade_out = (overlap - i) as f32 * scale;
            let fade_in = i as f32 * scale;
            let c = i * CHANNELS;
            dest[c] = src[c] * fade_in + mid[c] * fade_out;
            dest[c + 1] = src[c + 1] * fade_in + mid[c + 1] * fade_out;
        }
    }
}

impl SamplePipe for Stretch {
    fn process(&mut self, input: &mut SampleFifo, output: &mut SampleFifo) {
        let overlap = self.overlap_length;
        if self.nominal_skip <= 0.0 {
            return;
        }
        if self.mid_buffer.is_none() {
            if input.frame_count() < overlap {
                return;
            }
            let mut mid = vec![0.0; overlap * CHANNELS];
            input.receive_samples(&mut mid, overlap);
            self.mid_buffer = Some(mid);
        }

        while input.frame_count() >= self.sample_req {
            let offset = self.seek_best_overlap_position(input);

            output.ensure_additional_capacity(overlap);
            let Some(mid) = self.mid_buffer.take() else {
                return;
            };
            self.overlap(&mid, input, output, offset);
            output.put(overlap);

            let middle = self.seek_window_length.saturating_sub(2 * overlap);
            if middle > 0 {
                output.put_buffer(input, offset + overlap, middle);
            }

            // New tail starts where the next cycle's cross-fade begins
            let mut mid = mid;
            let tail_frame = (offset + self.seek_window_length).saturating_sub(overlap);
            input.extract(&mut mid, tail_frame, overlap);
            self.mid_buffer = Some(mid);

            self.skip_fract += self.nominal_skip;
            let skip = self.skip_fract.floor();
            self.skip_fract -= skip;
            input.receive(skip.max(0.0) as usize);
        }
    }

    fn clear(&mut self) {
        self.mid_buffer = None;
        self.skip_fract = 0.0;
    }
}

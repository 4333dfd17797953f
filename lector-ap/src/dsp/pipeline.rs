//! Tempo/pitch pipeline combining the rate transposer and the stretcher
//!
//! Pitch is realised as "stretch by `tempo / pitch`, then resample by
//! `rate * pitch`", so the output keeps the source sample rate while tempo
//! and pitch move independently. The stage that shrinks the data runs
//! first: the transposer leads when the effective rate is at most 1.0, the
//! stretcher leads otherwise.

use super::fifo::SampleFifo;
use super::stretch::{SeekMode, Stretch};
use super::transposer::RateTransposer;
use super::SamplePipe;
use tracing::trace;

/// Effective values closer than this are treated as unchanged
const PARAMETER_EPSILON: f32 = 1e-10;

/// Which stage reads the pipeline input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOrder {
    /// input -> transposer -> intermediate -> stretch -> output
    TransposeFirst,
    /// input -> stretch -> intermediate -> transposer -> output
    StretchFirst,
}

/// Independent tempo and pitch control over a stereo stream
pub struct TempoPitchPipeline {
    transposer: RateTransposer,
    stretch: Stretch,
    input: SampleFifo,
    intermediate: SampleFifo,
    output: SampleFifo,
    order: StageOrder,

    /// User-facing knobs
    virtual_tempo: f32,
    virtual_pitch: f32,
    virtual_rate: f32,

    /// Derived values actually applied to the stages
    effective_tempo: f32,
    effective_rate: f32,
}

impl TempoPitchPipeline {
    /// Create a pipeline for audio at `sample_rate` with all knobs at 1.0
    pub fn new(sample_rate: u32) -> Self {
        let mut pipeline = Self {
            transposer: RateTransposer::new(),
            stretch: Stretch::new(sample_rate),
            input: SampleFifo::new(),
            intermediate: SampleFifo::new(),
            output: SampleFifo::new(),
            order: StageOrder::TransposeFirst,
            virtual_tempo: 1.0,
            virtual_pitch: 1.0,
            virtual_rate: 1.0,
            effective_tempo: 0.0,
            effective_rate: 0.0,
        };
        pipeline.recalculate();
        pipeline
    }

    /// Playback-duration scale (1.0 = unchanged)
    pub fn tempo(&self) -> f32 {
        self.virtual_tempo
    }

    pub fn set_tempo(&mut self, tempo: f32) {
        self.virtual_tempo = tempo;
        self.recalculate();
    }

    /// Set tempo as a percentage change (`+50` = 1.5x)
    pub fn set_tempo_change(&mut self, percent: f32) {
        self.set_tempo(1.0 + 0.01 * percent);
    }

    /// Fundamental-frequency scale (1.0 = unchanged)
    pub fn pitch(&self) -> f32 {
        self.virtual_pitch
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.virtual_pitch = pitch;
        self.recalculate();
    }

    /// Set pitch in octaves (`pitch = 2^octaves`)
    pub fn set_pitch_octaves(&mut self, octaves: f32) {
        self.set_pitch(octaves.exp2());
    }

    /// Set pitch in semitones (`octaves = semitones / 12`)
    pub fn set_pitch_semitones(&mut self, semitones: f32) {
        self.set_pitch_octaves(semitones / 12.0);
    }

    /// Raw resample scale; changes tempo and pitch together
    pub fn rate(&self) -> f32 {
        self.virtual_rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.virtual_rate = rate;
        self.recalculate();
    }

    /// Set rate as a percentage change (`-25` = 0.75x)
    pub fn set_rate_change(&mut self, percent: f32) {
        self.set_rate(1.0 + 0.01 * percent);
    }

    /// `tempo / pitch`, as applied to the stretcher
    pub fn effective_tempo(&self) -> f32 {
        self.effective_tempo
    }

    /// `rate * pitch`, as applied to the transposer
    pub fn effective_rate(&self) -> f32 {
        self.effective_rate
    }

    /// Current stage order
    pub fn stage_order(&self) -> StageOrder {
        self.order
    }

    /// Select the stretcher's overlap search
    pub fn set_seek_mode(&mut self, mode: SeekMode) {
        self.stretch.set_seek_mode(mode);
    }

    /// Read-only view of the stretcher
    pub fn stretch(&self) -> &Stretch {
        &self.stretch
    }

    /// Frames go in here
    pub fn input_mut(&mut self) -> &mut SampleFifo {
        &mut self.input
    }

    pub fn input(&self) -> &SampleFifo {
        &self.input
    }

    /// Transformed frames come out here
    pub fn output_mut(&mut self) -> &mut SampleFifo {
        &mut self.output
    }

    pub fn output(&self) -> &SampleFifo {
        &self.output
    }

    fn recalculate(&mut self) {
        let previous_tempo = self.effective_tempo;
        let previous_rate = self.effective_rate;
        self.effective_tempo = self.virtual_tempo / self.virtual_pitch;
        self.effective_rate = self.virtual_rate * self.virtual_pitch;

        if (self.effective_tempo - previous_tempo).abs() > PARAMETER_EPSILON {
            self.stretch.set_tempo(self.effective_tempo);
        }
        if (self.effective_rate - previous_rate).abs() > PARAMETER_EPSILON {
            self.transposer.set_rate(self.effective_rate);
        }

        let order = if self.effective_rate > 1.0 {
            StageOrder::StretchFirst
        } else {
            StageOrder::TransposeFirst
        };
        if order != self.order {
            trace!(?order, rate = self.effective_rate, "Rewiring pipeline stages");
            self.order = order;
        }
    }

    /// Push everything currently in the input FIFO through both stages
    pub fn process(&mut self) {
        match self.order {
            StageOrder::TransposeFirst => {
                self.transposer.process(&mut self.input, &mut self.intermediate);
                self.stretch.process(&mut self.intermediate, &mut self.output);
            }
            StageOrder::StretchFirst => {
                self.stretch.process(&mut self.input, &mut self.intermediate);
                self.transposer.process(&mut self.intermediate, &mut self.output);
            }
        }
    }

    /// Drop all buffered audio and per-stream stage state
    pub fn clear(&mut self) {
        self.input.clear();
        self.intermediate.clear();
        self.output.clear();
        self.transposer.clear();
        self.stretch.clear();
    }
}

/// Cloning copies the knobs and stage configuration, not buffered audio.
impl Clone for TempoPitchPipeline {
    fn clone(&self) -> Self {
        let mut pipeline = Self::new(self.stretch.sample_rate());
        pipeline.set_seek_mode(self.stretch.seek_mode());
        pipeline.virtual_tempo = self.virtual_tempo;
        pipeline.virtual_pitch = self.virtual_pitch;
        pipeline.virtual_rate = self.virtual_rate;
        pipeline.recalculate();
        pipeline
    }
}

impl std::fmt::Debug for TempoPitchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempoPitchPipeline")
            .field("tempo", &self.virtual_tempo)
            .field("pitch", &self.virtual_pitch)
            .field("rate", &self.virtual_rate)
            .field("order", &self.order)
            .field("buffered", &self.output.frame_count())
            .finish()
    }
}

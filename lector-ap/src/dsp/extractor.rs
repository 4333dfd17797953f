//! Pull-based streaming extractor
//!
//! Decouples the pipeline's chunked `process()` cycles from whatever frame
//! count the output device asks for. Recently extracted output stays in the
//! output FIFO (up to `history_size` frames) so the logical position can be
//! moved back without re-processing.
//!
//! ```text
//! source --chunk--> pipeline.input -> [transposer/stretch] -> pipeline.output
//!                                                               |
//!                          [retained history | not yet extracted]
//!                                            ^ output_position
//! ```

use super::fifo::CHANNELS;
use super::pipeline::TempoPitchPipeline;
use super::source::FrameSource;
use crate::error::{Error, Result};
use tracing::trace;

/// Default retained output history in frames
pub const DEFAULT_HISTORY_FRAMES: usize = 22_050;

/// Frames pulled from the source per fill step
pub const INPUT_CHUNK_FRAMES: usize = 16_384;

/// Streams frames from a [`FrameSource`] through a [`TempoPitchPipeline`]
pub struct StreamingExtractor<S: FrameSource> {
    source: S,
    pipeline: TempoPitchPipeline,
    history_size: usize,
    /// Next frame to request from the source
    source_position: usize,
    /// Read offset into the output FIFO; frames before it are history
    output_position: usize,
    /// Logical frames extracted so far
    position: usize,
    /// Reused buffer for source reads
    scratch: Vec<f32>,
}

impl<S: FrameSource> StreamingExtractor<S> {
    /// Create an extractor with the default history depth
    pub fn new(source: S, pipeline: TempoPitchPipeline) -> Self {
        Self::with_history(source, pipeline, DEFAULT_HISTORY_FRAMES)
    }

    /// Create an extractor retaining `history_size` frames of output
    pub fn with_history(source: S, pipeline: TempoPitchPipeline, history_size: usize) -> Self {
        Self {
            source,
            pipeline,
            history_size,
            source_position: 0,
            output_position: 0,
            position: 0,
            scratch: Vec::new(),
        }
    }

    /// Pipeline, for tempo/pitch/rate changes
    pub fn pipeline_mut(&mut self) -> &mut TempoPitchPipeline {
        &mut self.pipeline
    }

    pub fn pipeline(&self) -> &TempoPitchPipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Logical output position in frames
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move the logical position back into retained history.
    ///
    /// # Errors
    /// [`Error::SeekOutOfRange`] when `position` is ahead of the current
    /// position or older than the retained history
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        let oldest = self.position - self.output_position;
        if position > self.position || position < oldest {
            return Err(Error::SeekOutOfRange {
                requested: position as u64,
                min: oldest as u64,
                max: self.position as u64,
            });
        }
        self.output_position -= self.position - position;
        self.position = position;
        Ok(())
    }

    /// Next source frame to be read
    pub fn source_position(&self) -> usize {
        self.source_position
    }

    /// Jump to an absolute source frame; all buffered state is dropped
    pub fn set_source_position(&mut self, source_position: usize) {
        self.clear();
        self.source_position = source_position;
    }

    /// Drop buffered audio and history
    pub fn clear(&mut self) {
        self.pipeline.clear();
        self.output_position = 0;
    }

    fn fill_input_buffer(&mut self, num_frames: usize) {
        if num_frames == 0 {
            return;
        }
        self.scratch.resize(num_frames * CHANNELS, 0.0);
        let extracted = self
            .source
            .extract(&mut self.scratch, num_frames, self.source_position);
        self.source_position += extracted;
        self.pipeline.input_mut().put_samples(&self.scratch, 0, extracted);
    }

    /// Process input until the output FIFO holds `num_frames` frames or the
    /// source is exhausted.
    ///
    /// A final partial chunk is still pushed through the pipeline so the
    /// stages can emit what they are able to.
    pub fn fill_output_buffer(&mut self, num_frames: usize) {
        while self.pipeline.output().frame_count() < num_frames {
            let wanted = INPUT_CHUNK_FRAMES.saturating_sub(self.pipeline.input().frame_count());
            self.fill_input_buffer(wanted);
            if self.pipeline.input().frame_count() < INPUT_CHUNK_FRAMES {
                self.pipeline.process();
                trace!(
                    source_position = self.source_position,
                    "Source exhausted while filling output"
                );
                break;
            }
            self.pipeline.process();
        }
    }

    /// Copy up to `num_frames` transformed frames into `target`.
    ///
    /// # Returns
    /// Frames written; fewer than requested only at end of stream, `0` once
    /// the stream is finished
    pub fn extract(&mut self, target: &mut [f32], num_frames: usize) -> usize {
        let num_frames = num_frames.min(target.len() / CHANNELS);
        self.fill_output_buffer(self.output_position + num_frames);

        let output = self.pipeline.output_mut();
        let available = output.frame_count().saturating_sub(self.output_position);
        let extracted = num_frames.min(available);
        output.extract(target, self.output_position, extracted);

        let current = self.output_position + extracted;
        self.output_position = current.min(self.history_size);
        output.receive(current.saturating_sub(self.history_size));
        self.position += extracted;
        extracted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DecodedAudio;
    use crate::dsp::source::DecodedSource;
    use std::sync::Arc;

    const RATE: u32 = 22_050;

    fn extractor(frames: usize, history: usize) -> StreamingExtractor<DecodedSource> {
        let samples = (0..frames).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();
        let source = DecodedSource::new(Arc::new(DecodedAudio::mono(samples, RATE)));
        StreamingExtractor::with_history(source, TempoPitchPipeline::new(RATE), history)
    }

    fn drain(extractor: &mut StreamingExtractor<DecodedSource>, block: usize) -> usize {
        let mut target = vec![0.0; block * CHANNELS];
        let mut total = 0;
        loop {
            let n = extractor.extract(&mut target, block);
            if n == 0 {
                return total;
            }
            total += n;
        }
    }

    #[test]
    fn test_extracts_about_source_length_at_unit_tempo() {
        let frames = RATE as usize * 3;
        let mut ex = extractor(frames, DEFAULT_HISTORY_FRAMES);
        let total = drain(&mut ex, 1024);
        assert_eq!(ex.position(), total);
        assert_eq!(ex.source_position(), frames);
        // Stretch keeps back at most one input requirement at the tail
        let slack = ex.pipeline().stretch().input_chunk_size() + 1;
        assert!(total <= frames + 1, "total {total}");
        assert!(total + slack >= frames, "total {total}");
    }

    #[test]
    fn test_faster_tempo_yields_fewer_frames() {
        let frames = RATE as usize * 4;
        let mut ex = extractor(frames, DEFAULT_HISTORY_FRAMES);
        ex.pipeline_mut().set_tempo(2.0);
        let total = drain(&mut ex, 1024);
        assert!(total < frames * 6 / 10, "total {total}");
        assert!(total > frames * 4 / 10 - ex.pipeline().stretch().input_chunk_size());
    }

    #[test]
    fn test_rewind_within_history_replays_frames() {
        let mut ex = extractor(RATE as usize * 2, 4_096);
        let mut first = vec![0.0; 512 * CHANNELS];
        let mut second = vec![0.0; 512 * CHANNELS];
        ex.extract(&mut first, 512);
        ex.extract(&mut first, 512);
        assert_eq!(ex.position(), 1024);

        ex.set_position(512).unwrap();
        assert_eq!(ex.position(), 512);
        ex.extract(&mut second, 512);
        assert_eq!(first, second);
    }

    #[test]
    fn test_position_out_of_range() {
        let mut ex = extractor(RATE as usize * 2, 1_000);
        let mut target = vec![0.0; 800 * CHANNELS];
        ex.extract(&mut target, 800);
        ex.extract(&mut target, 800);
        assert_eq!(ex.position(), 1_600);

        assert!(matches!(
            ex.set_position(1_601),
            Err(Error::SeekOutOfRange { requested: 1_601, .. })
        ));
        // Only the last 1000 frames are retained
        assert!(matches!(
            ex.set_position(599),
            Err(Error::SeekOutOfRange { min: 600, max: 1_600, .. })
        ));
        assert!(ex.set_position(600).is_ok());
    }

    #[test]
    fn test_source_position_resets_buffers() {
        let mut ex = extractor(RATE as usize * 2, DEFAULT_HISTORY_FRAMES);
        let mut target = vec![0.0; 256 * CHANNELS];
        ex.extract(&mut target, 256);
        ex.set_source_position(RATE as usize);
        assert_eq!(ex.source_position(), RATE as usize);
        assert_eq!(ex.pipeline().output().frame_count(), 0);
        // Rewinding into the discarded history is no longer possible
        assert!(ex.set_position(0).is_err());
    }

    #[test]
    fn test_empty_source_ends_immediately() {
        let mut ex = extractor(0, DEFAULT_HISTORY_FRAMES);
        let mut target = vec![0.0; 64 * CHANNELS];
        assert_eq!(ex.extract(&mut target, 64), 0);
        assert_eq!(ex.extract(&mut target, 64), 0);
    }
}

//! Frame sources feeding the streaming extractor

use crate::audio::DecodedAudio;
use std::sync::Arc;

/// Finite, randomly addressable source of stereo frames
pub trait FrameSource: Send {
    /// Write up to `num_frames` interleaved stereo frames starting at source
    /// frame `position` into `target`.
    ///
    /// # Returns
    /// Frames written; less than `num_frames` only at the end of the source
    fn extract(&mut self, target: &mut [f32], num_frames: usize, position: usize) -> usize;

    /// Total frames in the source
    fn len_frames(&self) -> usize;

    /// Sample rate of the frames produced
    fn sample_rate(&self) -> u32;
}

/// Adapts a decoded buffer to [`FrameSource`]; mono is duplicated to both
/// channels
#[derive(Debug, Clone)]
pub struct DecodedSource {
    audio: Arc<DecodedAudio>,
    position: usize,
}

impl DecodedSource {
    pub fn new(audio: Arc<DecodedAudio>) -> Self {
        Self { audio, position: 0 }
    }

    /// Frame position of the last extract request
    pub fn position(&self) -> usize {
        self.position
    }

    /// Duration of the source in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.audio.duration_seconds()
    }
}

impl FrameSource for DecodedSource {
    fn extract(&mut self, target: &mut [f32], num_frames: usize, position: usize) -> usize {
        self.position = position;
        let left = self.audio.left();
        let right = self.audio.right();
        let available = left.len().saturating_sub(position);
        let count = num_frames.min(available).min(target.len() / 2);

        for (i, frame) in target.chunks_exact_mut(2).take(count).enumerate() {
            frame[0] = left[position + i];
            frame[1] = right[position + i];
        }
        count
    }

    fn len_frames(&self) -> usize {
        self.audio.frames()
    }

    fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }
}

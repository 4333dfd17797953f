//! Core audio data types
//!
//! Defines the decoded buffer handed from the decoder to the pipeline and
//! the stereo frame moved through the output path.

/// DecodedAudio holds one fully decoded synthesized unit.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Planar: one `Vec<f32>` per channel, all of equal length
/// - One or two channels; a mono buffer is read as both left and right
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Planar channel data (1 or 2 channels)
    channels: Vec<Vec<f32>>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Create a buffer from planar channel data.
    ///
    /// Channels beyond the second are dropped; channels are truncated to
    /// the shortest one so every frame is complete.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        channels.truncate(2);
        if let Some(shortest) = channels.iter().map(Vec::len).min() {
            channels.iter_mut().for_each(|c| c.truncate(shortest));
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Create a buffer from a single channel
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Number of channels stored
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// True when the buffer carries distinct left and right channels
    pub fn is_dual_channel(&self) -> bool {
        self.channels.len() > 1
    }

    /// Left channel data (empty buffer yields an empty slice)
    pub fn left(&self) -> &[f32] {
        self.channels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Right channel data; the left channel for mono buffers
    pub fn right(&self) -> &[f32] {
        self.channels.get(1).map(Vec::as_slice).unwrap_or(self.left())
    }

    /// Planar channel data
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Get duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
///
/// Used on the output path between the playback driver and the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from left and right samples
    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Apply volume scaling to both channels
    pub fn apply_volume(&mut self, volume: f32) {
        self.left *= volume;
        self.right *= volume;
    }

    /// Clamp samples to valid range [-1.0, 1.0] to prevent clipping
    pub fn clamp(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_audio_creation() {
        let audio = DecodedAudio::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5]], 24_000);
        assert_eq!(audio.frames(), 2);
        assert_eq!(audio.channel_count(), 2);
        assert!(audio.is_dual_channel());
        assert_eq!(audio.right(), &[0.4, 0.5]);
    }

    #[test]
    fn test_decoded_audio_extra_channels_dropped() {
        let audio = DecodedAudio::new(vec![vec![0.0; 4], vec![0.0; 4], vec![1.0; 4]], 44_100);
        assert_eq!(audio.channel_count(), 2);
    }

    #[test]
    fn test_mono_reads_as_both_channels() {
        let audio = DecodedAudio::mono(vec![0.25, -0.25], 16_000);
        assert!(!audio.is_dual_channel());
        assert_eq!(audio.right(), &[0.25, -0.25]);
    }

    #[test]
    fn test_duration() {
        let audio = DecodedAudio::mono(vec![0.0; 24_000], 24_000);
        assert!((audio.duration_seconds() - 1.0).abs() < 1e-9);
        assert_eq!(DecodedAudio::new(Vec::new(), 0).duration_seconds(), 0.0);
    }

    #[test]
    fn test_audio_frame_apply_volume_and_clamp() {
        let mut frame = AudioFrame::from_stereo(1.5, -0.5);
        frame.apply_volume(0.5);
        assert_eq!(frame, AudioFrame::from_stereo(0.75, -0.25));

        let mut frame = AudioFrame::from_stereo(1.5, -1.5);
        frame.clamp();
        assert_eq!(frame, AudioFrame::from_stereo(1.0, -1.0));
        assert_eq!(AudioFrame::zero(), AudioFrame::from_stereo(0.0, 0.0));
    }
}

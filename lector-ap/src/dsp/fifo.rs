//! Interleaved stereo sample FIFO
//!
//! The only data-exchange primitive between pipeline stages. Storage is a
//! contiguous `Vec<f32>` of interleaved `[L, R, L, R, ...]` samples; all
//! offsets in the public API are frame-based (one frame = two samples).
//!
//! # Invariant
//!
//! `position + frame_count <= capacity` at all times. The live region is
//! `[position, position + frame_count)`. Growth and [`SampleFifo::rewind`]
//! compact the live region down to offset 0.

/// Samples per frame (stereo)
pub const CHANNELS: usize = 2;

/// Growable stereo sample FIFO
#[derive(Debug, Clone, Default)]
pub struct SampleFifo {
    /// Backing storage, length is the capacity in samples
    vector: Vec<f32>,
    /// Read cursor in frames
    position: usize,
    /// Live frames after the read cursor
    frame_count: usize,
}

impl SampleFifo {
    /// Create an empty FIFO
    pub fn new() -> Self {
        Self::default()
    }

    /// Backing storage
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Mutable backing storage, for stages that write directly past
    /// [`SampleFifo::end_index`] and then call [`SampleFifo::put`]
    pub fn vector_mut(&mut self) -> &mut [f32] {
        &mut self.vector
    }

    /// Read cursor in frames
    pub fn position(&self) -> usize {
        self.position
    }

    /// Sample index of the first live frame
    pub fn start_index(&self) -> usize {
        self.position * CHANNELS
    }

    /// Sample index one past the last live frame
    pub fn end_index(&self) -> usize {
        (self.position + self.frame_count) * CHANNELS
    }

    /// Live frames available for reading
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Capacity in frames
    pub fn capacity(&self) -> usize {
        self.vector.len() / CHANNELS
    }

    /// Drop all live frames and compact
    pub fn clear(&mut self) {
        self.receive(self.frame_count);
        self.rewind();
    }

    /// Mark `num_frames` frames written past the live region as live.
    ///
    /// The count is clamped to the spare capacity so the invariant holds
    /// even if a stage over-reports.
    pub fn put(&mut self, num_frames: usize) {
        let spare = self.capacity() - self.position - self.frame_count;
        debug_assert!(num_frames <= spare, "put past capacity");
        self.frame_count += num_frames.min(spare);
    }

    /// Append `num_frames` frames copied from `samples`, starting at frame
    /// `frame_offset` of the source slice.
    ///
    /// Only frames actually present in `samples` are copied.
    pub fn put_samples(&mut self, samples: &[f32], frame_offset: usize, num_frames: usize) {
        let available = (samples.len() / CHANNELS).saturating_sub(frame_offset);
        let num_frames = num_frames.min(available);
        if num_frames == 0 {
            return;
        }
        self.ensure_additional_capacity(num_frames);
        let src = frame_offset * CHANNELS;
        let dest = self.end_index();
        let len = num_frames * CHANNELS;
        self.vector[dest..dest + len].copy_from_slice(&samples[src..src + len]);
        self.frame_count += num_frames;
    }

    /// Append `num_frames` live frames of `other`, starting `frame_offset`
    /// frames after its read cursor. `other` is not consumed.
    pub fn put_buffer(&mut self, other: &SampleFifo, frame_offset: usize, num_frames: usize) {
        let available = other.frame_count.saturating_sub(frame_offset);
        let num_frames = num_frames.min(available);
        let start = other.position + frame_offset;
        self.put_samples(&other.vector[..(start + num_frames) * CHANNELS], start, num_frames);
    }

    /// Consume up to `num_frames` frames; larger requests are clamped to
    /// the live count
    pub fn receive(&mut self, num_frames: usize) {
        let num_frames = num_frames.min(self.frame_count);
        self.frame_count -= num_frames;
        self.position += num_frames;
    }

    /// Copy up to `num_frames` live frames into `output` and consume them.
    ///
    /// # Returns
    /// Frames actually copied (bounded by the live count and `output`)
    pub fn receive_samples(&mut self, output: &mut [f32], num_frames: usize) -> usize {
        let copied = self.extract(output, 0, num_frames);
        self.receive(copied);
        copied
    }

    /// Copy up to `num_frames` live frames, starting `frame_offset` frames
    /// after the read cursor, into `output` without consuming them.
    ///
    /// # Returns
    /// Frames actually copied; never reads outside the live region
    pub fn extract(&self, output: &mut [f32], frame_offset: usize, num_frames: usize) -> usize {
        let available = self.frame_count.saturating_sub(frame_offset);
        let num_frames = num_frames.min(available).min(output.len() / CHANNELS);
        if num_frames == 0 {
            return 0;
        }
        let src = self.start_index() + frame_offset * CHANNELS;
        let len = num_frames * CHANNELS;
        output[..len].copy_from_slice(&self.vector[src..src + len]);
        num_frames
    }

    /// Make room for `num_frames` frames in total (live frames included).
    ///
    /// Compacts the live region to offset 0 either way.
    pub fn ensure_capacity(&mut self, num_frames: usize) {
        self.rewind();
        let min_len = num_frames * CHANNELS;
        if self.vector.len() < min_len {
            let grown = min_len.max(self.vector.len() * 2);
            self.vector.resize(grown, 0.0);
        }
    }

    /// Make room for `num_frames` frames beyond the live ones
    pub fn ensure_additional_capacity(&mut self, num_frames: usize) {
        self.ensure_capacity(self.frame_count + num_frames);
    }

    /// Shift the live region to offset 0
    pub fn rewind(&mut self) {
        if self.position > 0 {
            let start = self.start_index();
            let end = self.end_index();
            self.vector.copy_within(start..end, 0);
            self.position = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames * CHANNELS).map(|i| i as f32).collect()
    }

    #[test]
    fn test_put_and_receive() {
        let mut fifo = SampleFifo::new();
        fifo.put_samples(&ramp(10), 0, 10);
        assert_eq!(fifo.frame_count(), 10);

        let mut out = vec![0.0; 8];
        assert_eq!(fifo.receive_samples(&mut out, 4), 4);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(fifo.frame_count(), 6);
        assert_eq!(fifo.position(), 4);
    }

    #[test]
    fn test_receive_is_clamped() {
        let mut fifo = SampleFifo::new();
        fifo.put_samples(&ramp(3), 0, 3);
        fifo.receive(100);
        assert_eq!(fifo.frame_count(), 0);
        assert_eq!(fifo.position(), 3);
    }

    #[test]
    fn test_put_samples_with_offset_and_short_source() {
        let mut fifo = SampleFifo::new();
        fifo.put_samples(&ramp(4), 2, 10);
        assert_eq!(fifo.frame_count(), 2);

        let mut out = vec![0.0; 4];
        fifo.extract(&mut out, 0, 2);
        assert_eq!(out, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_extract_stays_in_live_region() {
        let mut fifo = SampleFifo::new();
        fifo.put_samples(&ramp(6), 0, 6);
        fifo.receive(2);

        let mut out = vec![-1.0; 12];
        let copied = fifo.extract(&mut out, 1, 10);
        assert_eq!(copied, 3);
        assert_eq!(&out[..6], &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert!(out[6..].iter().all(|&s| s == -1.0));
        assert_eq!(fifo.frame_count(), 4);
    }

    #[test]
    fn test_put_buffer_copies_from_read_cursor() {
        let mut a = SampleFifo::new();
        a.put_samples(&ramp(5), 0, 5);
        a.receive(1);

        let mut b = SampleFifo::new();
        b.put_buffer(&a, 1, 2);
        let mut out = vec![0.0; 4];
        b.extract(&mut out, 0, 2);
        assert_eq!(out, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(a.frame_count(), 4);
    }

    #[test]
    fn test_growth_compacts() {
        let mut fifo = SampleFifo::new();
        fifo.put_samples(&ramp(4), 0, 4);
        fifo.receive(3);
        fifo.ensure_additional_capacity(100);
        assert_eq!(fifo.position(), 0);
        assert_eq!(fifo.frame_count(), 1);
        assert_eq!(&fifo.vector()[..2], &[6.0, 7.0]);
        assert!(fifo.capacity() >= 101);
    }

    #[test]
    fn test_direct_write_then_put() {
        let mut fifo = SampleFifo::new();
        fifo.ensure_additional_capacity(2);
        let end = fifo.end_index();
        fifo.vector_mut()[end..end + 4].copy_from_slice(&[0.5, -0.5, 0.25, -0.25]);
        fifo.put(2);
        assert_eq!(fifo.frame_count(), 2);
    }

    #[test]
    fn test_invariant_over_mixed_operations() {
        let mut fifo = SampleFifo::new();
        let mut expected_count = 0usize;
        for step in 0..200usize {
            let n = (step * 7) % 13;
            if step % 3 == 0 {
                fifo.receive(n);
                expected_count = expected_count.saturating_sub(n);
            } else {
                fifo.put_samples(&ramp(n), 0, n);
                expected_count += n;
            }
            assert_eq!(fifo.frame_count(), expected_count);
            assert!(fifo.position() + fifo.frame_count() <= fifo.capacity());
        }
        fifo.clear();
        assert_eq!(fifo.frame_count(), 0);
        assert_eq!(fifo.position(), 0);
    }
}

//! Real-time tempo and pitch transformation
//!
//! Stages exchange audio exclusively through [`SampleFifo`]s. A stage
//! implements [`SamplePipe`]: it drains what it can from its input FIFO and
//! appends results to its output FIFO. The pipeline owns the FIFOs and
//! decides which stage reads which.

pub mod extractor;
pub mod fifo;
pub mod pipeline;
pub mod source;
pub mod stretch;
pub mod transposer;

pub use extractor::{StreamingExtractor, DEFAULT_HISTORY_FRAMES, INPUT_CHUNK_FRAMES};
pub use fifo::SampleFifo;
pub use pipeline::{StageOrder, TempoPitchPipeline};
pub use source::{DecodedSource, FrameSource};
pub use stretch::{SeekMode, Stretch};
pub use transposer::RateTransposer;

/// A processing stage between two FIFOs
pub trait SamplePipe {
    /// Consume buffered input and append the produced frames to `output`
    fn process(&mut self, input: &mut SampleFifo, output: &mut SampleFifo);

    /// Forget per-stream state so the next frame starts a new stream
    fn clear(&mut self);
}

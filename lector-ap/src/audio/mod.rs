//! Audio decoding, resampling and device output
//!
//! Everything between encoded TTS bytes and the speaker, except the
//! tempo/pitch pipeline itself (see [`crate::dsp`]).

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::SimpleDecoder;
pub use output::{CpalOutput, DeviceFactory, OutputBus, OutputDevice, RenderNode, Route};
pub use resampler::Resampler;
pub use types::{AudioFrame, DecodedAudio};

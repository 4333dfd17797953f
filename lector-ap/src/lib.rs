//! # Lector Audio Player Library (lector-ap)
//!
//! Reads text aloud: synthesized units are fetched ahead of playback, decoded,
//! run through a real-time tempo/pitch pipeline and played on the default
//! output device while the spoken range is highlighted.
//!
//! **Architecture:** symphonia decode, rubato resample, WSOLA tempo/pitch
//! pipeline, cpal output; a tokio-driven scheduler with a fetch worker and a
//! play worker.

pub mod audio;
pub mod dsp;
pub mod error;
pub mod playback;
pub mod reader;
pub mod tts;

pub use error::{Error, InterruptReason, Result};

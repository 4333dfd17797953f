//! Text-to-speech engines

pub mod google;

pub use google::{GoogleTranslateTts, GoogleTtsSettings};

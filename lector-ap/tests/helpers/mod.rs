//! Test helper modules for lector-ap integration tests
//!
//! - audio_generator: WAV bytes for the real decode path
//! - mocks: scripted collaborators for the reader and a manually pumped
//!   output device for the playback controller

#![allow(dead_code)]

pub mod audio_generator;
pub mod mocks;

use std::time::Duration;

pub use audio_generator::{frame_count, sine_wav_bytes, TEST_SAMPLE_RATE};
pub use mocks::{
    unit, CountingObserver, MockPlayer, MockTts, PumpedOutput, RecordingHighlighter, VecSource,
};

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

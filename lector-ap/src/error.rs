//! Error types for lector-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! `Interrupted` is control flow rather than a failure: it tells the awaiting
//! side of a `play()` call why playback ended early.

use std::fmt;
use thiserror::Error;

/// Why an outstanding playback was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// User moved to another unit; the reader re-evaluates its cursor
    Skip,
    /// Unconditional stop (user stop, restart of speaking)
    Stop,
    /// A new `play()` replaced the outstanding one
    Replaced,
}

impl fmt::Display for InterruptReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptReason::Skip => write!(f, "skip"),
            InterruptReason::Stop => write!(f, "stop"),
            InterruptReason::Replaced => write!(f, "replaced"),
        }
    }
}

/// Main error type for lector-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or undecodable audio
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Playback was cancelled by `stop()`/`skip()` or replaced
    #[error("Playback interrupted: {reason}")]
    Interrupted {
        /// Cause of the interruption
        reason: InterruptReason,
    },

    /// Network or TTS service failure
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Position moved outside the retained output history
    #[error("Seek out of range: requested {requested}, allowed {min}..={max}")]
    SeekOutOfRange {
        /// Requested logical position
        requested: u64,
        /// Oldest position still retained
        min: u64,
        /// Current position
        max: u64,
    },

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Sample rate conversion errors
    #[error("Resample error: {0}")]
    Resample(String),

    /// Errors from the shared library (config, text splitting)
    #[error(transparent)]
    Common(#[from] lector_common::Error),
}

impl Error {
    /// True for an interruption caused by a skip
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Error::Interrupted {
                reason: InterruptReason::Skip
            }
        )
    }

    /// True for any interruption (skip, stop or replacement)
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted { .. })
    }
}

/// Convenience Result type using lector-ap Error
pub type Result<T> = std::result::Result<T, Error>;

//! # Lector Common Library
//!
//! Shared, device-independent code for the lector read-aloud player:
//! - Error type
//! - Bootstrap configuration (TOML file with built-in defaults)
//! - Text cleanup rules applied before synthesis
//! - Plain-text sentence segmentation
//! - Splitting of long text into TTS-sized requests

pub mod config;
pub mod error;
pub mod text;

pub use config::ReaderConfig;
pub use error::{Error, Result};

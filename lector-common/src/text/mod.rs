//! Text handling ahead of synthesis
//!
//! - [`cleanup`]: rules that strip citations/URLs and reject word-poor units
//! - [`sentences`]: segmentation of plain text into sentence-like units
//! - [`split`]: splitting of long units into TTS-request-sized pieces

pub mod cleanup;
pub mod sentences;
pub mod split;

pub use cleanup::CleanupRules;
pub use sentences::{split_sentence, ElementId, SourceUnit, TextDocument, TextSource};
pub use split::{split_point, split_request};

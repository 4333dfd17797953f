//! Collaborators the reading scheduler is built from
//!
//! All of them are supplied by the caller at construction; the scheduler
//! never looks anything up on its own.

use crate::error::{InterruptReason, Result};
use crate::playback::AudioPlayback;
use async_trait::async_trait;
use lector_common::text::{ElementId, TextDocument};
use std::sync::Arc;
use tracing::debug;

/// Text-to-speech service
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Synthesize already cleaned text into encoded audio bytes.
    ///
    /// Implementations split long text into service-sized requests and
    /// fail with `TextTooLong` when no split point exists.
    async fn fetch_audio(&self, text: &str) -> Result<Vec<u8>>;
}

/// Visual feedback for the unit being read.
///
/// Best effort: errors are logged by the scheduler and never stop playback.
pub trait Highlighter: Send + Sync {
    /// Mark `start..end` (byte offsets) inside `elements`
    fn highlight(&self, elements: &[ElementId], start: usize, end: usize) -> Result<()>;

    /// Remove any mark from `elements`
    fn unhighlight(&self, elements: &[ElementId]) -> Result<()>;
}

/// Start/end notifications for a reading run
pub trait ReaderObserver: Send + Sync {
    /// The play worker started playing after being idle
    fn on_playback_start(&self) {}

    /// The play worker ran out of ready units and went idle
    fn on_playback_end(&self) {}
}

/// Single-stream cancellable player driven by the play worker
#[async_trait]
pub trait Player: Send + Sync {
    /// Play one encoded unit; resolves at end of stream.
    ///
    /// Fails with `Interrupted { reason }` when `stop(reason)` intervenes.
    async fn play(&self, audio: Vec<u8>) -> Result<()>;

    /// Interrupt the outstanding `play()`, if any
    fn stop(&self, reason: InterruptReason);

    /// True while audio is connected to the device
    fn is_playing(&self) -> bool;
}

#[async_trait]
impl Player for AudioPlayback {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        AudioPlayback::play(self, audio).await
    }

    fn stop(&self, reason: InterruptReason) {
        AudioPlayback::stop(self, reason)
    }

    fn is_playing(&self) -> bool {
        AudioPlayback::is_playing(self)
    }
}

/// Highlighter for terminals: prints the range being read
#[derive(Debug)]
pub struct ConsoleHighlighter {
    document: Arc<TextDocument>,
}

impl ConsoleHighlighter {
    pub fn new(document: Arc<TextDocument>) -> Self {
        Self { document }
    }
}

impl Highlighter for ConsoleHighlighter {
    fn highlight(&self, elements: &[ElementId], start: usize, end: usize) -> Result<()> {
        for id in elements {
            let text = self
                .document
                .element_text(*id)
                .and_then(|text| text.get(start..end))
                .ok_or_else(|| {
                    lector_common::Error::InvalidInput(format!(
                        "No text at element {} range {}..{}",
                        id.0, start, end
                    ))
                })?;
            println!("> {}", text.trim());
        }
        Ok(())
    }

    fn unhighlight(&self, elements: &[ElementId]) -> Result<()> {
        debug!(count = elements.len(), "Unhighlight");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_highlighter_range() {
        let document = Arc::new(TextDocument::from_text("Hello there. General Kenobi."));
        let highlighter = ConsoleHighlighter::new(document);
        assert!(highlighter.highlight(&[ElementId(0)], 0, 12).is_ok());
        assert!(highlighter.highlight(&[ElementId(0)], 0, 500).is_err());
        assert!(highlighter.highlight(&[ElementId(7)], 0, 1).is_err());
        assert!(highlighter.unhighlight(&[ElementId(0)]).is_ok());
    }
}

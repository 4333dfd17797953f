//! Playback progress events
//!
//! Emitted by the playback driver from the audio callback and consumed by
//! whoever holds the receiving end (the CLI prints progress at debug level).
//! Sending is non-blocking; a dropped receiver is ignored.

/// Progress of the unit currently playing
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Position update, sent after a device callback moved the source
    /// position
    ///
    /// # Fields
    /// * `source_frame` - Frames consumed from the decoded unit
    /// * `seconds_played` - `source_frame / sample_rate`
    /// * `percentage_played` - Share of the unit consumed, 0-100
    Position {
        source_frame: usize,
        seconds_played: f64,
        percentage_played: f64,
    },

    /// The unit's audio ran out; the pending `play()` resolves next
    Finished,
}

impl PlaybackEvent {
    /// Position formatted as `m:ss`
    pub fn formatted_time(&self) -> Option<String> {
        match self {
            PlaybackEvent::Position { seconds_played, .. } => Some(format_mins_secs(*seconds_played)),
            PlaybackEvent::Finished => None,
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_mins_secs(seconds: f64) -> String {
    let total = seconds.max(0.0);
    let mins = (total / 60.0).floor();
    let secs = (total - mins * 60.0).floor() as u32;
    format!("{}:{:02}", mins as u64, secs)
}

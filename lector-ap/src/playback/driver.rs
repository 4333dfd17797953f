//! Playback driver: the render node between extractor and output device
//!
//! Every device callback pulls transformed frames from the streaming
//! extractor in fixed-size blocks, reports the source position, and signals
//! completion once the extractor runs dry.

use crate::audio::{AudioFrame, DecodedAudio, RenderNode};
use crate::dsp::{DecodedSource, StreamingExtractor, TempoPitchPipeline};
use crate::playback::events::PlaybackEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Frames pulled from the extractor per step
pub const DRIVER_BLOCK_FRAMES: usize = 1024;

/// Render node feeding one decoded unit through the tempo/pitch pipeline
pub struct PlaybackDriver {
    extractor: StreamingExtractor<DecodedSource>,
    /// Interleaved scratch block
    block: Vec<f32>,
    sample_rate: u32,
    duration_seconds: f64,
    last_reported: Option<usize>,
    events: Option<mpsc::UnboundedSender<PlaybackEvent>>,
    on_end: Option<oneshot::Sender<()>>,
    finished: bool,
}

impl PlaybackDriver {
    /// Build a driver over `audio` with the given tempo and pitch ratio.
    ///
    /// `on_end` fires once, from the render path, when the stream is
    /// exhausted.
    pub fn new(audio: Arc<DecodedAudio>, tempo: f32, pitch: f32, on_end: oneshot::Sender<()>) -> Self {
        let sample_rate = audio.sample_rate;
        let duration_seconds = audio.duration_seconds();
        let mut pipeline = TempoPitchPipeline::new(sample_rate);
        pipeline.set_tempo(tempo);
        pipeline.set_pitch(pitch);

        Self {
            extractor: StreamingExtractor::new(DecodedSource::new(audio), pipeline),
            block: vec![0.0; DRIVER_BLOCK_FRAMES * 2],
            sample_rate,
            duration_seconds,
            last_reported: None,
            events: None,
            on_end: Some(on_end),
            finished: false,
        }
    }

    /// Report progress on `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Frames consumed from the decoded unit
    pub fn source_position(&self) -> usize {
        self.extractor.source_position()
    }

    /// Seconds of source audio consumed
    pub fn seconds_played(&self) -> f64 {
        self.extractor.source_position() as f64 / self.sample_rate.max(1) as f64
    }

    /// Duration of the decoded unit in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Share of the unit consumed, 0-100
    pub fn percentage_played(&self) -> f64 {
        let total = self.duration_seconds * self.sample_rate as f64;
        if total <= 0.0 {
            return 0.0;
        }
        100.0 * self.extractor.source_position() as f64 / total
    }

    /// Jump to a share of the unit (0-100); buffered audio is dropped
    pub fn set_percentage_played(&mut self, percentage: f64) {
        let total = self.duration_seconds * self.sample_rate as f64;
        let frame = (percentage.clamp(0.0, 100.0) / 100.0 * total) as usize;
        self.extractor.set_source_position(frame);
    }

    /// True once the extractor reported end of stream
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn report_position(&mut self) {
        let source_frame = self.extractor.source_position();
        if self.last_reported == Some(source_frame) {
            return;
        }
        self.last_reported = Some(source_frame);
        if let Some(events) = &self.events {
            let _ = events.send(PlaybackEvent::Position {
                source_frame,
                seconds_played: self.seconds_played(),
                percentage_played: self.percentage_played(),
            });
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        debug!(source_frame = self.extractor.source_position(), "Playback stream ended");
        if let Some(events) = &self.events {
            let _ = events.send(PlaybackEvent::Finished);
        }
        if let Some(on_end) = self.on_end.take() {
            let _ = on_end.send(());
        }
    }
}

impl RenderNode for PlaybackDriver {
    fn render(&mut self, frames: &mut [AudioFrame]) -> usize {
        if self.finished {
            return 0;
        }

        let mut written = 0;
        while written < frames.len() {
            let wanted = (frames.len() - written).min(DRIVER_BLOCK_FRAMES);
            let extracted = self.extractor.extract(&mut self.block, wanted);
            for (frame, pair) in frames[written..written + extracted]
                .iter_mut()
                .zip(self.block.chunks_exact(2))
            {
                *frame = AudioFrame::from_stereo(pair[0], pair[1]);
            }
            written += extracted;
            if extracted < wanted {
                break;
            }
        }

        self.report_position();
        if written == 0 {
            self.finish();
        }
        written
    }
}

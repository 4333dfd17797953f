//! Playback controller
//!
//! Owns the output device and plays one encoded unit at a time:
//!
//! 1. stop whatever is playing (its `play()` fails with `Replaced`)
//! 2. create the output device on first use
//! 3. drop the lead-out cutoff from the end of the encoded bytes
//! 4. decode and resample on the blocking pool
//! 5. build a fresh pipeline, apply tempo/pitch/gain, connect
//! 6. resolve when the driver reports end of stream
//!
//! `stop(reason)` can land during any await point of `play()`; the pending
//! future then fails with [`Error::Interrupted`] carrying that reason.
//!
//! # Lead-out cutoff
//!
//! The cutoff is applied to the *encoded* bytes using a fixed byte rate
//! ([`CUTOFF_BYTES_PER_SECOND`], roughly a 32 kbit/s MP3). It is an
//! approximation of a duration trim, not an exact one. At least one byte
//! is always removed.

use crate::audio::{DecodedAudio, DeviceFactory, OutputDevice, Resampler, Route, SimpleDecoder};
use crate::error::{Error, InterruptReason, Result};
use crate::playback::driver::PlaybackDriver;
use crate::playback::events::PlaybackEvent;
use lector_common::ReaderConfig;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Encoded bytes assumed per second of audio for the lead-out cutoff
pub const CUTOFF_BYTES_PER_SECOND: f32 = 4200.0;

/// Volumes above this connect straight to the device
pub const GAIN_BYPASS_THRESHOLD: f32 = 0.95;

/// Parameters applied to every new playback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Duration scale (1.0 = unchanged)
    pub tempo: f32,
    /// Pitch ratio (1.0 = unchanged)
    pub pitch: f32,
    /// Linear gain 0.0 - 1.0
    pub volume: f32,
    /// Approximate trailing seconds removed from each unit
    pub cutoff_seconds: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tempo: 1.0,
            pitch: 1.0,
            volume: 1.0,
            cutoff_seconds: 0.0,
        }
    }
}

impl From<&ReaderConfig> for PlaybackSettings {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            tempo: config.tempo,
            pitch: config.pitch_ratio(),
            volume: config.volume,
            cutoff_seconds: config.cutoff_seconds(),
        }
    }
}

impl PlaybackSettings {
    /// Encoded bytes dropped from the end of each unit
    pub fn cutoff_bytes(&self) -> usize {
        ((self.cutoff_seconds.max(0.0) * CUTOFF_BYTES_PER_SECOND).floor() as usize).max(1)
    }
}

#[derive(Default)]
struct PlaybackState {
    /// Bumped by every `play()` and `stop()`; stale work checks it
    generation: u64,
    /// Fails the outstanding `play()`
    cancel: Option<oneshot::Sender<InterruptReason>>,
    /// A driver is attached to the device bus
    connected: bool,
}

/// Cancellable single-stream player
pub struct AudioPlayback {
    device_factory: DeviceFactory,
    device: Mutex<Option<Arc<dyn OutputDevice>>>,
    state: Mutex<PlaybackState>,
    settings: Mutex<PlaybackSettings>,
    events: Option<mpsc::UnboundedSender<PlaybackEvent>>,
}

impl AudioPlayback {
    /// Create a controller; the device is opened by `device_factory` on the
    /// first `play()`
    pub fn new(device_factory: DeviceFactory, settings: PlaybackSettings) -> Self {
        Self {
            device_factory,
            device: Mutex::new(None),
            state: Mutex::new(PlaybackState::default()),
            settings: Mutex::new(settings),
            events: None,
        }
    }

    /// Forward driver progress events to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current settings
    pub fn settings(&self) -> PlaybackSettings {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_settings(&self, update: impl FnOnce(&mut PlaybackSettings)) {
        let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut settings);
    }

    /// Tempo for subsequent playbacks
    pub fn set_tempo(&self, tempo: f32) {
        self.update_settings(|s| s.tempo = tempo);
    }

    /// Pitch ratio for subsequent playbacks
    pub fn set_pitch(&self, pitch: f32) {
        self.update_settings(|s| s.pitch = pitch);
    }

    /// Volume for subsequent playbacks
    pub fn set_volume(&self, volume: f32) {
        self.update_settings(|s| s.volume = volume.clamp(0.0, 1.0));
    }

    /// Lead-out cutoff for subsequent playbacks
    pub fn set_cutoff(&self, seconds: f32) {
        self.update_settings(|s| s.cutoff_seconds = seconds.max(0.0));
    }

    /// True while a pipeline is connected to the device
    pub fn is_playing(&self) -> bool {
        self.state().connected
    }

    fn ensure_device(&self) -> Result<Arc<dyn OutputDevice>> {
        let mut device = self.device.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(device) = device.as_ref() {
            return Ok(Arc::clone(device));
        }
        let created = (self.device_factory)()?;
        info!("Output device ready at {}Hz", created.sample_rate());
        *device = Some(Arc::clone(&created));
        Ok(created)
    }

    fn current_device(&self) -> Option<Arc<dyn OutputDevice>> {
        self.device
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }

    /// Interrupt the current playback, if any.
    ///
    /// The outstanding `play()` fails with `Interrupted { reason }` and the
    /// driver is disconnected before this returns.
    pub fn stop(&self, reason: InterruptReason) {
        let mut state = self.state();
        state.generation += 1;
        if let Some(cancel) = state.cancel.take() {
            debug!(%reason, "Interrupting playback");
            let _ = cancel.send(reason);
        }
        if state.connected {
            state.connected = false;
            if let Some(device) = self.current_device() {
                device.bus().disconnect();
            }
        }
    }

    /// Detach the driver of `generation` after it finished on its own
    fn release(&self, generation: u64) {
        let mut state = self.state();
        if state.generation != generation {
            return;
        }
        state.cancel = None;
        if state.connected {
            state.connected = false;
            if let Some(device) = self.current_device() {
                device.bus().disconnect();
            }
        }
    }

    /// Play one encoded unit.
    ///
    /// # Returns
    /// `Ok(())` once the whole (cut) unit has been rendered
    ///
    /// # Errors
    /// - [`Error::Interrupted`] when `stop()` or another `play()` intervened
    /// - [`Error::Decode`] / [`Error::Resample`] for unusable audio
    /// - [`Error::AudioOutput`] when no device could be opened
    pub async fn play(&self, mut audio: Vec<u8>) -> Result<()> {
        self.stop(InterruptReason::Replaced);
        let device = self.ensure_device()?;
        let settings = self.settings();

        let cut = settings.cutoff_bytes();
        audio.truncate(audio.len().saturating_sub(cut));

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.cancel = Some(cancel_tx);
            state.generation
        };

        let target_rate = device.sample_rate();
        let decode = tokio::task::spawn_blocking(move || -> Result<DecodedAudio> {
            let decoded = SimpleDecoder::decode_bytes(audio, None)?;
            Resampler::resample(decoded, target_rate)
        });

        let decoded = tokio::select! {
            biased;
            reason = &mut cancel_rx => return Err(interrupted(reason)),
            joined = decode => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Decode(format!("Decode task failed: {}", e))),
            },
        };
        let decoded = match decoded {
            Ok(decoded) => Arc::new(decoded),
            Err(e) => {
                self.forget_pending(generation);
                warn!("Failed to decode unit: {}", e);
                return Err(e);
            }
        };

        let (done_tx, done_rx) = oneshot::channel();
        let mut driver = PlaybackDriver::new(decoded, settings.tempo, settings.pitch, done_tx);
        if let Some(events) = &self.events {
            driver = driver.with_events(events.clone());
        }

        {
            let mut state = self.state();
            if state.generation != generation {
                drop(state);
                return Err(interrupted(cancel_rx.try_recv().map_err(|_| ())));
            }
            let bus = device.bus();
            bus.set_gain(settings.volume);
            let route = if settings.volume > GAIN_BYPASS_THRESHOLD {
                Route::Direct
            } else {
                Route::ThroughGain
            };
            bus.connect(Box::new(driver), route);
            state.connected = true;
        }
        debug!(generation, "Playback connected");

        tokio::select! {
            biased;
            reason = &mut cancel_rx => Err(interrupted(reason)),
            done = done_rx => match done {
                Ok(()) => {
                    self.release(generation);
                    Ok(())
                }
                // Driver dropped without finishing: someone disconnected it
                Err(_) => Err(interrupted(cancel_rx.try_recv().map_err(|_| ()))),
            },
        }
    }

    fn forget_pending(&self, generation: u64) {
        let mut state = self.state();
        if state.generation == generation {
            state.cancel = None;
        }
    }
}

fn interrupted<E>(reason: std::result::Result<InterruptReason, E>) -> Error {
    Error::Interrupted {
        reason: reason.unwrap_or(InterruptReason::Stop),
    }
}

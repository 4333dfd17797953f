//! Audio output using cpal
//!
//! The output side is split in two:
//!
//! - [`OutputBus`]: the connection point a playback node is attached to.
//!   It owns the single connection slot and the shared gain stage, and
//!   renders frames on demand. It knows nothing about devices.
//! - [`OutputDevice`] implementations that pull from the bus. [`CpalOutput`]
//!   drives it from a cpal stream living on a dedicated thread
//!   (`cpal::Stream` is not `Send`).
//!
//! At most one node is connected at a time. Connecting replaces whatever
//! was attached; disconnecting drops the node immediately, so the next
//! device callback already renders silence.

use crate::audio::AudioFrame;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Something the bus can pull frames from (the playback driver)
pub trait RenderNode: Send {
    /// Fill `frames` with the next output frames.
    ///
    /// # Returns
    /// Frames actually produced; the rest of `frames` is left silent
    fn render(&mut self, frames: &mut [AudioFrame]) -> usize;
}

/// How a connected node reaches the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the device, gain stage bypassed
    Direct,
    /// Through the shared gain stage
    ThroughGain,
}

struct Connection {
    node: Box<dyn RenderNode>,
    route: Route,
}

/// Connection slot plus gain stage shared between the controller and the
/// device callback.
pub struct OutputBus {
    connection: Mutex<Option<Connection>>,
    gain: Mutex<f32>,
}

impl Default for OutputBus {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBus {
    pub fn new() -> Self {
        Self {
            connection: Mutex::new(None),
            gain: Mutex::new(1.0),
        }
    }

    /// Attach `node`, replacing any previous connection
    pub fn connect(&self, node: Box<dyn RenderNode>, route: Route) {
        let mut slot = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            debug!("Replacing connected output node");
        }
        *slot = Some(Connection { node, route });
    }

    /// Detach and drop the connected node, if any.
    ///
    /// Blocks at most for one in-flight render call.
    pub fn disconnect(&self) -> bool {
        let mut slot = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        slot.take().is_some()
    }

    /// True while a node is attached
    pub fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Set the gain stage value (linear)
    pub fn set_gain(&self, gain: f32) {
        let mut current = self.gain.lock().unwrap_or_else(|e| e.into_inner());
        *current = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain.lock().map(|g| *g).unwrap_or(1.0)
    }

    /// Render the next block from the connected node.
    ///
    /// Produces silence when nothing is connected or when the controller is
    /// mid-way through swapping connections; never blocks.
    ///
    /// # Returns
    /// Frames produced by the node
    pub fn render(&self, frames: &mut [AudioFrame]) -> usize {
        frames.fill(AudioFrame::zero());
        let Ok(mut slot) = self.connection.try_lock() else {
            return 0;
        };
        let Some(connection) = slot.as_mut() else {
            return 0;
        };

        let produced = connection.node.render(frames);
        if connection.route == Route::ThroughGain {
            let gain = self.gain();
            frames.iter_mut().for_each(|f| f.apply_volume(gain));
        }
        produced
    }
}

/// An audio destination fed from an [`OutputBus`]
pub trait OutputDevice: Send + Sync {
    /// Device frame rate; decoded audio is resampled to it
    fn sample_rate(&self) -> u32;

    /// Bus the device pulls from
    fn bus(&self) -> &Arc<OutputBus>;
}

/// Factory for the lazily created output device
pub type DeviceFactory = Box<dyn Fn() -> Result<Arc<dyn OutputDevice>> + Send + Sync>;

/// cpal-backed output device.
///
/// The stream is built and kept alive on a dedicated thread; dropping the
/// `CpalOutput` stops it.
pub struct CpalOutput {
    bus: Arc<OutputBus>,
    sample_rate: u32,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open an output device.
    ///
    /// # Arguments
    /// * `device_name` - Optional device name (None = default device);
    ///   falls back to the default device when the name is not found
    ///
    /// # Errors
    /// [`Error::AudioOutput`] when no usable device or stream is available
    pub fn open(device_name: Option<String>) -> Result<Self> {
        let bus = Arc::new(OutputBus::new());
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let thread_bus = Arc::clone(&bus);

        let thread = std::thread::Builder::new()
            .name("lector-audio".to_string())
            .spawn(move || {
                let stream = match Self::start_stream(device_name, thread_bus) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Keep the stream alive until the owner goes away
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Audio stream closed");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        Ok(Self {
            bus,
            sample_rate,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Factory usable by the playback controller for lazy device creation
    pub fn factory(device_name: Option<String>) -> DeviceFactory {
        Box::new(move || {
            let output = CpalOutput::open(device_name.clone())?;
            Ok(Arc::new(output) as Arc<dyn OutputDevice>)
        })
    }

    fn select_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();
        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;
            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(device)
    }

    fn start_stream(device_name: Option<String>, bus: Arc<OutputBus>) -> Result<(Stream, u32)> {
        let device = Self::select_device(device_name.as_deref())?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, bus)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, bus)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, bus)?,
            other => {
                return Err(Error::AudioOutput(format!("Unsupported sample format: {:?}", other)));
            }
        };
        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!("Audio stream started at {}Hz", config.sample_rate.0);
        Ok((stream, config.sample_rate.0))
    }

    fn build_stream<T>(device: &Device, config: &StreamConfig, bus: Arc<OutputBus>) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut frames: Vec<AudioFrame> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frame_count = data.len() / channels.max(1);
                    if frames.len() < frame_count {
                        frames.resize(frame_count, AudioFrame::zero());
                    }
                    let block = &mut frames[..frame_count];
                    bus.render(block);

                    for (out, frame) in data.chunks_mut(channels).zip(block.iter_mut()) {
                        frame.clamp();
                        out[0] = T::from_sample(frame.left);
                        if channels > 1 {
                            out[1] = T::from_sample(frame.right);
                        }
                        for extra in out.iter_mut().skip(2) {
                            *extra = T::from_sample(0.0f32);
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl OutputDevice for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bus(&self) -> &Arc<OutputBus> {
        &self.bus
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.bus.disconnect();
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

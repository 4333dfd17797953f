//! Scripted collaborators
//!
//! The reader tests drive [`TtsReader`](lector_ap::reader::TtsReader) with
//! a fake engine, source, highlighter and player. The controller tests use
//! [`PumpedOutput`], an output device whose bus is rendered by a plain thread
//! faster than real time.

use async_trait::async_trait;
use lector_ap::audio::{AudioFrame, DeviceFactory, OutputBus, OutputDevice};
use lector_ap::reader::{Highlighter, Player, ReaderObserver, TtsEngine};
use lector_ap::{Error, InterruptReason, Result};
use lector_common::text::{ElementId, SourceUnit, TextSource};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};

/// Unit `index` of a test document: one element per unit
pub fn unit(index: usize, sentence: &str) -> SourceUnit {
    SourceUnit {
        sentence: sentence.to_string(),
        elements: vec![ElementId(index)],
        start: 0,
        end: sentence.len(),
    }
}

/// Fixed list of units
pub struct VecSource {
    units: Vec<SourceUnit>,
}

impl VecSource {
    pub fn new(sentences: &[&str]) -> Self {
        Self {
            units: sentences.iter().enumerate().map(|(i, s)| unit(i, s)).collect(),
        }
    }
}

impl TextSource for VecSource {
    fn units(&self) -> Box<dyn Iterator<Item = SourceUnit> + Send> {
        Box::new(self.units.clone().into_iter())
    }
}

/// Engine returning the text itself as "audio"
///
/// Texts containing `FAIL` fail with a fetch error.
pub struct MockTts {
    requests: Mutex<Vec<String>>,
    delay: Duration,
}

impl MockTts {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TtsEngine for MockTts {
    async fn fetch_audio(&self, text: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if text.contains("FAIL") {
            return Err(Error::Fetch(format!("scripted failure for '{}'", text)));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Highlight calls in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    On(usize),
    Off(usize),
}

pub struct RecordingHighlighter {
    marks: Mutex<Vec<Mark>>,
    failing: bool,
}

impl RecordingHighlighter {
    pub fn new() -> Self {
        Self {
            marks: Mutex::new(Vec::new()),
            failing: false,
        }
    }

    /// Records like `new()` but reports every call as failed
    pub fn failing() -> Self {
        Self {
            marks: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn marks(&self) -> Vec<Mark> {
        self.marks.lock().unwrap().clone()
    }

    fn record(&self, mark: Mark) -> Result<()> {
        self.marks.lock().unwrap().push(mark);
        if self.failing {
            return Err(Error::Fetch("highlight target is gone".to_string()));
        }
        Ok(())
    }
}

impl Highlighter for RecordingHighlighter {
    fn highlight(&self, elements: &[ElementId], _start: usize, _end: usize) -> Result<()> {
        self.record(Mark::On(elements[0].0))
    }

    fn unhighlight(&self, elements: &[ElementId]) -> Result<()> {
        self.record(Mark::Off(elements[0].0))
    }
}

#[derive(Default)]
pub struct CountingObserver {
    pub starts: AtomicUsize,
    pub ends: AtomicUsize,
}

impl CountingObserver {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }
}

impl ReaderObserver for CountingObserver {
    fn on_playback_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_playback_end(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct PlayerLog {
    cancel: Option<oneshot::Sender<InterruptReason>>,
    started: Vec<String>,
    completed: Vec<String>,
    interrupts: Vec<InterruptReason>,
}

/// Player that "plays" the text bytes produced by [`MockTts`]
///
/// In manual mode a unit finishes only when the test calls
/// [`MockPlayer::finish_one`]; otherwise after a fixed duration.
pub struct MockPlayer {
    log: Mutex<PlayerLog>,
    manual: bool,
    duration: Duration,
    release: Semaphore,
}

impl MockPlayer {
    pub fn manual() -> Self {
        Self {
            log: Mutex::new(PlayerLog::default()),
            manual: true,
            duration: Duration::ZERO,
            release: Semaphore::new(0),
        }
    }

    pub fn timed(duration: Duration) -> Self {
        Self {
            log: Mutex::new(PlayerLog::default()),
            manual: false,
            duration,
            release: Semaphore::new(0),
        }
    }

    /// Let the unit currently playing (or the next one) finish
    pub fn finish_one(&self) {
        self.release.add_permits(1);
    }

    pub fn started(&self) -> Vec<String> {
        self.log.lock().unwrap().started.clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.log.lock().unwrap().completed.clone()
    }

    pub fn interrupts(&self) -> Vec<InterruptReason> {
        self.log.lock().unwrap().interrupts.clone()
    }
}

#[async_trait]
impl Player for MockPlayer {
    async fn play(&self, audio: Vec<u8>) -> Result<()> {
        let text = String::from_utf8_lossy(&audio).into_owned();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut log = self.log.lock().unwrap();
            if let Some(previous) = log.cancel.take() {
                let _ = previous.send(InterruptReason::Replaced);
            }
            log.cancel = Some(cancel_tx);
            log.started.push(text.clone());
        }

        let finished = async {
            if self.manual {
                if let Ok(permit) = self.release.acquire().await {
                    permit.forget();
                }
            } else {
                tokio::time::sleep(self.duration).await;
            }
        };

        let result = tokio::select! {
            biased;
            reason = cancel_rx => Err(Error::Interrupted {
                reason: reason.unwrap_or(InterruptReason::Stop),
            }),
            _ = finished => Ok(()),
        };

        if result.is_ok() {
            let mut log = self.log.lock().unwrap();
            log.cancel = None;
            log.completed.push(text);
        }
        result
    }

    fn stop(&self, reason: InterruptReason) {
        let mut log = self.log.lock().unwrap();
        if let Some(cancel) = log.cancel.take() {
            let _ = cancel.send(reason);
            log.interrupts.push(reason);
        }
    }

    fn is_playing(&self) -> bool {
        self.log.lock().unwrap().cancel.is_some()
    }
}

/// Output device rendered by a background thread, ~20x faster than real time
pub struct PumpedOutput {
    bus: Arc<OutputBus>,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    rendered: Arc<AtomicUsize>,
    peak_bits: Arc<AtomicU32>,
    thread: Option<JoinHandle<()>>,
}

impl PumpedOutput {
    pub fn start(sample_rate: u32) -> Arc<Self> {
        let bus = Arc::new(OutputBus::new());
        let running = Arc::new(AtomicBool::new(true));
        let rendered = Arc::new(AtomicUsize::new(0));
        let peak_bits = Arc::new(AtomicU32::new(0f32.to_bits()));

        let thread = {
            let bus = Arc::clone(&bus);
            let running = Arc::clone(&running);
            let rendered = Arc::clone(&rendered);
            let peak_bits = Arc::clone(&peak_bits);
            std::thread::spawn(move || {
                let mut frames = vec![AudioFrame::zero(); 512];
                while running.load(Ordering::SeqCst) {
                    let produced = bus.render(&mut frames);
                    rendered.fetch_add(produced, Ordering::SeqCst);
                    let peak = frames
                        .iter()
                        .map(|f| f.left.abs().max(f.right.abs()))
                        .fold(f32::from_bits(peak_bits.load(Ordering::SeqCst)), f32::max);
                    peak_bits.store(peak.to_bits(), Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        };

        Arc::new(Self {
            bus,
            sample_rate,
            running,
            rendered,
            peak_bits,
            thread: Some(thread),
        })
    }

    /// Factory handing out this device; counts how often it was called
    pub fn factory(device: &Arc<Self>, calls: Arc<AtomicUsize>) -> DeviceFactory {
        let device = Arc::clone(device);
        Box::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&device) as Arc<dyn OutputDevice>)
        })
    }

    /// Frames produced by connected nodes so far
    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }

    /// Largest absolute sample written so far
    pub fn peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.load(Ordering::SeqCst))
    }
}

impl OutputDevice for PumpedOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bus(&self) -> &Arc<OutputBus> {
        &self.bus
    }
}

impl Drop for PumpedOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

//! Reading scheduler
//!
//! Two workers run for the lifetime of a [`TtsReader`]:
//!
//! - the **fetch worker** keeps up to `max_prefetch` synthesized units ahead
//!   of the play cursor, appending them to the history
//! - the **play worker** highlights, plays and unhighlights units in order,
//!   advancing the cursor after each one
//!
//! They are woken by two [`Gate`]s. Shared state lives behind a std mutex
//! that is never held across an await point.
//!
//! `speak()` starts a new session: history and cursor are reset and results
//! of fetches that were in flight for the previous session are discarded.

use crate::error::{Error, InterruptReason};
use crate::reader::gate::{Gate, GateWaiter};
use crate::reader::traits::{Highlighter, Player, ReaderObserver, TtsEngine};
use lector_common::text::{CleanupRules, SourceUnit, TextSource};
use lector_common::ReaderConfig;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default number of played units kept behind the cursor
pub const DEFAULT_MAX_HISTORY: usize = 5;

/// Default number of units fetched ahead of the cursor
pub const DEFAULT_MAX_PREFETCH: usize = 2;

/// Tuning of the reader
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions {
    /// Played units retained behind the cursor (for skipping back)
    pub max_history: usize,
    /// Units synthesized ahead of the cursor
    pub max_prefetch: usize,
    /// Cleanup applied to every unit before synthesis
    pub cleanup: CleanupRules,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_prefetch: DEFAULT_MAX_PREFETCH,
            cleanup: CleanupRules::default(),
        }
    }
}

impl From<&ReaderConfig> for ReaderOptions {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            max_history: config.max_history,
            max_prefetch: config.max_prefetch,
            cleanup: config.cleanup_rules(),
        }
    }
}

/// Collaborators the reader is built from
pub struct ReaderParts {
    pub source: Arc<dyn TextSource>,
    pub highlighter: Arc<dyn Highlighter>,
    pub player: Arc<dyn Player>,
    pub engine: Arc<dyn TtsEngine>,
    pub observer: Option<Arc<dyn ReaderObserver>>,
}

/// One synthesized unit
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Encoded audio returned by the TTS engine
    pub audio: Vec<u8>,
    /// Unit the audio was synthesized from
    pub unit: SourceUnit,
}

struct ReaderState {
    units: Option<Box<dyn Iterator<Item = SourceUnit> + Send>>,
    /// `None` slots were released to bound memory
    history: Vec<Option<HistoryEntry>>,
    /// Play cursor into `history`
    index: usize,
    speaking: bool,
    /// Set by `stop()`, cleared by `speak()`; no unit starts while set
    stopped: bool,
    /// Bumped by every `speak()`
    session: u64,
}

impl ReaderState {
    fn ready_entry(&self) -> Option<&HistoryEntry> {
        self.history.get(self.index).and_then(Option::as_ref)
    }

    /// Release entries `max_history` or more behind the cursor
    fn release_old_entries(&mut self, max_history: usize) {
        if let Some(last) = self.index.checked_sub(max_history) {
            for slot in &mut self.history[..=last] {
                slot.take();
            }
        }
    }
}

struct Shared {
    parts: ReaderParts,
    options: ReaderOptions,
    state: Mutex<ReaderState>,
    fetch_gate: Gate,
    play_gate: Gate,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ReaderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Text-to-speech reader with prefetching and bounded history.
///
/// Must be created inside a tokio runtime; the workers are spawned on it and
/// stopped when the reader is dropped.
pub struct TtsReader {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TtsReader {
    /// Build the reader and start its workers
    pub fn new(parts: ReaderParts, options: ReaderOptions) -> Self {
        let shared = Arc::new(Shared {
            parts,
            options,
            state: Mutex::new(ReaderState {
                units: None,
                history: Vec::new(),
                index: 0,
                speaking: false,
                stopped: false,
                session: 0,
            }),
            fetch_gate: Gate::new(),
            play_gate: Gate::new(),
        });

        let fetch_waiter = shared.fetch_gate.waiter();
        let play_waiter = shared.play_gate.waiter();
        let workers = vec![
            tokio::spawn(fetch_worker(Arc::clone(&shared), fetch_waiter)),
            tokio::spawn(play_worker(Arc::clone(&shared), play_waiter)),
        ];

        Self { shared, workers }
    }

    /// Start reading from the beginning of the source.
    ///
    /// Interrupts the current unit (with a non-skip reason) when already
    /// speaking.
    pub fn speak(&self) {
        let was_speaking = {
            let mut state = self.shared.state();
            state.units = Some(self.shared.parts.source.units());
            state.history.clear();
            state.index = 0;
            state.stopped = false;
            state.session += 1;
            info!(session = state.session, "Speak");
            state.speaking
        };
        self.shared.fetch_gate.set();
        if was_speaking {
            self.shared.parts.player.stop(InterruptReason::Stop);
        }
    }

    /// Stop the current unit; the reader stays idle until the next `speak()`
    pub fn stop(&self) {
        self.shared.state().stopped = true;
        self.shared.parts.player.stop(InterruptReason::Stop);
    }

    /// Move the cursor by `offset` units.
    ///
    /// Only effective while speaking and when the target is a retained
    /// history entry; otherwise nothing changes.
    ///
    /// # Returns
    /// True when the cursor moved
    pub fn skip(&self, offset: isize) -> bool {
        {
            let mut state = self.shared.state();
            if !state.speaking {
                return false;
            }
            let Some(target) = state.index.checked_add_signed(offset) else {
                return false;
            };
            if !matches!(state.history.get(target), Some(Some(_))) {
                return false;
            }
            debug!(from = state.index, to = target, "Skip");
            state.index = target;
        }
        self.shared.fetch_gate.set();
        self.shared.parts.player.stop(InterruptReason::Skip);
        true
    }

    /// True while the play worker is working through ready units
    pub fn is_speaking(&self) -> bool {
        self.shared.state().speaking
    }

    /// Play cursor
    pub fn index(&self) -> usize {
        self.shared.state().index
    }

    /// Number of history slots, released ones included
    pub fn history_len(&self) -> usize {
        self.shared.state().history.len()
    }

    /// Sentences of the history slots; `None` for released slots
    pub fn history_sentences(&self) -> Vec<Option<String>> {
        self.shared
            .state()
            .history
            .iter()
            .map(|slot| slot.as_ref().map(|entry| entry.unit.sentence.clone()))
            .collect()
    }
}

impl Drop for TtsReader {
    fn drop(&mut self) {
        self.shared.fetch_gate.cancel();
        self.shared.play_gate.cancel();
        self.shared.parts.player.stop(InterruptReason::Stop);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn fetch_worker(shared: Arc<Shared>, mut gate: GateWaiter) {
    while gate.wait().await.is_ok() {
        fill_prefetch_window(&shared).await;
    }
    debug!("Fetch worker stopped");
}

/// Fetch units until the prefetch window is full, the source is exhausted
/// or a fetch fails
async fn fill_prefetch_window(shared: &Shared) {
    loop {
        let (unit, session) = {
            let mut state = shared.state();
            if state.history.len().saturating_sub(state.index) > shared.options.max_prefetch {
                return;
            }
            let next = state.units.as_mut().and_then(|units| units.next());
            match next {
                Some(unit) => (unit, state.session),
                None => {
                    state.units = None;
                    return;
                }
            }
        };

        let Some(clean) = shared.options.cleanup.clean(&unit.sentence) else {
            debug!(sentence = %unit.sentence, "Skipping unit without speakable text");
            continue;
        };

        let audio = match shared.parts.engine.fetch_audio(&clean).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Failed to fetch audio for unit: {}", e);
                return;
            }
        };

        {
            let mut state = shared.state();
            if state.session != session {
                debug!("Dropping audio fetched for a previous session");
                return;
            }
            state.history.push(Some(HistoryEntry { audio, unit }));
            state.release_old_entries(shared.options.max_history);
            debug!(len = state.history.len(), index = state.index, "Unit ready");
        }
        shared.play_gate.set();
    }
}

async fn play_worker(shared: Arc<Shared>, mut gate: GateWaiter) {
    while gate.wait().await.is_ok() {
        {
            let mut state = shared.state();
            if state.stopped || state.ready_entry().is_none() {
                continue;
            }
            state.speaking = true;
        }
        if let Some(observer) = &shared.parts.observer {
            observer.on_playback_start();
        }

        play_ready_units(&shared).await;

        shared.state().speaking = false;
        if let Some(observer) = &shared.parts.observer {
            observer.on_playback_end();
        }
    }
    debug!("Play worker stopped");
}

/// Play units from the cursor until none is ready or playback is stopped
async fn play_ready_units(shared: &Shared) {
    loop {
        let (entry, index, session) = {
            let state = shared.state();
            if state.stopped {
                return;
            }
            match state.ready_entry() {
                Some(entry) => (entry.clone(), state.index, state.session),
                None => return,
            }
        };

        let HistoryEntry { audio, unit } = entry;
        if let Err(e) = shared
            .parts
            .highlighter
            .highlight(&unit.elements, unit.start, unit.end)
        {
            warn!("Highlight failed: {}", e);
        }
        let result = shared.parts.player.play(audio).await;
        if let Err(e) = shared.parts.highlighter.unhighlight(&unit.elements) {
            warn!("Unhighlight failed: {}", e);
        }

        match result {
            Ok(()) => {}
            // Cursor was already moved by skip()
            Err(e) if e.is_skip() => continue,
            Err(Error::Interrupted { reason }) => {
                debug!(%reason, "Playback interrupted");
                return;
            }
            Err(e) => warn!("Failed to play unit {}: {}", index, e),
        }

        {
            let mut state = shared.state();
            // A skip or speak that raced with the end of the unit wins
            if state.session == session && state.index == index {
                state.index += 1;
            }
        }
        shared.fetch_gate.set();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lector_common::text::ElementId;

    fn entry(sentence: &str) -> HistoryEntry {
        HistoryEntry {
            audio: vec![1, 2, 3],
            unit: SourceUnit {
                sentence: sentence.to_string(),
                elements: vec![ElementId(0)],
                start: 0,
                end: sentence.len(),
            },
        }
    }

    fn state_with(len: usize, index: usize) -> ReaderState {
        ReaderState {
            units: None,
            history: (0..len).map(|i| Some(entry(&format!("unit {i}")))).collect(),
            index,
            speaking: false,
            stopped: false,
            session: 1,
        }
    }

    #[test]
    fn test_release_old_entries() {
        let mut state = state_with(9, 7);
        state.release_old_entries(5);
        let retained: Vec<bool> = state.history.iter().map(Option::is_some).collect();
        assert_eq!(retained, [false, false, false, true, true, true, true, true, true]);
    }

    #[test]
    fn test_release_keeps_everything_near_start() {
        let mut state = state_with(4, 4);
        state.release_old_entries(5);
        assert!(state.history.iter().all(Option::is_some));
    }

    #[test]
    fn test_ready_entry() {
        let mut state = state_with(2, 1);
        assert_eq!(state.ready_entry().map(|e| e.unit.sentence.as_str()), Some("unit 1"));
        state.index = 2;
        assert!(state.ready_entry().is_none());
        state.index = 0;
        state.history[0] = None;
        assert!(state.ready_entry().is_none());
    }

    #[test]
    fn test_options_from_config() {
        let config = ReaderConfig {
            max_history: 7,
            max_prefetch: 1,
            ..Default::default()
        };
        let options = ReaderOptions::from(&config);
        assert_eq!(options.max_history, 7);
        assert_eq!(options.max_prefetch, 1);
    }
}

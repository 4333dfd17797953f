//! Reading scheduler and its collaborators

pub mod gate;
pub mod scheduler;
pub mod traits;

pub use gate::{Gate, GateCancelled, GateWaiter};
pub use scheduler::{HistoryEntry, ReaderOptions, ReaderParts, TtsReader};
pub use traits::{ConsoleHighlighter, Highlighter, Player, ReaderObserver, TtsEngine};

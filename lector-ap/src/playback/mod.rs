//! Playback of single synthesized units

pub mod controller;
pub mod driver;
pub mod events;

pub use controller::{AudioPlayback, PlaybackSettings};
pub use driver::PlaybackDriver;
pub use events::PlaybackEvent;

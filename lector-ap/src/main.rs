//! Lector reader (lector-ap) - Main entry point
//!
//! Reads a text file aloud. While speaking, single-letter commands on stdin
//! control the reader:
//!
//! - `n` next unit, `p` previous unit
//! - `s` stop, `r` restart from the beginning
//! - `q` quit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lector_ap::audio::CpalOutput;
use lector_ap::playback::{AudioPlayback, PlaybackEvent, PlaybackSettings};
use lector_ap::reader::{ConsoleHighlighter, ReaderObserver, ReaderOptions, ReaderParts, TtsReader};
use lector_ap::tts::{GoogleTranslateTts, GoogleTtsSettings};
use lector_common::text::TextDocument;
use lector_common::ReaderConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lector-ap
#[derive(Parser, Debug)]
#[command(name = "lector-ap")]
#[command(about = "Read text aloud with adjustable tempo and pitch")]
#[command(version)]
struct Args {
    /// Configuration file (default: <config dir>/lector/config.toml)
    #[arg(short, long, env = "LECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Playback tempo (1.0 = unchanged)
    #[arg(long, env = "LECTOR_TEMPO")]
    tempo: Option<f32>,

    /// Signed pitch offset (0.0 = unchanged)
    #[arg(long, env = "LECTOR_PITCH", allow_hyphen_values = true)]
    pitch: Option<f32>,

    /// Volume 0.0 - 1.0
    #[arg(long, env = "LECTOR_VOLUME")]
    volume: Option<f32>,

    /// Speech language code
    #[arg(long, env = "LECTOR_LANGUAGE")]
    language: Option<String>,

    /// Trailing cutoff as a negative number of seconds (e.g. -0.3 trims the
    /// last ~0.3 s of every unit); zero and positive values have no effect
    #[arg(long, env = "LECTOR_DELAY", allow_hyphen_values = true)]
    delay: Option<f32>,

    /// Output device name (default device when omitted)
    #[arg(long, env = "LECTOR_DEVICE")]
    device: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a text file aloud
    Speak {
        /// Plain-text file; blank lines separate paragraphs
        file: PathBuf,
    },
}

impl Args {
    fn apply_overrides(&self, config: &mut ReaderConfig) {
        if let Some(tempo) = self.tempo {
            config.tempo = tempo;
        }
        if let Some(pitch) = self.pitch {
            config.pitch = pitch;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
    }
}

/// Logs reader start/end
struct CliObserver;

impl ReaderObserver for CliObserver {
    fn on_playback_start(&self) {
        info!("Reading started");
    }

    fn on_playback_end(&self) {
        info!("Reading paused (press r to restart, q to quit)");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ReaderConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let default_filter = format!(
        "lector_ap={level},lector_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Command::Speak { file } = &args.command;
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document = Arc::new(TextDocument::from_text(&text));
    info!("Loaded {} ({} paragraphs)", file.display(), document.len());

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let player = Arc::new(
        AudioPlayback::new(CpalOutput::factory(args.device.clone()), PlaybackSettings::from(&config))
            .with_events(events_tx),
    );
    let engine = GoogleTranslateTts::new(GoogleTtsSettings::from(&config))
        .context("Failed to create TTS client")?;

    let reader = TtsReader::new(
        ReaderParts {
            source: document.clone(),
            highlighter: Arc::new(ConsoleHighlighter::new(document)),
            player,
            engine: Arc::new(engine),
            observer: Some(Arc::new(CliObserver)),
        },
        ReaderOptions::from(&config),
    );

    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let PlaybackEvent::Position { .. } = &event {
                debug!(time = ?event.formatted_time(), "Position");
            }
        }
    });

    reader.speak();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "n" => { reader.skip(1); }
                    "p" => { reader.skip(-1); }
                    "s" => reader.stop(),
                    "r" => reader.speak(),
                    "q" => break,
                    "" => {}
                    other => info!("Unknown command '{}' (n, p, s, r, q)", other),
                }
            }
            _ = &mut shutdown => break,
        }
    }

    reader.stop();
    info!("Shutdown complete");
    Ok(())
}

/// Ctrl+C / SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_negative_delay_becomes_cutoff() {
        let args = Args::try_parse_from(["lector-ap", "--delay", "-0.3", "speak", "notes.txt"]).unwrap();
        let mut config = ReaderConfig::default();
        args.apply_overrides(&mut config);
        assert!((config.cutoff_seconds() - 0.3).abs() < 1e-6);

        let args = Args::try_parse_from(["lector-ap", "--delay", "0.5", "speak", "notes.txt"]).unwrap();
        args.apply_overrides(&mut config);
        assert_eq!(config.cutoff_seconds(), 0.0);
    }

    #[test]
    fn test_delay_help_describes_cutoff() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("Trailing cutoff"));
        assert!(!help.contains("between units"));
    }
}

//! Google Translate speech endpoint
//!
//! Text is split into pieces of at most `max_chars` characters, each piece
//! is requested separately and the decoded MP3 payloads are concatenated.
//!
//! The endpoint answers with a guard line followed by JSON on the second
//! line:
//!
//! ```text
//! )]}'
//! {"translate_tts":["<base64 mp3>"]}
//! ```

use crate::error::{Error, Result};
use crate::reader::TtsEngine;
use async_trait::async_trait;
use base64::Engine;
use lector_common::text::split_request;
use lector_common::ReaderConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const TTS_BASE_URL: &str = "https://www.google.com/async/translate_tts";
const USER_AGENT: &str = concat!("lector/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Characters escaped by a URI component encoder
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// JSON payload line of a service response
#[derive(Debug, Deserialize)]
struct TtsResponse {
    translate_tts: Vec<String>,
}

/// Voice parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleTtsSettings {
    /// Language code, e.g. `en`
    pub language: String,
    /// Speaking speed (1.0 = normal)
    pub speed: f32,
    /// Character budget of a single request
    pub max_chars: usize,
    /// Drop the first comma of every piece
    pub filter_commas: bool,
}

impl Default for GoogleTtsSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            speed: 1.0,
            max_chars: 195,
            filter_commas: false,
        }
    }
}

impl From<&ReaderConfig> for GoogleTtsSettings {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            language: config.language.clone(),
            speed: config.tts_speed,
            max_chars: config.tts_max_chars,
            filter_commas: config.tts_filter_commas,
        }
    }
}

/// HTTP client for the translate speech endpoint
pub struct GoogleTranslateTts {
    http_client: reqwest::Client,
    settings: GoogleTtsSettings,
}

impl GoogleTranslateTts {
    pub fn new(settings: GoogleTtsSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http_client,
            settings,
        })
    }

    pub fn settings(&self) -> &GoogleTtsSettings {
        &self.settings
    }

    async fn fetch_piece(&self, piece: &str) -> Result<Vec<u8>> {
        let url = request_url(&self.settings.language, self.settings.speed, piece);
        debug!(chars = piece.chars().count(), "Requesting speech");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!("TTS service returned {}: {}", status, body)));
        }
        let body = response.text().await?;
        parse_response(&body)
    }
}

#[async_trait]
impl TtsEngine for GoogleTranslateTts {
    async fn fetch_audio(&self, text: &str) -> Result<Vec<u8>> {
        let pieces = request_pieces(text, &self.settings)?;
        let mut audio = Vec::new();
        for piece in &pieces {
            audio.extend(self.fetch_piece(piece).await?);
        }
        debug!(pieces = pieces.len(), bytes = audio.len(), "Speech fetched");
        Ok(audio)
    }
}

/// Split `text` into request-sized pieces, applying the comma filter
pub fn request_pieces(text: &str, settings: &GoogleTtsSettings) -> Result<Vec<String>> {
    let pieces = split_request(text, settings.max_chars)?;
    if !settings.filter_commas {
        return Ok(pieces);
    }
    Ok(pieces.into_iter().map(|piece| piece.replacen(',', "", 1)).collect())
}

/// Request URL for one piece; the text is URI-component encoded twice
pub fn request_url(language: &str, speed: f32, text: &str) -> String {
    let once = utf8_percent_encode(text, URI_COMPONENT).to_string();
    let twice = utf8_percent_encode(&once, URI_COMPONENT);
    format!(
        "{}?async=_fmt:jspb&ttsp=tl:{},txt:{},spd:{}",
        TTS_BASE_URL, language, twice, speed
    )
}

/// Extract and decode the audio payload of a service response
pub fn parse_response(body: &str) -> Result<Vec<u8>> {
    let line = body
        .lines()
        .nth(1)
        .ok_or_else(|| Error::Fetch("TTS response has no payload line".to_string()))?;
    let response: TtsResponse = serde_json::from_str(line)
        .map_err(|e| Error::Fetch(format!("Malformed TTS response: {}", e)))?;
    let payload = response
        .translate_tts
        .first()
        .ok_or_else(|| Error::Fetch("TTS response carries no audio".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| Error::Fetch(format!("Invalid audio payload: {}", e)))
}

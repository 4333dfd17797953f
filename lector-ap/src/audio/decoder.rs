//! Audio decoder using symphonia
//!
//! Decodes one synthesized unit held entirely in memory (MP3 from the TTS
//! service, WAV in tests) into planar f32 channels.

use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Simple in-memory decoder.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an encoded audio buffer.
    ///
    /// # Arguments
    /// * `bytes` - Complete encoded stream
    /// * `extension` - Optional container hint ("mp3", "wav"); probing works
    ///   without one
    ///
    /// # Returns
    /// Planar audio with at most two channels, at the stream's native rate
    ///
    /// # Errors
    /// [`Error::Decode`] for unrecognized or malformed data, or a stream
    /// that yields no audio
    pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
        debug!("Decoding {} bytes", bytes.len());
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels: Vec<Vec<f32>> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut buf_frames = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    if sample_rate == 0 {
                        sample_rate = spec.rate;
                    }
                    if sample_buf.is_none() || decoded.capacity() > buf_frames {
                        buf_frames = decoded.capacity();
                        sample_buf = Some(SampleBuffer::new(buf_frames as u64, spec));
                    }
                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_planar_ref(decoded);
                        Self::append_planar(buf.samples(), spec.channels.count(), &mut channels);
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame; keep going like a browser decoder would
                    warn!("Decode error: {}", e);
                }
                Err(e) => return Err(Error::Decode(format!("Decoder failed: {}", e))),
            }
        }

        let audio = DecodedAudio::new(channels, sample_rate);
        if audio.frames() == 0 || sample_rate == 0 {
            return Err(Error::Decode("Stream contained no audio".to_string()));
        }
        debug!(
            "Decoded {} frames at {} Hz ({} channel(s))",
            audio.frames(),
            audio.sample_rate,
            audio.channel_count()
        );
        Ok(audio)
    }

    /// Append up to two channels of a planar packet (`[ch0..., ch1..., ...]`)
    /// to the per-channel accumulators
    fn append_planar(samples: &[f32], channel_count: usize, channels: &mut Vec<Vec<f32>>) {
        if channel_count == 0 {
            return;
        }
        if channels.is_empty() {
            channels.resize_with(channel_count.min(2), Vec::new);
        }
        let frames = samples.len() / channel_count;
        for (out, plane) in channels.iter_mut().zip(samples.chunks_exact(frames.max(1))) {
            out.extend_from_slice(plane);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let v = ((i as f32 * 0.1).sin() * 8_000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(v).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let audio = SimpleDecoder::decode_bytes(wav_bytes(1, 16_000, 1_600), Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.channel_count(), 1);
        assert_eq!(audio.frames(), 1_600);
        assert!(audio.left().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn test_decode_stereo_wav_without_hint() {
        let audio = SimpleDecoder::decode_bytes(wav_bytes(2, 22_050, 500), None).unwrap();
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frames(), 500);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = SimpleDecoder::decode_bytes(vec![0x42; 64], None);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_truncated_header_is_decode_error() {
        let mut bytes = wav_bytes(1, 16_000, 100);
        bytes.truncate(20);
        assert!(SimpleDecoder::decode_bytes(bytes, Some("wav")).is_err());
    }
}

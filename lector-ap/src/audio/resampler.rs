//! Audio resampling using rubato
//!
//! Decoded units arrive at whatever rate the TTS service produced (24 kHz
//! MP3 for the Google engine); the device runs at its own rate. Units are
//! converted once, before they enter the tempo/pitch pipeline, so the
//! pipeline always works at the device rate.

use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample a decoded unit to `output_rate`.
    ///
    /// # Returns
    /// The input unchanged when it is already at `output_rate` or empty
    pub fn resample(audio: DecodedAudio, output_rate: u32) -> Result<DecodedAudio> {
        let input_rate = audio.sample_rate;
        if input_rate == output_rate || audio.frames() == 0 {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(audio);
        }
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::Resample(format!(
                "Invalid sample rates: {} -> {}",
                input_rate, output_rate
            )));
        }

        let input_frames = audio.frames();
        let channels = audio.channel_count();
        debug!(
            "Resampling from {}Hz to {}Hz ({} channels, {} frames)",
            input_rate, output_rate, channels, input_frames
        );

        let mut resampler = Self::create_resampler(input_rate, output_rate, channels, input_frames)?;
        let mut planar_output = resampler
            .process(audio.channels(), None)
            .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;

        // Flush the filter delay so the tail of the unit is not lost
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| Error::Resample(format!("Resampler flush failed: {}", e)))?;

        let delay = resampler.output_delay();
        let expected_frames =
            (input_frames as f64 * output_rate as f64 / input_rate as f64).round() as usize;
        for (channel, tail) in planar_output.iter_mut().zip(tail) {
            channel.extend(tail);
            channel.drain(..delay.min(channel.len()));
            channel.truncate(expected_frames);
        }

        let output = DecodedAudio::new(planar_output, output_rate);
        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames,
            output.frames()
        );
        Ok(output)
    }

    /// Create a rubato resampler processing the whole unit as one chunk.
    ///
    /// FastFixedIn gives a good quality/performance tradeoff for speech.
    fn create_resampler(
        input_rate: u32,
        output_rate: u32,
        channels: usize,
        chunk_size: usize,
    ) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            chunk_size,
            channels,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))
    }
}

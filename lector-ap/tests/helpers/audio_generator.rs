//! In-memory WAV generation
//!
//! Encoded units handed to the playback controller in tests. WAV keeps the
//! decoder path real without shipping MP3 fixtures.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Standard test sample rate (22.05 kHz keeps units small)
pub const TEST_SAMPLE_RATE: u32 = 22_050;

/// Stereo 16-bit sine wave as WAV bytes
///
/// # Arguments
/// * `duration_ms` - Duration in milliseconds
/// * `frequency_hz` - Sine frequency
/// * `amplitude` - Amplitude 0.0-1.0
pub fn sine_wav_bytes(duration_ms: u64, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("wav header");
        let total_frames = frame_count(duration_ms);
        let amplitude_i16 = amplitude * i16::MAX as f32;
        for frame_idx in 0..total_frames {
            let t = frame_idx as f32 / TEST_SAMPLE_RATE as f32;
            let sample = ((2.0 * PI * frequency_hz * t).sin() * amplitude_i16) as i16;
            writer.write_sample(sample).expect("left sample");
            writer.write_sample(sample).expect("right sample");
        }
        writer.finalize().expect("wav finalize");
    }
    cursor.into_inner()
}

/// Frames in `duration_ms` at [`TEST_SAMPLE_RATE`]
pub fn frame_count(duration_ms: u64) -> u64 {
    TEST_SAMPLE_RATE as u64 * duration_ms / 1000
}

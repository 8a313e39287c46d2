//! Audio capture and playback
//!
//! Capture produces discrete [`AudioClip`]s; playback consumes the decoded
//! reply audio returned by the backend.

mod capture;
mod playback;

pub use capture::{CaptureSource, MicCapture};
pub use playback::{AudioPlayback, SpeakerSink};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Hard cap on a single recording
pub const MAX_RECORDING: std::time::Duration = std::time::Duration::from_secs(10);

/// MIME type of captured clips
pub const CLIP_MIME_TYPE: &str = "audio/wav";

/// One bounded recording of user audio
///
/// Produced once per listening cycle and consumed exactly once by the
/// transport. An empty clip means the window closed without usable audio.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Encoded audio bytes (WAV container)
    pub data: Vec<u8>,
    /// MIME type of `data`
    pub mime_type: &'static str,
}

impl AudioClip {
    /// Clip with no audio at all, emitted when a recording window captured
    /// nothing or when `stop` raced an already-finished recording
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: Vec::new(),
            mime_type: CLIP_MIME_TYPE,
        }
    }

    /// Whether this clip holds any audio
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Convert f32 samples to WAV bytes for the voice-query upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

//! Audio playback to speakers
//!
//! Decodes the backend's reply audio (MP3 or WAV) and plays it through the
//! default output device. At most one playback is active at a time; a new
//! `play` or a `stop` cuts the previous one short.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Plays decoded assistant audio and reports completion
#[async_trait]
pub trait SpeakerSink: Send + Sync {
    /// Play one reply, resolving when playback ends or is stopped
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Playback`] on decode or device errors
    async fn play(&self, audio: &[u8], mime_type: &str) -> Result<()>;

    /// Cut any in-flight playback immediately; idempotent
    fn stop(&self);
}

/// Speaker output via the default cpal output device
pub struct AudioPlayback {
    config: StreamConfig,
    /// Stop flag of the playback currently on the device, if any
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device with a usable config exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            active: Mutex::new(None),
        })
    }
}

#[async_trait]
impl SpeakerSink for AudioPlayback {
    async fn play(&self, audio: &[u8], mime_type: &str) -> Result<()> {
        let samples = decode_audio(audio, mime_type)?;
        if samples.is_empty() {
            return Ok(());
        }

        // Stop-before-start: a lingering playback must never overlap a new one
        self.stop();

        let stopped = Arc::new(AtomicBool::new(false));
        if let Ok(mut active) = self.active.lock() {
            *active = Some(Arc::clone(&stopped));
        }

        let config = self.config.clone();
        let flag = Arc::clone(&stopped);
        let result = tokio::task::spawn_blocking(move || play_samples(&config, samples, &flag))
            .await
            .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?;

        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|f| Arc::ptr_eq(f, &stopped)) {
                *active = None;
            }
        }

        result
    }

    fn stop(&self) {
        let flag = self.active.lock().ok().and_then(|mut active| active.take());
        if let Some(flag) = flag {
            flag.store(true, Ordering::SeqCst);
            tracing::debug!("playback stopped");
        }
    }
}

/// Play samples on the default output device, polling until the stream
/// drains, the stop flag is raised, or a duration-derived timeout passes
fn play_samples(config: &StreamConfig, samples: Vec<f32>, stop: &Arc<AtomicBool>) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device".to_string()))?;

    let channels = config.channels as usize;
    let sample_count = samples.len();

    let position = Arc::new(Mutex::new(0_usize));
    let finished = Arc::new(AtomicBool::new(false));

    let samples = Arc::new(samples);
    let samples_cb = Arc::clone(&samples);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = position_cb.lock() else {
                    return;
                };

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples_cb.len() {
                        samples_cb[*pos]
                    } else {
                        finished_cb.store(true, Ordering::SeqCst);
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples_cb.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
        if std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    if !stop.load(Ordering::SeqCst) {
        // Let the device drain the tail of the buffer
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Decode reply audio bytes into mono f32 samples
fn decode_audio(audio: &[u8], mime_type: &str) -> Result<Vec<f32>> {
    match mime_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => decode_wav(audio),
        // The backend's TTS replies are MP3; treat unknown types as MP3 too
        _ => decode_mp3(audio),
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and downmix stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Decode WAV bytes to mono f32 samples
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav_data: &[u8]) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?;

    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(format!("WAV decode error: {e}")))?,
    };

    if channels == 1 {
        return Ok(raw);
    }

    Ok(raw
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_decode_round_trips_mono() {
        let samples = vec![0.0_f32, 0.25, -0.25, 0.5];
        let wav = crate::audio::samples_to_wav(&samples, PLAYBACK_SAMPLE_RATE).unwrap();

        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.len(), samples.len());
        for (orig, back) in samples.iter().zip(&decoded) {
            assert!((orig - back).abs() < 0.001, "{orig} vs {back}");
        }
    }

    #[test]
    fn garbage_mp3_decodes_to_nothing() {
        // minimp3 skips junk until EOF, so truncated noise decodes to nothing
        let decoded = decode_mp3(&[0xde, 0xad, 0xbe, 0xef]).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn garbage_wav_is_a_playback_error() {
        assert!(matches!(
            decode_wav(&[0x00, 0x01, 0x02]),
            Err(Error::Playback(_))
        ));
    }
}

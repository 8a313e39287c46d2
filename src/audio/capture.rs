//! Microphone capture
//!
//! `cpal` streams are not `Send`, so [`MicCapture`] parks the stream on a
//! dedicated worker thread and drives it through shared atomics. The handle
//! itself can then live behind `Arc<dyn CaptureSource>` next to the rest of
//! the session machinery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use super::{samples_to_wav, AudioClip, MAX_RECORDING, SAMPLE_RATE};
use crate::{Error, Result};

/// Records bounded audio clips from a microphone
///
/// At most one recording may be active at a time; `stop` while idle is a
/// benign no-op that yields an empty clip, since the window timer and a
/// manual stop can race.
pub trait CaptureSource: Send + Sync {
    /// Open the capture device, prompting for permission if needed
    ///
    /// Idempotent: once acquired, further calls succeed without touching
    /// the device again.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::PermissionDenied`] or [`Error::DeviceUnavailable`]
    fn acquire(&self) -> Result<()>;

    /// Begin buffering audio
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotAcquired`] before a successful [`acquire`]
    /// (`CaptureSource::acquire`), or [`Error::AlreadyRecording`] while a
    /// recording is in progress
    fn start(&self) -> Result<()>;

    /// End the recording and return the captured clip
    ///
    /// Returns an empty clip when no recording was active.
    fn stop(&self) -> AudioClip;

    /// Whether a recording is in progress
    fn is_recording(&self) -> bool;

    /// Stop any recording and release the underlying device
    ///
    /// Safe to call multiple times.
    fn release(&self);
}

/// State shared between the capture handle and the cpal callback
struct CaptureShared {
    buffer: Mutex<Vec<f32>>,
    recording: AtomicBool,
    /// Buffer never grows past this many samples, bounding a runaway window
    max_samples: usize,
}

/// Keeps the worker thread (and with it the cpal stream) alive
struct Worker {
    shutdown_tx: mpsc::Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

/// Capture device backed by the default cpal input at 16kHz mono
pub struct MicCapture {
    shared: Arc<CaptureShared>,
    worker: Mutex<Option<Worker>>,
}

impl MicCapture {
    /// Create an unacquired capture handle
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_RECORDING)
    }

    /// Create a capture handle with a custom recording bound
    #[must_use]
    pub fn with_limit(max_recording: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_samples = (f64::from(SAMPLE_RATE) * max_recording.as_secs_f64()) as usize;

        Self {
            shared: Arc::new(CaptureShared {
                buffer: Mutex::new(Vec::new()),
                recording: AtomicBool::new(false),
                max_samples,
            }),
            worker: Mutex::new(None),
        }
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MicCapture {
    fn acquire(&self) -> Result<()> {
        let Ok(mut worker) = self.worker.lock() else {
            return Err(Error::DeviceUnavailable("capture state poisoned".to_string()));
        };

        if worker.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || match open_input_stream(&shared) {
            Ok(stream) => {
                let _ = ready_tx.send(Ok(()));
                // Park until released; the stream lives as long as this thread
                let _ = shutdown_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!(sample_rate = SAMPLE_RATE, "microphone acquired");
                *worker = Some(Worker {
                    shutdown_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::DeviceUnavailable(
                    "capture worker exited before opening the device".to_string(),
                ))
            }
        }
    }

    fn start(&self) -> Result<()> {
        let acquired = self.worker.lock().is_ok_and(|w| w.is_some());
        if !acquired {
            return Err(Error::NotAcquired);
        }

        if self
            .shared
            .recording
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRecording);
        }

        if let Ok(mut buf) = self.shared.buffer.lock() {
            buf.clear();
        }

        tracing::debug!("recording started");
        Ok(())
    }

    fn stop(&self) -> AudioClip {
        if !self.shared.recording.swap(false, Ordering::SeqCst) {
            return AudioClip::empty();
        }

        let samples = self
            .shared
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        tracing::debug!(samples = samples.len(), "recording stopped");

        if samples.is_empty() {
            return AudioClip::empty();
        }

        match samples_to_wav(&samples, SAMPLE_RATE) {
            Ok(data) => AudioClip {
                data,
                mime_type: super::CLIP_MIME_TYPE,
            },
            Err(e) => {
                tracing::warn!(error = %e, "clip encoding failed, dropping recording");
                AudioClip::empty()
            }
        }
    }

    fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.shared.recording.store(false, Ordering::SeqCst);
        if let Ok(mut buf) = self.shared.buffer.lock() {
            buf.clear();
        }

        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            let _ = worker.shutdown_tx.send(());
            let _ = worker.handle.join();
            tracing::debug!("microphone released");
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open the default input device at 16kHz mono and start streaming into
/// the shared buffer
fn open_input_stream(shared: &Arc<CaptureShared>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| classify_device_error(&e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::DeviceUnavailable("no suitable capture config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    let callback_shared = Arc::clone(shared);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !callback_shared.recording.load(Ordering::SeqCst) {
                    return;
                }
                if let Ok(mut buf) = callback_shared.buffer.lock() {
                    let remaining = callback_shared.max_samples.saturating_sub(buf.len());
                    if remaining > 0 {
                        let take = remaining.min(data.len());
                        buf.extend_from_slice(&data[..take]);
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| classify_device_error(&e.to_string()))?;

    stream
        .play()
        .map_err(|e| classify_device_error(&e.to_string()))?;

    Ok(stream)
}

/// Split device failures into the two caller-visible cases
fn classify_device_error(detail: &str) -> Error {
    let lower = detail.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        Error::PermissionDenied(detail.to_string())
    } else {
        Error::DeviceUnavailable(detail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_before_acquire_fails() {
        let capture = MicCapture::new();
        assert!(matches!(capture.start(), Err(Error::NotAcquired)));
    }

    #[test]
    fn stop_without_recording_is_benign() {
        let capture = MicCapture::new();
        let clip = capture.stop();
        assert!(clip.is_empty());
    }

    #[test]
    fn release_is_idempotent() {
        let capture = MicCapture::new();
        capture.release();
        capture.release();
        assert!(!capture.is_recording());
    }

    #[test]
    fn buffer_respects_sample_cap() {
        let capture = MicCapture::with_limit(Duration::from_secs(1));
        capture.shared.recording.store(true, Ordering::SeqCst);

        // Emulate the callback pushing more audio than the cap allows
        let chunk = vec![0.1_f32; SAMPLE_RATE as usize];
        for _ in 0..3 {
            if let Ok(mut buf) = capture.shared.buffer.lock() {
                let remaining = capture.shared.max_samples.saturating_sub(buf.len());
                let take = remaining.min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
        }

        let len = capture.shared.buffer.lock().map(|b| b.len()).unwrap_or(0);
        assert_eq!(len, SAMPLE_RATE as usize);
    }

    #[test]
    fn permission_errors_are_classified() {
        assert!(matches!(
            classify_device_error("access denied by user"),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_device_error("device disconnected"),
            Error::DeviceUnavailable(_)
        ));
    }
}

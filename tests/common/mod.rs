//! Shared test doubles for the session controller
//!
//! In-memory implementations of the three controller seams, with scripting
//! hooks (queued clips/replies) and observation hooks (call counts, in-flight
//! gauges) for the scenario tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pauz_voice::audio::{AudioClip, CaptureSource, SpeakerSink};
use pauz_voice::backend::{AssistantBackend, SpokenReply, VoiceReply};
use pauz_voice::{Error, Result, ServiceStatus};

/// A small non-empty clip, as if a recording window captured speech
pub fn speech_clip() -> AudioClip {
    AudioClip {
        data: vec![0x52, 0x49, 0x46, 0x46, 1, 2, 3, 4],
        mime_type: "audio/wav",
    }
}

/// Capture fake: clips are scripted per recording window
pub struct FakeCapture {
    clips: Mutex<VecDeque<AudioClip>>,
    acquired: AtomicBool,
    recording: AtomicBool,
    released: AtomicUsize,
    deny_acquire: bool,
}

impl FakeCapture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clips: Mutex::new(VecDeque::new()),
            acquired: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            released: AtomicUsize::new(0),
            deny_acquire: false,
        })
    }

    /// Capture fake whose microphone permission is always refused
    pub fn denied() -> Arc<Self> {
        Arc::new(Self {
            clips: Mutex::new(VecDeque::new()),
            acquired: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            released: AtomicUsize::new(0),
            deny_acquire: true,
        })
    }

    /// Queue the clip the next `stop` will produce
    pub fn queue_clip(&self, clip: AudioClip) {
        self.clips.lock().unwrap().push_back(clip);
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl CaptureSource for FakeCapture {
    fn acquire(&self) -> Result<()> {
        if self.deny_acquire {
            return Err(Error::PermissionDenied("denied by test".to_string()));
        }
        self.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if !self.acquired.load(Ordering::SeqCst) {
            return Err(Error::NotAcquired);
        }
        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRecording);
        }
        Ok(())
    }

    fn stop(&self) -> AudioClip {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return AudioClip::empty();
        }
        self.clips
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(AudioClip::empty)
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.recording.store(false, Ordering::SeqCst);
        self.acquired.store(false, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend fake with scripted replies and an in-flight gauge
pub struct FakeBackend {
    voice: Mutex<VecDeque<Result<VoiceReply>>>,
    text: Mutex<VecDeque<Result<SpokenReply>>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    voice_calls: AtomicUsize,
    welcome_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::unwrapped())
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::unwrapped()
        })
    }

    fn unwrapped() -> Self {
        Self {
            voice: Mutex::new(VecDeque::new()),
            text: Mutex::new(VecDeque::new()),
            latency: Duration::from_millis(100),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            voice_calls: AtomicUsize::new(0),
            welcome_calls: AtomicUsize::new(0),
        }
    }

    pub fn queue_voice_reply(&self, transcript: &str, response: &str) {
        self.voice.lock().unwrap().push_back(Ok(VoiceReply {
            transcript: transcript.to_string(),
            response_text: response.to_string(),
            audio: vec![1, 2, 3],
            mime_type: "audio/mpeg".to_string(),
        }));
    }

    pub fn queue_voice_failure(&self, code: u16) {
        self.voice.lock().unwrap().push_back(Err(Error::Service {
            status: ServiceStatus::Http(code),
            detail: "scripted failure".to_string(),
        }));
    }

    pub fn queue_text_reply(&self, response: &str) {
        self.text.lock().unwrap().push_back(Ok(SpokenReply {
            text: response.to_string(),
            audio: vec![4, 5, 6],
            mime_type: "audio/mpeg".to_string(),
        }));
    }

    pub fn queue_text_failure(&self, code: u16) {
        self.text.lock().unwrap().push_back(Err(Error::Service {
            status: ServiceStatus::Http(code),
            detail: "scripted failure".to_string(),
        }));
    }

    pub fn voice_calls(&self) -> usize {
        self.voice_calls.load(Ordering::SeqCst)
    }

    pub fn welcome_calls(&self) -> usize {
        self.welcome_calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently outstanding requests observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn track<T>(&self, work: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        let out = work.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl AssistantBackend for FakeBackend {
    async fn fetch_welcome(&self) -> Result<SpokenReply> {
        self.welcome_calls.fetch_add(1, Ordering::SeqCst);
        self.track(async {
            Ok(SpokenReply {
                text: "Welcome back! Ready to reflect?".to_string(),
                audio: vec![9, 9, 9],
                mime_type: "audio/mpeg".to_string(),
            })
        })
        .await
    }

    async fn send_voice_query(&self, _clip: &AudioClip) -> Result<VoiceReply> {
        self.voice_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.voice.lock().unwrap().pop_front();
        self.track(async {
            scripted.unwrap_or_else(|| {
                Err(Error::Service {
                    status: ServiceStatus::Rejected,
                    detail: "unscripted voice query".to_string(),
                })
            })
        })
        .await
    }

    async fn send_text_query(&self, _question: &str) -> Result<SpokenReply> {
        let scripted = self.text.lock().unwrap().pop_front();
        self.track(async {
            scripted.unwrap_or_else(|| {
                Err(Error::Service {
                    status: ServiceStatus::Rejected,
                    detail: "unscripted text query".to_string(),
                })
            })
        })
        .await
    }
}

/// Speaker fake recording every play and stop
pub struct FakeSpeaker {
    plays: Mutex<Vec<(Vec<u8>, String)>>,
    stops: AtomicUsize,
    playing: AtomicBool,
    play_duration: Duration,
}

impl FakeSpeaker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            plays: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            play_duration: Duration::from_millis(500),
        })
    }

    pub fn plays(&self) -> Vec<(Vec<u8>, String)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeakerSink for FakeSpeaker {
    async fn play(&self, audio: &[u8], mime_type: &str) -> Result<()> {
        self.plays
            .lock()
            .unwrap()
            .push((audio.to_vec(), mime_type.to_string()));
        self.playing.store(true, Ordering::SeqCst);
        tokio::time::sleep(self.play_duration).await;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }
}

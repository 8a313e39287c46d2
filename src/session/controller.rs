//! Session controller
//!
//! Owns one open-to-close assistant session: the state machine, the
//! conversation transcript, and the sequencing between capture, transport,
//! and playback. All mutation happens under a single control lock that is
//! never held across an await; async continuations re-validate the session
//! generation before touching anything, so a reply that lands after `close`
//! mutates nothing and starts no playback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::retry::RecoveryPolicy;
use super::state::{transition, SessionEvent, SessionState};
use super::transcript::{ConversationTurn, Speaker, TEXT_APOLOGY, VOICE_APOLOGY};
use crate::audio::{CaptureSource, SpeakerSink, MAX_RECORDING};
use crate::backend::AssistantBackend;
use crate::{Error, Result};

/// Delay before re-opening the recording window after an empty clip
pub const REARM_DELAY: Duration = Duration::from_secs(1);

/// Per-session behavior knobs
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Fetch and play a welcome utterance on open
    pub welcome_enabled: bool,
    /// Start in continuous voice-to-voice mode
    pub voice_mode: bool,
    /// Longest a single recording window may stay open
    pub max_recording: Duration,
    /// Pause before re-arming after a silent window
    pub rearm_delay: Duration,
    /// Pacing for post-failure recovery
    pub recovery: RecoveryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            welcome_enabled: true,
            voice_mode: true,
            max_recording: MAX_RECORDING,
            rearm_delay: REARM_DELAY,
            recovery: RecoveryPolicy::default(),
        }
    }
}

/// Mutable session state, guarded by one lock
struct Control {
    state: SessionState,
    turns: Vec<ConversationTurn>,
    muted: bool,
    voice_mode: bool,
    open: bool,
    /// False once microphone acquisition failed for this session
    voice_available: bool,
    /// Welcome plays at most once per session, even across mode switches
    welcome_played: bool,
    /// Bumped on open/close/mode-switch; stale continuations check it and bail
    generation: u64,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    capture: Arc<dyn CaptureSource>,
    backend: Arc<dyn AssistantBackend>,
    speaker: Arc<dyn SpeakerSink>,
    opts: SessionOptions,
    control: Mutex<Control>,
    /// Signalled by `stop_listening` to end the recording window early
    stop: Notify,
}

impl Inner {
    /// Run `f` against the control block if the session is still the one
    /// identified by `generation`; `None` means the continuation is stale
    fn with_control<R>(&self, generation: u64, f: impl FnOnce(&mut Control) -> R) -> Option<R> {
        let mut control = self.control.lock().ok()?;
        if !control.open || control.generation != generation {
            return None;
        }
        Some(f(&mut control))
    }

    /// Apply a state-machine event, logging the transition
    fn apply(&self, generation: u64, event: SessionEvent) -> Option<SessionState> {
        self.with_control(generation, |control| {
            let next = transition(control.state, event, control.voice_mode);
            if next != control.state {
                tracing::debug!(from = ?control.state, to = ?next, ?event, "session state");
            }
            control.state = next;
            next
        })
    }

    /// Current state, or `None` when the continuation is stale
    fn current(&self, generation: u64) -> Option<SessionState> {
        self.with_control(generation, |control| control.state)
    }
}

/// Controller for one voice assistant session
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    /// Build a controller over the three device/transport seams
    pub fn new(
        capture: Arc<dyn CaptureSource>,
        backend: Arc<dyn AssistantBackend>,
        speaker: Arc<dyn SpeakerSink>,
        opts: SessionOptions,
    ) -> Self {
        let control = Control {
            state: SessionState::Idle,
            turns: Vec::new(),
            muted: false,
            voice_mode: opts.voice_mode,
            open: false,
            voice_available: true,
            welcome_played: false,
            generation: 0,
            driver: None,
        };

        Self {
            inner: Arc::new(Inner {
                capture,
                backend,
                speaker,
                opts,
                control: Mutex::new(control),
                stop: Notify::new(),
            }),
        }
    }

    /// Open the session
    ///
    /// Idempotent: opening an open session is a no-op. Microphone permission
    /// is requested by the session driver; a refusal degrades the session to
    /// text-only rather than failing the open.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self) {
        let generation = {
            let Ok(mut control) = self.inner.control.lock() else {
                return;
            };
            if control.open {
                return;
            }
            control.open = true;
            control.generation += 1;
            control.state = SessionState::Idle;
            control.generation
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            drive(inner, generation).await;
        });

        if let Ok(mut control) = self.inner.control.lock() {
            control.driver = Some(handle);
        }
    }

    /// Close the session
    ///
    /// Safe from any state. Stops the driver, cuts playback, releases the
    /// microphone, and discards the transcript so the next `open` starts a
    /// pristine session. No network work happens on this path.
    pub fn close(&self) {
        let driver = {
            let Ok(mut control) = self.inner.control.lock() else {
                return;
            };
            if !control.open {
                return;
            }
            control.open = false;
            control.generation += 1;
            control.state = SessionState::Idle;
            control.turns.clear();
            control.muted = false;
            control.voice_mode = self.inner.opts.voice_mode;
            control.voice_available = true;
            control.welcome_played = false;
            control.driver.take()
        };

        if let Some(driver) = driver {
            driver.abort();
        }
        self.inner.speaker.stop();
        self.inner.capture.release();
        tracing::debug!("session closed");
    }

    /// Submit a typed question through the same backend path as a voice turn
    ///
    /// Valid while the session is idle (or showing an error) in text mode.
    /// Backend failures are absorbed into the transcript and error state;
    /// the returned errors are gating failures only.
    ///
    /// # Errors
    ///
    /// [`Error::SessionClosed`] when the session is not open,
    /// [`Error::TurnInFlight`] while another turn owns the session
    pub async fn submit_text(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let generation = {
            let Ok(mut control) = self.inner.control.lock() else {
                return Err(Error::SessionClosed);
            };
            if !control.open {
                return Err(Error::SessionClosed);
            }
            // The continuous voice loop owns the turn slot while active
            if control.voice_mode {
                return Err(Error::TurnInFlight);
            }
            if !matches!(control.state, SessionState::Idle | SessionState::Error) {
                return Err(Error::TurnInFlight);
            }

            control
                .turns
                .push(ConversationTurn::new(Speaker::User, text));
            control.state = transition(control.state, SessionEvent::TextSubmitted, false);
            control.generation
        };

        match self.inner.backend.send_text_query(text).await {
            Ok(reply) => {
                let Some(muted) = self.inner.with_control(generation, |control| {
                    control
                        .turns
                        .push(ConversationTurn::new(Speaker::Assistant, reply.text.clone()));
                    control.muted
                }) else {
                    return Ok(());
                };

                if self.inner.apply(generation, SessionEvent::ReplyReceived).is_none() {
                    return Ok(());
                }

                if !muted {
                    if let Err(e) = self.inner.speaker.play(&reply.audio, &reply.mime_type).await {
                        tracing::warn!(error = %e, "playback failed, showing text only");
                    }
                }

                let _ = self.inner.apply(generation, SessionEvent::PlaybackFinished);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "text query failed");
                if self
                    .inner
                    .with_control(generation, |control| {
                        control
                            .turns
                            .push(ConversationTurn::new(Speaker::Assistant, TEXT_APOLOGY));
                    })
                    .is_none()
                {
                    return Ok(());
                }

                let _ = self.inner.apply(generation, SessionEvent::ServiceFailed);
                tokio::time::sleep(self.inner.opts.recovery.base_delay).await;
                let _ = self.inner.apply(generation, SessionEvent::Recovered);
                Ok(())
            }
        }
    }

    /// Toggle mute
    ///
    /// While muted, replies are still fetched and appended to the transcript;
    /// only playback is skipped. Muting mid-reply cuts the audio short, which
    /// lets the turn complete immediately.
    pub fn toggle_mute(&self) -> bool {
        let (muted, cut_playback) = {
            let Ok(mut control) = self.inner.control.lock() else {
                return false;
            };
            control.muted = !control.muted;
            (
                control.muted,
                control.muted && control.state == SessionState::Speaking,
            )
        };

        if cut_playback {
            self.inner.speaker.stop();
        }

        tracing::debug!(muted, "mute toggled");
        muted
    }

    /// End the current recording window early
    ///
    /// The captured clip (possibly empty) is processed exactly as if the
    /// window had timed out. A no-op outside `Listening`.
    pub fn stop_listening(&self) {
        let listening = self
            .inner
            .control
            .lock()
            .is_ok_and(|control| control.open && control.state == SessionState::Listening);

        if listening {
            self.inner.stop.notify_one();
        }
    }

    /// Switch between continuous voice mode and text mode
    ///
    /// Switching while open restarts the session driver; the transcript and
    /// the once-per-session welcome are preserved.
    pub fn set_voice_mode(&self, enabled: bool) {
        let respawn = {
            let Ok(mut control) = self.inner.control.lock() else {
                return;
            };
            if control.voice_mode == enabled {
                return;
            }
            control.voice_mode = enabled;
            if !control.open {
                return;
            }

            control.generation += 1;
            control.state = SessionState::Idle;
            control.voice_available = true;
            if let Some(driver) = control.driver.take() {
                driver.abort();
            }
            control.generation
        };

        self.inner.speaker.stop();
        let _ = self.inner.capture.stop();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            drive(inner, respawn).await;
        });
        if let Ok(mut control) = self.inner.control.lock() {
            control.driver = Some(handle);
        }

        tracing::debug!(voice_mode = enabled, "mode switched");
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner
            .control
            .lock()
            .map_or(SessionState::Idle, |control| control.state)
    }

    /// Snapshot of the conversation transcript
    #[must_use]
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.inner
            .control
            .lock()
            .map(|control| control.turns.clone())
            .unwrap_or_default()
    }

    /// Whether playback is muted
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.inner.control.lock().is_ok_and(|control| control.muted)
    }

    /// Whether the session is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.control.lock().is_ok_and(|control| control.open)
    }

    /// False once microphone acquisition failed and the session degraded
    /// to text-only
    #[must_use]
    pub fn voice_available(&self) -> bool {
        self.inner
            .control
            .lock()
            .is_ok_and(|control| control.voice_available)
    }
}

/// Session driver: welcome, then the conversation loop
///
/// One driver task exists per generation; it exits as soon as any control
/// check reports the generation stale.
async fn drive(inner: Arc<Inner>, generation: u64) {
    let voice_requested = inner
        .with_control(generation, |control| control.voice_mode)
        .unwrap_or(false);

    // Microphone first: a refusal turns this into a text-only session
    // before anything is spoken
    if voice_requested {
        if let Err(e) = inner.capture.acquire() {
            tracing::warn!(error = %e, "microphone unavailable, degrading to text-only");
            if inner
                .with_control(generation, |control| {
                    control.voice_mode = false;
                    control.voice_available = false;
                })
                .is_none()
            {
                return;
            }
        }
    }

    // Welcome utterance, at most once per session even if the fetch fails
    let play_welcome = inner.opts.welcome_enabled
        && inner
            .with_control(generation, |control| {
                let first = !control.welcome_played;
                control.welcome_played = true;
                first
            })
            .unwrap_or(false);

    if play_welcome {
        if inner
            .apply(generation, SessionEvent::Opened { welcome: true })
            .is_none()
        {
            return;
        }

        match inner.backend.fetch_welcome().await {
            Ok(reply) => {
                let Some(muted) = inner.with_control(generation, |control| {
                    control
                        .turns
                        .push(ConversationTurn::new(Speaker::Assistant, reply.text.clone()));
                    control.muted
                }) else {
                    return;
                };

                if !muted {
                    if let Err(e) = inner.speaker.play(&reply.audio, &reply.mime_type).await {
                        tracing::warn!(error = %e, "welcome playback failed, showing text only");
                    }
                }
            }
            // A failed welcome is not worth an error flash; go straight to work
            Err(e) => tracing::warn!(error = %e, "welcome fetch failed"),
        }

        if inner.apply(generation, SessionEvent::WelcomeFinished).is_none() {
            return;
        }
    } else if inner
        .apply(generation, SessionEvent::Opened { welcome: false })
        .is_none()
    {
        return;
    }

    // Text mode: turns arrive via submit_text, nothing more to drive
    if inner.current(generation) != Some(SessionState::Listening) {
        return;
    }

    conversation_loop(&inner, generation).await;
}

/// Continuous voice-to-voice loop: record, send, speak, repeat
async fn conversation_loop(inner: &Arc<Inner>, generation: u64) {
    let mut consecutive_failures: u32 = 0;

    loop {
        match inner.capture.start() {
            Ok(()) => {}
            Err(Error::AlreadyRecording) => {
                // A stale window is still open (mode switch race); fold it in
                let _ = inner.capture.stop();
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "recording failed, degrading to text-only");
                let _ = inner.with_control(generation, |control| {
                    control.voice_mode = false;
                    control.voice_available = false;
                    control.state = SessionState::Idle;
                });
                return;
            }
        }

        // Window closes on manual stop or the hard recording cap
        let _ = tokio::time::timeout(inner.opts.max_recording, inner.stop.notified()).await;

        if inner.current(generation).is_none() {
            let _ = inner.capture.stop();
            return;
        }
        let clip = inner.capture.stop();

        if clip.is_empty() {
            // Silence is a non-event: pause briefly, then listen again
            if inner.apply(generation, SessionEvent::ClipEmpty).is_none() {
                return;
            }
            tokio::time::sleep(inner.opts.rearm_delay).await;
            if inner.apply(generation, SessionEvent::Rearm).is_none() {
                return;
            }
            continue;
        }

        if inner.apply(generation, SessionEvent::ClipCaptured).is_none() {
            return;
        }

        match inner.backend.send_voice_query(&clip).await {
            Ok(reply) => {
                consecutive_failures = 0;

                let Some(muted) = inner.with_control(generation, |control| {
                    control
                        .turns
                        .push(ConversationTurn::new(Speaker::User, reply.transcript.clone()));
                    control.turns.push(ConversationTurn::new(
                        Speaker::Assistant,
                        reply.response_text.clone(),
                    ));
                    control.muted
                }) else {
                    return;
                };

                if inner.apply(generation, SessionEvent::ReplyReceived).is_none() {
                    return;
                }

                if !muted {
                    if let Err(e) = inner.speaker.play(&reply.audio, &reply.mime_type).await {
                        tracing::warn!(error = %e, "playback failed, showing text only");
                    }
                }

                if inner.apply(generation, SessionEvent::PlaybackFinished).is_none() {
                    return;
                }
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(
                    error = %e,
                    consecutive_failures,
                    "voice query failed"
                );

                if inner
                    .with_control(generation, |control| {
                        control
                            .turns
                            .push(ConversationTurn::new(Speaker::Assistant, VOICE_APOLOGY));
                    })
                    .is_none()
                {
                    return;
                }
                if inner.apply(generation, SessionEvent::ServiceFailed).is_none() {
                    return;
                }

                let delay = inner.opts.recovery.delay_for_attempt(consecutive_failures);
                tokio::time::sleep(delay).await;

                if inner.apply(generation, SessionEvent::Recovered).is_none() {
                    return;
                }
                if inner.apply(generation, SessionEvent::Rearm).is_none() {
                    return;
                }
            }
        }
    }
}

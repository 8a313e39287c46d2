//! Pauz Voice - voice assistant session core for the Pauz journaling app
//!
//! This library provides the conversational voice loop behind the journaling
//! assistant:
//! - Session control (turn-taking state machine, transcript, recovery)
//! - Microphone capture (bounded clips, WAV-encoded)
//! - Backend transport (transcription, guidance, welcome endpoints)
//! - Reply playback (MP3/WAV decode to the default output device)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Session Controller                   │
//! │   idle → welcoming → listening → thinking → speaking │
//! └──────┬──────────────────┬──────────────────┬────────┘
//!        │                  │                  │
//! ┌──────▼──────┐   ┌───────▼────────┐   ┌─────▼───────┐
//! │ MicCapture  │   │ AssistantClient │   │ AudioPlayback│
//! │ (cpal/WAV)  │   │ (HTTP backend)  │   │ (cpal/MP3)  │
//! └─────────────┘   └────────────────┘   └─────────────┘
//! ```
//!
//! The backend owns authentication, persistence, speech models, and response
//! generation; this crate consumes it as an opaque HTTP contract.

pub mod audio;
pub mod backend;
pub mod config;
pub mod credentials;
pub mod error;
pub mod session;

pub use audio::{AudioClip, AudioPlayback, CaptureSource, MicCapture, SpeakerSink};
pub use backend::{AssistantBackend, AssistantClient, SpokenReply, VoiceReply};
pub use config::Config;
pub use credentials::{CredentialStore, FileTokenStore, StaticToken};
pub use error::{Error, Result, ServiceStatus};
pub use session::{
    ConversationTurn, RecoveryPolicy, SessionController, SessionEvent, SessionOptions,
    SessionState, Speaker,
};

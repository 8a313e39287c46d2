//! Backend transport for the voice assistant
//!
//! The backend owns transcription, response generation, and speech synthesis;
//! this module consumes its three endpoints as an opaque contract. The
//! [`AssistantBackend`] trait is the seam the session controller talks
//! through, so tests can swap the HTTP client for an in-memory fake.

mod client;

pub use client::{AssistantClient, REQUEST_TIMEOUT};

use async_trait::async_trait;

use crate::audio::AudioClip;
use crate::Result;

/// One assistant utterance: display text plus decoded speech audio
#[derive(Debug, Clone)]
pub struct SpokenReply {
    /// What the assistant said, for the transcript
    pub text: String,
    /// Decoded audio bytes
    pub audio: Vec<u8>,
    /// MIME type of `audio`
    pub mime_type: String,
}

/// Reply to a voice query
///
/// The backend is the source of truth for what the user said; `transcript`
/// arrives with the reply rather than being known locally.
#[derive(Debug, Clone)]
pub struct VoiceReply {
    /// Backend's transcription of the uploaded clip
    pub transcript: String,
    /// Assistant response text
    pub response_text: String,
    /// Decoded response audio bytes
    pub audio: Vec<u8>,
    /// MIME type of `audio`
    pub mime_type: String,
}

/// Remote assistant service consumed by the session controller
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Fetch the per-session welcome utterance
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Service`] on any transport or backend failure
    async fn fetch_welcome(&self) -> Result<SpokenReply>;

    /// Transcribe a captured clip and generate the assistant's reply
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Service`] on any transport or backend failure
    async fn send_voice_query(&self, clip: &AudioClip) -> Result<VoiceReply>;

    /// Generate a reply to typed text, bypassing transcription
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Service`] on any transport or backend failure
    async fn send_text_query(&self, question: &str) -> Result<SpokenReply>;
}

//! HTTP client for the assistant backend

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{AssistantBackend, SpokenReply, VoiceReply};
use crate::audio::AudioClip;
use crate::credentials::CredentialStore;
use crate::{Error, Result, ServiceStatus};

/// Default client-side request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Context tag sent with text guidance queries
const GUIDANCE_CONTEXT: &str = "journaling_help";

/// Filename attached to uploaded clips
const CLIP_FILENAME: &str = "recording.wav";

/// Reqwest-backed client for the voice assistant endpoints
pub struct AssistantClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl AssistantClient {
    /// Create a client for the given backend base URL
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be constructed
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_timeout(base_url, credentials, REQUEST_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be constructed
    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Attach the bearer token when the credential store yields one
    ///
    /// A missing token is not a local error; the backend's 401 comes back
    /// through the normal service-error path instead.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.credentials.bearer_token() {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// Send a request and map transport/HTTP failures to [`Error::Service`]
    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Service {
                status: ServiceStatus::Http(status.as_u16()),
                detail,
            });
        }

        Ok(response)
    }

    /// Parse a 2xx body into the given wire type
    async fn parse<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| Error::Service {
            status: ServiceStatus::Rejected,
            detail: format!("malformed response body: {e}"),
        })
    }
}

#[async_trait]
impl AssistantBackend for AssistantClient {
    async fn fetch_welcome(&self) -> Result<SpokenReply> {
        let url = format!("{}/voice-assistant/welcome-simple", self.base_url);
        let request = self.authorize(self.client.get(&url));

        let response = self.execute(request).await?;
        let body: WelcomeResponse = Self::parse(response).await?;

        body.into_reply()
    }

    async fn send_voice_query(&self, clip: &AudioClip) -> Result<VoiceReply> {
        let part = Part::bytes(clip.data.clone())
            .file_name(CLIP_FILENAME)
            .mime_str(clip.mime_type)?;
        let form = Form::new().part("audio", part);

        let url = format!("{}/voice-assistant/voice-query", self.base_url);
        let request = self.authorize(self.client.post(&url)).multipart(form);

        let response = self.execute(request).await?;
        let body: VoiceQueryResponse = Self::parse(response).await?;

        body.into_reply()
    }

    async fn send_text_query(&self, question: &str) -> Result<SpokenReply> {
        let url = format!("{}/voice-assistant/guidance", self.base_url);
        let request = self.authorize(self.client.post(&url)).json(&GuidanceRequest {
            question,
            context: GUIDANCE_CONTEXT,
        });

        let response = self.execute(request).await?;
        let body: GuidanceResponse = Self::parse(response).await?;

        body.into_reply()
    }
}

#[derive(serde::Serialize)]
struct GuidanceRequest<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
struct WelcomeResponse {
    success: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    audio_data: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl WelcomeResponse {
    fn into_reply(self) -> Result<SpokenReply> {
        if !self.success {
            return Err(rejected(self.detail, "welcome generation failed"));
        }

        Ok(SpokenReply {
            text: self.text,
            audio: decode_reply_audio(&self.audio_data)?,
            mime_type: mime_or_default(self.content_type),
        })
    }
}

#[derive(Deserialize)]
struct VoiceQueryResponse {
    success: bool,
    #[serde(default)]
    user_transcription: String,
    #[serde(default)]
    assistant_response: String,
    #[serde(default)]
    audio_data: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl VoiceQueryResponse {
    fn into_reply(self) -> Result<VoiceReply> {
        if !self.success {
            return Err(rejected(self.detail, "voice query failed"));
        }

        Ok(VoiceReply {
            transcript: self.user_transcription,
            response_text: self.assistant_response,
            audio: decode_reply_audio(&self.audio_data)?,
            mime_type: mime_or_default(self.content_type),
        })
    }
}

#[derive(Deserialize)]
struct GuidanceResponse {
    success: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    audio_data: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

impl GuidanceResponse {
    fn into_reply(self) -> Result<SpokenReply> {
        if !self.success {
            return Err(rejected(self.detail, "guidance request failed"));
        }

        Ok(SpokenReply {
            text: self.text,
            audio: decode_reply_audio(&self.audio_data)?,
            mime_type: mime_or_default(self.content_type),
        })
    }
}

/// Service error for a 2xx response whose payload said `success: false`
fn rejected(detail: Option<String>, fallback: &str) -> Error {
    Error::Service {
        status: ServiceStatus::Rejected,
        detail: detail.unwrap_or_else(|| fallback.to_string()),
    }
}

/// Decode the base64 `audio_data` field into raw bytes
fn decode_reply_audio(audio_data: &str) -> Result<Vec<u8>> {
    if audio_data.is_empty() {
        return Ok(Vec::new());
    }

    base64::engine::general_purpose::STANDARD
        .decode(audio_data)
        .map_err(|e| Error::Service {
            status: ServiceStatus::Rejected,
            detail: format!("invalid base64 audio: {e}"),
        })
}

fn mime_or_default(content_type: Option<String>) -> String {
    content_type.unwrap_or_else(|| "audio/mpeg".to_string())
}

//! Configuration management for the voice assistant core

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionOptions;
use crate::Result;

/// Default backend base URL for local development
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Voice assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL
    pub api_base_url: String,

    /// Path to the bearer token file
    pub token_path: PathBuf,

    /// Client-side request timeout
    pub request_timeout: Duration,

    /// Play a welcome utterance when a session opens
    pub welcome_enabled: bool,

    /// Start sessions in continuous voice-to-voice mode
    pub voice_mode: bool,
}

impl Config {
    /// Load configuration with precedence env > TOML file > default
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for config sources that may
    /// grow validation
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();

        let api_base_url = std::env::var("PAUZ_API_URL")
            .ok()
            .or(fc.backend.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let token_path = std::env::var("PAUZ_TOKEN_FILE")
            .ok()
            .map(PathBuf::from)
            .or_else(|| fc.backend.token_file.map(PathBuf::from))
            .unwrap_or_else(default_token_path);

        let request_timeout = std::env::var("PAUZ_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.backend.request_timeout_secs)
            .map_or(crate::backend::REQUEST_TIMEOUT, Duration::from_secs);

        let welcome_enabled = std::env::var("PAUZ_WELCOME")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.session.welcome)
            .unwrap_or(true);

        let voice_mode = std::env::var("PAUZ_VOICE_MODE")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.session.voice_mode)
            .unwrap_or(true);

        Ok(Self {
            api_base_url,
            token_path,
            request_timeout,
            welcome_enabled,
            voice_mode,
        })
    }

    /// Session options derived from this configuration
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            welcome_enabled: self.welcome_enabled,
            voice_mode: self.voice_mode,
            ..SessionOptions::default()
        }
    }
}

/// Default token file path: `~/.config/pauz/token`
fn default_token_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/pauz/token"),
        |d| d.config_dir().join("pauz").join("token"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_follow_config() {
        let config = Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_path: PathBuf::from("/tmp/token"),
            request_timeout: Duration::from_secs(5),
            welcome_enabled: false,
            voice_mode: false,
        };

        let opts = config.session_options();
        assert!(!opts.welcome_enabled);
        assert!(!opts.voice_mode);
        assert_eq!(opts.max_recording, crate::audio::MAX_RECORDING);
    }
}

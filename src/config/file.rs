//! TOML configuration file loading
//!
//! Supports `~/.config/pauz/voice.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoiceConfigFile {
    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Session behavior settings
    #[serde(default)]
    pub session: SessionFileConfig,
}

/// Backend connection configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Backend base URL (e.g. "http://localhost:8000")
    pub api_base_url: Option<String>,

    /// Path to the bearer token file
    pub token_file: Option<String>,

    /// Client-side request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Session behavior configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Play a welcome utterance when a session opens
    pub welcome: Option<bool>,

    /// Start sessions in continuous voice-to-voice mode
    pub voice_mode: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoiceConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoiceConfigFile {
    let Some(path) = config_file_path() else {
        return VoiceConfigFile::default();
    };

    if !path.exists() {
        return VoiceConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoiceConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoiceConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/pauz/voice.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("pauz").join("voice.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let content = r#"
            [backend]
            api_base_url = "https://api.pauz.app"
            token_file = "/tmp/token"
            request_timeout_secs = 10

            [session]
            welcome = false
            voice_mode = false
        "#;

        let config: VoiceConfigFile = toml::from_str(content).unwrap();
        assert_eq!(
            config.backend.api_base_url.as_deref(),
            Some("https://api.pauz.app")
        );
        assert_eq!(config.backend.request_timeout_secs, Some(10));
        assert_eq!(config.session.welcome, Some(false));
        assert_eq!(config.session.voice_mode, Some(false));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config: VoiceConfigFile = toml::from_str("").unwrap();
        assert!(config.backend.api_base_url.is_none());
        assert!(config.session.welcome.is_none());
    }
}

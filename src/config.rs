//! Configuration for the Ibdaa studio
//!
//! Built exactly once at startup and passed by reference to the client; the
//! core never reads the environment after this point. A missing API key is a
//! fatal startup condition.

use secrecy::SecretString;

use crate::{Error, Result};

/// Default Gemini API base URL
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for chat replies
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

/// Default model for image edits
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Default model for speech synthesis
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default prebuilt TTS voice
pub const DEFAULT_TTS_VOICE: &str = "Zephyr";

/// Studio configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key (from `GEMINI_API_KEY` or `GOOGLE_API_KEY`)
    pub api_key: SecretString,

    /// Gemini API base URL, without trailing slash
    pub api_base: String,

    /// Model used for chat replies
    pub chat_model: String,

    /// Model used for image edits
    pub image_model: String,

    /// Model used for speech synthesis
    pub tts_model: String,

    /// Prebuilt voice name for speech synthesis
    pub tts_voice: String,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if no API key is set
    pub fn from_env() -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an injected variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if no API key is set
    pub fn resolve(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Config("GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string())
            })?;

        let api_base = get("GEMINI_API_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            chat_model: model_var(&get, "IBDAA_CHAT_MODEL", DEFAULT_CHAT_MODEL),
            image_model: model_var(&get, "IBDAA_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            tts_model: model_var(&get, "IBDAA_TTS_MODEL", DEFAULT_TTS_MODEL),
            tts_voice: model_var(&get, "IBDAA_TTS_VOICE", DEFAULT_TTS_VOICE),
        })
    }
}

fn model_var(get: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_fatal() {
        let result = Config::resolve(|_| None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn blank_api_key_is_fatal() {
        let result = Config::resolve(|name| match name {
            "GEMINI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn google_api_key_is_accepted_as_fallback() {
        let config = Config::resolve(|name| match name {
            "GOOGLE_API_KEY" => Some("test-key".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.tts_voice, DEFAULT_TTS_VOICE);
    }

    #[test]
    fn api_base_override_strips_trailing_slash() {
        let config = Config::resolve(|name| match name {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "GEMINI_API_BASE" => Some("http://localhost:9000/v1beta/".to_string()),
            "IBDAA_CHAT_MODEL" => Some("gemini-test".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.api_base, "http://localhost:9000/v1beta");
        assert_eq!(config.chat_model, "gemini-test");
    }
}

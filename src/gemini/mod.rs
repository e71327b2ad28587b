//! Gemini generative client
//!
//! Wraps the two logical calls the studio makes — multimodal image edits and
//! single-turn chat — plus speech synthesis for the voice output. This module
//! is the single error-normalization boundary: every upstream failure mode
//! (transport, quota, malformed response) collapses into one user-facing
//! message per operation. Callers only need to know "retry or not".

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::{Error, Result};

/// Fixed persona steering chat replies
const SYSTEM_INSTRUCTION: &str = "أنت مساعد ذكي وودود. أجب باللغة العربية.";

/// User-facing message when an image edit fails for any reason
pub const EDIT_FAILED: &str = "فشل تعديل الصورة. يرجى المحاولة مرة أخرى.";

/// User-facing message when a chat request fails for any reason
pub const CHAT_FAILED: &str = "فشل الحصول على رد. يرجى المحاولة مرة أخرى.";

/// Result of one image edit request
///
/// `image_data_url: None` means the request *succeeded* but the model
/// produced no usable image, which callers must treat differently from a
/// failed request.
#[derive(Debug, Clone, Default)]
pub struct EditOutcome {
    /// Edited image re-encoded as a data URL
    pub image_data_url: Option<String>,

    /// Text the model returned alongside (or instead of) the image
    pub note: Option<String>,
}

/// Seam between the flows and the generative service
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Edit an image according to a natural-language instruction
    ///
    /// # Errors
    ///
    /// Returns error if the underlying call fails for any reason
    async fn edit_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<EditOutcome>;

    /// Answer a single-turn prompt with the fixed assistant persona
    ///
    /// # Errors
    ///
    /// Returns error if the underlying call fails or returns no text
    async fn chat(&self, instruction: &str) -> Result<String>;
}

/// Client for the Gemini `generateContent` API
pub struct GeminiClient {
    http: reqwest::Client,
    config: Config,
}

impl GeminiClient {
    /// Create a new client from startup configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Synthesize speech for `text`
    ///
    /// # Returns
    ///
    /// Raw PCM audio (signed 16-bit little-endian, 24 kHz)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails or the response carries no audio
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = GenerateRequest {
            contents: vec![Content::user(vec![Part::text(text)])],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.tts_voice.clone(),
                        },
                    },
                }),
            }),
            system_instruction: None,
        };

        let response = self
            .generate(&self.config.tts_model, &request)
            .await
            .map_err(|e| Error::Speech(format!("synthesis request failed: {e}")))?;

        audio_bytes(&response)
            .ok_or_else(|| Error::Speech("synthesis response carried no audio".to_string()))
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/models/{model}:generateContent", self.config.api_base);
        tracing::debug!(model, "sending generate request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Upstream(format!("{status}: {body}")));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn edit_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<EditOutcome> {
        let request = GenerateRequest {
            contents: vec![Content::user(vec![
                Part::inline(mime_type, BASE64.encode(image)),
                Part::text(instruction),
            ])],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
                speech_config: None,
            }),
            system_instruction: None,
        };

        match self.generate(&self.config.image_model, &request).await {
            Ok(response) => Ok(edit_outcome(response)),
            Err(e) => {
                tracing::error!(error = %e, "image edit request failed");
                Err(Error::ImageEdit(EDIT_FAILED.to_string()))
            }
        }
    }

    async fn chat(&self, instruction: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::user(vec![Part::text(instruction)])],
            generation_config: None,
            system_instruction: Some(Content {
                role: None,
                parts: vec![Part::text(SYSTEM_INSTRUCTION)],
            }),
        };

        let response = match self.generate(&self.config.chat_model, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                return Err(Error::Chat(CHAT_FAILED.to_string()));
            }
        };

        reply_text(&response).ok_or_else(|| {
            tracing::error!("chat response carried no text");
            Error::Chat(CHAT_FAILED.to_string())
        })
    }
}

/// Scan response parts: first inline image and first text note win
fn edit_outcome(response: GenerateResponse) -> EditOutcome {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .map(|c| c.content.parts)
        .unwrap_or_default();

    let mut outcome = EditOutcome::default();
    for part in parts {
        if outcome.note.is_none() {
            if let Some(text) = part.text.as_ref().filter(|t| !t.is_empty()) {
                outcome.note = Some(text.clone());
            }
        }
        if outcome.image_data_url.is_none() {
            if let Some(inline) = part.inline_data.as_ref().filter(|i| !i.data.is_empty()) {
                outcome.image_data_url =
                    Some(format!("data:{};base64,{}", inline.mime_type, inline.data));
            }
        }
    }
    outcome
}

/// Concatenated text of the first candidate, or None when effectively empty
fn reply_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() { None } else { Some(text) }
}

/// First inline part of the response, base64-decoded
fn audio_bytes(response: &GenerateResponse) -> Option<Vec<u8>> {
    response
        .candidates
        .first()?
        .content
        .parts
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .and_then(|inline| BASE64.decode(&inline.data).ok())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn edit_outcome_extracts_first_image_and_note() {
        let response = response(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "قبل" },
                        { "inlineData": { "mimeType": "image/png", "data": "QUJD" } },
                        { "text": "بعد" },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "WFla" } },
                    ]
                }
            }]
        }));

        let outcome = edit_outcome(response);
        assert_eq!(
            outcome.image_data_url.as_deref(),
            Some("data:image/png;base64,QUJD")
        );
        assert_eq!(outcome.note.as_deref(), Some("قبل"));
    }

    #[test]
    fn edit_outcome_without_image_part_is_a_success() {
        let response = response(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "لا يمكنني فعل ذلك" }] }
            }]
        }));

        let outcome = edit_outcome(response);
        assert!(outcome.image_data_url.is_none());
        assert_eq!(outcome.note.as_deref(), Some("لا يمكنني فعل ذلك"));
    }

    #[test]
    fn edit_outcome_tolerates_empty_response() {
        let outcome = edit_outcome(response(serde_json::json!({})));
        assert!(outcome.image_data_url.is_none());
        assert!(outcome.note.is_none());
    }

    #[test]
    fn reply_text_concatenates_parts() {
        let response = response(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "أهلاً " }, { "text": "وسهلاً" }] }
            }]
        }));

        assert_eq!(reply_text(&response).as_deref(), Some("أهلاً وسهلاً"));
    }

    #[test]
    fn reply_text_rejects_blank_responses() {
        let response = response(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        }));

        assert!(reply_text(&response).is_none());
        assert!(reply_text(&GenerateResponse::default()).is_none());
    }

    #[test]
    fn audio_bytes_decodes_first_inline_part() {
        let response = response(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "inlineData": { "mimeType": "audio/L16;rate=24000", "data": "AAD/fw==" } }]
                }
            }]
        }));

        assert_eq!(audio_bytes(&response).unwrap(), vec![0x00, 0x00, 0xff, 0x7f]);
    }

    #[test]
    fn malformed_response_body_maps_to_serialization_error() {
        let err = serde_json::from_str::<GenerateResponse>("not json")
            .map_err(Error::from)
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn request_serializes_camel_case_wire_format() {
        let request = GenerateRequest {
            contents: vec![Content::user(vec![
                Part::inline("image/png", "QUJD".to_string()),
                Part::text("أضف قبعة"),
            ])],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
                speech_config: None,
            }),
            system_instruction: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        let part = &value["contents"][0]["parts"][0];
        assert_eq!(part["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            value["generationConfig"]["responseModalities"][0],
            "IMAGE"
        );
        assert!(value.get("systemInstruction").is_none());
    }
}

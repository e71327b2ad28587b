//! Image editor flow
//!
//! Owns the state of one load → edit → result cycle and drives the
//! generative backend. The session is fully replaced before a new image is
//! accepted, so no stale result or error ever carries over.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::gemini::GenerativeBackend;
use crate::{Error, Result};

/// Inline validation message when no image or prompt is present
pub const PROMPT_REQUIRED: &str = "يرجى رفع صورة وكتابة طلب التعديل.";

/// Message when the request succeeded but the model produced no image
pub const NO_IMAGE_PRODUCED: &str =
    "لم يتمكن الذكاء الاصطناعي من إنشاء صورة. قد يكون طلبك غير واضح.";

/// Fallback when a failed request carries no message of its own
pub const UNEXPECTED_ERROR: &str = "حدث خطأ غير متوقع.";

/// Derived state of the edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// No image loaded
    Empty,
    /// Image loaded, no edit yet
    Loaded,
    /// Edit request in flight
    Editing,
    /// Edited image available
    Edited,
    /// Last action left an error message
    Error,
}

/// Source image of the active session
struct SourceImage {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: String,
}

/// State machine over one edit session
#[derive(Default)]
pub struct EditorFlow {
    original: Option<SourceImage>,
    original_preview: Option<String>,
    edited_preview: Option<String>,
    note: Option<String>,
    prompt: String,
    loading: bool,
    error: Option<String>,
}

impl EditorFlow {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a new source image, clearing any prior session first
    ///
    /// The MIME type is derived from the file extension; anything outside
    /// the image picker's filter (png, jpeg, gif, webp) is rejected locally.
    ///
    /// # Errors
    ///
    /// Returns error if the file is not a supported image or cannot be read
    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        self.reset();

        let mime_type = mime_for_path(path).ok_or_else(|| {
            Error::Validation("not a supported image file (png, jpeg, gif, webp)".to_string())
        })?;
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image.png")
            .to_string();

        tracing::info!(file = %file_name, mime = %mime_type, size = bytes.len(), "image loaded");

        self.original_preview = Some(data_url(&mime_type, &bytes));
        self.original = Some(SourceImage {
            bytes,
            mime_type,
            file_name,
        });
        Ok(())
    }

    /// Set the edit instruction
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Run one edit request against the backend
    ///
    /// Guarded locally: with no image or a blank prompt, an inline
    /// validation error is set and no call is made. Outcomes:
    /// an image part yields `Edited`; a successful call without an image
    /// part yields an explanatory error; a failed call surfaces the
    /// call's own (already translated) message.
    pub async fn request_edit(&mut self, backend: &dyn GenerativeBackend) {
        let prompt_blank = self.prompt.trim().is_empty();
        let Some(image) = self.original.as_ref() else {
            self.error = Some(PROMPT_REQUIRED.to_string());
            return;
        };
        if prompt_blank {
            self.error = Some(PROMPT_REQUIRED.to_string());
            return;
        }

        self.loading = true;
        self.error = None;
        self.edited_preview = None;
        self.note = None;

        match backend
            .edit_image(&image.bytes, &image.mime_type, &self.prompt)
            .await
        {
            Ok(outcome) => {
                self.note = outcome.note;
                match outcome.image_data_url {
                    Some(url) => self.edited_preview = Some(url),
                    None => self.error = Some(NO_IMAGE_PRODUCED.to_string()),
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.error = Some(if message.is_empty() {
                    UNEXPECTED_ERROR.to_string()
                } else {
                    message
                });
            }
        }

        self.loading = false;
    }

    /// Clear the whole session back to `Empty`
    pub fn reset(&mut self) {
        *self = Self::default();
        tracing::debug!("editor session reset");
    }

    /// Save the edited image into `dir` as `edited-<original file name>`
    ///
    /// A no-op returning `Ok(None)` when there is no edited image.
    ///
    /// # Errors
    ///
    /// Returns error if the data URL is malformed or the file cannot be written
    pub fn save_edited(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(preview) = self.edited_preview.as_deref() else {
            return Ok(None);
        };

        let bytes = decode_data_url(preview)?;
        let name = self
            .original
            .as_ref()
            .map_or("image.png", |img| img.file_name.as_str());
        let path = dir.join(format!("edited-{name}"));
        fs::write(&path, bytes)?;

        tracing::info!(path = %path.display(), "edited image saved");
        Ok(Some(path))
    }

    /// Current derived state
    #[must_use]
    pub fn state(&self) -> EditorState {
        if self.loading {
            EditorState::Editing
        } else if self.error.is_some() {
            EditorState::Error
        } else if self.edited_preview.is_some() {
            EditorState::Edited
        } else if self.original.is_some() {
            EditorState::Loaded
        } else {
            EditorState::Empty
        }
    }

    /// Data URL preview of the source image
    #[must_use]
    pub fn original_preview(&self) -> Option<&str> {
        self.original_preview.as_deref()
    }

    /// Data URL of the edited image
    #[must_use]
    pub fn edited_preview(&self) -> Option<&str> {
        self.edited_preview.as_deref()
    }

    /// Text the model returned with the last edit
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Current edit instruction
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Error message from the last action, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether an edit request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// Extension-based MIME derivation, the picker filter's analog
fn mime_for_path(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .ok_or_else(|| Error::Validation("malformed image data URL".to_string()))?;
    Ok(BASE64.decode(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_derivation_follows_picker_filter() {
        assert_eq!(
            mime_for_path(Path::new("a/photo.PNG")).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            mime_for_path(Path::new("photo.jpeg")).as_deref(),
            Some("image/jpeg")
        );
        assert!(mime_for_path(Path::new("notes.txt")).is_none());
        assert!(mime_for_path(Path::new("no-extension")).is_none());
    }

    #[test]
    fn data_url_round_trip() {
        let url = data_url("image/png", &[1, 2, 3, 255]);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), vec![1, 2, 3, 255]);
    }

    #[test]
    fn decode_rejects_plain_strings() {
        assert!(decode_data_url("not a data url").is_err());
    }

    #[test]
    fn fresh_session_is_empty() {
        let editor = EditorFlow::new();
        assert_eq!(editor.state(), EditorState::Empty);
        assert!(editor.original_preview().is_none());
        assert!(!editor.is_loading());
    }
}

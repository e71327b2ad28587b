//! Shared test stubs for the flows
//!
//! The flows talk to the generative service and the speech output through
//! traits, so tests script both seams without network or audio hardware.

use std::sync::Mutex;

use async_trait::async_trait;
use ibdaa::gemini::{CHAT_FAILED, EDIT_FAILED};
use ibdaa::{EditOutcome, Error, GenerativeBackend, Result, SpeechSink};

/// Scripted chat behavior
pub enum ChatScript {
    Reply(String),
    Fail,
}

/// Scripted image edit behavior
pub enum EditScript {
    Image {
        data_url: String,
        note: Option<String>,
    },
    NoImage,
    Fail,
}

/// Generative backend returning scripted outcomes and counting calls
pub struct StubBackend {
    chat: ChatScript,
    edit: EditScript,
    calls: Mutex<usize>,
}

impl StubBackend {
    #[must_use]
    pub fn chat_ok(reply: &str) -> Self {
        Self::new(ChatScript::Reply(reply.to_string()), EditScript::NoImage)
    }

    #[must_use]
    pub fn chat_fail() -> Self {
        Self::new(ChatScript::Fail, EditScript::NoImage)
    }

    #[must_use]
    pub fn edit_ok(data_url: &str, note: Option<&str>) -> Self {
        Self::new(
            ChatScript::Fail,
            EditScript::Image {
                data_url: data_url.to_string(),
                note: note.map(str::to_string),
            },
        )
    }

    #[must_use]
    pub fn edit_none() -> Self {
        Self::new(ChatScript::Fail, EditScript::NoImage)
    }

    #[must_use]
    pub fn edit_fail() -> Self {
        Self::new(ChatScript::Fail, EditScript::Fail)
    }

    fn new(chat: ChatScript, edit: EditScript) -> Self {
        Self {
            chat,
            edit,
            calls: Mutex::new(0),
        }
    }

    /// Number of backend calls the flows actually made
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl GenerativeBackend for StubBackend {
    async fn edit_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<EditOutcome> {
        *self.calls.lock().unwrap() += 1;
        match &self.edit {
            EditScript::Image { data_url, note } => Ok(EditOutcome {
                image_data_url: Some(data_url.clone()),
                note: note.clone(),
            }),
            EditScript::NoImage => Ok(EditOutcome::default()),
            EditScript::Fail => Err(Error::ImageEdit(EDIT_FAILED.to_string())),
        }
    }

    async fn chat(&self, _instruction: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        match &self.chat {
            ChatScript::Reply(reply) => Ok(reply.clone()),
            ChatScript::Fail => Err(Error::Chat(CHAT_FAILED.to_string())),
        }
    }
}

/// Speech sink recording every utterance
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    cancelled: Mutex<bool>,
}

impl RecordingSpeech {
    /// Everything spoken so far, in order
    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap()
    }
}

impl SpeechSink for RecordingSpeech {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    fn cancel(&self) {
        *self.cancelled.lock().unwrap() = true;
    }

    fn is_speaking(&self) -> bool {
        false
    }
}

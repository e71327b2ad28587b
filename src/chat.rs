//! Chat flow
//!
//! Keeps the append-only transcript and drives the speech output: every AI
//! entry — the seeded greeting and apology fallbacks included — is spoken as
//! it lands. Chat failures never block the conversation; they become one
//! more transcript entry.

use std::sync::Arc;

use crate::gemini::GenerativeBackend;
use crate::voice::SpeechSink;

/// Greeting seeding every new transcript
pub const GREETING: &str = "أهلاً بك! كيف يمكنني مساعدتك اليوم؟";

/// Apology appended in place of a reply when the request fails
pub const APOLOGY: &str = "عذراً، حدث خطأ ما. يرجى المحاولة مرة أخرى.";

/// Who authored a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Ai,
}

/// One immutable transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
}

/// State machine over one running conversation
pub struct ChatFlow {
    transcript: Vec<ChatMessage>,
    loading: bool,
    speech: Arc<dyn SpeechSink>,
}

impl ChatFlow {
    /// Create a conversation seeded with the spoken greeting
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechSink>) -> Self {
        let mut flow = Self {
            transcript: Vec::new(),
            loading: false,
            speech,
        };
        flow.push_ai(GREETING.to_string());
        flow
    }

    /// Submit one user message
    ///
    /// Blank input and in-flight requests are rejected locally with no
    /// transcript growth and no call. The user message is appended before
    /// the call resolves; completion only ever appends further, never
    /// rewrites history.
    pub async fn submit(&mut self, backend: &dyn GenerativeBackend, input: &str) {
        if input.trim().is_empty() || self.loading {
            tracing::debug!("chat submit rejected: blank input or request in flight");
            return;
        }

        self.transcript.push(ChatMessage {
            sender: Sender::User,
            text: input.to_string(),
        });
        self.loading = true;

        match backend.chat(input).await {
            Ok(reply) => self.push_ai(reply),
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.push_ai(APOLOGY.to_string());
            }
        }

        self.loading = false;
    }

    /// Re-speak an AI transcript entry; no-op for user entries
    pub fn speak_message(&self, index: usize) {
        if let Some(message) = self.transcript.get(index) {
            if message.sender == Sender::Ai {
                self.speech.speak(&message.text);
            }
        }
    }

    /// Full transcript in display order
    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Most recent transcript entry
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.transcript.last()
    }

    /// Whether a request is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn push_ai(&mut self, text: String) {
        self.speech.speak(&text);
        self.transcript.push(ChatMessage {
            sender: Sender::Ai,
            text,
        });
    }
}

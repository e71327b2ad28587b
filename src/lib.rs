//! Ibdaa Studio - AI image editing and Arabic voice chat over Gemini
//!
//! The studio is a thin orchestration layer over the Gemini API:
//! two independent flows own their feature's state machine and share a
//! single generative client, and the chat flow speaks its replies aloud.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Shell (CLI)                   │
//! │     editor commands    │    chat input        │
//! └──────────┬─────────────┴──────────┬──────────┘
//!            │                        │
//! ┌──────────▼─────────┐   ┌──────────▼──────────┐
//! │    Editor flow      │   │     Chat flow       │
//! │  one edit session   │   │  transcript + TTS   │
//! └──────────┬─────────┘   └───────┬───────┬─────┘
//!            │                     │       │
//! ┌──────────▼─────────────────────▼──┐ ┌──▼──────────┐
//! │          Gemini client            │ │Speech output│
//! │  image edit │ chat │ synthesis    │ │ (cpal, 24k) │
//! └───────────────────────────────────┘ └─────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod editor;
pub mod error;
pub mod gemini;
pub mod voice;

pub use chat::{ChatFlow, ChatMessage, Sender};
pub use config::Config;
pub use editor::{EditorFlow, EditorState};
pub use error::{Error, Result};
pub use gemini::{EditOutcome, GeminiClient, GenerativeBackend};
pub use voice::{SpeechOutput, SpeechSink};

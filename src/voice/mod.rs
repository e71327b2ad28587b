//! Speech output
//!
//! Synthesizes AI replies through the Gemini TTS model and plays them on the
//! default output device. Playback is single-slot: starting new speech always
//! interrupts whatever is playing, so at most one utterance is audible and
//! the newest wins.

mod playback;

pub use playback::AudioPlayback;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::gemini::GeminiClient;

/// Seam between the chat flow and spoken output
pub trait SpeechSink: Send + Sync {
    /// Speak `text`, interrupting any current utterance
    fn speak(&self, text: &str);

    /// Stop playback immediately
    fn cancel(&self);

    /// Whether the most recent utterance is currently playing
    fn is_speaking(&self) -> bool;
}

/// Speech output over Gemini TTS and the default audio device
pub struct SpeechOutput {
    client: Arc<GeminiClient>,
    playback: Option<Arc<AudioPlayback>>,
    speaking: Arc<AtomicBool>,
    /// Interrupt flag of the utterance currently holding the slot
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl SpeechOutput {
    /// Create a speech output, probing the default output device
    ///
    /// Without a usable device the adapter still constructs, but every
    /// `speak` becomes a logged no-op.
    #[must_use]
    pub fn new(client: Arc<GeminiClient>) -> Self {
        let playback = match AudioPlayback::new() {
            Ok(playback) => Some(Arc::new(playback)),
            Err(e) => {
                tracing::warn!(error = %e, "audio output unavailable, speech disabled");
                None
            }
        };
        Self::with_playback(client, playback)
    }

    /// Create a speech output with playback explicitly disabled
    #[must_use]
    pub fn disabled(client: Arc<GeminiClient>) -> Self {
        Self::with_playback(client, None)
    }

    fn with_playback(client: Arc<GeminiClient>, playback: Option<Arc<AudioPlayback>>) -> Self {
        Self {
            client,
            playback,
            speaking: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Whether an output device was found and speech will actually play
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.playback.is_some()
    }

    /// Claim the playback slot, interrupting the previous holder
    fn begin_utterance(&self) -> Arc<AtomicBool> {
        let interrupt = Arc::new(AtomicBool::new(false));
        let previous = self
            .current
            .lock()
            .unwrap()
            .replace(Arc::clone(&interrupt));
        if let Some(previous) = previous {
            previous.store(true, Ordering::SeqCst);
        }
        interrupt
    }
}

impl SpeechSink for SpeechOutput {
    fn speak(&self, text: &str) {
        let Some(playback) = self.playback.as_ref() else {
            tracing::warn!("speech output unavailable, skipping utterance");
            return;
        };

        let interrupt = self.begin_utterance();
        let client = Arc::clone(&self.client);
        let playback = Arc::clone(playback);
        let speaking = Arc::clone(&self.speaking);
        let text = text.to_string();

        tokio::spawn(async move {
            let audio = match client.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed");
                    // A dying slot holder must not leave the flag raised
                    release_slot(&speaking, &interrupt);
                    return;
                }
            };
            if interrupt.load(Ordering::SeqCst) {
                return;
            }

            speaking.store(true, Ordering::SeqCst);
            let flag = Arc::clone(&interrupt);
            let played =
                tokio::task::spawn_blocking(move || playback.play_pcm(&audio, &flag)).await;
            match played {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "speech playback failed"),
                Err(e) => tracing::warn!(error = %e, "speech playback task failed"),
            }

            release_slot(&speaking, &interrupt);
        });
    }

    fn cancel(&self) {
        if let Some(current) = self.current.lock().unwrap().take() {
            current.store(true, Ordering::SeqCst);
        }
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

/// Clear the speaking flag when a finishing utterance still holds the slot
///
/// An interrupted utterance no longer owns the flag, so it leaves it alone;
/// everyone else — normal end, playback failure, synthesis failure — must
/// lower it on the way out.
fn release_slot(speaking: &AtomicBool, interrupt: &AtomicBool) {
    if !interrupt.load(Ordering::SeqCst) {
        speaking.store(false, Ordering::SeqCst);
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        // Teardown must not leave orphaned audio behind
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_client() -> Arc<GeminiClient> {
        let config = Config::resolve(|name| match name {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(GeminiClient::new(config))
    }

    #[test]
    fn newest_utterance_interrupts_previous() {
        let speech = SpeechOutput::disabled(test_client());

        let first = speech.begin_utterance();
        let second = speech.begin_utterance();

        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_interrupts_and_clears_flag() {
        let speech = SpeechOutput::disabled(test_client());

        let utterance = speech.begin_utterance();
        speech.speaking.store(true, Ordering::SeqCst);
        speech.cancel();

        assert!(utterance.load(Ordering::SeqCst));
        assert!(!speech.is_speaking());
    }

    #[test]
    fn failed_slot_holder_still_clears_speaking_flag() {
        let speech = SpeechOutput::disabled(test_client());

        // First utterance is playing when a second claims the slot and dies
        // before playback (synthesis failure)
        let first = speech.begin_utterance();
        speech.speaking.store(true, Ordering::SeqCst);
        let second = speech.begin_utterance();
        release_slot(&speech.speaking, &second);

        assert!(first.load(Ordering::SeqCst));
        assert!(!speech.is_speaking());

        // The interrupted first utterance winds down later and must not
        // touch a flag it no longer owns
        speech.speaking.store(true, Ordering::SeqCst);
        release_slot(&speech.speaking, &first);
        assert!(speech.is_speaking());
    }

    #[test]
    fn disabled_output_ignores_speak() {
        let speech = SpeechOutput::disabled(test_client());
        assert!(!speech.is_enabled());
        speech.speak("أهلاً");
        assert!(!speech.is_speaking());
        assert!(speech.current.lock().unwrap().is_none());
    }
}

//! Speech primitives the collection engine is written against.
//!
//! `speak` and `listen` are single-resolution suspending operations. Concrete
//! implementations live in [`crate::voice_output`] and [`crate::listener`];
//! tests drive the engine with scripted implementations.

use crate::error::VoiceResult;
use async_trait::async_trait;
use tracing::info;

/// Text-to-speech output. At most one utterance is audible at a time.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` and resolve once playback has finished (or was cancelled).
    async fn speak(&self, text: &str) -> VoiceResult<()>;

    /// Silence any in-flight utterance. Idempotent.
    fn cancel(&self);
}

/// Single-shot speech capture.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture one utterance and resolve with the best transcript.
    ///
    /// Fails when capture is unavailable or the capture session reports an
    /// error (no speech, device lost, stopped).
    async fn listen(&self) -> VoiceResult<String>;

    /// Stop an in-flight capture; the pending `listen` resolves with an error.
    fn stop(&self) {}
}

/// Synthesizer for hosts without audio output: narration goes to the log.
#[derive(Debug, Default)]
pub struct PrintedSpeech;

#[async_trait]
impl SpeechSynthesizer for PrintedSpeech {
    async fn speak(&self, text: &str) -> VoiceResult<()> {
        info!(target: "kiosk::voice", "🔊 {}", text);
        Ok(())
    }

    fn cancel(&self) {}
}

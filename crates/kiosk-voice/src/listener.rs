//! Microphone-backed `SpeechRecognizer`: one Ear capture, then STT.

use crate::ear::VoiceEar;
use crate::error::{VoiceError, VoiceResult};
use crate::speech::SpeechRecognizer;
use crate::stt::SttBackend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct MicrophoneRecognizer {
    ear: VoiceEar,
    stt: Arc<dyn SttBackend>,
    stop: Arc<AtomicBool>,
}

impl MicrophoneRecognizer {
    pub fn new(ear: VoiceEar, stt: Arc<dyn SttBackend>) -> Self {
        Self {
            ear,
            stt,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn listen(&self) -> VoiceResult<String> {
        self.stop.store(false, Ordering::SeqCst);
        let ear = self.ear.clone();
        let stop = Arc::clone(&self.stop);

        // cpal streams are !Send; the whole capture lives on one blocking thread.
        let utterance =
            tokio::task::spawn_blocking(move || ear.capture_utterance(&stop)).await??;

        if self.stop.load(Ordering::SeqCst) {
            return Err(VoiceError::Aborted);
        }
        let text = self.stt.transcribe(&utterance).await?;
        if text.is_empty() {
            debug!("Transcription came back empty");
        } else {
            info!("Recognized: {}", text);
        }
        Ok(text)
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

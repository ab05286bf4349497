//! **VoiceOutput**: TTS synthesis and playback for spoken prompts.
//!
//! The rodio `OutputStream` is !Send on some platforms, so it lives on a
//! dedicated output thread; only the (Send) stream handle and per-utterance
//! sinks are shared. Each utterance gets a fresh `Sink`, and starting a new
//! one stops the previous one, so at most one prompt is audible.

use crate::error::{VoiceError, VoiceResult};
use crate::speech::SpeechSynthesizer;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Backend that turns text into encoded audio (WAV/MP3).
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text`. An empty vec means nothing to play.
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// OpenAI-compatible speech endpoint (`/audio/speech`).
/// Uses `TTS_API_URL` (default https://api.openai.com/v1), `TTS_API_KEY`, `TTS_MODEL` (tts-1) and `TTS_VOICE` (nova).
#[derive(Debug, Clone)]
pub struct HttpTts {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
    client: reqwest::Client,
}

impl HttpTts {
    /// Build from environment: TTS_API_URL, TTS_API_KEY, TTS_MODEL, TTS_VOICE.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_KEY".to_string()))?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "nova".to_string());
        Self::new(base_url, api_key, model, voice)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }
}

#[async_trait]
impl TtsBackend for HttpTts {
    async fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Playback of encoded audio on the default output device.
pub struct VoiceOutput {
    handle: OutputStreamHandle,
    current: Mutex<Option<Arc<Sink>>>,
    // Dropping this ends the output thread and closes the device.
    _shutdown: mpsc::Sender<()>,
}

impl VoiceOutput {
    /// Open the default output device on a dedicated thread.
    pub fn new() -> VoiceResult<Self> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputStreamHandle, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("kiosk-audio-out".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Blocks until the owning VoiceOutput is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;

        let handle = ready_rx
            .recv()
            .map_err(|e| VoiceError::Playback(e.to_string()))?
            .map_err(VoiceError::Playback)?;
        info!("VoiceOutput: output device ready");

        Ok(Self {
            handle,
            current: Mutex::new(None),
            _shutdown: shutdown_tx,
        })
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<Arc<Sink>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Play encoded audio and wait until it finishes or is stopped.
    pub async fn play(&self, bytes: Vec<u8>) -> VoiceResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
        let sink = Arc::new(
            Sink::try_new(&self.handle).map_err(|e| VoiceError::Playback(e.to_string()))?,
        );
        sink.append(source);

        if let Some(previous) = self.current().replace(Arc::clone(&sink)) {
            previous.stop();
        }

        let waiter = Arc::clone(&sink);
        tokio::task::spawn_blocking(move || waiter.sleep_until_end())
            .await
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        let mut current = self.current();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &sink)) {
            *current = None;
        }
        Ok(())
    }

    /// Stop the current utterance, if any.
    pub fn stop(&self) {
        if let Some(sink) = self.current().take() {
            sink.stop();
            debug!("VoiceOutput: stopped");
        }
    }
}

/// `SpeechSynthesizer` backed by a TTS backend and local playback.
pub struct SpokenOutput {
    tts: Arc<dyn TtsBackend>,
    output: VoiceOutput,
    generation: AtomicU64,
}

impl SpokenOutput {
    pub fn new(tts: Arc<dyn TtsBackend>, output: VoiceOutput) -> Self {
        Self {
            tts,
            output,
            generation: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SpokenOutput {
    async fn speak(&self, text: &str) -> VoiceResult<()> {
        self.output.stop();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let audio = self.tts.synthesize(text).await?;
        // Cancelled or superseded while synthesizing.
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(());
        }
        self.output.play(audio).await
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.output.stop();
    }
}

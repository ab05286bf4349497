//! **The Ear**: single-shot microphone capture with local VAD endpointing.
//!
//! Captures mono PCM via CPAL, classifies 30ms chunks with WebRTC VAD and
//! ends the utterance once an 800ms gap follows speech. A session that hears
//! nothing within its window ends with `VoiceError::NoSpeech`. All of this is
//! blocking device work; callers run it on a blocking thread.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Configuration for a capture session.
#[derive(Debug, Clone)]
pub struct EarConfig {
    /// Sample rate (default 16000). Must be 8000/16000/32000/48000 for WebRTC VAD.
    pub sample_rate: u32,
    /// WebRTC VAD aggressiveness, 0-3 (default 2).
    pub vad_mode: u8,
    /// Silence after speech that ends the utterance (default 800ms).
    pub gap_ms: u64,
    /// Speech shorter than this is treated as noise (default 200ms).
    pub min_speech_ms: u64,
    /// Session window for speech to begin (default 8s).
    pub no_speech_timeout_ms: u64,
    /// Hard cap on one utterance (default 15s).
    pub max_utterance_ms: u64,
}

impl Default for EarConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            vad_mode: 2,
            gap_ms: 800,
            min_speech_ms: 200,
            no_speech_timeout_ms: 8_000,
            max_utterance_ms: 15_000,
        }
    }
}

impl EarConfig {
    /// Samples per 30ms VAD chunk.
    pub fn chunk_size(&self) -> usize {
        (self.sample_rate as usize * CHUNK_MS as usize) / 1000
    }
}

const CHUNK_MS: u64 = 30;

/// One captured utterance.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// PCM samples (f32, -1.0..1.0) from speech start to end of gap.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Approximate speech duration.
    pub duration: Duration,
}

/// What the endpointer decided after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Continue,
    Complete,
    NoSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Speech,
    Trailing,
}

/// Utterance endpointing over per-chunk speech/silence decisions.
///
/// Waiting → Speech → Trailing → (gap reached) → Complete. Speech that is
/// too short when the gap closes is discarded and waiting resumes.
#[derive(Debug)]
pub struct Endpointer {
    chunk_ms: u64,
    gap_ms: u64,
    min_speech_ms: u64,
    no_speech_ms: u64,
    max_ms: u64,
    phase: Phase,
    elapsed_ms: u64,
    speech_ms: u64,
    utterance_ms: u64,
    silence_ms: u64,
}

impl Endpointer {
    pub fn new(config: &EarConfig) -> Self {
        Self {
            chunk_ms: CHUNK_MS,
            gap_ms: config.gap_ms,
            min_speech_ms: config.min_speech_ms,
            no_speech_ms: config.no_speech_timeout_ms,
            max_ms: config.max_utterance_ms,
            phase: Phase::Waiting,
            elapsed_ms: 0,
            speech_ms: 0,
            utterance_ms: 0,
            silence_ms: 0,
        }
    }

    /// True while audio should be buffered into the utterance.
    pub fn in_utterance(&self) -> bool {
        self.phase != Phase::Waiting
    }

    pub fn speech_duration(&self) -> Duration {
        Duration::from_millis(self.speech_ms)
    }

    pub fn push(&mut self, is_speech: bool) -> Endpoint {
        self.elapsed_ms += self.chunk_ms;
        match (self.phase, is_speech) {
            (Phase::Waiting, true) => {
                self.phase = Phase::Speech;
                self.speech_ms = self.chunk_ms;
                self.utterance_ms = self.chunk_ms;
                self.silence_ms = 0;
            }
            (Phase::Waiting, false) => {
                if self.elapsed_ms >= self.no_speech_ms {
                    return Endpoint::NoSpeech;
                }
                return Endpoint::Continue;
            }
            (Phase::Speech, true) | (Phase::Trailing, true) => {
                self.phase = Phase::Speech;
                self.speech_ms += self.chunk_ms;
                self.utterance_ms += self.chunk_ms;
                self.silence_ms = 0;
            }
            (Phase::Speech, false) | (Phase::Trailing, false) => {
                self.phase = Phase::Trailing;
                self.silence_ms += self.chunk_ms;
                self.utterance_ms += self.chunk_ms;
                if self.silence_ms >= self.gap_ms {
                    if self.speech_ms >= self.min_speech_ms {
                        return Endpoint::Complete;
                    }
                    debug!("Ear: speech too short ({}ms), ignoring", self.speech_ms);
                    self.phase = Phase::Waiting;
                    self.speech_ms = 0;
                    self.utterance_ms = 0;
                    self.silence_ms = 0;
                    if self.elapsed_ms >= self.no_speech_ms {
                        return Endpoint::NoSpeech;
                    }
                    return Endpoint::Continue;
                }
            }
        }
        if self.utterance_ms >= self.max_ms {
            warn!("Ear: max utterance duration reached, committing");
            return Endpoint::Complete;
        }
        Endpoint::Continue
    }
}

/// WebRTC VAD wrapper; f32 chunks in, speech/silence out.
struct SpeechGate {
    vad: Vad,
    chunk_size: usize,
}

impl SpeechGate {
    fn new(config: &EarConfig) -> VoiceResult<Self> {
        let sample_rate = match config.sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            32000 => SampleRate::Rate32kHz,
            48000 => SampleRate::Rate48kHz,
            other => {
                return Err(VoiceError::VadInit(format!(
                    "WebRTC VAD only supports 8000, 16000, 32000, or 48000 Hz, got {}",
                    other
                )))
            }
        };
        let mode = match config.vad_mode {
            0 => VadMode::Quality,
            1 => VadMode::LowBitrate,
            2 => VadMode::Aggressive,
            3 => VadMode::VeryAggressive,
            other => {
                return Err(VoiceError::VadInit(format!(
                    "VAD mode must be 0-3, got {}",
                    other
                )))
            }
        };
        let mut vad = Vad::new();
        vad.set_mode(mode);
        vad.set_sample_rate(sample_rate);
        Ok(Self {
            vad,
            chunk_size: config.chunk_size(),
        })
    }

    fn is_speech(&mut self, chunk: &[f32]) -> VoiceResult<bool> {
        let pcm: Vec<i16> = chunk
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();
        self.vad
            .is_voice_segment(&pcm)
            .map_err(|e| VoiceError::VadProcessing(format!("{:?}", e)))
    }
}

enum CaptureMsg {
    Samples(Vec<f32>),
    Failed(String),
}

/// Microphone capture for one utterance at a time.
#[derive(Debug, Clone)]
pub struct VoiceEar {
    config: EarConfig,
}

impl VoiceEar {
    pub fn new(config: EarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EarConfig {
        &self.config
    }

    /// Names of available input devices.
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let devices = cpal::default_host().input_devices()?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Capture a single utterance. Blocks until the utterance ends, the
    /// session window closes, the stream fails or `stop` is raised.
    ///
    /// The input stream is dropped (device released) before returning.
    pub fn capture_utterance(&self, stop: &AtomicBool) -> VoiceResult<Utterance> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::Unavailable("No input device available".to_string()))?;
        debug!(
            "Ear: using input device {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut gate = SpeechGate::new(&self.config)?;
        let mut endpointer = Endpointer::new(&self.config);
        let (tx, rx) = mpsc::channel::<CaptureMsg>();
        let err_tx = tx.clone();

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(CaptureMsg::Samples(data.to_vec()));
            },
            move |err| {
                let _ = err_tx.send(CaptureMsg::Failed(err.to_string()));
            },
            None,
        )?;
        stream.play()?;
        info!("🎤 Ear: listening");

        let wall_limit = Duration::from_millis(
            self.config.no_speech_timeout_ms + self.config.max_utterance_ms,
        );
        let started = Instant::now();
        let chunk_size = gate.chunk_size;
        let mut pending: Vec<f32> = Vec::with_capacity(chunk_size * 2);
        let mut utterance: Vec<f32> = Vec::new();

        loop {
            if stop.load(Ordering::SeqCst) {
                return Err(VoiceError::Aborted);
            }
            if started.elapsed() > wall_limit {
                return Err(VoiceError::NoSpeech);
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(CaptureMsg::Samples(samples)) => pending.extend_from_slice(&samples),
                Ok(CaptureMsg::Failed(e)) => return Err(VoiceError::AudioStream(e)),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(VoiceError::AudioStream("input stream closed".to_string()))
                }
            }

            while pending.len() >= chunk_size {
                let chunk: Vec<f32> = pending.drain(..chunk_size).collect();
                let is_speech = gate.is_speech(&chunk)?;
                let decision = endpointer.push(is_speech);
                if endpointer.in_utterance() || decision == Endpoint::Complete {
                    utterance.extend_from_slice(&chunk);
                } else {
                    utterance.clear();
                }
                match decision {
                    Endpoint::Continue => {}
                    Endpoint::NoSpeech => {
                        info!("Ear: no speech detected");
                        return Err(VoiceError::NoSpeech);
                    }
                    Endpoint::Complete => {
                        drop(stream);
                        let duration = endpointer.speech_duration();
                        info!(
                            "🎯 Ear: utterance committed ({:?} speech, {} samples)",
                            duration,
                            utterance.len()
                        );
                        return Ok(Utterance {
                            samples: utterance,
                            sample_rate: self.config.sample_rate,
                            duration,
                        });
                    }
                }
            }
        }
    }
}

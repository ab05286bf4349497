//! # Kiosk Voice - spoken data collection for face enrollment
//!
//! Fills a sequence of template fields through spoken prompts and spoken
//! answers, with bounded retries per field and an abort vocabulary that
//! cancels the whole collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      VoiceCollector                          │
//! │   prompt ──► SpeechSynthesizer        SpeechRecognizer ◄──┐  │
//! │              (SpokenOutput: TTS +     (MicrophoneRecognizer│  │
//! │               rodio sink)              Ear + VAD + STT)    │  │
//! │                    │                                       │  │
//! │                    ▼                                       │  │
//! │   validation: abort keywords, type checks, digit runs ─────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod collector;
pub mod ear;
pub mod error;
pub mod field;
pub mod listener;
pub mod speech;
pub mod stt;
pub mod validation;
pub mod voice_output;

pub use collector::{CollectorConfig, CollectorPhrases, FieldOutcome, VoiceCollector};
pub use ear::{EarConfig, Endpoint, Endpointer, Utterance, VoiceEar};
pub use error::{VoiceError, VoiceResult};
pub use field::{CollectedData, FieldDescriptor, FieldType, NOT_PROVIDED};
pub use listener::MicrophoneRecognizer;
pub use speech::{PrintedSpeech, SpeechRecognizer, SpeechSynthesizer};
pub use stt::{HttpStt, SttBackend};
pub use voice_output::{HttpTts, SpokenOutput, TtsBackend, VoiceOutput};

//! Voice Collector - sequential spoken question/answer over a set of typed fields
//!
//! Each field is prompted, answered and validated with a bounded number of
//! attempts. An abort keyword anywhere in an answer cancels the whole
//! collection; every other failure degrades to the `"Not provided"` sentinel.

use crate::field::{CollectedData, FieldDescriptor, NOT_PROVIDED};
use crate::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::validation::{is_abort_command, normalize_value, validate_response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed narration used by the collector.
#[derive(Debug, Clone)]
pub struct CollectorPhrases {
    pub instructions: String,
    pub cancelled: String,
    pub complete: String,
    pub not_caught: String,
}

impl Default for CollectorPhrases {
    fn default() -> Self {
        Self {
            instructions: "Please answer the following questions. You can say stop or quit at any time to cancel."
                .to_string(),
            cancelled: "Data collection cancelled".to_string(),
            complete: "Thank you. Data collection complete.".to_string(),
            not_caught: "I didn't catch that. Please repeat.".to_string(),
        }
    }
}

impl CollectorPhrases {
    /// Correction spoken after an answer fails type validation.
    pub fn invalid(&self, field_type: &str) -> String {
        format!("Invalid {}. Please try again.", field_type)
    }
}

/// Configuration for the voice collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Attempts per field before falling back to the sentinel (default: 3)
    pub max_attempts: u32,

    /// Pause between the end of a prompt and the start of listening (default: 500ms)
    pub listen_delay: Duration,

    pub phrases: CollectorPhrases,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            listen_delay: Duration::from_millis(500),
            phrases: CollectorPhrases::default(),
        }
    }
}

/// Result of collecting a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// A valid raw transcript.
    Collected(String),
    /// Attempts exhausted.
    NotCollected,
    /// The user spoke an abort keyword.
    Abort,
}

/// Drives speak/listen exchanges to fill a sequence of fields.
///
/// Holds no state between calls beyond its speech handles; `silence()`
/// releases both output and capture.
pub struct VoiceCollector {
    config: CollectorConfig,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl VoiceCollector {
    pub fn new(
        config: CollectorConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            config,
            synthesizer,
            recognizer,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Speak `text`, replacing any in-flight utterance. Never fails.
    pub async fn say(&self, text: &str) {
        self.synthesizer.cancel();
        if let Err(e) = self.synthesizer.speak(text).await {
            warn!("Narration failed ({}): {}", text, e);
        }
    }

    /// Stop speaking and listening immediately.
    pub fn silence(&self) {
        self.synthesizer.cancel();
        self.recognizer.stop();
    }

    /// Collect one field using the configured number of attempts.
    pub async fn collect_field(&self, field: &FieldDescriptor) -> FieldOutcome {
        self.collect_field_with_attempts(field, self.config.max_attempts)
            .await
    }

    /// Collect one field with an explicit attempt budget.
    pub async fn collect_field_with_attempts(
        &self,
        field: &FieldDescriptor,
        max_attempts: u32,
    ) -> FieldOutcome {
        let prompt = field.spoken_prompt();
        let phrases = &self.config.phrases;

        for attempt in 0..max_attempts {
            let has_more = attempt + 1 < max_attempts;

            self.say(&prompt).await;
            if !self.config.listen_delay.is_zero() {
                tokio::time::sleep(self.config.listen_delay).await;
            }

            let transcript = match self.recognizer.listen().await {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        "Listening for '{}' failed (attempt {}/{}): {}",
                        field.name,
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    if has_more {
                        self.say(&phrases.not_caught).await;
                    }
                    continue;
                }
            };
            debug!("Heard for '{}': {:?}", field.name, transcript);

            if is_abort_command(&transcript) {
                info!("Abort keyword heard while collecting '{}'", field.name);
                self.say(&phrases.cancelled).await;
                return FieldOutcome::Abort;
            }

            if validate_response(&transcript, &field.field_type) {
                return FieldOutcome::Collected(transcript);
            }

            debug!(
                "Answer for '{}' is not a valid {}",
                field.name, field.field_type
            );
            if has_more {
                self.say(&phrases.invalid(field.field_type.as_str())).await;
            }
        }

        warn!("Failed to collect data for field: {}", field.name);
        FieldOutcome::NotCollected
    }

    /// Collect every field in order.
    ///
    /// Returns `None` when the user aborted; partial answers are discarded.
    /// Otherwise the mapping holds exactly one entry per field.
    pub async fn collect_all(&self, fields: &[FieldDescriptor]) -> Option<CollectedData> {
        let phrases = &self.config.phrases;
        info!("🎤 Voice collection started for {} field(s)", fields.len());
        self.say(&phrases.instructions).await;

        let mut outcomes = Vec::with_capacity(fields.len());
        for field in fields {
            match self.collect_field(field).await {
                FieldOutcome::Abort => {
                    self.say(&phrases.cancelled).await;
                    info!("Voice collection cancelled by user");
                    return None;
                }
                outcome => outcomes.push((field, outcome)),
            }
        }

        let data: CollectedData = outcomes
            .into_iter()
            .map(|(field, outcome)| {
                let value = match outcome {
                    FieldOutcome::Collected(raw) => normalize_value(&raw, &field.field_type),
                    _ => NOT_PROVIDED.to_string(),
                };
                (field.name.clone(), value)
            })
            .collect();

        self.say(&phrases.complete).await;
        info!("✅ Voice collection complete ({} field(s))", data.len());
        Some(data)
    }
}

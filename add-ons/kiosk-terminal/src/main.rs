//! Kiosk Terminal
//!
//! Runs the enrollment pipeline from a terminal. Frames come from a snapshot
//! file (`camera.snapshot_path`); speech uses the HTTP STT/TTS backends when
//! their keys are set and falls back to typed answers and logged narration.

mod view;

use anyhow::Context;
use async_trait::async_trait;
use kiosk_core::{
    CaptureManager, CaptureOutcome, KioskConfig, KioskError, PipelineOrchestrator,
    RecognitionClient, StillImageCamera,
};
use kiosk_voice::{
    EarConfig, HttpStt, HttpTts, MicrophoneRecognizer, PrintedSpeech, SpeechRecognizer,
    SpeechSynthesizer, SpokenOutput, VoiceCollector, VoiceEar, VoiceError, VoiceOutput,
    VoiceResult,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use view::TerminalView;

type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

const HELP: &str = "commands: start | capture | voice | set <field> <value> | submit | cancel | status | users | stop | help | quit";

/// Answers typed on the console stand in for the microphone.
struct TypedAnswers {
    lines: SharedLines,
}

#[async_trait]
impl SpeechRecognizer for TypedAnswers {
    async fn listen(&self) -> VoiceResult<String> {
        print!("(answer) > ");
        let _ = std::io::stdout().flush();
        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            Some(line) => Ok(line),
            None => Err(VoiceError::Unavailable("console closed".to_string())),
        }
    }
}

fn synthesizer() -> Arc<dyn SpeechSynthesizer> {
    let spoken = HttpTts::from_env().and_then(|tts| Ok((tts, VoiceOutput::new()?)));
    match spoken {
        Ok((tts, output)) => {
            tracing::info!("Speech output via {} ({})", tts.base_url, tts.voice);
            Arc::new(SpokenOutput::new(Arc::new(tts), output))
        }
        Err(e) => {
            tracing::warn!("Spoken output unavailable ({}); narration goes to the log", e);
            Arc::new(PrintedSpeech)
        }
    }
}

fn recognizer(language: &str, lines: SharedLines) -> Arc<dyn SpeechRecognizer> {
    match HttpStt::from_env(language) {
        Ok(stt) => {
            tracing::info!("Speech input via microphone + {} ({})", stt.base_url, language);
            Arc::new(MicrophoneRecognizer::new(
                VoiceEar::new(EarConfig::default()),
                Arc::new(stt),
            ))
        }
        Err(e) => {
            tracing::warn!("Microphone recognition unavailable ({}); answers are typed", e);
            Arc::new(TypedAnswers { lines })
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[kiosk-terminal] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = KioskConfig::load().context("load kiosk config")?;
    let snapshot = config
        .camera
        .snapshot_path
        .clone()
        .context("camera.snapshot_path is required (KIOSK__CAMERA__SNAPSHOT_PATH)")?;

    let lines: SharedLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));

    let service = Arc::new(
        RecognitionClient::with_timeout(&config.service_url, config.request_timeout())
            .context("build recognition client")?,
    );
    let camera = CaptureManager::new(
        Arc::new(StillImageCamera::new(snapshot)),
        config.capture_constraints(),
        config.camera.jpeg_quality,
    );
    let voice = VoiceCollector::new(
        config.collector_config(),
        synthesizer(),
        recognizer(&config.voice.language, Arc::clone(&lines)),
    );
    let view = Arc::new(TerminalView::new(config.display_size()));
    let mut kiosk = PipelineOrchestrator::new(service, camera, voice, view);

    tracing::info!(service_url = %config.service_url, "Kiosk terminal started");
    if let Err(e) = kiosk.initialize().await {
        tracing::warn!("Service not reachable yet: {}", e);
    }
    println!("{}", HELP);

    loop {
        print!("[{}] > ", kiosk.state());
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            line = async { lines.lock().await.next_line().await } => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down");
                break;
            }
        };
        let Some(line) = line else { break };

        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let result = match command {
            "" => Ok(()),
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "init" => kiosk.initialize().await.map(|_| ()),
            "start" => kiosk.start_camera().await,
            "capture" => kiosk.capture().await.map(|outcome| {
                if let CaptureOutcome::NewFace(_) = outcome {
                    println!("Type `voice` to answer by voice, or `set <field> <value>`.");
                }
            }),
            "voice" => kiosk.collect_by_voice().await.map(|_| ()),
            "set" => match (parts.next(), parts.next()) {
                (Some(field), Some(value)) => kiosk.set_field(field, value.trim()),
                _ => {
                    println!("usage: set <field> <value>");
                    Ok(())
                }
            },
            "submit" => kiosk.submit_form().await.map(|_| ()),
            "cancel" => kiosk.cancel_form(),
            "status" => kiosk.refresh_status().await.map(|_| ()),
            "users" => kiosk.registered_users().await.map(|users| {
                for user in users {
                    let name = user
                        .data
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("N/A");
                    println!("  {}  {}  {}", user.id, name, user.timestamp);
                }
            }),
            "stop" => {
                kiosk.stop_camera();
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("unknown command '{}'. {}", other, HELP);
                Ok(())
            }
        };

        match result {
            Ok(()) => {}
            Err(KioskError::IncompleteForm(missing)) => {
                println!("Please fill in: {}", missing.join(", "));
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    kiosk.stop_camera();
    Ok(())
}

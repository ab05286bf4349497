//! Kiosk configuration.
//!
//! Precedence: environment (`KIOSK__*`) > file at `KIOSK_CONFIG` (default
//! `config/kiosk`, any format the `config` crate recognises) > defaults.

use crate::capture::{CaptureConstraints, Dimensions, FacingMode};
use crate::error::KioskResult;
use kiosk_voice::CollectorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recognition languages the kiosk can prompt and listen in.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en-US", "hi-IN", "ta-IN", "te-IN", "kn-IN", "ml-IN", "mr-IN", "gu-IN", "bn-IN",
];

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Image file refreshed by an external capture process.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// JPEG quality factor in 0..1.
    pub jpeg_quality: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    pub language: String,
    pub max_attempts: u32,
    pub listen_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KioskConfig {
    /// Base URL of the detection/recognition service.
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub voice: VoiceConfig,
}

impl KioskConfig {
    /// Load config from file and environment.
    pub fn load() -> KioskResult<Self> {
        let config_path =
            std::env::var("KIOSK_CONFIG").unwrap_or_else(|_| "config/kiosk".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> KioskResult<Self> {
        let builder = config::Config::builder()
            .set_default("service_url", "http://127.0.0.1:5000")?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("camera.ideal_width", 640_i64)?
            .set_default("camera.ideal_height", 480_i64)?
            .set_default("camera.jpeg_quality", 0.8_f64)?
            .set_default("display.width", 640_i64)?
            .set_default("display.height", 480_i64)?
            .set_default("voice.language", "en-US")?
            .set_default("voice.max_attempts", 3_i64)?
            .set_default("voice.listen_delay_ms", 500_i64)?;

        // `config::File` also resolves extension-less names (config/kiosk -> config/kiosk.toml).
        let builder = builder.add_source(config::File::from(path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("KIOSK").separator("__"))
            .build()?;

        let cfg: Self = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if !SUPPORTED_LANGUAGES.contains(&self.voice.language.as_str()) {
            return Err(config::ConfigError::Message(format!(
                "unsupported voice.language '{}' (expected one of {})",
                self.voice.language,
                SUPPORTED_LANGUAGES.join(", ")
            )));
        }
        if self.voice.max_attempts == 0 {
            return Err(config::ConfigError::Message(
                "voice.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.camera.jpeg_quality) {
            return Err(config::ConfigError::Message(format!(
                "camera.jpeg_quality must be within 0..1, got {}",
                self.camera.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            facing: FacingMode::User,
            ideal: Dimensions::new(self.camera.ideal_width, self.camera.ideal_height),
        }
    }

    pub fn display_size(&self) -> Dimensions {
        Dimensions::new(self.display.width, self.display.height)
    }

    /// Collector settings; narration phrases keep their defaults.
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_attempts: self.voice.max_attempts,
            listen_delay: Duration::from_millis(self.voice.listen_delay_ms),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KioskError;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let cfg = KioskConfig::load_from(Path::new("/nonexistent/kiosk-config")).unwrap();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.display_size(), Dimensions::new(640, 480));
        assert_eq!(cfg.capture_constraints().ideal, Dimensions::new(640, 480));
        assert!(cfg.camera.snapshot_path.is_none());
        assert!((cfg.camera.jpeg_quality - 0.8).abs() < f32::EPSILON);
        let voice = cfg.collector_config();
        assert_eq!(voice.max_attempts, 3);
        assert_eq!(voice.listen_delay, Duration::from_millis(500));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "service_url = \"http://face-service:5000\"\n\n[voice]\nlanguage = \"ta-IN\"\nmax_attempts = 5\n\n[camera]\nsnapshot_path = \"/var/lib/kiosk/latest.jpg\""
        )
        .unwrap();

        let cfg = KioskConfig::load_from(&path).unwrap();
        assert_eq!(cfg.service_url, "http://face-service:5000");
        assert_eq!(cfg.voice.language, "ta-IN");
        assert_eq!(cfg.voice.max_attempts, 5);
        // Untouched keys in the same table keep their defaults.
        assert_eq!(cfg.voice.listen_delay_ms, 500);
        assert_eq!(
            cfg.camera.snapshot_path.as_deref(),
            Some(Path::new("/var/lib/kiosk/latest.jpg"))
        );
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(&path, "[voice]\nlanguage = \"fr-FR\"\n").unwrap();
        assert!(matches!(
            KioskConfig::load_from(&path),
            Err(KioskError::Config(_))
        ));
    }

    #[test]
    fn zero_attempts_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(&path, "[voice]\nmax_attempts = 0\n").unwrap();
        let err = KioskConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error:"), "{}", err);
    }
}

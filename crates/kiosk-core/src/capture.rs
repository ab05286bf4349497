//! Capture Manager: owns the camera stream and produces encoded still frames.
//!
//! The device itself sits behind `CameraDevice` / `VideoStream`; the manager
//! only sequences start/capture/stop and encodes frames as JPEG data URLs.

use crate::error::{KioskError, KioskResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// What the manager asks of the device. Sizes are preferences, not requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    pub ideal: Dimensions,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal: Dimensions::new(640, 480),
        }
    }
}

/// A still frame encoded as a `data:image/jpeg;base64,...` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedFrame(String);

impl EncodedFrame {
    pub fn from_jpeg(bytes: &[u8]) -> Self {
        Self(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedFrame({} bytes)", self.0.len())
    }
}

/// Acquisition device. Opening may fail on permission denial or device error.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, constraints: &CaptureConstraints) -> KioskResult<Box<dyn VideoStream>>;
}

/// An open, live stream.
#[async_trait]
pub trait VideoStream: Send {
    /// Resolves once the native resolution of the stream is known.
    async fn wait_for_geometry(&mut self) -> KioskResult<Dimensions>;

    /// The current live frame.
    fn grab(&mut self) -> KioskResult<RgbImage>;

    /// Release every track. Idempotent.
    fn stop(&mut self);
}

/// Convert a 0..1 quality factor to the encoder's 1..=100 scale.
pub fn jpeg_quality(factor: f32) -> u8 {
    (factor * 100.0).round().clamp(1.0, 100.0) as u8
}

pub fn encode_frame(frame: &RgbImage, quality: u8) -> KioskResult<EncodedFrame> {
    let mut bytes = Vec::new();
    frame
        .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        .map_err(|e| KioskError::Encode(e.to_string()))?;
    Ok(EncodedFrame::from_jpeg(&bytes))
}

struct ActiveStream {
    stream: Box<dyn VideoStream>,
    dimensions: Dimensions,
}

pub struct CaptureManager {
    device: Arc<dyn CameraDevice>,
    constraints: CaptureConstraints,
    quality: u8,
    active: Option<ActiveStream>,
}

impl CaptureManager {
    /// `quality` is the JPEG quality factor in 0..1 (the kiosk uses 0.8).
    pub fn new(device: Arc<dyn CameraDevice>, constraints: CaptureConstraints, quality: f32) -> Self {
        Self {
            device,
            constraints,
            quality: jpeg_quality(quality),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Acquire the device and wait for the stream geometry.
    ///
    /// Returns false (state unchanged) on denial or device error.
    pub async fn start(&mut self) -> bool {
        if self.active.is_some() {
            return true;
        }
        let mut stream = match self.device.open(&self.constraints).await {
            Ok(s) => s,
            Err(e) => {
                error!("Error accessing camera: {}", e);
                return false;
            }
        };
        let dimensions = match stream.wait_for_geometry().await {
            Ok(d) if !d.is_empty() => d,
            Ok(d) => {
                error!("Camera reported unusable geometry {}", d);
                stream.stop();
                return false;
            }
            Err(e) => {
                error!("Camera stream never became ready: {}", e);
                stream.stop();
                return false;
            }
        };
        info!("📷 Camera started ({})", dimensions);
        self.active = Some(ActiveStream { stream, dimensions });
        true
    }

    /// Encode the current live frame. `None` if the camera is not active.
    pub fn capture_frame(&mut self) -> Option<EncodedFrame> {
        let Some(active) = self.active.as_mut() else {
            error!("Camera is not active");
            return None;
        };
        let frame = match active.stream.grab() {
            Ok(f) => f,
            Err(e) => {
                warn!("Frame grab failed: {}", e);
                return None;
            }
        };
        match encode_frame(&frame, self.quality) {
            Ok(encoded) => {
                debug!("Captured frame {}x{}", frame.width(), frame.height());
                Some(encoded)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Release the device. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stream.stop();
            info!("Camera stopped");
        }
    }

    /// Native resolution of the active stream.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.active.as_ref().map(|a| a.dimensions)
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Camera fed by snapshot files: an external capture process keeps writing
/// the latest frame to `path`, and every grab decodes it afresh.
#[derive(Debug, Clone)]
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn read_snapshot(path: &Path) -> KioskResult<RgbImage> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| KioskError::Device(format!("{}: {}", path.display(), e)))
}

struct SnapshotStream {
    path: PathBuf,
    stopped: bool,
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn open(&self, constraints: &CaptureConstraints) -> KioskResult<Box<dyn VideoStream>> {
        if !self.path.is_file() {
            return Err(KioskError::Device(format!(
                "snapshot source {} is not available",
                self.path.display()
            )));
        }
        debug!(
            "Opening snapshot camera {} (facing {:?}, ideal {})",
            self.path.display(),
            constraints.facing,
            constraints.ideal
        );
        Ok(Box::new(SnapshotStream {
            path: self.path.clone(),
            stopped: false,
        }))
    }
}

#[async_trait]
impl VideoStream for SnapshotStream {
    async fn wait_for_geometry(&mut self) -> KioskResult<Dimensions> {
        let path = self.path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
            .await
            .map_err(|e| KioskError::Device(e.to_string()))?
            .map_err(|e| KioskError::Device(e.to_string()))?;
        Ok(Dimensions::new(width, height))
    }

    fn grab(&mut self) -> KioskResult<RgbImage> {
        if self.stopped {
            return Err(KioskError::Device("stream stopped".to_string()));
        }
        read_snapshot(&self.path)
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

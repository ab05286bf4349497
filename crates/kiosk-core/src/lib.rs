//! # Kiosk Core - face enrollment pipeline
//!
//! Captures a frame, asks the recognition service who it is, and for new
//! faces fills a registration form by hand or by voice before registering.
//!
//! - [`capture`]: camera seam and JPEG data-URL frames
//! - [`client`]: HTTP client for the detection/recognition service
//! - [`pipeline`]: the state machine tying camera, service, voice and view together

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod overlay;
pub mod pipeline;

pub use capture::{
    CameraDevice, CaptureConstraints, CaptureManager, Dimensions, EncodedFrame, FacingMode,
    StillImageCamera, VideoStream,
};
pub use client::{RecognitionClient, RecognitionService};
pub use config::{KioskConfig, SUPPORTED_LANGUAGES};
pub use error::{KioskError, KioskResult, ServiceError};
pub use form::{FormEntry, RegistrationForm};
pub use models::{
    DataTemplate, DetectResponse, FaceDetection, RecognitionResult, RecognizedUser,
    RegisterResponse, ServiceStatus, UserSummary,
};
pub use overlay::{face_label, scale_to_display, FaceOverlay};
pub use pipeline::{
    CaptureOutcome, Controls, CycleContext, KioskView, PipelineOrchestrator, PipelineState,
};

//! Pipeline Orchestrator: drives one enrollment cycle at a time.
//!
//! ```text
//! Idle ──start──► CameraActive ──capture──► Capturing ► Detecting ► Recognizing
//!                     ▲                                               │
//!                     │                          ┌────────────────────┴──────────┐
//!                     │                     RecognizedDone                 AwaitingEntry
//!                     │                                                  │         │
//!                     │                                        VoiceCollecting  FormEditing
//!                     └───────────── submit / cancel ◄──── Submitting ◄──────────┘
//! ```
//!
//! Operations take `&mut self`, so a cycle can never be re-entered. The
//! transient states are visible to the view only through control enablement.

use crate::capture::{CaptureManager, Dimensions, EncodedFrame};
use crate::client::RecognitionService;
use crate::error::{KioskError, KioskResult};
use crate::form::RegistrationForm;
use crate::models::{DataTemplate, FaceDetection, RecognizedUser, ServiceStatus, UserSummary};
use crate::overlay::{scale_to_display, FaceOverlay};
use kiosk_voice::VoiceCollector;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const MSG_CAMERA_DENIED: &str = "Could not access camera. Please check permissions.";
pub const MSG_NO_FACE: &str = "No face detected. Please try again.";
pub const MSG_PROCESSING_ERROR: &str = "Error processing image. Please try again.";
pub const MSG_VOICE_SUCCESS: &str = "Data collected successfully. Please review and save.";
pub const MSG_REGISTER_ERROR: &str = "Error registering user. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    CameraActive,
    Capturing,
    Detecting,
    Recognizing,
    RecognizedDone,
    AwaitingEntry,
    VoiceCollecting,
    FormEditing,
    Submitting,
}

impl PipelineState {
    /// A cycle step is in progress.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Capturing | Self::Detecting | Self::Recognizing | Self::VoiceCollecting | Self::Submitting
        )
    }

    pub fn has_form(self) -> bool {
        matches!(self, Self::AwaitingEntry | Self::FormEditing)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which user controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start_camera: bool,
    pub stop_camera: bool,
    pub capture: bool,
    pub voice: bool,
    pub submit: bool,
    pub cancel: bool,
}

impl Controls {
    pub fn for_state(state: PipelineState) -> Self {
        if state.is_busy() {
            return Self::default();
        }
        if state == PipelineState::Idle {
            return Self {
                start_camera: true,
                ..Default::default()
            };
        }
        let form = state.has_form();
        Self {
            start_camera: false,
            stop_camera: true,
            capture: true,
            voice: form,
            submit: form,
            cancel: form,
        }
    }
}

/// What one capture cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    NoFace,
    Recognized(RecognizedUser),
    NewFace(FaceDetection),
}

/// Per-cycle data: the frame sent to the service, the face acted on, and the pending form.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub frame: EncodedFrame,
    pub face: Option<FaceDetection>,
    pub form: Option<RegistrationForm>,
}

/// Rendering surface driven by the orchestrator.
pub trait KioskView: Send + Sync {
    fn show_status(&self, message: &str, online: bool);
    fn show_counts(&self, users_count: u64, model: &str);
    /// Blocking user notice.
    fn notify(&self, message: &str);
    fn draw_overlay(&self, overlay: &FaceOverlay);
    fn clear_overlay(&self);
    fn show_detection(&self, face: &FaceDetection);
    fn show_recognized(&self, user: &RecognizedUser);
    fn show_new_face(&self);
    fn show_form(&self, form: &RegistrationForm);
    fn hide_form(&self);
    fn set_controls(&self, controls: Controls);
    fn display_size(&self) -> Dimensions;
}

pub struct PipelineOrchestrator {
    service: Arc<dyn RecognitionService>,
    camera: CaptureManager,
    voice: VoiceCollector,
    view: Arc<dyn KioskView>,
    state: PipelineState,
    template: Option<DataTemplate>,
    cycle: Option<CycleContext>,
}

impl PipelineOrchestrator {
    pub fn new(
        service: Arc<dyn RecognitionService>,
        camera: CaptureManager,
        voice: VoiceCollector,
        view: Arc<dyn KioskView>,
    ) -> Self {
        view.set_controls(Controls::for_state(PipelineState::Idle));
        Self {
            service,
            camera,
            voice,
            view,
            state: PipelineState::Idle,
            template: None,
            cycle: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn template(&self) -> Option<&DataTemplate> {
        self.template.as_ref()
    }

    pub fn cycle(&self) -> Option<&CycleContext> {
        self.cycle.as_ref()
    }

    pub fn form(&self) -> Option<&RegistrationForm> {
        self.cycle.as_ref().and_then(|c| c.form.as_ref())
    }

    fn enter(&mut self, state: PipelineState) {
        if self.state != state {
            debug!("Pipeline {} -> {}", self.state, state);
        }
        self.state = state;
        self.view.set_controls(Controls::for_state(state));
    }

    fn require(&self, operation: &'static str, allowed: &[PipelineState]) -> KioskResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            warn!("{} rejected in state {}", operation, self.state);
            Err(KioskError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Where a finished or abandoned cycle lands.
    fn resting_state(&self) -> PipelineState {
        if self.camera.is_active() {
            PipelineState::CameraActive
        } else {
            PipelineState::Idle
        }
    }

    fn drop_cycle(&mut self) {
        self.cycle = None;
        self.view.hide_form();
        self.view.clear_overlay();
    }

    /// Fetch service status and the data template.
    pub async fn initialize(&mut self) -> KioskResult<ServiceStatus> {
        self.require("initialize", &[PipelineState::Idle])?;
        self.view.show_status("Connecting to server...", false);

        let loaded = async {
            let status = self.service.get_status().await?;
            let template = self.service.get_template().await?;
            Ok::<_, KioskError>((status, template))
        }
        .await;

        match loaded {
            Ok((status, template)) => {
                self.view.show_status("Online", true);
                self.view.show_counts(status.users_count, &status.model);
                info!(
                    "Service online: {} user(s), model {}, {} template field(s)",
                    status.users_count,
                    status.model,
                    template.fields.len()
                );
                self.template = Some(template);
                Ok(status)
            }
            Err(e) => {
                error!("Error initializing kiosk: {}", e);
                self.view.show_status("Offline", false);
                Err(e)
            }
        }
    }

    /// Refresh the displayed user count and model.
    pub async fn refresh_status(&self) -> KioskResult<ServiceStatus> {
        let status = self.service.get_status().await?;
        self.view.show_counts(status.users_count, &status.model);
        Ok(status)
    }

    pub async fn registered_users(&self) -> KioskResult<Vec<UserSummary>> {
        Ok(self.service.list_users().await?)
    }

    pub async fn start_camera(&mut self) -> KioskResult<()> {
        self.require("start_camera", &[PipelineState::Idle])?;
        if !self.camera.start().await {
            self.view.notify(MSG_CAMERA_DENIED);
            return Err(KioskError::Device("camera unavailable".to_string()));
        }
        self.view.show_status("Camera active", true);
        self.enter(PipelineState::CameraActive);
        Ok(())
    }

    pub fn stop_camera(&mut self) {
        self.voice.silence();
        self.camera.stop();
        self.drop_cycle();
        self.enter(PipelineState::Idle);
    }

    /// Run one capture cycle: frame, detect, recognize.
    ///
    /// Starting a new cycle discards any pending form.
    pub async fn capture(&mut self) -> KioskResult<CaptureOutcome> {
        use PipelineState::*;
        self.require(
            "capture",
            &[CameraActive, RecognizedDone, AwaitingEntry, FormEditing],
        )?;
        self.drop_cycle();
        self.enter(Capturing);

        match self.run_cycle().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Error processing frame: {}", e);
                self.view.notify(MSG_PROCESSING_ERROR);
                self.drop_cycle();
                let resting = self.resting_state();
                self.enter(resting);
                Err(e)
            }
        }
    }

    async fn run_cycle(&mut self) -> KioskResult<CaptureOutcome> {
        let frame = self
            .camera
            .capture_frame()
            .ok_or_else(|| KioskError::Device("no frame available".to_string()))?;

        self.enter(PipelineState::Detecting);
        let detected = self.service.detect(frame.as_str()).await?;
        let Some(face) = detected.primary_face().cloned() else {
            info!("No face in frame");
            self.view.notify(MSG_NO_FACE);
            self.view.clear_overlay();
            self.enter(PipelineState::CameraActive);
            return Ok(CaptureOutcome::NoFace);
        };
        if detected.faces.len() > 1 {
            debug!("{} faces detected; using the first", detected.faces.len());
        }

        let native = self.camera.dimensions().unwrap_or_default();
        if let Some(overlay) = scale_to_display(&face, native, self.view.display_size()) {
            self.view.draw_overlay(&overlay);
        }
        self.view.show_detection(&face);
        self.cycle = Some(CycleContext {
            frame,
            face: Some(face.clone()),
            form: None,
        });

        self.enter(PipelineState::Recognizing);
        let result = self.service.recognize(self.cycle_frame()?, &face).await?;

        if let Some(user) = result.matched_user().cloned() {
            info!("Recognized user {}", user.id);
            self.view.show_recognized(&user);
            self.view.hide_form();
            self.enter(PipelineState::RecognizedDone);
            return Ok(CaptureOutcome::Recognized(user));
        }

        info!("New face");
        self.view.show_new_face();
        let form = RegistrationForm::from_fields(&self.load_template().await?.fields);
        self.view.show_form(&form);
        if let Some(cycle) = self.cycle.as_mut() {
            cycle.form = Some(form);
        }
        self.enter(PipelineState::AwaitingEntry);
        Ok(CaptureOutcome::NewFace(face))
    }

    fn cycle_frame(&self) -> KioskResult<&str> {
        self.cycle
            .as_ref()
            .map(|c| c.frame.as_str())
            .ok_or_else(|| KioskError::InvalidState {
                operation: "recognize",
                state: self.state,
            })
    }

    async fn load_template(&mut self) -> KioskResult<&DataTemplate> {
        if self.template.is_none() {
            self.template = Some(self.service.get_template().await?);
        }
        self.template
            .as_ref()
            .ok_or_else(|| KioskError::Device("template unavailable".to_string()))
    }

    fn form_mut(&mut self) -> KioskResult<&mut RegistrationForm> {
        let state = self.state;
        self.cycle
            .as_mut()
            .and_then(|c| c.form.as_mut())
            .ok_or(KioskError::InvalidState {
                operation: "form",
                state,
            })
    }

    /// Fill the pending form by voice.
    ///
    /// Returns false when the user cancelled; the form is then left untouched.
    pub async fn collect_by_voice(&mut self) -> KioskResult<bool> {
        use PipelineState::*;
        self.require("collect_by_voice", &[AwaitingEntry, FormEditing])?;
        let previous = self.state;
        let fields = self.form_mut()?.fields();

        self.enter(VoiceCollecting);
        let Some(data) = self.voice.collect_all(&fields).await else {
            self.enter(previous);
            return Ok(false);
        };

        let form = self.form_mut()?;
        let written = form.merge(&data);
        let snapshot = form.clone();
        debug!("Voice filled {} field(s)", written);
        self.view.show_form(&snapshot);
        self.voice.say(MSG_VOICE_SUCCESS).await;
        self.enter(FormEditing);
        Ok(true)
    }

    /// Manual entry of one form value.
    pub fn set_field(&mut self, name: &str, value: &str) -> KioskResult<()> {
        use PipelineState::*;
        self.require("set_field", &[AwaitingEntry, FormEditing])?;
        self.form_mut()?.set(name, value)?;
        self.enter(FormEditing);
        Ok(())
    }

    /// Register the detected face with the form values. Returns the new user id.
    pub async fn submit_form(&mut self) -> KioskResult<String> {
        use PipelineState::*;
        self.require("submit_form", &[AwaitingEntry, FormEditing])?;
        let previous = self.state;

        let (frame, face, values) = {
            let Some(cycle) = self.cycle.as_ref() else {
                return Err(KioskError::InvalidState {
                    operation: "submit_form",
                    state: self.state,
                });
            };
            let (Some(face), Some(form)) = (cycle.face.as_ref(), cycle.form.as_ref()) else {
                return Err(KioskError::InvalidState {
                    operation: "submit_form",
                    state: self.state,
                });
            };
            let missing = form.missing();
            if !missing.is_empty() {
                return Err(KioskError::IncompleteForm(missing));
            }
            (cycle.frame.clone(), face.clone(), form.values())
        };

        self.enter(Submitting);
        let registered = match self.service.register(frame.as_str(), &face, &values).await {
            Ok(res) if res.success => Ok(res.user_id.unwrap_or_default()),
            Ok(res) => {
                warn!(
                    "Registration rejected: {}",
                    res.message.as_deref().unwrap_or("no reason given")
                );
                Err(KioskError::Registration)
            }
            Err(e) => Err(KioskError::from(e)),
        };

        match registered {
            Ok(user_id) => {
                info!("Registered user {}", user_id);
                self.view
                    .notify(&format!("User registered successfully! ID: {}", user_id));
                if let Err(e) = self.refresh_status().await {
                    warn!("Could not refresh user count: {}", e);
                }
                self.drop_cycle();
                let resting = self.resting_state();
                self.enter(resting);
                Ok(user_id)
            }
            Err(e) => {
                error!("Error registering user: {}", e);
                self.view.notify(MSG_REGISTER_ERROR);
                self.enter(previous);
                Err(e)
            }
        }
    }

    /// Abandon the pending form.
    pub fn cancel_form(&mut self) -> KioskResult<()> {
        use PipelineState::*;
        self.require("cancel_form", &[AwaitingEntry, FormEditing])?;
        self.voice.silence();
        self.drop_cycle();
        let resting = self.resting_state();
        self.enter(resting);
        Ok(())
    }
}

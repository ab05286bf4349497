//! End-to-end enrollment cycles with a fake camera, service, view and voice.

use async_trait::async_trait;
use image::RgbImage;
use kiosk_core::{
    CameraDevice, CaptureConstraints, CaptureManager, CaptureOutcome, Controls, DataTemplate,
    DetectResponse, Dimensions, FaceDetection, FaceOverlay, KioskError, KioskResult, KioskView,
    PipelineOrchestrator, PipelineState, RecognitionResult, RecognitionService, RecognizedUser,
    RegisterResponse, RegistrationForm, ServiceError, ServiceStatus, UserSummary, VideoStream,
};
use kiosk_voice::{
    CollectedData, CollectorConfig, FieldDescriptor, FieldType, SpeechRecognizer,
    SpeechSynthesizer, VoiceCollector, VoiceError, VoiceResult,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeCamera {
    deny: bool,
}

struct FakeStream;

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn open(&self, _c: &CaptureConstraints) -> KioskResult<Box<dyn VideoStream>> {
        if self.deny {
            return Err(KioskError::Device("NotAllowedError".into()));
        }
        Ok(Box::new(FakeStream))
    }
}

#[async_trait]
impl VideoStream for FakeStream {
    async fn wait_for_geometry(&mut self) -> KioskResult<Dimensions> {
        Ok(Dimensions::new(1280, 960))
    }

    fn grab(&mut self) -> KioskResult<RgbImage> {
        Ok(RgbImage::new(16, 12))
    }

    fn stop(&mut self) {}
}

#[derive(Default)]
struct FakeService {
    faces: Mutex<Vec<FaceDetection>>,
    recognized: Mutex<Option<RecognizedUser>>,
    fail_detect: Mutex<bool>,
    fail_register: Mutex<bool>,
    users: Mutex<u64>,
    registered: Mutex<Vec<(FaceDetection, CollectedData)>>,
}

impl FakeService {
    fn with_face(face: FaceDetection) -> Self {
        let svc = Self::default();
        svc.faces.lock().unwrap().push(face);
        svc
    }

    fn registrations(&self) -> Vec<(FaceDetection, CollectedData)> {
        self.registered.lock().unwrap().clone()
    }
}

fn transport_down(path: &str) -> ServiceError {
    ServiceError::Status {
        path: path.to_string(),
        status: 503,
        body: "unavailable".into(),
    }
}

#[async_trait]
impl RecognitionService for FakeService {
    async fn get_status(&self) -> Result<ServiceStatus, ServiceError> {
        Ok(ServiceStatus {
            status: Some("online".into()),
            users_count: *self.users.lock().unwrap(),
            model: "Facenet512".into(),
        })
    }

    async fn get_template(&self) -> Result<DataTemplate, ServiceError> {
        Ok(DataTemplate {
            fields: vec![
                FieldDescriptor::new("name", "What is your name?", FieldType::String),
                FieldDescriptor::new("age", "How old are you?", FieldType::Integer),
            ],
        })
    }

    async fn detect(&self, image: &str) -> Result<DetectResponse, ServiceError> {
        assert!(image.starts_with("data:image/jpeg;base64,"));
        if *self.fail_detect.lock().unwrap() {
            return Err(transport_down("/api/face/detect"));
        }
        Ok(DetectResponse {
            success: true,
            faces: self.faces.lock().unwrap().clone(),
        })
    }

    async fn recognize(
        &self,
        _image: &str,
        _face: &FaceDetection,
    ) -> Result<RecognitionResult, ServiceError> {
        let user = self.recognized.lock().unwrap().clone();
        Ok(RecognitionResult {
            recognized: user.is_some(),
            user,
        })
    }

    async fn register(
        &self,
        _image: &str,
        face: &FaceDetection,
        data: &CollectedData,
    ) -> Result<RegisterResponse, ServiceError> {
        if *self.fail_register.lock().unwrap() {
            return Err(transport_down("/api/face/register"));
        }
        self.registered
            .lock()
            .unwrap()
            .push((face.clone(), data.clone()));
        *self.users.lock().unwrap() += 1;
        Ok(RegisterResponse {
            success: true,
            user_id: Some("user_42".into()),
            message: None,
        })
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        Ok(Vec::new())
    }

    async fn user_count(&self) -> Result<u64, ServiceError> {
        Ok(*self.users.lock().unwrap())
    }
}

#[derive(Default)]
struct RecordingView {
    notices: Mutex<Vec<String>>,
    overlay: Mutex<Option<FaceOverlay>>,
    recognized: Mutex<Option<RecognizedUser>>,
    form_visible: Mutex<bool>,
    new_face_shown: Mutex<bool>,
    counts: Mutex<Option<u64>>,
    controls: Mutex<Vec<Controls>>,
}

impl RecordingView {
    fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    fn overlay(&self) -> Option<FaceOverlay> {
        self.overlay.lock().unwrap().clone()
    }

    fn form_visible(&self) -> bool {
        *self.form_visible.lock().unwrap()
    }
}

impl KioskView for RecordingView {
    fn show_status(&self, _message: &str, _online: bool) {}

    fn show_counts(&self, users_count: u64, _model: &str) {
        *self.counts.lock().unwrap() = Some(users_count);
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn draw_overlay(&self, overlay: &FaceOverlay) {
        *self.overlay.lock().unwrap() = Some(overlay.clone());
    }

    fn clear_overlay(&self) {
        *self.overlay.lock().unwrap() = None;
    }

    fn show_detection(&self, _face: &FaceDetection) {}

    fn show_recognized(&self, user: &RecognizedUser) {
        *self.recognized.lock().unwrap() = Some(user.clone());
    }

    fn show_new_face(&self) {
        *self.new_face_shown.lock().unwrap() = true;
    }

    fn show_form(&self, _form: &RegistrationForm) {
        *self.form_visible.lock().unwrap() = true;
    }

    fn hide_form(&self) {
        *self.form_visible.lock().unwrap() = false;
    }

    fn set_controls(&self, controls: Controls) {
        self.controls.lock().unwrap().push(controls);
    }

    fn display_size(&self) -> Dimensions {
        Dimensions::new(640, 480)
    }
}

#[derive(Default)]
struct SilentSynth {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechSynthesizer for SilentSynth {
    async fn speak(&self, text: &str) -> VoiceResult<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {}
}

struct ScriptedEars {
    answers: Mutex<VecDeque<String>>,
    listens: Mutex<usize>,
}

impl ScriptedEars {
    fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            listens: Mutex::new(0),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedEars {
    async fn listen(&self) -> VoiceResult<String> {
        *self.listens.lock().unwrap() += 1;
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(VoiceError::NoSpeech)
    }
}

struct Kiosk {
    pipeline: PipelineOrchestrator,
    service: Arc<FakeService>,
    view: Arc<RecordingView>,
    synth: Arc<SilentSynth>,
    ears: Arc<ScriptedEars>,
}

fn kiosk_with(service: FakeService, answers: &[&str], deny_camera: bool) -> Kiosk {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let service = Arc::new(service);
    let view = Arc::new(RecordingView::default());
    let synth = Arc::new(SilentSynth::default());
    let ears = Arc::new(ScriptedEars::new(answers));
    let camera = CaptureManager::new(
        Arc::new(FakeCamera { deny: deny_camera }),
        CaptureConstraints::default(),
        0.8,
    );
    let voice = VoiceCollector::new(
        CollectorConfig {
            listen_delay: Duration::ZERO,
            ..Default::default()
        },
        synth.clone(),
        ears.clone(),
    );
    let pipeline = PipelineOrchestrator::new(service.clone(), camera, voice, view.clone());
    Kiosk {
        pipeline,
        service,
        view,
        synth,
        ears,
    }
}

fn woman() -> FaceDetection {
    FaceDetection {
        x: 200,
        y: 100,
        w: 300,
        h: 360,
        confidence: 0.92,
        gender: Some("Woman".into()),
    }
}

fn alice() -> RecognizedUser {
    let mut data = BTreeMap::new();
    data.insert("name".to_string(), serde_json::json!("Alice"));
    RecognizedUser {
        id: "user_1".into(),
        data,
        timestamp: "2024-03-01T10:15:30".into(),
    }
}

async fn ready(kiosk: &mut Kiosk) {
    kiosk.pipeline.initialize().await.unwrap();
    kiosk.pipeline.start_camera().await.unwrap();
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_face_voice_enrollment_registers_sentinel_for_unparsed_age() {
    let mut kiosk = kiosk_with(
        FakeService::with_face(woman()),
        &["Priya", "twenty five", "twenty five", "twenty five"],
        false,
    );
    ready(&mut kiosk).await;

    let outcome = kiosk.pipeline.capture().await.unwrap();
    assert_eq!(outcome, CaptureOutcome::NewFace(woman()));
    assert_eq!(kiosk.pipeline.state(), PipelineState::AwaitingEntry);
    assert!(kiosk.view.form_visible());
    assert!(*kiosk.view.new_face_shown.lock().unwrap());

    // 1280x960 native onto a 640x480 display.
    let overlay = kiosk.view.overlay().unwrap();
    assert_eq!((overlay.left, overlay.top), (100.0, 50.0));
    assert_eq!(overlay.label, "Woman (92%)");

    assert!(kiosk.pipeline.collect_by_voice().await.unwrap());
    assert_eq!(kiosk.pipeline.state(), PipelineState::FormEditing);
    assert!(kiosk
        .synth
        .spoken
        .lock()
        .unwrap()
        .contains(&"Data collected successfully. Please review and save.".to_string()));

    let id = kiosk.pipeline.submit_form().await.unwrap();
    assert_eq!(id, "user_42");

    let registrations = kiosk.service.registrations();
    assert_eq!(registrations.len(), 1);
    let (face, data) = &registrations[0];
    assert_eq!(face.gender.as_deref(), Some("Woman"));
    assert_eq!(data["name"], "Priya");
    assert_eq!(data["age"], "Not provided");

    assert!(kiosk
        .view
        .notices()
        .contains(&"User registered successfully! ID: user_42".to_string()));
    assert_eq!(*kiosk.view.counts.lock().unwrap(), Some(1));
    assert!(kiosk.view.overlay().is_none());
    assert!(!kiosk.view.form_visible());
    assert!(kiosk.pipeline.cycle().is_none());
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
}

#[tokio::test]
async fn recognized_face_skips_form_and_voice() {
    let service = FakeService::with_face(woman());
    *service.recognized.lock().unwrap() = Some(alice());
    let mut kiosk = kiosk_with(service, &[], false);
    ready(&mut kiosk).await;

    let outcome = kiosk.pipeline.capture().await.unwrap();
    assert_eq!(outcome, CaptureOutcome::Recognized(alice()));
    assert_eq!(kiosk.pipeline.state(), PipelineState::RecognizedDone);
    assert!(!kiosk.view.form_visible());
    assert!(kiosk.pipeline.form().is_none());
    assert_eq!(
        kiosk.view.recognized.lock().unwrap().as_ref().map(|u| u.id.clone()),
        Some("user_1".to_string())
    );

    assert!(matches!(
        kiosk.pipeline.collect_by_voice().await,
        Err(KioskError::InvalidState { .. })
    ));
    assert_eq!(*kiosk.ears.listens.lock().unwrap(), 0);
    assert!(kiosk.service.registrations().is_empty());
}

#[tokio::test]
async fn zero_faces_returns_to_camera_active() {
    let mut kiosk = kiosk_with(FakeService::default(), &[], false);
    ready(&mut kiosk).await;

    assert_eq!(kiosk.pipeline.capture().await.unwrap(), CaptureOutcome::NoFace);
    assert_eq!(kiosk.view.notices(), vec!["No face detected. Please try again."]);
    assert!(kiosk.view.overlay().is_none());
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
}

#[tokio::test]
async fn service_failure_during_capture_resets_cycle() {
    let service = FakeService::with_face(woman());
    *service.fail_detect.lock().unwrap() = true;
    let mut kiosk = kiosk_with(service, &[], false);
    ready(&mut kiosk).await;

    assert!(matches!(
        kiosk.pipeline.capture().await,
        Err(KioskError::Network(_))
    ));
    assert_eq!(
        kiosk.view.notices(),
        vec!["Error processing image. Please try again."]
    );
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
    assert!(kiosk.pipeline.cycle().is_none());
}

#[tokio::test]
async fn controls_are_disabled_while_a_cycle_runs() {
    let mut kiosk = kiosk_with(FakeService::with_face(woman()), &[], false);
    ready(&mut kiosk).await;
    kiosk.view.controls.lock().unwrap().clear();

    kiosk.pipeline.capture().await.unwrap();
    let seen = kiosk.view.controls.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&Controls::default()));
    assert_eq!(
        seen.last(),
        Some(&Controls::for_state(PipelineState::AwaitingEntry))
    );
}

#[tokio::test]
async fn incomplete_form_is_rejected_without_calling_register() {
    let mut kiosk = kiosk_with(FakeService::with_face(woman()), &[], false);
    ready(&mut kiosk).await;
    kiosk.pipeline.capture().await.unwrap();

    kiosk.pipeline.set_field("name", "Ravi").unwrap();
    match kiosk.pipeline.submit_form().await {
        Err(KioskError::IncompleteForm(missing)) => assert_eq!(missing, vec!["age".to_string()]),
        other => panic!("expected incomplete form, got {:?}", other),
    }
    assert_eq!(kiosk.pipeline.state(), PipelineState::FormEditing);
    assert!(kiosk.service.registrations().is_empty());

    assert!(matches!(
        kiosk.pipeline.set_field("city", "Pune"),
        Err(KioskError::UnknownField(_))
    ));

    kiosk.pipeline.set_field("age", "31").unwrap();
    kiosk.pipeline.submit_form().await.unwrap();
    assert_eq!(kiosk.service.registrations()[0].1["age"], "31");
}

#[tokio::test]
async fn failed_registration_keeps_the_form() {
    let service = FakeService::with_face(woman());
    *service.fail_register.lock().unwrap() = true;
    let mut kiosk = kiosk_with(service, &[], false);
    ready(&mut kiosk).await;
    kiosk.pipeline.capture().await.unwrap();
    kiosk.pipeline.set_field("name", "Ravi").unwrap();
    kiosk.pipeline.set_field("age", "31").unwrap();

    assert!(kiosk.pipeline.submit_form().await.is_err());
    assert!(kiosk
        .view
        .notices()
        .contains(&"Error registering user. Please try again.".to_string()));
    assert_eq!(kiosk.pipeline.state(), PipelineState::FormEditing);
    assert_eq!(kiosk.pipeline.form().unwrap().get("name"), Some("Ravi"));
}

#[tokio::test]
async fn voice_abort_leaves_form_untouched() {
    let mut kiosk = kiosk_with(FakeService::with_face(woman()), &["quit"], false);
    ready(&mut kiosk).await;
    kiosk.pipeline.capture().await.unwrap();
    kiosk.pipeline.set_field("name", "Ravi").unwrap();

    assert!(!kiosk.pipeline.collect_by_voice().await.unwrap());
    assert_eq!(kiosk.pipeline.state(), PipelineState::FormEditing);
    let form = kiosk.pipeline.form().unwrap();
    assert_eq!(form.get("name"), Some("Ravi"));
    assert_eq!(form.get("age"), Some(""));
}

#[tokio::test]
async fn cancel_form_drops_the_cycle() {
    let mut kiosk = kiosk_with(FakeService::with_face(woman()), &[], false);
    ready(&mut kiosk).await;
    kiosk.pipeline.capture().await.unwrap();

    kiosk.pipeline.cancel_form().unwrap();
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
    assert!(kiosk.pipeline.cycle().is_none());
    assert!(!kiosk.view.form_visible());
    assert!(kiosk.view.overlay().is_none());
    assert!(matches!(
        kiosk.pipeline.submit_form().await,
        Err(KioskError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn camera_denial_stays_idle() {
    let mut kiosk = kiosk_with(FakeService::default(), &[], true);
    kiosk.pipeline.initialize().await.unwrap();

    assert!(kiosk.pipeline.start_camera().await.is_err());
    assert_eq!(kiosk.pipeline.state(), PipelineState::Idle);
    assert_eq!(
        kiosk.view.notices(),
        vec!["Could not access camera. Please check permissions."]
    );
    assert!(matches!(
        kiosk.pipeline.capture().await,
        Err(KioskError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn stopping_the_camera_returns_to_idle() {
    let mut kiosk = kiosk_with(FakeService::with_face(woman()), &[], false);
    ready(&mut kiosk).await;
    kiosk.pipeline.capture().await.unwrap();

    kiosk.pipeline.stop_camera();
    assert_eq!(kiosk.pipeline.state(), PipelineState::Idle);
    assert!(kiosk.pipeline.cycle().is_none());
    kiosk.pipeline.start_camera().await.unwrap();
    assert_eq!(kiosk.pipeline.state(), PipelineState::CameraActive);
}

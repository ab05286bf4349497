//! Wire and domain types exchanged with the recognition service.

use chrono::{DateTime, NaiveDateTime, Utc};
use kiosk_voice::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A face found by the detector, in native-pixel coordinates of the frame.
///
/// The box is echoed back to the service on recognize/register, which crops
/// with it; coordinates must stay integral on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    /// Detector confidence, 0..1.
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub gender: Option<String>,
}

impl FaceDetection {
    pub fn gender_label(&self) -> &str {
        match self.gender.as_deref() {
            Some(g) if !g.is_empty() => g,
            _ => "Unknown",
        }
    }

    /// Confidence as a whole percentage.
    pub fn confidence_percent(&self) -> i64 {
        (self.confidence * 100.0).round() as i64
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub faces: Vec<FaceDetection>,
}

impl DetectResponse {
    /// The face the pipeline acts on. Additional faces are ignored.
    pub fn primary_face(&self) -> Option<&FaceDetection> {
        if self.success {
            self.faces.first()
        } else {
            None
        }
    }
}

/// A previously registered person returned by recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedUser {
    pub id: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub timestamp: String,
}

impl RecognizedUser {
    /// A stored attribute rendered as text.
    pub fn field(&self, name: &str) -> Option<String> {
        match self.data.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Registration time. The service may omit the UTC offset; such values are read as UTC.
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub recognized: bool,
    #[serde(default)]
    pub user: Option<RecognizedUser>,
}

impl RecognitionResult {
    /// The matched user; `None` unless `recognized` is set.
    pub fn matched_user(&self) -> Option<&RecognizedUser> {
        if self.recognized {
            self.user.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub users_count: u64,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataTemplate {
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// Entry of the registered-user listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl UserSummary {
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.timestamp)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UserListResponse {
    #[serde(default)]
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UserCountResponse {
    #[serde(default)]
    pub count: u64,
}

#[derive(Serialize)]
pub(crate) struct DetectRequest<'a> {
    pub image: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RecognizeRequest<'a> {
    pub image: &'a str,
    pub face: &'a FaceDetection,
}

#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub image: &'a str,
    pub face: &'a FaceDetection,
    #[serde(rename = "userData")]
    pub user_data: &'a BTreeMap<String, String>,
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

//! Face box geometry: native frame coordinates to the display surface.

use crate::capture::Dimensions;
use crate::models::FaceDetection;
use serde::Serialize;

/// A labelled box in display coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceOverlay {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
}

/// `"<gender> (<confidence%>%)"`
pub fn face_label(face: &FaceDetection) -> String {
    format!("{} ({}%)", face.gender_label(), face.confidence_percent())
}

/// Scale `face` from the native stream resolution to the display size.
///
/// Axes scale independently. Returns `None` for an empty native geometry.
pub fn scale_to_display(
    face: &FaceDetection,
    native: Dimensions,
    display: Dimensions,
) -> Option<FaceOverlay> {
    if native.is_empty() {
        return None;
    }
    let sx = f64::from(display.width) / f64::from(native.width);
    let sy = f64::from(display.height) / f64::from(native.height);
    Some(FaceOverlay {
        left: face.x as f64 * sx,
        top: face.y as f64 * sy,
        width: face.w as f64 * sx,
        height: face.h as f64 * sy,
        label: face_label(face),
    })
}

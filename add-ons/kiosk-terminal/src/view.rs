//! Console rendering of the kiosk view.

use kiosk_core::{
    Controls, Dimensions, FaceDetection, FaceOverlay, KioskView, RecognizedUser, RegistrationForm,
};

pub struct TerminalView {
    display: Dimensions,
}

impl TerminalView {
    pub fn new(display: Dimensions) -> Self {
        Self { display }
    }
}

fn or_na(value: Option<String>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| "N/A".to_string())
}

impl KioskView for TerminalView {
    fn show_status(&self, message: &str, online: bool) {
        let dot = if online { "🟢" } else { "⚪" };
        println!("{} {}", dot, message);
    }

    fn show_counts(&self, users_count: u64, model: &str) {
        println!("Users: {} | Model: {}", users_count, model);
    }

    fn notify(&self, message: &str) {
        println!("\n*** {} ***\n", message);
    }

    fn draw_overlay(&self, overlay: &FaceOverlay) {
        println!(
            "[box] {} at ({:.0}, {:.0}) {:.0}x{:.0}",
            overlay.label, overlay.left, overlay.top, overlay.width, overlay.height
        );
    }

    fn clear_overlay(&self) {}

    fn show_detection(&self, face: &FaceDetection) {
        println!("Detection");
        println!("  Gender:     {}", face.gender_label());
        println!("  Confidence: {}%", face.confidence_percent());
        println!("  Position:   x:{}, y:{}", face.x, face.y);
    }

    fn show_recognized(&self, user: &RecognizedUser) {
        let registered = user
            .registered_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| user.timestamp.clone());
        println!("Status: ✓ Recognized ({})", user.id);
        println!("  Name:       {}", or_na(user.field("name")));
        println!("  Age:        {}", or_na(user.field("age")));
        println!("  City:       {}", or_na(user.field("city")));
        println!("  Registered: {}", registered);
    }

    fn show_new_face(&self) {
        println!("Status: ✗ New Face");
        println!("Please fill in the registration form below or use voice collection.");
    }

    fn show_form(&self, form: &RegistrationForm) {
        println!("Registration form");
        for entry in form.entries() {
            println!(
                "  {:<12} {:<28} = {}",
                entry.field.name,
                entry.label(),
                if entry.is_filled() { entry.value.as_str() } else { "(empty)" }
            );
        }
        println!("  set <field> <value> | voice | submit | cancel");
    }

    fn hide_form(&self) {}

    fn set_controls(&self, controls: Controls) {
        tracing::debug!(?controls, "controls");
    }

    fn display_size(&self) -> Dimensions {
        self.display
    }
}

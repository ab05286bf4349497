//! Registration form built from the service's data template.

use crate::error::{KioskError, KioskResult};
use kiosk_voice::{CollectedData, FieldDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub struct FormEntry {
    pub field: FieldDescriptor,
    pub value: String,
}

impl FormEntry {
    /// Prompt if the template gave a non-blank one, otherwise the field name.
    pub fn label(&self) -> &str {
        self.field
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.field.name)
    }

    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// Ordered entries, one per template field. Every field is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    entries: Vec<FormEntry>,
}

impl RegistrationForm {
    pub fn from_fields(fields: &[FieldDescriptor]) -> Self {
        Self {
            entries: fields
                .iter()
                .map(|field| FormEntry {
                    field: field.clone(),
                    value: String::new(),
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[FormEntry] {
        &self.entries
    }

    pub fn fields(&self) -> Vec<FieldDescriptor> {
        self.entries.iter().map(|e| e.field.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.field.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> KioskResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.field.name == name)
            .ok_or_else(|| KioskError::UnknownField(name.to_string()))?;
        entry.value = value.into();
        Ok(())
    }

    /// Write collected values into the entries with matching names. Unknown keys are ignored.
    pub fn merge(&mut self, data: &CollectedData) -> usize {
        let mut written = 0;
        for entry in &mut self.entries {
            if let Some(value) = data.get(&entry.field.name) {
                entry.value = value.clone();
                written += 1;
            }
        }
        written
    }

    /// Names of required fields still empty, in form order.
    pub fn missing(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.is_filled())
            .map(|e| e.field.name.clone())
            .collect()
    }

    pub fn values(&self) -> CollectedData {
        self.entries
            .iter()
            .map(|e| (e.field.name.clone(), e.value.trim().to_string()))
            .collect()
    }

    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.value.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_voice::FieldType;

    fn form() -> RegistrationForm {
        RegistrationForm::from_fields(&[
            FieldDescriptor::new("name", "What is your name?", FieldType::String),
            FieldDescriptor::unprompted("age", FieldType::Integer),
        ])
    }

    #[test]
    fn labels_fall_back_to_name() {
        let f = form();
        assert_eq!(f.entries()[0].label(), "What is your name?");
        assert_eq!(f.entries()[1].label(), "age");
    }

    #[test]
    fn blank_prompt_labels_with_name() {
        let f = RegistrationForm::from_fields(&[
            FieldDescriptor {
                name: "city".into(),
                prompt: Some(String::new()),
                field_type: FieldType::String,
            },
            FieldDescriptor::new("pin", "   ", FieldType::Integer),
        ]);
        assert_eq!(f.entries()[0].label(), "city");
        assert_eq!(f.entries()[1].label(), "pin");
    }

    #[test]
    fn merge_ignores_unknown_keys() {
        let mut f = form();
        let mut data = CollectedData::new();
        data.insert("age".into(), "23".into());
        data.insert("shoe_size".into(), "9".into());
        assert_eq!(f.merge(&data), 1);
        assert_eq!(f.get("age"), Some("23"));
        assert_eq!(f.missing(), vec!["name".to_string()]);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut f = form();
        assert!(matches!(f.set("city", "Pune"), Err(KioskError::UnknownField(_))));
    }

    #[test]
    fn whitespace_counts_as_missing_and_reset_clears() {
        let mut f = form();
        f.set("name", "  ").unwrap();
        f.set("age", " 40 ").unwrap();
        assert_eq!(f.missing(), vec!["name".to_string()]);
        assert_eq!(f.values()["age"], "40");
        f.reset();
        assert_eq!(f.missing().len(), 2);
    }
}

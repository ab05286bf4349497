//! Field descriptors supplied by the template service and the data collected for them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stored for any field whose value could not be collected.
pub const NOT_PROVIDED: &str = "Not provided";

/// Declared value type of a registration field.
///
/// Unknown type names from the template are kept verbatim and validate permissively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Integer,
    Other(String),
}

impl Default for FieldType {
    fn default() -> Self {
        Self::String
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "string" => Self::String,
            "integer" => Self::Integer,
            _ => Self::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registration attribute: unique name, spoken prompt, value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            prompt: Some(prompt.into()),
            field_type,
        }
    }

    /// Descriptor without a template prompt; the default prompt is generated from the name.
    pub fn unprompted(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            prompt: None,
            field_type,
        }
    }

    /// The sentence spoken (and used as form label) for this field.
    pub fn spoken_prompt(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => crate::validation::default_prompt(&self.name),
        }
    }
}

/// Field name to value, one entry per field after a completed collection.
pub type CollectedData = BTreeMap<String, String>;

//! Values embedded in entity documents under `customFields.<refId>`.

use serde_json::Value;

/// Key of the embedded map inside each entity document.
pub const CUSTOM_FIELDS_KEY: &str = "customFields";

/// Stored JSON `null` means the field is present but currently empty (e.g. every selected option was deleted).
#[derive(Clone, Debug, PartialEq)]
pub enum EmbeddedValue {
    Absent,
    Empty,
    Populated(Value),
}

impl EmbeddedValue {
    pub fn read(document: &Value, ref_id: &str) -> Self {
        match document.get(CUSTOM_FIELDS_KEY).and_then(|m| m.get(ref_id)) {
            None => EmbeddedValue::Absent,
            Some(Value::Null) => EmbeddedValue::Empty,
            Some(v) => EmbeddedValue::Populated(v.clone()),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, EmbeddedValue::Absent)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            EmbeddedValue::Populated(v) => Some(v),
            _ => None,
        }
    }
}

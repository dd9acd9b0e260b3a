//! Field definition types matching the JSON wire format (camelCase attributes, SCREAMING_SNAKE enums).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default max size for `TEXTBOX_SHORT` when the definition omits one.
pub const SHORT_TEXT_MAX_SIZE: u32 = 150;
/// Default max size for `TEXTBOX_LONG` when the definition omits one.
pub const LONG_TEXT_MAX_SIZE: u32 = 1500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    SingleCheckbox,
    RadioButton,
    TextboxShort,
    TextboxLong,
    SingleSelectDropdown,
    MultiSelectDropdown,
    DatePicker,
    Number,
}

impl FieldType {
    /// Types whose values are option ids.
    pub fn is_selectable(self) -> bool {
        matches!(
            self,
            FieldType::RadioButton | FieldType::SingleSelectDropdown | FieldType::MultiSelectDropdown
        )
    }

    pub fn is_text(self) -> bool {
        matches!(self, FieldType::TextboxShort | FieldType::TextboxLong)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::SingleCheckbox => "SINGLE_CHECKBOX",
            FieldType::RadioButton => "RADIO_BUTTON",
            FieldType::TextboxShort => "TEXTBOX_SHORT",
            FieldType::TextboxLong => "TEXTBOX_LONG",
            FieldType::SingleSelectDropdown => "SINGLE_SELECT_DROPDOWN",
            FieldType::MultiSelectDropdown => "MULTI_SELECT_DROPDOWN",
            FieldType::DatePicker => "DATE_PICKER",
            FieldType::Number => "NUMBER",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextFormat {
    #[default]
    Text,
    Email,
    Url,
    Number,
}

impl fmt::Display for TextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextFormat::Text => "TEXT",
            TextFormat::Email => "EMAIL",
            TextFormat::Url => "URL",
            TextFormat::Number => "NUMBER",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(default)]
    pub field_format: TextFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortingOrder {
    Asc,
    Desc,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    /// `opt_<n>`; assigned by the server when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
    #[serde(default)]
    pub default: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>) -> Self {
        SelectOption {
            id: None,
            value: value.into(),
            default: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Id if present and not blank.
    pub fn assigned_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOptions {
    #[serde(default)]
    pub values: Vec<SelectOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting_order: Option<SortingOrder>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectField {
    #[serde(default)]
    pub multi_select: bool,
    #[serde(default)]
    pub options: SelectOptions,
    /// Highest option index ever assigned on this field. Server-managed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_option_id: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxField {
    #[serde(default)]
    pub default: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_username: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Key under `customFields` in entity documents. Assigned on create, immutable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub entity_type: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub is_repeatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_in_accordion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_field: Option<TextField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_field: Option<SelectField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkbox_field: Option<CheckboxField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType, entity_type: impl Into<String>) -> Self {
        FieldDefinition {
            id: None,
            name: name.into(),
            ref_id: None,
            field_type,
            entity_type: entity_type.into(),
            visible: true,
            required: false,
            is_repeatable: false,
            order: None,
            help_text: None,
            display_in_accordion: None,
            text_field: None,
            select_field: None,
            checkbox_field: None,
            metadata: None,
        }
    }

    /// Attach a select sub-structure with the given options.
    pub fn with_options(mut self, values: Vec<SelectOption>, sorting_order: Option<SortingOrder>) -> Self {
        self.select_field = Some(SelectField {
            multi_select: self.field_type == FieldType::MultiSelectDropdown,
            options: SelectOptions { values, sorting_order },
            highest_option_id: None,
        });
        self
    }

    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn ref_id_str(&self) -> &str {
        self.ref_id.as_deref().unwrap_or("")
    }

    pub fn is_selectable(&self) -> bool {
        self.field_type.is_selectable()
    }

    pub fn is_multi_select(&self) -> bool {
        self.select_field.as_ref().map(|s| s.multi_select).unwrap_or(false)
    }

    pub fn text_format(&self) -> Option<TextFormat> {
        self.text_field.as_ref().map(|t| t.field_format)
    }

    pub fn options(&self) -> &[SelectOption] {
        self.select_field
            .as_ref()
            .map(|s| s.options.values.as_slice())
            .unwrap_or(&[])
    }

    /// Assigned option ids in list order.
    pub fn option_ids(&self) -> Vec<&str> {
        self.options().iter().filter_map(SelectOption::assigned_id).collect()
    }

    pub fn default_option_ids(&self) -> Vec<String> {
        self.options()
            .iter()
            .filter(|o| o.default)
            .filter_map(|o| o.assigned_id().map(String::from))
            .collect()
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.option_ids().contains(&option_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_format_with_defaults() {
        let def: FieldDefinition = serde_json::from_value(json!({
            "name": "Department",
            "type": "MULTI_SELECT_DROPDOWN",
            "entityType": "user",
            "helpText": "pick some",
            "selectField": {
                "multiSelect": true,
                "options": {
                    "values": [{ "id": "opt_1", "value": "Sales", "default": true }, { "value": "HR" }],
                    "sortingOrder": "CUSTOM"
                }
            }
        }))
        .unwrap();
        assert_eq!(def.field_type, FieldType::MultiSelectDropdown);
        assert!(def.visible);
        assert!(!def.required);
        assert!(def.is_multi_select());
        assert_eq!(def.option_ids(), vec!["opt_1"]);
        assert_eq!(def.default_option_ids(), vec!["opt_1".to_string()]);
        assert!(def.has_option("opt_1"));
        assert!(!def.has_option("opt_2"));
    }

    #[test]
    fn serializes_camel_case_and_skips_absent_attributes() {
        let mut def = FieldDefinition::new("Due Date", FieldType::DatePicker, "user");
        def.ref_id = Some("dueDate".into());
        def.order = Some(3);
        let v = serde_json::to_value(&def).unwrap();
        assert_eq!(v["type"], "DATE_PICKER");
        assert_eq!(v["refId"], "dueDate");
        assert_eq!(v["entityType"], "user");
        assert_eq!(v["isRepeatable"], false);
        assert!(v.get("selectField").is_none());
        assert!(v.get("id").is_none());
    }

    #[test]
    fn blank_option_ids_count_as_unassigned() {
        let def = FieldDefinition::new("Colour", FieldType::RadioButton, "user").with_options(
            vec![SelectOption::new("red").with_id("  "), SelectOption::new("blue").with_id("opt_4")],
            None,
        );
        assert_eq!(def.option_ids(), vec!["opt_4"]);
    }

    #[test]
    fn text_format_defaults_to_text() {
        let tf: TextField = serde_json::from_value(json!({ "maxSize": 10 })).unwrap();
        assert_eq!(tf.field_format, TextFormat::Text);
        assert_eq!(tf.field_format.to_string(), "TEXT");
    }
}

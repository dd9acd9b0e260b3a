//! Definition rules and per-value validators.

use crate::config::FieldsConfig;
use crate::error::AppError;
use crate::model::{FieldDefinition, FieldType, TextFormat, LONG_TEXT_MAX_SIZE, SHORT_TEXT_MAX_SIZE};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

const URL_PATTERN: &str = r"^(https?|ftp)://[^\s/$.?#][^\s]*$";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A named check that only runs when its predicate holds.
pub struct DefinitionRule {
    pub name: &'static str,
    applies: fn(&FieldDefinition) -> bool,
    check: fn(&FieldDefinition, &FieldsConfig) -> Result<(), String>,
}

/// Evaluated in order; the first failure wins.
pub const DEFINITION_RULES: &[DefinitionRule] = &[
    DefinitionRule {
        name: "required_attributes",
        applies: |_| true,
        check: check_required_attributes,
    },
    DefinitionRule {
        name: "help_text_length",
        applies: |d| d.help_text.is_some(),
        check: check_help_text,
    },
    DefinitionRule {
        name: "display_in_accordion",
        applies: |d| d.display_in_accordion.is_some(),
        check: check_accordion,
    },
    DefinitionRule {
        name: "plain_type_attributes",
        applies: |d| {
            matches!(
                d.field_type,
                FieldType::DatePicker | FieldType::SingleCheckbox | FieldType::Number
            )
        },
        check: check_plain_type,
    },
    DefinitionRule {
        name: "text_attributes",
        applies: |d| d.field_type.is_text(),
        check: check_text,
    },
    DefinitionRule {
        name: "select_attributes",
        applies: |d| d.field_type.is_selectable(),
        check: check_select,
    },
];

fn check_required_attributes(def: &FieldDefinition, _: &FieldsConfig) -> Result<(), String> {
    if def.name.trim().is_empty() {
        return Err("name must not be blank".into());
    }
    if def.entity_type.trim().is_empty() {
        return Err("entityType must not be blank".into());
    }
    Ok(())
}

fn check_help_text(def: &FieldDefinition, config: &FieldsConfig) -> Result<(), String> {
    let len = def.help_text.as_deref().map(|h| h.chars().count()).unwrap_or(0);
    if len > config.help_text_max_length {
        return Err(format!(
            "helpText must be at most {} characters",
            config.help_text_max_length
        ));
    }
    Ok(())
}

fn check_accordion(def: &FieldDefinition, config: &FieldsConfig) -> Result<(), String> {
    let value = def.display_in_accordion.as_deref().unwrap_or("");
    match config.display_in_accordion.get(&def.entity_type) {
        None => Err(format!(
            "displayInAccordion is not supported for entity type '{}'",
            def.entity_type
        )),
        Some(allowed) if !allowed.iter().any(|a| a == value) => Err(format!(
            "displayInAccordion '{}' is not allowed for entity type '{}'",
            value, def.entity_type
        )),
        Some(_) => Ok(()),
    }
}

fn check_plain_type(def: &FieldDefinition, _: &FieldsConfig) -> Result<(), String> {
    if def.text_field.is_some() || def.select_field.is_some() {
        return Err(format!(
            "{} must not have textField or selectField",
            def.field_type
        ));
    }
    Ok(())
}

fn check_text(def: &FieldDefinition, _: &FieldsConfig) -> Result<(), String> {
    if def.select_field.is_some() {
        return Err(format!("{} must not have selectField", def.field_type));
    }
    if def.text_field.as_ref().and_then(|t| t.max_size) == Some(0) {
        return Err("textField.maxSize must be greater than 0".into());
    }
    Ok(())
}

fn check_select(def: &FieldDefinition, _: &FieldsConfig) -> Result<(), String> {
    let Some(select) = &def.select_field else {
        return Err(format!("{} requires selectField", def.field_type));
    };
    if def.text_field.is_some() {
        return Err(format!("{} must not have textField", def.field_type));
    }
    let values = &select.options.values;
    if values.is_empty() {
        return Err("selectField must have at least one option".into());
    }
    let multi = def.field_type == FieldType::MultiSelectDropdown;
    if select.multi_select != multi {
        return Err(format!(
            "selectField.multiSelect must be {} for {}",
            multi, def.field_type
        ));
    }
    if values.iter().any(|o| o.value.trim().is_empty()) {
        return Err("option values must not be blank".into());
    }
    let mut seen = HashSet::new();
    for id in values.iter().filter_map(|o| o.assigned_id()) {
        if !seen.insert(id) {
            return Err(format!("duplicate option id {}", id));
        }
    }
    if !multi && values.iter().filter(|o| o.default).count() > 1 {
        return Err(format!("{} allows at most one default option", def.field_type));
    }
    Ok(())
}

pub struct FieldValidator;

impl FieldValidator {
    /// Run every applicable rule in order.
    pub fn validate_definition(def: &FieldDefinition, config: &FieldsConfig) -> Result<(), AppError> {
        for rule in DEFINITION_RULES.iter().filter(|r| (r.applies)(def)) {
            if let Err(msg) = (rule.check)(def, config) {
                tracing::debug!(rule = rule.name, name = %def.name, "definition rejected");
                return Err(AppError::Validation(msg));
            }
        }
        Ok(())
    }

    /// Validate one embedded value against its definition. Null means empty and always passes.
    pub fn validate_value(value: &Value, def: &FieldDefinition) -> Result<(), AppError> {
        if value.is_null() {
            return Ok(());
        }
        let label = field_label(def);
        match (value, def.field_type) {
            (Value::Array(items), FieldType::MultiSelectDropdown) => {
                for item in items {
                    validate_option(item, def)?;
                }
                Ok(())
            }
            (_, FieldType::MultiSelectDropdown) => Err(AppError::Validation(format!(
                "{} must be a list of option ids",
                label
            ))),
            (Value::Array(items), _) if def.is_repeatable => {
                for item in items {
                    validate_single(item, def)?;
                }
                Ok(())
            }
            (Value::Array(_), _) => Err(AppError::Validation(format!(
                "{} does not accept multiple values",
                label
            ))),
            _ => validate_single(value, def),
        }
    }

    /// Validate an entity's `customFields` map: every key must name a definition and required fields must be set.
    pub fn validate_values(values: &Map<String, Value>, defs: &[FieldDefinition]) -> Result<(), AppError> {
        for (ref_id, value) in values {
            let def = defs
                .iter()
                .find(|d| d.ref_id_str() == ref_id)
                .ok_or_else(|| AppError::Validation(format!("custom field {} does not exist", ref_id)))?;
            Self::validate_value(value, def)?;
        }
        for def in defs.iter().filter(|d| d.required) {
            let missing = values.get(def.ref_id_str()).map(Value::is_null).unwrap_or(true);
            if missing {
                return Err(AppError::Validation(format!("{} is required", field_label(def))));
            }
        }
        Ok(())
    }
}

/// Type, entity type and text format never change after create.
pub fn ensure_immutable_attributes(stored: &FieldDefinition, submitted: &FieldDefinition) -> Result<(), AppError> {
    if stored.entity_type != submitted.entity_type {
        return Err(AppError::Validation(format!(
            "entityType of custom field {} cannot be changed from {} to {}",
            stored.id_str(),
            stored.entity_type,
            submitted.entity_type
        )));
    }
    if stored.field_type != submitted.field_type {
        return Err(AppError::Validation(format!(
            "type of custom field {} cannot be changed from {} to {}",
            stored.id_str(),
            stored.field_type,
            submitted.field_type
        )));
    }
    if stored.field_type.is_text() && stored.text_format() != submitted.text_format() {
        return Err(AppError::Validation(format!(
            "text format of custom field {} cannot be changed",
            stored.id_str()
        )));
    }
    Ok(())
}

pub fn ensure_selectable(def: &FieldDefinition) -> Result<(), AppError> {
    if !def.is_selectable() {
        return Err(AppError::Validation(format!(
            "custom field {} of type {} has no options",
            def.id_str(),
            def.field_type
        )));
    }
    Ok(())
}

pub fn ensure_has_option(def: &FieldDefinition, option_id: &str) -> Result<(), AppError> {
    if !def.has_option(option_id) {
        return Err(AppError::Validation(format!(
            "option {} does not exist on custom field {}",
            option_id,
            def.id_str()
        )));
    }
    Ok(())
}

fn field_label(def: &FieldDefinition) -> &str {
    match def.ref_id.as_deref() {
        Some(r) if !r.is_empty() => r,
        _ => &def.name,
    }
}

fn validate_single(value: &Value, def: &FieldDefinition) -> Result<(), AppError> {
    let label = field_label(def);
    match def.field_type {
        FieldType::TextboxShort | FieldType::TextboxLong => {
            let s = value
                .as_str()
                .ok_or_else(|| AppError::Validation(format!("{} must be a string", label)))?;
            let default_max = if def.field_type == FieldType::TextboxShort {
                SHORT_TEXT_MAX_SIZE
            } else {
                LONG_TEXT_MAX_SIZE
            };
            let text = def.text_field.clone().unwrap_or_default();
            let max = text.max_size.unwrap_or(default_max) as usize;
            if s.chars().count() > max {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    label, max
                )));
            }
            validate_format(label, s, text.field_format)
        }
        FieldType::DatePicker => {
            let s = value.as_str().unwrap_or("");
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(|_| ())
                .map_err(|_| AppError::Validation(format!("{} must be a date in YYYY-MM-DD format", label)))
        }
        FieldType::SingleCheckbox => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(AppError::Validation(format!("{} must be true or false", label)))
            }
        }
        FieldType::Number => {
            if value.as_f64().map(f64::is_finite).unwrap_or(false) {
                Ok(())
            } else {
                Err(AppError::Validation(format!("{} must be a number", label)))
            }
        }
        FieldType::RadioButton | FieldType::SingleSelectDropdown | FieldType::MultiSelectDropdown => {
            validate_option(value, def)
        }
    }
}

fn validate_option(value: &Value, def: &FieldDefinition) -> Result<(), AppError> {
    match value.as_str() {
        Some(id) if def.has_option(id) => Ok(()),
        _ => Err(AppError::Validation(format!(
            "{} must reference an option of the field, got {}",
            field_label(def),
            value
        ))),
    }
}

fn validate_format(label: &str, s: &str, format: TextFormat) -> Result<(), AppError> {
    match format {
        TextFormat::Text => {}
        TextFormat::Email => {
            if !s.contains('@') || s.len() < 3 {
                return Err(AppError::Validation(format!("{} must be a valid email", label)));
            }
        }
        TextFormat::Url => {
            let re = Regex::new(URL_PATTERN).map_err(|e| AppError::Validation(e.to_string()))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} must be a valid URL", label)));
            }
        }
        TextFormat::Number => {
            if s.trim().parse::<f64>().map(f64::is_finite) != Ok(true) {
                return Err(AppError::Validation(format!("{} must be numeric", label)));
            }
        }
    }
    Ok(())
}

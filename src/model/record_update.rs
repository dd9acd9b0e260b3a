//! Pending cascade produced by a definition update.

use crate::model::FieldDefinition;

/// Option ids dropped from a selectable field in one update. Never persisted.
#[derive(Clone, Debug)]
pub struct RecordUpdate {
    pub field: FieldDefinition,
    pub removed_option_ids: Vec<String>,
    pub default_option_ids: Vec<String>,
}

impl RecordUpdate {
    /// Diff stored options against the submitted definition.
    pub fn between(stored: &FieldDefinition, submitted: &FieldDefinition) -> Self {
        let kept = submitted.option_ids();
        let removed_option_ids = stored
            .option_ids()
            .into_iter()
            .filter(|id| !kept.contains(id))
            .map(String::from)
            .collect();
        RecordUpdate {
            field: submitted.clone(),
            removed_option_ids,
            default_option_ids: submitted.default_option_ids(),
        }
    }

    pub fn ref_id(&self) -> &str {
        self.field.ref_id_str()
    }

    pub fn is_multi_select(&self) -> bool {
        self.field.is_multi_select()
    }

    pub fn has_removals(&self) -> bool {
        !self.removed_option_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, SelectOption};

    fn radio(ids: &[&str]) -> FieldDefinition {
        let mut def = FieldDefinition::new("Colour", FieldType::RadioButton, "user").with_options(
            ids.iter().map(|id| SelectOption::new(*id).with_id(*id)).collect(),
            None,
        );
        def.ref_id = Some("colour".into());
        def
    }

    #[test]
    fn removed_ids_are_stored_minus_submitted() {
        let stored = radio(&["opt_1", "opt_2", "opt_3"]);
        let mut submitted = radio(&["opt_3", "opt_1"]);
        if let Some(sf) = submitted.select_field.as_mut() {
            sf.options.values[0].default = true;
        }
        let update = RecordUpdate::between(&stored, &submitted);
        assert_eq!(update.removed_option_ids, vec!["opt_2".to_string()]);
        assert_eq!(update.default_option_ids, vec!["opt_3".to_string()]);
        assert_eq!(update.ref_id(), "colour");
        assert!(update.has_removals());
    }

    #[test]
    fn reorder_only_removes_nothing() {
        let stored = radio(&["opt_1", "opt_2"]);
        let submitted = radio(&["opt_2", "opt_1"]);
        assert!(!RecordUpdate::between(&stored, &submitted).has_removals());
    }
}

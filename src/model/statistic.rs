use serde::Serialize;

/// Records carrying a value for a field, summed over every backing table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatistic {
    pub field_id: String,
    pub entity_type: String,
    pub count: u64,
}

/// Records whose value selects one option, summed over every backing table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionStatistic {
    pub field_id: String,
    pub option_id: String,
    pub entity_type: String,
    pub count: u64,
}

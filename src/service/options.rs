//! Option ids for selectable fields: sort policy, then `opt_<n>` for every option lacking an id.

use crate::model::{SelectField, SortingOrder};

pub const OPTION_ID_PREFIX: &str = "opt_";

/// `opt_12` -> 12. Ids outside the `opt_<positive>` shape yield `None`.
pub fn parse_option_index(id: &str) -> Option<u32> {
    id.strip_prefix(OPTION_ID_PREFIX)
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Stable sort by value for `ASC`/`DESC`; `CUSTOM` or no policy keeps the submitted order.
pub fn sort_options(select: &mut SelectField) {
    let values = &mut select.options.values;
    match select.options.sorting_order {
        Some(SortingOrder::Asc) => values.sort_by(|a, b| a.value.cmp(&b.value)),
        Some(SortingOrder::Desc) => values.sort_by(|a, b| b.value.cmp(&a.value)),
        Some(SortingOrder::Custom) | None => {}
    }
}

/// Highest index among the current option ids and the persisted high-water mark.
pub fn highest_option_index(select: &SelectField) -> u32 {
    let from_ids = select
        .options
        .values
        .iter()
        .filter_map(|o| o.assigned_id())
        .filter_map(parse_option_index)
        .max()
        .unwrap_or(0);
    from_ids.max(select.highest_option_id.unwrap_or(0))
}

/// Assign `opt_<n>` in list order to options without an id, starting above both the field's
/// own ids and `floor` (the stored field's high-water mark on update). Existing ids are kept.
pub fn generate_option_ids(select: &mut SelectField, floor: u32) {
    let mut next = highest_option_index(select).max(floor);
    for option in select.options.values.iter_mut() {
        if option.assigned_id().is_none() {
            next += 1;
            option.id = Some(format!("{}{}", OPTION_ID_PREFIX, next));
        }
    }
    select.highest_option_id = Some(next);
}

/// Clear every id not in `issued` so it is regenerated above the high-water mark.
/// Returns how many ids were cleared.
pub fn clear_unissued_option_ids(select: &mut SelectField, issued: &[&str]) -> usize {
    let mut cleared = 0;
    for option in select.options.values.iter_mut() {
        if matches!(option.assigned_id(), Some(id) if !issued.contains(&id)) {
            option.id = None;
            cleared += 1;
        }
    }
    cleared
}

/// Sort then assign ids.
pub fn prepare_options(select: &mut SelectField, floor: u32) {
    sort_options(select);
    generate_option_ids(select, floor);
}

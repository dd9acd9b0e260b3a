//! Definition search: filters, sort keys and the paged result.

use crate::error::AppError;
use crate::model::FieldDefinition;
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Order,
    Name,
    EntityType,
    RefId,
    Type,
}

impl SortField {
    /// Expression over the `jsonb` document column.
    pub fn sql_expr(self) -> &'static str {
        match self {
            SortField::Order => "(jsonb->>'order')::int",
            SortField::Name => "lower(jsonb->>'name')",
            SortField::EntityType => "jsonb->>'entityType'",
            SortField::RefId => "jsonb->>'refId'",
            SortField::Type => "jsonb->>'type'",
        }
    }

    fn compare(self, a: &FieldDefinition, b: &FieldDefinition) -> Ordering {
        match self {
            SortField::Order => a.order.cmp(&b.order),
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::EntityType => a.entity_type.cmp(&b.entity_type),
            SortField::RefId => a.ref_id_str().cmp(b.ref_id_str()),
            SortField::Type => a.field_type.as_str().cmp(b.field_type.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: Direction,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        SortKey {
            field,
            direction: Direction::Asc,
        }
    }
}

/// Parses `field` or `field:asc|desc`, e.g. `name:desc`.
impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, dir) = match s.split_once(':') {
            Some((n, d)) => (n.trim(), Some(d.trim())),
            None => (s.trim(), None),
        };
        let field = match name {
            "order" => SortField::Order,
            "name" => SortField::Name,
            "entityType" => SortField::EntityType,
            "refId" => SortField::RefId,
            "type" => SortField::Type,
            other => return Err(AppError::BadRequest(format!("unsupported sort field: {}", other))),
        };
        let direction = match dir.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(other) => return Err(AppError::BadRequest(format!("unsupported sort direction: {}", other))),
        };
        Ok(SortKey { field, direction })
    }
}

#[derive(Clone, Debug, Default)]
pub struct DefinitionQuery {
    pub entity_type: Option<String>,
    /// Case-insensitive substring match on `name`.
    pub name: Option<String>,
    pub sort: Vec<SortKey>,
}

impl DefinitionQuery {
    pub fn for_entity_type(entity_type: impl Into<String>) -> Self {
        DefinitionQuery {
            entity_type: Some(entity_type.into()),
            ..Default::default()
        }
    }

    /// Parse a comma-separated `sortBy` parameter.
    pub fn with_sort_param(mut self, sort_by: &str) -> Result<Self, AppError> {
        for part in sort_by.split(',').filter(|p| !p.trim().is_empty()) {
            self.sort.push(part.parse()?);
        }
        Ok(self)
    }

    /// Append `order` ascending unless the caller already sorts by it, so pages are deterministic.
    pub fn with_sort_by_order(mut self) -> Self {
        if !self.sort.iter().any(|k| k.field == SortField::Order) {
            self.sort.push(SortKey::asc(SortField::Order));
        }
        self
    }

    pub fn matches(&self, def: &FieldDefinition) -> bool {
        if let Some(et) = &self.entity_type {
            if &def.entity_type != et {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !def.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Sort keys in order, then id.
    pub fn compare(&self, a: &FieldDefinition, b: &FieldDefinition) -> Ordering {
        for key in &self.sort {
            let ord = key.field.compare(a, b);
            let ord = match key.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id_str().cmp(b.id_str())
    }

    pub fn sql_order_by(&self) -> String {
        let mut parts: Vec<String> = self
            .sort
            .iter()
            .map(|k| {
                let dir = match k.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("{} {}", k.field.sql_expr(), dir)
            })
            .collect();
        parts.push("id ASC".into());
        parts.join(", ")
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPage {
    pub custom_fields: Vec<FieldDefinition>,
    pub total_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn def(id: &str, name: &str, order: u32) -> FieldDefinition {
        let mut d = FieldDefinition::new(name, FieldType::TextboxShort, "user");
        d.id = Some(id.into());
        d.order = Some(order);
        d
    }

    #[test]
    fn parses_sort_keys() {
        let q = DefinitionQuery::default().with_sort_param("name:desc, refId").unwrap();
        assert_eq!(q.sort[0].field, SortField::Name);
        assert_eq!(q.sort[0].direction, Direction::Desc);
        assert_eq!(q.sort[1], SortKey::asc(SortField::RefId));
        assert!(DefinitionQuery::default().with_sort_param("colour").is_err());
        assert!(DefinitionQuery::default().with_sort_param("name:sideways").is_err());
    }

    #[test]
    fn order_key_appended_once() {
        let q = DefinitionQuery::default().with_sort_by_order().with_sort_by_order();
        assert_eq!(q.sort, vec![SortKey::asc(SortField::Order)]);
        assert_eq!(q.sql_order_by(), "(jsonb->>'order')::int ASC, id ASC");
    }

    #[test]
    fn compares_by_keys_then_id() {
        let q = DefinitionQuery::default()
            .with_sort_param("name")
            .unwrap()
            .with_sort_by_order();
        let mut defs = vec![def("c", "beta", 1), def("b", "Alpha", 3), def("a", "alpha", 3)];
        defs.sort_by(|x, y| q.compare(x, y));
        let ids: Vec<_> = defs.iter().map(|d| d.id_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn filters_by_entity_type_and_name() {
        let q = DefinitionQuery {
            name: Some("DUE".into()),
            ..DefinitionQuery::for_entity_type("user")
        };
        assert!(q.matches(&def("1", "Due date", 1)));
        assert!(!q.matches(&def("2", "Department", 2)));
        let mut other = def("3", "Due", 3);
        other.entity_type = "item".into();
        assert!(!q.matches(&other));
    }
}

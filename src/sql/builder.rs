//! Builds parameterized statements over `(id, jsonb)` document tables.

use crate::model::DefinitionQuery;
use crate::tenant::Tenant;

/// Table holding field definitions inside each tenant schema.
pub const DEFINITIONS_TABLE: &str = "custom_fields";

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Record table in the tenant's schema. `module.table` entries live in `<tenant>_<module>`,
/// bare names in `<tenant>_<default_module>`.
pub fn record_table(tenant: &Tenant, default_module: &str, table: &str) -> String {
    match table.split_once('.') {
        Some((module, t)) => qualified_table(&tenant.schema_name(module), t),
        None => qualified_table(&tenant.schema_name(default_module), table),
    }
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<String>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: String) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// JSON element matched against the embedded value: the id itself, or a one-element array for multi-select.
fn option_element(param: &str, multi_select: bool) -> String {
    if multi_select {
        format!("jsonb_build_array({}::text)", param)
    } else {
        format!("to_jsonb({}::text)", param)
    }
}

/// $1 = refId. Drops the key from every record that has it.
pub fn remove_key(table: &str) -> String {
    format!(
        "UPDATE {t} SET jsonb = jsonb_set(jsonb, '{{customFields}}', (jsonb->'customFields') - $1::text) \
         WHERE jsonb->'customFields' ? $1::text",
        t = table
    )
}

/// $1 = refId, $2 = removed option ids (text[]). Rewrites matching values in one statement;
/// a list left empty, or a single value removed, becomes JSON null.
pub fn prune_options(table: &str, multi_select: bool) -> String {
    let current = "(jsonb->'customFields'->$1::text)";
    format!(
        "UPDATE {t} SET jsonb = jsonb_set(jsonb, ARRAY['customFields', $1::text], \
         CASE WHEN jsonb_typeof({cur}) = 'array' AND jsonb_array_length({cur} - $2::text[]) > 0 \
         THEN {cur} - $2::text[] ELSE 'null'::jsonb END) \
         WHERE jsonb->'customFields' @> ANY(ARRAY(\
         SELECT jsonb_build_object($1::text, {elem}) FROM unnest($2::text[]) AS value))",
        t = table,
        cur = current,
        elem = option_element("value", multi_select)
    )
}

/// $1 = refId.
pub fn count_with_key(table: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE jsonb->'customFields' ? $1::text",
        table
    )
}

/// $1 = refId, $2 = option id.
pub fn count_with_option(table: &str, multi_select: bool) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE jsonb->'customFields' @> jsonb_build_object($1::text, {})",
        table,
        option_element("$2", multi_select)
    )
}

pub fn insert_definition(table: &str) -> String {
    format!("INSERT INTO {} (id, jsonb) VALUES ($1, $2)", table)
}

pub fn select_definition_by_id(table: &str) -> String {
    format!("SELECT jsonb FROM {} WHERE id = $1", table)
}

pub fn update_definition(table: &str) -> String {
    format!("UPDATE {} SET jsonb = $2 WHERE id = $1", table)
}

pub fn delete_definition(table: &str) -> String {
    format!("DELETE FROM {} WHERE id = $1", table)
}

pub fn max_order(table: &str) -> String {
    format!(
        "SELECT COALESCE(MAX((jsonb->>'order')::int), 0) FROM {}",
        table
    )
}

/// $1 = anchored regex over the slug family.
pub fn select_ref_ids_matching(table: &str) -> String {
    format!(
        "SELECT jsonb->>'refId' FROM {} WHERE jsonb->>'refId' ~ $1",
        table
    )
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn where_clause(query: &DefinitionQuery, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    if let Some(et) = &query.entity_type {
        let n = q.push_param(et.clone());
        parts.push(format!("jsonb->>'entityType' = ${}", n));
    }
    if let Some(name) = &query.name {
        let n = q.push_param(format!("%{}%", escape_like(&name.to_lowercase())));
        parts.push(format!("lower(jsonb->>'name') LIKE ${}", n));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// Page of definitions. Offset and limit are inlined as integers; `None` limit reads to the end.
pub fn select_definitions(table: &str, query: &DefinitionQuery, offset: u32, limit: Option<u32>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let filter = where_clause(query, &mut q);
    let mut sql = format!(
        "SELECT jsonb FROM {}{} ORDER BY {} OFFSET {}",
        table,
        filter,
        query.sql_order_by(),
        offset
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    q.sql = sql;
    q
}

pub fn count_definitions(table: &str, query: &DefinitionQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let filter = where_clause(query, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, filter);
    q
}

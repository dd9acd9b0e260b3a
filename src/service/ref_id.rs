//! Reference id allocation: name -> slug -> `slug` or `slug_<n>`.

use crate::error::AppError;
use crate::store::DefinitionRepository;
use crate::tenant::Tenant;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Title-case each word, strip diacritics and non-letters, drop whitespace, lower-case the first letter.
/// `"Due Date"` -> `"dueDate"`, `"Café owner"` -> `"cafeOwner"`.
pub fn slugify(name: &str) -> String {
    let titled: String = name
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    let letters: String = titled
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii_alphabetic)
        .collect();
    let mut chars = letters.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Anchored pattern for the slug's family: the bare slug or `slug_<n>` with n >= 2.
/// Written in the subset shared by Rust `regex` and PostgreSQL `~`.
pub fn ref_id_pattern(slug: &str) -> String {
    format!("^{}(_([2-9]|[1-9][0-9]+))?$", regex::escape(slug))
}

/// Highest suffix used by the family. A lone bare slug counts as suffix 1.
pub fn max_suffix<'a>(slug: &str, ref_ids: impl IntoIterator<Item = &'a str>) -> Result<u32, AppError> {
    let re = Regex::new(&ref_id_pattern(slug)).map_err(|e| AppError::Validation(e.to_string()))?;
    let family: Vec<&str> = ref_ids.into_iter().filter(|r| re.is_match(r)).collect();
    if family.len() == 1 && !family[0].contains('_') {
        return Ok(1);
    }
    Ok(family
        .iter()
        .filter_map(|r| r.rsplit_once('_'))
        .filter_map(|(_, n)| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0))
}

pub fn compose_ref_id(slug: &str, max: u32) -> String {
    if max < 1 {
        slug.to_string()
    } else {
        format!("{}_{}", slug, max + 1)
    }
}

/// Next free refId for `name`. Run in the transaction that inserts the definition;
/// a concurrent insert of the same refId surfaces as a conflict from the unique index.
pub async fn allocate<R: DefinitionRepository>(
    repo: &R,
    tenant: &Tenant,
    name: &str,
    tx: Option<&mut R::Tx>,
) -> Result<String, AppError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::Validation(format!(
            "name '{}' must contain at least one latin letter",
            name
        )));
    }
    let max = repo.max_ref_id(tenant, &slug, tx).await?;
    let ref_id = compose_ref_id(&slug, max);
    tracing::debug!(tenant = %tenant, slug = %slug, max, ref_id = %ref_id, "allocated refId");
    Ok(ref_id)
}

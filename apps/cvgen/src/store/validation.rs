//! Store validation: turns the loosely-shaped persisted JSON into typed records.
//!
//! Structural problems (unparseable document, wrong top-level shapes, duplicate
//! ids) are fatal `MalformedStore` errors. A single bad entry is not: it comes
//! back as a `MissingField` issue and the rest of the store still loads.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::AppError;
use crate::models::store::slugify;
use crate::models::{
    ContactInfo, DocType, Entry, Meta, Score, SkillCategory, SkillItem, Store, TextBlock,
};

/// A loaded store plus the entries that were dropped on the way in.
#[derive(Debug)]
pub struct LoadedStore {
    pub store: Store,
    pub skipped: Vec<AppError>,
}

pub fn parse_store(root: Value, path: &Path) -> Result<LoadedStore, AppError> {
    let obj = root
        .as_object()
        .ok_or_else(|| AppError::malformed(path, "top level must be a JSON object"))?;

    let meta = match obj.get("meta") {
        None | Some(Value::Null) => Meta::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| AppError::malformed(path, format!("meta: {e}")))?,
    };

    let contact_info = parse_contact_info(obj.get("contact_info"), path)?;

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    let mut seen_ids = HashSet::new();
    for (index, raw) in array_field(obj, "entries", path)?.iter().enumerate() {
        match parse_entry(raw, index) {
            Ok(entry) => {
                if !seen_ids.insert(entry.id.clone()) {
                    return Err(AppError::malformed(
                        path,
                        format!("duplicate entry id '{}'", entry.id),
                    ));
                }
                entries.push(entry);
            }
            Err(e) => {
                warn!("{e}");
                skipped.push(e);
            }
        }
    }

    let skills = array_field(obj, "skills", path)?
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_skill_category(raw, index, path))
        .collect::<Result<Vec<_>, _>>()?;

    let text_blocks = array_field(obj, "text_blocks", path)?
        .iter()
        .enumerate()
        .map(|(index, raw)| parse_text_block(raw, index, path))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadedStore {
        store: Store {
            meta,
            contact_info,
            entries,
            skills,
            text_blocks,
        },
        skipped,
    })
}

/// Validates one `entries[i]` object.
pub fn parse_entry(raw: &Value, index: usize) -> Result<Entry, AppError> {
    let label = raw
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index}"));

    let obj = raw
        .as_object()
        .ok_or_else(|| missing(&label, "entry", "must be an object"))?;

    let id = required_text(obj, "id", &label)?;
    if id.is_empty() {
        return Err(missing(&label, "id", "must not be empty"));
    }
    let section = required_text(obj, "section", &label)?;
    let title = required_text(obj, "title", &label)?;
    let descriptions = string_list(obj, "descriptions", &label)?
        .ok_or_else(|| missing(&label, "descriptions", "is missing"))?;
    let tags =
        string_list(obj, "tags", &label)?.ok_or_else(|| missing(&label, "tags", "is missing"))?;
    let importance = match obj.get("importance") {
        None | Some(Value::Null) => return Err(missing(&label, "importance", "is missing")),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| missing(&label, "importance", "must be an integer"))?,
    };

    let relevance_score = match obj.get("relevance_score") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .and_then(Score::from_f64)
                .ok_or_else(|| missing(&label, "relevance_score", "must be a number in 0..=10"))?,
        ),
    };

    let (doc_types, skill_tags) = split_tags(tags);

    Ok(Entry {
        id,
        section,
        title,
        institution: optional_text(obj, "institution").unwrap_or_default(),
        location: optional_text(obj, "loc")
            .or_else(|| optional_text(obj, "location"))
            .unwrap_or_default(),
        start: optional_text(obj, "start").filter(|s| !s.is_empty()),
        end: optional_text(obj, "end").filter(|s| !s.is_empty()),
        descriptions,
        doc_types,
        skill_tags,
        companies: string_list(obj, "companies", &label)?
            .unwrap_or_default()
            .into_iter()
            .collect(),
        importance,
        relevance_score,
        relevance_reasoning: optional_text(obj, "relevance_reasoning"),
        original_descriptions: string_list(obj, "original_descriptions", &label)?,
    })
}

/// Splits a persisted tag list into doc-type markers and skill tags.
pub fn split_tags<I, S>(tags: I) -> (BTreeSet<DocType>, BTreeSet<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut doc_types = BTreeSet::new();
    let mut skill_tags = BTreeSet::new();
    for tag in tags {
        let tag = tag.into();
        match DocType::from_tag(&tag) {
            Some(d) => {
                doc_types.insert(d);
            }
            None => {
                skill_tags.insert(tag);
            }
        }
    }
    (doc_types, skill_tags)
}

fn parse_skill_category(raw: &Value, index: usize, path: &Path) -> Result<SkillCategory, AppError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| AppError::malformed(path, format!("skills[{index}] must be an object")))?;

    let name = obj
        .get("category")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::malformed(path, format!("skills[{index}] has no category name")))?
        .to_string();

    let id = optional_text(obj, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| slugify(&name));

    let order = obj
        .get("order")
        .and_then(Value::as_u64)
        .and_then(|o| u32::try_from(o).ok())
        .unwrap_or(index as u32);

    let raw_items = match obj.get("entries").or_else(|| obj.get("skills")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(AppError::malformed(
                path,
                format!("skills[{index}] entries must be an array"),
            ))
        }
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (item_index, item) in raw_items.iter().enumerate() {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::malformed(
                    path,
                    format!("skills[{index}].entries[{item_index}] has no name"),
                )
            })?
            .to_string();
        let level = item.get("level").and_then(value_text).unwrap_or_default();
        items.push(SkillItem { name, level });
    }

    Ok(SkillCategory {
        id,
        name,
        order,
        code: obj.get("code").and_then(Value::as_bool).unwrap_or(false),
        doc_types: doc_types_or_all(obj.get("tags")),
        items,
    })
}

fn parse_text_block(raw: &Value, index: usize, path: &Path) -> Result<TextBlock, AppError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| {
            AppError::malformed(path, format!("text_blocks[{index}] must be an object"))
        })?;

    let id = optional_text(obj, "id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::malformed(path, format!("text_blocks[{index}] has no id")))?;
    let content = optional_text(obj, "content")
        .or_else(|| optional_text(obj, "text"))
        .unwrap_or_default();

    let tags: Vec<String> = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    // Unlike skill categories, a block without a doc-type tag is in no document.
    let (doc_types, extra_tags) = split_tags(tags);

    Ok(TextBlock {
        id,
        content,
        doc_types,
        tags: extra_tags,
    })
}

fn parse_contact_info(raw: Option<&Value>, path: &Path) -> Result<Vec<ContactInfo>, AppError> {
    let obj = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(obj)) => obj,
        Some(_) => return Err(AppError::malformed(path, "contact_info must be an object")),
    };

    obj.iter()
        .map(|(label, value)| match value {
            Value::String(s) => Ok(ContactInfo {
                label: label.clone(),
                icon: None,
                value: s.clone(),
            }),
            Value::Object(fields) => {
                let value = fields
                    .get("value")
                    .or_else(|| fields.get("contact"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AppError::malformed(path, format!("contact_info.{label} has no value"))
                    })?;
                Ok(ContactInfo {
                    label: label.clone(),
                    icon: fields
                        .get("icon")
                        .and_then(Value::as_str)
                        .filter(|i| !i.is_empty())
                        .map(str::to_string),
                    value: value.to_string(),
                })
            }
            _ => Err(AppError::malformed(
                path,
                format!("contact_info.{label} must be a string or an object"),
            )),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Field helpers
// ────────────────────────────────────────────────────────────────────────────

fn missing(entry: &str, field: &'static str, reason: &'static str) -> AppError {
    AppError::MissingField {
        entry: entry.to_string(),
        field,
        reason,
    }
}

fn array_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &Path,
) -> Result<&'a [Value], AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(AppError::malformed(path, format!("'{key}' must be an array"))),
    }
}

/// Strings as-is, numbers stringified (years are often written bare).
fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(value_text)
}

fn required_text(
    obj: &Map<String, Value>,
    key: &'static str,
    label: &str,
) -> Result<String, AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(missing(label, key, "is missing")),
        Some(v) => value_text(v).ok_or_else(|| missing(label, key, "must be a string")),
    }
}

fn string_list(
    obj: &Map<String, Value>,
    key: &'static str,
    label: &str,
) -> Result<Option<Vec<String>>, AppError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| missing(label, key, "must be an array of strings"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(missing(label, key, "must be an array of strings")),
    }
}

/// Doc-types from an optional tag list; an untagged skill category belongs
/// to every document.
fn doc_types_or_all(tags: Option<&Value>) -> BTreeSet<DocType> {
    match tags.and_then(Value::as_array) {
        Some(tags) => tags
            .iter()
            .filter_map(Value::as_str)
            .filter_map(DocType::from_tag)
            .collect(),
        None => DocType::ALL.into_iter().collect(),
    }
}

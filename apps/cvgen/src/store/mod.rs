//! Entry Store: loads the persisted career database and writes derived copies.
//!
//! Loading is a pure read; nothing here ever rewrites the source file.

pub mod validation;

use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::export::writer::persist_bytes;
use crate::models::{Entry, Store};

pub use validation::LoadedStore;

/// Reads and validates a store file.
pub fn load(path: &Path) -> Result<LoadedStore, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::malformed(path, format!("cannot read file: {e}")))?;
    let root: Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::malformed(path, format!("invalid JSON: {e}")))?;

    let loaded = validation::parse_store(root, path)?;
    info!(
        "Loaded {} entries, {} skill categories, {} text blocks from {}",
        loaded.store.entries.len(),
        loaded.store.skills.len(),
        loaded.store.text_blocks.len(),
        path.display()
    );
    if !loaded.skipped.is_empty() {
        warn!(
            "Skipped {} malformed entries in {}",
            loaded.skipped.len(),
            path.display()
        );
    }
    Ok(loaded)
}

/// Writes the store in its persisted layout.
pub fn save(store: &Store, path: &Path) -> Result<(), AppError> {
    let mut body = serde_json::to_string_pretty(&to_json(store))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize store: {e}")))?;
    body.push('\n');
    persist_bytes(path, body.as_bytes())?;
    info!("Wrote {} entries to {}", store.entries.len(), path.display());
    Ok(())
}

pub fn to_json(store: &Store) -> Value {
    let contact_info: Map<String, Value> = store
        .contact_info
        .iter()
        .map(|c| {
            let value = match &c.icon {
                Some(icon) => json!({ "value": c.value, "icon": icon }),
                None => Value::from(c.value.clone()),
            };
            (c.label.clone(), value)
        })
        .collect();

    let skills: Vec<Value> = store
        .skills
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "category": s.name,
                "order": s.order,
                "code": s.code,
                "entries": s.items,
                "tags": s.doc_types.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();

    let text_blocks: Vec<Value> = store
        .text_blocks
        .iter()
        .map(|b| {
            let tags: Vec<String> = b
                .doc_types
                .iter()
                .map(|d| d.as_str().to_string())
                .chain(b.tags.iter().cloned())
                .collect();
            json!({ "id": b.id, "content": b.content, "tags": tags })
        })
        .collect();

    json!({
        "meta": store.meta,
        "contact_info": contact_info,
        "entries": store.entries.iter().map(entry_to_json).collect::<Vec<_>>(),
        "skills": skills,
        "text_blocks": text_blocks,
    })
}

fn entry_to_json(entry: &Entry) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), entry.id.clone().into());
    obj.insert("section".into(), entry.section.clone().into());
    obj.insert("title".into(), entry.title.clone().into());
    obj.insert("institution".into(), entry.institution.clone().into());
    obj.insert("loc".into(), entry.location.clone().into());
    if let Some(start) = &entry.start {
        obj.insert("start".into(), start.clone().into());
    }
    if let Some(end) = &entry.end {
        obj.insert("end".into(), end.clone().into());
    }
    obj.insert("descriptions".into(), json!(entry.descriptions));
    obj.insert("tags".into(), json!(entry.tags()));
    obj.insert("companies".into(), json!(entry.companies));
    obj.insert("importance".into(), entry.importance.into());
    if let Some(score) = entry.relevance_score {
        obj.insert("relevance_score".into(), score.value().into());
    }
    if let Some(reasoning) = &entry.relevance_reasoning {
        obj.insert("relevance_reasoning".into(), reasoning.clone().into());
    }
    if let Some(original) = &entry.original_descriptions {
        obj.insert("original_descriptions".into(), json!(original));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactInfo, DocType, SkillCategory, SkillItem, TextBlock};
    use std::collections::BTreeSet;

    fn sample_store() -> Store {
        let mut scored = Entry::new("tool", "software", "cvgen")
            .with_tags(&["cv", "rust"])
            .with_descriptions(&["Rewritten bullet"])
            .with_score(8);
        scored.original_descriptions = Some(vec!["Original bullet".to_string()]);
        scored.relevance_reasoning = Some("Matches Rust".to_string());

        Store {
            contact_info: vec![ContactInfo {
                label: "website".to_string(),
                icon: Some("globe".to_string()),
                value: "example.com".to_string(),
            }],
            entries: vec![
                Entry::new("phd", "education", "PhD")
                    .with_tags(&["cv", "resume"])
                    .with_companies(&["biotech"])
                    .with_importance(7),
                scored,
            ],
            skills: vec![SkillCategory {
                id: "languages".to_string(),
                name: "Languages".to_string(),
                order: 0,
                code: true,
                doc_types: BTreeSet::from([DocType::Cv]),
                items: vec![SkillItem {
                    name: "Rust".to_string(),
                    level: "5".to_string(),
                }],
            }],
            text_blocks: vec![TextBlock {
                id: "intro".to_string(),
                content: "Hello".to_string(),
                doc_types: BTreeSet::from([DocType::Resume]),
                tags: BTreeSet::new(),
            }],
            ..Store::default()
        }
    }

    #[test]
    fn test_save_then_load_preserves_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.json");
        let store = sample_store();

        save(&store, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.store, store);
    }

    #[test]
    fn test_unscored_entries_omit_score_fields() {
        let value = to_json(&sample_store());
        let first = &value["entries"][0];
        assert!(first.get("relevance_score").is_none());
        assert!(first.get("original_descriptions").is_none());
        assert_eq!(value["entries"][1]["relevance_score"], 8);
    }

    #[test]
    fn test_missing_file_is_malformed() {
        let err = load(Path::new("/nonexistent/cv.json")).unwrap_err();
        assert!(matches!(err, AppError::MalformedStore { .. }));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cv.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }
}

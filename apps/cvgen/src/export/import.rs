//! Reads exported CSV tables back into a store.
//!
//! Accepts hand-edited spreadsheets. Explanation rows are optional, a missing
//! file yields an empty collection and blank cells count as absent.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::export::{
    ASIDE_ENTRIES_FILE, ASIDE_SECTIONS_FILE, COMPANY_COLUMN_PREFIX, CONTACT_INFO_FILE,
    DESCRIPTION_COLUMN_PREFIX, ENTRIES_FILE, TEXT_BLOCKS_FILE,
};
use crate::models::{ContactInfo, DocType, Entry, Meta, SkillCategory, SkillItem, Store, TextBlock};

const TRUTHY: [&str; 5] = ["TRUE", "T", "YES", "Y", "1"];

pub fn truthy(cell: &str) -> bool {
    let cell = cell.trim();
    TRUTHY.iter().any(|t| t.eq_ignore_ascii_case(cell))
}

struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Trimmed, non-blank cell value.
    fn get<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == column)?;
        row.get(index).map(|c| c.trim()).filter(|c| !c.is_empty())
    }

    /// Untrimmed cell value, empty when the column or cell is missing.
    fn raw<'a>(&self, row: &'a [String], column: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|index| row.get(index))
            .map_or("", String::as_str)
    }

    /// Doc-type flags of a row; tables without flag columns mean "both".
    fn doc_types(&self, row: &[String]) -> BTreeSet<DocType> {
        if !self.has_column("in_cv") && !self.has_column("in_resume") {
            return BTreeSet::from(DocType::ALL);
        }
        let mut doc_types = BTreeSet::new();
        if !self.has_column("in_cv") || self.get(row, "in_cv").is_some_and(truthy) {
            doc_types.insert(DocType::Cv);
        }
        if self.get(row, "in_resume").is_some_and(truthy) {
            doc_types.insert(DocType::Resume);
        }
        doc_types
    }
}

/// Reads `path`; the header is the first row whose first cell is
/// `first_column`, anything above it is explanation.
fn read_table(path: &Path, first_column: &str) -> Result<Option<RawTable>, AppError> {
    if !path.exists() {
        warn!("{} not found, treating it as empty", path.display());
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let header_index = records
        .iter()
        .position(|r| r.first().map(|c| c.trim()) == Some(first_column))
        .unwrap_or(0);
    let mut rows = records.into_iter().skip(header_index);
    let Some(headers) = rows.next() else {
        return Ok(None);
    };

    Ok(Some(RawTable {
        headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
        rows: rows
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .collect(),
    }))
}

/// Rebuilds a store from the five exported tables in `dir`.
pub fn import_tables(dir: &Path) -> Result<Store, AppError> {
    if !dir.is_dir() {
        return Err(AppError::Config(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let entries = read_table(&dir.join(ENTRIES_FILE), "section")?
        .map(|t| parse_entries(&t))
        .unwrap_or_default();
    let mut skills = read_table(&dir.join(ASIDE_SECTIONS_FILE), "section_id")?
        .map(|t| parse_skill_sections(&t))
        .unwrap_or_default();
    if let Some(table) = read_table(&dir.join(ASIDE_ENTRIES_FILE), "section_id")? {
        attach_skill_items(&table, &mut skills);
    }
    let text_blocks = read_table(&dir.join(TEXT_BLOCKS_FILE), "id")?
        .map(|t| parse_text_blocks(&t))
        .unwrap_or_default();
    let contact_info = read_table(&dir.join(CONTACT_INFO_FILE), "loc")?
        .map(|t| parse_contact_info(&t))
        .unwrap_or_default();

    let mut meta = Meta {
        last_updated: Some(chrono::Local::now().format("%Y-%m-%d").to_string()),
        ..Meta::default()
    };
    meta.extra
        .insert("generated_by".to_string(), Value::from("cvgen import"));

    info!(
        "Imported {} entries, {} skill categories, {} text blocks from {}",
        entries.len(),
        skills.len(),
        text_blocks.len(),
        dir.display()
    );

    Ok(Store {
        meta,
        contact_info,
        entries,
        skills,
        text_blocks,
    })
}

fn parse_entries(table: &RawTable) -> Vec<Entry> {
    let mut description_columns: Vec<(u32, &str)> = table
        .headers
        .iter()
        .filter_map(|h| {
            let n = h.strip_prefix(DESCRIPTION_COLUMN_PREFIX)?.parse().ok()?;
            Some((n, h.as_str()))
        })
        .collect();
    description_columns.sort_by_key(|(n, _)| *n);
    let company_columns: Vec<(&str, &str)> = table
        .headers
        .iter()
        .filter_map(|h| Some((h.strip_prefix(COMPANY_COLUMN_PREFIX)?, h.as_str())))
        .filter(|(name, _)| !name.is_empty())
        .collect();

    let total = table.rows.len();
    let mut seen_ids = HashSet::new();
    let mut entries = Vec::with_capacity(total);

    for (i, row) in table.rows.iter().enumerate() {
        let Some(section) = table.get(row, "section") else {
            warn!("Row {} of {ENTRIES_FILE} has no section, skipping", i + 1);
            continue;
        };
        let base_id = table
            .get(row, "id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{section}-{}", i + 1));
        let mut id = base_id.clone();
        let mut suffix = 2;
        while !seen_ids.insert(id.clone()) {
            id = format!("{base_id}-{suffix}");
            suffix += 1;
        }

        let mut entry = Entry::new(id, section, table.get(row, "title").unwrap_or_default());
        entry.location = table.get(row, "loc").unwrap_or_default().to_string();
        entry.institution = table.get(row, "institution").unwrap_or_default().to_string();
        entry.start = table.get(row, "start").map(str::to_string);
        entry.end = table.get(row, "end").map(str::to_string);
        entry.descriptions = description_cells(table, row, &description_columns);
        entry.companies = company_columns
            .iter()
            .filter(|(_, column)| table.get(row, column).is_some_and(truthy))
            .map(|(name, _)| name.to_string())
            .collect();
        entry.doc_types = table.doc_types(row);
        entry.importance = table
            .get(row, "importance")
            .and_then(|v| v.parse().ok())
            .unwrap_or((total - i) as i64);
        entries.push(entry);
    }
    entries
}

/// Bullets in column order, kept verbatim. Only the blank padding after the
/// last written bullet is dropped.
fn description_cells(table: &RawTable, row: &[String], columns: &[(u32, &str)]) -> Vec<String> {
    let mut cells: Vec<String> = columns
        .iter()
        .map(|(_, column)| table.raw(row, column).to_string())
        .collect();
    while cells.last().is_some_and(|c| c.trim().is_empty()) {
        cells.pop();
    }
    cells
}

fn parse_skill_sections(table: &RawTable) -> Vec<SkillCategory> {
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let id = table.get(row, "section_id")?;
            Some(SkillCategory {
                id: id.to_string(),
                name: table.get(row, "section_name").unwrap_or(id).to_string(),
                order: i as u32,
                code: false,
                doc_types: table.doc_types(row),
                items: Vec::new(),
            })
        })
        .collect()
}

fn attach_skill_items(table: &RawTable, skills: &mut Vec<SkillCategory>) {
    for row in &table.rows {
        let (Some(section_id), Some(name)) =
            (table.get(row, "section_id"), table.get(row, "skill_name"))
        else {
            continue;
        };
        let item = SkillItem {
            name: name.to_string(),
            level: table.get(row, "level").unwrap_or_default().to_string(),
        };
        if let Some(index) = skills.iter().position(|s| s.id == section_id) {
            skills[index].items.push(item);
            continue;
        }
        warn!("Skill '{name}' names unknown section '{section_id}', creating it");
        let order = skills.len() as u32;
        skills.push(SkillCategory {
            id: section_id.to_string(),
            name: section_id.to_string(),
            order,
            code: false,
            doc_types: table.doc_types(row),
            items: vec![item],
        });
    }
}

fn parse_text_blocks(table: &RawTable) -> Vec<TextBlock> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            Some(TextBlock {
                id: table.get(row, "id")?.to_string(),
                content: table.get(row, "text").unwrap_or_default().to_string(),
                doc_types: table.doc_types(row),
                tags: BTreeSet::new(),
            })
        })
        .collect()
}

fn parse_contact_info(table: &RawTable) -> Vec<ContactInfo> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            Some(ContactInfo {
                label: table.get(row, "loc")?.to_string(),
                icon: table.get(row, "icon").map(str::to_string),
                value: table.get(row, "contact").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{export, tests::sample_document, writer::write_tables};

    #[test]
    fn test_truthy_variants() {
        for cell in ["TRUE", "true", "T", "yes", "Y", "1", " True "] {
            assert!(truthy(cell), "{cell}");
        }
        for cell in ["FALSE", "0", "no", "", "maybe"] {
            assert!(!truthy(cell), "{cell}");
        }
    }

    #[test]
    fn test_round_trip_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document();
        write_tables(&export(&document).unwrap(), dir.path()).unwrap();

        let imported = import_tables(dir.path()).unwrap();
        assert_eq!(imported.entries.len(), document.entries.len());
        for (original, back) in document.entries.iter().zip(&imported.entries) {
            assert_eq!(back.id, original.id);
            assert_eq!(back.section, original.section);
            assert_eq!(back.descriptions, original.descriptions);
            assert_eq!(back.doc_types, original.doc_types);
            assert_eq!(back.companies, original.companies);
            assert_eq!(back.importance, original.importance);
            assert_eq!(back.start, original.start);
        }
    }

    #[test]
    fn test_round_trip_preserves_aside_and_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let document = sample_document();
        write_tables(&export(&document).unwrap(), dir.path()).unwrap();

        let imported = import_tables(dir.path()).unwrap();
        let names: Vec<_> = imported.skills.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(names, vec!["languages", "tools"]);
        assert_eq!(imported.skills[0].items.len(), 2);
        assert_eq!(imported.skills[1].doc_types, BTreeSet::from([DocType::Cv]));
        assert_eq!(imported.text_blocks, document.text_blocks);
        assert_eq!(imported.contact_info, document.contact_info);
        assert!(imported.meta.last_updated.is_some());
    }

    #[test]
    fn test_round_trip_keeps_blank_and_padded_bullets() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = sample_document();
        document.entries[1].descriptions =
            vec!["first".to_string(), String::new(), "  indented third ".to_string()];
        write_tables(&export(&document).unwrap(), dir.path()).unwrap();

        let imported = import_tables(dir.path()).unwrap();
        assert_eq!(imported.entries[1].descriptions, document.entries[1].descriptions);
        assert_eq!(imported.entries[0].descriptions, document.entries[0].descriptions);
    }

    #[test]
    fn test_hand_edited_entries_without_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ENTRIES_FILE),
            "section,title,description_2,description_1,in_resume,company_acme\n\
             software,Tool,second,first,yes,1\n\
             ,,,,,\n\
             software,Other,,only,no,0\n",
        )
        .unwrap();

        let imported = import_tables(dir.path()).unwrap();
        assert_eq!(imported.entries.len(), 2);
        let tool = &imported.entries[0];
        assert_eq!(tool.id, "software-1");
        assert_eq!(tool.descriptions, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(tool.doc_types, BTreeSet::from(DocType::ALL));
        assert!(tool.has_company("acme"));
        assert_eq!(tool.importance, 2);

        let other = &imported.entries[1];
        assert_eq!(other.descriptions, vec!["only".to_string()]);
        assert_eq!(other.doc_types, BTreeSet::from([DocType::Cv]));
        assert!(other.companies.is_empty());
        assert!(imported.skills.is_empty());
    }

    #[test]
    fn test_duplicate_ids_get_suffixed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ENTRIES_FILE),
            "section,title,id\neducation,BSc,deg\neducation,MSc,deg\n",
        )
        .unwrap();
        let imported = import_tables(dir.path()).unwrap();
        let ids: Vec<_> = imported.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["deg", "deg-2"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        assert!(import_tables(Path::new("/nonexistent/tables")).is_err());
    }
}

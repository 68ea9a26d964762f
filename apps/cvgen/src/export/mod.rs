//! Tabular Exporter: flattens a document into the CSV row sets the external
//! renderer reads.
//!
//! `export` builds every table in memory and validates the document first;
//! `writer::write_tables` only touches disk once all of them exist.

pub mod import;
pub mod writer;

use std::collections::BTreeSet;

use crate::errors::AppError;
use crate::models::{DocType, Store};

pub const ENTRIES_FILE: &str = "entries.csv";
pub const ASIDE_SECTIONS_FILE: &str = "aside_sections.csv";
pub const ASIDE_ENTRIES_FILE: &str = "aside_entries.csv";
pub const TEXT_BLOCKS_FILE: &str = "text_blocks.csv";
pub const CONTACT_INFO_FILE: &str = "contact_info.csv";

const ENTRY_BASE_COLUMNS: [(&str, &str); 6] = [
    ("section", "Where in your CV this entry belongs"),
    ("title", "Main title of the entry"),
    ("loc", "Location the entry occured"),
    ("institution", "Primary institution affiliation for entry"),
    ("start", "Start date of entry (year)"),
    (
        "end",
        "End year of entry. Set to \"current\" if entry is still ongoing.",
    ),
];
const DESCRIPTION_EXPLANATION: &str =
    "Each description column is a separate bullet point for the entry. \
    If you need more description bullet points simply add a new column \
    with title \"description_{4,5,..}\"";
const IN_CV_EXPLANATION: &str = "A filter variable that is used to decide if entry is in the CV.";
const IN_RESUME_EXPLANATION: &str =
    "A filter variable that is used to decide if entry is in the smaller resume.";
const IMPORTANCE_EXPLANATION: &str = "Priority hint, higher entries are listed first.";
const ID_EXPLANATION: &str = "Stable identifier of the entry.";
const COMPANY_EXPLANATION: &str =
    "Maybe use these columns to choose which entries used for a given company?";

pub const COMPANY_COLUMN_PREFIX: &str = "company_";
pub const DESCRIPTION_COLUMN_PREFIX: &str = "description_";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One CSV file's worth of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub file_name: &'static str,
    /// Human-readable first row some renderer templates expect above the header.
    pub explanation: Option<Vec<String>>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(file_name: &'static str, headers: &[&str]) -> Self {
        Self {
            file_name,
            explanation: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn with_explanation(mut self, explanation: &[&str]) -> Self {
        self.explanation = Some(explanation.iter().map(|e| e.to_string()).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularExport {
    pub entry_rows: Table,
    pub skill_section_rows: Table,
    pub skill_item_rows: Table,
    pub text_block_rows: Table,
    pub contact_rows: Table,
}

impl TabularExport {
    pub fn tables(&self) -> [&Table; 5] {
        [
            &self.entry_rows,
            &self.skill_section_rows,
            &self.skill_item_rows,
            &self.text_block_rows,
            &self.contact_rows,
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Export
// ────────────────────────────────────────────────────────────────────────────

pub fn bool_cell(value: bool) -> String {
    if value { "TRUE" } else { "FALSE" }.to_string()
}

fn doc_type_cells(doc_types: &BTreeSet<DocType>) -> [String; 2] {
    [
        bool_cell(doc_types.contains(&DocType::Cv)),
        bool_cell(doc_types.contains(&DocType::Resume)),
    ]
}

/// Flattens a document. Fails before building anything if an entry has no
/// section to be filed under.
pub fn export(document: &Store) -> Result<TabularExport, AppError> {
    if let Some(entry) = document.entries.iter().find(|e| e.section.trim().is_empty()) {
        return Err(AppError::ExportSchema {
            entry_id: entry.id.clone(),
        });
    }

    Ok(TabularExport {
        entry_rows: entry_table(document),
        skill_section_rows: skill_section_table(document),
        skill_item_rows: skill_item_table(document),
        text_block_rows: text_block_table(document),
        contact_rows: contact_table(document),
    })
}

fn entry_table(document: &Store) -> Table {
    let max_descriptions = document
        .entries
        .iter()
        .map(|e| e.descriptions.len())
        .max()
        .unwrap_or(0);
    let companies: BTreeSet<&str> = document
        .entries
        .iter()
        .flat_map(|e| e.companies.iter().map(String::as_str))
        .collect();

    let mut headers: Vec<String> = ENTRY_BASE_COLUMNS
        .iter()
        .map(|(h, _)| h.to_string())
        .collect();
    let mut explanation: Vec<String> = ENTRY_BASE_COLUMNS
        .iter()
        .map(|(_, e)| e.to_string())
        .collect();
    for i in 1..=max_descriptions {
        headers.push(format!("{DESCRIPTION_COLUMN_PREFIX}{i}"));
        explanation.push(DESCRIPTION_EXPLANATION.to_string());
    }
    for (header, text) in [
        ("in_cv", IN_CV_EXPLANATION),
        ("in_resume", IN_RESUME_EXPLANATION),
        ("importance", IMPORTANCE_EXPLANATION),
        ("id", ID_EXPLANATION),
    ] {
        headers.push(header.to_string());
        explanation.push(text.to_string());
    }
    for company in &companies {
        headers.push(format!("{COMPANY_COLUMN_PREFIX}{company}"));
        explanation.push(COMPANY_EXPLANATION.to_string());
    }

    let rows = document
        .entries
        .iter()
        .map(|entry| {
            let mut row = vec![
                entry.section.clone(),
                entry.title.clone(),
                entry.location.clone(),
                entry.institution.clone(),
                entry.start.clone().unwrap_or_default(),
                entry.end.clone().unwrap_or_default(),
            ];
            row.extend(
                (0..max_descriptions)
                    .map(|i| entry.descriptions.get(i).cloned().unwrap_or_default()),
            );
            row.extend(doc_type_cells(&entry.doc_types));
            row.push(entry.importance.to_string());
            row.push(entry.id.clone());
            row.extend(companies.iter().map(|c| bool_cell(entry.has_company(c))));
            row
        })
        .collect();

    Table {
        file_name: ENTRIES_FILE,
        explanation: Some(explanation),
        headers,
        rows,
    }
}

fn sorted_skills(document: &Store) -> Vec<&crate::models::SkillCategory> {
    let mut skills: Vec<_> = document.skills.iter().collect();
    skills.sort_by_key(|s| s.order);
    skills
}

fn skill_section_table(document: &Store) -> Table {
    let mut table = Table::new(
        ASIDE_SECTIONS_FILE,
        &["section_id", "section_name", "in_cv", "in_resume"],
    );
    table.rows = sorted_skills(document)
        .into_iter()
        .map(|s| {
            let mut row = vec![s.id.clone(), s.name.clone()];
            row.extend(doc_type_cells(&s.doc_types));
            row
        })
        .collect();
    table
}

fn skill_item_table(document: &Store) -> Table {
    let mut table = Table::new(
        ASIDE_ENTRIES_FILE,
        &["section_id", "skill_name", "level", "in_cv", "in_resume"],
    );
    table.rows = sorted_skills(document)
        .into_iter()
        .flat_map(|s| {
            let flags = doc_type_cells(&s.doc_types);
            s.items.iter().map(move |item| {
                let mut row = vec![s.id.clone(), item.name.clone(), item.level.clone()];
                row.extend(flags.iter().cloned());
                row
            })
        })
        .collect();
    table
}

fn text_block_table(document: &Store) -> Table {
    let mut table = Table::new(TEXT_BLOCKS_FILE, &["id", "text", "in_cv", "in_resume"])
        .with_explanation(&[
            "Text block identifier",
            "The actual text content of the block",
            IN_CV_EXPLANATION,
            IN_RESUME_EXPLANATION,
        ]);
    table.rows = document
        .text_blocks
        .iter()
        .map(|b| {
            let mut row = vec![b.id.clone(), b.content.clone()];
            row.extend(doc_type_cells(&b.doc_types));
            row
        })
        .collect();
    table
}

fn contact_table(document: &Store) -> Table {
    let mut table = Table::new(CONTACT_INFO_FILE, &["loc", "icon", "contact"]).with_explanation(&[
        "Contact information identifier",
        "Icon name used by the renderer",
        "Value for the contact information field",
    ]);
    table.rows = document
        .contact_info
        .iter()
        .map(|c| vec![c.label.clone(), c.icon.clone().unwrap_or_default(), c.value.clone()])
        .collect();
    table
}

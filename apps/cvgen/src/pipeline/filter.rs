//! Filter Engine: doc-type partition plus AND/OR tag and company predicates.
//!
//! The doc-type is always a hard requirement. Tag and company criteria are
//! pooled into one set, and `logic` applies across the whole pool: with `Or`
//! one matching tag *or* company is enough.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{DocType, Entry, Store};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub doc_type: DocType,
    pub tags: BTreeSet<String>,
    pub companies: BTreeSet<String>,
    pub logic: FilterLogic,
}

impl FilterCriteria {
    pub fn for_doc_type(doc_type: DocType) -> Self {
        Self {
            doc_type,
            tags: BTreeSet::new(),
            companies: BTreeSet::new(),
            logic: FilterLogic::And,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize(tags);
        self
    }

    pub fn with_companies<I, S>(mut self, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.companies = normalize(companies);
        self
    }

    pub fn with_logic(mut self, logic: FilterLogic) -> Self {
        self.logic = logic;
        self
    }

    pub fn has_predicates(&self) -> bool {
        !self.tags.is_empty() || !self.companies.is_empty()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if !entry.is_for(self.doc_type) {
            return false;
        }
        if !self.has_predicates() {
            return true;
        }

        let mut tag_hits = self.tags.iter().map(|t| entry.has_tag(t));
        let mut company_hits = self.companies.iter().map(|c| entry.has_company(c));

        match self.logic {
            FilterLogic::And => tag_hits.all(|hit| hit) && company_hits.all(|hit| hit),
            FilterLogic::Or => tag_hits.any(|hit| hit) || company_hits.any(|hit| hit),
        }
    }
}

/// Trims and drops blanks so `--tags "a, ,b"` means `{a, b}`.
fn normalize<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(|v| v.into().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Entries matching the criteria, in their original order.
pub fn filter_entries(entries: &[Entry], criteria: &FilterCriteria) -> Vec<Entry> {
    entries.iter().filter(|e| criteria.matches(e)).cloned().collect()
}

/// A copy of the store restricted to what the target document shows:
/// filtered entries plus the skill categories and text blocks for its doc-type.
pub fn filter_store(store: &Store, criteria: &FilterCriteria) -> Store {
    let doc_type = criteria.doc_type;
    Store {
        meta: store.meta.clone(),
        contact_info: store.contact_info.clone(),
        entries: filter_entries(&store.entries, criteria),
        skills: store
            .skills
            .iter()
            .filter(|s| s.doc_types.contains(&doc_type))
            .cloned()
            .collect(),
        text_blocks: store
            .text_blocks
            .iter()
            .filter(|b| b.doc_types.contains(&doc_type))
            .cloned()
            .collect(),
    }
}

/// Fails when no entry at all carries the doc-type: a run that can only ever
/// produce an empty document.
pub fn ensure_doc_type_present(store: &Store, doc_type: DocType) -> Result<(), AppError> {
    if store.entries.iter().any(|e| e.is_for(doc_type)) {
        Ok(())
    } else {
        Err(AppError::DocTypeAbsent(doc_type))
    }
}

/// Presentation order for untailored exports: importance first, then ongoing
/// entries, then most recent end year. Stable for everything else.
pub fn sort_by_priority(entries: &mut [Entry]) {
    entries.sort_by_key(|e| {
        let ongoing = e.is_ongoing();
        let end_year = e
            .end
            .as_deref()
            .and_then(|end| end.trim().parse::<i64>().ok())
            .unwrap_or(0);
        (Reverse(e.importance), !ongoing, Reverse(end_year))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(entries: Vec<Entry>) -> Store {
        Store {
            entries,
            ..Store::default()
        }
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    fn mixed_store() -> Store {
        store_of(vec![
            Entry::new("e1", "education", "BSc").with_tags(&["cv", "resume"]),
            Entry::new("e2", "education", "MSc").with_tags(&["cv"]),
            Entry::new("e3", "software", "Tool").with_tags(&["resume", "ml"]),
            Entry::new("e4", "software", "Lib").with_tags(&["cv"]),
            Entry::new("e5", "mentorship", "Mentor").with_tags(&["resume"]),
        ])
    }

    #[test]
    fn test_doc_type_partition_resume() {
        let store = mixed_store();
        let result = filter_entries(&store.entries, &FilterCriteria::for_doc_type(DocType::Resume));
        assert_eq!(ids(&result), vec!["e1", "e3", "e5"]);
    }

    #[test]
    fn test_doc_type_partition_sound_and_complete() {
        let store = mixed_store();
        for doc_type in DocType::ALL {
            let result = filter_entries(&store.entries, &FilterCriteria::for_doc_type(doc_type));
            assert!(result.iter().all(|e| e.is_for(doc_type)));
            let expected = store.entries.iter().filter(|e| e.is_for(doc_type)).count();
            assert_eq!(result.len(), expected);
        }
    }

    #[test]
    fn test_or_logic_any_tag() {
        let store = store_of(vec![
            Entry::new("a", "software", "A").with_tags(&["cv", "bioinformatics"]),
            Entry::new("b", "software", "B").with_tags(&["cv", "ml"]),
            Entry::new("c", "software", "C").with_tags(&["cv", "web"]),
        ]);
        let criteria = FilterCriteria::for_doc_type(DocType::Cv)
            .with_tags(["bioinformatics", "ml"])
            .with_logic(FilterLogic::Or);
        assert_eq!(ids(&filter_entries(&store.entries, &criteria)), vec!["a", "b"]);
    }

    #[test]
    fn test_and_logic_requires_every_criterion() {
        let store = store_of(vec![
            Entry::new("a", "software", "A")
                .with_tags(&["cv", "ml", "rust"])
                .with_companies(&["biotech"]),
            Entry::new("b", "software", "B").with_tags(&["cv", "ml", "rust"]),
            Entry::new("c", "software", "C")
                .with_tags(&["cv", "ml"])
                .with_companies(&["biotech"]),
        ]);
        let criteria = FilterCriteria::for_doc_type(DocType::Cv)
            .with_tags(["ml", "rust"])
            .with_companies(["biotech"]);
        assert_eq!(ids(&filter_entries(&store.entries, &criteria)), vec!["a"]);
    }

    #[test]
    fn test_or_pools_tags_and_companies() {
        let store = store_of(vec![
            Entry::new("tagged", "software", "A").with_tags(&["cv", "ml"]),
            Entry::new("company", "software", "B")
                .with_tags(&["cv"])
                .with_companies(&["pharma"]),
            Entry::new("neither", "software", "C").with_tags(&["cv"]),
        ]);
        let criteria = FilterCriteria::for_doc_type(DocType::Cv)
            .with_tags(["ml"])
            .with_companies(["pharma"])
            .with_logic(FilterLogic::Or);
        assert_eq!(
            ids(&filter_entries(&store.entries, &criteria)),
            vec!["tagged", "company"]
        );
    }

    #[test]
    fn test_and_subset_of_or() {
        let store = store_of(vec![
            Entry::new("1", "s", "t").with_tags(&["cv", "a", "b"]).with_companies(&["c"]),
            Entry::new("2", "s", "t").with_tags(&["cv", "a"]),
            Entry::new("3", "s", "t").with_tags(&["cv"]).with_companies(&["c"]),
            Entry::new("4", "s", "t").with_tags(&["cv", "b"]).with_companies(&["c"]),
            Entry::new("5", "s", "t").with_tags(&["resume", "a", "b"]).with_companies(&["c"]),
        ]);
        let base = FilterCriteria::for_doc_type(DocType::Cv)
            .with_tags(["a", "b"])
            .with_companies(["c"]);
        let and = filter_entries(&store.entries, &base.clone().with_logic(FilterLogic::And));
        let or = filter_entries(&store.entries, &base.with_logic(FilterLogic::Or));
        assert!(and.iter().all(|e| or.contains(e)));
        assert_eq!(ids(&and), vec!["1"]);
        assert_eq!(ids(&or), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let store = mixed_store();
        let criteria = FilterCriteria::for_doc_type(DocType::Resume).with_tags(["ml"]);
        let once = filter_entries(&store.entries, &criteria);
        let twice = filter_entries(&once, &criteria);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_doc_type_is_always_required() {
        let store = store_of(vec![Entry::new("x", "software", "X").with_tags(&["resume", "ml"])]);
        let criteria = FilterCriteria::for_doc_type(DocType::Cv)
            .with_tags(["ml"])
            .with_logic(FilterLogic::Or);
        assert!(filter_entries(&store.entries, &criteria).is_empty());
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let store = mixed_store();
        let criteria = FilterCriteria::for_doc_type(DocType::Cv).with_tags(["quantum"]);
        assert!(filter_entries(&store.entries, &criteria).is_empty());
        assert!(ensure_doc_type_present(&store, DocType::Cv).is_ok());
    }

    #[test]
    fn test_doc_type_absent_is_an_error() {
        let store = store_of(vec![Entry::new("x", "software", "X").with_tags(&["cv"])]);
        assert!(matches!(
            ensure_doc_type_present(&store, DocType::Resume),
            Err(AppError::DocTypeAbsent(DocType::Resume))
        ));
    }

    #[test]
    fn test_blank_criteria_are_ignored() {
        let criteria = FilterCriteria::for_doc_type(DocType::Cv).with_tags(["", "  "]);
        assert!(!criteria.has_predicates());
    }

    #[test]
    fn test_sort_by_priority() {
        let mut entries = vec![
            Entry::new("old", "s", "t").with_importance(5),
            Entry::new("new", "s", "t").with_importance(5),
            Entry::new("current", "s", "t").with_importance(5),
            Entry::new("top", "s", "t").with_importance(9),
        ];
        entries[0].end = Some("2012".to_string());
        entries[1].end = Some("2020".to_string());
        entries[2].end = Some("Current".to_string());
        sort_by_priority(&mut entries);
        assert_eq!(ids(&entries), vec!["top", "current", "new", "old"]);
    }

    #[test]
    fn test_sort_by_priority_extreme_values() {
        let mut entries = vec![
            Entry::new("min", "s", "t").with_importance(i64::MIN),
            Entry::new("max", "s", "t").with_importance(i64::MAX),
            Entry::new("far_past", "s", "t"),
            Entry::new("recent", "s", "t"),
        ];
        entries[2].end = Some(i64::MIN.to_string());
        entries[3].end = Some("2024".to_string());
        sort_by_priority(&mut entries);
        assert_eq!(ids(&entries), vec!["max", "recent", "far_past", "min"]);
    }
}

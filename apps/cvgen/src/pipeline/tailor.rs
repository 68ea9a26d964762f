//! Tailoring pipeline: orchestrates one job-targeted run.
//!
//! Flow: doc-type check → filter → score (comprehensive or entry-by-entry) →
//!       select per section → stamp meta.
//!
//! The source store is only read. Every stage works on its own copy and the
//! result is a fresh document.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{Meta, Store};
use crate::pipeline::comprehensive::{tailor_comprehensively, BatchTailor};
use crate::pipeline::filter::{ensure_doc_type_present, filter_store, FilterCriteria};
use crate::pipeline::scoring::{score_entries, Scorer, ScoringOptions};
use crate::pipeline::selector::{select, SectionCaps, DEFAULT_MIN_SCORE};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TailorOptions {
    pub criteria: FilterCriteria,
    pub caps: SectionCaps,
    pub min_score: u8,
    pub scoring: ScoringOptions,
}

impl TailorOptions {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            caps: SectionCaps::default(),
            min_score: DEFAULT_MIN_SCORE,
            scoring: ScoringOptions::default(),
        }
    }
}

/// What the run did, for the final log line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TailorReport {
    pub considered: usize,
    pub scored: usize,
    /// Entries ranked by importance because scoring failed for them.
    pub fallbacks: usize,
    pub selected: usize,
    pub excluded: Vec<(String, String)>, // (entry_id, reason)
    pub comprehensive: bool,
}

#[derive(Debug, Clone)]
pub struct TailorOutcome {
    pub document: Store,
    /// Summary produced by a comprehensive reply, if any.
    pub summary: Option<String>,
    pub report: TailorReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs filter → score → select for one target description.
///
/// With `batch` set, the whole filtered subset goes to one comprehensive
/// call first; if that fails the run continues entry by entry with `scorer`.
pub async fn tailor_store(
    store: &Store,
    target: &str,
    options: &TailorOptions,
    scorer: Arc<dyn Scorer>,
    batch: Option<&dyn BatchTailor>,
) -> Result<TailorOutcome, AppError> {
    ensure_doc_type_present(store, options.criteria.doc_type)?;
    let mut document = filter_store(store, &options.criteria);
    let candidates = std::mem::take(&mut document.entries);
    let mut report = TailorReport {
        considered: candidates.len(),
        ..TailorReport::default()
    };
    info!(
        "Tailoring {} {} entries",
        candidates.len(),
        options.criteria.doc_type
    );

    let mut summary = None;
    let mut scored_entries = None;

    if let Some(batch) = batch {
        match tailor_comprehensively(&candidates, batch, target).await {
            Ok(outcome) => {
                report.comprehensive = true;
                summary = outcome.summary;
                scored_entries = Some(outcome.entries);
            }
            Err(e) if e.is_recoverable() => {
                warn!("Comprehensive tailoring failed, scoring entry by entry: {e}");
            }
            Err(e) => return Err(e),
        }
    }

    let entries = match scored_entries {
        Some(entries) => {
            report.scored = entries.iter().filter(|e| e.relevance_score.is_some()).count();
            entries
        }
        None => {
            let outcome = score_entries(candidates, scorer, target, &options.scoring).await;
            report.scored = outcome.scored;
            report.fallbacks = outcome.fallbacks;
            outcome.entries
        }
    };

    let selection = select(entries, &options.caps, options.min_score);
    report.selected = selection.selected.len();
    report.excluded = selection.excluded;
    document.entries = selection.selected;

    info!(
        "Selected {} of {} entries ({} scored, {} fell back to importance)",
        report.selected, report.considered, report.scored, report.fallbacks
    );

    Ok(TailorOutcome {
        document,
        summary,
        report,
    })
}

/// Marks a derived document with today's date and where it came from.
pub fn stamp_meta(meta: &mut Meta, original_file: &str) {
    meta.last_updated = Some(chrono::Local::now().format("%Y-%m-%d").to_string());
    meta.extra
        .insert("generated_for".to_string(), Value::from("Job Application"));
    meta.extra
        .insert("original_file".to_string(), Value::from(original_file));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocType, Entry, Score};
    use crate::pipeline::comprehensive::{TailoredEntry, TailoredSelection};
    use crate::pipeline::scoring::tests::{static_scorer, UnavailableScorer};
    use crate::pipeline::scoring::KeywordScorer;
    use async_trait::async_trait;

    fn store() -> Store {
        Store {
            entries: vec![
                Entry::new("s1", "software", "Genome browser")
                    .with_tags(&["cv", "resume", "bioinformatics"])
                    .with_descriptions(&["Rust genome browser"])
                    .with_importance(1),
                Entry::new("s2", "software", "Web shop")
                    .with_tags(&["cv", "resume", "web"])
                    .with_importance(5),
                Entry::new("s3", "software", "Variant caller")
                    .with_tags(&["cv", "resume", "bioinformatics"])
                    .with_importance(2),
                Entry::new("s4", "software", "Pipeline")
                    .with_tags(&["cv", "resume", "bioinformatics"])
                    .with_importance(3),
                Entry::new("e1", "education", "PhD").with_tags(&["cv"]),
            ],
            ..Store::default()
        }
    }

    struct FailingBatch;

    #[async_trait]
    impl BatchTailor for FailingBatch {
        async fn tailor(&self, _: &[Entry], _: &str) -> Result<TailoredSelection, AppError> {
            Err(AppError::ScoringUnavailable("service down".to_string()))
        }
    }

    struct PickOne;

    #[async_trait]
    impl BatchTailor for PickOne {
        async fn tailor(&self, _: &[Entry], _: &str) -> Result<TailoredSelection, AppError> {
            Ok(TailoredSelection {
                entries: vec![TailoredEntry {
                    id: "s3".to_string(),
                    score: Score::new(9),
                    reasoning: None,
                    descriptions: None,
                }],
                summary: Some("Tailored summary".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_scored_top_three_for_resume_software() {
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Resume));
        let scorer = static_scorer(&[("s1", 9), ("s2", 3), ("s3", 7), ("s4", 5)]);
        let outcome = tailor_store(&store(), "bioinformatics", &options, scorer, None)
            .await
            .unwrap();

        let ids: Vec<_> = outcome.document.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3", "s4"]);
        assert_eq!(outcome.report.considered, 4);
        assert_eq!(outcome.report.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_service_down_falls_back_to_importance() {
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Resume));
        let outcome =
            tailor_store(&store(), "anything", &options, Arc::new(UnavailableScorer), None)
                .await
                .unwrap();

        let ids: Vec<_> = outcome.document.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s4", "s3"]);
        assert_eq!(outcome.report.fallbacks, 4);
    }

    #[tokio::test]
    async fn test_source_store_is_not_mutated() {
        let source = store();
        let before = source.clone();
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Cv));
        tailor_store(&source, "bioinformatics rust", &options, Arc::new(KeywordScorer), None)
            .await
            .unwrap();
        assert_eq!(source, before);
    }

    #[tokio::test]
    async fn test_comprehensive_failure_falls_back_to_entry_scoring() {
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Resume));
        let scorer = static_scorer(&[("s1", 9), ("s2", 8), ("s3", 7), ("s4", 6)]);
        let batch: &dyn BatchTailor = &FailingBatch;
        let outcome = tailor_store(&store(), "job", &options, scorer, Some(batch))
            .await
            .unwrap();
        assert!(!outcome.report.comprehensive);
        assert_eq!(outcome.report.scored, 4);
        assert_eq!(outcome.document.entries.len(), 3);
    }

    #[tokio::test]
    async fn test_comprehensive_selection_and_summary() {
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Resume));
        let outcome = tailor_store(
            &store(),
            "job",
            &options,
            Arc::new(UnavailableScorer),
            Some(&PickOne as &dyn BatchTailor),
        )
        .await
        .unwrap();
        assert!(outcome.report.comprehensive);
        assert_eq!(outcome.document.entries.len(), 1);
        assert_eq!(outcome.document.entries[0].id, "s3");
        assert_eq!(outcome.summary.as_deref(), Some("Tailored summary"));
    }

    #[tokio::test]
    async fn test_absent_doc_type_is_fatal() {
        let only_cv = Store {
            entries: vec![Entry::new("e1", "education", "PhD").with_tags(&["cv"])],
            ..Store::default()
        };
        let options = TailorOptions::new(FilterCriteria::for_doc_type(DocType::Resume));
        let err = tailor_store(&only_cv, "job", &options, Arc::new(KeywordScorer), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DocTypeAbsent(DocType::Resume)));
    }

    #[test]
    fn test_stamp_meta() {
        let mut meta = Meta::default();
        stamp_meta(&mut meta, "cv.json");
        assert!(meta.last_updated.is_some());
        assert_eq!(meta.extra["generated_for"], "Job Application");
        assert_eq!(meta.extra["original_file"], "cv.json");
    }
}

//! Comprehensive tailoring: one whole-store call picks, scores and rewrites
//! entries instead of scoring them one at a time.
//!
//! The reply may only reference ids from the input. A reply naming unknown ids
//! is rejected and the call retried; after the retries run out the caller
//! falls back to entry-by-entry scoring.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::ModelTier;
use crate::models::{Entry, Score};
use crate::pipeline::prompts::{COMPREHENSIVE_PROMPT_TEMPLATE, COMPREHENSIVE_SYSTEM};
use crate::pipeline::scoring::LlmScorer;

/// Max LLM retries when the reply references entries that do not exist.
const MAX_TAILOR_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TailoredEntry {
    pub id: String,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub descriptions: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TailoredSelection {
    pub entries: Vec<TailoredEntry>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[async_trait]
pub trait BatchTailor: Send + Sync {
    async fn tailor(&self, entries: &[Entry], target: &str) -> Result<TailoredSelection, AppError>;
}

#[async_trait]
impl BatchTailor for LlmScorer {
    async fn tailor(&self, entries: &[Entry], target: &str) -> Result<TailoredSelection, AppError> {
        let valid_ids = entries
            .iter()
            .map(|e| format!("\"{}\"", e.id))
            .collect::<Vec<_>>()
            .join(", ");
        let entries_json = serde_json::to_string_pretty(&prompt_view(entries))
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize entries: {e}")))?;

        let prompt = COMPREHENSIVE_PROMPT_TEMPLATE
            .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
            .replace("{valid_ids}", &valid_ids)
            .replace("{entries_json}", &entries_json)
            .replace("{target}", target);

        Ok(self
            .0
            .call_json::<TailoredSelection>(&prompt, COMPREHENSIVE_SYSTEM, ModelTier::Analysis)
            .await?)
    }
}

fn prompt_view(entries: &[Entry]) -> serde_json::Value {
    entries
        .iter()
        .map(|e| {
            json!({
                "id": e.id,
                "section": e.section,
                "title": e.title,
                "institution": e.institution,
                "descriptions": e.descriptions,
                "tags": e.skill_tags,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ComprehensiveOutcome {
    /// Entries the reply kept, in store order.
    pub entries: Vec<Entry>,
    pub summary: Option<String>,
}

/// Runs the whole-store call with id validation and retries.
pub async fn tailor_comprehensively(
    entries: &[Entry],
    tailor: &dyn BatchTailor,
    target: &str,
) -> Result<ComprehensiveOutcome, AppError> {
    let valid: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

    for attempt in 0..=MAX_TAILOR_RETRIES {
        let selection = tailor.tailor(entries, target).await?;
        let unknown: Vec<&str> = selection
            .entries
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| !valid.contains(id))
            .collect();

        if unknown.is_empty() {
            info!(
                "Comprehensive tailoring kept {} of {} entries",
                selection.entries.len(),
                entries.len()
            );
            return Ok(ComprehensiveOutcome {
                entries: apply_tailoring(entries, &selection.entries),
                summary: selection.summary.filter(|s| !s.trim().is_empty()),
            });
        }

        warn!(
            "Attempt {}: reply referenced {} unknown entry ids ({}), retrying",
            attempt + 1,
            unknown.len(),
            unknown.join(", ")
        );
    }

    Err(AppError::ScoringUnavailable(format!(
        "comprehensive reply referenced unknown entries after {} retries",
        MAX_TAILOR_RETRIES
    )))
}

/// Applies the reply to the entries it names. Unnamed entries are dropped;
/// rewritten descriptions keep the originals alongside.
pub fn apply_tailoring(entries: &[Entry], tailored: &[TailoredEntry]) -> Vec<Entry> {
    entries
        .iter()
        .filter_map(|entry| {
            let t = tailored.iter().find(|t| t.id == entry.id)?;
            let mut entry = entry.clone();
            if t.score.is_some() {
                entry.relevance_score = t.score;
            }
            if let Some(reasoning) = t.reasoning.as_ref().filter(|r| !r.is_empty()) {
                entry.relevance_reasoning = Some(reasoning.clone());
            }
            if let Some(descriptions) = t.descriptions.as_ref().filter(|d| !d.is_empty()) {
                if *descriptions != entry.descriptions {
                    entry.rewrite_descriptions(descriptions.clone());
                }
            }
            Some(entry)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays canned replies, one per call, repeating the last.
    struct ScriptedTailor {
        replies: Vec<TailoredSelection>,
        calls: AtomicU32,
    }

    impl ScriptedTailor {
        fn new(replies: Vec<TailoredSelection>) -> Self {
            Self {
                replies,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl BatchTailor for ScriptedTailor {
        async fn tailor(
            &self,
            _entries: &[Entry],
            _target: &str,
        ) -> Result<TailoredSelection, AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.replies[call.min(self.replies.len() - 1)].clone())
        }
    }

    fn tailored(id: &str, score: u8) -> TailoredEntry {
        TailoredEntry {
            id: id.to_string(),
            score: Score::new(score),
            reasoning: Some(format!("{id} fits")),
            descriptions: Some(vec![format!("Rewritten {id}")]),
        }
    }

    fn entries() -> Vec<Entry> {
        vec![
            Entry::new("a", "software", "A").with_descriptions(&["orig a"]),
            Entry::new("b", "software", "B"),
            Entry::new("c", "education", "C"),
        ]
    }

    #[tokio::test]
    async fn test_valid_reply_applied_in_store_order() {
        let tailor = ScriptedTailor::new(vec![TailoredSelection {
            entries: vec![tailored("c", 6), tailored("a", 9)],
            summary: Some("New summary".to_string()),
        }]);
        let outcome = tailor_comprehensively(&entries(), &tailor, "job").await.unwrap();

        let ids: Vec<_> = outcome.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(outcome.entries[0].descriptions, vec!["Rewritten a".to_string()]);
        assert_eq!(
            outcome.entries[0].original_descriptions,
            Some(vec!["orig a".to_string()])
        );
        assert_eq!(outcome.summary.as_deref(), Some("New summary"));
    }

    #[tokio::test]
    async fn test_unknown_ids_retried_then_accepted() {
        let bad = TailoredSelection {
            entries: vec![tailored("ghost", 9)],
            summary: None,
        };
        let good = TailoredSelection {
            entries: vec![tailored("b", 7)],
            summary: None,
        };
        let tailor = ScriptedTailor::new(vec![bad, good]);
        let outcome = tailor_comprehensively(&entries(), &tailor, "job").await.unwrap();
        assert_eq!(tailor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id, "b");
    }

    #[tokio::test]
    async fn test_unknown_ids_exhaust_retries() {
        let tailor = ScriptedTailor::new(vec![TailoredSelection {
            entries: vec![tailored("ghost", 9)],
            summary: None,
        }]);
        let err = tailor_comprehensively(&entries(), &tailor, "job")
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(tailor.calls.load(Ordering::SeqCst), MAX_TAILOR_RETRIES + 1);
    }

    #[test]
    fn test_reply_parses_with_missing_optional_fields() {
        let body = r#"{"entries": [{"id": "a"}, {"id": "b", "score": 7.4}]}"#;
        let selection: TailoredSelection = serde_json::from_str(body).unwrap();
        assert_eq!(selection.entries[1].score.map(Score::value), Some(7));
        assert!(selection.summary.is_none());

        let applied = apply_tailoring(&entries(), &selection.entries);
        assert!(applied[0].relevance_score.is_none());
        assert!(applied[0].original_descriptions.is_none());
    }
}

//! Relevance Scoring: pluggable, trait-based scorer that judges one entry
//! against a target job description.
//!
//! Backends:
//! - `KeywordScorer` (pure-Rust, deterministic, no network)
//! - `LlmScorer` (semantic, via `LlmClient`)
//!
//! `score_entries` runs a scorer over a whole batch with bounded concurrency.
//! A failed or timed-out call leaves that entry unscored; the batch goes on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, RELEVANCE_INSTRUCTION};
use crate::llm_client::{LlmClient, ModelTier};
use crate::models::{Entry, Score};
use crate::pipeline::prompts::{SCORE_ENTRY_PROMPT_TEMPLATE, SCORE_ENTRY_SYSTEM};

// ────────────────────────────────────────────────────────────────────────────
// Output data model (shared across all scorer backends)
// ────────────────────────────────────────────────────────────────────────────

/// A scorer's verdict on one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub score: Score,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub improved_descriptions: Option<Vec<String>>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The scorer trait. Implement this to swap backends without touching the
/// selector or the command code.
///
/// Errors are expected to be `AppError::ScoringUnavailable`; callers treat
/// them as recoverable.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, entry: &Entry, target: &str) -> Result<Judgment, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordScorer
// ────────────────────────────────────────────────────────────────────────────

/// Keywords past this count do not make a perfect score harder to reach.
const KEYWORD_SATURATION: usize = 10;
const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "and", "the", "for", "with", "you", "your", "our", "are", "will", "that", "this", "from",
    "have", "has", "who", "all", "any", "can", "not", "but", "into", "about", "their", "they",
    "using", "work", "team", "role", "job", "years", "year", "experience", "strong", "ability",
    "skills", "including", "such", "other", "well", "must", "plus", "preferred", "required",
];

/// Deterministic keyword-overlap scorer.
///
/// Algorithm:
/// 1. Extract keywords from the target (lowercased words, stopwords dropped)
/// 2. Per keyword: skill tag or company exact match → 1.0,
///    substring of title/institution/descriptions → 0.6, otherwise 0.0
/// 3. score = round(10 × Σstrength / min(#keywords, 10)), capped at 10
pub struct KeywordScorer;

#[async_trait]
impl Scorer for KeywordScorer {
    async fn score(&self, entry: &Entry, target: &str) -> Result<Judgment, AppError> {
        Ok(compute_keyword_judgment(entry, target))
    }
}

pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in text
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .map(str::to_lowercase)
    {
        if word.chars().count() < MIN_KEYWORD_LEN || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

fn compute_keyword_judgment(entry: &Entry, target: &str) -> Judgment {
    let keywords = extract_keywords(target);
    if keywords.is_empty() {
        return Judgment {
            score: Score::ZERO,
            reasoning: "No keywords found in target description.".to_string(),
            improved_descriptions: None,
        };
    }

    let tags: Vec<String> = entry
        .skill_tags
        .iter()
        .chain(entry.companies.iter())
        .map(|t| t.to_lowercase())
        .collect();
    let text = std::iter::once(entry.title.as_str())
        .chain(std::iter::once(entry.institution.as_str()))
        .chain(entry.descriptions.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut total = 0.0_f64;
    let mut matched = Vec::new();
    for keyword in &keywords {
        let strength = if tags.iter().any(|t| t == keyword) {
            1.0
        } else if text.contains(keyword.as_str()) {
            0.6
        } else {
            0.0
        };
        if strength > 0.0 {
            matched.push(keyword.as_str());
        }
        total += strength;
    }

    let denominator = keywords.len().min(KEYWORD_SATURATION) as f64;
    let raw = (10.0 * total / denominator).round().min(Score::MAX as f64);
    let score = Score::from_f64(raw).unwrap_or(Score::ZERO);

    let reasoning = if matched.is_empty() {
        format!("None of {} target keywords found.", keywords.len())
    } else {
        format!(
            "Matched {} of {} target keywords: {}.",
            matched.len(),
            keywords.len(),
            matched.iter().take(5).copied().collect::<Vec<_>>().join(", ")
        )
    };

    Judgment {
        score,
        reasoning,
        improved_descriptions: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmScorer
// ────────────────────────────────────────────────────────────────────────────

/// Semantic scorer backed by the completion service.
#[derive(Clone)]
pub struct LlmScorer(pub LlmClient);

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(&self, entry: &Entry, target: &str) -> Result<Judgment, AppError> {
        let prompt = SCORE_ENTRY_PROMPT_TEMPLATE
            .replace("{relevance_instruction}", RELEVANCE_INSTRUCTION)
            .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
            .replace("{entry_text}", &describe_entry(entry))
            .replace("{target}", target);

        self.0
            .call_json::<Judgment>(&prompt, SCORE_ENTRY_SYSTEM, ModelTier::Scoring)
            .await
            .map_err(|e| AppError::ScoringUnavailable(format!("entry '{}': {e}", entry.id)))
    }
}

/// Condensed plain-text view of an entry for prompts.
pub fn describe_entry(entry: &Entry) -> String {
    let bullets = entry
        .descriptions
        .iter()
        .map(|d| format!("- {d}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Title: {}\nSection: {}\nInstitution: {}\nDescriptions:\n{}\nTags: {}",
        entry.title,
        entry.section,
        entry.institution,
        bullets,
        entry.skill_tags.iter().cloned().collect::<Vec<_>>().join(", ")
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Batch scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScoringOptions {
    pub concurrency: usize,
    pub timeout: Duration,
    pub improve_descriptions: bool,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(60),
            improve_descriptions: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Same entries, same order; scored ones carry `relevance_score`.
    pub entries: Vec<Entry>,
    pub scored: usize,
    /// Entries left unscored because their call failed.
    pub fallbacks: usize,
}

/// Scores every entry independently with at most `options.concurrency`
/// calls in flight.
pub async fn score_entries(
    entries: Vec<Entry>,
    scorer: Arc<dyn Scorer>,
    target: &str,
    options: &ScoringOptions,
) -> ScoringOutcome {
    let target: Arc<str> = Arc::from(target);
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let timeout = options.timeout;
    let mut tasks = JoinSet::new();

    for (index, entry) in entries.iter().cloned().enumerate() {
        let scorer = Arc::clone(&scorer);
        let target = Arc::clone(&target);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let result = match tokio::time::timeout(timeout, scorer.score(&entry, &target)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::ScoringUnavailable(format!(
                    "entry '{}': timed out after {}s",
                    entry.id,
                    timeout.as_secs()
                ))),
            };
            (index, result)
        });
    }

    let mut judgments: Vec<Option<Judgment>> = vec![None; entries.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(judgment))) => judgments[index] = Some(judgment),
            Ok((index, Err(e))) => {
                warn!("Falling back to importance for entry '{}': {e}", entries[index].id)
            }
            Err(e) => warn!("Scoring task failed: {e}"),
        }
    }

    let mut scored = 0;
    let mut fallbacks = 0;
    let entries = entries
        .into_iter()
        .zip(judgments)
        .map(|(mut entry, judgment)| {
            match judgment {
                Some(judgment) => {
                    info!(
                        "Score {} for '{}' - {}",
                        judgment.score,
                        entry.title,
                        judgment.reasoning.chars().take(60).collect::<String>()
                    );
                    apply_judgment(&mut entry, judgment, options.improve_descriptions);
                    scored += 1;
                }
                None => fallbacks += 1,
            }
            entry
        })
        .collect();

    ScoringOutcome {
        entries,
        scored,
        fallbacks,
    }
}

fn apply_judgment(entry: &mut Entry, judgment: Judgment, improve_descriptions: bool) {
    entry.relevance_score = Some(judgment.score);
    entry.relevance_reasoning = Some(judgment.reasoning).filter(|r| !r.is_empty());
    if improve_descriptions {
        if let Some(improved) = judgment.improved_descriptions.filter(|d| !d.is_empty()) {
            entry.rewrite_descriptions(improved);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

//! Job posting analysis and summary rewriting.
//!
//! Both stages are optional: when the service is down, scoring runs against
//! the raw posting text and the existing summary is kept as written.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::{LlmClient, ModelTier};
use crate::models::{Entry, Store};
use crate::pipeline::prompts::{
    JOB_ANALYSIS_PROMPT_TEMPLATE, JOB_ANALYSIS_SYSTEM, SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM,
};

/// Text block ids tried, in order, when looking for the summary to rewrite.
pub const SUMMARY_BLOCK_IDS: [&str; 2] = ["professional_summary", "intro"];

// ────────────────────────────────────────────────────────────────────────────
// Job analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobAnalysis {
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub desired_experience: Vec<String>,
    #[serde(default)]
    pub key_responsibilities: Vec<String>,
    #[serde(default)]
    pub industry_knowledge: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
}

impl JobAnalysis {
    pub fn is_empty(&self) -> bool {
        self.required_skills.is_empty()
            && self.desired_experience.is_empty()
            && self.key_responsibilities.is_empty()
            && self.industry_knowledge.is_empty()
            && self.soft_skills.is_empty()
    }

    /// Condensed view used as the scoring target.
    pub fn to_target_text(&self) -> String {
        [
            ("Required Skills", &self.required_skills),
            ("Desired Experience", &self.desired_experience),
            ("Key Responsibilities", &self.key_responsibilities),
            ("Industry Knowledge", &self.industry_knowledge),
            ("Soft Skills", &self.soft_skills),
        ]
        .iter()
        .map(|(label, items)| format!("{label}: {}", items.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

pub async fn analyze_job_posting(llm: &LlmClient, posting: &str) -> Result<JobAnalysis, AppError> {
    let prompt = JOB_ANALYSIS_PROMPT_TEMPLATE.replace("{job_posting}", posting);
    let analysis: JobAnalysis = llm
        .call_json(&prompt, JOB_ANALYSIS_SYSTEM, ModelTier::Analysis)
        .await?;
    info!(
        "Job analysis: {} required skills, {} responsibilities",
        analysis.required_skills.len(),
        analysis.key_responsibilities.len()
    );
    Ok(analysis)
}

/// The target text entries are scored against: the structured analysis when
/// it succeeds and says something, the raw posting otherwise.
pub async fn scoring_target(llm: &LlmClient, posting: &str) -> String {
    match analyze_job_posting(llm, posting).await {
        Ok(analysis) if !analysis.is_empty() => analysis.to_target_text(),
        Ok(_) => {
            warn!("Job analysis came back empty, scoring against the raw posting");
            posting.to_string()
        }
        Err(e) => {
            warn!("Job analysis failed, scoring against the raw posting: {e}");
            posting.to_string()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Summary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryReply {
    summary: String,
}

/// Id of the block holding the professional summary, if the document has one.
pub fn summary_block_id(document: &Store) -> Option<&str> {
    SUMMARY_BLOCK_IDS
        .into_iter()
        .find(|id| document.text_block(id).is_some())
}

pub async fn rewrite_summary(
    llm: &LlmClient,
    current: &str,
    selected: &[Entry],
    target: &str,
) -> Result<String, AppError> {
    let entry_titles = selected
        .iter()
        .map(|e| format!("- {} ({})", e.title, e.section))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = SUMMARY_PROMPT_TEMPLATE
        .replace("{current_summary}", current)
        .replace("{entry_titles}", &entry_titles)
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{target}", target);

    let reply: SummaryReply = llm
        .call_json(&prompt, SUMMARY_SYSTEM, ModelTier::Analysis)
        .await?;
    let summary = reply.summary.trim().to_string();
    if summary.is_empty() {
        return Err(AppError::ScoringUnavailable(
            "summary rewrite returned empty text".to_string(),
        ));
    }
    Ok(summary)
}

/// Replaces the summary block text. A document without one is returned as is.
pub fn with_summary(mut document: Store, summary: String) -> Store {
    let Some(id) = summary_block_id(&document).map(str::to_string) else {
        warn!("No professional summary block; generated summary discarded");
        return document;
    };
    if let Some(block) = document.text_blocks.iter_mut().find(|b| b.id == id) {
        block.content = summary;
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocType, TextBlock};
    use std::collections::BTreeSet;

    fn block(id: &str, content: &str) -> TextBlock {
        TextBlock {
            id: id.to_string(),
            content: content.to_string(),
            doc_types: BTreeSet::from(DocType::ALL),
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_analysis_parses_partial_reply() {
        let body = r#"{"required_skills": ["Rust", "SQL"], "soft_skills": ["mentoring"]}"#;
        let analysis: JobAnalysis = serde_json::from_str(body).unwrap();
        assert!(!analysis.is_empty());
        let text = analysis.to_target_text();
        assert!(text.contains("Required Skills: Rust, SQL"));
        assert!(text.contains("Soft Skills: mentoring"));
    }

    #[test]
    fn test_empty_analysis() {
        assert!(JobAnalysis::default().is_empty());
    }

    #[test]
    fn test_with_summary_prefers_professional_summary() {
        let document = Store {
            text_blocks: vec![block("intro", "hi"), block("professional_summary", "old")],
            ..Store::default()
        };
        let updated = with_summary(document, "new".to_string());
        assert_eq!(updated.text_block("professional_summary").unwrap().content, "new");
        assert_eq!(updated.text_block("intro").unwrap().content, "hi");
    }

    #[test]
    fn test_with_summary_falls_back_to_intro() {
        let document = Store {
            text_blocks: vec![block("intro", "hi")],
            ..Store::default()
        };
        let updated = with_summary(document, "tailored".to_string());
        assert_eq!(updated.text_block("intro").unwrap().content, "tailored");
    }

    #[test]
    fn test_with_summary_without_block_is_noop() {
        let document = Store {
            text_blocks: vec![block("objective", "x")],
            ..Store::default()
        };
        let updated = with_summary(document.clone(), "tailored".to_string());
        assert_eq!(updated, document);
    }
}

//! Section Selector: ranks entries inside each section and keeps the best
//! few per section.
//!
//! No LLM calls. Scores come from `pipeline::scoring`; entries without a score
//! rank after every scored entry, ordered by their importance hint.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::errors::AppError;
use crate::models::Entry;

// ────────────────────────────────────────────────────────────────────────────
// Section limits
// ────────────────────────────────────────────────────────────────────────────

/// Cap for any section not listed in the table.
pub const DEFAULT_SECTION_CAP: usize = 2;

/// Scored entries below this are dropped.
pub const DEFAULT_MIN_SCORE: u8 = 3;

const DEFAULT_CAPS: &[(&str, usize)] = &[
    ("current_position", 2),
    ("education", 2),
    ("research_positions", 3),
    ("awards_and_honors", 3),
    ("teaching_positions", 2),
    ("academic_articles", 3),
    ("software", 3),
    ("invited_speaker", 2),
    ("mentorship", 2),
];

/// Maximum entries kept per section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCaps {
    caps: HashMap<String, usize>,
    default_cap: usize,
}

impl Default for SectionCaps {
    fn default() -> Self {
        Self {
            caps: DEFAULT_CAPS
                .iter()
                .map(|(section, cap)| (section.to_string(), *cap))
                .collect(),
            default_cap: DEFAULT_SECTION_CAP,
        }
    }
}

impl SectionCaps {
    pub fn cap_for(&self, section: &str) -> usize {
        self.caps.get(section).copied().unwrap_or(self.default_cap)
    }

    /// Overrides replace the default for the sections they name only.
    pub fn with_overrides(mut self, overrides: HashMap<String, usize>) -> Self {
        self.caps.extend(overrides);
        self
    }

    /// Parses a `{"section": cap}` JSON mapping as given on the command line.
    pub fn parse_overrides(json: &str) -> Result<HashMap<String, usize>, AppError> {
        serde_json::from_str(json).map_err(|e| {
            AppError::Config(format!(
                "--entries-per-section must be a JSON object of section to count: {e}"
            ))
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Selection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult {
    pub selected: Vec<Entry>,
    pub excluded: Vec<(String, String)>, // (entry_id, reason)
}

/// Selects the entries a tailored document shows.
///
/// Algorithm:
/// 1. Group by section, sections in first-appearance order
/// 2. Rank each group: scored entries by score desc, then unscored by
///    importance desc; ties keep store order
/// 3. Drop scored entries below `min_score`
/// 4. Keep the first `caps.cap_for(section)` of what remains
pub fn select(entries: Vec<Entry>, caps: &SectionCaps, min_score: u8) -> SelectionResult {
    let mut groups: Vec<(String, Vec<Entry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(section, _)| *section == entry.section) {
            Some((_, group)) => group.push(entry),
            None => groups.push((entry.section.clone(), vec![entry])),
        }
    }

    let mut selected = Vec::new();
    let mut excluded = Vec::new();

    for (section, mut group) in groups {
        group.sort_by(rank_order);
        let limit = caps.cap_for(&section);
        let mut kept = 0usize;

        for entry in group {
            if let Some(score) = entry.relevance_score.filter(|s| s.value() < min_score) {
                let reason = format!("Score {score} below minimum {min_score}");
                excluded.push((entry.id, reason));
            } else if kept < limit {
                kept += 1;
                selected.push(entry);
            } else {
                let reason = format!("Section limit reached ({limit} max for {section})");
                excluded.push((entry.id, reason));
            }
        }
    }

    SelectionResult { selected, excluded }
}

fn rank_order(a: &Entry, b: &Entry) -> Ordering {
    match (a.relevance_score, b.relevance_score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.importance.cmp(&a.importance),
    }
}

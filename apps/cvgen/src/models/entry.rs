use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

/// Target output kind. Gates entry inclusion: an entry is only eligible for a
/// document when it carries the matching tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Cv,
    Resume,
}

impl DocType {
    pub const ALL: [DocType; 2] = [DocType::Cv, DocType::Resume];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Cv => "cv",
            DocType::Resume => "resume",
        }
    }

    /// Recognizes a persisted tag as a doc-type marker.
    pub fn from_tag(tag: &str) -> Option<Self> {
        DocType::ALL.into_iter().find(|d| d.as_str() == tag)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance of an entry to a target job, 0 (irrelevant) to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 10;
    pub const ZERO: Score = Score(0);

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Score(value))
    }

    /// Models answer with floats as often as ints; round to the nearest step.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 || value > Self::MAX as f64 {
            return None;
        }
        Some(Score(value.round() as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Score::from_f64(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("score {raw} is outside 0..={}", Score::MAX))
        })
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

/// One CV line item: a job, degree, publication, talk, and so on.
///
/// The persisted `tags` array is split at load time into `doc_types` and
/// `skill_tags`; companies live in their own set.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub section: String,
    pub title: String,
    pub institution: String,
    pub location: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub descriptions: Vec<String>,
    pub doc_types: BTreeSet<DocType>,
    pub skill_tags: BTreeSet<String>,
    pub companies: BTreeSet<String>,
    pub importance: i64,
    pub relevance_score: Option<Score>,
    pub relevance_reasoning: Option<String>,
    /// Set when `descriptions` were rewritten for a target job.
    pub original_descriptions: Option<Vec<String>>,
}

impl Entry {
    pub fn new(
        id: impl Into<String>,
        section: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            section: section.into(),
            title: title.into(),
            institution: String::new(),
            location: String::new(),
            start: None,
            end: None,
            descriptions: Vec::new(),
            doc_types: BTreeSet::new(),
            skill_tags: BTreeSet::new(),
            companies: BTreeSet::new(),
            importance: 0,
            relevance_score: None,
            relevance_reasoning: None,
            original_descriptions: None,
        }
    }

    pub fn is_for(&self, doc_type: DocType) -> bool {
        self.doc_types.contains(&doc_type)
    }

    /// Tag membership across both doc-type markers and skill tags.
    pub fn has_tag(&self, tag: &str) -> bool {
        match DocType::from_tag(tag) {
            Some(doc_type) => self.is_for(doc_type),
            None => self.skill_tags.contains(tag),
        }
    }

    pub fn has_company(&self, company: &str) -> bool {
        self.companies.contains(company)
    }

    /// Persisted tag list: doc-type markers first, then skill tags.
    pub fn tags(&self) -> Vec<String> {
        self.doc_types
            .iter()
            .map(|d| d.as_str().to_string())
            .chain(self.skill_tags.iter().cloned())
            .collect()
    }

    /// Missing end date, or an explicit "Current"/"Present".
    pub fn is_ongoing(&self) -> bool {
        match self.end.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(end) => end.eq_ignore_ascii_case("current") || end.eq_ignore_ascii_case("present"),
        }
    }

    /// Replaces the bullets, keeping the first snapshot of the originals.
    pub fn rewrite_descriptions(&mut self, improved: Vec<String>) {
        if self.original_descriptions.is_none() {
            self.original_descriptions = Some(std::mem::take(&mut self.descriptions));
        }
        self.descriptions = improved;
    }

    // Builder-style helpers, mostly for fixtures.

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        for tag in tags {
            match DocType::from_tag(tag) {
                Some(d) => {
                    self.doc_types.insert(d);
                }
                None => {
                    self.skill_tags.insert(tag.to_string());
                }
            }
        }
        self
    }

    pub fn with_companies(mut self, companies: &[&str]) -> Self {
        self.companies = companies.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_importance(mut self, importance: i64) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_descriptions(mut self, descriptions: &[&str]) -> Self {
        self.descriptions = descriptions.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.relevance_score = Score::new(score);
        self
    }
}

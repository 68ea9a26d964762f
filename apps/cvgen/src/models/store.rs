use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::entry::{DocType, Entry};

/// Store-level metadata. Unknown keys are preserved so derived stores keep
/// whatever the author recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillItem {
    pub name: String,
    pub level: String,
}

/// A named group of skills shown in the aside.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillCategory {
    pub id: String,
    pub name: String,
    pub order: u32,
    /// Render skill names in code style.
    pub code: bool,
    pub doc_types: BTreeSet<DocType>,
    pub items: Vec<SkillItem>,
}

/// A named prose fragment such as the professional summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub id: String,
    pub content: String,
    pub doc_types: BTreeSet<DocType>,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactInfo {
    pub label: String,
    pub icon: Option<String>,
    pub value: String,
}

/// The full career database, or any subset derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    pub meta: Meta,
    pub contact_info: Vec<ContactInfo>,
    pub entries: Vec<Entry>,
    pub skills: Vec<SkillCategory>,
    pub text_blocks: Vec<TextBlock>,
}

impl Store {
    pub fn text_block(&self, id: &str) -> Option<&TextBlock> {
        self.text_blocks.iter().find(|b| b.id == id)
    }

    /// Section keys in first-appearance order.
    pub fn sections(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|e| e.section.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }
}

/// Lowercased, underscore-separated key derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}

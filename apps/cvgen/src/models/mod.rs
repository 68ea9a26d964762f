pub mod entry;
pub mod store;

pub use entry::{DocType, Entry, Score};
pub use store::{ContactInfo, Meta, SkillCategory, SkillItem, Store, TextBlock};

// Tailoring pipeline: filter → score → select.
// All LLM calls go through llm_client; every stage also runs offline.

pub mod comprehensive;
pub mod filter;
pub mod job_posting;
pub mod prompts;
pub mod scoring;
pub mod selector;
pub mod tailor;

// Shared prompt fragments. Each pipeline stage that calls the LLM keeps its
// own templates in `pipeline::prompts` and reuses these.

/// Keeps rewritten bullets tied to the facts already in the entry.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Rewritten descriptions may only rephrase, reorder, or emphasize facts \
    already present in the entry. Do NOT invent employers, dates, metrics, or tools. \
    If the entry does not support a claim, omit it.";

/// Asks for relevance, not polish.
pub const RELEVANCE_INSTRUCTION: &str = "\
    Focus on relevance, not just quality. An impressive entry that is irrelevant \
    to the job must score low.";

// All LLM prompt constants for the tailoring pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for job posting analysis, JSON-only output.
pub const JOB_ANALYSIS_SYSTEM: &str =
    "You are an expert career counselor and resume specialist. \
    Analyze a job posting and extract structured information. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Job analysis prompt template. Replace `{job_posting}` before sending.
pub const JOB_ANALYSIS_PROMPT_TEMPLATE: &str =
    r#"Analyze the following job posting and extract the key information.

Return a JSON object with this EXACT schema (no extra fields):
{
  "required_skills": ["Rust", "distributed systems"],
  "desired_experience": ["building data pipelines"],
  "key_responsibilities": ["own the ingestion service"],
  "industry_knowledge": ["genomics"],
  "soft_skills": ["mentoring"]
}

Each list may be empty. Use short phrases taken from the posting.

Job posting:
{job_posting}"#;

/// System prompt for per-entry relevance scoring.
pub const SCORE_ENTRY_SYSTEM: &str =
    "You are an expert career counselor and resume specialist. \
    Score how relevant one CV/resume entry is to a job. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Per-entry scoring prompt. Replace `{relevance_instruction}`,
/// `{grounding_instruction}`, `{entry_text}` and `{target}` before sending.
pub const SCORE_ENTRY_PROMPT_TEMPLATE: &str =
    r#"Score the relevance of this resume entry for the job described.

Return a JSON object with this EXACT schema:
{
  "score": 7,
  "reasoning": "<one or two sentences>",
  "improved_descriptions": ["<rewritten bullet 1>", "<rewritten bullet 2>"]
}

Rules:
- "score" is an integer from 0 to 10, where 10 is extremely relevant.
- "improved_descriptions" rewrites the entry's bullets to emphasize what matters for this job.
- {relevance_instruction}
- {grounding_instruction}

Resume entry:
{entry_text}

Job details:
{target}"#;

/// System prompt for whole-store tailoring in a single call.
pub const COMPREHENSIVE_SYSTEM: &str =
    "You are an expert CV/resume tailoring assistant. \
    Given a job posting and a list of CV entries, choose and rewrite the most relevant ones. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Comprehensive tailoring prompt. Replace `{grounding_instruction}`,
/// `{valid_ids}`, `{entries_json}` and `{target}` before sending.
pub const COMPREHENSIVE_PROMPT_TEMPLATE: &str =
    r#"Select the entries most relevant to this job (at most 2-3 per section),
rewrite their descriptions, and write a tailored professional summary.

Return a JSON object with this EXACT schema:
{
  "entries": [
    {
      "id": "<id copied from the input>",
      "score": 8,
      "reasoning": "<why this entry matters for the job>",
      "descriptions": ["<rewritten bullet>"]
    }
  ],
  "summary": "<3-4 sentence professional summary>"
}

CRITICAL RULES:
- "id" MUST be one of: {valid_ids}. Entries not listed are dropped.
- "score" is an integer from 0 to 10.
- {grounding_instruction}

CV entries (JSON):
{entries_json}

Job details:
{target}"#;

/// System prompt for the professional summary rewrite.
pub const SUMMARY_SYSTEM: &str =
    "You are an expert resume writer. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object.";

/// Summary prompt. Replace `{current_summary}`, `{entry_titles}`,
/// `{grounding_instruction}` and `{target}` before sending.
pub const SUMMARY_PROMPT_TEMPLATE: &str =
    r#"Rewrite the professional summary below so it speaks to this job.

Return a JSON object: {"summary": "<3-4 sentences>"}

Rules:
- Keep it in the same person and tense as the current summary.
- Only mention experience backed by the current summary or the selected entries.
- {grounding_instruction}

Current summary:
{current_summary}

Selected entries:
{entry_titles}

Job details:
{target}"#;

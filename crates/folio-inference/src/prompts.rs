//! Prompt templates per job type.

use folio_core::{defaults, JobType};

/// First `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the prompt for `job_type` over `text`.
///
/// The input is capped at [`defaults::PROMPT_INPUT_MAX_CHARS`] characters.
pub fn build_prompt(job_type: JobType, text: &str) -> String {
    let text = truncate_chars(text, defaults::PROMPT_INPUT_MAX_CHARS);
    match job_type {
        JobType::Summarize => format!(
            "Write a structured summary of the following academic text.

Organize the summary into:
1. Main thesis / core argument
2. Methodology (if relevant)
3. Key findings / arguments
4. Conclusions

Text:
{text}

Summary:"
        ),
        JobType::ExtractQuotes => format!(
            "Extract the most important quotable statements from the following text.

Format each quote as follows:
- \"Quote\" (context / significance)

Text:
{text}

Key quotes:"
        ),
        JobType::MetadataLookup => format!(
            "Extract bibliographic metadata from the following text.

Look for: title, author(s), year, DOI, ISBN, publisher, journal

Text:
{text}

Metadata found (JSON):"
        ),
    }
}

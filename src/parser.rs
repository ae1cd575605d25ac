//! C1 — Request Parser.
//!
//! Turns free-form text from a message's text part into a `(skill-id, args)`
//! tuple, using the ordered, first-match keyword and URL heuristics in
//! `spec.md` §4.1. The ordering is load-bearing and must not be reshuffled.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

const ANALYSIS_CUES: &[&str] = &["analyze", "analysis", "summarize", "summary", "gemini", "ai "];

/// A parsed request: which skill to invoke, and the arguments to invoke it
/// with. Cached on the task metadata so a correlated resubmission (the
/// second message of the Standalone Flow) can re-drive the same executor
/// without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub skill_id: String,
    pub args: Value,
}

/// Classifies free-form `text` into a skill and its arguments. Rules are
/// applied in order; the first match wins.
pub fn parse(text: &str) -> ParsedRequest {
    let lower = text.to_lowercase();

    if let Some(cue) = ANALYSIS_CUES.iter().find(|cue| lower.contains(*cue)) {
        let content = split_after_cue(text, &lower, cue);
        return ParsedRequest {
            skill_id: "ai-analysis".to_string(),
            args: json!({ "content": content }),
        };
    }

    let starts_with_url = URL_RE.is_match(text) && text.trim_start().to_lowercase().starts_with("http");

    if lower.contains("pdf") && !starts_with_url {
        return ParsedRequest {
            skill_id: "markdown-to-pdf".to_string(),
            args: json!({ "markdown": strip_preamble(text, "convert to pdf:") }),
        };
    }

    if lower.contains("html") && !starts_with_url {
        return ParsedRequest {
            skill_id: "markdown-to-html".to_string(),
            args: json!({ "markdown": strip_preamble(text, "convert to html:") }),
        };
    }

    if let Some(url_match) = URL_RE.find(text) {
        return ParsedRequest {
            skill_id: "screenshot".to_string(),
            args: json!({ "url": url_match.as_str() }),
        };
    }

    ParsedRequest {
        skill_id: "markdown-to-html".to_string(),
        args: json!({ "markdown": text }),
    }
}

/// Returns the text after the first occurrence of `cue`, or the whole text
/// if no punctuation follows the cue.
fn split_after_cue(original: &str, lower: &str, cue: &str) -> String {
    let idx = lower.find(cue).expect("cue was matched by caller");
    let after = &original[idx + cue.len()..];
    match after.find([':', '-']) {
        Some(punct_idx) => after[punct_idx + 1..].trim().to_string(),
        None if after.trim().is_empty() => original.trim().to_string(),
        None => after.trim().to_string(),
    }
}

fn strip_preamble(text: &str, preamble: &str) -> String {
    let lower = text.to_lowercase();
    match lower.find(preamble) {
        Some(idx) => text[idx + preamble.len()..].trim().to_string(),
        None => text.trim().to_string(),
    }
}

//! Response Sanitization
//!
//! Strips formatting artifacts from raw model output and yields structured
//! data or a typed parse failure. Handles:
//! - Markdown code fence wrapping (```json ... ```), with or without a
//!   language tag
//! - JSON embedded in explanatory prose
//!
//! Sanitizing already-clean text is a no-op, so the pipeline is idempotent.
//! Parse failures carry the raw text; callers substitute a safe default
//! rather than raising.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

use crate::types::ParseFailure;

/// Strip a surrounding markdown code fence, tolerating a language tag on the
/// opening fence. Returns the input unchanged when no fence is present.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();

    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    // Drop the opening fence line; a trailing fence is only removed when an
    // opening fence was present.
    let body = match trimmed.find('\n') {
        Some(first_newline) => &trimmed[first_newline + 1..],
        None => return trimmed.to_string(),
    };

    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);

    body.trim().to_string()
}

/// Parse model output into JSON after fence-stripping.
///
/// One recovery attempt extracts the first balanced object or array from
/// mixed prose before giving up with a `ParseFailure` carrying the raw text.
pub fn parse_json(raw: &str) -> Result<Value, ParseFailure> {
    let cleaned = strip_code_fences(raw);

    let first_error = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(extracted) = extract_balanced(&cleaned)
        && let Ok(value) = serde_json::from_str::<Value>(&extracted)
    {
        debug!("JSON extracted from mixed content");
        return Ok(value);
    }

    Err(ParseFailure::new(first_error.to_string(), raw))
}

/// Extract the first fenced `python` code block from a response, falling
/// back to plain fence-stripping when the response is code-only.
pub fn extract_python_block(text: &str) -> Option<String> {
    let captured = python_block_regex()
        .captures(text)
        .map(|caps| caps[1].trim().to_string());
    if captured.is_some() {
        return captured;
    }

    // Code-only responses arrive as a single fenced (or bare) script
    let stripped = strip_code_fences(text);
    if stripped.contains("Diagram(") {
        Some(stripped)
    } else {
        None
    }
}

/// Split an architecture response into report text and extracted diagram
/// code. The fenced block is removed from the report.
pub fn split_architecture_response(text: &str) -> (String, Option<String>) {
    if let Some(found) = python_block_regex().find(text) {
        let code = python_block_regex()
            .captures(text)
            .map(|caps| caps[1].trim().to_string());
        let mut report = String::with_capacity(text.len());
        report.push_str(&text[..found.start()]);
        report.push_str(&text[found.end()..]);
        (report.trim().to_string(), code)
    } else {
        (text.trim().to_string(), None)
    }
}

fn python_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```python\n(.*?)```").expect("static regex must compile")
    })
}

/// Find the first balanced `{...}` or `[...]` in mixed content.
fn extract_balanced(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let open = s[start..].chars().next()?;
    let close = if open == '{' { '}' } else { ']' };

    let mut brace_depth = 0i32;
    let mut bracket_depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => brace_depth += 1,
            '}' if !in_string => {
                brace_depth -= 1;
                if brace_depth == 0 && bracket_depth == 0 && ch == close {
                    return Some(s[start..start + i + 1].to_string());
                }
            }
            '[' if !in_string => bracket_depth += 1,
            ']' if !in_string => {
                bracket_depth -= 1;
                if brace_depth == 0 && bracket_depth == 0 && ch == close {
                    return Some(s[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

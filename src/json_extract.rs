//! Shared response-cleaning utility: strip Markdown code fences and extract
//! the first balanced JSON object from an LLM's raw text response.
//!
//! Generalizes the fence-stripping / brace-scanning logic every
//! response parser in this crate needs (ranking, decontextualization,
//! analyzers, synthesis) into one function instead of duplicating it per
//! call site.

/// Strips a leading/trailing Markdown code fence (```` ```json ... ``` ````
/// or plain ```` ``` ... ``` ````) if present.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Scans `text` for the first balanced `{...}` substring, respecting string
/// literals and escapes so braces inside quoted strings don't throw off the
/// depth count. Returns `None` if no balanced object is found.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    let cleaned = strip_code_fence(text);
    let bytes = cleaned.as_bytes();
    let start = cleaned.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&cleaned[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the first balanced JSON object in `text` into `T`, stripping code
/// fences first. Returns `None` for unparseable or missing content rather
/// than erroring, so callers can choose a lenient or strict fallback.
#[must_use]
pub fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let object = extract_json_object(text)?;
    serde_json::from_str(object).ok()
}

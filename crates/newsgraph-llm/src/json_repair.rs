//! Best-effort repair of JSON text returned by an LLM that stopped mid
//! object (hit `max_tokens`, or wrapped the payload in prose/backticks).
//! There is no teacher counterpart for this — the teacher's providers only
//! ever parse structured tool-call output — so the approach here is the
//! smallest thing that reliably handles the failure modes spec.md §5
//! actually lists: truncated arrays/objects, and markdown code fences.

use serde_json::Value;

/// Strips ```json fences and leading/trailing prose around the outermost
/// `{...}` or `[...]`, then tries increasingly aggressive truncation
/// repairs. Returns `None` only when nothing resembling JSON can be found.
pub fn repair(raw: &str) -> Option<Value> {
    let candidate = strip_code_fence(raw);
    if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
        return Some(value);
    }

    let trimmed = extract_outermost_braces(&candidate)?;
    if let Ok(value) = serde_json::from_str::<Value>(&trimmed) {
        return Some(value);
    }

    close_truncated(&trimmed)
}

fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim_end_matches("```").trim().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim_end_matches("```").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn extract_outermost_braces(s: &str) -> Option<String> {
    let start = s.find(['{', '['])?;
    let opener = s.as_bytes()[start];
    let closer = if opener == b'{' { b'}' } else { b']' };
    let end = s.as_bytes().iter().rposition(|&b| b == closer)?;
    if end <= start {
        return None;
    }
    Some(s[start..=end].to_string())
}

/// Walks the string tracking bracket/brace/string depth and appends closers
/// for whatever was left open, dropping a trailing partial token (a key with
/// no value, a dangling comma) before closing.
fn close_truncated(s: &str) -> Option<Value> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut last_good_end = 0usize;

    for (i, ch) in s.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
                last_good_end = i + ch.len_utf8();
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
                last_good_end = i + ch.len_utf8();
            }
            ',' | ' ' | '\n' | '\t' | '\r' => {}
            _ => last_good_end = i + ch.len_utf8(),
        }
    }

    let mut repaired = s[..last_good_end].trim_end_matches(',').to_string();
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }

    serde_json::from_str(&repaired).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_json_without_modification() {
        let raw = r#"{"a": 1, "b": [1, 2, 3]}"#;
        assert_eq!(repair(raw).unwrap(), json!({"a": 1, "b": [1, 2, 3]}));
    }

    #[test]
    fn strips_markdown_code_fence() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(repair(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn strips_surrounding_prose() {
        let raw = "Here is the JSON you requested:\n{\"a\": 1}\nLet me know if you need anything else.";
        assert_eq!(repair(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn closes_a_truncated_array_of_objects() {
        let raw = r#"{"facts": [{"id": 1, "content": "x"}, {"id": 2, "content": "y"#;
        let repaired = repair(raw).unwrap();
        assert_eq!(repaired["facts"][0]["id"], 1);
        assert!(repaired["facts"].as_array().unwrap().len() >= 1);
    }

    #[test]
    fn returns_none_for_unrecoverable_garbage() {
        assert!(repair("not json at all, just words").is_none());
    }
}

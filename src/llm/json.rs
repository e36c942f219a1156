//! Lenient parsing of structured data embedded in model output.

use serde_json::Value;

/// Parse `text` as JSON, falling back to an embedded block.
///
/// Models often wrap the object in a fenced code block or surround it with
/// prose. Direct parsing is tried first, then the fenced block, then the
/// outermost brace-delimited span.
pub fn parse_structured(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            return Some(value);
        }
    }

    brace_span(trimmed).and_then(|span| serde_json::from_str::<Value>(span).ok())
}

/// Content of the first fenced code block, without its language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    let block = rest[..end].trim_start();
    let block = block
        .strip_prefix("json")
        .or_else(|| block.strip_prefix("JSON"))
        .unwrap_or(block);
    Some(block.trim())
}

/// Span from the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(parse_structured(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"urls\": [\"x\"]}\n```\nThanks";
        assert_eq!(parse_structured(text), Some(json!({"urls": ["x"]})));
    }

    #[test]
    fn test_surrounding_prose() {
        let text = "Sure! {\"ok\": true} Let me know.";
        assert_eq!(parse_structured(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_not_json() {
        assert_eq!(parse_structured("The studies are broadly similar."), None);
        assert_eq!(parse_structured("Broken {\"a\": } object"), None);
    }
}

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::AgentError;

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```").expect("valid code block regex")
});

/// A fenced block from markdown output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence; empty when absent.
    pub language: String,
    pub code: String,
}

pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    CODE_BLOCK
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps[1].to_ascii_lowercase(),
            code: caps[2].trim().to_string(),
        })
        .collect()
}

/// Parses `T` from a model response.
///
/// Tries, in order: the whole text, each `json`/unlabelled fenced block, and
/// the outermost `{ ... }` span.
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T, AgentError> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    for block in extract_code_blocks(trimmed) {
        if block.language.is_empty() || block.language == "json" {
            if let Ok(value) = serde_json::from_str(&block.code) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = trimmed.chars().take(120).collect();
    Err(AgentError::MalformedOutput(format!(
        "could not parse JSON from response: {preview}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn parses_bare_json() {
        let v: Value = parse_json_response(r#" {"issues": []} "#).unwrap();
        assert!(v["issues"].as_array().unwrap().is_empty());
    }

    #[test]
    fn parses_fenced_json_block() {
        let text = "Here is the review:\n```json\n{\"summary\": \"fine\"}\n```\nThanks";
        let v: Value = parse_json_response(text).unwrap();
        assert_eq!(v["summary"], "fine");
    }

    #[test]
    fn skips_non_json_blocks() {
        let text = "```python\nprint('x')\n```\n```\n{\"a\": 1}\n```";
        let v: Value = parse_json_response(text).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn falls_back_to_brace_span() {
        let text = "Sure! {\"root_cause\": \"typo\", \"bug_location\": {\"line\": 2}} Hope it helps.";
        let v: Value = parse_json_response(text).unwrap();
        assert_eq!(v["bug_location"]["line"], 2);
    }

    #[test]
    fn garbage_is_malformed_output() {
        let err = parse_json_response::<Value>("no json here").unwrap_err();
        assert!(matches!(err, AgentError::MalformedOutput(_)));
    }

    #[test]
    fn extracts_language_and_code() {
        let blocks = extract_code_blocks("```Rust\nfn main() {}\n```");
        assert_eq!(
            blocks,
            vec![CodeBlock {
                language: "rust".into(),
                code: "fn main() {}".into()
            }]
        );
    }
}

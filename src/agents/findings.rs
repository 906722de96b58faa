//! Review findings as reported by the reviewer agent.
//!
//! - [`Severity`]: severity label of a finding, preserving unknown labels
//! - [`Finding`]: one issue with location, category and suggestion
//!
//! ```
//! use revloop::agents::{Finding, Severity};
//!
//! let finding = Finding::new(Severity::High, "SQL built by string concatenation")
//!     .with_line(42)
//!     .with_suggestion("Use parameterized queries");
//!
//! assert!(finding.is_high_priority());
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Severity label of a finding.
///
/// Labels outside the five known levels are kept verbatim in
/// [`Severity::Other`] so that scoring can apply its fallback weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
    Other(String),
}

impl Severity {
    /// Critical and high findings are the ones the engine hands to the debugger.
    pub fn is_high_priority(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Severity {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            "info" => Self::Info,
            _ => Self::Other(label),
        }
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue reported by the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default, deserialize_with = "lenient_line")]
    pub line: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity: Some(severity),
            line: None,
            kind: None,
            description: description.into(),
            suggestion: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_high_priority(&self) -> bool {
        self.severity.as_ref().is_some_and(Severity::is_high_priority)
    }
}

/// First critical/high finding in report order.
pub fn first_high_priority(findings: &[Finding]) -> Option<&Finding> {
    findings.iter().find(|f| f.is_high_priority())
}

// Models answer with `42`, `"42"`, `null` or `"n/a"`; anything that is not a
// line number becomes `None`.
fn lenient_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

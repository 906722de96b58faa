use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::parse::parse_json_response;
use super::{ReviewReport, Reviewer};
use crate::error::AgentError;
use crate::provider::{CompletionProvider, CompletionRequest, Message};

const SYSTEM_PROMPT: &str = "You are an expert code reviewer. Find bugs, security \
vulnerabilities, performance problems and maintainability issues. Rate each issue \
as critical, high, medium, low or info.";

/// Reviewer backed by a completion provider.
pub struct LlmReviewer {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmReviewer {
    pub fn new(provider: Arc<dyn CompletionProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    fn request(&self, code: &str, language: Option<&str>) -> CompletionRequest {
        let language = language.unwrap_or("unknown");
        let user = format!(
            "Review the following {language} code:\n\
             ```{language}\n{code}\n```\n\
             Respond with ONLY valid JSON:\n\
             {{\"summary\": \"<overall assessment>\",\n \
              \"issues\": [{{\"severity\": \"critical|high|medium|low|info\", \"line\": <number>, \
             \"type\": \"bug|security|performance|style|best-practice\", \
             \"description\": \"<what is wrong>\", \"suggestion\": \"<how to fix>\"}}],\n \
              \"strengths\": [\"...\"],\n \
              \"recommendations\": [\"...\"]}}"
        );
        CompletionRequest::new(
            vec![Message::system(SYSTEM_PROMPT), Message::user(user)],
            self.temperature,
            self.max_tokens,
        )
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, code: &str, language: Option<&str>) -> Result<ReviewReport, AgentError> {
        let text = self.provider.complete(&self.request(code, language)).await?;
        let report: ReviewReport = parse_json_response(&text)?;
        debug!(findings = report.findings.len(), "review parsed");
        Ok(report)
    }
}

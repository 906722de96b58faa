use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::parse::parse_json_response;
use super::{DebugReport, DebugRequest, Debugger};
use crate::error::AgentError;
use crate::provider::{CompletionProvider, CompletionRequest, Message};

const SYSTEM_PROMPT: &str = "You are an expert debugger. Find the root cause of the \
reported problem and return the complete corrected program.";

/// Debugger backed by a completion provider.
pub struct LlmDebugger {
    provider: Arc<dyn CompletionProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl LlmDebugger {
    pub fn new(provider: Arc<dyn CompletionProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    fn request(&self, req: &DebugRequest) -> CompletionRequest {
        let language = req.language.as_deref().unwrap_or("unknown");
        let error_context = req
            .error_message
            .as_deref()
            .map(|msg| format!("\nError message:\n{msg}\n"))
            .unwrap_or_default();
        let user = format!(
            "Debug the following code:\n\
             Language: {language}\n\
             ```{language}\n{code}\n```\n\
             {error_context}\n\
             Respond with ONLY valid JSON:\n\
             {{\"root_cause\": \"...\", \"bug_location\": {{\"line\": <number>, \"function\": \"...\"}}, \
             \"explanation\": \"...\", \"fixed_code\": \"<complete fixed code>\", \
             \"fix_explanation\": \"...\", \"prevention\": [\"...\"], \"tests\": [\"...\"]}}",
            code = req.code,
        );
        CompletionRequest::new(
            vec![Message::system(SYSTEM_PROMPT), Message::user(user)],
            self.temperature,
            self.max_tokens,
        )
    }
}

#[async_trait]
impl Debugger for LlmDebugger {
    async fn debug(&self, request: &DebugRequest) -> Result<DebugReport, AgentError> {
        let text = self.provider.complete(&self.request(request)).await?;
        let report: DebugReport = parse_json_response(&text)?;
        debug!(has_fix = report.fix().is_some(), "debug report parsed");
        Ok(report)
    }
}

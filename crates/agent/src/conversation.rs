use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, ToolCall};
use crate::tools::ToolTransport;

/// Upper bound on completion rounds per query, tool rounds included.
pub const DEFAULT_MAX_STEPS: usize = 15;

/// Whether an agent accepts a standing system instruction in its memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemInstructionSupport {
    Supported,
    Unsupported,
}

#[async_trait]
pub trait ConversationalAgent: Send {
    async fn run(&mut self, query: &str, tools: &dyn ToolTransport) -> Result<String, AgentError>;

    fn clear_history(&mut self);

    fn system_instruction_support(&self) -> SystemInstructionSupport {
        SystemInstructionSupport::Unsupported
    }

    /// Only called when `system_instruction_support` reports `Supported`.
    fn install_system_instruction(&mut self, _instruction: &str) {}
}

/// Conversational agent over a chat completion endpoint. Each run offers the
/// session's tools and keeps executing requested tool calls until the model
/// answers in text or `max_steps` completions have been spent. With memory
/// enabled the query and final answer are appended to the history sent on
/// the next run; intermediate tool turns are not kept.
pub struct MemoryAgent {
    llm: Arc<dyn LlmClient>,
    model: String,
    memory_enabled: bool,
    max_steps: usize,
    system_instruction: Option<String>,
    history: Vec<ChatMessage>,
}

impl MemoryAgent {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, memory_enabled: bool) -> Self {
        Self {
            llm,
            model: model.into(),
            memory_enabled,
            max_steps: DEFAULT_MAX_STEPS,
            system_instruction: None,
            history: Vec::new(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    fn opening_messages(&self, query: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(instruction) = &self.system_instruction {
            messages.push(ChatMessage::system(instruction.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(query));
        messages
    }
}

#[async_trait]
impl ConversationalAgent for MemoryAgent {
    async fn run(&mut self, query: &str, tools: &dyn ToolTransport) -> Result<String, AgentError> {
        let mut request = CompletionRequest {
            model: self.model.clone(),
            messages: self.opening_messages(query),
            temperature: 0.0,
            tools: tools.tools().iter().map(|tool| tool.function_spec()).collect(),
        };

        for step in 1..=self.max_steps {
            let completion = self.llm.complete(&request).await?;
            if !completion.wants_tools() {
                if self.memory_enabled {
                    self.history.push(ChatMessage::user(query));
                    self.history.push(ChatMessage::assistant(completion.content.clone()));
                }
                return Ok(completion.content);
            }

            debug!(
                event_name = "agent.tools.requested",
                step,
                calls = completion.tool_calls.len(),
                "model requested tool calls"
            );
            request.messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                let output = execute(tools, call).await;
                request.messages.push(ChatMessage::tool(call.id.clone(), output));
            }
        }

        warn!(
            event_name = "agent.tools.step_limit",
            max_steps = self.max_steps,
            "agent ran out of steps before answering"
        );
        Err(AgentError::StepLimit(self.max_steps))
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }

    fn system_instruction_support(&self) -> SystemInstructionSupport {
        SystemInstructionSupport::Supported
    }

    fn install_system_instruction(&mut self, instruction: &str) {
        self.system_instruction = Some(instruction.to_string());
    }
}

/// Runs one requested call. Failures become the tool reply so the model can
/// recover on the next step.
async fn execute(tools: &dyn ToolTransport, call: &ToolCall) -> String {
    let arguments = if call.function.arguments.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str::<Value>(&call.function.arguments)
    };

    let outcome = match arguments {
        Ok(arguments) => tools.call_tool(&call.function.name, arguments).await,
        Err(error) => Err(AgentError::Run(format!(
            "arguments for `{}` are not valid JSON: {error}",
            call.function.name
        ))),
    };

    outcome.unwrap_or_else(|error| {
        warn!(
            event_name = "agent.tools.call_failed",
            tool = %call.function.name,
            error = %error,
            "tool call failed"
        );
        format!("Error: {error}")
    })
}

//! Deterministic stand-ins for the completion client and the agent session,
//! shared by this crate's tests and the server and CLI test suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::conversation::{ConversationalAgent, SystemInstructionSupport};
use crate::errors::AgentError;
use crate::llm::{Completion, CompletionRequest, LlmClient, LlmError};
use crate::runtime::{AgentFactory, AgentSession};
use crate::tools::{ToolDescriptor, ToolServers, ToolSession, ToolTransport};

/// Completion client that plays back scripted completions in order,
/// repeating the last one once the script runs out, and records every
/// request it was sent.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::sequence(vec![Completion::text(reply)])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(vec![Err(message.into())])
    }

    pub fn sequence(completions: Vec<Completion>) -> Self {
        Self::with_script(completions.into_iter().map(Ok).collect())
    }

    fn with_script(script: Vec<Result<Completion, String>>) -> Self {
        Self { script: Mutex::new(script.into()), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());

        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        let next = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
        next.unwrap_or_else(|| Err("script is empty".to_string())).map_err(LlmError::Other)
    }
}

/// Tool transport offering a single tool that always returns the same
/// output. Calls to any other tool fail.
pub struct ScriptedTools {
    tool: ToolDescriptor,
    output: String,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTools {
    pub fn offering(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool: ToolDescriptor {
                server: "scripted".to_string(),
                name: name.into(),
                description: "scripted tool".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            },
            output: output.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ToolTransport for ScriptedTools {
    async fn open(&mut self, _servers: &ToolServers) -> Result<(), AgentError> {
        Ok(())
    }

    fn sessions(&self) -> Vec<ToolSession> {
        vec![ToolSession {
            name: self.tool.server.clone(),
            endpoint: "memory://scripted".to_string(),
            tools: 1,
        }]
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![self.tool.clone()]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, AgentError> {
        if name != self.tool.name {
            return Err(AgentError::Transport(format!("no tool server offers `{name}`")));
        }
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.push((name.to_string(), arguments));
        Ok(self.output.clone())
    }

    async fn close_all_sessions(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    runs: AtomicUsize,
    clears: AtomicUsize,
    closes: AtomicUsize,
    instructions: Mutex<Vec<String>>,
    last_query: Mutex<Option<String>>,
}

#[derive(Clone)]
enum AgentScript {
    Answer(String),
    Error(String),
}

/// Factory producing stub sessions whose behaviour is fixed up front.
/// Clones share their counters, so a test can hand one clone to an
/// `AgentManager` and inspect the other.
#[derive(Clone)]
pub struct StubAgentFactory {
    script: AgentScript,
    connect_error: Option<String>,
    delay: Option<Duration>,
    instruction_support: SystemInstructionSupport,
    counters: Arc<Counters>,
}

impl StubAgentFactory {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self::scripted(AgentScript::Answer(answer.into()))
    }

    pub fn erroring(message: impl Into<String>) -> Self {
        Self::scripted(AgentScript::Error(message.into()))
    }

    pub fn failing_to_connect(message: impl Into<String>) -> Self {
        Self { connect_error: Some(message.into()), ..Self::answering("") }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without_system_instruction(mut self) -> Self {
        self.instruction_support = SystemInstructionSupport::Unsupported;
        self
    }

    fn scripted(script: AgentScript) -> Self {
        Self {
            script,
            connect_error: None,
            delay: None,
            instruction_support: SystemInstructionSupport::Supported,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.counters.clears.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    pub fn installed_instructions(&self) -> Vec<String> {
        self.counters.instructions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_query(&self) -> Option<String> {
        self.counters.last_query.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl AgentFactory for StubAgentFactory {
    async fn connect(&self) -> Result<AgentSession, AgentError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.connect_error {
            return Err(AgentError::Transport(message.clone()));
        }

        let mut transport = StubTransport { counters: self.counters.clone(), open: Vec::new() };
        transport.open(&ToolServers::default()).await?;

        let agent = StubAgent {
            script: self.script.clone(),
            delay: self.delay,
            instruction_support: self.instruction_support,
            counters: self.counters.clone(),
        };
        Ok(AgentSession::new(transport, agent))
    }
}

struct StubTransport {
    counters: Arc<Counters>,
    open: Vec<ToolSession>,
}

#[async_trait]
impl ToolTransport for StubTransport {
    async fn open(&mut self, _servers: &ToolServers) -> Result<(), AgentError> {
        self.open.push(ToolSession {
            name: "stub".to_string(),
            endpoint: "memory://stub".to_string(),
            tools: 0,
        });
        Ok(())
    }

    fn sessions(&self) -> Vec<ToolSession> {
        self.open.clone()
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<String, AgentError> {
        Err(AgentError::Transport(format!("no tool server offers `{name}`")))
    }

    async fn close_all_sessions(&mut self) -> Result<(), AgentError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.open.clear();
        Ok(())
    }
}

struct StubAgent {
    script: AgentScript,
    delay: Option<Duration>,
    instruction_support: SystemInstructionSupport,
    counters: Arc<Counters>,
}

#[async_trait]
impl ConversationalAgent for StubAgent {
    async fn run(&mut self, query: &str, _tools: &dyn ToolTransport) -> Result<String, AgentError> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_query.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(query.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            AgentScript::Answer(answer) => Ok(answer.clone()),
            AgentScript::Error(message) => Err(AgentError::Run(message.clone())),
        }
    }

    fn clear_history(&mut self) {
        self.counters.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn system_instruction_support(&self) -> SystemInstructionSupport {
        self.instruction_support
    }

    fn install_system_instruction(&mut self, instruction: &str) {
        self.counters
            .instructions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction.to_string());
    }
}

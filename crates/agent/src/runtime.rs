//! Agent lifecycle and query processing.
//!
//! `AgentManager` owns at most one `AgentSession` (transport plus agent) and
//! the response cache. The session is created lazily on the first cache miss
//! or by an explicit `initialize`, reused for every later query and torn down
//! by `close`, after which the next query creates a fresh one.
//!
//! Locking: the cache sits behind a short-held mutex so cache hits never wait
//! on an in-flight agent run; the session sits behind an async mutex held for
//! the whole run, which serializes callers on the stateful agent.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nexus_core::cache::{CacheStats, ResponseCache};
use nexus_core::config::AppConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::conversation::{
    ConversationalAgent, MemoryAgent, SystemInstructionSupport, DEFAULT_MAX_STEPS,
};
use crate::errors::AgentError;
use crate::llm::LlmClient;
use crate::prompts::{contextualize, TRAVEL_ASSISTANT_INSTRUCTION};
use crate::tools::{McpToolTransport, ToolServers, ToolSession, ToolTransport};

pub struct AgentSession {
    transport: Box<dyn ToolTransport>,
    agent: Box<dyn ConversationalAgent>,
}

impl AgentSession {
    pub fn new<T, A>(transport: T, agent: A) -> Self
    where
        T: ToolTransport + 'static,
        A: ConversationalAgent + 'static,
    {
        Self { transport: Box::new(transport), agent: Box::new(agent) }
    }

    pub fn tool_sessions(&self) -> Vec<ToolSession> {
        self.transport.sessions()
    }

    /// One agent run with this session's tools on offer.
    pub async fn run(&mut self, query: &str) -> Result<String, AgentError> {
        self.agent.run(query, &*self.transport).await
    }
}

#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn connect(&self) -> Result<AgentSession, AgentError>;
}

/// Connects an MCP client to every configured tool server and binds a
/// `MemoryAgent` to the shared completion client.
pub struct DefaultAgentFactory {
    llm: Arc<dyn LlmClient>,
    model: String,
    tool_config_path: Option<PathBuf>,
    memory_enabled: bool,
    max_steps: usize,
}

impl DefaultAgentFactory {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tool_config_path: Option<PathBuf>,
        memory_enabled: bool,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            tool_config_path,
            memory_enabled,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn from_config(config: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        Self::new(
            llm,
            config.llm.model.clone(),
            config.agent.tool_config_path.clone(),
            config.agent.memory_enabled,
        )
        .with_max_steps(config.agent.max_steps)
    }
}

#[async_trait]
impl AgentFactory for DefaultAgentFactory {
    async fn connect(&self) -> Result<AgentSession, AgentError> {
        let servers = match &self.tool_config_path {
            Some(path) => ToolServers::load(path)?,
            None => ToolServers::default(),
        };

        let mut transport = McpToolTransport::default();
        transport.open(&servers).await?;

        let agent = MemoryAgent::new(self.llm.clone(), self.model.clone(), self.memory_enabled)
            .with_max_steps(self.max_steps);
        Ok(AgentSession::new(transport, agent))
    }
}

#[derive(Clone, Debug)]
pub struct ManagerSettings {
    pub system_instruction: String,
    pub run_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            system_instruction: TRAVEL_ASSISTANT_INSTRUCTION.to_string(),
            run_timeout: Duration::from_secs(120),
            cache_ttl: nexus_core::cache::DEFAULT_TTL,
            cache_capacity: nexus_core::cache::DEFAULT_CAPACITY,
        }
    }
}

impl ManagerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            run_timeout: config.agent.run_timeout(),
            cache_ttl: config.cache.ttl(),
            cache_capacity: config.cache.capacity,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    /// A run or lifecycle operation currently holds the session.
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManagerStatus {
    pub session: SessionState,
    pub tool_sessions: Vec<ToolSession>,
    pub cache_entries: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

pub struct AgentManager {
    factory: Arc<dyn AgentFactory>,
    settings: ManagerSettings,
    session: tokio::sync::Mutex<Option<AgentSession>>,
    cache: Mutex<ResponseCache>,
}

impl AgentManager {
    pub fn new(factory: Arc<dyn AgentFactory>, settings: ManagerSettings) -> Self {
        let cache = ResponseCache::new(settings.cache_ttl, settings.cache_capacity);
        Self {
            factory,
            settings,
            session: tokio::sync::Mutex::new(None),
            cache: Mutex::new(cache),
        }
    }

    pub async fn initialize(&self) -> Result<(), AgentError> {
        let mut slot = self.session.lock().await;
        self.ensure_session(&mut slot).await.map(|_| ())
    }

    /// Answers from the cache when possible, otherwise through the agent.
    /// Every failure is rendered as a user-facing apology.
    pub async fn process_query(&self, query: &str) -> String {
        let cached = self.cache().lookup(query);
        if let Some(cached) = cached {
            info!(event_name = "agent.cache.hit", "serving response from cache");
            return cached;
        }

        let mut slot = self.session.lock().await;

        // Another caller may have answered the same query while we waited.
        let cached = self.cache().lookup(query);
        if let Some(cached) = cached {
            info!(event_name = "agent.cache.hit", "serving response from cache after wait");
            return cached;
        }

        let session = match self.ensure_session(&mut slot).await {
            Ok(session) => session,
            Err(error) => return apology(&error),
        };

        debug!(event_name = "agent.query.start", "running agent for cache miss");
        let contextualized = contextualize(&self.settings.system_instruction, query);
        let outcome =
            tokio::time::timeout(self.settings.run_timeout, session.run(&contextualized))
                .await
                .unwrap_or(Err(AgentError::Timeout(self.settings.run_timeout)));

        match outcome {
            Ok(response) => {
                self.cache().store(query, response.clone());
                response
            }
            Err(error) => {
                warn!(
                    event_name = "agent.query.failed",
                    error = %error,
                    "agent run failed; returning apology"
                );
                apology(&error)
            }
        }
    }

    pub async fn clear_memory(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_mut() {
            session.agent.clear_history();
            info!(event_name = "agent.memory.cleared", "conversation memory cleared");
        }
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Releases the transport and resets to uninitialized. Safe to call
    /// repeatedly; the session is reset even when closing reports an error.
    pub async fn close(&self) -> Result<(), AgentError> {
        let mut slot = self.session.lock().await;
        let Some(mut session) = slot.take() else {
            return Ok(());
        };

        let result = if session.transport.sessions().is_empty() {
            Ok(())
        } else {
            session.transport.close_all_sessions().await
        };
        info!(event_name = "agent.session.closed", "agent session closed");
        result
    }

    pub async fn is_initialized(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn status(&self) -> ManagerStatus {
        let (session, tool_sessions) = match self.session.try_lock() {
            Ok(slot) => match slot.as_ref() {
                Some(session) => (SessionState::Ready, session.tool_sessions()),
                None => (SessionState::Uninitialized, Vec::new()),
            },
            Err(_) => (SessionState::Busy, Vec::new()),
        };
        let stats = self.cache_stats();

        ManagerStatus {
            session,
            tool_sessions,
            cache_entries: stats.entries,
            cache_capacity: stats.capacity,
            cache_ttl_secs: stats.ttl.as_secs(),
        }
    }

    async fn ensure_session<'a>(
        &self,
        slot: &'a mut Option<AgentSession>,
    ) -> Result<&'a mut AgentSession, AgentError> {
        if slot.is_none() {
            info!(event_name = "agent.session.initializing", "initializing agent session");
            let mut session = self.factory.connect().await.map_err(|error| {
                warn!(
                    event_name = "agent.session.initialize_failed",
                    error = %error,
                    "agent session initialization failed"
                );
                error
            })?;

            match session.agent.system_instruction_support() {
                SystemInstructionSupport::Supported => {
                    session.agent.install_system_instruction(&self.settings.system_instruction);
                }
                SystemInstructionSupport::Unsupported => {
                    debug!(
                        event_name = "agent.session.instruction_skipped",
                        "agent does not accept a system instruction"
                    );
                }
            }

            info!(
                event_name = "agent.session.ready",
                tool_sessions = session.tool_sessions().len(),
                "agent session initialized"
            );
            *slot = Some(session);
        }

        slot.as_mut().ok_or_else(|| AgentError::Run("agent session unavailable".to_string()))
    }

    fn cache(&self) -> MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apology(error: &AgentError) -> String {
    format!("I apologize, but I encountered an error while processing your query: {error}")
}

//! Agent runtime for the Nexus travel assistant.
//!
//! - `classifier` tags a message with structured intents via a small model.
//! - `tools` holds MCP client sessions to the configured tool servers; the
//!   agent offers their tools to the model on every run.
//! - `runtime` owns the lazily created agent session and the response cache.
//! - `router` combines both behind `Assistant::handle_message`.
//! - `blocking` wraps the assistant for synchronous callers such as the CLI.
//!
//! The model only answers questions. Routing decisions are made here from the
//! parsed intent list, never by the model.

pub mod blocking;
pub mod classifier;
pub mod conversation;
pub mod errors;
pub mod fixtures;
pub mod llm;
pub mod prompts;
pub mod router;
pub mod runtime;
pub mod tools;

pub use blocking::BlockingAssistant;
pub use errors::AgentError;
pub use router::{Assistant, AssistantReply, ReplyOutcome};
pub use runtime::{AgentFactory, AgentManager, AgentSession, ManagerSettings};

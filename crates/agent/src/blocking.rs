//! Synchronous facade for callers without an async runtime of their own.
//!
//! Owns a single multi-threaded runtime for the whole process; every call is
//! driven to completion on it, so the agent session and its tool sessions
//! always live on the same runtime.

use nexus_core::cache::CacheStats;
use nexus_core::config::AppConfig;
use nexus_core::domain::intent::DetectedIntent;
use nexus_core::errors::ApplicationError;
use tokio::runtime::{Builder, Runtime};

use crate::router::{Assistant, AssistantReply};

pub struct BlockingAssistant {
    runtime: Runtime,
    assistant: Assistant,
}

impl BlockingAssistant {
    pub fn new(assistant: Assistant) -> Result<Self, ApplicationError> {
        let runtime = Builder::new_multi_thread().enable_all().build().map_err(|error| {
            ApplicationError::Configuration(format!("failed to start async runtime: {error}"))
        })?;
        Ok(Self { runtime, assistant })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        Self::new(Assistant::from_config(config)?)
    }

    pub fn initialize(&self) -> Result<(), ApplicationError> {
        self.runtime
            .block_on(self.assistant.manager().initialize())
            .map_err(ApplicationError::from)
    }

    pub fn handle_message(&self, message: &str) -> Result<AssistantReply, ApplicationError> {
        self.runtime.block_on(self.assistant.handle_message(message))
    }

    pub fn ask(&self, query: &str) -> String {
        self.runtime.block_on(self.assistant.manager().process_query(query))
    }

    pub fn classify(&self, message: &str) -> Vec<DetectedIntent> {
        self.runtime.block_on(self.assistant.classify(message))
    }

    pub fn reset(&self) {
        self.runtime.block_on(self.assistant.reset());
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.assistant.manager().cache_stats()
    }

    pub fn close(&self) -> Result<(), ApplicationError> {
        self.runtime.block_on(self.assistant.shutdown())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::BlockingAssistant;
    use crate::classifier::IntentClassifier;
    use crate::fixtures::{ScriptedLlm, StubAgentFactory};
    use crate::router::{Assistant, ReplyOutcome};
    use crate::runtime::{AgentManager, ManagerSettings};

    fn blocking(factory: &StubAgentFactory) -> BlockingAssistant {
        let classifier = IntentClassifier::new(Arc::new(ScriptedLlm::replying("{}")), "classifier");
        let manager = AgentManager::new(Arc::new(factory.clone()), ManagerSettings::default());
        BlockingAssistant::new(Assistant::new(classifier, Arc::new(manager)))
            .expect("runtime should start")
    }

    #[test]
    fn sync_callers_share_one_session() {
        let factory = StubAgentFactory::answering("Gate B12");
        let assistant = blocking(&factory);

        assert_eq!(assistant.ask("where do I board AI101"), "Gate B12");
        let reply = assistant.handle_message("where do I board AI101").expect("reply");
        assert_eq!(reply.outcome, ReplyOutcome::Answer { text: "Gate B12".to_string() });

        assert_eq!(factory.connect_count(), 1);
        assert_eq!(factory.run_count(), 1);
        assert_eq!(assistant.cache_stats().entries, 1);
    }

    #[test]
    fn reset_then_close() {
        let factory = StubAgentFactory::answering("ok");
        let assistant = blocking(&factory);
        assistant.initialize().expect("initialize");
        assistant.ask("seat map");

        assistant.reset();
        assert_eq!(assistant.cache_stats().entries, 0);

        assistant.close().expect("close");
        assistant.close().expect("second close");
        assert_eq!(factory.close_count(), 1);
    }
}

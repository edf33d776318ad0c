//! Front door for a user message: classify it, then either hand off to the
//! cancellation flow or answer it through the agent.

use std::sync::Arc;

use nexus_core::config::AppConfig;
use nexus_core::domain::intent::{DetectedIntent, IntentCategory};
use nexus_core::errors::{ApplicationError, DomainError};
use serde::Serialize;
use tracing::info;

use crate::classifier::IntentClassifier;
use crate::llm::{ChatCompletionsClient, LlmClient};
use crate::runtime::{AgentManager, DefaultAgentFactory, ManagerSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Cancellation,
    PolicyLookup,
}

/// Routes on the first (primary) intent only. No intents means a policy
/// lookup.
pub fn route(intents: &[DetectedIntent]) -> Route {
    match intents.first().map(DetectedIntent::category) {
        Some(IntentCategory::CancelTrip) => Route::Cancellation,
        _ => Route::PolicyLookup,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The caller should start its scripted cancellation dialogue.
    CancellationRequested,
    Answer { text: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssistantReply {
    pub intents: Vec<DetectedIntent>,
    pub outcome: ReplyOutcome,
}

impl AssistantReply {
    pub fn primary_intent(&self) -> Option<&DetectedIntent> {
        self.intents.first()
    }
}

pub struct Assistant {
    classifier: IntentClassifier,
    manager: Arc<AgentManager>,
}

impl Assistant {
    pub fn new(classifier: IntentClassifier, manager: Arc<AgentManager>) -> Self {
        Self { classifier, manager }
    }

    /// Wires the classifier and the agent manager to one shared completion
    /// client built from `config.llm`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApplicationError> {
        let client = ChatCompletionsClient::from_config(&config.llm)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        let llm: Arc<dyn LlmClient> = Arc::new(client);

        let classifier = IntentClassifier::new(llm.clone(), config.llm.classifier_model.clone());
        let factory = DefaultAgentFactory::from_config(config, llm);
        let manager = AgentManager::new(Arc::new(factory), ManagerSettings::from_config(config));

        Ok(Self::new(classifier, Arc::new(manager)))
    }

    pub fn manager(&self) -> &Arc<AgentManager> {
        &self.manager
    }

    pub async fn classify(&self, message: &str) -> Vec<DetectedIntent> {
        self.classifier.classify(message).await
    }

    pub async fn handle_message(&self, message: &str) -> Result<AssistantReply, ApplicationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DomainError::EmptyQuery.into());
        }

        let intents = self.classifier.classify(message).await;
        let route = route(&intents);
        info!(
            event_name = "router.message.routed",
            intent_count = intents.len(),
            primary_intent = %intents.first().map_or_else(|| "none".to_string(), |i| i.type_label()),
            route = ?route,
            "message routed"
        );

        let outcome = match route {
            Route::Cancellation => ReplyOutcome::CancellationRequested,
            Route::PolicyLookup => {
                ReplyOutcome::Answer { text: self.manager.process_query(message).await }
            }
        };

        Ok(AssistantReply { intents, outcome })
    }

    /// Forgets both the conversation and every cached answer.
    pub async fn reset(&self) {
        self.manager.clear_memory().await;
        self.manager.clear_cache();
    }

    pub async fn shutdown(&self) -> Result<(), ApplicationError> {
        self.manager.close().await.map_err(ApplicationError::from)
    }
}

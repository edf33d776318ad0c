use std::sync::Arc;

use nexus_agent::Assistant;
use nexus_core::config::AppConfig;
use nexus_core::errors::ApplicationError;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub assistant: Arc<Assistant>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("assistant wiring failed: {0}")]
    Assistant(#[source] ApplicationError),
}

/// The agent session is not opened here; the first cache miss opens it.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let assistant = Assistant::from_config(&config).map_err(BootstrapError::Assistant)?;

    info!(
        event_name = "system.bootstrap.assistant_ready",
        correlation_id = "bootstrap",
        classifier_model = %config.llm.classifier_model,
        "assistant wired"
    );

    Ok(Application { config, assistant: Arc::new(assistant) })
}

use std::path::PathBuf;
use std::time::Duration;

use nexus_core::errors::ApplicationError;
use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("could not read tool server config `{path}`: {source}")]
    ToolConfigRead { path: PathBuf, source: std::io::Error },
    #[error("could not parse tool server config: {0}")]
    ToolConfigParse(#[from] serde_json::Error),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("agent run failed: {0}")]
    Run(String),
    #[error("agent run did not finish within {0:?}")]
    Timeout(Duration),
    #[error("agent stopped after {0} steps without a final answer")]
    StepLimit(usize),
}

impl From<AgentError> for ApplicationError {
    fn from(value: AgentError) -> Self {
        match value {
            AgentError::ToolConfigRead { .. } | AgentError::ToolConfigParse(_) => {
                Self::Configuration(value.to_string())
            }
            other => Self::Integration(other.to_string()),
        }
    }
}

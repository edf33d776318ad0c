use nexus_agent::BlockingAssistant;
use serde_json::json;

use super::{connect, CommandResult, EXIT_HANDLING_FAILED};

pub fn run(message: &str) -> CommandResult {
    match connect("classify") {
        Ok(assistant) => execute(&assistant, message),
        Err(failure) => failure,
    }
}

/// Classification never opens an agent session, so nothing needs closing.
pub fn execute(assistant: &BlockingAssistant, message: &str) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure(
            "classify",
            "message_rejected",
            "message text is empty",
            EXIT_HANDLING_FAILED,
        );
    }

    let intents = assistant.classify(message);
    let summary = if intents.is_empty() {
        "no intents detected".to_string()
    } else {
        intents.iter().map(|intent| intent.summary()).collect::<Vec<_>>().join("; ")
    };

    CommandResult::success_with_data("classify", summary, Some(json!({ "intents": intents })))
}

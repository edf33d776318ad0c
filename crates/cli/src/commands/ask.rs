use nexus_agent::{BlockingAssistant, ReplyOutcome};
use serde_json::json;

use super::{connect, CommandResult, EXIT_HANDLING_FAILED};

pub const CANCELLATION_NOTICE: &str =
    "This looks like a trip cancellation. Cancellations are handled by the cancellation flow.";

pub fn run(message: &str) -> CommandResult {
    let assistant = match connect("ask") {
        Ok(assistant) => assistant,
        Err(failure) => return failure,
    };

    let result = execute(&assistant, message);
    if let Err(error) = assistant.close() {
        tracing::warn!(event_name = "cli.ask.close_failed", error = %error, "session close failed");
    }
    result
}

pub fn execute(assistant: &BlockingAssistant, message: &str) -> CommandResult {
    match assistant.handle_message(message) {
        Ok(reply) => {
            let text = match &reply.outcome {
                ReplyOutcome::CancellationRequested => CANCELLATION_NOTICE.to_string(),
                ReplyOutcome::Answer { text } => text.clone(),
            };
            let data = json!({ "intents": reply.intents, "outcome": reply.outcome });
            CommandResult::success_with_data("ask", text, Some(data))
        }
        Err(error) => {
            let error = error.into_interface("cli");
            CommandResult::failure(
                "ask",
                "message_rejected",
                format!("{} ({error})", error.user_message()),
                EXIT_HANDLING_FAILED,
            )
        }
    }
}

use std::sync::Arc;

use nexus_core::domain::intent::DetectedIntent;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient};
use crate::prompts::intent_prompt;

/// Tags a free-text message with zero or more intents by asking a language
/// model to fill in a fixed JSON schema. Never fails: transport errors and
/// unparseable replies both yield an empty list.
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self { llm, model: model.into() }
    }

    pub async fn classify(&self, query: &str) -> Vec<DetectedIntent> {
        let request = CompletionRequest::single_turn(&self.model, intent_prompt(query));

        match self.llm.complete(&request).await {
            Ok(reply) => {
                let intents = parse_intents(&reply.content);
                debug!(
                    event_name = "classifier.intents_parsed",
                    intent_count = intents.len(),
                    "classifier reply parsed"
                );
                intents
            }
            Err(error) => {
                warn!(
                    event_name = "classifier.completion_failed",
                    error = %error,
                    "intent classification request failed; treating as no intents"
                );
                Vec::new()
            }
        }
    }
}

/// Extracts `detected_intents` from the outermost `{...}` span of a model
/// reply. Every array element is returned as-is, whatever its shape.
pub fn parse_intents(reply: &str) -> Vec<DetectedIntent> {
    let Some(span) = json_span(reply) else {
        warn!(event_name = "classifier.no_json", "no JSON object found in classifier reply");
        return Vec::new();
    };

    let document: Value = match serde_json::from_str(span) {
        Ok(document) => document,
        Err(error) => {
            warn!(
                event_name = "classifier.invalid_json",
                error = %error,
                "failed to parse classifier reply as JSON"
            );
            return Vec::new();
        }
    };

    let Some(items) = document.get("detected_intents").and_then(Value::as_array) else {
        return Vec::new();
    };

    items.iter().cloned().map(DetectedIntent::new).collect()
}

// Greedy: first `{` through the last `}`.
fn json_span(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nexus_core::domain::intent::{Confidence, IntentCategory};
    use serde_json::json;

    use super::{json_span, parse_intents, IntentClassifier};
    use crate::fixtures::ScriptedLlm;

    #[test]
    fn prose_wrapped_json_yields_single_intent() {
        let reply = r#"Sure! {"detected_intents": [{"type":"Flight Status","sub_intent":"Get flight status","confidence":0.8,"justification":"x"}]} Thanks."#;

        let intents = parse_intents(reply);

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].intent_type(), Some("Flight Status"));
        assert_eq!(intents[0].sub_intent(), Some("Get flight status"));
        assert_eq!(intents[0].confidence(), Confidence::Score(0.8));
        assert_eq!(intents[0].category(), IntentCategory::FlightStatus);
    }

    #[test]
    fn reply_without_braces_yields_nothing() {
        assert!(parse_intents("I could not classify that, sorry.").is_empty());
    }

    #[test]
    fn invalid_json_or_missing_key_yields_nothing() {
        assert!(parse_intents("{not json at all}").is_empty());
        assert!(parse_intents(r#"{"intents": []}"#).is_empty());
        assert!(parse_intents(r#"{"detected_intents": "Flight Status"}"#).is_empty());
        assert!(parse_intents("} backwards {").is_empty());
    }

    #[test]
    fn greedy_span_covers_nested_objects() {
        let reply = "prefix {\"a\": {\"b\": 1}} suffix";
        assert_eq!(json_span(reply), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn multiple_intents_keep_model_order() {
        let reply = r#"{"detected_intents": [
            {"type": "Cancel Trip", "sub_intent": "Cancel Flight", "confidence": 0.9, "justification": "wants to cancel"},
            {"type": "Cancellation Policy", "sub_intent": "Get cancellation policy details", "confidence": "medium", "justification": "asks about fees"}
        ]}"#;

        let intents = parse_intents(reply);

        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].category(), IntentCategory::CancelTrip);
        assert_eq!(intents[1].category(), IntentCategory::CancellationPolicy);
        assert_eq!(intents[1].confidence().score(), None);
    }

    #[test]
    fn entries_of_any_shape_are_passed_through() {
        let reply = r#"{"detected_intents": [
            {"type": 7, "sub_intent": "Get flight status", "confidence": 0.4},
            "Flight Status",
            {"note": "no type key"}
        ]}"#;

        let intents = parse_intents(reply);

        assert_eq!(intents.len(), 3);
        assert_eq!(
            intents[0].raw(),
            &json!({"type": 7, "sub_intent": "Get flight status", "confidence": 0.4})
        );
        assert_eq!(intents[0].category(), IntentCategory::Unknown);
        assert_eq!(intents[1].raw(), &json!("Flight Status"));
        assert_eq!(intents[2].summary(), "Unknown - Unknown (confidence: 0.00)");
    }

    #[tokio::test]
    async fn classify_sends_deterministic_single_turn_request() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{"detected_intents": [{"type": "Pet Travel", "sub_intent": "Get pet travel policy", "confidence": 0.95, "justification": "pets"}]}"#,
        ));
        let classifier = IntentClassifier::new(llm.clone(), "openai/gpt-oss-20b");

        let intents = classifier.classify("can my cat fly with me?").await;

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].category(), IntentCategory::PetTravel);

        let request = llm.last_request().expect("request should be recorded");
        assert_eq!(request.model, "openai/gpt-oss-20b");
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.messages.len(), 1);
        assert!(request.messages[0].content.contains("can my cat fly with me?"));
    }

    #[tokio::test]
    async fn classify_swallows_completion_errors() {
        let llm = Arc::new(ScriptedLlm::failing("connection reset"));
        let classifier = IntentClassifier::new(llm.clone(), "m");

        assert!(classifier.classify("status of AI101").await.is_empty());
        assert_eq!(llm.calls(), 1, "no retry should be attempted");
    }
}

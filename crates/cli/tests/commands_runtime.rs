use std::env;
use std::fs;
use std::io::Cursor;
use std::sync::{Arc, Mutex, OnceLock};

use nexus_agent::classifier::IntentClassifier;
use nexus_agent::fixtures::{ScriptedLlm, StubAgentFactory};
use nexus_agent::{AgentManager, Assistant, BlockingAssistant, ManagerSettings};
use nexus_cli::commands::{ask, chat, classify, config, doctor};
use serde_json::Value;
use tempfile::TempDir;

const PETS_QUERY: &str = "what is the baggage policy for pets";
const PETS_ANSWER: &str = "Pets up to 20kg allowed in cabin.";
const CANCEL_REPLY: &str = r#"{"detected_intents": [{"type": "Cancel Trip", "sub_intent": "Cancel Flight", "confidence": 0.9, "justification": "user wants to cancel"}]}"#;

#[test]
fn config_returns_failure_without_api_key() {
    with_env(&[("NEXUS_LLM_PROVIDER", "groq")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_sources_and_redacts_api_key() {
    with_env(
        &[("NEXUS_LLM_API_KEY", "gsk_supersecretvalue"), ("NEXUS_CACHE_TTL_SECS", "60")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = &result.output;
            assert!(output.contains("- llm.api_key = gsk_*** (source: env (NEXUS_LLM_API_KEY))"));
            assert!(!output.contains("supersecretvalue"), "secret leaked: {output}");
            assert!(output.contains("- cache.ttl_secs = 60 (source: env (NEXUS_CACHE_TTL_SECS))"));
            assert!(output.contains("- cache.capacity = 100 (source: default)"));
            assert!(output.contains("- agent.max_steps = 15 (source: default)"));
            assert!(output.contains("- llm.model = openai/gpt-oss-120b (source: default)"));
        },
    );
}

#[test]
fn config_reports_groq_key_fallback_source() {
    with_env(&[("GROQ_API_KEY", "gsk_fallback")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("- llm.api_key = gsk_*** (source: env (GROQ_API_KEY))"));
    });
}

#[test]
fn doctor_json_fails_and_skips_dependent_checks_when_config_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 5, "expected doctor failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_passes_for_local_provider_without_tools() {
    with_env(&[("NEXUS_LLM_PROVIDER", "ollama")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 0, "unexpected report: {}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] llm_credentials"));
        assert!(result.output.contains(
            "- [skip] tool_servers: agent.tool_config_path is not set; no tools will be offered"
        ));
    });
}

#[test]
fn doctor_flags_unresolvable_tool_server_command() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("tools.json");
    fs::write(
        &path,
        r#"{"mcpServers": {"ghost": {"command": "nexus-no-such-tool-server-binary"}}}"#,
    )
    .expect("write tool config");
    let path = path.display().to_string();

    with_env(
        &[("NEXUS_LLM_PROVIDER", "ollama"), ("NEXUS_AGENT_TOOL_CONFIG_PATH", path.as_str())],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 5);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["checks"][2]["name"], "tool_servers");
            assert_eq!(payload["checks"][2]["status"], "fail");
            let details = payload["checks"][2]["details"].as_str().unwrap_or_default();
            assert!(details.contains("ghost"));
        },
    );
}

#[test]
fn doctor_rejects_remote_tool_servers() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("tools.json");
    fs::write(&path, r#"{"mcpServers": {"search": {"url": "https://tools.example.com/mcp"}}}"#)
        .expect("write tool config");
    let path = path.display().to_string();

    with_env(
        &[("NEXUS_LLM_PROVIDER", "ollama"), ("NEXUS_AGENT_TOOL_CONFIG_PATH", path.as_str())],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 5);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["checks"][2]["status"], "fail");
            let details = payload["checks"][2]["details"].as_str().unwrap_or_default();
            assert!(details.contains("remote server"), "unexpected details: {details}");
        },
    );
}

#[test]
fn ask_answers_from_agent_then_cache() {
    let factory = StubAgentFactory::answering(PETS_ANSWER);
    let assistant = stub_assistant("{}", &factory);

    for _ in 0..2 {
        let result = ask::execute(&assistant, PETS_QUERY);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], PETS_ANSWER);
        assert_eq!(payload["data"]["outcome"]["kind"], "answer");
    }

    assert_eq!(factory.run_count(), 1, "second ask should be a cache hit");
}

#[test]
fn ask_rejects_blank_message() {
    let factory = StubAgentFactory::answering("unused");
    let assistant = stub_assistant("{}", &factory);

    let result = ask::execute(&assistant, "   ");

    assert_eq!(result.exit_code, 1);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "message_rejected");
}

#[test]
fn classify_lists_intents_without_running_agent() {
    let factory = StubAgentFactory::answering("unused");
    let assistant = stub_assistant(CANCEL_REPLY, &factory);

    let result = classify::execute(&assistant, "cancel my flight to Delhi");

    assert_eq!(result.exit_code, 0);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["message"], "Cancel Trip - Cancel Flight (confidence: 0.90)");
    assert_eq!(payload["data"]["intents"][0]["type"], "Cancel Trip");
    assert_eq!(factory.connect_count(), 0);
}

#[test]
fn chat_session_handles_commands_and_caches_answers() {
    let factory = StubAgentFactory::answering(PETS_ANSWER);
    let assistant = stub_assistant("{}", &factory);
    let input = format!("{PETS_QUERY}\n{PETS_QUERY}\ncache\nclear\ncache\n\nQUIT\nnever read\n");
    let mut output = Vec::new();

    let answered =
        chat::session(&assistant, Cursor::new(input), &mut output).expect("session should run");

    let transcript = String::from_utf8(output).expect("utf8 transcript");
    assert_eq!(answered, 2);
    assert_eq!(transcript.matches(&format!("Assistant: {PETS_ANSWER}")).count(), 2);
    assert!(transcript.contains("Cache stats: 1 of 100 entries (ttl 300s)"));
    assert!(transcript.contains("Memory cleared."));
    assert!(transcript.contains("Cache stats: 0 of 100 entries (ttl 300s)"));
    assert_eq!(factory.run_count(), 1);
    assert_eq!(factory.clear_count(), 1);
}

#[test]
fn chat_session_hands_cancellations_to_the_flow() {
    let factory = StubAgentFactory::answering("unused");
    let assistant = stub_assistant(CANCEL_REPLY, &factory);
    let mut output = Vec::new();

    let answered = chat::session(&assistant, Cursor::new("please cancel my trip\n"), &mut output)
        .expect("session should run");

    let transcript = String::from_utf8(output).expect("utf8 transcript");
    assert_eq!(answered, 1, "end of input should end the session");
    assert!(transcript.contains("Intent: Cancel Trip - Cancel Flight (confidence: 0.90)"));
    assert!(transcript.contains(&format!("Assistant: {}", ask::CANCELLATION_NOTICE)));
    assert_eq!(factory.run_count(), 0);
}

fn stub_assistant(classifier_reply: &str, factory: &StubAgentFactory) -> BlockingAssistant {
    let classifier =
        IntentClassifier::new(Arc::new(ScriptedLlm::replying(classifier_reply)), "classifier");
    let manager = AgentManager::new(Arc::new(factory.clone()), ManagerSettings::default());
    BlockingAssistant::new(Assistant::new(classifier, Arc::new(manager)))
        .expect("runtime should start")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GROQ_API_KEY",
        "NEXUS_LLM_PROVIDER",
        "NEXUS_LLM_API_KEY",
        "NEXUS_LLM_BASE_URL",
        "NEXUS_LLM_MODEL",
        "NEXUS_LLM_CLASSIFIER_MODEL",
        "NEXUS_LLM_TIMEOUT_SECS",
        "NEXUS_AGENT_TOOL_CONFIG_PATH",
        "NEXUS_AGENT_RUN_TIMEOUT_SECS",
        "NEXUS_AGENT_MEMORY_ENABLED",
        "NEXUS_AGENT_MAX_STEPS",
        "NEXUS_CACHE_TTL_SECS",
        "NEXUS_CACHE_CAPACITY",
        "NEXUS_SERVER_BIND_ADDRESS",
        "NEXUS_SERVER_PORT",
        "NEXUS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "NEXUS_LOGGING_LEVEL",
        "NEXUS_LOGGING_FORMAT",
        "NEXUS_LOG_LEVEL",
        "NEXUS_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}

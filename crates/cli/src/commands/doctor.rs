use nexus_agent::tools::{ToolServerSpec, ToolServers};
use nexus_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::{CommandResult, EXIT_DOCTOR_FAILED};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR_FAILED };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

/// Skipped checks do not fail the report; only explicit failures do.
pub fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_credentials(&config));
            checks.push(check_tool_servers(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            for name in ["llm_credentials", "tool_servers"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let has_key =
        config.llm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());
    let endpoint = config.llm.effective_base_url();

    if has_key || !config.llm.provider.requires_api_key() {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "{:?} at {endpoint} (agent `{}`, classifier `{}`)",
                config.llm.provider, config.llm.model, config.llm.classifier_model
            ),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: format!("{:?} requires an api key", config.llm.provider),
        }
    }
}

fn check_tool_servers(config: &AppConfig) -> DoctorCheck {
    let Some(path) = config.agent.tool_config_path.as_deref() else {
        return DoctorCheck {
            name: "tool_servers",
            status: CheckStatus::Skipped,
            details: "agent.tool_config_path is not set; no tools will be offered to the model"
                .to_string(),
        };
    };

    let servers = match ToolServers::load(path) {
        Ok(servers) => servers,
        Err(error) => {
            return DoctorCheck {
                name: "tool_servers",
                status: CheckStatus::Fail,
                details: error.to_string(),
            }
        }
    };

    let problems = servers
        .servers
        .iter()
        .filter_map(|(name, spec)| match spec {
            ToolServerSpec::Command { command, .. } => which::which(command)
                .err()
                .map(|_| format!("`{name}`: command `{command}` not found on PATH")),
            ToolServerSpec::Remote { url } => Some(format!(
                "`{name}`: remote server `{url}` is not supported; configure a `command`"
            )),
        })
        .collect::<Vec<_>>();

    if problems.is_empty() {
        DoctorCheck {
            name: "tool_servers",
            status: CheckStatus::Pass,
            details: format!(
                "{} tool server command(s) found for `{}`; tools are listed when a session opens",
                servers.len(),
                path.display()
            ),
        }
    } else {
        DoctorCheck { name: "tool_servers", status: CheckStatus::Fail, details: problems.join("; ") }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

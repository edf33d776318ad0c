//! Tool-server configuration and the MCP transport that holds one client
//! session per configured server for the lifetime of an agent session.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::AgentError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolServerSpec {
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Remote {
        url: String,
    },
}

/// Parsed form of a `{"mcpServers": {...}}` file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolServers {
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ToolServerSpec>,
}

impl ToolServers {
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| AgentError::ToolConfigRead { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AgentError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolSession {
    pub name: String,
    pub endpoint: String,
    pub tools: usize,
}

/// A tool listed by a connected server, in the shape the completion endpoint
/// expects for function calling.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub server: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Reads a listed tool from its wire form (`name`, `description`,
    /// `inputSchema`).
    pub fn from_listing(server: &str, listing: &Value) -> Option<Self> {
        let name = listing.get("name")?.as_str()?.to_string();
        let description = listing
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input_schema = listing
            .get("inputSchema")
            .filter(|schema| schema.is_object())
            .cloned()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

        Some(Self { server: server.to_string(), name, description, input_schema })
    }

    pub fn function_spec(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn open(&mut self, servers: &ToolServers) -> Result<(), AgentError>;
    fn sessions(&self) -> Vec<ToolSession>;
    fn tools(&self) -> Vec<ToolDescriptor>;
    /// Returns the tool's text output. A tool that reports an error still
    /// yields `Ok` with the error text so the model can react to it.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, AgentError>;
    async fn close_all_sessions(&mut self) -> Result<(), AgentError>;
}

/// MCP client sessions over stdio, one per command server. Tools from every
/// server share one namespace; on a name clash the first server wins.
#[derive(Default)]
pub struct McpToolTransport {
    sessions: Vec<OpenSession>,
}

struct OpenSession {
    info: ToolSession,
    tools: Vec<ToolDescriptor>,
    client: RunningService<RoleClient, ()>,
}

impl McpToolTransport {
    async fn connect(name: &str, spec: &ToolServerSpec) -> Result<OpenSession, AgentError> {
        let (command, args, env) = match spec {
            ToolServerSpec::Command { command, args, env } => (command, args, env),
            ToolServerSpec::Remote { url } => {
                return Err(AgentError::Transport(format!(
                    "tool server `{name}` at `{url}` is remote; only command servers are supported"
                )));
            }
        };

        let program = resolve_command(command).map_err(|error| {
            AgentError::Transport(format!(
                "tool server `{name}` command `{command}` is not runnable: {error}"
            ))
        })?;

        let mut process = Command::new(&program);
        process.args(args).envs(env).stderr(Stdio::null()).kill_on_drop(true);
        let child = TokioChildProcess::new(process).map_err(|error| {
            AgentError::Transport(format!("tool server `{name}` failed to start: {error}"))
        })?;

        let client = ().serve(child).await.map_err(|error| {
            AgentError::Transport(format!("tool server `{name}` failed the MCP handshake: {error}"))
        })?;

        let listed = match client.list_all_tools().await {
            Ok(listed) => listed,
            Err(error) => {
                let _ = client.cancel().await;
                return Err(AgentError::Transport(format!(
                    "tool server `{name}` did not list its tools: {error}"
                )));
            }
        };
        let tools = listed
            .iter()
            .filter_map(|tool| serde_json::to_value(tool).ok())
            .filter_map(|listing| ToolDescriptor::from_listing(name, &listing))
            .collect::<Vec<_>>();

        Ok(OpenSession {
            info: ToolSession {
                name: name.to_string(),
                endpoint: program.display().to_string(),
                tools: tools.len(),
            },
            tools,
            client,
        })
    }

    fn owner_of(&self, tool: &str) -> Option<&OpenSession> {
        self.sessions.iter().find(|session| session.tools.iter().any(|t| t.name == tool))
    }
}

#[async_trait]
impl ToolTransport for McpToolTransport {
    async fn open(&mut self, servers: &ToolServers) -> Result<(), AgentError> {
        for (name, spec) in &servers.servers {
            let session = match Self::connect(name, spec).await {
                Ok(session) => session,
                Err(error) => {
                    let _ = self.close_all_sessions().await;
                    return Err(error);
                }
            };
            info!(
                event_name = "tools.session.opened",
                server = %session.info.name,
                endpoint = %session.info.endpoint,
                tools = session.tools.len(),
                "tool server session opened"
            );
            self.sessions.push(session);
        }
        Ok(())
    }

    fn sessions(&self) -> Vec<ToolSession> {
        self.sessions.iter().map(|session| session.info.clone()).collect()
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        let mut seen = BTreeSet::new();
        self.sessions
            .iter()
            .flat_map(|session| session.tools.iter())
            .filter(|tool| seen.insert(tool.name.clone()))
            .cloned()
            .collect()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, AgentError> {
        let session = self
            .owner_of(name)
            .ok_or_else(|| AgentError::Transport(format!("no tool server offers `{name}`")))?;
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(AgentError::Transport(format!(
                    "arguments for `{name}` must be a JSON object, got {other}"
                )))
            }
        };

        debug!(
            event_name = "tools.call.start",
            server = %session.info.name,
            tool = name,
            "calling tool"
        );
        let result = session
            .client
            .call_tool(CallToolRequestParam { name: name.to_string().into(), arguments })
            .await
            .map_err(|error| {
                AgentError::Transport(format!(
                    "tool `{name}` on `{}` failed: {error}",
                    session.info.name
                ))
            })?;

        let result = serde_json::to_value(&result).map_err(|error| {
            AgentError::Transport(format!("tool `{name}` returned an unreadable result: {error}"))
        })?;
        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            warn!(
                event_name = "tools.call.reported_error",
                server = %session.info.name,
                tool = name,
                "tool reported an error"
            );
        }
        Ok(render_tool_output(&result))
    }

    async fn close_all_sessions(&mut self) -> Result<(), AgentError> {
        let mut failures = Vec::new();
        for session in self.sessions.drain(..) {
            if let Err(error) = session.client.cancel().await {
                warn!(
                    event_name = "tools.session.close_failed",
                    server = %session.info.name,
                    error = %error,
                    "tool server did not shut down cleanly"
                );
                failures.push(format!("{}: {error}", session.info.name));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Transport(format!(
                "failed to close tool sessions: {}",
                failures.join(", ")
            )))
        }
    }
}

/// Joins the text parts of a tool result; other content parts are kept as
/// their JSON form.
pub fn render_tool_output(result: &Value) -> String {
    let parts = result
        .get("content")
        .and_then(Value::as_array)
        .map(|content| {
            content
                .iter()
                .map(|part| match part.get("text").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => part.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        result.get("structuredContent").map(Value::to_string).unwrap_or_default()
    } else {
        parts.join("\n")
    }
}

fn resolve_command(command: &str) -> Result<PathBuf, which::Error> {
    which::which(command)
}

//! Wire format for the sandbox adapter protocol.
//!
//! Request/response envelopes with integer correlation ids, exchanged as
//! line-delimited JSON text frames over a persistent bidirectional
//! transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::Language;

/// Method names the external executor understands.
pub const METHOD_SESSION_CREATE: &str = "session.create";
pub const METHOD_SESSION_EXECUTE: &str = "session.execute";
pub const METHOD_SESSION_CLOSE: &str = "session.close";

/// Maximum allowed frame size (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("language not enabled: {0}")]
    Unsupported(Language),

    #[error("program execution failed: {0}")]
    Execution(String),

    #[error("output could not be parsed: {0}")]
    OutputParse(String),

    #[error("adapter request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("adapter connection closed")]
    Closed,
}

impl AdapterError {
    /// Whether the session this error surfaced on should be discarded.
    pub fn poisons_session(&self) -> bool {
        matches!(self, AdapterError::Transport(_) | AdapterError::Closed)
    }
}

/// One request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Error body carried in a response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

/// One response frame, routed back by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Parameters for `session.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionParams {
    pub language: Language,
    pub idle_ttl_secs: u64,
    pub max_lifetime_secs: u64,
    pub memory_mb: u64,
    pub cpu_shares: u32,
}

/// Parameters for `session.execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteParams {
    pub session_id: String,
    pub command: SandboxCommand,
}

/// Commands a session understands, tagged for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxCommand {
    WriteFile { path: String, content: String },
    ReadFile { path: String },
    ExecShell { command: String, args: Vec<String> },
}

/// Result of an `ExecShell` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Encode an outgoing frame as one JSON line.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<String, AdapterError> {
    let mut line =
        serde_json::to_string(message).map_err(|e| AdapterError::Protocol(e.to_string()))?;
    if line.len() > MAX_FRAME_SIZE {
        return Err(AdapterError::Protocol(format!(
            "frame too large: {} bytes (max {})",
            line.len(),
            MAX_FRAME_SIZE
        )));
    }
    line.push('\n');
    Ok(line)
}

/// Decode one received JSON line.
pub fn decode_frame<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, AdapterError> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(AdapterError::Protocol(format!(
            "frame too large: {} bytes (max {})",
            line.len(),
            MAX_FRAME_SIZE
        )));
    }
    serde_json::from_str(line.trim_end()).map_err(|e| AdapterError::Protocol(e.to_string()))
}

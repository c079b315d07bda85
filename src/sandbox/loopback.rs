// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loopback sandbox executor.
//!
//! Serves the adapter wire protocol over any transport with an in-process
//! program host instead of a real isolated runtime. Lets the whole engine
//! run self-contained in tests and local development: sessions are
//! workspace maps, shell runs delegate to a pluggable host function.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::Language;

use super::client::{AdapterClient, AdapterConfig};
use super::harness::{INPUT_PATH, OUTPUT_PATH};
use super::protocol::{
    decode_frame, encode_frame, CreateSessionParams, ExecuteParams, RequestEnvelope,
    ResponseEnvelope, SandboxCommand, ShellResult, METHOD_SESSION_CLOSE, METHOD_SESSION_CREATE,
    METHOD_SESSION_EXECUTE,
};

/// Executes a wrapped program against an input, standing in for the real
/// interpreter. Returns the output value or an error message (stderr).
pub type ProgramHost =
    Arc<dyn Fn(Language, &str, &Value) -> Result<Value, String> + Send + Sync>;

/// A host that echoes the input back as the output.
pub fn echo_host() -> ProgramHost {
    Arc::new(|_, _, input| Ok(input.clone()))
}

struct WorkspaceSession {
    language: Language,
    files: HashMap<String, String>,
}

/// In-process executor end of the adapter protocol.
pub struct LoopbackExecutor;

impl LoopbackExecutor {
    /// Wire a client to a freshly spawned loopback executor over an
    /// in-memory duplex transport.
    pub fn connect(host: ProgramHost, config: AdapterConfig) -> Arc<AdapterClient> {
        let (client_io, server_io) = tokio::io::duplex(4 * 1024 * 1024);
        spawn_loopback_executor(server_io, host);
        AdapterClient::connect(client_io, config)
    }
}

/// Serve the adapter protocol on a transport until it closes.
pub fn spawn_loopback_executor<S>(stream: S, host: ProgramHost) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut lines = BufReader::new(read_half).lines();
        let mut sessions: HashMap<String, WorkspaceSession> = HashMap::new();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            let request: RequestEnvelope = match decode_frame(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("loopback: undecodable request: {e}");
                    continue;
                }
            };

            let response = dispatch(&mut sessions, &host, &request);
            let frame = match encode_frame(&response) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("loopback: unencodable response: {e}");
                    continue;
                }
            };
            if write_half.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
        }
    })
}

fn dispatch(
    sessions: &mut HashMap<String, WorkspaceSession>,
    host: &ProgramHost,
    request: &RequestEnvelope,
) -> ResponseEnvelope {
    match request.method.as_str() {
        METHOD_SESSION_CREATE => match serde_json::from_value::<CreateSessionParams>(
            request.params.clone(),
        ) {
            Ok(params) => {
                let session_id = Uuid::new_v4().to_string();
                sessions.insert(
                    session_id.clone(),
                    WorkspaceSession {
                        language: params.language,
                        files: HashMap::new(),
                    },
                );
                ResponseEnvelope::success(request.id, json!({ "session_id": session_id }))
            }
            Err(e) => ResponseEnvelope::failure(request.id, 400, e.to_string()),
        },
        METHOD_SESSION_EXECUTE => {
            match serde_json::from_value::<ExecuteParams>(request.params.clone()) {
                Ok(params) => match sessions.get_mut(&params.session_id) {
                    Some(session) => {
                        let result = run_command(session, host, params.command);
                        ResponseEnvelope::success(request.id, result)
                    }
                    None => ResponseEnvelope::failure(request.id, 404, "unknown session"),
                },
                Err(e) => ResponseEnvelope::failure(request.id, 400, e.to_string()),
            }
        }
        METHOD_SESSION_CLOSE => {
            let session_id = request
                .params
                .get("session_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            sessions.remove(session_id);
            ResponseEnvelope::success(request.id, json!({ "ok": true }))
        }
        other => ResponseEnvelope::failure(request.id, 400, format!("unknown method: {other}")),
    }
}

fn run_command(
    session: &mut WorkspaceSession,
    host: &ProgramHost,
    command: SandboxCommand,
) -> Value {
    match command {
        SandboxCommand::WriteFile { path, content } => {
            session.files.insert(path, content);
            json!({ "ok": true })
        }
        SandboxCommand::ReadFile { path } => match session.files.get(&path) {
            Some(content) => json!({ "content": content }),
            None => json!({ "content": Value::Null }),
        },
        SandboxCommand::ExecShell { command, args } => {
            let started = Instant::now();
            let result = run_program(session, host, &command, &args);
            let duration_ms = started.elapsed().as_millis() as u64;
            let shell = match result {
                Ok(()) => ShellResult {
                    success: true,
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: 0,
                    duration_ms,
                },
                Err(stderr) => ShellResult {
                    success: false,
                    stdout: String::new(),
                    stderr,
                    exit_code: 1,
                    duration_ms,
                },
            };
            serde_json::to_value(shell).unwrap_or_else(|_| json!({ "success": false }))
        }
    }
}

fn run_program(
    session: &mut WorkspaceSession,
    host: &ProgramHost,
    _command: &str,
    args: &[String],
) -> Result<(), String> {
    let program_path = args.last().ok_or("missing program path")?;
    let code = session
        .files
        .get(program_path)
        .cloned()
        .ok_or_else(|| format!("no such file: {program_path}"))?;
    let input: Value = match session.files.get(INPUT_PATH) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("bad input.json: {e}"))?,
        None => Value::Null,
    };

    let output = host(session.language, &code, &input)?;
    let serialized = serde_json::to_string(&output).map_err(|e| e.to_string())?;
    session.files.insert(OUTPUT_PATH.to_string(), serialized);
    Ok(())
}

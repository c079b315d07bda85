// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter client: speaks the request/response protocol to the external
//! isolated executor over one persistent transport.
//!
//! Single writer, one reader task. Outstanding requests live in a
//! correlation map of oneshot completions; responses route by id. A
//! per-call timeout removes the map entry and surfaces `Timeout` without
//! tearing down the transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::domain::Language;

use super::protocol::{
    decode_frame, encode_frame, AdapterError, CreateSessionParams, ExecuteParams, RequestEnvelope,
    ResponseEnvelope, SandboxCommand, METHOD_SESSION_CLOSE, METHOD_SESSION_CREATE,
    METHOD_SESSION_EXECUTE,
};

/// Adapter client configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Resource envelope requested for new sessions.
    pub session_memory_mb: u64,
    pub session_cpu_shares: u32,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            session_memory_mb: 256,
            session_cpu_shares: 512,
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<ResponseEnvelope>>>>;

/// Client half of the adapter protocol.
pub struct AdapterClient {
    config: AdapterConfig,
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl AdapterClient {
    /// Take ownership of a connected transport and start the reader task.
    pub fn connect<S>(stream: S, config: AdapterConfig) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let client = Arc::new(Self {
            config,
            writer: tokio::sync::Mutex::new(Box::new(write_half)),
            pending: pending.clone(),
            next_id: AtomicU64::new(1),
            closed: closed.clone(),
            reader_task: Mutex::new(None),
        });

        let handle = tokio::spawn(read_loop(read_half, pending, closed));
        *client.reader_task.lock() = Some(handle);
        client
    }

    /// Whether the transport has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create a sandbox session, returning the executor-assigned id.
    pub async fn create_session(
        &self,
        language: Language,
        idle_ttl: Duration,
        max_lifetime: Duration,
    ) -> Result<String, AdapterError> {
        let params = CreateSessionParams {
            language,
            idle_ttl_secs: idle_ttl.as_secs(),
            max_lifetime_secs: max_lifetime.as_secs(),
            memory_mb: self.config.session_memory_mb,
            cpu_shares: self.config.session_cpu_shares,
        };
        let result = self
            .call(
                METHOD_SESSION_CREATE,
                serde_json::to_value(params).map_err(|e| AdapterError::Protocol(e.to_string()))?,
            )
            .await?;
        result
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AdapterError::Protocol("missing session_id in response".into()))
    }

    /// Run one command inside a session.
    pub async fn execute(
        &self,
        session_id: &str,
        command: SandboxCommand,
    ) -> Result<Value, AdapterError> {
        let params = ExecuteParams {
            session_id: session_id.to_owned(),
            command,
        };
        self.call(
            METHOD_SESSION_EXECUTE,
            serde_json::to_value(params).map_err(|e| AdapterError::Protocol(e.to_string()))?,
        )
        .await
    }

    /// Close a session. Best-effort on the executor side.
    pub async fn close_session(&self, session_id: &str) -> Result<(), AdapterError> {
        self.call(
            METHOD_SESSION_CLOSE,
            serde_json::json!({ "session_id": session_id }),
        )
        .await
        .map(|_| ())
    }

    /// Issue one correlated request and await its response.
    async fn call(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        if self.is_closed() {
            return Err(AdapterError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = RequestEnvelope {
            id,
            method: method.to_owned(),
            params,
        };
        let line = match encode_frame(&request) {
            Ok(line) => line,
            Err(e) => {
                self.pending.lock().remove(&id);
                return Err(e);
            }
        };

        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                self.pending.lock().remove(&id);
                return Err(AdapterError::Transport(e.to_string()));
            }
            if let Err(e) = writer.flush().await {
                self.pending.lock().remove(&id);
                return Err(AdapterError::Transport(e.to_string()));
            }
        }

        let response = match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(AdapterError::Closed),
            Err(_) => {
                // The in-flight command is abandoned; the transport stays up.
                self.pending.lock().remove(&id);
                return Err(AdapterError::Timeout);
            }
        };

        match (response.result, response.error) {
            (Some(result), None) => Ok(result),
            (_, Some(error)) => Err(AdapterError::Execution(error.message)),
            (None, None) => Err(AdapterError::Protocol("empty response envelope".into())),
        }
    }
}

impl Drop for AdapterClient {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
    }
}

/// Reader task: route response frames to pending callers by correlation id.
async fn read_loop<R>(read_half: R, pending: PendingMap, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Send + Unpin,
{
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode_frame::<ResponseEnvelope>(&line) {
                    Ok(response) => {
                        let sender = pending.lock().remove(&response.id);
                        match sender {
                            Some(tx) => {
                                let _ = tx.send(response);
                            }
                            None => {
                                // Timed out or never issued; drop silently.
                                tracing::debug!("adapter: orphan response id={}", response.id);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("adapter: undecodable frame: {e}");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("adapter: transport read failed: {e}");
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    // Every caller still waiting sees a closed connection.
    let mut map = pending.lock();
    map.clear();
    tracing::info!("adapter: connection closed");
}

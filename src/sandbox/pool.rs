//! Reusable sandbox-session pool.
//!
//! Maintains a bounded set of language-tagged sessions with explicit
//! acquire/release semantics and scheduled expiry. Capacity is a counting
//! semaphore; each live session holds one slot for its whole lifetime.
//! Callers hold a slot before touching a session, and release in reverse
//! order (the lease drop returns the session, closing returns the slot).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::Language;
use crate::telemetry;

use super::client::AdapterClient;
use super::protocol::{AdapterError, SandboxCommand};
use super::session::{PooledSession, SessionState};

/// Pool configuration. Durations are seconds for config-file friendliness.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum live sessions across all languages.
    pub max_sessions: usize,
    pub idle_ttl_secs: u64,
    pub max_lifetime_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: num_cpus::get().max(2),
            idle_ttl_secs: 300,
            max_lifetime_secs: 3_600,
            cleanup_interval_secs: 60,
        }
    }
}

impl PoolConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    /// The caller's cancellation tripped before a slot became available.
    #[error("session pool exhausted")]
    Exhausted,

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone)]
pub struct PoolStatistics {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub idle_sessions: usize,
    pub available_slots: usize,
    pub avg_execution_count: f64,
    pub oldest_age: Duration,
}

struct PoolShared {
    config: PoolConfig,
    adapter: Arc<AdapterClient>,
    sessions: RwLock<HashMap<String, PooledSession>>,
    slots: Arc<Semaphore>,
}

/// Exclusive handle to one acquired session.
///
/// Dropping the lease releases the session back to the pool on every exit
/// path of the caller.
pub struct SessionLease {
    shared: Arc<PoolShared>,
    session_id: String,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let mut sessions = self.shared.sessions.write();
        if let Some(session) = sessions.get_mut(&self.session_id) {
            if session.state == SessionState::Active {
                session.state = SessionState::Idle;
                session.last_activity = Instant::now();
            }
        }
    }
}

/// Bounded pool of reusable sandbox sessions keyed by language.
#[derive(Clone)]
pub struct SessionPool {
    shared: Arc<PoolShared>,
}

impl SessionPool {
    pub fn new(adapter: Arc<AdapterClient>, config: PoolConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            shared: Arc::new(PoolShared {
                config,
                adapter,
                sessions: RwLock::new(HashMap::new()),
                slots,
            }),
        }
    }

    /// Acquire a session for a language: reuse an idle one or create a new
    /// one once a capacity slot is free. Cancellation releases any
    /// partially acquired slot before returning.
    pub async fn acquire(
        &self,
        language: Language,
        cancel: &CancellationToken,
    ) -> Result<SessionLease, PoolError> {
        if let Some(session_id) = self.claim_idle(language) {
            return Ok(SessionLease {
                shared: self.shared.clone(),
                session_id,
            });
        }

        let permit = tokio::select! {
            () = cancel.cancelled() => return Err(PoolError::Exhausted),
            permit = self.shared.slots.clone().acquire_owned() => {
                permit.map_err(|_| PoolError::Exhausted)?
            }
        };

        let created = tokio::select! {
            () = cancel.cancelled() => {
                drop(permit);
                return Err(PoolError::Exhausted);
            }
            created = self.shared.adapter.create_session(
                language,
                self.shared.config.idle_ttl(),
                self.shared.config.max_lifetime(),
            ) => created,
        };

        let session_id = match created {
            Ok(id) => id,
            Err(e) => {
                // The slot must be free again before the error surfaces.
                drop(permit);
                return Err(PoolError::Adapter(e));
            }
        };

        self.shared
            .sessions
            .write()
            .insert(session_id.clone(), PooledSession::new(language, permit));
        telemetry::record_session_created(language);
        tracing::debug!("pool: created session {session_id} for {language}");

        Ok(SessionLease {
            shared: self.shared.clone(),
            session_id,
        })
    }

    /// Atomically claim an idle session of the right language.
    fn claim_idle(&self, language: Language) -> Option<String> {
        let mut sessions = self.shared.sessions.write();
        let session_id = sessions
            .iter()
            .find(|(_, s)| s.state == SessionState::Idle && s.language == language)
            .map(|(id, _)| id.clone())?;
        let session = sessions.get_mut(&session_id)?;
        session.state = SessionState::Active;
        Some(session_id)
    }

    /// Run one command on an acquired session.
    pub async fn execute(
        &self,
        lease: &SessionLease,
        command: SandboxCommand,
    ) -> Result<Value, AdapterError> {
        let result = self.shared.adapter.execute(lease.session_id(), command).await;

        match &result {
            Ok(_) => {
                let mut sessions = self.shared.sessions.write();
                if let Some(session) = sessions.get_mut(lease.session_id()) {
                    session.execution_count += 1;
                    session.last_activity = Instant::now();
                }
            }
            Err(e) if e.poisons_session() => {
                self.discard(lease.session_id()).await;
            }
            Err(_) => {
                // Timeouts and program failures leave the session usable.
                let mut sessions = self.shared.sessions.write();
                if let Some(session) = sessions.get_mut(lease.session_id()) {
                    session.last_activity = Instant::now();
                }
            }
        }

        result
    }

    /// Drop a session the adapter reported unhealthy.
    async fn discard(&self, session_id: &str) {
        let removed = self.shared.sessions.write().remove(session_id);
        if removed.is_some() {
            tracing::warn!("pool: discarding unhealthy session {session_id}");
            let _ = self.shared.adapter.close_session(session_id).await;
        }
    }

    /// Snapshot of pool occupancy.
    pub fn statistics(&self) -> PoolStatistics {
        let sessions = self.shared.sessions.read();
        let total = sessions.len();
        let active = sessions
            .values()
            .filter(|s| s.state == SessionState::Active)
            .count();
        let idle = sessions
            .values()
            .filter(|s| s.state == SessionState::Idle)
            .count();
        let executions: u64 = sessions.values().map(|s| s.execution_count).sum();
        let oldest_age = sessions
            .values()
            .map(|s| s.created_at.elapsed())
            .max()
            .unwrap_or(Duration::ZERO);

        PoolStatistics {
            total_sessions: total,
            active_sessions: active,
            idle_sessions: idle,
            available_slots: self.shared.slots.available_permits(),
            avg_execution_count: if total > 0 {
                executions as f64 / total as f64
            } else {
                0.0
            },
            oldest_age,
        }
    }

    /// Close and remove every expired idle session, freeing its slot.
    /// Close failures are logged and swallowed; the entry goes regardless.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let idle_ttl = self.shared.config.idle_ttl();
        let max_lifetime = self.shared.config.max_lifetime();

        let expired: Vec<String> = {
            let mut sessions = self.shared.sessions.write();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.is_expired(idle_ttl, max_lifetime, now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                if let Some(session) = sessions.get_mut(id) {
                    session.state = SessionState::Closing;
                }
            }
            ids
        };

        for session_id in &expired {
            if let Err(e) = self.shared.adapter.close_session(session_id).await {
                tracing::warn!("pool: close of expired session {session_id} failed: {e}");
            }
            self.shared.sessions.write().remove(session_id);
        }

        if !expired.is_empty() {
            tracing::info!("pool: reaped {} expired sessions", expired.len());
            telemetry::record_sessions_reaped(expired.len());
        }
        expired.len()
    }

    /// One long-running reaper task; cancellation stops it.
    pub fn spawn_cleanup(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let pool = self.clone();
        let interval = self.shared.config.cleanup_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::info!("pool: cleanup loop stopped");
                        break;
                    }
                    () = tokio::time::sleep(interval) => {
                        pool.cleanup_expired().await;
                    }
                }
            }
        })
    }

}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory session bookkeeping for the pool.

use std::time::{Duration, Instant};

use crate::domain::Language;

/// Lifecycle state of one pooled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Creating,
    Active,
    Idle,
    Closing,
    Closed,
}

/// One live sandbox session tracked by the pool.
#[derive(Debug)]
pub(crate) struct PooledSession {
    pub language: Language,
    pub state: SessionState,
    pub created_at: Instant,
    pub last_activity: Instant,
    pub execution_count: u64,
    /// Pool-capacity slot held for the session's whole lifetime.
    pub permit: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl PooledSession {
    pub fn new(language: Language, permit: tokio::sync::OwnedSemaphorePermit) -> Self {
        let now = Instant::now();
        Self {
            language,
            state: SessionState::Active,
            created_at: now,
            last_activity: now,
            execution_count: 0,
            permit: Some(permit),
        }
    }

    /// Expiry is only ever evaluated on idle sessions.
    pub fn is_expired(&self, idle_ttl: Duration, max_lifetime: Duration, now: Instant) -> bool {
        self.state == SessionState::Idle
            && (now.duration_since(self.last_activity) > idle_ttl
                || now.duration_since(self.created_at) > max_lifetime)
    }
}

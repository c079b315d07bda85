// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded per-task feedback rings for adaptive sampling.

use std::collections::{BTreeSet, VecDeque};

use dashmap::DashMap;

use crate::domain::{ExecutionId, TaskId};

/// One validation outcome fed back to the samplers.
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    pub execution_id: ExecutionId,
    pub was_failure: bool,
    pub failure_reason: Option<String>,
    /// Property set of the execution's input at feedback time.
    pub properties: BTreeSet<String>,
}

/// Per-task ring buffers of recent feedback. Best-effort in-memory state;
/// not expected to survive restart.
pub struct FeedbackStore {
    rings: DashMap<TaskId, VecDeque<FeedbackEntry>>,
    capacity: usize,
}

impl FeedbackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: DashMap::new(),
            capacity: capacity.max(50),
        }
    }

    pub fn push(&self, task_id: TaskId, entry: FeedbackEntry) {
        let mut ring = self.rings.entry(task_id).or_default();
        if ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(entry);
    }

    /// Property sets of the most recent `limit` failures, newest first.
    pub fn recent_failures(&self, task_id: TaskId, limit: usize) -> Vec<BTreeSet<String>> {
        self.rings
            .get(&task_id)
            .map(|ring| {
                ring.iter()
                    .rev()
                    .filter(|e| e.was_failure)
                    .take(limit)
                    .map(|e| e.properties.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, task_id: TaskId) -> usize {
        self.rings.get(&task_id).map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::new(64)
    }
}

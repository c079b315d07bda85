// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task entity: the typed contract a program artifact substitutes for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A known-good input/output pair used for synthesis and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExample {
    pub input: Value,
    pub output: Value,
}

/// A task: typed input/output schemas plus quality targets.
///
/// Immutable after creation except for `sampling_rate` and the targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub examples: Vec<TaskExample>,
    /// Required fraction of valid outputs, in [0, 1].
    pub accuracy_target: f64,
    /// Latency budget per execution, in milliseconds.
    pub latency_target_ms: u64,
    /// Base probability that an execution is shadow-validated, in [0, 1].
    pub sampling_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            examples: Vec::new(),
            accuracy_target: 0.9,
            latency_target_ms: 1_000,
            sampling_rate: 0.1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_examples(mut self, examples: Vec<TaskExample>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_defaults() {
        let task = Task::new("echo", "echoes input", json!({"type": "object"}), json!({"type": "object"}));
        assert_eq!(task.sampling_rate, 0.1);
        assert_eq!(task.latency_target_ms, 1_000);
        assert!(task.examples.is_empty());
    }

    #[test]
    fn task_id_display_roundtrip() {
        let id = TaskId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
    }
}

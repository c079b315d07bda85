// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution and validation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::artifact::ArtifactId;
use super::task::TaskId;

/// Unique execution identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal status of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

/// One program run against one input. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub program_id: ArtifactId,
    pub task_id: TaskId,
    pub input_data: Value,
    pub output_data: Option<Value>,
    pub status: ExecutionStatus,
    pub error_detail: Option<String>,
    pub latency_ms: u64,
    /// Whether the sampling decider selected this run for oracle validation.
    pub sampled_for_validation: bool,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// Unique validation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationId(pub Uuid);

impl ValidationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ValidationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// How a validation verdict was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    /// Output-schema evaluation only.
    Schema,
    /// Schema plus deep comparison against an expected output.
    SchemaComparison,
    /// Plugin-provided semantic checks.
    Semantic,
    /// Schema plus comparison against an oracle-produced output.
    Oracle,
}

/// A single structural discrepancy found during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub error_type: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl ValidationErrorDetail {
    pub fn new(
        error_type: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            path: path.into(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_values(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

/// Verdict of validating one execution. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: ValidationId,
    pub execution_id: ExecutionId,
    pub is_valid: bool,
    /// Quality score in [0, 1]; 1.0 is a clean pass.
    pub score: f64,
    pub errors: Vec<ValidationErrorDetail>,
    pub method: ValidationMethod,
    pub validated_at: DateTime<Utc>,
}

impl ValidationRecord {
    /// Score for a given error set: 1.0 on a clean pass, 0.0 on schema
    /// failure, otherwise degraded by 0.1 per error with a 0.1 floor.
    pub fn score_for(errors: &[ValidationErrorDetail], schema_failed: bool) -> f64 {
        if errors.is_empty() {
            1.0
        } else if schema_failed {
            0.0
        } else {
            (1.0 - 0.1 * errors.len() as f64).max(0.1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_clean_pass() {
        assert_eq!(ValidationRecord::score_for(&[], false), 1.0);
    }

    #[test]
    fn score_schema_failure_is_zero() {
        let errors = vec![ValidationErrorDetail::new("schema_violation", "/x", "bad")];
        assert_eq!(ValidationRecord::score_for(&errors, true), 0.0);
    }

    #[test]
    fn score_degrades_per_error_with_floor() {
        let errors: Vec<_> = (0..3)
            .map(|i| ValidationErrorDetail::new("value_mismatch", format!("/f{i}"), "diff"))
            .collect();
        let score = ValidationRecord::score_for(&errors, false);
        assert!((score - 0.7).abs() < 1e-9);

        let many: Vec<_> = (0..20)
            .map(|i| ValidationErrorDetail::new("value_mismatch", format!("/f{i}"), "diff"))
            .collect();
        assert_eq!(ValidationRecord::score_for(&many, false), 0.1);
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Oracle validator: turns one execution into one validation verdict.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    ExecutionId, ValidationErrorDetail, ValidationId, ValidationMethod, ValidationRecord,
};
use crate::plugins::PluginRegistry;
use crate::sampling::{SamplingCoordinator, SamplingFeedback};
use crate::store::{StoreError, Stores};
use crate::telemetry;

use super::compare::compare_values;
use super::schema::SchemaCache;

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates sampled executions against the task's output contract and,
/// when available, an expected or oracle-produced output.
pub struct OracleValidator {
    stores: Stores,
    plugins: Arc<PluginRegistry>,
    sampling: Arc<SamplingCoordinator>,
    schemas: SchemaCache,
}

impl OracleValidator {
    pub fn new(
        stores: Stores,
        plugins: Arc<PluginRegistry>,
        sampling: Arc<SamplingCoordinator>,
    ) -> Self {
        Self {
            stores,
            plugins,
            sampling,
            schemas: SchemaCache::new(),
        }
    }

    /// Validate one execution; `expected_output` enables deep comparison.
    pub async fn validate(
        &self,
        execution_id: ExecutionId,
        expected_output: Option<&Value>,
    ) -> Result<ValidationRecord, ValidateError> {
        self.validate_inner(execution_id, expected_output, false).await
    }

    /// Validate against an output the oracle produced for the same input.
    pub async fn validate_against_oracle(
        &self,
        execution_id: ExecutionId,
        oracle_output: &Value,
    ) -> Result<ValidationRecord, ValidateError> {
        self.validate_inner(execution_id, Some(oracle_output), true).await
    }

    async fn validate_inner(
        &self,
        execution_id: ExecutionId,
        expected_output: Option<&Value>,
        from_oracle: bool,
    ) -> Result<ValidationRecord, ValidateError> {
        let execution = self.stores.executions.get_by_id(execution_id).await?;

        // A failed execution cannot produce a valid output.
        if !execution.is_success() {
            let errors = vec![ValidationErrorDetail::new(
                "execution_failed",
                "",
                execution
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| format!("execution ended with {:?}", execution.status)),
            )];
            return self
                .finish(execution_id, false, 0.0, errors, ValidationMethod::Schema, &execution)
                .await;
        }

        let task = self.stores.tasks.get_by_id(execution.task_id).await?;
        let output = execution.output_data.clone().unwrap_or(Value::Null);

        let mut errors = self.schemas.evaluate(&task, &output);
        let schema_failed = !errors.is_empty();

        let mut compared = false;
        if let Some(expected) = expected_output {
            if !schema_failed {
                errors.extend(compare_values(expected, &output));
                compared = true;
            }
        }

        let mut plugin_findings = 0usize;
        for validator in self.plugins.validators() {
            let findings = validator.validate(&task, &output);
            plugin_findings += findings.len();
            errors.extend(findings);
        }

        let method = if compared && from_oracle {
            ValidationMethod::Oracle
        } else if compared {
            ValidationMethod::SchemaComparison
        } else if plugin_findings > 0 && !schema_failed {
            ValidationMethod::Semantic
        } else {
            ValidationMethod::Schema
        };

        let is_valid = errors.is_empty();
        let score = ValidationRecord::score_for(&errors, schema_failed);
        self.finish(execution_id, is_valid, score, errors, method, &execution)
            .await
    }

    async fn finish(
        &self,
        execution_id: ExecutionId,
        is_valid: bool,
        score: f64,
        errors: Vec<ValidationErrorDetail>,
        method: ValidationMethod,
        execution: &crate::domain::ExecutionRecord,
    ) -> Result<ValidationRecord, ValidateError> {
        // Forced validation of an unsampled execution raises its flag so
        // every validation references a sampled record.
        if !execution.sampled_for_validation {
            self.stores.executions.mark_sampled(execution_id).await?;
        }

        let record = self
            .stores
            .validations
            .create(ValidationRecord {
                id: ValidationId::generate(),
                execution_id,
                is_valid,
                score,
                errors,
                method,
                validated_at: Utc::now(),
            })
            .await?;

        telemetry::record_validation(execution.program_id, is_valid, score);
        if !is_valid {
            tracing::info!(
                "validator: execution {execution_id} invalid (score {score:.2}, {} errors)",
                record.errors.len()
            );
        }

        let failure_reason = record
            .errors
            .first()
            .map(|e| format!("{}: {}", e.error_type, e.message));
        if let Err(e) = self
            .sampling
            .record_feedback(SamplingFeedback {
                execution_id,
                was_failure: !is_valid,
                failure_reason,
            })
            .await
        {
            tracing::warn!("validator: feedback ingestion failed: {e}");
        }

        Ok(record)
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

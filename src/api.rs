// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Exported API verbs.
//!
//! Thin, validating facade over the engine components. Everything here
//! returns the boundary error taxonomy; module-level errors never leak.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::canary::CanaryEvaluation;
use crate::domain::{
    ArtifactId, CanaryDeployment, CanaryId, ExecutionId, ExecutionRecord, Language,
    ProgramArtifact, SynthesisStrategy, Task, TaskExample, TaskId, ValidationRecord,
};
use crate::error::CoreError;
use crate::exec::{BatchItem, BatchOptions, BatchResult};
use crate::health::HealthReport;
use crate::sampling::SamplingFeedback;
use crate::stats::{AbTestReport, CompareConfig};
use crate::Runtime;

/// Parameters for task creation.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub examples: Vec<TaskExample>,
    pub accuracy_target: Option<f64>,
    pub latency_target_ms: Option<u64>,
    pub sampling_rate: Option<f64>,
}

/// Parameters for registering a new artifact version.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub task_id: TaskId,
    pub code: String,
    pub language: Language,
    pub synthesis_strategy: SynthesisStrategy,
    pub confidence: Option<f64>,
}

fn unit_range(name: &str, value: f64) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::ValidationFailed(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn schema_document(name: &str, value: &Value) -> Result<(), CoreError> {
    if !value.is_object() {
        return Err(CoreError::ValidationFailed(format!(
            "{name} must be a JSON Schema object"
        )));
    }
    Ok(())
}

impl Runtime {
    pub async fn create_task(&self, new_task: NewTask) -> Result<Task, CoreError> {
        if new_task.name.trim().is_empty() {
            return Err(CoreError::ValidationFailed("task name is empty".into()));
        }
        schema_document("input_schema", &new_task.input_schema)?;
        schema_document("output_schema", &new_task.output_schema)?;

        let mut task = Task::new(
            new_task.name,
            new_task.description,
            new_task.input_schema,
            new_task.output_schema,
        )
        .with_examples(new_task.examples);

        if let Some(accuracy) = new_task.accuracy_target {
            unit_range("accuracy_target", accuracy)?;
            task.accuracy_target = accuracy;
        }
        if let Some(latency) = new_task.latency_target_ms {
            task.latency_target_ms = latency;
        }
        if let Some(rate) = new_task.sampling_rate {
            unit_range("sampling_rate", rate)?;
            task.sampling_rate = rate;
        }

        Ok(self.stores.tasks.create(task).await?)
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Task, CoreError> {
        Ok(self.stores.tasks.get_by_id(task_id).await?)
    }

    pub async fn get_task_by_name(&self, name: &str) -> Result<Task, CoreError> {
        Ok(self.stores.tasks.get_by_name(name).await?)
    }

    /// Register the next artifact version for a task (Draft, no traffic).
    pub async fn create_artifact(
        &self,
        new_artifact: NewArtifact,
    ) -> Result<ProgramArtifact, CoreError> {
        if new_artifact.code.trim().is_empty() {
            return Err(CoreError::ValidationFailed("artifact code is empty".into()));
        }
        // The task must exist before a version can attach to it.
        self.stores.tasks.get_by_id(new_artifact.task_id).await?;

        let version = self
            .stores
            .artifacts
            .get_latest_version(new_artifact.task_id)
            .await?
            .unwrap_or(0)
            + 1;

        let mut artifact = ProgramArtifact::new(
            new_artifact.task_id,
            version,
            new_artifact.code,
            new_artifact.language,
            new_artifact.synthesis_strategy,
        );
        if let Some(confidence) = new_artifact.confidence {
            unit_range("confidence", confidence)?;
            artifact.confidence = confidence;
        }

        Ok(self.stores.artifacts.create(artifact).await?)
    }

    /// Promote a task's very first artifact to active at full traffic.
    /// Later versions go through the canary pipeline instead.
    pub async fn activate_initial_artifact(
        &self,
        artifact_id: ArtifactId,
    ) -> Result<ProgramArtifact, CoreError> {
        let mut artifact = self.stores.artifacts.get_by_id(artifact_id).await?;
        if self
            .stores
            .artifacts
            .get_active_by_task(artifact.task_id)
            .await
            .is_ok()
        {
            return Err(CoreError::ValidationFailed(
                "task already has an active artifact; use a canary".into(),
            ));
        }
        artifact.status = crate::domain::ArtifactStatus::Active;
        artifact.deployment_percentage = 1.0;
        artifact.updated_at = chrono::Utc::now();
        Ok(self.stores.artifacts.update(artifact).await?)
    }

    pub async fn execute(
        &self,
        task_id: TaskId,
        input: Value,
        version: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionRecord, CoreError> {
        Ok(self.executor.execute(task_id, input, version, cancel).await?)
    }

    pub async fn execute_batch(
        &self,
        task_id: TaskId,
        items: Vec<BatchItem>,
        options: BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, CoreError> {
        Ok(self
            .batch
            .execute_batch(task_id, items, options, cancel)
            .await?)
    }

    pub async fn start_canary(
        &self,
        task_id: TaskId,
        new_program_id: ArtifactId,
    ) -> Result<CanaryDeployment, CoreError> {
        Ok(self.canary.start(task_id, new_program_id).await?)
    }

    pub async fn progress_canary(
        &self,
        canary_id: CanaryId,
    ) -> Result<CanaryDeployment, CoreError> {
        Ok(self.canary.progress(canary_id).await?)
    }

    pub async fn rollback_canary(
        &self,
        canary_id: CanaryId,
        reason: &str,
    ) -> Result<CanaryDeployment, CoreError> {
        Ok(self.canary.rollback(canary_id, reason).await?)
    }

    pub async fn evaluate_canary(
        &self,
        canary_id: CanaryId,
    ) -> Result<CanaryEvaluation, CoreError> {
        Ok(self.canary.evaluate(canary_id).await?)
    }

    pub async fn resume_canary(
        &self,
        canary_id: CanaryId,
    ) -> Result<CanaryDeployment, CoreError> {
        Ok(self.canary.resume(canary_id).await?)
    }

    pub async fn compare_versions(
        &self,
        control_id: ArtifactId,
        treatment_id: ArtifactId,
        config: Option<CompareConfig>,
    ) -> Result<AbTestReport, CoreError> {
        let config = config.unwrap_or_else(|| self.config.comparison.clone());
        Ok(self
            .comparator
            .compare(control_id, treatment_id, &config)
            .await?)
    }

    pub async fn validate_execution(
        &self,
        execution_id: ExecutionId,
        expected_output: Option<&Value>,
    ) -> Result<ValidationRecord, CoreError> {
        Ok(self.validator.validate(execution_id, expected_output).await?)
    }

    pub async fn record_sampling_feedback(
        &self,
        feedback: SamplingFeedback,
    ) -> Result<(), CoreError> {
        Ok(self.sampling.record_feedback(feedback).await?)
    }

    pub async fn get_health(&self) -> Result<HealthReport, CoreError> {
        let tasks = self.stores.tasks.list().await?;
        let pool = self.pool.statistics();
        crate::telemetry::record_pool_sessions(pool.total_sessions);
        Ok(HealthReport::assess(
            self.adapter.is_closed(),
            pool,
            tasks.len(),
            self.uptime_secs(),
        ))
    }
}

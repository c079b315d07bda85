// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canary deployment controller.
//!
//! Drives a new artifact version through 5%, 25%, 50%, and 100% of task
//! traffic, evaluating version health at each step and rolling back
//! automatically on degradation. Percentage updates always write the
//! artifact gaining traffic first, so a stale read can only over-route to
//! a version that is still serving.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::domain::{
    ArtifactId, ArtifactStatus, CanaryAction, CanaryDeployment, CanaryId, CanaryStatus,
    ProgramArtifact, RolloutStage, TaskId,
};
use crate::plugins::PluginRegistry;
use crate::stats::{AbTestReport, CompareConfig, VersionComparator};
use crate::store::{StoreError, Stores};
use crate::telemetry;

#[derive(Error, Debug)]
pub enum CanaryError {
    #[error("task has no active artifact")]
    NoActiveArtifact,

    #[error("a canary is already open for this task")]
    Conflicting,

    #[error("invalid canary state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one evaluation concluded.
#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Progress,
    Pause(String),
    Rollback(String),
}

/// Evaluation verdict plus the comparison it was based on (when one ran).
#[derive(Debug, Clone)]
pub struct CanaryEvaluation {
    pub outcome: EvaluationOutcome,
    pub report: Option<AbTestReport>,
}

/// Controls every canary deployment's lifecycle.
pub struct CanaryController {
    stores: Stores,
    comparator: Arc<VersionComparator>,
    plugins: Arc<PluginRegistry>,
    eval_config: CompareConfig,
}

impl CanaryController {
    pub fn new(
        stores: Stores,
        comparator: Arc<VersionComparator>,
        plugins: Arc<PluginRegistry>,
        eval_config: CompareConfig,
    ) -> Self {
        Self {
            stores,
            comparator,
            plugins,
            eval_config,
        }
    }

    /// Open a rollout of `new_program_id` against the task's active artifact.
    pub async fn start(
        &self,
        task_id: TaskId,
        new_program_id: ArtifactId,
    ) -> Result<CanaryDeployment, CanaryError> {
        let current = self
            .stores
            .artifacts
            .get_active_by_task(task_id)
            .await
            .map_err(|_| CanaryError::NoActiveArtifact)?;

        if self
            .stores
            .canaries
            .get_active_by_task(task_id)
            .await?
            .is_some()
        {
            return Err(CanaryError::Conflicting);
        }

        let new_artifact = self.stores.artifacts.get_by_id(new_program_id).await?;
        if new_artifact.task_id != task_id {
            return Err(CanaryError::InvalidState(
                "artifact belongs to a different task".into(),
            ));
        }
        if new_artifact.id == current.id {
            return Err(CanaryError::InvalidState(
                "cannot canary an artifact against itself".into(),
            ));
        }

        let stage = RolloutStage::Canary5;
        self.set_percentages(&new_artifact, &current, stage.percentage())
            .await?;

        let mut canary = CanaryDeployment::new(task_id, current.id, new_artifact.id);
        canary.stage = stage;
        canary.current_percentage = stage.percentage();
        canary.record(CanaryAction::Started, None);
        let canary = self.stores.canaries.create(canary).await?;

        tracing::info!(
            "canary: started {} for task {task_id} (v{} -> v{})",
            canary.id,
            current.version,
            new_artifact.version
        );
        telemetry::record_canary_transition("started");
        self.emit(&canary, "canary.started");
        Ok(canary)
    }

    /// Evaluate and act: advance one stage, pause, or roll back.
    pub async fn progress(&self, canary_id: CanaryId) -> Result<CanaryDeployment, CanaryError> {
        let canary = self.stores.canaries.get_by_id(canary_id).await?;
        if canary.status != CanaryStatus::InProgress {
            return Err(CanaryError::InvalidState(format!(
                "cannot progress canary in status {:?}",
                canary.status
            )));
        }

        let evaluation = self.evaluate_deployment(&canary).await;
        match evaluation.outcome {
            EvaluationOutcome::Rollback(reason) => self.rollback(canary_id, &reason).await,
            EvaluationOutcome::Pause(reason) => self.pause(canary, reason).await,
            EvaluationOutcome::Progress => self.advance(canary).await,
        }
    }

    async fn advance(&self, mut canary: CanaryDeployment) -> Result<CanaryDeployment, CanaryError> {
        let next = canary.stage.next().ok_or_else(|| {
            CanaryError::InvalidState("canary already at final stage".into())
        })?;

        let new_artifact = self.stores.artifacts.get_by_id(canary.new_program_id).await?;
        let current = self
            .stores
            .artifacts
            .get_by_id(canary.current_program_id)
            .await?;

        if next.is_terminal() {
            self.activate(&new_artifact, &current).await?;
            canary.status = CanaryStatus::Completed;
            canary.completed_at = Some(Utc::now());
        } else {
            self.set_percentages(&new_artifact, &current, next.percentage())
                .await?;
        }

        canary.stage = next;
        canary.current_percentage = next.percentage();
        canary.record(CanaryAction::Promoted, None);
        let canary = self.stores.canaries.update(canary).await?;

        tracing::info!(
            "canary: {} promoted to {:?} ({}%)",
            canary.id,
            canary.stage,
            canary.current_percentage * 100.0
        );
        telemetry::record_canary_transition("promoted");
        self.emit(
            &canary,
            if canary.status == CanaryStatus::Completed {
                "canary.completed"
            } else {
                "canary.promoted"
            },
        );
        Ok(canary)
    }

    async fn pause(
        &self,
        mut canary: CanaryDeployment,
        reason: String,
    ) -> Result<CanaryDeployment, CanaryError> {
        canary.status = CanaryStatus::Paused;
        canary.status_reason = Some(reason.clone());
        canary.record(CanaryAction::Paused, Some(reason.clone()));
        let canary = self.stores.canaries.update(canary).await?;

        tracing::info!("canary: {} paused: {reason}", canary.id);
        telemetry::record_canary_transition("paused");
        self.emit(&canary, "canary.paused");
        Ok(canary)
    }

    /// Restore the current artifact to full traffic. Terminal.
    pub async fn rollback(
        &self,
        canary_id: CanaryId,
        reason: &str,
    ) -> Result<CanaryDeployment, CanaryError> {
        let mut canary = self.stores.canaries.get_by_id(canary_id).await?;
        if canary.status.is_terminal() {
            return Err(CanaryError::InvalidState(format!(
                "cannot roll back canary in status {:?}",
                canary.status
            )));
        }

        let mut current = self
            .stores
            .artifacts
            .get_by_id(canary.current_program_id)
            .await?;
        let mut new_artifact = self.stores.artifacts.get_by_id(canary.new_program_id).await?;

        // Restore the survivor first.
        current.deployment_percentage = 1.0;
        current.updated_at = Utc::now();
        self.stores.artifacts.update(current).await?;

        new_artifact.deployment_percentage = 0.0;
        new_artifact.updated_at = Utc::now();
        self.stores.artifacts.update(new_artifact).await?;

        canary.status = CanaryStatus::RolledBack;
        canary.status_reason = Some(reason.to_string());
        canary.completed_at = Some(Utc::now());
        canary.record(CanaryAction::RolledBack, Some(reason.to_string()));
        let canary = self.stores.canaries.update(canary).await?;

        tracing::warn!("canary: {} rolled back: {reason}", canary.id);
        telemetry::record_canary_transition("rolled_back");
        self.emit(&canary, "canary.rolled_back");
        Ok(canary)
    }

    /// Re-enter the rollout after a pause; the next progress re-evaluates.
    pub async fn resume(&self, canary_id: CanaryId) -> Result<CanaryDeployment, CanaryError> {
        let mut canary = self.stores.canaries.get_by_id(canary_id).await?;
        if canary.status != CanaryStatus::Paused {
            return Err(CanaryError::InvalidState(format!(
                "cannot resume canary in status {:?}",
                canary.status
            )));
        }
        canary.status = CanaryStatus::InProgress;
        canary.status_reason = None;
        let canary = self.stores.canaries.update(canary).await?;
        tracing::info!("canary: {} resumed", canary.id);
        Ok(canary)
    }

    /// Evaluate the rollout's health. Never fails: a comparison problem is
    /// itself a pause decision.
    pub async fn evaluate(&self, canary_id: CanaryId) -> Result<CanaryEvaluation, CanaryError> {
        let canary = self.stores.canaries.get_by_id(canary_id).await?;
        Ok(self.evaluate_deployment(&canary).await)
    }

    async fn evaluate_deployment(&self, canary: &CanaryDeployment) -> CanaryEvaluation {
        let report = match self
            .comparator
            .compare(
                canary.current_program_id,
                canary.new_program_id,
                &self.eval_config,
            )
            .await
        {
            Ok(report) => report,
            Err(e) => {
                return CanaryEvaluation {
                    outcome: EvaluationOutcome::Pause(format!("comparison unavailable: {e}")),
                    report: None,
                };
            }
        };

        let outcome = if report.significant
            && report.performance_delta < -self.eval_config.max_degradation
        {
            EvaluationOutcome::Rollback(format!(
                "significant degradation: {:.3}",
                report.performance_delta
            ))
        } else if report.treatment.sample_size < self.eval_config.min_sample_size {
            EvaluationOutcome::Pause("insufficient samples".to_string())
        } else if report.treatment.failure_rate() > 1.5 * report.control.failure_rate() {
            EvaluationOutcome::Rollback("error rate elevated".to_string())
        } else {
            EvaluationOutcome::Progress
        };

        CanaryEvaluation {
            outcome,
            report: Some(report),
        }
    }

    /// Split traffic: the new artifact takes `fraction`, the current takes
    /// the remainder. The artifact gaining traffic is written first.
    async fn set_percentages(
        &self,
        new_artifact: &ProgramArtifact,
        current: &ProgramArtifact,
        fraction: f64,
    ) -> Result<(), CanaryError> {
        let mut new_artifact = new_artifact.clone();
        new_artifact.deployment_percentage = fraction;
        new_artifact.updated_at = Utc::now();
        self.stores.artifacts.update(new_artifact).await?;

        let mut current = current.clone();
        current.deployment_percentage = 1.0 - fraction;
        current.updated_at = Utc::now();
        self.stores.artifacts.update(current).await?;
        Ok(())
    }

    /// Full promotion: the new artifact becomes the task's active version.
    async fn activate(
        &self,
        new_artifact: &ProgramArtifact,
        current: &ProgramArtifact,
    ) -> Result<(), CanaryError> {
        let mut new_artifact = new_artifact.clone();
        new_artifact.status = ArtifactStatus::Active;
        new_artifact.deployment_percentage = 1.0;
        new_artifact.updated_at = Utc::now();
        self.stores.artifacts.update(new_artifact).await?;

        let mut current = current.clone();
        current.status = ArtifactStatus::Deprecated;
        current.deployment_percentage = 0.0;
        current.updated_at = Utc::now();
        self.stores.artifacts.update(current).await?;
        Ok(())
    }

    fn emit(&self, canary: &CanaryDeployment, event: &str) {
        self.plugins.emit_event(
            event,
            &json!({
                "canary_id": canary.id,
                "task_id": canary.task_id,
                "stage": canary.stage,
                "percentage": canary.current_percentage,
                "status": canary.status,
            }),
        );
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

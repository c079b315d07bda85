// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Improvement orchestrator.
//!
//! Watches per-artifact validation failures; when an artifact falls below
//! its quality bar, requests a regenerated program and seeds a canary for
//! it. Cooperative and idempotent: an open canary or a recent attempt
//! suppresses new improvement work for the task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::canary::{CanaryController, CanaryError};
use crate::domain::{
    ArtifactId, ArtifactStatus, CanaryDeployment, ComplexityMetrics, ProgramArtifact,
    SynthesisStrategy, TaskId,
};
use crate::store::{StoreError, Stores};
use crate::telemetry;

use super::generator::{GenerationRequest, ProgramGenerator};

#[derive(Error, Debug)]
pub enum ImproveError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Canary(#[from] CanaryError),
}

/// Improvement thresholds and pacing.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ImprovementConfig {
    /// Minimum failures in the window before regeneration is considered.
    pub failure_threshold: u64,
    /// Regenerate only while the validation rate sits below this.
    pub min_validation_rate: f64,
    /// Validation window, hours.
    pub window_hours: i64,
    /// Per-task cooldown between attempts, seconds.
    pub cooldown_secs: u64,
    /// How many recent failures to hand to the synthesizer.
    pub failure_sample: usize,
    /// Watcher scan interval, seconds.
    pub check_interval_secs: u64,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            min_validation_rate: 0.7,
            window_hours: 24,
            cooldown_secs: 3_600,
            failure_sample: 5,
            check_interval_secs: 300,
        }
    }
}

/// Watches validation quality and seeds canaries with regenerated programs.
pub struct ImprovementOrchestrator {
    stores: Stores,
    generator: Arc<dyn ProgramGenerator>,
    canary: Arc<CanaryController>,
    config: ImprovementConfig,
    last_attempt: DashMap<TaskId, Instant>,
}

impl ImprovementOrchestrator {
    pub fn new(
        stores: Stores,
        generator: Arc<dyn ProgramGenerator>,
        canary: Arc<CanaryController>,
        config: ImprovementConfig,
    ) -> Self {
        Self {
            stores,
            generator,
            canary,
            config,
            last_attempt: DashMap::new(),
        }
    }

    /// Check one artifact's failure signal; on trigger, regenerate and
    /// start a canary. Returns the started deployment, if any.
    pub async fn check_artifact(
        &self,
        program_id: ArtifactId,
    ) -> Result<Option<CanaryDeployment>, ImproveError> {
        let since = Utc::now() - ChronoDuration::hours(self.config.window_hours);
        let stats = self
            .stores
            .validations
            .get_statistics(program_id, Some(since))
            .await?;

        if stats.failed < self.config.failure_threshold
            || stats.validation_rate >= self.config.min_validation_rate
        {
            return Ok(None);
        }

        let artifact = self.stores.artifacts.get_by_id(program_id).await?;
        let task_id = artifact.task_id;

        // Idempotence: never stack improvement work on an open canary.
        if self.stores.canaries.get_active_by_task(task_id).await?.is_some() {
            tracing::debug!("improve: task {task_id} already has an open canary");
            return Ok(None);
        }
        if let Some(attempted) = self.last_attempt.get(&task_id) {
            if attempted.elapsed() < Duration::from_secs(self.config.cooldown_secs) {
                return Ok(None);
            }
        }

        tracing::info!(
            "improve: artifact {program_id} below quality bar \
             ({} failures, rate {:.2}); requesting regeneration",
            stats.failed,
            stats.validation_rate
        );
        self.last_attempt.insert(task_id, Instant::now());
        telemetry::record_improvement_attempt();

        let task = self.stores.tasks.get_by_id(task_id).await?;
        let failures = self
            .stores
            .validations
            .get_failed_by_program(program_id, self.config.failure_sample)
            .await?;
        let constraints = summarize_failures(&failures);

        let request = GenerationRequest {
            task_id,
            task_name: task.name.clone(),
            input_schema: task.input_schema.clone(),
            output_schema: task.output_schema.clone(),
            description: task.description.clone(),
            examples: task.examples.clone(),
            constraints,
            target_runtime: artifact.language,
        };

        let generated = match self.generator.generate(&request).await {
            Ok(generated) => generated,
            Err(e) => {
                // Recorded; the cooldown stops immediate re-attempts.
                tracing::warn!("improve: regeneration for task {task_id} failed: {e}");
                return Ok(None);
            }
        };

        let next_version = self
            .stores
            .artifacts
            .get_latest_version(task_id)
            .await?
            .unwrap_or(0)
            + 1;
        let mut replacement = ProgramArtifact::new(
            task_id,
            next_version,
            generated.code,
            generated.language,
            SynthesisStrategy::Ml,
        );
        replacement.status = ArtifactStatus::Draft;
        replacement.deployment_percentage = 0.0;
        replacement.complexity = ComplexityMetrics {
            lines_of_code: generated.complexity.lines_of_code,
            cyclomatic_complexity: generated.complexity.cyclomatic_complexity,
            estimated_latency_ms: 0,
        };
        let replacement = self.stores.artifacts.create(replacement).await?;

        let deployment = self.canary.start(task_id, replacement.id).await?;
        tracing::info!(
            "improve: canary {} seeded with regenerated v{next_version} for task {task_id}",
            deployment.id
        );
        Ok(Some(deployment))
    }

    /// Scan every task's serving artifact once.
    pub async fn check_all(&self) -> Result<usize, ImproveError> {
        let tasks = self.stores.tasks.list().await?;
        let mut started = 0;
        for task in tasks {
            let artifact = match self.stores.artifacts.get_active_by_task(task.id).await {
                Ok(artifact) => artifact,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if self.check_artifact(artifact.id).await?.is_some() {
                started += 1;
            }
        }
        Ok(started)
    }

    /// One long-running watcher; cancellation stops it.
    pub fn spawn_watcher(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let orchestrator = self.clone();
        let interval = Duration::from_secs(orchestrator.config.check_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::info!("improve: watcher stopped");
                        break;
                    }
                    () = tokio::time::sleep(interval) => {
                        if let Err(e) = orchestrator.check_all().await {
                            tracing::warn!("improve: scan failed: {e}");
                        }
                    }
                }
            }
        })
    }
}

fn summarize_failures(failures: &[crate::domain::ValidationRecord]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let lines: Vec<String> = failures
        .iter()
        .flat_map(|v| v.errors.iter().take(2))
        .map(|e| format!("- {} at '{}': {}", e.error_type, e.path, e.message))
        .collect();
    Some(format!(
        "Recent validation failures to fix:\n{}",
        lines.join("\n")
    ))
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

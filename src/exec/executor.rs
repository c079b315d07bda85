//! Single-request executor: resolve, acquire, run, sample, record.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ExecutionId, ExecutionRecord, ExecutionStatus, Language, ProgramArtifact, Task, TaskId,
};
use crate::sampling::SamplingCoordinator;
use crate::sandbox::harness::{wrap_source, LanguageProfile, INPUT_PATH, OUTPUT_PATH};
use crate::sandbox::pool::{PoolError, SessionLease, SessionPool};
use crate::sandbox::protocol::{AdapterError, SandboxCommand, ShellResult};
use crate::store::{StoreError, Stores};
use crate::telemetry;

use super::resolver::{ArtifactResolver, ResolveError};

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("task not found")]
    TaskNotFound,

    #[error("no artifact is serving this task")]
    NoActiveArtifact,

    #[error("artifact version not found")]
    VersionNotFound,

    #[error("session pool exhausted")]
    PoolExhausted,

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Executor tuning.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Languages the sandbox deployment actually provides interpreters for.
    pub enabled_languages: Vec<Language>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled_languages: vec![
                Language::Python,
                Language::Javascript,
                Language::Typescript,
                Language::Go,
                Language::Csharp,
            ],
        }
    }
}

/// Runs one input against the task's serving artifact.
pub struct Executor {
    stores: Stores,
    resolver: ArtifactResolver,
    pool: SessionPool,
    sampling: Arc<SamplingCoordinator>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        stores: Stores,
        pool: SessionPool,
        sampling: Arc<SamplingCoordinator>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            resolver: ArtifactResolver::new(stores.clone()),
            stores,
            pool,
            sampling,
            config,
        }
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    pub(crate) fn resolver(&self) -> &ArtifactResolver {
        &self.resolver
    }

    /// Execute one input. Sandbox failures come back as persisted records
    /// with an error status; only missing tasks/artifacts and pool
    /// exhaustion surface as call failures.
    pub async fn execute(
        &self,
        task_id: TaskId,
        input: Value,
        version: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionRecord, ExecError> {
        let task = self.stores.tasks.get_by_id(task_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => ExecError::TaskNotFound,
            other => ExecError::Store(other),
        })?;

        let artifact = self.resolver.resolve(task_id, version).await.map_err(|e| match e {
            ResolveError::NoActiveArtifact => ExecError::NoActiveArtifact,
            ResolveError::VersionNotFound => ExecError::VersionNotFound,
            ResolveError::Store(store) => ExecError::Store(store),
        })?;

        self.execute_with_artifact(&task, &artifact, input, cancel).await
    }

    /// Execute against an already-resolved artifact (batch path).
    pub(crate) async fn execute_with_artifact(
        &self,
        task: &Task,
        artifact: &ProgramArtifact,
        input: Value,
        cancel: &CancellationToken,
    ) -> Result<ExecutionRecord, ExecError> {
        let started = Instant::now();

        let outcome = if !self.config.enabled_languages.contains(&artifact.language) {
            Err(AdapterError::Unsupported(artifact.language))
        } else {
            match self.pool.acquire(artifact.language, cancel).await {
                Ok(lease) => self.run_program(&lease, artifact, &input).await,
                Err(PoolError::Exhausted) => return Err(ExecError::PoolExhausted),
                Err(PoolError::Adapter(e)) => Err(e),
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let (status, output_data, error_detail) = match outcome {
            Ok(output) => (ExecutionStatus::Success, Some(output), None),
            Err(AdapterError::Timeout) => (
                ExecutionStatus::Timeout,
                None,
                Some(AdapterError::Timeout.to_string()),
            ),
            Err(e) => (ExecutionStatus::Error, None, Some(e.to_string())),
        };

        let decision = self.sampling.decide(task, &input);

        let record = self
            .stores
            .executions
            .create(ExecutionRecord {
                id: ExecutionId::generate(),
                program_id: artifact.id,
                task_id: task.id,
                input_data: input,
                output_data,
                status,
                error_detail,
                latency_ms,
                sampled_for_validation: decision.should_sample,
                executed_at: Utc::now(),
            })
            .await?;

        telemetry::record_execution(artifact.id, status, latency_ms, decision.should_sample);
        if status != ExecutionStatus::Success {
            tracing::info!(
                "executor: task {} v{} ended {:?}: {}",
                task.id,
                artifact.version,
                status,
                record.error_detail.as_deref().unwrap_or("-")
            );
        }

        Ok(record)
    }

    /// Drive the per-language harness inside one session.
    async fn run_program(
        &self,
        lease: &SessionLease,
        artifact: &ProgramArtifact,
        input: &Value,
    ) -> Result<Value, AdapterError> {
        let input_json =
            serde_json::to_string(input).map_err(|e| AdapterError::Protocol(e.to_string()))?;
        self.pool
            .execute(
                lease,
                SandboxCommand::WriteFile {
                    path: INPUT_PATH.to_string(),
                    content: input_json,
                },
            )
            .await?;

        let profile = LanguageProfile::for_language(artifact.language);
        self.pool
            .execute(
                lease,
                SandboxCommand::WriteFile {
                    path: profile.program_path(),
                    content: wrap_source(artifact.language, &artifact.code),
                },
            )
            .await?;

        let shell_value = self
            .pool
            .execute(
                lease,
                SandboxCommand::ExecShell {
                    command: profile.command.to_string(),
                    args: profile.shell_args(),
                },
            )
            .await?;
        let shell: ShellResult = serde_json::from_value(shell_value)
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        if !shell.success {
            return Err(AdapterError::Execution(shell.stderr));
        }

        let read_value = self
            .pool
            .execute(
                lease,
                SandboxCommand::ReadFile {
                    path: OUTPUT_PATH.to_string(),
                },
            )
            .await?;
        let content = read_value
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::OutputParse("output.json is absent".into()))?;
        serde_json::from_str(content)
            .map_err(|e| AdapterError::OutputParse(format!("output.json is not JSON: {e}")))
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
pub(crate) mod tests;

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch execution with bounded concurrency.
//!
//! The serving artifact is resolved once per batch, dispatch is capped by
//! a counting semaphore, and `stop_on_first_error` drains the batch after
//! the first failure: in-flight items finish, the rest never start. The
//! result list is sorted by client id for determinism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domain::{ExecutionId, ExecutionStatus, TaskId};
use crate::sandbox::pool::PoolStatistics;
use crate::store::{StoreError, Stores};

use super::executor::{ExecError, Executor};
use super::resolver::ResolveError;

/// Concurrency bounds accepted for one batch.
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 100;

/// One batch input with its caller-chosen id.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub client_id: String,
    pub input: Value,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_concurrency: usize,
    pub stop_on_first_error: bool,
    /// Per-item wall-clock cap.
    pub timeout_ms: Option<u64>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            stop_on_first_error: false,
            timeout_ms: None,
        }
    }
}

/// Outcome of one item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub client_id: String,
    pub success: bool,
    /// False when draining skipped the item entirely.
    pub executed: bool,
    pub execution_id: Option<ExecutionId>,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// Whole-batch outcome and aggregates.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_executed: usize,
    pub total_duration_ms: u64,
    /// Mean latency over executed items, failures included.
    pub avg_latency_ms: f64,
    /// Latencies of executed items, in result order.
    pub item_latencies: Vec<u64>,
    /// Sorted by `client_id`.
    pub results: Vec<BatchItemResult>,
    pub pool: PoolStatistics,
}

/// Fans a list of inputs across the executor under a concurrency bound.
pub struct BatchExecutor {
    stores: Stores,
    executor: Arc<Executor>,
}

impl BatchExecutor {
    pub fn new(stores: Stores, executor: Arc<Executor>) -> Self {
        Self { stores, executor }
    }

    pub async fn execute_batch(
        &self,
        task_id: TaskId,
        items: Vec<BatchItem>,
        options: BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, ExecError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.max_concurrency) {
            return Err(ExecError::Invalid(format!(
                "max_concurrency must be in [{MIN_CONCURRENCY}, {MAX_CONCURRENCY}], got {}",
                options.max_concurrency
            )));
        }

        let task = Arc::new(self.stores.tasks.get_by_id(task_id).await.map_err(
            |e| match e {
                StoreError::NotFound(_) => ExecError::TaskNotFound,
                other => ExecError::Store(other),
            },
        )?);

        // One resolution for the whole batch: every item runs against the
        // same artifact even if a canary advances mid-flight.
        let artifact = Arc::new(self.executor.resolver().resolve(task_id, None).await.map_err(
            |e| match e {
                ResolveError::NoActiveArtifact => ExecError::NoActiveArtifact,
                ResolveError::VersionNotFound => ExecError::VersionNotFound,
                ResolveError::Store(store) => ExecError::Store(store),
            },
        )?);

        let batch_started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
        let draining = Arc::new(AtomicBool::new(false));
        let mut join_set: JoinSet<BatchItemResult> = JoinSet::new();
        let mut results: Vec<BatchItemResult> = Vec::with_capacity(items.len());

        for item in items {
            if draining.load(Ordering::Acquire) {
                results.push(not_executed(item.client_id));
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            // A failure may have landed while this dispatch waited.
            if draining.load(Ordering::Acquire) {
                drop(permit);
                results.push(not_executed(item.client_id));
                continue;
            }

            let executor = self.executor.clone();
            let task = task.clone();
            let artifact = artifact.clone();
            let draining = draining.clone();
            let cancel = cancel.clone();
            let stop_on_first_error = options.stop_on_first_error;
            let timeout_ms = options.timeout_ms;

            join_set.spawn(async move {
                let _permit = permit;
                let item_started = Instant::now();
                let execution = run_item(
                    &executor, &task, &artifact, item.input, timeout_ms, &cancel,
                )
                .await;

                let result = match execution {
                    ItemOutcome::Record(record) => BatchItemResult {
                        client_id: item.client_id,
                        success: record.status == ExecutionStatus::Success,
                        executed: true,
                        execution_id: Some(record.id),
                        output: record.output_data,
                        error: record.error_detail,
                        latency_ms: record.latency_ms,
                    },
                    ItemOutcome::Failed(message) => BatchItemResult {
                        client_id: item.client_id,
                        success: false,
                        executed: true,
                        execution_id: None,
                        output: None,
                        error: Some(message),
                        latency_ms: item_started.elapsed().as_millis() as u64,
                    },
                };

                if !result.success && stop_on_first_error {
                    draining.store(true, Ordering::Release);
                }
                result
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!("batch: item task failed to join: {e}");
                }
            }
        }

        results.sort_by(|a, b| a.client_id.cmp(&b.client_id));

        let executed: Vec<&BatchItemResult> = results.iter().filter(|r| r.executed).collect();
        let succeeded = executed.iter().filter(|r| r.success).count();
        let failed = executed.len() - succeeded;
        let not_executed_count = results.len() - executed.len();
        let item_latencies: Vec<u64> = executed.iter().map(|r| r.latency_ms).collect();
        let avg_latency_ms = if item_latencies.is_empty() {
            0.0
        } else {
            item_latencies.iter().sum::<u64>() as f64 / item_latencies.len() as f64
        };

        Ok(BatchResult {
            total: results.len(),
            succeeded,
            failed,
            not_executed: not_executed_count,
            total_duration_ms: batch_started.elapsed().as_millis() as u64,
            avg_latency_ms,
            item_latencies,
            results,
            pool: self.executor.pool().statistics(),
        })
    }
}

enum ItemOutcome {
    Record(crate::domain::ExecutionRecord),
    Failed(String),
}

async fn run_item(
    executor: &Executor,
    task: &crate::domain::Task,
    artifact: &crate::domain::ProgramArtifact,
    input: Value,
    timeout_ms: Option<u64>,
    cancel: &CancellationToken,
) -> ItemOutcome {
    let run = executor.execute_with_artifact(task, artifact, input, cancel);
    let outcome = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), run).await {
            Ok(outcome) => outcome,
            Err(_) => return ItemOutcome::Failed("batch item timeout exceeded".to_string()),
        },
        None => run.await,
    };

    match outcome {
        Ok(record) => ItemOutcome::Record(record),
        Err(e) => ItemOutcome::Failed(e.to_string()),
    }
}

fn not_executed(client_id: String) -> BatchItemResult {
    BatchItemResult {
        client_id,
        success: false,
        executed: false,
        execution_id: None,
        output: None,
        error: Some("not executed: batch draining after earlier failure".to_string()),
        latency_ms: 0,
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Repository contracts for persisted entities.
//!
//! The engine talks to storage exclusively through these traits; the
//! persistence technology is the embedder's choice. An in-memory
//! implementation ships for tests and database-free embedding.

mod memory;

pub use memory::InMemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    ArtifactId, CanaryDeployment, CanaryId, ExecutionId, ExecutionRecord, ProgramArtifact, Task,
    TaskId, ValidationRecord,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Internal(String),
}

/// Aggregate validation statistics for one artifact over a window.
#[derive(Debug, Clone, Default)]
pub struct ValidationStatistics {
    pub total: u64,
    pub valid: u64,
    pub failed: u64,
    /// valid / total; 0.0 when no validations exist.
    pub validation_rate: f64,
    pub avg_score: f64,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: Task) -> Result<Task, StoreError>;
    async fn get_by_id(&self, id: TaskId) -> Result<Task, StoreError>;
    async fn get_by_name(&self, name: &str) -> Result<Task, StoreError>;
    async fn update(&self, task: Task) -> Result<Task, StoreError>;
    async fn delete(&self, id: TaskId) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<Task>, StoreError>;
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn create(&self, artifact: ProgramArtifact) -> Result<ProgramArtifact, StoreError>;
    async fn update(&self, artifact: ProgramArtifact) -> Result<ProgramArtifact, StoreError>;
    async fn get_by_id(&self, id: ArtifactId) -> Result<ProgramArtifact, StoreError>;
    async fn get_active_by_task(&self, task_id: TaskId) -> Result<ProgramArtifact, StoreError>;
    async fn get_by_task_and_version(
        &self,
        task_id: TaskId,
        version: u32,
    ) -> Result<ProgramArtifact, StoreError>;
    async fn get_latest_version(&self, task_id: TaskId) -> Result<Option<u32>, StoreError>;
    async fn list_by_task(&self, task_id: TaskId) -> Result<Vec<ProgramArtifact>, StoreError>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, StoreError>;
    async fn get_by_id(&self, id: ExecutionId) -> Result<ExecutionRecord, StoreError>;
    async fn get_by_task(
        &self,
        task_id: TaskId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;
    async fn get_by_program(
        &self,
        program_id: ArtifactId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;
    /// Raise `sampled_for_validation` on an existing record. Used by forced
    /// validation so every validation references a sampled execution.
    async fn mark_sampled(&self, id: ExecutionId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ValidationStore: Send + Sync {
    async fn create(&self, record: ValidationRecord) -> Result<ValidationRecord, StoreError>;
    async fn get_failed_by_program(
        &self,
        program_id: ArtifactId,
        limit: usize,
    ) -> Result<Vec<ValidationRecord>, StoreError>;
    async fn get_statistics(
        &self,
        program_id: ArtifactId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ValidationStatistics, StoreError>;
}

#[async_trait]
pub trait CanaryStore: Send + Sync {
    async fn create(&self, canary: CanaryDeployment) -> Result<CanaryDeployment, StoreError>;
    async fn update(&self, canary: CanaryDeployment) -> Result<CanaryDeployment, StoreError>;
    async fn get_by_id(&self, id: CanaryId) -> Result<CanaryDeployment, StoreError>;
    /// The deployment currently open (InProgress or Paused) for a task, if any.
    async fn get_active_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<CanaryDeployment>, StoreError>;
}

/// The bundle of repositories the engine is wired with.
#[derive(Clone)]
pub struct Stores {
    pub tasks: Arc<dyn TaskStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub validations: Arc<dyn ValidationStore>,
    pub canaries: Arc<dyn CanaryStore>,
}

impl Stores {
    /// Wire every repository to a single shared in-memory store.
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            tasks: store.clone(),
            artifacts: store.clone(),
            executions: store.clone(),
            validations: store.clone(),
            canaries: store,
        }
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory repository implementation.
//!
//! Backs tests and database-free embedding. Each entity map sits behind its
//! own lock; lookups clone records out so no lock outlives a call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    ArtifactId, ArtifactStatus, CanaryDeployment, CanaryId, ExecutionId, ExecutionRecord,
    ProgramArtifact, Task, TaskId, ValidationRecord,
};

use super::{
    ArtifactStore, CanaryStore, ExecutionStore, StoreError, TaskStore, ValidationStatistics,
    ValidationStore,
};

/// All entity maps in one allocation-friendly struct.
#[derive(Default)]
pub struct InMemoryStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
    task_names: RwLock<HashMap<String, TaskId>>,
    artifacts: RwLock<HashMap<ArtifactId, ProgramArtifact>>,
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    /// Insertion order per entity, newest last; recency queries walk backwards.
    execution_order: RwLock<Vec<ExecutionId>>,
    validations: RwLock<HashMap<ExecutionId, Vec<ValidationRecord>>>,
    canaries: RwLock<HashMap<CanaryId, CanaryDeployment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create(&self, task: Task) -> Result<Task, StoreError> {
        let mut names = self.task_names.write();
        if names.contains_key(&task.name) {
            return Err(StoreError::Conflict(format!(
                "task name already exists: {}",
                task.name
            )));
        }
        names.insert(task.name.clone(), task.id);
        self.tasks.write().insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Task, StoreError> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("task"))
    }

    async fn get_by_name(&self, name: &str) -> Result<Task, StoreError> {
        let id = *self
            .task_names
            .read()
            .get(name)
            .ok_or(StoreError::NotFound("task"))?;
        TaskStore::get_by_id(self, id).await
    }

    async fn update(&self, task: Task) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write();
        if !tasks.contains_key(&task.id) {
            return Err(StoreError::NotFound("task"));
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        let task = self
            .tasks
            .write()
            .remove(&id)
            .ok_or(StoreError::NotFound("task"))?;
        self.task_names.write().remove(&task.name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.tasks.read().values().cloned().collect())
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn create(&self, artifact: ProgramArtifact) -> Result<ProgramArtifact, StoreError> {
        let mut artifacts = self.artifacts.write();
        let duplicate = artifacts
            .values()
            .any(|a| a.task_id == artifact.task_id && a.version == artifact.version);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "version {} already exists for task {}",
                artifact.version, artifact.task_id
            )));
        }
        artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn update(&self, artifact: ProgramArtifact) -> Result<ProgramArtifact, StoreError> {
        let mut artifacts = self.artifacts.write();
        if !artifacts.contains_key(&artifact.id) {
            return Err(StoreError::NotFound("artifact"));
        }
        artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn get_by_id(&self, id: ArtifactId) -> Result<ProgramArtifact, StoreError> {
        self.artifacts
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("artifact"))
    }

    async fn get_active_by_task(&self, task_id: TaskId) -> Result<ProgramArtifact, StoreError> {
        self.artifacts
            .read()
            .values()
            .find(|a| a.task_id == task_id && a.status == ArtifactStatus::Active)
            .cloned()
            .ok_or(StoreError::NotFound("active artifact"))
    }

    async fn get_by_task_and_version(
        &self,
        task_id: TaskId,
        version: u32,
    ) -> Result<ProgramArtifact, StoreError> {
        self.artifacts
            .read()
            .values()
            .find(|a| a.task_id == task_id && a.version == version)
            .cloned()
            .ok_or(StoreError::NotFound("artifact"))
    }

    async fn get_latest_version(&self, task_id: TaskId) -> Result<Option<u32>, StoreError> {
        Ok(self
            .artifacts
            .read()
            .values()
            .filter(|a| a.task_id == task_id)
            .map(|a| a.version)
            .max())
    }

    async fn list_by_task(&self, task_id: TaskId) -> Result<Vec<ProgramArtifact>, StoreError> {
        let mut found: Vec<_> = self
            .artifacts
            .read()
            .values()
            .filter(|a| a.task_id == task_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.version);
        Ok(found)
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord, StoreError> {
        self.executions.write().insert(record.id, record.clone());
        self.execution_order.write().push(record.id);
        Ok(record)
    }

    async fn get_by_id(&self, id: ExecutionId) -> Result<ExecutionRecord, StoreError> {
        self.executions
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("execution"))
    }

    async fn get_by_task(
        &self,
        task_id: TaskId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.recent(|r| r.task_id == task_id, limit))
    }

    async fn get_by_program(
        &self,
        program_id: ArtifactId,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.recent(|r| r.program_id == program_id, limit))
    }

    async fn mark_sampled(&self, id: ExecutionId) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let record = executions.get_mut(&id).ok_or(StoreError::NotFound("execution"))?;
        record.sampled_for_validation = true;
        Ok(())
    }
}

impl InMemoryStore {
    /// Newest-first scan over executions matching a predicate.
    fn recent(
        &self,
        keep: impl Fn(&ExecutionRecord) -> bool,
        limit: usize,
    ) -> Vec<ExecutionRecord> {
        let order = self.execution_order.read();
        let executions = self.executions.read();
        order
            .iter()
            .rev()
            .filter_map(|id| executions.get(id))
            .filter(|r| keep(r))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ValidationStore for InMemoryStore {
    async fn create(&self, record: ValidationRecord) -> Result<ValidationRecord, StoreError> {
        self.validations
            .write()
            .entry(record.execution_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn get_failed_by_program(
        &self,
        program_id: ArtifactId,
        limit: usize,
    ) -> Result<Vec<ValidationRecord>, StoreError> {
        Ok(self
            .validations_for_program(program_id, None)
            .into_iter()
            .filter(|v| !v.is_valid)
            .take(limit)
            .collect())
    }

    async fn get_statistics(
        &self,
        program_id: ArtifactId,
        since: Option<DateTime<Utc>>,
    ) -> Result<ValidationStatistics, StoreError> {
        let records = self.validations_for_program(program_id, since);
        let total = records.len() as u64;
        let valid = records.iter().filter(|v| v.is_valid).count() as u64;
        let score_sum: f64 = records.iter().map(|v| v.score).sum();
        Ok(ValidationStatistics {
            total,
            valid,
            failed: total - valid,
            validation_rate: if total > 0 {
                valid as f64 / total as f64
            } else {
                0.0
            },
            avg_score: if total > 0 {
                score_sum / total as f64
            } else {
                0.0
            },
        })
    }
}

impl InMemoryStore {
    fn validations_for_program(
        &self,
        program_id: ArtifactId,
        since: Option<DateTime<Utc>>,
    ) -> Vec<ValidationRecord> {
        let executions = self.executions.read();
        let validations = self.validations.read();
        let mut found: Vec<ValidationRecord> = validations
            .iter()
            .filter(|(execution_id, _)| {
                executions
                    .get(execution_id)
                    .map(|e| e.program_id == program_id)
                    .unwrap_or(false)
            })
            .flat_map(|(_, records)| records.iter())
            .filter(|v| since.map(|cutoff| v.validated_at >= cutoff).unwrap_or(true))
            .cloned()
            .collect();
        found.sort_by_key(|v| std::cmp::Reverse(v.validated_at));
        found
    }
}

#[async_trait]
impl CanaryStore for InMemoryStore {
    async fn create(&self, canary: CanaryDeployment) -> Result<CanaryDeployment, StoreError> {
        self.canaries.write().insert(canary.id, canary.clone());
        Ok(canary)
    }

    async fn update(&self, canary: CanaryDeployment) -> Result<CanaryDeployment, StoreError> {
        let mut canaries = self.canaries.write();
        if !canaries.contains_key(&canary.id) {
            return Err(StoreError::NotFound("canary"));
        }
        canaries.insert(canary.id, canary.clone());
        Ok(canary)
    }

    async fn get_by_id(&self, id: CanaryId) -> Result<CanaryDeployment, StoreError> {
        self.canaries
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("canary"))
    }

    async fn get_active_by_task(
        &self,
        task_id: TaskId,
    ) -> Result<Option<CanaryDeployment>, StoreError> {
        Ok(self
            .canaries
            .read()
            .values()
            .find(|c| c.task_id == task_id && c.status.is_open())
            .cloned())
    }
}

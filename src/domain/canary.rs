// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canary deployment entity and its staged-rollout state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::ArtifactId;
use super::task::TaskId;

/// Unique canary deployment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanaryId(pub Uuid);

impl CanaryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CanaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Rollout stages with frozen traffic percentages.
///
/// Stages only ever advance; the canonical percentage for each stage is
/// fixed and `CanaryDeployment::current_percentage` always mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RolloutStage {
    NotStarted,
    Canary5,
    Canary25,
    Canary50,
    Full,
    Completed,
}

impl RolloutStage {
    /// Canonical fraction of traffic the new artifact serves at this stage.
    pub fn percentage(&self) -> f64 {
        match self {
            RolloutStage::NotStarted => 0.0,
            RolloutStage::Canary5 => 0.05,
            RolloutStage::Canary25 => 0.25,
            RolloutStage::Canary50 => 0.50,
            RolloutStage::Full => 1.0,
            RolloutStage::Completed => 1.0,
        }
    }

    pub fn next(&self) -> Option<RolloutStage> {
        match self {
            RolloutStage::NotStarted => Some(RolloutStage::Canary5),
            RolloutStage::Canary5 => Some(RolloutStage::Canary25),
            RolloutStage::Canary25 => Some(RolloutStage::Canary50),
            RolloutStage::Canary50 => Some(RolloutStage::Full),
            RolloutStage::Full => Some(RolloutStage::Completed),
            RolloutStage::Completed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RolloutStage::Completed)
    }
}

/// Orthogonal status of a canary deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanaryStatus {
    InProgress,
    Paused,
    RolledBack,
    Completed,
    Failed,
}

impl CanaryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CanaryStatus::RolledBack | CanaryStatus::Completed | CanaryStatus::Failed
        )
    }

    /// Whether this deployment blocks starting another one for the task.
    pub fn is_open(&self) -> bool {
        matches!(self, CanaryStatus::InProgress | CanaryStatus::Paused)
    }
}

/// What happened at a recorded point of the rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryAction {
    Started,
    Promoted,
    Paused,
    RolledBack,
}

/// One append-only history entry; the history list is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryHistoryEntry {
    pub stage: RolloutStage,
    pub percentage: f64,
    pub action: CanaryAction,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A staged rollout of a new artifact version against the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryDeployment {
    pub id: CanaryId,
    pub task_id: TaskId,
    pub current_program_id: ArtifactId,
    pub new_program_id: ArtifactId,
    pub stage: RolloutStage,
    pub current_percentage: f64,
    pub status: CanaryStatus,
    pub status_reason: Option<String>,
    pub history: Vec<CanaryHistoryEntry>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CanaryDeployment {
    pub fn new(task_id: TaskId, current: ArtifactId, new: ArtifactId) -> Self {
        Self {
            id: CanaryId::generate(),
            task_id,
            current_program_id: current,
            new_program_id: new,
            stage: RolloutStage::NotStarted,
            current_percentage: 0.0,
            status: CanaryStatus::InProgress,
            status_reason: None,
            history: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record(&mut self, action: CanaryAction, reason: Option<String>) {
        self.history.push(CanaryHistoryEntry {
            stage: self.stage,
            percentage: self.current_percentage,
            action,
            reason,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_percentages_are_canonical() {
        assert_eq!(RolloutStage::NotStarted.percentage(), 0.0);
        assert_eq!(RolloutStage::Canary5.percentage(), 0.05);
        assert_eq!(RolloutStage::Canary25.percentage(), 0.25);
        assert_eq!(RolloutStage::Canary50.percentage(), 0.50);
        assert_eq!(RolloutStage::Full.percentage(), 1.0);
        assert_eq!(RolloutStage::Completed.percentage(), 1.0);
    }

    #[test]
    fn stages_advance_monotonically() {
        let mut stage = RolloutStage::NotStarted;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert!(stage.is_terminal());
        assert_eq!(stage.next(), None);
    }

    #[test]
    fn open_statuses_block_new_deployments() {
        assert!(CanaryStatus::InProgress.is_open());
        assert!(CanaryStatus::Paused.is_open());
        assert!(!CanaryStatus::RolledBack.is_open());
        assert!(!CanaryStatus::Completed.is_open());
    }

    #[test]
    fn history_appends_in_order() {
        let mut canary = CanaryDeployment::new(
            TaskId::generate(),
            ArtifactId::generate(),
            ArtifactId::generate(),
        );
        canary.stage = RolloutStage::Canary5;
        canary.current_percentage = 0.05;
        canary.record(CanaryAction::Started, None);
        canary.record(CanaryAction::Promoted, Some("healthy".into()));

        assert_eq!(canary.history.len(), 2);
        assert_eq!(canary.history[0].action, CanaryAction::Started);
        assert_eq!(canary.history[1].action, CanaryAction::Promoted);
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Program artifacts: immutable, versioned programs bound to a task.
//!
//! Artifacts are append-only. `code` and `version` never change after
//! creation; only `status` and `deployment_percentage` mutate, and only
//! through canary transitions or a new-version insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::TaskId;

/// Unique artifact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Sandbox language the artifact targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Go,
    Csharp,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
            Language::Csharp => "csharp",
        };
        f.write_str(name)
    }
}

/// How the program was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisStrategy {
    Rule,
    Ml,
    Hybrid,
    Dsl,
}

/// Static complexity measures reported at synthesis time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub lines_of_code: u32,
    pub cyclomatic_complexity: u32,
    pub estimated_latency_ms: u64,
}

/// Lifecycle state of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactStatus {
    Draft,
    Active,
    Deprecated,
    Retired,
}

impl ArtifactStatus {
    /// Whether the artifact counts toward the per-task deployment sum.
    pub fn is_deployable(&self) -> bool {
        matches!(self, ArtifactStatus::Draft | ArtifactStatus::Active)
    }
}

/// An immutable, versioned program bound to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramArtifact {
    pub id: ArtifactId,
    pub task_id: TaskId,
    /// Monotonically increasing per task.
    pub version: u32,
    pub code: String,
    pub language: Language,
    pub synthesis_strategy: SynthesisStrategy,
    /// Synthesis confidence, in [0, 1].
    pub confidence: f64,
    pub complexity: ComplexityMetrics,
    pub status: ArtifactStatus,
    /// Fraction of task traffic this artifact serves, in [0, 1].
    pub deployment_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgramArtifact {
    pub fn new(
        task_id: TaskId,
        version: u32,
        code: impl Into<String>,
        language: Language,
        synthesis_strategy: SynthesisStrategy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ArtifactId::generate(),
            task_id,
            version,
            code: code.into(),
            language,
            synthesis_strategy,
            confidence: 0.5,
            complexity: ComplexityMetrics::default(),
            status: ArtifactStatus::Draft,
            deployment_percentage: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this artifact can serve traffic right now.
    pub fn is_serving(&self) -> bool {
        self.status.is_deployable() && self.deployment_percentage > 0.0
    }
}

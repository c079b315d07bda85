// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core entities: tasks, program artifacts, execution and validation
//! records, and canary deployments.

mod artifact;
mod canary;
mod execution;
mod task;

pub use artifact::{
    ArtifactId, ArtifactStatus, ComplexityMetrics, Language, ProgramArtifact, SynthesisStrategy,
};
pub use canary::{
    CanaryAction, CanaryDeployment, CanaryHistoryEntry, CanaryId, CanaryStatus, RolloutStage,
};
pub use execution::{
    ExecutionId, ExecutionRecord, ExecutionStatus, ValidationErrorDetail, ValidationId,
    ValidationMethod, ValidationRecord,
};
pub use task::{Task, TaskExample, TaskId};

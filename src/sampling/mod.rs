// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sampling deciders: which executions pay the oracle-validation cost.
//!
//! Five pluggable strategies behind one object-safe trait, plus the
//! coordinator the executor consults. Strategy state (partition counters,
//! feedback rings) is process-local and best-effort.

mod adaptive;
mod diversity;
mod edge_case;
mod feedback;
mod random;
pub mod signature;
mod stratified;

pub use adaptive::AdaptiveSampler;
pub use diversity::DiversitySampler;
pub use edge_case::EdgeCaseSampler;
pub use feedback::{FeedbackEntry, FeedbackStore};
pub use random::RandomSampler;
pub use stratified::StratifiedSampler;

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ExecutionId, Task, TaskId};
use crate::plugins::PluginRegistry;
use crate::store::{ExecutionStore, StoreError};

/// What a strategy saw when it decided.
#[derive(Debug, Clone, Serialize)]
pub struct SamplingDecision {
    pub should_sample: bool,
    /// Effective probability the decision was drawn at.
    pub probability: f64,
    pub reason: String,
    pub metadata: Value,
}

/// Input to one sampling decision.
pub struct SampleContext<'a> {
    pub task_id: TaskId,
    pub input: &'a Value,
    /// The task's configured sampling rate.
    pub base_rate: f64,
}

/// A sampling strategy. Implementations must be cheap and lock-light;
/// the executor calls this on every request.
pub trait Sampler: Send + Sync {
    fn name(&self) -> &'static str;
    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision;
}

/// Bernoulli trial at probability `p`.
pub(crate) fn bernoulli(p: f64) -> bool {
    rand::thread_rng().gen::<f64>() < p.clamp(0.0, 1.0)
}

/// Built-in strategy selector for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    #[default]
    Random,
    Stratified,
    EdgeCase,
    Adaptive,
    Diversity,
}

impl SamplerKind {
    pub fn build(&self, feedback: Arc<FeedbackStore>) -> Arc<dyn Sampler> {
        match self {
            SamplerKind::Random => Arc::new(RandomSampler),
            SamplerKind::Stratified => Arc::new(StratifiedSampler::new()),
            SamplerKind::EdgeCase => Arc::new(EdgeCaseSampler),
            SamplerKind::Adaptive => Arc::new(AdaptiveSampler::new(feedback)),
            SamplerKind::Diversity => Arc::new(DiversitySampler::new()),
        }
    }
}

/// Feedback reported after a validation verdict lands.
#[derive(Debug, Clone)]
pub struct SamplingFeedback {
    pub execution_id: ExecutionId,
    pub was_failure: bool,
    pub failure_reason: Option<String>,
}

/// Chooses a strategy per decision and routes feedback into the rings.
///
/// A registered Sampler plugin (highest priority, enabled) takes
/// precedence over the configured default strategy.
pub struct SamplingCoordinator {
    default: Arc<dyn Sampler>,
    plugins: Arc<PluginRegistry>,
    feedback: Arc<FeedbackStore>,
    executions: Arc<dyn ExecutionStore>,
}

impl SamplingCoordinator {
    pub fn new(
        default: Arc<dyn Sampler>,
        plugins: Arc<PluginRegistry>,
        feedback: Arc<FeedbackStore>,
        executions: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            default,
            plugins,
            feedback,
            executions,
        }
    }

    pub fn feedback_store(&self) -> &Arc<FeedbackStore> {
        &self.feedback
    }

    pub fn decide(&self, task: &Task, input: &Value) -> SamplingDecision {
        let ctx = SampleContext {
            task_id: task.id,
            input,
            base_rate: task.sampling_rate,
        };
        let sampler = self
            .plugins
            .first_sampler()
            .unwrap_or_else(|| self.default.clone());
        let decision = sampler.decide(&ctx);
        tracing::debug!(
            "sampling: task={} sampler={} sample={} p={:.3}",
            task.id,
            sampler.name(),
            decision.should_sample,
            decision.probability
        );
        decision
    }

    /// Ingest one validation outcome. The input's property set is derived
    /// from the referenced execution record.
    pub async fn record_feedback(&self, feedback: SamplingFeedback) -> Result<(), StoreError> {
        let execution = self.executions.get_by_id(feedback.execution_id).await?;
        self.feedback.push(
            execution.task_id,
            FeedbackEntry {
                execution_id: feedback.execution_id,
                was_failure: feedback.was_failure,
                failure_reason: feedback.failure_reason,
                properties: signature::property_set(&execution.input_data),
            },
        );
        Ok(())
    }
}

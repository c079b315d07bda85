// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive sampling: inputs resembling recent failures validate more.
//!
//! Compares the input's property set against the last ten failures in the
//! task's feedback ring; a Jaccard overlap above 0.7 doubles the rate.

use std::sync::Arc;

use serde_json::json;

use super::feedback::FeedbackStore;
use super::signature::{jaccard, property_set};
use super::{bernoulli, SampleContext, Sampler, SamplingDecision};

const FAILURE_WINDOW: usize = 10;
const OVERLAP_THRESHOLD: f64 = 0.7;

pub struct AdaptiveSampler {
    feedback: Arc<FeedbackStore>,
}

impl AdaptiveSampler {
    pub fn new(feedback: Arc<FeedbackStore>) -> Self {
        Self { feedback }
    }
}

impl Sampler for AdaptiveSampler {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision {
        let properties = property_set(ctx.input);
        let failures = self.feedback.recent_failures(ctx.task_id, FAILURE_WINDOW);
        let best_overlap = failures
            .iter()
            .map(|failed| jaccard(&properties, failed))
            .fold(0.0_f64, f64::max);

        let similar_to_failure = best_overlap > OVERLAP_THRESHOLD;
        let probability = if similar_to_failure {
            (ctx.base_rate * 2.0).min(1.0)
        } else {
            ctx.base_rate.clamp(0.0, 1.0)
        };

        SamplingDecision {
            should_sample: bernoulli(probability),
            probability,
            reason: if similar_to_failure {
                format!("overlaps recent failure ({best_overlap:.2})")
            } else {
                "no failure overlap; base rate".to_string()
            },
            metadata: json!({
                "best_overlap": best_overlap,
                "failures_considered": failures.len(),
            }),
        }
    }
}

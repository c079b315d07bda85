// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plain Bernoulli sampling at the task's base rate.

use serde_json::json;

use super::{bernoulli, SampleContext, Sampler, SamplingDecision};

pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn name(&self) -> &'static str {
        "random"
    }

    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision {
        let probability = ctx.base_rate.clamp(0.0, 1.0);
        SamplingDecision {
            should_sample: bernoulli(probability),
            probability,
            reason: "base rate".to_string(),
            metadata: json!({ "base_rate": ctx.base_rate }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use serde_json::json;

    #[test]
    fn zero_rate_never_samples() {
        let sampler = RandomSampler;
        let input = json!({"a": 1});
        let ctx = SampleContext {
            task_id: TaskId::generate(),
            input: &input,
            base_rate: 0.0,
        };
        for _ in 0..100 {
            assert!(!sampler.decide(&ctx).should_sample);
        }
    }

    #[test]
    fn full_rate_always_samples() {
        let sampler = RandomSampler;
        let input = json!({"a": 1});
        let ctx = SampleContext {
            task_id: TaskId::generate(),
            input: &input,
            base_rate: 1.0,
        };
        for _ in 0..100 {
            assert!(sampler.decide(&ctx).should_sample);
        }
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Edge-case sampling: inputs with boundary-shaped leaves always validate.

use serde_json::json;

use super::signature::has_edge_case;
use super::{bernoulli, SampleContext, Sampler, SamplingDecision};

pub struct EdgeCaseSampler;

impl Sampler for EdgeCaseSampler {
    fn name(&self) -> &'static str {
        "edge_case"
    }

    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision {
        if has_edge_case(ctx.input) {
            return SamplingDecision {
                should_sample: true,
                probability: 1.0,
                reason: "edge case input".to_string(),
                metadata: json!({ "edge_case": true }),
            };
        }

        let probability = ctx.base_rate.clamp(0.0, 1.0);
        SamplingDecision {
            should_sample: bernoulli(probability),
            probability,
            reason: "no edge cases; base rate".to_string(),
            metadata: json!({ "edge_case": false, "base_rate": ctx.base_rate }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use serde_json::json;

    #[test]
    fn edge_inputs_always_sample() {
        let sampler = EdgeCaseSampler;
        for input in [
            json!({"v": null}),
            json!({"v": ""}),
            json!({"v": "   "}),
            json!({"v": []}),
            json!({"v": {}}),
            json!({"v": 0}),
            json!({"v": 1e7}),
            json!({"v": 1e-5}),
            json!({}),
        ] {
            let ctx = SampleContext {
                task_id: TaskId::generate(),
                input: &input,
                base_rate: 0.0,
            };
            let decision = sampler.decide(&ctx);
            assert!(decision.should_sample, "should sample {input}");
            assert_eq!(decision.probability, 1.0);
        }
    }

    #[test]
    fn ordinary_inputs_fall_back_to_base_rate() {
        let sampler = EdgeCaseSampler;
        let input = json!({"v": 42, "name": "plain"});
        let ctx = SampleContext {
            task_id: TaskId::generate(),
            input: &input,
            base_rate: 0.0,
        };
        for _ in 0..50 {
            assert!(!sampler.decide(&ctx).should_sample);
        }
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Diversity-based sampling: prefer inputs unlike recently sampled ones.

use std::collections::{BTreeSet, VecDeque};

use dashmap::DashMap;
use serde_json::json;

use crate::domain::TaskId;

use super::signature::{jaccard, property_set};
use super::{bernoulli, SampleContext, Sampler, SamplingDecision};

const RECENT_WINDOW: usize = 10;
const OVERLAP_THRESHOLD: f64 = 0.8;

pub struct DiversitySampler {
    recent: DashMap<TaskId, VecDeque<BTreeSet<String>>>,
}

impl DiversitySampler {
    pub fn new() -> Self {
        Self {
            recent: DashMap::new(),
        }
    }
}

impl Default for DiversitySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for DiversitySampler {
    fn name(&self) -> &'static str {
        "diversity"
    }

    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision {
        let properties = property_set(ctx.input);

        let best_overlap = self
            .recent
            .get(&ctx.task_id)
            .map(|ring| {
                ring.iter()
                    .map(|seen| jaccard(&properties, seen))
                    .fold(0.0_f64, f64::max)
            })
            .unwrap_or(0.0);

        let looks_familiar = best_overlap > OVERLAP_THRESHOLD;
        let probability = if looks_familiar {
            (ctx.base_rate / 2.0).clamp(0.0, 1.0)
        } else {
            (ctx.base_rate * 1.5).min(1.0)
        };

        let should_sample = bernoulli(probability);
        if should_sample {
            let mut ring = self.recent.entry(ctx.task_id).or_default();
            if ring.len() >= RECENT_WINDOW {
                ring.pop_front();
            }
            ring.push_back(properties);
        }

        SamplingDecision {
            should_sample,
            probability,
            reason: if looks_familiar {
                format!("similar to recent sample ({best_overlap:.2})")
            } else {
                "novel input shape".to_string()
            },
            metadata: json!({ "best_overlap": best_overlap }),
        }
    }
}

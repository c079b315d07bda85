// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stratified sampling over structural complexity partitions.
//!
//! Tracks per-task counts per partition; inputs landing in a partition
//! seen less often than the mean are sampled at double the base rate.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::json;

use crate::domain::TaskId;

use super::signature::{stratum_of, Stratum};
use super::{bernoulli, SampleContext, Sampler, SamplingDecision};

pub struct StratifiedSampler {
    counts: DashMap<TaskId, HashMap<Stratum, u64>>,
}

impl StratifiedSampler {
    pub fn new() -> Self {
        Self {
            counts: DashMap::new(),
        }
    }
}

impl Default for StratifiedSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for StratifiedSampler {
    fn name(&self) -> &'static str {
        "stratified"
    }

    fn decide(&self, ctx: &SampleContext<'_>) -> SamplingDecision {
        let stratum = stratum_of(ctx.input);

        let (seen_here, total) = {
            let mut counts = self.counts.entry(ctx.task_id).or_default();
            let seen_here = *counts.get(&stratum).unwrap_or(&0);
            let total: u64 = counts.values().sum();
            *counts.entry(stratum).or_insert(0) += 1;
            (seen_here, total)
        };

        let mean = total as f64 / Stratum::ALL.len() as f64;
        let under_represented = total == 0 || (seen_here as f64) < mean;
        let probability = if under_represented {
            (ctx.base_rate * 2.0).min(1.0)
        } else {
            ctx.base_rate.clamp(0.0, 1.0)
        };

        SamplingDecision {
            should_sample: bernoulli(probability),
            probability,
            reason: if under_represented {
                format!("under-represented partition: {}", stratum.name())
            } else {
                format!("partition at parity: {}", stratum.name())
            },
            metadata: json!({
                "partition": stratum.name(),
                "partition_count": seen_here,
                "task_total": total,
            }),
        }
    }
}

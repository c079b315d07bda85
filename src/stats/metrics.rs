// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-version execution metrics over a recent window.

use serde::Serialize;

use crate::domain::{ArtifactId, ExecutionRecord};

/// Aggregated execution and validation metrics for one artifact version.
#[derive(Debug, Clone, Serialize)]
pub struct VersionMetrics {
    pub program_id: ArtifactId,
    pub sample_size: usize,
    pub avg_latency_ms: f64,
    pub latency_std_dev_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    /// valid / total over the validation window.
    pub validation_rate: f64,
    /// Verdicts behind `validation_rate`; zero means no signal yet.
    pub validated_count: u64,
    /// non-Success executions / total executions.
    pub error_rate: f64,
}

impl VersionMetrics {
    /// Aggregate a window of executions plus validation aggregates.
    pub fn from_window(
        program_id: ArtifactId,
        executions: &[ExecutionRecord],
        validation_rate: f64,
        validated_count: u64,
    ) -> Self {
        let sample_size = executions.len();
        let mut latencies: Vec<u64> = executions.iter().map(|e| e.latency_ms).collect();
        latencies.sort_unstable();

        let total: u64 = latencies.iter().sum();
        let avg = if sample_size > 0 {
            total as f64 / sample_size as f64
        } else {
            0.0
        };
        let variance = if sample_size > 1 {
            latencies
                .iter()
                .map(|&l| {
                    let diff = l as f64 - avg;
                    diff * diff
                })
                .sum::<f64>()
                / (sample_size as f64 - 1.0)
        } else {
            0.0
        };

        let errors = executions.iter().filter(|e| !e.is_success()).count();

        Self {
            program_id,
            sample_size,
            avg_latency_ms: avg,
            latency_std_dev_ms: variance.sqrt(),
            p50_latency_ms: percentile(&latencies, 0.50),
            p95_latency_ms: percentile(&latencies, 0.95),
            p99_latency_ms: percentile(&latencies, 0.99),
            validation_rate,
            validated_count,
            error_rate: if sample_size > 0 {
                errors as f64 / sample_size as f64
            } else {
                0.0
            },
        }
    }

    /// Observed failure rate: execution errors, widened by validation
    /// failures once verdicts exist for this version.
    pub fn failure_rate(&self) -> f64 {
        if self.validated_count > 0 {
            self.error_rate.max(1.0 - self.validation_rate)
        } else {
            self.error_rate
        }
    }
}

/// Nearest-rank percentile over a sorted slice.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! A/B comparison of two artifact versions with a recommendation verdict.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::ArtifactId;
use crate::store::{StoreError, Stores};

use super::metrics::VersionMetrics;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Comparison tuning. Durations are hours for config-file friendliness.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    pub min_sample_size: usize,
    /// Performance-delta floor below which a significant result rolls back.
    pub max_degradation: f64,
    /// Performance-delta ceiling a significant result must clear to promote.
    pub min_improvement: f64,
    pub required_confidence: f64,
    pub validation_window_hours: i64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 100,
            max_degradation: 0.05,
            min_improvement: 0.02,
            required_confidence: 0.95,
            validation_window_hours: 24,
        }
    }
}

impl CompareConfig {
    /// The looser tuning canary evaluation runs with.
    pub fn canary() -> Self {
        Self {
            min_sample_size: 50,
            max_degradation: 0.10,
            min_improvement: 0.0,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Promote,
    Rollback,
    Continue,
    ManualReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Full comparison outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AbTestReport {
    pub control: VersionMetrics,
    pub treatment: VersionMetrics,
    /// Relative latency improvement of treatment over control.
    pub latency_delta: f64,
    pub validation_delta: f64,
    pub error_delta: f64,
    /// 0.3·latency + 0.5·validation + 0.2·error.
    pub performance_delta: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
}

/// Compares two versions' recent execution and validation history.
pub struct VersionComparator {
    stores: Stores,
}

impl VersionComparator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn compare(
        &self,
        control_id: ArtifactId,
        treatment_id: ArtifactId,
        config: &CompareConfig,
    ) -> Result<AbTestReport, CompareError> {
        let window = config.min_sample_size * 2;
        let since = Utc::now() - ChronoDuration::hours(config.validation_window_hours);

        let control_executions = self
            .stores
            .executions
            .get_by_program(control_id, window)
            .await?;
        let treatment_executions = self
            .stores
            .executions
            .get_by_program(treatment_id, window)
            .await?;

        let control_validation = self
            .stores
            .validations
            .get_statistics(control_id, Some(since))
            .await?;
        let treatment_validation = self
            .stores
            .validations
            .get_statistics(treatment_id, Some(since))
            .await?;

        let control = VersionMetrics::from_window(
            control_id,
            &control_executions,
            control_validation.validation_rate,
            control_validation.total,
        );
        let treatment = VersionMetrics::from_window(
            treatment_id,
            &treatment_executions,
            treatment_validation.validation_rate,
            treatment_validation.total,
        );

        let latency_delta = if control.avg_latency_ms > 0.0 {
            (control.avg_latency_ms - treatment.avg_latency_ms) / control.avg_latency_ms
        } else {
            0.0
        };
        let validation_delta = treatment.validation_rate - control.validation_rate;
        let error_delta = control.error_rate - treatment.error_rate;
        let performance_delta =
            0.3 * latency_delta + 0.5 * validation_delta + 0.2 * error_delta;

        let t_statistic = pooled_t_statistic(&control, &treatment);
        // Coarse lookup: the latency test only distinguishes clearly
        // significant from clearly not.
        let p_value = if t_statistic.abs() > 1.96 { 0.01 } else { 0.10 };
        let significant = p_value < 1.0 - config.required_confidence;

        let (recommendation, confidence) = recommend(
            &control,
            &treatment,
            performance_delta,
            significant,
            config,
        );

        Ok(AbTestReport {
            control,
            treatment,
            latency_delta,
            validation_delta,
            error_delta,
            performance_delta,
            t_statistic,
            p_value,
            significant,
            recommendation,
            confidence,
        })
    }
}

/// Two-sample t statistic with pooled standard deviation.
fn pooled_t_statistic(control: &VersionMetrics, treatment: &VersionMetrics) -> f64 {
    let n1 = control.sample_size as f64;
    let n2 = treatment.sample_size as f64;
    if n1 < 2.0 || n2 < 2.0 {
        return 0.0;
    }

    let s1 = control.latency_std_dev_ms;
    let s2 = treatment.latency_std_dev_ms;
    let pooled_variance =
        ((n1 - 1.0) * s1 * s1 + (n2 - 1.0) * s2 * s2) / (n1 + n2 - 2.0);
    let pooled_sd = pooled_variance.sqrt();
    if pooled_sd == 0.0 {
        return 0.0;
    }

    (control.avg_latency_ms - treatment.avg_latency_ms)
        / (pooled_sd * (1.0 / n1 + 1.0 / n2).sqrt())
}

fn recommend(
    control: &VersionMetrics,
    treatment: &VersionMetrics,
    delta: f64,
    significant: bool,
    config: &CompareConfig,
) -> (Recommendation, Confidence) {
    let sufficient = control.sample_size >= config.min_sample_size
        && treatment.sample_size >= config.min_sample_size;

    if !sufficient {
        return (Recommendation::Continue, Confidence::Low);
    }
    if significant && delta < -config.max_degradation {
        return (Recommendation::Rollback, Confidence::High);
    }
    if significant && delta > config.min_improvement {
        return (Recommendation::Promote, Confidence::High);
    }
    if !significant {
        return (Recommendation::Continue, Confidence::Medium);
    }
    if delta > 0.0 && delta <= config.min_improvement {
        return (Recommendation::Continue, Confidence::Medium);
    }
    (Recommendation::ManualReview, Confidence::Low)
}

#[cfg(test)]
#[path = "comparator_tests.rs"]
mod tests;

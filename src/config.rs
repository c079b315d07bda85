// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Every section deserializes from TOML with full defaults, so a config
//! file only names what it overrides. Durations are plain integers
//! (seconds or hours) to stay config-file friendly.

use serde::Deserialize;
use thiserror::Error;

use crate::exec::ExecutorConfig;
use crate::improve::ImprovementConfig;
use crate::sampling::SamplerKind;
use crate::sandbox::client::AdapterConfig;
use crate::sandbox::pool::PoolConfig;
use crate::stats::CompareConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Sampling section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Default strategy when no sampler plugin is registered.
    pub strategy: SamplerKind,
    /// Feedback ring capacity per task.
    pub feedback_capacity: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            strategy: SamplerKind::Random,
            feedback_capacity: 64,
        }
    }
}

/// Adapter section (seconds granularity for the request timeout).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub request_timeout_secs: u64,
    pub session_memory_mb: u64,
    pub session_cpu_shares: u32,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        let defaults = AdapterConfig::default();
        Self {
            request_timeout_secs: defaults.request_timeout.as_secs(),
            session_memory_mb: defaults.session_memory_mb,
            session_cpu_shares: defaults.session_cpu_shares,
        }
    }
}

impl AdapterSettings {
    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            request_timeout: std::time::Duration::from_secs(self.request_timeout_secs),
            session_memory_mb: self.session_memory_mb,
            session_cpu_shares: self.session_cpu_shares,
        }
    }
}

/// Whole-runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub pool: PoolConfig,
    pub adapter: AdapterSettings,
    pub executor: ExecutorConfig,
    pub sampling: SamplingConfig,
    pub comparison: CompareConfig,
    pub improvement: ImprovementConfig,
}

impl RuntimeConfig {
    /// Parse a TOML config document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config.comparison.min_sample_size, 100);
        assert_eq!(config.improvement.failure_threshold, 5);
        assert_eq!(config.pool.idle_ttl_secs, 300);
        assert_eq!(config.sampling.strategy, SamplerKind::Random);
    }

    #[test]
    fn partial_overrides_apply() {
        let raw = r#"
            [pool]
            max_sessions = 3
            idle_ttl_secs = 30

            [sampling]
            strategy = "edge_case"

            [comparison]
            min_sample_size = 10

            [executor]
            enabled_languages = ["python", "go"]
        "#;
        let config = RuntimeConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.pool.max_sessions, 3);
        assert_eq!(config.pool.idle_ttl_secs, 30);
        assert_eq!(config.sampling.strategy, SamplerKind::EdgeCase);
        assert_eq!(config.comparison.min_sample_size, 10);
        assert_eq!(config.executor.enabled_languages.len(), 2);
        // Untouched sections keep defaults.
        assert_eq!(config.adapter.request_timeout_secs, 30);
    }

    #[test]
    fn bad_toml_is_rejected() {
        assert!(RuntimeConfig::from_toml_str("[pool\nmax_sessions = x").is_err());
    }
}

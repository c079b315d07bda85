// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: a full runtime over a loopback sandbox executor.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use loopai_core::domain::{Language, ProgramArtifact, SynthesisStrategy, Task};
use loopai_core::improve::{
    GeneratedComplexity, GeneratedProgram, GenerationRequest, GeneratorError, ProgramGenerator,
};
use loopai_core::sandbox::loopback::{echo_host, LoopbackExecutor, ProgramHost};
use loopai_core::store::Stores;
use loopai_core::{NewArtifact, NewTask, Runtime, RuntimeConfig};

/// Generator that always returns a trivial fixed program.
pub struct StubGenerator;

#[async_trait]
impl ProgramGenerator for StubGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedProgram, GeneratorError> {
        Ok(GeneratedProgram {
            code: "result = input_data".into(),
            language: request.target_runtime,
            metadata: json!({"generator": "stub"}),
            complexity: GeneratedComplexity {
                lines_of_code: 1,
                cyclomatic_complexity: 1,
                estimated_tokens: 4,
            },
        })
    }
}

/// Best-effort tracing for test debugging; respects RUST_LOG.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A runtime wired over an in-memory store and a loopback executor.
pub fn runtime_with(host: ProgramHost, config: RuntimeConfig) -> Runtime {
    init_tracing();
    let stores = Stores::in_memory();
    let adapter = LoopbackExecutor::connect(host, config.adapter.to_adapter_config());
    Runtime::new(config, stores, adapter, Arc::new(StubGenerator))
}

pub fn echo_runtime() -> Runtime {
    runtime_with(echo_host(), RuntimeConfig::default())
}

/// Create a task with one active artifact serving all traffic.
pub async fn create_active_task(
    runtime: &Runtime,
    name: &str,
    sampling_rate: f64,
) -> (Task, ProgramArtifact) {
    let task = runtime
        .create_task(NewTask {
            name: name.to_string(),
            description: format!("{name} task"),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            examples: Vec::new(),
            accuracy_target: Some(0.9),
            latency_target_ms: Some(1_000),
            sampling_rate: Some(sampling_rate),
        })
        .await
        .unwrap();

    let artifact = runtime
        .create_artifact(NewArtifact {
            task_id: task.id,
            code: "result = input_data".into(),
            language: Language::Python,
            synthesis_strategy: SynthesisStrategy::Rule,
            confidence: Some(0.9),
        })
        .await
        .unwrap();
    let artifact = runtime.activate_initial_artifact(artifact.id).await.unwrap();

    (task, artifact)
}

/// Register a second draft version for the task.
pub async fn create_draft_v2(runtime: &Runtime, task: &Task) -> ProgramArtifact {
    runtime
        .create_artifact(NewArtifact {
            task_id: task.id,
            code: "result = {\"v2\": input_data}".into(),
            language: Language::Python,
            synthesis_strategy: SynthesisStrategy::Ml,
            confidence: Some(0.8),
        })
        .await
        .unwrap()
}

pub fn cancel() -> CancellationToken {
    CancellationToken::new()
}

/// Deployment percentages over serving artifacts must sum to one.
pub async fn assert_traffic_conserved(runtime: &Runtime, task: &Task) {
    let artifacts = runtime.stores.artifacts.list_by_task(task.id).await.unwrap();
    let sum: f64 = artifacts
        .iter()
        .filter(|a| a.status.is_deployable())
        .map(|a| a.deployment_percentage)
        .sum();
    assert!((sum - 1.0).abs() < 1e-9, "deployment sum was {sum}");
}

//! Tests for the improvement orchestrator.

use super::*;
use crate::domain::{
    ExecutionId, ExecutionRecord, ExecutionStatus, Language, Task, ValidationErrorDetail,
    ValidationId, ValidationMethod, ValidationRecord,
};
use crate::improve::generator::{GeneratedComplexity, GeneratedProgram, GeneratorError};
use crate::plugins::PluginRegistry;
use crate::stats::{CompareConfig, VersionComparator};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

struct CountingGenerator {
    calls: Arc<AtomicU32>,
    fail: bool,
}

#[async_trait]
impl ProgramGenerator for CountingGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedProgram, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GeneratorError::Failed("cannot synthesize".into()));
        }
        Ok(GeneratedProgram {
            code: "result = {\"fixed\": true}".into(),
            language: request.target_runtime,
            metadata: json!({"generator": "test"}),
            complexity: GeneratedComplexity {
                lines_of_code: 1,
                cyclomatic_complexity: 1,
                estimated_tokens: 8,
            },
        })
    }
}

struct Fixture {
    stores: Stores,
    orchestrator: Arc<ImprovementOrchestrator>,
    calls: Arc<AtomicU32>,
    task_id: TaskId,
    artifact_id: ArtifactId,
}

async fn fixture(generator_fails: bool, config: ImprovementConfig) -> Fixture {
    let stores = Stores::in_memory();
    let plugins = Arc::new(PluginRegistry::new());
    let comparator = Arc::new(VersionComparator::new(stores.clone()));
    let canary = Arc::new(CanaryController::new(
        stores.clone(),
        comparator,
        plugins,
        CompareConfig::canary(),
    ));
    let calls = Arc::new(AtomicU32::new(0));
    let generator = Arc::new(CountingGenerator {
        calls: calls.clone(),
        fail: generator_fails,
    });
    let orchestrator = Arc::new(ImprovementOrchestrator::new(
        stores.clone(),
        generator,
        canary,
        config,
    ));

    let task = stores
        .tasks
        .create(Task::new("t", "d", json!({"type": "object"}), json!({"type": "object"})))
        .await
        .unwrap();
    let mut artifact = ProgramArtifact::new(
        task.id,
        1,
        "result = input_data",
        Language::Python,
        SynthesisStrategy::Rule,
    );
    artifact.status = ArtifactStatus::Active;
    artifact.deployment_percentage = 1.0;
    let artifact = stores.artifacts.create(artifact).await.unwrap();

    Fixture {
        stores,
        orchestrator,
        calls,
        task_id: task.id,
        artifact_id: artifact.id,
    }
}

impl Fixture {
    /// Seed `valid_count` passing and `failed_count` failing validations.
    async fn seed_validations(&self, valid_count: usize, failed_count: usize) {
        for i in 0..(valid_count + failed_count) {
            let is_valid = i < valid_count;
            let execution = self
                .stores
                .executions
                .create(ExecutionRecord {
                    id: ExecutionId::generate(),
                    program_id: self.artifact_id,
                    task_id: self.task_id,
                    input_data: json!({"i": i}),
                    output_data: Some(json!({"i": i})),
                    status: ExecutionStatus::Success,
                    error_detail: None,
                    latency_ms: 10,
                    sampled_for_validation: true,
                    executed_at: chrono::Utc::now(),
                })
                .await
                .unwrap();
            self.stores
                .validations
                .create(ValidationRecord {
                    id: ValidationId::generate(),
                    execution_id: execution.id,
                    is_valid,
                    score: if is_valid { 1.0 } else { 0.0 },
                    errors: if is_valid {
                        Vec::new()
                    } else {
                        vec![ValidationErrorDetail::new(
                            "value_mismatch",
                            "/text",
                            "wrong greeting",
                        )]
                    },
                    method: ValidationMethod::Oracle,
                    validated_at: chrono::Utc::now(),
                })
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn failing_artifact_triggers_regeneration_and_canary() {
    let fx = fixture(false, ImprovementConfig::default()).await;
    // 2 valid / 8 failed: rate 0.2 with 8 failures.
    fx.seed_validations(2, 8).await;

    let deployment = fx
        .orchestrator
        .check_artifact(fx.artifact_id)
        .await
        .unwrap()
        .expect("canary should start");

    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
    assert_eq!(deployment.task_id, fx.task_id);

    // The regenerated artifact exists as the next draft version at 5%.
    let replacement = fx
        .stores
        .artifacts
        .get_by_id(deployment.new_program_id)
        .await
        .unwrap();
    assert_eq!(replacement.version, 2);
    assert_eq!(replacement.status, ArtifactStatus::Draft);
    assert!((replacement.deployment_percentage - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn healthy_artifact_is_left_alone() {
    let fx = fixture(false, ImprovementConfig::default()).await;
    fx.seed_validations(9, 1).await;

    let outcome = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn few_failures_do_not_trigger_even_at_low_rate() {
    let fx = fixture(false, ImprovementConfig::default()).await;
    // Rate 0.0 but only 4 failures: below the failure threshold.
    fx.seed_validations(0, 4).await;

    let outcome = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn open_canary_suppresses_improvement() {
    let fx = fixture(false, ImprovementConfig::default()).await;
    fx.seed_validations(0, 10).await;

    let first = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(first.is_some());

    // Same signal again: the open canary blocks a second improvement.
    let second = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(second.is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generator_failure_is_swallowed_and_cooled_down() {
    let fx = fixture(true, ImprovementConfig::default()).await;
    fx.seed_validations(0, 10).await;

    let outcome = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);

    // Cooldown: an immediate re-check does not call the generator again.
    let outcome = fx.orchestrator.check_artifact(fx.artifact_id).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn check_all_scans_active_artifacts() {
    let fx = fixture(false, ImprovementConfig::default()).await;
    fx.seed_validations(0, 10).await;

    let started = fx.orchestrator.check_all().await.unwrap();
    assert_eq!(started, 1);
}

//! Tests for the single-request executor.

use super::*;
use crate::domain::{ArtifactStatus, SynthesisStrategy};
use crate::plugins::PluginRegistry;
use crate::sampling::{FeedbackStore, RandomSampler, SamplingCoordinator};
use crate::sandbox::client::AdapterConfig;
use crate::sandbox::loopback::{echo_host, LoopbackExecutor, ProgramHost};
use crate::sandbox::pool::PoolConfig;
use serde_json::json;

pub(crate) struct Fixture {
    pub stores: Stores,
    pub executor: Arc<Executor>,
    pub task: Task,
    pub artifact: ProgramArtifact,
}

/// Full executor stack over a loopback sandbox with the given host.
pub(crate) async fn fixture_with_host(host: ProgramHost, sampling_rate: f64) -> Fixture {
    let stores = Stores::in_memory();
    let adapter = LoopbackExecutor::connect(host, AdapterConfig::default());
    let pool = crate::sandbox::pool::SessionPool::new(adapter, PoolConfig::default());
    let plugins = Arc::new(PluginRegistry::new());
    let sampling = Arc::new(SamplingCoordinator::new(
        Arc::new(RandomSampler),
        plugins,
        Arc::new(FeedbackStore::default()),
        stores.executions.clone(),
    ));
    let executor = Arc::new(Executor::new(
        stores.clone(),
        pool,
        sampling,
        ExecutorConfig::default(),
    ));

    let task = stores
        .tasks
        .create(
            Task::new(
                "echo",
                "echo the input",
                json!({"type": "object"}),
                json!({"type": "object"}),
            )
            .with_sampling_rate(sampling_rate),
        )
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
        executor,
        task,
        artifact,
    }
}

#[tokio::test]
async fn happy_path_records_success() {
    let fx = fixture_with_host(echo_host(), 0.0).await;
    let cancel = CancellationToken::new();

    let record = fx
        .executor
        .execute(fx.task.id, json!({"text": "hi"}), None, &cancel)
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Success);
    assert_eq!(record.output_data, Some(json!({"text": "hi"})));
    assert_eq!(record.program_id, fx.artifact.id);
    assert!(!record.sampled_for_validation);

    // Persisted, and the artifact's deployment is untouched.
    let stored = fx.stores.executions.get_by_id(record.id).await.unwrap();
    assert_eq!(stored.id, record.id);
    let artifact = fx.stores.artifacts.get_by_id(fx.artifact.id).await.unwrap();
    assert_eq!(artifact.deployment_percentage, 1.0);
}

#[tokio::test]
async fn full_sampling_rate_flags_every_execution() {
    let fx = fixture_with_host(echo_host(), 1.0).await;
    let cancel = CancellationToken::new();

    for _ in 0..5 {
        let record = fx
            .executor
            .execute(fx.task.id, json!({"text": "hi"}), None, &cancel)
            .await
            .unwrap();
        assert!(record.sampled_for_validation);
    }
}

#[tokio::test]
async fn program_failure_is_recorded_not_raised() {
    let host: ProgramHost = Arc::new(|_, _, input| {
        let v = input.get("v").and_then(serde_json::Value::as_i64).unwrap_or(0);
        if v < 0 {
            Err("negative input rejected".to_string())
        } else {
            Ok(json!({"v": v}))
        }
    });
    let fx = fixture_with_host(host, 0.0).await;
    let cancel = CancellationToken::new();

    let record = fx
        .executor
        .execute(fx.task.id, json!({"v": -1}), None, &cancel)
        .await
        .unwrap();

    assert_eq!(record.status, ExecutionStatus::Error);
    assert!(record.output_data.is_none());
    assert!(record
        .error_detail
        .as_deref()
        .unwrap()
        .contains("negative input rejected"));
}

#[tokio::test]
async fn scalar_outputs_roundtrip() {
    let host: ProgramHost = Arc::new(|_, _, _| Ok(json!("ok")));
    let fx = fixture_with_host(host, 0.0).await;
    let cancel = CancellationToken::new();

    let record = fx
        .executor
        .execute(fx.task.id, json!({}), None, &cancel)
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Success);
    assert_eq!(record.output_data, Some(json!("ok")));
}

#[tokio::test]
async fn unknown_task_fails_the_call() {
    let fx = fixture_with_host(echo_host(), 0.0).await;
    let cancel = CancellationToken::new();
    let err = fx
        .executor
        .execute(TaskId::generate(), json!({}), None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::TaskNotFound));
}

#[tokio::test]
async fn task_without_serving_artifact_fails_the_call() {
    let fx = fixture_with_host(echo_host(), 0.0).await;
    let cancel = CancellationToken::new();

    let bare = fx
        .stores
        .tasks
        .create(Task::new("bare", "d", json!({}), json!({})))
        .await
        .unwrap();
    let err = fx
        .executor
        .execute(bare.id, json!({}), None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::NoActiveArtifact));
}

#[tokio::test]
async fn disabled_language_records_unsupported() {
    let stores = Stores::in_memory();
    let adapter = LoopbackExecutor::connect(echo_host(), AdapterConfig::default());
    let pool = crate::sandbox::pool::SessionPool::new(adapter, PoolConfig::default());
    let plugins = Arc::new(PluginRegistry::new());
    let sampling = Arc::new(SamplingCoordinator::new(
        Arc::new(RandomSampler),
        plugins,
        Arc::new(FeedbackStore::default()),
        stores.executions.clone(),
    ));
    let executor = Executor::new(
        stores.clone(),
        pool,
        sampling,
        ExecutorConfig {
            enabled_languages: vec![Language::Python],
        },
    );

    let task = stores
        .tasks
        .create(Task::new("t", "d", json!({}), json!({})))
        .await
        .unwrap();
    let mut artifact = ProgramArtifact::new(
        task.id,
        1,
        "result = 1",
        Language::Go,
        SynthesisStrategy::Rule,
    );
    artifact.status = ArtifactStatus::Active;
    artifact.deployment_percentage = 1.0;
    stores.artifacts.create(artifact).await.unwrap();

    let cancel = CancellationToken::new();
    let record = executor
        .execute(task.id, json!({}), None, &cancel)
        .await
        .unwrap();
    assert_eq!(record.status, ExecutionStatus::Error);
    assert!(record.error_detail.as_deref().unwrap().contains("not enabled"));
}

#[tokio::test]
async fn explicit_version_bypasses_traffic_split() {
    let fx = fixture_with_host(echo_host(), 0.0).await;
    let cancel = CancellationToken::new();

    // A draft v2 with zero deployment, reachable only by version.
    let v2 = fx
        .stores
        .artifacts
        .create(ProgramArtifact::new(
            fx.task.id,
            2,
            "result = input_data",
            Language::Python,
            SynthesisStrategy::Ml,
        ))
        .await
        .unwrap();

    let record = fx
        .executor
        .execute(fx.task.id, json!({"x": 1}), Some(2), &cancel)
        .await
        .unwrap();
    assert_eq!(record.program_id, v2.id);
}

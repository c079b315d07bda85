//! Tests for the canary controller state machine.

use super::*;
use crate::domain::{
    ExecutionId, ExecutionRecord, ExecutionStatus, Language, SynthesisStrategy, Task,
};
use crate::stats::VersionComparator;
use chrono::Utc;
use serde_json::json;

struct Fixture {
    stores: Stores,
    controller: CanaryController,
    task_id: TaskId,
    v1: ArtifactId,
    v2: ArtifactId,
}

async fn fixture() -> Fixture {
    let stores = Stores::in_memory();
    let plugins = Arc::new(PluginRegistry::new());
    let comparator = Arc::new(VersionComparator::new(stores.clone()));
    let controller = CanaryController::new(
        stores.clone(),
        comparator,
        plugins,
        CompareConfig::canary(),
    );

    let task = stores
        .tasks
        .create(Task::new("t", "d", json!({"type": "object"}), json!({"type": "object"})))
        .await
        .unwrap();

    let mut v1 = ProgramArtifact::new(
        task.id,
        1,
        "result = input_data",
        Language::Python,
        SynthesisStrategy::Rule,
    );
    v1.status = ArtifactStatus::Active;
    v1.deployment_percentage = 1.0;
    let v1 = stores.artifacts.create(v1).await.unwrap();

    let v2 = stores
        .artifacts
        .create(ProgramArtifact::new(
            task.id,
            2,
            "result = input_data",
            Language::Python,
            SynthesisStrategy::Ml,
        ))
        .await
        .unwrap();

    Fixture {
        stores,
        controller,
        task_id: task.id,
        v1: v1.id,
        v2: v2.id,
    }
}

impl Fixture {
    async fn seed_executions(&self, program_id: ArtifactId, count: usize, failing: bool) {
        for i in 0..count {
            self.stores
                .executions
                .create(ExecutionRecord {
                    id: ExecutionId::generate(),
                    program_id,
                    task_id: self.task_id,
                    input_data: json!({"i": i}),
                    output_data: (!failing).then(|| json!({"i": i})),
                    status: if failing {
                        ExecutionStatus::Error
                    } else {
                        ExecutionStatus::Success
                    },
                    error_detail: failing.then(|| "bad branch".to_string()),
                    latency_ms: 100,
                    sampled_for_validation: false,
                    executed_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    }

    async fn artifact(&self, id: ArtifactId) -> ProgramArtifact {
        self.stores.artifacts.get_by_id(id).await.unwrap()
    }

    /// Deployment percentages over serving statuses must sum to one.
    async fn assert_traffic_conserved(&self) {
        let artifacts = self.stores.artifacts.list_by_task(self.task_id).await.unwrap();
        let sum: f64 = artifacts
            .iter()
            .filter(|a| a.status.is_deployable())
            .map(|a| a.deployment_percentage)
            .sum();
        assert!((sum - 1.0).abs() < 1e-9, "deployment sum was {sum}");
    }
}

#[tokio::test]
async fn start_splits_traffic_at_five_percent() {
    let fx = fixture().await;
    let canary = fx.controller.start(fx.task_id, fx.v2).await.unwrap();

    assert_eq!(canary.stage, RolloutStage::Canary5);
    assert_eq!(canary.status, CanaryStatus::InProgress);
    assert_eq!(canary.current_percentage, 0.05);
    assert_eq!(canary.history.len(), 1);
    assert_eq!(canary.history[0].action, CanaryAction::Started);

    let v1 = fx.artifact(fx.v1).await;
    let v2 = fx.artifact(fx.v2).await;
    assert!((v1.deployment_percentage - 0.95).abs() < 1e-9);
    assert!((v2.deployment_percentage - 0.05).abs() < 1e-9);
    assert_eq!(v1.status, ArtifactStatus::Active);
    assert_eq!(v2.status, ArtifactStatus::Draft);
    fx.assert_traffic_conserved().await;
}

#[tokio::test]
async fn second_canary_for_task_conflicts() {
    let fx = fixture().await;
    fx.controller.start(fx.task_id, fx.v2).await.unwrap();
    let err = fx.controller.start(fx.task_id, fx.v2).await.unwrap_err();
    assert!(matches!(err, CanaryError::Conflicting));
}

#[tokio::test]
async fn start_requires_active_artifact() {
    let stores = Stores::in_memory();
    let plugins = Arc::new(PluginRegistry::new());
    let comparator = Arc::new(VersionComparator::new(stores.clone()));
    let controller =
        CanaryController::new(stores.clone(), comparator, plugins, CompareConfig::canary());

    let task = stores
        .tasks
        .create(Task::new("bare", "d", json!({}), json!({})))
        .await
        .unwrap();
    let draft = stores
        .artifacts
        .create(ProgramArtifact::new(
            task.id,
            1,
            "result = 1",
            Language::Python,
            SynthesisStrategy::Rule,
        ))
        .await
        .unwrap();

    let err = controller.start(task.id, draft.id).await.unwrap_err();
    assert!(matches!(err, CanaryError::NoActiveArtifact));
}

#[tokio::test]
async fn healthy_canary_progresses_to_completion() {
    let fx = fixture().await;
    let canary = fx.controller.start(fx.task_id, fx.v2).await.unwrap();

    fx.seed_executions(fx.v1, 100, false).await;
    fx.seed_executions(fx.v2, 100, false).await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.stage, RolloutStage::Canary25);
    assert!((fx.artifact(fx.v2).await.deployment_percentage - 0.25).abs() < 1e-9);
    fx.assert_traffic_conserved().await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.stage, RolloutStage::Canary50);
    assert!((fx.artifact(fx.v2).await.deployment_percentage - 0.50).abs() < 1e-9);
    fx.assert_traffic_conserved().await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.stage, RolloutStage::Full);
    assert_eq!(c.status, CanaryStatus::InProgress);
    assert!((fx.artifact(fx.v2).await.deployment_percentage - 1.0).abs() < 1e-9);
    fx.assert_traffic_conserved().await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.stage, RolloutStage::Completed);
    assert_eq!(c.status, CanaryStatus::Completed);
    assert!(c.completed_at.is_some());

    let v1 = fx.artifact(fx.v1).await;
    let v2 = fx.artifact(fx.v2).await;
    assert_eq!(v2.status, ArtifactStatus::Active);
    assert_eq!(v2.deployment_percentage, 1.0);
    assert_eq!(v1.status, ArtifactStatus::Deprecated);
    assert_eq!(v1.deployment_percentage, 0.0);

    let promotions = c
        .history
        .iter()
        .filter(|h| h.action == CanaryAction::Promoted)
        .count();
    assert_eq!(promotions, 4);
    fx.assert_traffic_conserved().await;

    // Terminal: no further progress.
    assert!(fx.controller.progress(canary.id).await.is_err());
}

#[tokio::test]
async fn error_spike_rolls_back() {
    let fx = fixture().await;
    let canary = fx.controller.start(fx.task_id, fx.v2).await.unwrap();

    fx.seed_executions(fx.v1, 100, false).await;
    fx.seed_executions(fx.v2, 60, true).await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.status, CanaryStatus::RolledBack);
    assert!(c.completed_at.is_some());
    assert_eq!(
        c.history.last().unwrap().action,
        CanaryAction::RolledBack
    );

    let v1 = fx.artifact(fx.v1).await;
    let v2 = fx.artifact(fx.v2).await;
    assert_eq!(v1.deployment_percentage, 1.0);
    assert_eq!(v1.status, ArtifactStatus::Active);
    assert_eq!(v2.deployment_percentage, 0.0);
    fx.assert_traffic_conserved().await;

    // Rollback is terminal.
    assert!(fx.controller.progress(canary.id).await.is_err());
    assert!(fx.controller.rollback(canary.id, "again").await.is_err());
}

#[tokio::test]
async fn thin_treatment_sample_pauses_then_resumes() {
    let fx = fixture().await;
    let canary = fx.controller.start(fx.task_id, fx.v2).await.unwrap();

    fx.seed_executions(fx.v1, 100, false).await;
    fx.seed_executions(fx.v2, 10, false).await;

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.status, CanaryStatus::Paused);
    assert_eq!(c.stage, RolloutStage::Canary5);
    assert_eq!(c.status_reason.as_deref(), Some("insufficient samples"));
    // Pause leaves traffic untouched.
    assert!((fx.artifact(fx.v2).await.deployment_percentage - 0.05).abs() < 1e-9);

    // More traffic lands, the canary resumes and can advance.
    fx.seed_executions(fx.v2, 90, false).await;
    let c = fx.controller.resume(canary.id).await.unwrap();
    assert_eq!(c.status, CanaryStatus::InProgress);

    let c = fx.controller.progress(canary.id).await.unwrap();
    assert_eq!(c.stage, RolloutStage::Canary25);
}

#[tokio::test]
async fn evaluate_never_fails_on_empty_history() {
    let fx = fixture().await;
    let canary = fx.controller.start(fx.task_id, fx.v2).await.unwrap();

    let evaluation = fx.controller.evaluate(canary.id).await.unwrap();
    assert!(matches!(
        evaluation.outcome,
        EvaluationOutcome::Pause(_)
    ));
}

#[tokio::test]
async fn new_artifact_must_belong_to_task() {
    let fx = fixture().await;
    let other_task = fx
        .stores
        .tasks
        .create(Task::new("other", "d", json!({}), json!({})))
        .await
        .unwrap();
    let stray = fx
        .stores
        .artifacts
        .create(ProgramArtifact::new(
            other_task.id,
            1,
            "result = 1",
            Language::Python,
            SynthesisStrategy::Rule,
        ))
        .await
        .unwrap();

    let err = fx.controller.start(fx.task_id, stray.id).await.unwrap_err();
    assert!(matches!(err, CanaryError::InvalidState(_)));
}

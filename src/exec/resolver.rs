//! Serving-artifact resolution.
//!
//! The one place traffic splitting is realized: a uniform random draw
//! over deployment percentages picks which artifact serves a request.
//! Nothing above or below this resolver knows a canary exists.

use rand::Rng;
use thiserror::Error;

use crate::domain::{ProgramArtifact, TaskId};
use crate::store::{StoreError, Stores};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no artifact is serving this task")]
    NoActiveArtifact,

    #[error("artifact version not found")]
    VersionNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Picks the artifact that serves one request.
pub struct ArtifactResolver {
    stores: Stores,
}

impl ArtifactResolver {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Resolve an explicit version, or draw from the serving set weighted
    /// by deployment percentage.
    pub async fn resolve(
        &self,
        task_id: TaskId,
        version: Option<u32>,
    ) -> Result<ProgramArtifact, ResolveError> {
        if let Some(version) = version {
            return self
                .stores
                .artifacts
                .get_by_task_and_version(task_id, version)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound(_) => ResolveError::VersionNotFound,
                    other => ResolveError::Store(other),
                });
        }

        let serving: Vec<ProgramArtifact> = self
            .stores
            .artifacts
            .list_by_task(task_id)
            .await?
            .into_iter()
            .filter(|a| a.is_serving())
            .collect();

        if serving.is_empty() {
            return Err(ResolveError::NoActiveArtifact);
        }

        let roll: f64 = rand::thread_rng().gen();
        Ok(weighted_pick(&serving, roll).clone())
    }
}

/// Map a uniform roll in [0, 1) onto cumulative deployment percentages.
pub fn weighted_pick(artifacts: &[ProgramArtifact], roll: f64) -> &ProgramArtifact {
    let total: f64 = artifacts.iter().map(|a| a.deployment_percentage).sum();
    let target = roll * total;
    let mut cumulative = 0.0;
    for artifact in artifacts {
        cumulative += artifact.deployment_percentage;
        if target < cumulative {
            return artifact;
        }
    }
    // Fallback: float accumulation can leave the last boundary unreached.
    &artifacts[artifacts.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactStatus, Language, SynthesisStrategy, Task};
    use serde_json::json;

    fn artifact(task_id: TaskId, version: u32, percentage: f64) -> ProgramArtifact {
        let mut artifact = ProgramArtifact::new(
            task_id,
            version,
            "result = input_data",
            Language::Python,
            SynthesisStrategy::Rule,
        );
        artifact.status = if version == 1 {
            ArtifactStatus::Active
        } else {
            ArtifactStatus::Draft
        };
        artifact.deployment_percentage = percentage;
        artifact
    }

    #[test]
    fn weighted_pick_respects_boundaries() {
        let task_id = TaskId::generate();
        let pair = vec![artifact(task_id, 1, 0.95), artifact(task_id, 2, 0.05)];

        assert_eq!(weighted_pick(&pair, 0.0).version, 1);
        assert_eq!(weighted_pick(&pair, 0.9499).version, 1);
        assert_eq!(weighted_pick(&pair, 0.9501).version, 2);
        assert_eq!(weighted_pick(&pair, 0.9999).version, 2);
    }

    #[test]
    fn weighted_pick_single_artifact_always_wins() {
        let task_id = TaskId::generate();
        let only = vec![artifact(task_id, 1, 1.0)];
        for roll in [0.0, 0.5, 0.9999] {
            assert_eq!(weighted_pick(&only, roll).version, 1);
        }
    }

    #[tokio::test]
    async fn resolve_prefers_explicit_version() {
        let stores = Stores::in_memory();
        let task = stores
            .tasks
            .create(Task::new("t", "d", json!({}), json!({})))
            .await
            .unwrap();
        stores
            .artifacts
            .create(artifact(task.id, 1, 1.0))
            .await
            .unwrap();
        // Not serving, but reachable by explicit version.
        stores
            .artifacts
            .create(artifact(task.id, 2, 0.0))
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(stores);
        let resolved = resolver.resolve(task.id, Some(2)).await.unwrap();
        assert_eq!(resolved.version, 2);

        let err = resolver.resolve(task.id, Some(9)).await.unwrap_err();
        assert!(matches!(err, ResolveError::VersionNotFound));
    }

    #[tokio::test]
    async fn resolve_without_serving_artifacts_fails() {
        let stores = Stores::in_memory();
        let task = stores
            .tasks
            .create(Task::new("t", "d", json!({}), json!({})))
            .await
            .unwrap();
        stores
            .artifacts
            .create(artifact(task.id, 2, 0.0))
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(stores);
        let err = resolver.resolve(task.id, None).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoActiveArtifact));
    }

    #[tokio::test]
    async fn resolve_draws_cover_both_sides_of_a_split() {
        let stores = Stores::in_memory();
        let task = stores
            .tasks
            .create(Task::new("t", "d", json!({}), json!({})))
            .await
            .unwrap();
        stores
            .artifacts
            .create(artifact(task.id, 1, 0.5))
            .await
            .unwrap();
        stores
            .artifacts
            .create(artifact(task.id, 2, 0.5))
            .await
            .unwrap();

        let resolver = ArtifactResolver::new(stores);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(resolver.resolve(task.id, None).await.unwrap().version);
        }
        assert_eq!(seen.len(), 2, "both versions should serve under a 50/50 split");
    }
}

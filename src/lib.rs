//! Loopai Core - program-artifact execution control plane.
//!
//! Drives the lifecycle of auto-generated, deterministic programs that
//! substitute for LLM inference: executes them in pooled sandbox
//! sessions, shadow-validates sampled outputs against an oracle, and
//! rolls improved versions in through a statistically gated canary
//! pipeline with automatic rollback.
//!
//! # Boundaries
//!
//! The crate is the engine only. The LLM-backed program synthesizer, the
//! oracle, HTTP surface, persistence technology, webhook delivery, and
//! metrics exporters all live outside, behind the narrow contracts in
//! [`improve::ProgramGenerator`], [`store`], [`plugins`], and the
//! `metrics` facade.

pub mod canary;
pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod health;
pub mod improve;
pub mod plugins;
pub mod sampling;
pub mod sandbox;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod validation;

mod api;

pub use api::{NewArtifact, NewTask};
pub use config::RuntimeConfig;
pub use error::CoreError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use canary::CanaryController;
use exec::{BatchExecutor, Executor};
use improve::{ImprovementOrchestrator, ProgramGenerator, RetryingGenerator};
use plugins::PluginRegistry;
use sampling::{FeedbackStore, SamplingCoordinator};
use sandbox::client::AdapterClient;
use sandbox::pool::SessionPool;
use stats::{CompareConfig, VersionComparator};
use store::Stores;
use validation::OracleValidator;

/// Generator retry policy used by the improvement loop.
const GENERATION_ATTEMPTS: u32 = 3;
const GENERATION_BACKOFF: Duration = Duration::from_secs(1);

/// The assembled control plane.
pub struct Runtime {
    pub config: RuntimeConfig,
    pub stores: Stores,
    pub adapter: Arc<AdapterClient>,
    pub pool: SessionPool,
    pub plugins: Arc<PluginRegistry>,
    pub sampling: Arc<SamplingCoordinator>,
    pub executor: Arc<Executor>,
    pub batch: BatchExecutor,
    pub validator: Arc<OracleValidator>,
    pub comparator: Arc<VersionComparator>,
    pub canary: Arc<CanaryController>,
    pub improvement: Arc<ImprovementOrchestrator>,
    started_at: Instant,
}

impl Runtime {
    /// Wire every component over the given repositories, adapter
    /// connection, and program synthesizer.
    pub fn new(
        config: RuntimeConfig,
        stores: Stores,
        adapter: Arc<AdapterClient>,
        generator: Arc<dyn ProgramGenerator>,
    ) -> Self {
        let plugins = Arc::new(PluginRegistry::new());
        let feedback = Arc::new(FeedbackStore::new(config.sampling.feedback_capacity));
        let default_sampler = config.sampling.strategy.build(feedback.clone());
        let sampling = Arc::new(SamplingCoordinator::new(
            default_sampler,
            plugins.clone(),
            feedback,
            stores.executions.clone(),
        ));

        let pool = SessionPool::new(adapter.clone(), config.pool.clone());
        let executor = Arc::new(Executor::new(
            stores.clone(),
            pool.clone(),
            sampling.clone(),
            config.executor.clone(),
        ));
        let batch = BatchExecutor::new(stores.clone(), executor.clone());

        let validator = Arc::new(OracleValidator::new(
            stores.clone(),
            plugins.clone(),
            sampling.clone(),
        ));
        let comparator = Arc::new(VersionComparator::new(stores.clone()));
        let canary = Arc::new(CanaryController::new(
            stores.clone(),
            comparator.clone(),
            plugins.clone(),
            CompareConfig::canary(),
        ));

        let generator: Arc<dyn ProgramGenerator> = Arc::new(RetryingGenerator::new(
            generator,
            GENERATION_ATTEMPTS,
            GENERATION_BACKOFF,
        ));
        let improvement = Arc::new(ImprovementOrchestrator::new(
            stores.clone(),
            generator,
            canary.clone(),
            config.improvement.clone(),
        ));

        Self {
            config,
            stores,
            adapter,
            pool,
            plugins,
            sampling,
            executor,
            batch,
            validator,
            comparator,
            canary,
            improvement,
            started_at: Instant::now(),
        }
    }

    /// Start the background loops: session reaping and improvement
    /// watching. Cancel the token to stop them all.
    pub fn spawn_background(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            self.pool.spawn_cleanup(cancel.clone()),
            self.improvement.spawn_watcher(cancel),
        ]
    }

    pub(crate) fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

//! Metrics collection for the execution control plane.
//!
//! Uses the `metrics` facade - no exporters included; the embedder picks
//! a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::domain::{ArtifactId, ExecutionStatus, Language};

/// Initialize metric descriptions.
///
/// Call once at startup to register metric metadata.
pub fn init_metrics() {
    describe_counter!("loopai_executions_total", "Total program executions");
    describe_counter!(
        "loopai_executions_failed",
        "Executions that ended in error or timeout"
    );
    describe_counter!(
        "loopai_executions_sampled",
        "Executions selected for oracle validation"
    );
    describe_histogram!(
        "loopai_execution_latency_ms",
        "Program execution latency in milliseconds"
    );

    describe_counter!("loopai_validations_total", "Validation verdicts recorded");
    describe_counter!("loopai_validations_failed", "Invalid validation verdicts");
    describe_histogram!("loopai_validation_score", "Validation scores");

    describe_counter!(
        "loopai_canary_transitions_total",
        "Canary state transitions by kind"
    );
    describe_counter!(
        "loopai_improvement_attempts_total",
        "Regeneration attempts started"
    );

    describe_counter!("loopai_sessions_created_total", "Sandbox sessions created");
    describe_counter!(
        "loopai_sessions_reaped_total",
        "Expired sandbox sessions closed"
    );
    describe_gauge!("loopai_pool_sessions", "Live sandbox sessions");
}

/// Record one finished execution.
pub fn record_execution(
    program_id: ArtifactId,
    status: ExecutionStatus,
    latency_ms: u64,
    sampled: bool,
) {
    let program = program_id.to_string();
    counter!("loopai_executions_total", "program" => program.clone()).increment(1);
    if status != ExecutionStatus::Success {
        counter!(
            "loopai_executions_failed",
            "program" => program.clone(),
            "status" => format!("{status:?}")
        )
        .increment(1);
    }
    if sampled {
        counter!("loopai_executions_sampled", "program" => program.clone()).increment(1);
    }
    histogram!("loopai_execution_latency_ms", "program" => program).record(latency_ms as f64);
}

/// Record one validation verdict.
pub fn record_validation(program_id: ArtifactId, is_valid: bool, score: f64) {
    let program = program_id.to_string();
    counter!("loopai_validations_total", "program" => program.clone()).increment(1);
    if !is_valid {
        counter!("loopai_validations_failed", "program" => program.clone()).increment(1);
    }
    histogram!("loopai_validation_score", "program" => program).record(score);
}

/// Record a canary transition (started, promoted, paused, rolled_back).
pub fn record_canary_transition(kind: &str) {
    counter!("loopai_canary_transitions_total", "kind" => kind.to_string()).increment(1);
}

/// Record the start of an improvement attempt.
pub fn record_improvement_attempt() {
    counter!("loopai_improvement_attempts_total").increment(1);
}

/// Record a sandbox session creation.
pub fn record_session_created(language: Language) {
    counter!("loopai_sessions_created_total", "language" => language.to_string()).increment(1);
}

/// Record expired sessions reaped by the pool cleanup loop.
pub fn record_sessions_reaped(count: usize) {
    counter!("loopai_sessions_reaped_total").increment(count as u64);
}

/// Record current pool occupancy.
pub fn record_pool_sessions(total: usize) {
    gauge!("loopai_pool_sessions").set(total as f64);
}

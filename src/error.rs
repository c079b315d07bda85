// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boundary error taxonomy.
//!
//! Module-level errors stay precise inside the crate; everything that
//! crosses the API surface maps onto these kinds. Repository errors
//! surface as `Internal` unless they map cleanly to `NotFound`.

use thiserror::Error;

use crate::canary::CanaryError;
use crate::exec::ExecError;
use crate::improve::ImproveError;
use crate::sandbox::protocol::AdapterError;
use crate::stats::CompareError;
use crate::store::StoreError;
use crate::validation::ValidateError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("sandbox adapter error: {0}")]
    Adapter(String),

    #[error("operation timed out")]
    Timeout,

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("conflicting canary deployment: {0}")]
    ConflictingCanary(String),

    #[error("session pool exhausted")]
    PoolExhausted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => CoreError::NotFound(what.to_string()),
            StoreError::Conflict(detail) => CoreError::ValidationFailed(detail),
            StoreError::Internal(detail) => CoreError::Internal(detail),
        }
    }
}

impl From<ExecError> for CoreError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::TaskNotFound => CoreError::NotFound("task".into()),
            ExecError::NoActiveArtifact => CoreError::NotFound("active artifact".into()),
            ExecError::VersionNotFound => CoreError::NotFound("artifact version".into()),
            ExecError::PoolExhausted => CoreError::PoolExhausted,
            ExecError::Invalid(detail) => CoreError::ValidationFailed(detail),
            ExecError::Store(store) => store.into(),
        }
    }
}

impl From<CanaryError> for CoreError {
    fn from(e: CanaryError) -> Self {
        match e {
            CanaryError::NoActiveArtifact => CoreError::NotFound("active artifact".into()),
            CanaryError::Conflicting => {
                CoreError::ConflictingCanary("task already has an open deployment".into())
            }
            CanaryError::InvalidState(detail) => CoreError::ValidationFailed(detail),
            CanaryError::Store(store) => store.into(),
        }
    }
}

impl From<AdapterError> for CoreError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Timeout => CoreError::Timeout,
            AdapterError::Execution(detail) => CoreError::ExecutionFailed(detail),
            other => CoreError::Adapter(other.to_string()),
        }
    }
}

impl From<ValidateError> for CoreError {
    fn from(e: ValidateError) -> Self {
        match e {
            ValidateError::Store(store) => store.into(),
        }
    }
}

impl From<CompareError> for CoreError {
    fn from(e: CompareError) -> Self {
        match e {
            CompareError::Store(store) => store.into(),
        }
    }
}

impl From<ImproveError> for CoreError {
    fn from(e: ImproveError) -> Self {
        match e {
            ImproveError::Store(store) => store.into(),
            ImproveError::Canary(canary) => canary.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: CoreError = StoreError::NotFound("task").into();
        assert!(matches!(err, CoreError::NotFound(_)));

        let err: CoreError = StoreError::Internal("io".into()).into();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn exec_errors_keep_their_kind() {
        assert!(matches!(
            CoreError::from(ExecError::TaskNotFound),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            CoreError::from(ExecError::PoolExhausted),
            CoreError::PoolExhausted
        ));
        assert!(matches!(
            CoreError::from(ExecError::Invalid("bad".into())),
            CoreError::ValidationFailed(_)
        ));
    }

    #[test]
    fn canary_conflict_is_its_own_kind() {
        assert!(matches!(
            CoreError::from(CanaryError::Conflicting),
            CoreError::ConflictingCanary(_)
        ));
    }

    #[test]
    fn adapter_timeout_maps_to_timeout() {
        assert!(matches!(
            CoreError::from(AdapterError::Timeout),
            CoreError::Timeout
        ));
    }
}

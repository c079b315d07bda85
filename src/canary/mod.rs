// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Staged canary rollouts with evaluate-and-progress/rollback control.

mod controller;

pub use controller::{CanaryController, CanaryError, CanaryEvaluation, EvaluationOutcome};

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Improvement loop: regenerate failing artifacts and canary them in.

mod generator;
mod orchestrator;

pub use generator::{
    GeneratedComplexity, GeneratedProgram, GenerationRequest, GeneratorError, ProgramGenerator,
    RetryingGenerator,
};
pub use orchestrator::{ImprovementConfig, ImprovementOrchestrator, ImproveError};

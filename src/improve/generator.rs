// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outbound contract to the external program synthesizer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Language, TaskExample, TaskId};

/// What the synthesizer needs to produce a program.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub task_id: TaskId,
    pub task_name: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub description: String,
    pub examples: Vec<TaskExample>,
    /// Free-form guidance, e.g. a digest of recent validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    pub target_runtime: Language,
}

/// Static complexity the synthesizer reports with its program.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GeneratedComplexity {
    pub lines_of_code: u32,
    pub cyclomatic_complexity: u32,
    pub estimated_tokens: u32,
}

/// A successfully synthesized program.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedProgram {
    pub code: String,
    pub language: Language,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub complexity: GeneratedComplexity,
}

#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The synthesizer answered but could not produce a program.
    #[error("generation failed: {0}")]
    Failed(String),

    /// The synthesizer was unreachable or misbehaved.
    #[error("generator transport error: {0}")]
    Transport(String),
}

/// The external LLM-backed program synthesizer.
#[async_trait]
pub trait ProgramGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GeneratedProgram, GeneratorError>;
}

#[async_trait]
impl<G: ProgramGenerator + ?Sized> ProgramGenerator for std::sync::Arc<G> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedProgram, GeneratorError> {
        (**self).generate(request).await
    }
}

/// Wraps a generator with exponential-backoff retries.
pub struct RetryingGenerator<G> {
    inner: G,
    max_attempts: u32,
    base_backoff: Duration,
}

impl<G: ProgramGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_backoff,
        }
    }
}

#[async_trait]
impl<G: ProgramGenerator> ProgramGenerator for RetryingGenerator<G> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedProgram, GeneratorError> {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let backoff = self.base_backoff * 2u32.pow(attempt - 1);
                tracing::debug!(
                    "generator: retry {attempt}/{} after {backoff:?}",
                    self.max_attempts - 1
                );
                tokio::time::sleep(backoff).await;
            }
            match self.inner.generate(request).await {
                Ok(program) => return Ok(program),
                Err(e) => {
                    tracing::warn!("generator: attempt {} failed: {e}", attempt + 1);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| GeneratorError::Transport("no attempts made".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyGenerator {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
    }

    #[async_trait]
    impl ProgramGenerator for FlakyGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GeneratedProgram, GeneratorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(GeneratedProgram {
                    code: "result = input_data".into(),
                    language: Language::Python,
                    metadata: Value::Null,
                    complexity: GeneratedComplexity::default(),
                })
            } else {
                Err(GeneratorError::Transport("connection reset".into()))
            }
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            task_id: TaskId::generate(),
            task_name: "t".into(),
            input_schema: serde_json::json!({}),
            output_schema: serde_json::json!({}),
            description: "d".into(),
            examples: Vec::new(),
            constraints: None,
            target_runtime: Language::Python,
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            FlakyGenerator {
                calls: calls.clone(),
                succeed_on: 3,
            },
            3,
            Duration::from_millis(1),
        );

        let program = generator.generate(&request()).await.unwrap();
        assert_eq!(program.language, Language::Python);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let generator = RetryingGenerator::new(
            FlakyGenerator {
                calls: calls.clone(),
                succeed_on: 10,
            },
            3,
            Duration::from_millis(1),
        );

        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

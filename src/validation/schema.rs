// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Output-schema evaluation with per-task compiled-schema caching.

use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::domain::{Task, TaskId, ValidationErrorDetail};

/// Compiles each task's output schema once and reuses it. Task schemas are
/// immutable, so entries never invalidate.
#[derive(Default)]
pub struct SchemaCache {
    compiled: DashMap<TaskId, Arc<JSONSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate an output against the task's output schema. A schema that
    /// fails to compile is itself reported as a structural error.
    pub fn evaluate(&self, task: &Task, output: &Value) -> Vec<ValidationErrorDetail> {
        let compiled = match self.compiled.get(&task.id) {
            Some(entry) => entry.clone(),
            None => match JSONSchema::compile(&task.output_schema) {
                Ok(schema) => {
                    let schema = Arc::new(schema);
                    self.compiled.insert(task.id, schema.clone());
                    schema
                }
                Err(e) => {
                    return vec![ValidationErrorDetail::new(
                        "invalid_schema",
                        "",
                        format!("output schema does not compile: {e}"),
                    )];
                }
            },
        };

        let result = match compiled.validate(output) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| {
                    ValidationErrorDetail::new(
                        "schema_violation",
                        error.instance_path.to_string(),
                        error.to_string(),
                    )
                })
                .collect(),
        };
        result
    }
}

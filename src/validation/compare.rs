// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deep structural comparison of an actual output against an expected one.
//!
//! Objects require every expected key (extras tolerated), arrays require
//! equal length with element-wise comparison, numbers compare by raw text,
//! other primitives by equality.

use serde_json::Value;

use crate::domain::ValidationErrorDetail;

/// Compare `actual` against `expected`, returning every discrepancy.
pub fn compare_values(expected: &Value, actual: &Value) -> Vec<ValidationErrorDetail> {
    let mut errors = Vec::new();
    compare_at("", expected, actual, &mut errors);
    errors
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn compare_at(path: &str, expected: &Value, actual: &Value, errors: &mut Vec<ValidationErrorDetail>) {
    if std::mem::discriminant(expected) != std::mem::discriminant(actual) {
        errors.push(
            ValidationErrorDetail::new(
                "type_mismatch",
                path,
                format!(
                    "expected {} but found {}",
                    kind_name(expected),
                    kind_name(actual)
                ),
            )
            .with_values(expected.clone(), actual.clone()),
        );
        return;
    }

    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            for (key, expected_child) in expected_map {
                let child_path = format!("{path}/{key}");
                match actual_map.get(key) {
                    Some(actual_child) => {
                        compare_at(&child_path, expected_child, actual_child, errors)
                    }
                    None => errors.push(ValidationErrorDetail::new(
                        "missing_property",
                        child_path,
                        format!("expected property '{key}' is absent"),
                    )),
                }
            }
            // Extra keys in actual are tolerated.
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if expected_items.len() != actual_items.len() {
                errors.push(
                    ValidationErrorDetail::new(
                        "length_mismatch",
                        path,
                        format!(
                            "expected {} elements but found {}",
                            expected_items.len(),
                            actual_items.len()
                        ),
                    )
                    .with_values(expected.clone(), actual.clone()),
                );
                return;
            }
            for (index, (expected_child, actual_child)) in
                expected_items.iter().zip(actual_items).enumerate()
            {
                compare_at(&format!("{path}/{index}"), expected_child, actual_child, errors);
            }
        }
        (Value::Number(expected_n), Value::Number(actual_n)) => {
            // Raw text equality sidesteps float representation drift.
            if expected_n.to_string() != actual_n.to_string() {
                errors.push(
                    ValidationErrorDetail::new("value_mismatch", path, "numbers differ")
                        .with_values(expected.clone(), actual.clone()),
                );
            }
        }
        (expected, actual) => {
            if expected != actual {
                errors.push(
                    ValidationErrorDetail::new("value_mismatch", path, "values differ")
                        .with_values(expected.clone(), actual.clone()),
                );
            }
        }
    }
}

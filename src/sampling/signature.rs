// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structural signatures over JSON inputs.
//!
//! Samplers reason about inputs through two lenses: the flattened set of
//! property paths (for overlap comparisons) and a coarse complexity
//! stratum (for partition counting).

use std::collections::BTreeSet;

use serde_json::Value;

/// Complexity stratum by property count: 0, ≤1, ≤5, >5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stratum {
    Empty,
    Simple,
    Moderate,
    Complex,
}

impl Stratum {
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => Stratum::Empty,
            1 => Stratum::Simple,
            2..=5 => Stratum::Moderate,
            _ => Stratum::Complex,
        }
    }

    pub const ALL: [Stratum; 4] = [
        Stratum::Empty,
        Stratum::Simple,
        Stratum::Moderate,
        Stratum::Complex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stratum::Empty => "empty",
            Stratum::Simple => "simple",
            Stratum::Moderate => "moderate",
            Stratum::Complex => "complex",
        }
    }
}

/// Flattened set of property paths in an input (`a.b`, `items.0.name`).
pub fn property_set(input: &Value) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    collect_paths(input, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                out.insert(path.clone());
                collect_paths(child, &path, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = if prefix.is_empty() {
                    index.to_string()
                } else {
                    format!("{prefix}.{index}")
                };
                collect_paths(child, &path, out);
            }
        }
        _ => {}
    }
}

/// The stratum an input falls into.
pub fn stratum_of(input: &Value) -> Stratum {
    Stratum::for_count(property_set(input).len())
}

/// Jaccard overlap of two property sets: |A∩B| / |A∪B|.
/// Two empty sets overlap fully.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

const MAGNITUDE_HIGH: f64 = 1e6;
const MAGNITUDE_LOW: f64 = 1e-4;

/// Whether a single leaf value is an edge case.
pub fn is_edge_leaf(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => {
            let v = n.as_f64().unwrap_or(0.0);
            v == 0.0 || v.abs() > MAGNITUDE_HIGH || (v != 0.0 && v.abs() < MAGNITUDE_LOW)
        }
        Value::Bool(_) => false,
    }
}

/// Whether any leaf of the input is an edge case.
pub fn has_edge_case(input: &Value) -> bool {
    match input {
        Value::Object(map) => {
            map.is_empty() || map.values().any(has_edge_case)
        }
        Value::Array(items) => {
            items.is_empty() || items.iter().any(has_edge_case)
        }
        leaf => is_edge_leaf(leaf),
    }
}

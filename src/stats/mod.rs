// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Statistical comparison of two artifact versions.

mod comparator;
mod metrics;

pub use comparator::{
    AbTestReport, CompareConfig, CompareError, Confidence, Recommendation, VersionComparator,
};
pub use metrics::{percentile, VersionMetrics};

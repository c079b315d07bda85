// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime health reporting.

use serde::Serialize;

use crate::sandbox::pool::PoolStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Point-in-time health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: HealthState,
    #[serde(skip)]
    pub pool: PoolStatistics,
    pub task_count: usize,
    pub uptime_secs: u64,
}

impl HealthReport {
    /// Adapter down means unhealthy; a saturated pool means degraded.
    pub fn assess(
        adapter_closed: bool,
        pool: PoolStatistics,
        task_count: usize,
        uptime_secs: u64,
    ) -> Self {
        let state = if adapter_closed {
            HealthState::Unhealthy
        } else if pool.available_slots == 0 && pool.idle_sessions == 0 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };
        Self {
            state,
            pool,
            task_count,
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pool(available_slots: usize, idle: usize) -> PoolStatistics {
        PoolStatistics {
            total_sessions: 2,
            active_sessions: 2 - idle,
            idle_sessions: idle,
            available_slots,
            avg_execution_count: 0.0,
            oldest_age: Duration::ZERO,
        }
    }

    #[test]
    fn closed_adapter_is_unhealthy() {
        let report = HealthReport::assess(true, pool(4, 1), 0, 1);
        assert_eq!(report.state, HealthState::Unhealthy);
    }

    #[test]
    fn saturated_pool_is_degraded() {
        let report = HealthReport::assess(false, pool(0, 0), 3, 1);
        assert_eq!(report.state, HealthState::Degraded);
    }

    #[test]
    fn idle_capacity_is_healthy() {
        let report = HealthReport::assess(false, pool(0, 1), 3, 1);
        assert_eq!(report.state, HealthState::Healthy);
    }
}

// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sandbox layer: the adapter wire protocol, the client that speaks it,
//! per-language execution harnesses, and the reusable session pool.

pub mod client;
pub mod harness;
pub mod loopback;
pub mod pool;
pub mod protocol;
pub mod session;

pub use client::{AdapterClient, AdapterConfig};
pub use harness::{wrap_source, LanguageProfile, INPUT_PATH, OUTPUT_PATH};
pub use loopback::{spawn_loopback_executor, LoopbackExecutor, ProgramHost};
pub use pool::{PoolConfig, PoolError, PoolStatistics, SessionLease, SessionPool};
pub use protocol::{AdapterError, SandboxCommand, ShellResult};
pub use session::SessionState;

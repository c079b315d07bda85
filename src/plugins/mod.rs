// Copyright 2025-2026 Loopai Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed, priority-ordered plugin registry.
//!
//! A multimap from plugin kind to handles, safe under concurrent
//! register/list. List operations return snapshots so iteration never
//! observes a mid-flight mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Task, ValidationErrorDetail};
use crate::sampling::Sampler;

/// Extension point: extra output checks run during validation.
pub trait ValidatorPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn validate(&self, task: &Task, output: &Value) -> Vec<ValidationErrorDetail>;
}

/// Extension point: lifecycle event observer (webhook emitters live here).
pub trait EventHook: Send + Sync {
    fn on_event(&self, event: &str, payload: &Value);
}

/// The registry's typed payloads.
#[derive(Clone)]
pub enum PluginPayload {
    Validator(Arc<dyn ValidatorPlugin>),
    Sampler(Arc<dyn Sampler>),
    WebhookHandler(Arc<dyn EventHook>),
}

impl PluginPayload {
    fn kind(&self) -> PluginKind {
        match self {
            PluginPayload::Validator(_) => PluginKind::Validator,
            PluginPayload::Sampler(_) => PluginKind::Sampler,
            PluginPayload::WebhookHandler(_) => PluginKind::WebhookHandler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Validator,
    Sampler,
    WebhookHandler,
}

/// One registered plugin.
#[derive(Clone)]
pub struct PluginHandle {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub payload: PluginPayload,
}

impl PluginHandle {
    pub fn new(name: impl Into<String>, priority: i32, payload: PluginPayload) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority,
            payload,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn kind(&self) -> PluginKind {
        self.payload.kind()
    }
}

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin already registered: {0}")]
    Duplicate(String),

    #[error("plugin not found: {0}")]
    NotFound(String),
}

/// Thread-safe plugin registry.
#[derive(Default)]
pub struct PluginRegistry {
    inner: RwLock<HashMap<PluginKind, Vec<PluginHandle>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. Names are unique per kind, not globally.
    pub fn register(&self, handle: PluginHandle) -> Result<(), PluginError> {
        let mut inner = self.inner.write();
        let duplicate = inner
            .get(&handle.kind())
            .map(|handles| handles.iter().any(|existing| existing.name == handle.name))
            .unwrap_or(false);
        if duplicate {
            return Err(PluginError::Duplicate(handle.name));
        }
        inner.entry(handle.kind()).or_default().push(handle);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<(), PluginError> {
        let mut inner = self.inner.write();
        for handles in inner.values_mut() {
            if let Some(index) = handles.iter().position(|h| h.name == name) {
                handles.remove(index);
                return Ok(());
            }
        }
        Err(PluginError::NotFound(name.to_string()))
    }

    pub fn resolve(&self, name: &str) -> Option<PluginHandle> {
        self.inner
            .read()
            .values()
            .flatten()
            .find(|h| h.name == name)
            .cloned()
    }

    /// Snapshot of one kind's handles, highest priority first.
    pub fn list(&self, kind: PluginKind, enabled_only: bool) -> Vec<PluginHandle> {
        let mut handles: Vec<PluginHandle> = self
            .inner
            .read()
            .get(&kind)
            .map(|handles| {
                handles
                    .iter()
                    .filter(|h| !enabled_only || h.enabled)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        handles.sort_by_key(|h| std::cmp::Reverse(h.priority));
        handles
    }

    /// Highest-priority enabled sampler, if any is registered.
    pub fn first_sampler(&self) -> Option<Arc<dyn Sampler>> {
        self.list(PluginKind::Sampler, true)
            .into_iter()
            .find_map(|h| match h.payload {
                PluginPayload::Sampler(sampler) => Some(sampler),
                _ => None,
            })
    }

    /// All enabled validator plugins, highest priority first.
    pub fn validators(&self) -> Vec<Arc<dyn ValidatorPlugin>> {
        self.list(PluginKind::Validator, true)
            .into_iter()
            .filter_map(|h| match h.payload {
                PluginPayload::Validator(validator) => Some(validator),
                _ => None,
            })
            .collect()
    }

    /// Fan one event out to every enabled hook.
    pub fn emit_event(&self, event: &str, payload: &Value) {
        for handle in self.list(PluginKind::WebhookHandler, true) {
            if let PluginPayload::WebhookHandler(hook) = handle.payload {
                hook.on_event(event, payload);
            }
        }
    }
}

//! Per-operation override hooks
//!
//! A resource type customizes request and response shaping by registering
//! hooks in a [`ResourceHooks`] table. Per-operation hooks are looked up by
//! operation name; the generic hooks run for every operation.

use super::Resource;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Rewrite the parameters of one operation before identifiers are injected
pub type UpdateParamsHook =
    Arc<dyn Fn(&Resource, Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// Replace or mutate the result of one operation before attribute promotion
pub type PostProcessHook = Arc<dyn Fn(&mut Resource, Value) -> Value + Send + Sync>;

/// Generic form of [`UpdateParamsHook`], also given the operation name
pub type GenericUpdateParamsHook =
    Arc<dyn Fn(&Resource, &str, Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// Generic form of [`PostProcessHook`], also given the operation name
pub type GenericPostProcessHook = Arc<dyn Fn(&mut Resource, &str, Value) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct ResourceHooks {
    update_params: HashMap<String, UpdateParamsHook>,
    post_process: HashMap<String, PostProcessHook>,
    update_params_all: Option<GenericUpdateParamsHook>,
    post_process_all: Option<GenericPostProcessHook>,
}

impl ResourceHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `update_params_<operation>`
    pub fn on_update_params<F>(mut self, operation: &str, hook: F) -> Self
    where
        F: Fn(&Resource, Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.update_params.insert(operation.to_string(), Arc::new(hook));
        self
    }

    /// Register `post_process_<operation>`
    pub fn on_post_process<F>(mut self, operation: &str, hook: F) -> Self
    where
        F: Fn(&mut Resource, Value) -> Value + Send + Sync + 'static,
    {
        self.post_process.insert(operation.to_string(), Arc::new(hook));
        self
    }

    /// Register a parameter hook that runs for every operation
    pub fn on_any_update_params<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Resource, &str, Map<String, Value>) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.update_params_all = Some(Arc::new(hook));
        self
    }

    /// Register a result hook that runs for every operation
    pub fn on_any_post_process<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Resource, &str, Value) -> Value + Send + Sync + 'static,
    {
        self.post_process_all = Some(Arc::new(hook));
        self
    }

    pub fn update_params_for(&self, operation: &str) -> Option<&UpdateParamsHook> {
        self.update_params.get(operation)
    }

    pub fn post_process_for(&self, operation: &str) -> Option<&PostProcessHook> {
        self.post_process.get(operation)
    }

    pub fn update_params_all(&self) -> Option<&GenericUpdateParamsHook> {
        self.update_params_all.as_ref()
    }

    pub fn post_process_all(&self) -> Option<&GenericPostProcessHook> {
        self.post_process_all.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.update_params.is_empty()
            && self.post_process.is_empty()
            && self.update_params_all.is_none()
            && self.post_process_all.is_none()
    }
}

impl fmt::Debug for ResourceHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut update: Vec<&String> = self.update_params.keys().collect();
        let mut post: Vec<&String> = self.post_process.keys().collect();
        update.sort();
        post.sort();

        f.debug_struct("ResourceHooks")
            .field("update_params", &update)
            .field("post_process", &post)
            .field("update_params_all", &self.update_params_all.is_some())
            .field("post_process_all", &self.post_process_all.is_some())
            .finish()
    }
}

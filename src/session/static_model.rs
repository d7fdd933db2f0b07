//! Static service models
//!
//! A [`StaticService`] is a raw service description loaded from JSON (or
//! built in code) that answers calls from a table of canned responses. It
//! lets the generated bindings be inspected and exercised without a network
//! transport.

use super::{CoreSession, Endpoint, RawOperation, RawResponse, RawService};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// A call the static transport received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub region_name: String,
    pub params: Map<String, Value>,
}

/// JSON-described service with canned responses
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StaticService {
    pub api_version: String,
    #[serde(default = "default_region")]
    pub region_name: String,
    #[serde(default)]
    pub operations: Vec<RawOperation>,
    /// Response bodies keyed by operation API name
    #[serde(default)]
    pub responses: HashMap<String, Value>,
    #[serde(skip)]
    calls: Mutex<Vec<RecordedCall>>,
}

impl StaticService {
    pub fn new(api_version: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            region_name: default_region(),
            ..Default::default()
        }
    }

    /// Load a service model from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let service: StaticService = serde_json::from_str(&content)?;
        tracing::debug!(
            "Loaded static service model {:?} ({} operations)",
            path,
            service.operations.len()
        );
        Ok(service)
    }

    pub fn with_operation(mut self, operation: RawOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_response(mut self, api_name: &str, body: Value) -> Self {
        self.responses.insert(api_name.to_string(), body);
        self
    }

    /// Every call received so far, oldest first
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent call, if any
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl RawService for StaticService {
    fn api_version(&self) -> String {
        self.api_version.clone()
    }

    fn operations(&self) -> &[RawOperation] {
        &self.operations
    }

    fn get_endpoint(&self, region_name: Option<&str>) -> Endpoint {
        Endpoint::new(region_name.unwrap_or(&self.region_name))
    }

    fn invoke(
        &self,
        operation: &RawOperation,
        endpoint: &Endpoint,
        params: &Map<String, Value>,
    ) -> anyhow::Result<RawResponse> {
        tracing::debug!(
            "static invoke: operation={}, region={}",
            operation.name,
            endpoint.region_name
        );

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                operation: operation.name.clone(),
                region_name: endpoint.region_name.clone(),
                params: params.clone(),
            });

        let Some(body) = self.responses.get(&operation.name) else {
            return Err(anyhow::anyhow!(
                "No canned response recorded for operation: {}",
                operation.name
            ));
        };

        Ok(RawResponse::new(Value::Null, body.clone()))
    }
}

/// Session over a set of static services, keyed by service name
#[derive(Default)]
pub struct StaticSession {
    services: RwLock<HashMap<String, Arc<StaticService>>>,
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a service
    pub fn insert(&self, service_name: &str, service: StaticService) -> Arc<StaticService> {
        let service = Arc::new(service);
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_name.to_string(), Arc::clone(&service));
        service
    }

    pub fn with_service(self, service_name: &str, service: StaticService) -> Self {
        self.insert(service_name, service);
        self
    }

    /// Load every `<service>.json` model in a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let session = Self::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(service_name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            session.insert(service_name, StaticService::from_file(&path)?);
        }

        Ok(session)
    }

    /// Typed access to a registered service (for call inspection)
    pub fn service(&self, service_name: &str) -> Option<Arc<StaticService>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service_name)
            .cloned()
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl CoreSession for StaticSession {
    fn get_service(&self, service_name: &str) -> Result<Arc<dyn RawService>> {
        self.service(service_name)
            .map(|service| service as Arc<dyn RawService>)
            .ok_or_else(|| Error::UnknownService(service_name.to_string()))
    }
}

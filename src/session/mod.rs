//! Session and transport capability
//!
//! The binding engine never talks to the network itself. It consumes a
//! [`CoreSession`] that hands out [`RawService`] descriptions, and each raw
//! service knows how to enumerate its operations, resolve an endpoint and
//! invoke an operation with already-marshaled parameters.
//!
//! # Module Structure
//!
//! - [`static_model`] - JSON-described services with canned responses (offline use and tests)

pub mod static_model;

use crate::cache::ServiceCache;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub use static_model::{StaticService, StaticSession};

/// Parameter type as declared by the raw service description
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Blob,
    List,
    Map,
    Structure,
    Other(String),
}

impl From<String> for ParamType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "string" => ParamType::String,
            "integer" | "long" => ParamType::Integer,
            "float" | "double" => ParamType::Float,
            "boolean" => ParamType::Boolean,
            "timestamp" => ParamType::Timestamp,
            "blob" => ParamType::Blob,
            "list" => ParamType::List,
            "map" => ParamType::Map,
            "structure" => ParamType::Structure,
            _ => ParamType::Other(value),
        }
    }
}

impl From<ParamType> for String {
    fn from(value: ParamType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
            ParamType::Timestamp => "timestamp",
            ParamType::Blob => "blob",
            ParamType::List => "list",
            ParamType::Map => "map",
            ParamType::Structure => "structure",
            ParamType::Other(other) => other,
        };
        f.write_str(name)
    }
}

/// A parameter exactly as the transport describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawParam {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub documentation: Option<String>,
}

impl RawParam {
    pub fn new(name: &str, required: bool, param_type: ParamType) -> Self {
        Self {
            name: name.to_string(),
            required,
            param_type,
            documentation: None,
        }
    }

    pub fn with_docs(mut self, docs: &str) -> Self {
        self.documentation = Some(docs.to_string());
        self
    }
}

/// Output description of an operation: either a full shape descriptor or a
/// bare success flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputShape {
    Flag(bool),
    Shape(Map<String, Value>),
}

impl OutputShape {
    /// Look up a key on a shape descriptor (`None` for flags)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            OutputShape::Shape(shape) => shape.get(key),
            OutputShape::Flag(_) => None,
        }
    }
}

/// An operation exactly as the transport describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOperation {
    pub name: String,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub params: Vec<RawParam>,
    #[serde(default)]
    pub output: Option<OutputShape>,
}

impl RawOperation {
    pub fn new(name: &str, documentation: &str, params: Vec<RawParam>) -> Self {
        Self {
            name: name.to_string(),
            documentation: Some(documentation.to_string()),
            params,
            output: None,
        }
    }

    pub fn with_output(mut self, output: OutputShape) -> Self {
        self.output = Some(output);
        self
    }
}

/// Resolved endpoint handle for a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub region_name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Endpoint {
    pub fn new(region_name: &str) -> Self {
        Self {
            region_name: region_name.to_string(),
            url: None,
        }
    }
}

/// The `(metadata, body)` pair the transport returns for every call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub metadata: Value,
    pub body: Value,
}

impl RawResponse {
    pub fn new(metadata: Value, body: Value) -> Self {
        Self { metadata, body }
    }
}

/// One remote API surface as seen by the transport
pub trait RawService: Send + Sync {
    /// Declared API version of the live service
    fn api_version(&self) -> String;

    /// Every operation the service exposes, in declaration order
    fn operations(&self) -> &[RawOperation];

    /// Resolve an endpoint, optionally overriding the region
    fn get_endpoint(&self, region_name: Option<&str>) -> Endpoint;

    /// Perform the call. `params` is keyed by normalized parameter name.
    fn invoke(
        &self,
        operation: &RawOperation,
        endpoint: &Endpoint,
        params: &Map<String, Value>,
    ) -> anyhow::Result<RawResponse>;

    /// Look up an operation by its exact API name
    fn get_operation(&self, api_name: &str) -> Option<&RawOperation> {
        self.operations().iter().find(|op| op.name == api_name)
    }
}

/// Source of raw service descriptions
pub trait CoreSession: Send + Sync {
    fn get_service(&self, service_name: &str) -> Result<Arc<dyn RawService>>;
}

/// A core session paired with the cache of generated classes
///
/// The cache is an explicit object shared by reference; every factory built
/// from clones of the same session sees the same cache.
#[derive(Clone)]
pub struct Session {
    core: Arc<dyn CoreSession>,
    cache: Arc<ServiceCache>,
}

impl Session {
    pub fn new(core: Arc<dyn CoreSession>) -> Self {
        Self::with_cache(core, Arc::new(ServiceCache::new()))
    }

    pub fn with_cache(core: Arc<dyn CoreSession>, cache: Arc<ServiceCache>) -> Self {
        Self { core, cache }
    }

    pub fn core(&self) -> &Arc<dyn CoreSession> {
        &self.core
    }

    pub fn cache(&self) -> &Arc<ServiceCache> {
        &self.cache
    }

    pub fn get_service(&self, service_name: &str) -> Result<Arc<dyn RawService>> {
        self.core.get_service(service_name)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cache", &self.cache.to_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_type_round_trips_known_and_unknown_names() {
        assert_eq!(ParamType::from("map".to_string()), ParamType::Map);
        assert_eq!(ParamType::from("long".to_string()), ParamType::Integer);
        assert_eq!(
            ParamType::from("enum".to_string()),
            ParamType::Other("enum".to_string())
        );
        assert_eq!(ParamType::Other("enum".to_string()).to_string(), "enum");
    }

    #[test]
    fn test_raw_operation_deserializes_flag_and_shape_outputs() {
        let op: RawOperation = serde_json::from_value(json!({
            "name": "DeleteQueue",
            "params": [{"name": "QueueName", "required": true, "type": "string"}],
            "output": true
        }))
        .unwrap();
        assert_eq!(op.output, Some(OutputShape::Flag(true)));
        assert_eq!(op.params[0].param_type, ParamType::String);

        let op: RawOperation = serde_json::from_value(json!({
            "name": "CreateQueue",
            "output": {"shape_name": "CreateQueueResult", "type": "structure"}
        }))
        .unwrap();
        let output = op.output.unwrap();
        assert_eq!(output.get("type"), Some(&json!("structure")));
        assert!(op.params.is_empty());
        assert!(op.documentation.is_none());
    }
}

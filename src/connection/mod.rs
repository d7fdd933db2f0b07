//! Connection bindings
//!
//! [`ConnectionFactory::construct_for`] turns a service's normalized metadata
//! into a [`ConnectionClass`]: a table of generated methods, one per API
//! operation, sharing a single validate -> invoke -> check -> post-process
//! pipeline.
//!
//! Parameter metadata is re-read from [`ConnectionDetails`] on every call, so
//! a change to the cached metadata is seen by classes and instances that
//! already exist.
//!
//! # Example
//!
//! ```ignore
//! use dynclient::connection::{Connection, ConnectionFactory};
//!
//! let factory = ConnectionFactory::new(session);
//! let sqs = factory.construct_for("sqs")?.connect(None)?;
//! let queue = sqs.call("create_queue", kwargs(json!({"queue_name": "jobs"})))?;
//! ```

mod details;

pub use details::ConnectionDetails;

use crate::docs;
use crate::error::{Error, Result};
use crate::introspection::NormalizedParam;
use crate::session::{Endpoint, RawResponse, Session};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Code used when a server error does not carry one
pub const DEFAULT_ERROR_CODE: &str = "ConnectionError";

/// Anything that can dispatch a named method with keyword parameters
pub trait Connection: Send + Sync {
    fn service_name(&self) -> &str;

    /// Invoke `method_name`. Fails with [`Error::NoSuchMethod`] when the
    /// method does not exist on this connection.
    fn call(&self, method_name: &str, params: Map<String, Value>) -> Result<Value>;
}

/// Turn a JSON object into keyword parameters (anything else yields none)
pub fn kwargs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// One generated method
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMethod {
    pub name: String,
    pub api_name: String,
    pub docstring: String,
}

/// Generated binding type for one service
pub struct ConnectionClass {
    service_name: String,
    details: Arc<RwLock<ConnectionDetails>>,
    methods: BTreeMap<String, OperationMethod>,
}

impl ConnectionClass {
    /// A class with no generated methods yet
    pub fn new(service_name: &str, details: ConnectionDetails) -> Self {
        Self {
            service_name: service_name.to_string(),
            details: Arc::new(RwLock::new(details)),
            methods: BTreeMap::new(),
        }
    }

    /// Generate one method per operation in the service metadata
    pub fn build_methods(mut self) -> Result<Self> {
        let methods = {
            let mut details = self.details.write().unwrap_or_else(PoisonError::into_inner);
            details
                .service_data()?
                .operations
                .values()
                .map(|op| {
                    let method = OperationMethod {
                        name: op.method_name.clone(),
                        api_name: op.api_name.clone(),
                        docstring: docs::docstring_for(op),
                    };
                    (op.method_name.clone(), method)
                })
                .collect()
        };
        self.methods = methods;
        Ok(self)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Shared metadata holder (also used by every instance)
    pub fn details(&self) -> &Arc<RwLock<ConnectionDetails>> {
        &self.details
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn has_method(&self, method_name: &str) -> bool {
        self.methods.contains_key(method_name)
    }

    pub fn method(&self, method_name: &str) -> Option<&OperationMethod> {
        self.methods.get(method_name)
    }

    pub fn docstring(&self, method_name: &str) -> Option<&str> {
        self.methods.get(method_name).map(|m| m.docstring.as_str())
    }

    /// Current parameter metadata for a generated method
    pub fn operation_params(&self, method_name: &str) -> Result<Vec<NormalizedParam>> {
        let mut details = self.details.write().unwrap_or_else(PoisonError::into_inner);
        details
            .operation(method_name)?
            .map(|op| op.params)
            .ok_or_else(|| Error::NoSuchMethod {
                method: method_name.to_string(),
            })
    }

    /// Instantiate against an endpoint, optionally overriding the region
    pub fn connect(self: &Arc<Self>, region_name: Option<&str>) -> Result<ServiceConnection> {
        let service = {
            let details = self.details.read().unwrap_or_else(PoisonError::into_inner);
            details.session().get_service(&self.service_name)?
        };
        let endpoint = service.get_endpoint(region_name);

        Ok(ServiceConnection {
            class: Arc::clone(self),
            endpoint,
        })
    }

    fn dispatch(
        &self,
        endpoint: &Endpoint,
        method_name: &str,
        params: Map<String, Value>,
    ) -> Result<Value> {
        let no_such_method = || Error::NoSuchMethod {
            method: method_name.to_string(),
        };

        if !self.has_method(method_name) {
            return Err(no_such_method());
        }

        let (operation, session) = {
            let mut details = self.details.write().unwrap_or_else(PoisonError::into_inner);
            let operation = details.operation(method_name)?.ok_or_else(no_such_method)?;
            (operation, details.session().clone())
        };

        check_method_params(method_name, &operation.params, &params)?;
        let service_params = build_service_params(&operation.params, params);

        let service = session.get_service(&self.service_name)?;
        let Some(raw_operation) = service.get_operation(&operation.api_name) else {
            return Err(no_such_method());
        };

        tracing::debug!(
            "dispatch: service={}, method={}, region={}",
            self.service_name,
            method_name,
            endpoint.region_name
        );

        let response = service.invoke(raw_operation, endpoint, &service_params)?;
        check_for_errors(&response.body)?;
        Ok(post_process_results(method_name, &service_params, response))
    }
}

impl fmt::Debug for ConnectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionClass")
            .field("service_name", &self.service_name)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// A connection instance: a generated class bound to an endpoint
#[derive(Debug, Clone)]
pub struct ServiceConnection {
    class: Arc<ConnectionClass>,
    endpoint: Endpoint,
}

impl ServiceConnection {
    pub fn class(&self) -> &Arc<ConnectionClass> {
        &self.class
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn region_name(&self) -> &str {
        &self.endpoint.region_name
    }
}

impl Connection for ServiceConnection {
    fn service_name(&self) -> &str {
        self.class.service_name()
    }

    fn call(&self, method_name: &str, params: Map<String, Value>) -> Result<Value> {
        self.class.dispatch(&self.endpoint, method_name, params)
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// Reject missing required parameters and undeclared parameter names.
/// A `null` value counts as unset.
pub fn check_method_params(
    method_name: &str,
    op_params: &[NormalizedParam],
    params: &Map<String, Value>,
) -> Result<()> {
    let missing: Vec<&str> = op_params
        .iter()
        .filter(|p| p.required && !is_set(params.get(&p.var_name)))
        .map(|p| p.var_name.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(Error::invalid_invocation(
            method_name,
            format!("missing required argument(s): {}", missing.join(", ")),
        ));
    }

    let mut unexpected: Vec<&str> = params
        .keys()
        .filter(|key| !op_params.iter().any(|p| &p.var_name == *key))
        .map(String::as_str)
        .collect();

    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(Error::invalid_invocation(
            method_name,
            format!("got unexpected argument(s): {}", unexpected.join(", ")),
        ));
    }

    Ok(())
}

/// Keep only declared parameters that were actually set, keyed by `var_name`
pub fn build_service_params(
    op_params: &[NormalizedParam],
    mut params: Map<String, Value>,
) -> Map<String, Value> {
    let mut service_params = Map::new();

    for param in op_params {
        if let Some(value) = params.remove(&param.var_name) {
            if !value.is_null() {
                service_params.insert(param.var_name.clone(), value);
            }
        }
    }

    service_params
}

fn error_entry_fields(entry: &Map<String, Value>) -> (String, String) {
    let code = entry
        .get("Code")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_ERROR_CODE)
        .to_string();
    let message = entry
        .get("Message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (code, message)
}

/// Raise a server error when the body carries an `Errors` field.
///
/// An empty list is success. A list uses its first entry, a mapping is used
/// as is, and a bare string becomes the message.
pub fn check_for_errors(body: &Value) -> Result<()> {
    let Some(errors) = body.get("Errors") else {
        return Ok(());
    };

    let (code, message) = match errors {
        Value::Array(entries) if entries.is_empty() => return Ok(()),
        Value::Array(entries) => match &entries[0] {
            Value::Object(entry) => error_entry_fields(entry),
            Value::String(message) => (DEFAULT_ERROR_CODE.to_string(), message.clone()),
            other => (DEFAULT_ERROR_CODE.to_string(), other.to_string()),
        },
        Value::Object(entry) => error_entry_fields(entry),
        Value::String(message) => (DEFAULT_ERROR_CODE.to_string(), message.clone()),
        Value::Null => return Ok(()),
        other => (DEFAULT_ERROR_CODE.to_string(), other.to_string()),
    };

    tracing::warn!("Server error in response: {}: {}", code, message);

    Err(Error::ServerError {
        code,
        message,
        full_response: body.clone(),
    })
}

/// Connections return the body untouched
pub fn post_process_results(
    _method_name: &str,
    _params: &Map<String, Value>,
    response: RawResponse,
) -> Value {
    response.body
}

/// Builds (and caches) connection classes
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    session: Session,
}

impl ConnectionFactory {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connection class for a service, from the cache when available
    pub fn construct_for(&self, service_name: &str) -> Result<Arc<ConnectionClass>> {
        let cache = self.session.cache();

        if let Ok(class) = cache.get_connection(service_name) {
            tracing::debug!("Using cached connection class for {}", service_name);
            return Ok(class);
        }

        let details = ConnectionDetails::new(service_name, self.session.clone());
        let class = ConnectionClass::new(service_name, details).build_methods()?;
        tracing::info!(
            "Built connection class for {} ({} methods)",
            service_name,
            class.methods.len()
        );

        Ok(cache.get_or_set_connection(service_name, Arc::new(class)))
    }
}

//! Introspection
//!
//! Pure transforms from the raw operation/parameter descriptions a transport
//! exposes into the normalized model the factories build from.
//!
//! API names become identifiers with a snake_case transform
//! (`CreateQueue` -> `create_queue`, `MD5OfBody` -> `md5_of_body`).
//! Documentation has its HTML stripped and whitespace collapsed.

use crate::session::{Endpoint, OutputShape, ParamType, RawOperation, RawParam, RawService};
use heck::ToSnakeCase;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

/// Normalized parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParam {
    pub var_name: String,
    pub api_name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub docs: String,
}

/// Normalized operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOperation {
    pub method_name: String,
    pub api_name: String,
    pub docs: String,
    pub params: Vec<NormalizedParam>,
    pub output: Option<OutputShape>,
    #[serde(default)]
    pub result_key: Option<String>,
}

impl NormalizedOperation {
    pub fn param(&self, var_name: &str) -> Option<&NormalizedParam> {
        self.params.iter().find(|p| p.var_name == var_name)
    }

    pub fn param_mut(&mut self, var_name: &str) -> Option<&mut NormalizedParam> {
        self.params.iter_mut().find(|p| p.var_name == var_name)
    }
}

/// Every normalized operation of a service, keyed by method name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub api_version: String,
    pub operations: BTreeMap<String, NormalizedOperation>,
}

impl ServiceMetadata {
    pub fn get(&self, method_name: &str) -> Option<&NormalizedOperation> {
        self.operations.get(method_name)
    }

    pub fn get_mut(&mut self, method_name: &str) -> Option<&mut NormalizedOperation> {
        self.operations.get_mut(method_name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Method names in sorted order
    pub fn method_names(&self) -> Vec<&str> {
        self.operations.keys().map(String::as_str).collect()
    }
}

/// Identifier form of an API name
pub fn to_var_name(api_name: &str) -> String {
    api_name.to_snake_case()
}

fn html_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static HTML tag pattern"))
}

fn whitespace_run() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Strip HTML tags and collapse whitespace
pub fn clean_docs(raw: &str) -> String {
    let untagged = html_tag().replace_all(raw, " ");
    whitespace_run()
        .replace_all(&untagged, " ")
        .trim()
        .to_string()
}

pub fn parse_param(param: &RawParam) -> NormalizedParam {
    NormalizedParam {
        var_name: to_var_name(&param.name),
        api_name: param.name.clone(),
        required: param.required,
        param_type: param.param_type.clone(),
        docs: param.documentation.as_deref().map(clean_docs).unwrap_or_default(),
    }
}

/// Normalize parameters in declaration order. A parameter whose `var_name`
/// collides with an earlier one is dropped.
pub fn parse_params(params: &[RawParam]) -> Vec<NormalizedParam> {
    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(params.len());

    for param in params.iter().map(parse_param) {
        if !seen.insert(param.var_name.clone()) {
            tracing::warn!(
                "Dropping parameter {} ({}): name collides with an earlier parameter",
                param.api_name,
                param.var_name
            );
            continue;
        }
        parsed.push(param);
    }

    parsed
}

pub fn introspect_operation(operation: &RawOperation) -> NormalizedOperation {
    let cleaned = operation
        .documentation
        .as_deref()
        .map(clean_docs)
        .unwrap_or_default();
    let docs = format!("\n\n{}\n\n", cleaned);

    NormalizedOperation {
        method_name: to_var_name(&operation.name),
        api_name: operation.name.clone(),
        docs,
        params: parse_params(&operation.params),
        output: operation.output.clone(),
        result_key: None,
    }
}

/// Normalize every operation of a raw service. Duplicate method names keep
/// the last declaration.
pub fn introspect_service(service: &dyn RawService) -> ServiceMetadata {
    let operations = service
        .operations()
        .iter()
        .map(|op| {
            let normalized = introspect_operation(op);
            (normalized.method_name.clone(), normalized)
        })
        .collect();

    ServiceMetadata {
        api_version: service.api_version(),
        operations,
    }
}

pub fn get_endpoint(service: &dyn RawService, region_name: Option<&str>) -> Endpoint {
    service.get_endpoint(region_name)
}

/// Exact API-name lookup; `None` is a valid answer, not an error
pub fn get_operation<'a>(service: &'a dyn RawService, api_name: &str) -> Option<&'a RawOperation> {
    service.get_operation(api_name)
}

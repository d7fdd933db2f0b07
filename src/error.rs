//! Error types
//!
//! Every failure the binding engine can report. Nothing here is retried or
//! swallowed internally: errors always propagate to the immediate caller.

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building or invoking dynamic bindings
#[derive(Debug, Error)]
pub enum Error {
    /// A cache lookup missed. Recoverable: the caller decides whether to populate.
    #[error("{category} '{name}' (variant '{variant}') for service '{service}' is not cached")]
    NotCached {
        service: String,
        category: &'static str,
        name: String,
        variant: String,
    },

    /// The remote operation reported a failure inside its response body.
    #[error("{code}: {message}")]
    ServerError {
        code: String,
        message: String,
        full_response: Value,
    },

    /// The binding found no matching method on the underlying connection/transport.
    #[error("no such method '{method}' on the underlying connection")]
    NoSuchMethod { method: String },

    /// Unknown relation name, or a relation whose class type cannot be built.
    #[error("{reason} (relation '{relation}')")]
    NoRelation { relation: String, reason: String },

    /// The resource descriptor was written for a different API version.
    #[error(
        "resource descriptor for '{service}' targets API version '{found}', but the service reports '{expected}'"
    )]
    ApiVersionMismatch {
        service: String,
        expected: String,
        found: String,
    },

    /// Missing required parameter or unexpected parameter name. Raised before
    /// any transport call.
    #[error("{method}() {reason}")]
    InvalidInvocation { method: String, reason: String },

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("no resource named '{resource}' in the '{service}' descriptor")]
    ResourceNotFound { service: String, resource: String },

    #[error("no resource descriptor for '{service}' found in {searched:?}")]
    DescriptorNotFound {
        service: String,
        searched: Vec<PathBuf>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Failure reported by the external transport itself.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn not_cached(
        service: &str,
        category: &'static str,
        name: &str,
        variant: &str,
    ) -> Self {
        Error::NotCached {
            service: service.to_string(),
            category,
            name: name.to_string(),
            variant: variant.to_string(),
        }
    }

    pub(crate) fn invalid_invocation(method: &str, reason: impl Into<String>) -> Self {
        Error::InvalidInvocation {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn no_relation(relation: &str, reason: impl Into<String>) -> Self {
        Error::NoRelation {
            relation: relation.to_string(),
            reason: reason.into(),
        }
    }

    /// Error code for server errors
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::ServerError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Error message for server errors
    pub fn message(&self) -> Option<&str> {
        match self {
            Error::ServerError { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Raw response body that carried a server error
    pub fn full_response(&self) -> Option<&Value> {
        match self {
            Error::ServerError { full_response, .. } => Some(full_response),
            _ => None,
        }
    }
}

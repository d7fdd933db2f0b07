//! Connection Details
//!
//! Lazily loads and caches the normalized metadata of one service.

use crate::error::Result;
use crate::introspection::{self, NormalizedOperation, ServiceMetadata};
use crate::session::Session;

/// Per-service metadata holder
///
/// `service_data` is introspected on first access and kept until
/// [`reload_service_data`](Self::reload_service_data) is called. The API
/// version is derived separately and, once cached, is never re-derived.
#[derive(Debug)]
pub struct ConnectionDetails {
    service_name: String,
    /// Session the metadata is introspected through
    session: Session,
    /// Normalized operations, once introspected
    loaded_service_data: Option<ServiceMetadata>,
    /// Cached API version; cleared when the metadata is replaced
    api_version: Option<String>,
}

impl ConnectionDetails {
    pub fn new(service_name: &str, session: Session) -> Self {
        Self {
            service_name: service_name.to_string(),
            session,
            loaded_service_data: None,
            api_version: None,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Point at a different session. Cached data stays until reloaded.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_service_data.is_some()
    }

    /// Introspect the service through the current session
    pub fn introspect_service(&self) -> Result<ServiceMetadata> {
        let service = self.session.get_service(&self.service_name)?;
        Ok(introspection::introspect_service(service.as_ref()))
    }

    /// Normalized metadata, loaded on first access
    pub fn service_data(&mut self) -> Result<&ServiceMetadata> {
        Ok(self.service_data_mut()?)
    }

    /// Mutable access to the cached metadata (loads it first if needed)
    pub fn service_data_mut(&mut self) -> Result<&mut ServiceMetadata> {
        if self.loaded_service_data.is_none() {
            let data = self.introspect_service()?;
            self.set_service_data(data);
        }

        Ok(self
            .loaded_service_data
            .get_or_insert_with(ServiceMetadata::default))
    }

    /// Replace the cached metadata; the derived API version is cleared
    pub fn set_service_data(&mut self, data: ServiceMetadata) {
        tracing::debug!(
            "Loaded {} operations for service {}",
            data.len(),
            self.service_name
        );
        self.loaded_service_data = Some(data);
        self.api_version = None;
    }

    /// Operation metadata as currently cached
    pub fn operation(&mut self, method_name: &str) -> Result<Option<NormalizedOperation>> {
        Ok(self.service_data()?.get(method_name).cloned())
    }

    /// Cached API version, without deriving it
    pub fn cached_api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// API version of the service, derived once then cached
    pub fn api_version(&mut self) -> Result<String> {
        if let Some(version) = &self.api_version {
            return Ok(version.clone());
        }

        let version = self.session.get_service(&self.service_name)?.api_version();
        self.api_version = Some(version.clone());
        Ok(version)
    }

    /// Override the cached API version
    pub fn set_api_version(&mut self, version: &str) {
        self.api_version = Some(version.to_string());
    }

    /// Drop cached metadata and re-introspect from the current session
    pub fn reload_service_data(&mut self) -> Result<()> {
        tracing::debug!("Reloading service data for {}", self.service_name);
        let data = self.introspect_service()?;
        self.set_service_data(data);
        Ok(())
    }
}

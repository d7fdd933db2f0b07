//! Resource Details
//!
//! Lazily loads the resource descriptor for one resource of a service and
//! checks it against the live service's API version.

use super::loader::{
    CollectionSpec, Identifier, OperationSpec, RelationSpec, ResourceDescriptor, ResourceLoader,
    ResourceSpec,
};
use crate::error::{Error, Result};
use crate::session::Session;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Per-resource descriptor holder
pub struct ResourceDetails {
    session: Session,
    service_name: String,
    /// Resource (or collection) name within the descriptor
    resource_name: String,
    /// Source of descriptors, keyed by service and API version
    loader: Arc<dyn ResourceLoader>,
    /// Whole-service descriptor, once loaded
    loaded_data: Option<ResourceDescriptor>,
    /// Derived from `loaded_data`; cleared whenever it is replaced
    api_version: Option<String>,
}

impl ResourceDetails {
    pub fn new(
        session: Session,
        service_name: &str,
        resource_name: &str,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            session,
            service_name: service_name.to_string(),
            resource_name: resource_name.to_string(),
            loader,
            loaded_data: None,
            api_version: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_data.is_some()
    }

    pub fn cached_api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Load the descriptor matching the live service's API version
    fn load(&self) -> Result<ResourceDescriptor> {
        let live_version = self.session.get_service(&self.service_name)?.api_version();
        let descriptor = self.loader.load(&self.service_name, Some(&live_version))?;

        if descriptor.api_version != live_version {
            return Err(Error::ApiVersionMismatch {
                service: self.service_name.clone(),
                expected: live_version,
                found: descriptor.api_version.clone(),
            });
        }

        Ok(descriptor.as_ref().clone())
    }

    /// The whole service descriptor, loaded on first access
    pub fn service_data(&mut self) -> Result<&ResourceDescriptor> {
        Ok(self.service_data_mut()?)
    }

    pub fn service_data_mut(&mut self) -> Result<&mut ResourceDescriptor> {
        if self.loaded_data.is_none() {
            let data = self.load()?;
            self.set_service_data(data);
        }

        Ok(self.loaded_data.get_or_insert_with(ResourceDescriptor::default))
    }

    /// Replace the cached descriptor; the derived API version is cleared
    pub fn set_service_data(&mut self, data: ResourceDescriptor) {
        tracing::debug!(
            "Loaded resource descriptor for {}/{} (api_version={})",
            self.service_name,
            self.resource_name,
            data.api_version
        );
        self.loaded_data = Some(data);
        self.api_version = None;
    }

    pub fn reload_service_data(&mut self) -> Result<()> {
        let data = self.load()?;
        self.set_service_data(data);
        Ok(())
    }

    /// The section of the descriptor for this resource
    pub fn resource_data(&mut self) -> Result<&ResourceSpec> {
        Ok(self.resource_data_mut()?)
    }

    pub fn resource_data_mut(&mut self) -> Result<&mut ResourceSpec> {
        let service = self.service_name.clone();
        let resource = self.resource_name.clone();

        self.service_data_mut()?
            .resources
            .get_mut(&resource)
            .ok_or(Error::ResourceNotFound { service, resource })
    }

    /// The section of the descriptor for this name as a collection
    pub fn collection_data(&mut self) -> Result<&CollectionSpec> {
        let service = self.service_name.clone();
        let resource = self.resource_name.clone();

        self.service_data()?
            .collections
            .get(&resource)
            .ok_or(Error::ResourceNotFound { service, resource })
    }

    /// API version of the descriptor, derived once then cached
    pub fn api_version(&mut self) -> Result<String> {
        if let Some(version) = &self.api_version {
            return Ok(version.clone());
        }

        let version = self.service_data()?.api_version.clone();
        self.api_version = Some(version.clone());
        Ok(version)
    }

    pub fn set_api_version(&mut self, version: &str) {
        self.api_version = Some(version.to_string());
    }

    pub fn identifiers(&mut self) -> Result<Vec<Identifier>> {
        Ok(self.resource_data()?.identifiers.clone())
    }

    pub fn operations(&mut self) -> Result<BTreeMap<String, OperationSpec>> {
        Ok(self.resource_data()?.operations.clone())
    }

    pub fn operation(&mut self, name: &str) -> Result<Option<OperationSpec>> {
        Ok(self.resource_data()?.operations.get(name).cloned())
    }

    pub fn relations(&mut self) -> Result<BTreeMap<String, RelationSpec>> {
        Ok(self.resource_data()?.relations.clone())
    }

    /// Response field to unwrap for an operation (`None`: the whole response)
    pub fn result_key_for(&mut self, operation_name: &str) -> Result<Option<String>> {
        Ok(self
            .resource_data()?
            .operations
            .get(operation_name)
            .and_then(|op| op.result_key.clone()))
    }
}

impl fmt::Debug for ResourceDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDetails")
            .field("service_name", &self.service_name)
            .field("resource_name", &self.resource_name)
            .field("loaded", &self.is_loaded())
            .field("api_version", &self.api_version)
            .finish()
    }
}

//! Service Cache
//!
//! Memoizes generated classes per service so that the same connection,
//! resource or collection class is not rebuilt for every caller.
//!
//! Layout per service name:
//!
//! ```text
//! service -> connection
//!         -> resources:   name -> variant -> class
//!         -> collections: name -> variant -> class
//! ```
//!
//! All access goes through a single `RwLock`, so each `get_*`/`set_*`/`del_*`
//! call is atomic. Concurrent first-time population follows a first-writer-wins
//! policy through the `get_or_set_*` methods.

use crate::connection::ConnectionClass;
use crate::error::{Error, Result};
use crate::resource::RelatedClass;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Variant used when none is given
pub const DEFAULT_VARIANT: &str = "default";

type Variants = HashMap<String, Arc<dyn RelatedClass>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Resource,
    Collection,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Resource => "resource",
            Category::Collection => "collection",
        }
    }
}

/// Everything cached for one service
#[derive(Default, Clone)]
struct CacheEntry {
    connection: Option<Arc<ConnectionClass>>,
    resources: HashMap<String, Variants>,
    collections: HashMap<String, Variants>,
}

impl CacheEntry {
    fn category(&self, category: Category) -> &HashMap<String, Variants> {
        match category {
            Category::Resource => &self.resources,
            Category::Collection => &self.collections,
        }
    }

    fn category_mut(&mut self, category: Category) -> &mut HashMap<String, Variants> {
        match category {
            Category::Resource => &mut self.resources,
            Category::Collection => &mut self.collections,
        }
    }
}

/// Process-wide registry of generated classes
#[derive(Default)]
pub struct ServiceCache {
    services: RwLock<HashMap<String, CacheEntry>>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of services with an entry (regardless of what is populated)
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Whether the service has an entry, whatever categories are populated
    pub fn contains(&self, service_name: &str) -> bool {
        self.read().contains_key(service_name)
    }

    /// Sorted names of every cached service
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Connections
    // =========================================================================

    pub fn get_connection(&self, service_name: &str) -> Result<Arc<ConnectionClass>> {
        self.read()
            .get(service_name)
            .and_then(|entry| entry.connection.clone())
            .ok_or_else(|| Error::not_cached(service_name, "connection", service_name, DEFAULT_VARIANT))
    }

    pub fn set_connection(&self, service_name: &str, class: Arc<ConnectionClass>) {
        tracing::debug!("cache: set connection for {}", service_name);
        self.write()
            .entry(service_name.to_string())
            .or_default()
            .connection = Some(class);
    }

    /// Store `class` unless a connection is already cached; return whichever
    /// class ends up in the cache
    pub fn get_or_set_connection(
        &self,
        service_name: &str,
        class: Arc<ConnectionClass>,
    ) -> Arc<ConnectionClass> {
        let mut services = self.write();
        let entry = services.entry(service_name.to_string()).or_default();
        Arc::clone(entry.connection.get_or_insert(class))
    }

    pub fn del_connection(&self, service_name: &str) {
        if let Some(entry) = self.write().get_mut(service_name) {
            entry.connection = None;
        }
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub fn get_resource(
        &self,
        service_name: &str,
        resource_name: &str,
        variant: Option<&str>,
    ) -> Result<Arc<dyn RelatedClass>> {
        self.get_class(Category::Resource, service_name, resource_name, variant)
    }

    pub fn set_resource(
        &self,
        service_name: &str,
        resource_name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) {
        self.set_class(Category::Resource, service_name, resource_name, class, variant);
    }

    pub fn get_or_set_resource(
        &self,
        service_name: &str,
        resource_name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) -> Arc<dyn RelatedClass> {
        self.get_or_set_class(Category::Resource, service_name, resource_name, class, variant)
    }

    pub fn del_resource(&self, service_name: &str, resource_name: &str, variant: Option<&str>) {
        self.del_class(Category::Resource, service_name, resource_name, variant);
    }

    // =========================================================================
    // Collections
    // =========================================================================

    pub fn get_collection(
        &self,
        service_name: &str,
        collection_name: &str,
        variant: Option<&str>,
    ) -> Result<Arc<dyn RelatedClass>> {
        self.get_class(Category::Collection, service_name, collection_name, variant)
    }

    pub fn set_collection(
        &self,
        service_name: &str,
        collection_name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) {
        self.set_class(Category::Collection, service_name, collection_name, class, variant);
    }

    pub fn get_or_set_collection(
        &self,
        service_name: &str,
        collection_name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) -> Arc<dyn RelatedClass> {
        self.get_or_set_class(Category::Collection, service_name, collection_name, class, variant)
    }

    pub fn del_collection(&self, service_name: &str, collection_name: &str, variant: Option<&str>) {
        self.del_class(Category::Collection, service_name, collection_name, variant);
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    fn get_class(
        &self,
        category: Category,
        service_name: &str,
        name: &str,
        variant: Option<&str>,
    ) -> Result<Arc<dyn RelatedClass>> {
        let variant = variant.unwrap_or(DEFAULT_VARIANT);
        let found = self
            .read()
            .get(service_name)
            .and_then(|entry| entry.category(category).get(name))
            .and_then(|variants| variants.get(variant))
            .cloned();

        match found {
            Some(class) => {
                tracing::debug!("cache hit: {} {}/{}/{}", category.label(), service_name, name, variant);
                Ok(class)
            }
            None => Err(Error::not_cached(service_name, category.label(), name, variant)),
        }
    }

    fn set_class(
        &self,
        category: Category,
        service_name: &str,
        name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) {
        let variant = variant.unwrap_or(DEFAULT_VARIANT);
        tracing::debug!("cache: set {} {}/{}/{}", category.label(), service_name, name, variant);
        self.write()
            .entry(service_name.to_string())
            .or_default()
            .category_mut(category)
            .entry(name.to_string())
            .or_default()
            .insert(variant.to_string(), class);
    }

    fn get_or_set_class(
        &self,
        category: Category,
        service_name: &str,
        name: &str,
        class: Arc<dyn RelatedClass>,
        variant: Option<&str>,
    ) -> Arc<dyn RelatedClass> {
        let variant = variant.unwrap_or(DEFAULT_VARIANT);
        let mut services = self.write();
        let stored = services
            .entry(service_name.to_string())
            .or_default()
            .category_mut(category)
            .entry(name.to_string())
            .or_default()
            .entry(variant.to_string())
            .or_insert(class);
        Arc::clone(stored)
    }

    fn del_class(&self, category: Category, service_name: &str, name: &str, variant: Option<&str>) {
        let variant = variant.unwrap_or(DEFAULT_VARIANT);
        let mut services = self.write();
        let variants = services
            .get_mut(service_name)
            .and_then(|entry| entry.category_mut(category).get_mut(name));

        if let Some(variants) = variants {
            variants.remove(variant);
        }
    }
}

impl fmt::Display for ServiceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceCache: {}", self.service_names().join(", "))
    }
}

impl fmt::Debug for ServiceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCache")
            .field("services", &self.service_names())
            .finish()
    }
}

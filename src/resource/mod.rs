//! Resource bindings
//!
//! This module turns declarative resource descriptors into callable resource
//! types. A resource wraps a connection, keeps its identifier values in
//! `data`, injects them into every call and promotes response fields onto
//! itself as attributes.
//!
//! # Architecture
//!
//! - [`loader`] - Resource descriptor types and JSON/in-memory loaders
//! - [`details`] - Lazy, version-checked access to one resource's descriptor
//! - [`hooks`] - Per-operation `update_params`/`post_process` overrides
//!
//! # Example
//!
//! ```ignore
//! let factory = ResourceFactory::new(session, loader);
//! let pipeline_class = factory.construct_for("elastictranscoder", "Pipeline")?;
//! let mut pipe = pipeline_class.instantiate(connection, kwargs(json!({"id": "1872baf45"})));
//! pipe.call("get", Map::new())?;
//! let jobs = pipe.build_relation("jobs", None)?;
//! ```

pub mod details;
pub mod hooks;
pub mod loader;

pub use details::ResourceDetails;
pub use hooks::ResourceHooks;
pub use loader::{
    ClassType, CollectionSpec, Identifier, JsonResourceLoader, MemoryResourceLoader,
    OperationSpec, RelType, RelationSpec, ResourceDescriptor, ResourceLoader, ResourceSpec,
};

use crate::cache::DEFAULT_VARIANT;
use crate::collection::CollectionClass;
use crate::connection::Connection;
use crate::docs::DEFAULT_DOCSTRING;
use crate::error::{Error, Result};
use crate::introspection::to_var_name;
use crate::session::Session;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A class that relations can point at (resource or collection)
pub trait RelatedClass: Any + Send + Sync {
    /// Name the class is declared under
    fn class_name(&self) -> &str;

    /// Build an instance bound to `connection`, seeded with `identifiers`
    fn construct(
        self: Arc<Self>,
        connection: Arc<dyn Connection>,
        identifiers: Map<String, Value>,
    ) -> Result<Box<dyn RelatedObject>>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// An instance built through a relation
pub trait RelatedObject: Any + Send + Sync + fmt::Debug {
    fn get_identifiers(&self) -> Result<Map<String, Value>>;

    fn as_any(&self) -> &dyn Any;
}

/// One generated resource method
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMethod {
    pub name: String,
    /// Name of the connection method it delegates to
    pub connection_method: String,
    pub docstring: String,
}

/// Generated binding type for one resource (and variant)
pub struct ResourceClass {
    /// Service the resource belongs to (e.g., "elastictranscoder")
    service_name: String,
    /// Resource name as declared in the descriptor (e.g., "Pipeline")
    resource_name: String,
    /// Cache variant key, `"default"` unless built with custom hooks
    variant: String,
    /// Descriptor access shared with every instance
    details: Arc<RwLock<ResourceDetails>>,
    /// Per-operation and generic overrides
    hooks: ResourceHooks,
    /// Generated methods keyed by operation name
    methods: BTreeMap<String, ResourceMethod>,
}

impl ResourceClass {
    /// A class with no generated methods yet
    pub fn new(details: ResourceDetails, hooks: ResourceHooks) -> Self {
        Self {
            service_name: details.service_name().to_string(),
            resource_name: details.resource_name().to_string(),
            variant: DEFAULT_VARIANT.to_string(),
            details: Arc::new(RwLock::new(details)),
            hooks,
            methods: BTreeMap::new(),
        }
    }

    pub fn with_variant(mut self, variant: &str) -> Self {
        self.variant = variant.to_string();
        self
    }

    /// Generate one method per declared operation
    pub fn build_methods(mut self) -> Result<Self> {
        let operations = self.with_details(|details| details.operations())?;
        let session = self.with_details(|details| Ok(details.session().clone()))?;
        let connection_class = session.cache().get_connection(&self.service_name).ok();

        self.methods = operations
            .into_iter()
            .map(|(name, spec)| {
                let connection_method = to_var_name(&spec.api_name);
                let docstring = connection_class
                    .as_ref()
                    .and_then(|class| class.docstring(&connection_method))
                    .unwrap_or(DEFAULT_DOCSTRING)
                    .to_string();
                let method = ResourceMethod {
                    name: name.clone(),
                    connection_method,
                    docstring,
                };
                (name, method)
            })
            .collect();

        Ok(self)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn hooks(&self) -> &ResourceHooks {
        &self.hooks
    }

    pub fn details(&self) -> &Arc<RwLock<ResourceDetails>> {
        &self.details
    }

    /// Run `f` with exclusive access to the shared details
    pub fn with_details<T>(&self, f: impl FnOnce(&mut ResourceDetails) -> Result<T>) -> Result<T> {
        let mut details = self.details.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut details)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    pub fn method(&self, name: &str) -> Option<&ResourceMethod> {
        self.methods.get(name)
    }

    pub fn docstring(&self, name: &str) -> Option<&str> {
        self.methods.get(name).map(|m| m.docstring.as_str())
    }

    /// Create an instance. `data` seeds the identifier values.
    pub fn instantiate(
        self: &Arc<Self>,
        connection: Arc<dyn Connection>,
        data: Map<String, Value>,
    ) -> Resource {
        Resource {
            class: Arc::clone(self),
            connection,
            data,
            attributes: Map::new(),
        }
    }
}

impl RelatedClass for ResourceClass {
    fn class_name(&self) -> &str {
        &self.resource_name
    }

    fn construct(
        self: Arc<Self>,
        connection: Arc<dyn Connection>,
        identifiers: Map<String, Value>,
    ) -> Result<Box<dyn RelatedObject>> {
        Ok(Box::new(self.instantiate(connection, identifiers)))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClass")
            .field("service_name", &self.service_name)
            .field("resource_name", &self.resource_name)
            .field("variant", &self.variant)
            .field("methods", &self.method_names())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// A live resource instance
pub struct Resource {
    /// Class this instance was built from
    class: Arc<ResourceClass>,
    /// Connection every operation is delegated to
    connection: Arc<dyn Connection>,
    /// Identifier values keyed by `var_name`
    data: Map<String, Value>,
    /// Fields promoted from responses, keyed by snake_cased name
    attributes: Map<String, Value>,
}

impl Resource {
    pub fn class(&self) -> &Arc<ResourceClass> {
        &self.class
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Raw identifier storage
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.class.method_names()
    }

    /// Declared identifiers currently set on this instance
    pub fn get_identifiers(&self) -> Result<Map<String, Value>> {
        let identifiers = self.class.with_details(|details| details.identifiers())?;

        Ok(identifiers
            .iter()
            .filter_map(|ident| {
                self.data
                    .get(&ident.var_name)
                    .map(|value| (ident.var_name.clone(), value.clone()))
            })
            .collect())
    }

    /// Set declared identifiers; undeclared keys are ignored
    pub fn set_identifiers(&mut self, values: &Map<String, Value>) -> Result<()> {
        let identifiers = self.class.with_details(|details| details.identifiers())?;

        for ident in &identifiers {
            if let Some(value) = values.get(&ident.var_name) {
                self.data.insert(ident.var_name.clone(), value.clone());
            }
        }

        Ok(())
    }

    /// Promoted attribute, falling back to identifier data
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).or_else(|| self.data.get(name))
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Shape the parameters for an operation.
    ///
    /// Runs `update_params_<operation>`, then the generic update hook, then
    /// injects identifiers. Identifiers overwrite caller values unless a
    /// per-operation hook exists, in which case the hook's values are kept.
    pub fn full_update_params(
        &self,
        operation: &str,
        params: Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let mut params = params;
        let per_operation = self.class.hooks.update_params_for(operation).cloned();
        let has_override = per_operation.is_some();

        if let Some(hook) = per_operation {
            params = hook(self, params);
        }
        if let Some(hook) = self.class.hooks.update_params_all().cloned() {
            params = hook(self, operation, params);
        }

        for (key, value) in self.get_identifiers()? {
            if has_override {
                params.entry(key).or_insert(value);
            } else {
                params.insert(key, value);
            }
        }

        Ok(params)
    }

    /// Shape the result of an operation and promote its fields.
    ///
    /// Runs `post_process_<operation>`, then the generic post-process hook.
    /// Fields of the result (or of its `result_key` member) become
    /// snake_cased attributes; fields matching an identifier also update
    /// `data`. The hook output is returned as is.
    pub fn full_post_process(&mut self, operation: &str, result: Value) -> Result<Value> {
        let mut result = result;

        if let Some(hook) = self.class.hooks.post_process_for(operation).cloned() {
            result = hook(self, result);
        }
        if let Some(hook) = self.class.hooks.post_process_all().cloned() {
            result = hook(self, operation, result);
        }

        let (result_key, identifiers) = self.class.with_details(|details| {
            Ok((details.result_key_for(operation)?, details.identifiers()?))
        })?;

        let source = match &result_key {
            Some(key) => result.get(key),
            None => Some(&result),
        };

        if let Some(Value::Object(fields)) = source {
            for (field, value) in fields {
                let attr = to_var_name(field);

                for ident in &identifiers {
                    if ident.var_name == attr || ident.api_name == *field {
                        self.data.insert(ident.var_name.clone(), value.clone());
                    }
                }

                self.attributes.insert(attr, value.clone());
            }
        }

        Ok(result)
    }

    /// Invoke a declared resource operation
    pub fn call(&mut self, operation: &str, params: Map<String, Value>) -> Result<Value> {
        let no_such_method = || Error::NoSuchMethod {
            method: operation.to_string(),
        };

        if self.class.method(operation).is_none() {
            return Err(no_such_method());
        }

        let spec = self
            .class
            .with_details(|details| details.operation(operation))?
            .ok_or_else(no_such_method)?;
        let connection_method = to_var_name(&spec.api_name);

        let params = self.full_update_params(operation, params)?;

        tracing::debug!(
            "resource call: {}/{}.{} -> {}",
            self.class.service_name,
            self.class.resource_name,
            operation,
            connection_method
        );

        let result = self.connection.call(&connection_method, params)?;
        self.full_post_process(operation, result)
    }

    /// Build the object on the other end of a declared relation.
    ///
    /// The class comes from `klass` when given, otherwise from the service
    /// cache. The new object receives a copy of this resource's identifiers.
    pub fn build_relation(
        &self,
        relation_name: &str,
        klass: Option<Arc<dyn RelatedClass>>,
    ) -> Result<Box<dyn RelatedObject>> {
        let relations = self.class.with_details(|details| details.relations())?;
        let Some(relation) = relations.get(relation_name) else {
            return Err(Error::no_relation(relation_name, "No such relation"));
        };

        let cache = self.class.with_details(|details| Ok(Arc::clone(details.session().cache())))?;
        let service_name = &self.class.service_name;

        let class = match (relation.class_type, klass) {
            (ClassType::Unknown, _) => {
                return Err(Error::no_relation(
                    relation_name,
                    format!("Unknown class type for '{}'", relation.class_name),
                ));
            }
            (_, Some(klass)) => klass,
            (ClassType::Resource, None) => {
                cache.get_resource(service_name, &relation.class_name, None)?
            }
            (ClassType::Collection, None) => {
                cache.get_collection(service_name, &relation.class_name, None)?
            }
        };

        tracing::debug!(
            "Building relation {} ({:?}) -> {}",
            relation_name,
            relation.rel_type,
            class.class_name()
        );

        class.construct(Arc::clone(&self.connection), self.get_identifiers()?)
    }
}

impl RelatedObject for Resource {
    fn get_identifiers(&self) -> Result<Map<String, Value>> {
        Resource::get_identifiers(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("service_name", &self.class.service_name)
            .field("resource_name", &self.class.resource_name)
            .field("data", &self.data)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Builds (and caches) resource and collection classes
#[derive(Clone)]
pub struct ResourceFactory {
    session: Session,
    /// Source of resource descriptors
    loader: Arc<dyn ResourceLoader>,
}

impl ResourceFactory {
    pub fn new(session: Session, loader: Arc<dyn ResourceLoader>) -> Self {
        Self { session, loader }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    /// Default resource class, without hooks
    pub fn construct_for(&self, service_name: &str, resource_name: &str) -> Result<Arc<ResourceClass>> {
        self.construct_variant(service_name, resource_name, DEFAULT_VARIANT, ResourceHooks::default())
    }

    /// Resource class for a named variant with its own hook table
    pub fn construct_variant(
        &self,
        service_name: &str,
        resource_name: &str,
        variant: &str,
        hooks: ResourceHooks,
    ) -> Result<Arc<ResourceClass>> {
        let cache = self.session.cache();

        if let Ok(cached) = cache.get_resource(service_name, resource_name, Some(variant)) {
            match cached.into_any().downcast::<ResourceClass>() {
                Ok(class) => return Ok(class),
                Err(_) => tracing::warn!(
                    "Cached {}/{} ({}) is not a generated resource class, building a fresh one",
                    service_name,
                    resource_name,
                    variant
                ),
            }
        }

        let details = ResourceDetails::new(
            self.session.clone(),
            service_name,
            resource_name,
            Arc::clone(&self.loader),
        );
        let class = Arc::new(
            ResourceClass::new(details, hooks)
                .with_variant(variant)
                .build_methods()?,
        );
        tracing::info!(
            "Built resource class {}/{} ({}, {} methods)",
            service_name,
            resource_name,
            variant,
            class.methods.len()
        );

        let stored = cache.get_or_set_resource(
            service_name,
            resource_name,
            Arc::clone(&class) as Arc<dyn RelatedClass>,
            Some(variant),
        );
        Ok(stored.into_any().downcast::<ResourceClass>().unwrap_or(class))
    }

    /// Collection class declared in the service's descriptor
    pub fn construct_collection_for(
        &self,
        service_name: &str,
        collection_name: &str,
    ) -> Result<Arc<CollectionClass>> {
        let cache = self.session.cache();

        if let Ok(cached) = cache.get_collection(service_name, collection_name, None) {
            if let Ok(class) = cached.into_any().downcast::<CollectionClass>() {
                return Ok(class);
            }
        }

        let mut details = ResourceDetails::new(
            self.session.clone(),
            service_name,
            collection_name,
            Arc::clone(&self.loader),
        );
        let spec = details.collection_data()?.clone();
        let class = Arc::new(CollectionClass::new(service_name, collection_name, spec));
        tracing::info!("Built collection class {}/{}", service_name, collection_name);

        let stored = cache.get_or_set_collection(
            service_name,
            collection_name,
            Arc::clone(&class) as Arc<dyn RelatedClass>,
            None,
        );
        Ok(stored.into_any().downcast::<CollectionClass>().unwrap_or(class))
    }
}

impl fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

//! Collections
//!
//! A collection groups resources of one kind. Within the binding engine it
//! is a cache category and a relation target: it carries the identifiers of
//! the resource it was built from and can call its declared operations with
//! them.

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::introspection::to_var_name;
use crate::resource::{CollectionSpec, RelatedClass, RelatedObject};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Generated binding type for one declared collection
pub struct CollectionClass {
    /// Service the collection belongs to
    service_name: String,
    /// Collection name as declared in the descriptor (e.g., "JobCollection")
    collection_name: String,
    /// Grouped resource and declared operations
    spec: CollectionSpec,
}

impl CollectionClass {
    pub fn new(service_name: &str, collection_name: &str, spec: CollectionSpec) -> Self {
        Self {
            service_name: service_name.to_string(),
            collection_name: collection_name.to_string(),
            spec,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Resource the collection groups, when declared
    pub fn resource_name(&self) -> Option<&str> {
        self.spec.resource.as_deref()
    }

    pub fn operation_names(&self) -> Vec<&str> {
        self.spec.operations.keys().map(String::as_str).collect()
    }

    pub fn instantiate(
        self: &Arc<Self>,
        connection: Arc<dyn Connection>,
        data: Map<String, Value>,
    ) -> Collection {
        Collection {
            class: Arc::clone(self),
            connection,
            data,
        }
    }
}

impl RelatedClass for CollectionClass {
    fn class_name(&self) -> &str {
        &self.collection_name
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

impl fmt::Debug for CollectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionClass")
            .field("service_name", &self.service_name)
            .field("collection_name", &self.collection_name)
            .field("spec", &self.spec)
            .finish()
    }
}

/// A collection instance, usually built through a relation
pub struct Collection {
    class: Arc<CollectionClass>,
    /// Connection every operation is delegated to
    connection: Arc<dyn Connection>,
    /// Identifiers inherited from the parent resource
    data: Map<String, Value>,
}

impl Collection {
    pub fn class(&self) -> &Arc<CollectionClass> {
        &self.class
    }

    /// Every identifier the collection was seeded with
    pub fn get_identifiers(&self) -> Map<String, Value> {
        self.data.clone()
    }

    /// Call a declared operation; the collection's identifiers are injected
    pub fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value> {
        let Some(spec) = self.class.spec.operations.get(operation) else {
            return Err(Error::NoSuchMethod {
                method: operation.to_string(),
            });
        };

        let mut params = params;
        for (key, value) in &self.data {
            params.insert(key.clone(), value.clone());
        }

        let result = self.connection.call(&to_var_name(&spec.api_name), params)?;

        Ok(match &spec.result_key {
            Some(key) => result.get(key).cloned().unwrap_or(Value::Null),
            None => result,
        })
    }
}

impl RelatedObject for Collection {
    fn get_identifiers(&self) -> Result<Map<String, Value>> {
        Ok(Collection::get_identifiers(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("collection_name", &self.class.collection_name)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::kwargs;
    use crate::resource::OperationSpec;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingConn {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl Connection for RecordingConn {
        fn service_name(&self) -> &str {
            "test"
        }

        fn call(&self, method_name: &str, params: Map<String, Value>) -> Result<Value> {
            self.calls.lock().unwrap().push((method_name.to_string(), params));
            Ok(json!({"Jobs": [{"Id": "j-1"}], "NextPageToken": null}))
        }
    }

    fn job_collection() -> Arc<CollectionClass> {
        let mut spec = CollectionSpec {
            resource: Some("Job".to_string()),
            ..Default::default()
        };
        spec.operations.insert(
            "each".to_string(),
            OperationSpec {
                api_name: "ListJobsByPipeline".to_string(),
                result_key: Some("Jobs".to_string()),
            },
        );
        Arc::new(CollectionClass::new("test", "JobCollection", spec))
    }

    #[test]
    fn test_call_injects_identifiers_and_unwraps_result_key() {
        let conn = Arc::new(RecordingConn::default());
        let collection =
            job_collection().instantiate(conn.clone(), kwargs(json!({"pipeline_id": "p-1"})));

        let jobs = collection.call("each", Map::new()).unwrap();
        assert_eq!(jobs, json!([{"Id": "j-1"}]));

        let calls = conn.calls.lock().unwrap();
        assert_eq!(calls[0].0, "list_jobs_by_pipeline");
        assert_eq!(calls[0].1, kwargs(json!({"pipeline_id": "p-1"})));
    }

    #[test]
    fn test_unknown_operation() {
        let collection = job_collection().instantiate(Arc::new(RecordingConn::default()), Map::new());
        assert!(matches!(
            collection.call("nope", Map::new()),
            Err(Error::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn test_construct_through_related_class() {
        let class: Arc<dyn RelatedClass> = job_collection();
        assert_eq!(class.class_name(), "JobCollection");

        let rel = class
            .construct(
                Arc::new(RecordingConn::default()),
                kwargs(json!({"id": "1872baf45"})),
            )
            .unwrap();
        assert_eq!(rel.get_identifiers().unwrap(), kwargs(json!({"id": "1872baf45"})));
        let collection = rel.as_any().downcast_ref::<Collection>().unwrap();
        assert_eq!(collection.class().resource_name(), Some("Job"));
    }
}

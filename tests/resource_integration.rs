//! Integration tests for generated resource classes
//!
//! Resources are built from in-memory and on-disk descriptors over a static
//! session, with hand-written connections standing in for the transport
//! where a test needs to control exactly which methods exist.

use dynclient::resource::{MemoryResourceLoader, ResourceDescriptor};
use dynclient::session::{ParamType, RawOperation, RawParam};
use dynclient::{
    kwargs, Collection, CollectionClass, Connection, ConnectionFactory, Error, JsonResourceLoader,
    RelatedClass, RelatedObject, Resource, ResourceClass, ResourceFactory, ResourceHooks,
    Session, StaticService, StaticSession,
};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::sync::Arc;

const API_VERSION: &str = "2012-09-25";

fn transcoder_service() -> StaticService {
    StaticService::new(API_VERSION)
        .with_operation(RawOperation::new(
            "DeletePipeline",
            "<p>Deletes a pipeline.</p>",
            vec![RawParam::new("Id", true, ParamType::String).with_docs("The pipeline id.")],
        ))
        .with_operation(RawOperation::new(
            "ReadPipeline",
            "<p>Reads a pipeline.</p>",
            vec![
                RawParam::new("Id", true, ParamType::String),
                RawParam::new("IncludeJobs", false, ParamType::Boolean),
            ],
        ))
        .with_response("DeletePipeline", json!({"Success": true}))
        .with_response(
            "ReadPipeline",
            json!({
                "Pipeline": {"Id": "1872baf45", "Name": "A pipe", "Status": "Active"},
                "Summary": {"JobCount": 3}
            }),
        )
}

fn pipe_descriptor() -> ResourceDescriptor {
    serde_json::from_value(json!({
        "api_version": API_VERSION,
        "resources": {
            "Pipe": {
                "identifiers": [{"var_name": "id", "api_name": "Id"}],
                "operations": {
                    "delete": {"api_name": "DeletePipe"}
                },
                "relations": {
                    "jobs": {
                        "class": "JobCollection",
                        "class_type": "collection",
                        "rel_type": "1-M",
                        "required": false
                    },
                    "unknown": {"class": "Something", "class_type": "unknown"}
                }
            },
            "Pipeline": {
                "identifiers": [{"var_name": "id", "api_name": "Id"}],
                "operations": {
                    "delete": {"api_name": "DeletePipeline"},
                    "get": {"api_name": "ReadPipeline", "result_key": "Pipeline"}
                }
            }
        },
        "collections": {
            "JobCollection": {
                "resource": "Job",
                "operations": {"each": {"api_name": "ListJobsByPipeline", "result_key": "Jobs"}}
            }
        }
    }))
    .unwrap()
}

fn session() -> Session {
    Session::new(Arc::new(
        StaticSession::new().with_service("test", transcoder_service()),
    ))
}

fn memory_factory(session: &Session, descriptor: ResourceDescriptor) -> ResourceFactory {
    let loader = MemoryResourceLoader::new().with_descriptor("test", descriptor);
    ResourceFactory::new(session.clone(), Arc::new(loader))
}

/// Connection exposing only `delete_pipe` and `delete_pipeline`
struct FakeConn;

impl Connection for FakeConn {
    fn service_name(&self) -> &str {
        "test"
    }

    fn call(&self, method_name: &str, _params: Map<String, Value>) -> dynclient::Result<Value> {
        match method_name {
            "delete_pipe" | "delete_pipeline" => Ok(json!({
                "RequestId": "1234-1234-1234-1234",
                "Id": "1872baf45",
                "Title": "A pipe",
            })),
            other => Err(Error::NoSuchMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Connection without any methods
struct OopsConn;

impl Connection for OopsConn {
    fn service_name(&self) -> &str {
        "test"
    }

    fn call(&self, method_name: &str, _params: Map<String, Value>) -> dynclient::Result<Value> {
        Err(Error::NoSuchMethod {
            method: method_name.to_string(),
        })
    }
}

/// Hooks for a customized `Pipe` resource
fn pipe_hooks() -> ResourceHooks {
    ResourceHooks::new()
        .on_any_update_params(|_, _, mut params| {
            params.insert("global".to_string(), json!(true));
            params
        })
        .on_update_params("delete", |resource, mut params| {
            params.extend(resource.get_identifiers().unwrap_or_default());
            params
        })
        .on_any_post_process(|resource, _, mut result| {
            let removed = result
                .as_object_mut()
                .and_then(|fields| fields.remove("Id"))
                .unwrap_or(Value::Null);
            resource.set_attribute("identifier", removed);
            result
        })
        .on_post_process("delete", |resource, result| {
            resource.set_attribute("deleted", json!(true));
            result
        })
}

fn pipe_class(session: &Session, descriptor: ResourceDescriptor) -> Arc<ResourceClass> {
    memory_factory(session, descriptor)
        .construct_variant("test", "Pipe", "pipe", pipe_hooks())
        .unwrap()
}

fn pipe(class: &Arc<ResourceClass>, id: &str) -> Resource {
    class.instantiate(Arc::new(FakeConn), kwargs(json!({"id": id})))
}

/// Test module for resource instances
mod resource_tests {
    use super::*;

    /// Test only declared identifiers are read and written
    #[test]
    fn test_get_and_set_identifiers() {
        let class = pipe_class(&session(), pipe_descriptor());
        let mut resource = pipe(&class, "1872baf45");
        assert_eq!(resource.get_identifiers().unwrap(), kwargs(json!({"id": "1872baf45"})));

        // Only declared identifiers are stored
        resource
            .set_identifiers(&kwargs(json!({"id": "hello!", "bucket": "something"})))
            .unwrap();
        assert_eq!(resource.data(), &kwargs(json!({"id": "hello!"})));
    }

    /// Test hooks run before identifiers are injected
    #[test]
    fn test_full_update_params() {
        let class = pipe_class(&session(), pipe_descriptor());
        let resource = pipe(&class, "1872baf45");

        let mut params = kwargs(json!({"notify": true}));
        assert_eq!(
            resource.full_update_params("delete", params.clone()).unwrap(),
            kwargs(json!({"global": true, "id": "1872baf45", "notify": true}))
        );

        params.insert("yeah".to_string(), json!("yeahyeah"));
        assert_eq!(
            resource.full_update_params("get", params).unwrap(),
            kwargs(json!({"global": true, "id": "1872baf45", "notify": true, "yeah": "yeahyeah"}))
        );
    }

    /// Test identifiers win over caller values without an override
    #[test]
    fn test_identifiers_override_caller_values_without_a_hook() {
        let class = memory_factory(&session(), pipe_descriptor())
            .construct_for("test", "Pipe")
            .unwrap();
        let resource = class.instantiate(Arc::new(FakeConn), kwargs(json!({"id": "mine"})));

        assert_eq!(
            resource
                .full_update_params("delete", kwargs(json!({"id": "theirs"})))
                .unwrap(),
            kwargs(json!({"id": "mine"}))
        );
    }

    /// Test the delete override marks the resource deleted
    #[test]
    fn test_full_post_process_delete() {
        let class = pipe_class(&session(), pipe_descriptor());
        let mut resource = pipe(&class, "1872baf45");

        let processed = resource
            .full_post_process("delete", json!({"Id": "1872baf45", "Title": "A pipe"}))
            .unwrap();
        assert_eq!(processed, json!({"Title": "A pipe"}));
        assert_eq!(resource.attribute("deleted"), Some(&json!(true)));
        assert_eq!(resource.attribute("identifier"), Some(&json!("1872baf45")));
    }

    /// Test response fields become snake_cased attributes
    #[test]
    fn test_full_post_process_promotes_snake_cased_attributes() {
        let class = pipe_class(&session(), pipe_descriptor());
        let mut resource = pipe(&class, "1872baf45");

        let processed = resource
            .full_post_process("get", json!({"Id": "1872baf45", "Title": "A pipe"}))
            .unwrap();
        assert_eq!(processed, json!({"Title": "A pipe"}));
        // `id` falls back to the identifier data
        assert_eq!(resource.attribute("id"), Some(&json!("1872baf45")));
        assert_eq!(resource.attribute("title"), Some(&json!("A pipe")));
        assert_eq!(resource.attribute("deleted"), None);
    }

    /// Test promotion reads from the result key member
    #[test]
    fn test_full_post_process_with_result_key() {
        let mut descriptor = pipe_descriptor();
        descriptor
            .resources
            .get_mut("Pipe")
            .unwrap()
            .operations
            .insert(
                "get".to_string(),
                serde_json::from_value(json!({"api_name": "GetPipe", "result_key": "Pipe"}))
                    .unwrap(),
            );
        let class = pipe_class(&session(), descriptor);
        let mut resource = pipe(&class, "92aa36e5b");
        assert_eq!(resource.data(), &kwargs(json!({"id": "92aa36e5b"})));

        let results = json!({"Pipe": {"Id": "92aa36e5b", "Title": "Another pipe"}});
        let processed = resource.full_post_process("get", results.clone()).unwrap();

        // Returned unchanged, yet the nested fields are promoted
        assert_eq!(processed, results);
        assert_eq!(resource.attribute("id"), Some(&json!("92aa36e5b")));
        assert_eq!(resource.attribute("title"), Some(&json!("Another pipe")));
    }

    /// Test a call runs update, dispatch and post-process
    #[test]
    fn test_call_runs_the_whole_pipeline() {
        let class = pipe_class(&session(), pipe_descriptor());
        let mut resource = pipe(&class, "1872baf45");

        let result = resource.call("delete", Map::new()).unwrap();
        assert_eq!(
            result,
            json!({"RequestId": "1234-1234-1234-1234", "Title": "A pipe"})
        );
        assert_eq!(resource.attribute("deleted"), Some(&json!(true)));
        assert_eq!(resource.attribute("request_id"), Some(&json!("1234-1234-1234-1234")));
    }

    /// Test missing connection methods surface as NoSuchMethod
    #[test]
    fn test_call_without_a_matching_connection_method() {
        let class = pipe_class(&session(), pipe_descriptor());
        let mut resource = class.instantiate(Arc::new(OopsConn), kwargs(json!({"id": "x"})));

        assert!(matches!(
            resource.call("delete", Map::new()),
            Err(Error::NoSuchMethod { .. })
        ));
        assert!(matches!(
            resource.call("explode", Map::new()),
            Err(Error::NoSuchMethod { .. })
        ));
    }
}

/// Test module for relation building
mod relation_tests {
    use super::*;

    /// Relation target that is neither a resource nor a collection
    struct Whatever;

    #[derive(Debug)]
    struct WhateverObject(Map<String, Value>);

    impl RelatedClass for Whatever {
        fn class_name(&self) -> &str {
            "Whatever"
        }

        fn construct(
            self: Arc<Self>,
            _connection: Arc<dyn Connection>,
            identifiers: Map<String, Value>,
        ) -> dynclient::Result<Box<dyn RelatedObject>> {
            Ok(Box::new(WhateverObject(identifiers)))
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    impl RelatedObject for WhateverObject {
        fn get_identifiers(&self) -> dynclient::Result<Map<String, Value>> {
            Ok(self.0.clone())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn setup() -> (Session, Resource) {
        let session = session();
        let class = pipe_class(&session, pipe_descriptor());
        let resource = pipe(&class, "1872baf45");
        (session, resource)
    }

    /// Test an undeclared relation fails
    #[test]
    fn test_unknown_relation_name() {
        let (_, resource) = setup();
        let err = resource.build_relation("nopenopenope", None).unwrap_err();
        assert!(matches!(err, Error::NoRelation { .. }));
        assert!(err.to_string().contains("No such relation"));
    }

    /// Test the unknown class type is rejected
    #[test]
    fn test_unknown_class_type() {
        let (_, resource) = setup();
        let err = resource.build_relation("unknown", None).unwrap_err();
        assert!(err.to_string().contains("Unknown class"));

        // An explicit class does not rescue an unknown class type
        assert!(resource.build_relation("unknown", Some(Arc::new(Whatever))).is_err());
    }

    /// Test relation classes are looked up in the cache
    #[test]
    fn test_relation_class_comes_from_the_cache() {
        let (session, resource) = setup();

        // Not cached yet
        assert!(matches!(
            resource.build_relation("jobs", None),
            Err(Error::NotCached { .. })
        ));

        let jobs_class = memory_factory(&session, pipe_descriptor())
            .construct_collection_for("test", "JobCollection")
            .unwrap();
        assert_eq!(jobs_class.resource_name(), Some("Job"));

        let rel = resource.build_relation("jobs", None).unwrap();
        let jobs = rel.as_any().downcast_ref::<Collection>().unwrap();
        assert!(Arc::ptr_eq(jobs.class(), &jobs_class));
        // Identifiers are inherited from the parent resource
        assert_eq!(rel.get_identifiers().unwrap(), kwargs(json!({"id": "1872baf45"})));
    }

    /// Test an explicit class overrides the cached one
    #[test]
    fn test_explicit_class_wins() {
        let (session, resource) = setup();
        session.cache().set_collection(
            "test",
            "JobCollection",
            Arc::new(CollectionClass::new("test", "JobCollection", Default::default())),
            None,
        );

        let rel = resource.build_relation("jobs", Some(Arc::new(Whatever))).unwrap();
        assert!(rel.as_any().downcast_ref::<WhateverObject>().is_some());
        assert_eq!(rel.get_identifiers().unwrap(), kwargs(json!({"id": "1872baf45"})));
    }
}

/// Test module for the resource factory
mod resource_factory_tests {
    use super::*;

    /// Test one method is generated per declared operation
    #[test]
    fn test_construct_for_generates_methods() {
        let session = session();
        let class = memory_factory(&session, pipe_descriptor())
            .construct_for("test", "Pipeline")
            .unwrap();

        assert_eq!(class.method_names(), vec!["delete", "get"]);
        let get = class.method("get").unwrap();
        assert_eq!(get.connection_method, "read_pipeline");
        // No connection class cached yet
        assert_eq!(get.docstring, dynclient::docs::DEFAULT_DOCSTRING);
    }

    /// Test docstrings are copied from the cached connection class
    #[test]
    fn test_docstrings_come_from_the_cached_connection_class() {
        let session = session();
        ConnectionFactory::new(session.clone())
            .construct_for("test")
            .unwrap();

        let class = memory_factory(&session, pipe_descriptor())
            .construct_for("test", "Pipeline")
            .unwrap();
        assert!(class.docstring("delete").unwrap().starts_with("Deletes a pipeline.\n"));
        assert!(class.docstring("delete").unwrap().contains(":param id: The pipeline id."));
    }

    /// Test each variant is cached separately
    #[test]
    fn test_classes_are_cached_per_variant() {
        let session = session();
        let factory = memory_factory(&session, pipe_descriptor());

        let first = factory.construct_for("test", "Pipeline").unwrap();
        let second = factory.construct_for("test", "Pipeline").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let custom = factory
            .construct_variant("test", "Pipeline", "custom", pipe_hooks())
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &custom));
        assert_eq!(custom.variant(), "custom");
        assert!(session.cache().get_resource("test", "Pipeline", Some("custom")).is_ok());
    }

    /// Test a resource call over a generated connection
    #[test]
    fn test_end_to_end_over_a_real_connection() {
        let session = session();
        let connection = ConnectionFactory::new(session.clone())
            .construct_for("test")
            .unwrap()
            .connect(None)
            .unwrap();
        let class = memory_factory(&session, pipe_descriptor())
            .construct_for("test", "Pipeline")
            .unwrap();

        let mut pipeline = class.instantiate(Arc::new(connection), kwargs(json!({"id": "1872baf45"})));
        let result = pipeline.call("get", Map::new()).unwrap();

        assert_eq!(result["Pipeline"]["Status"], "Active");
        assert_eq!(pipeline.attribute("name"), Some(&json!("A pipe")));
        assert_eq!(pipeline.attribute("status"), Some(&json!("Active")));
    }

    /// Test that a changed connection parameter is seen by existing resources
    #[test]
    fn test_late_binding_of_connection_params() {
        let session = session();
        let connection_class = ConnectionFactory::new(session.clone())
            .construct_for("test")
            .unwrap();
        let connection = connection_class.connect(None).unwrap();
        let class = memory_factory(&session, pipe_descriptor())
            .construct_for("test", "Pipeline")
            .unwrap();
        let mut pipeline = class.instantiate(Arc::new(connection), kwargs(json!({"id": "1872baf45"})));

        assert!(pipeline.call("get", Map::new()).is_ok());

        connection_class
            .details()
            .write()
            .unwrap()
            .service_data_mut()
            .unwrap()
            .get_mut("read_pipeline")
            .unwrap()
            .param_mut("include_jobs")
            .unwrap()
            .required = true;

        assert!(matches!(
            pipeline.call("get", Map::new()),
            Err(Error::InvalidInvocation { .. })
        ));
        assert!(pipeline
            .call("get", kwargs(json!({"include_jobs": true})))
            .is_ok());
    }

    /// Test that a changed result key is used for the next promotion
    #[test]
    fn test_late_binding_of_result_key() {
        let session = session();
        let connection = ConnectionFactory::new(session.clone())
            .construct_for("test")
            .unwrap()
            .connect(None)
            .unwrap();
        let class = memory_factory(&session, pipe_descriptor())
            .construct_for("test", "Pipeline")
            .unwrap();
        let mut pipeline = class.instantiate(Arc::new(connection), kwargs(json!({"id": "1872baf45"})));

        pipeline.call("get", Map::new()).unwrap();
        assert_eq!(pipeline.attribute("status"), Some(&json!("Active")));
        assert_eq!(pipeline.attribute("job_count"), None);

        class
            .with_details(|details| {
                let get = details.resource_data_mut()?.operations.get_mut("get").unwrap();
                get.result_key = Some("Summary".to_string());
                Ok(())
            })
            .unwrap();

        pipeline.call("get", Map::new()).unwrap();
        assert_eq!(pipeline.attribute("job_count"), Some(&json!(3)));
    }

    /// Test a descriptor for another API version is rejected
    #[test]
    fn test_api_version_mismatch() {
        let mut descriptor = pipe_descriptor();
        descriptor.api_version = "2013-11-27".to_string();

        let result = memory_factory(&session(), descriptor).construct_for("test", "Pipeline");
        assert!(matches!(result, Err(Error::ApiVersionMismatch { .. })));
    }

    /// Test descriptors are loaded from a directory
    #[test]
    fn test_json_loader_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(format!("test-{}.json", API_VERSION)),
            serde_json::to_string(&pipe_descriptor()).unwrap(),
        )
        .unwrap();

        let factory = ResourceFactory::new(
            session(),
            Arc::new(JsonResourceLoader::new(vec![dir.path().to_path_buf()])),
        );
        let class = factory.construct_for("test", "Pipeline").unwrap();
        assert_eq!(class.method_names(), vec!["delete", "get"]);

        assert!(matches!(
            factory.construct_for("test", "Nope"),
            Err(Error::ResourceNotFound { .. })
        ));
    }
}

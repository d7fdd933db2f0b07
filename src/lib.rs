//! dynclient - runtime-generated bindings for remote services
//!
//! Given a session that can describe services (their operations, parameters
//! and API version) and a loader for declarative resource descriptors, this
//! crate builds callable bindings at runtime:
//!
//! - [`ConnectionFactory`] generates one method per service operation and
//!   validates, invokes and error-checks every call.
//! - [`ResourceFactory`] generates resource types that carry identifier
//!   values, inject them into calls, promote response fields to attributes
//!   and follow relations to other resources and collections.
//! - [`ServiceCache`] memoizes generated classes per service, per name and
//!   per variant.
//!
//! Nothing is generated at compile time; bindings follow whatever the
//! session reports when they are first built.

pub mod cache;
pub mod collection;
pub mod connection;
pub mod docs;
pub mod error;
pub mod introspection;
pub mod resource;
pub mod session;

pub use cache::{ServiceCache, DEFAULT_VARIANT};
pub use collection::{Collection, CollectionClass};
pub use connection::{kwargs, Connection, ConnectionClass, ConnectionFactory, ServiceConnection};
pub use error::{Error, Result};
pub use resource::{
    JsonResourceLoader, RelatedClass, RelatedObject, Resource, ResourceClass, ResourceFactory,
    ResourceHooks, ResourceLoader,
};
pub use session::{CoreSession, RawService, Session, StaticService, StaticSession};

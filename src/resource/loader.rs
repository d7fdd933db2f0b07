//! Resource descriptor loading
//!
//! A resource descriptor declares, for one service and API version, which
//! resources and collections exist, how they are identified, which service
//! operations they expose and how they relate to each other.
//!
//! Descriptors live in JSON files named `<service>-<api_version>.json` (or
//! `<service>.json`) inside one or more search directories.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Key field of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub var_name: String,
    pub api_name: String,
}

/// Resource-level operation mapped onto a service operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub api_name: String,
    /// Response field to unwrap before promoting attributes
    #[serde(default)]
    pub result_key: Option<String>,
}

/// What a relation points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    Resource,
    Collection,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ClassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClassType::Resource => "resource",
            ClassType::Collection => "collection",
            ClassType::Unknown => "unknown",
        })
    }
}

/// Relation cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    #[serde(rename = "1-1")]
    OneToOne,
    #[serde(rename = "1-M")]
    OneToMany,
    #[serde(rename = "M-M")]
    ManyToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default)]
    pub class_type: ClassType,
    #[serde(default)]
    pub rel_type: Option<RelType>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationSpec>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Name of the resource the collection groups
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    #[serde(default)]
    pub operations: BTreeMap<String, OperationSpec>,
}

/// Root structure of a descriptor file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub api_version: String,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionSpec>,
}

/// Source of resource descriptors
pub trait ResourceLoader: Send + Sync {
    /// Load the descriptor for a service, preferring the requested version
    fn load(&self, service_name: &str, api_version: Option<&str>) -> Result<Arc<ResourceDescriptor>>;
}

/// Descriptors registered in memory
#[derive(Debug, Default)]
pub struct MemoryResourceLoader {
    descriptors: Mutex<HashMap<String, Arc<ResourceDescriptor>>>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptor(self, service_name: &str, descriptor: ResourceDescriptor) -> Self {
        self.insert(service_name, descriptor);
        self
    }

    pub fn insert(&self, service_name: &str, descriptor: ResourceDescriptor) {
        self.descriptors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(service_name.to_string(), Arc::new(descriptor));
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn load(&self, service_name: &str, _api_version: Option<&str>) -> Result<Arc<ResourceDescriptor>> {
        self.descriptors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service_name)
            .cloned()
            .ok_or_else(|| Error::DescriptorNotFound {
                service: service_name.to_string(),
                searched: Vec::new(),
            })
    }
}

/// Loads descriptors from JSON files in a list of directories
///
/// Lookup order, per directory (earlier directories win):
/// 1. `<service>-<api_version>.json` when a version is requested
/// 2. `<service>.json`
/// 3. the lexicographically latest `<service>-*.json`
#[derive(Debug, Default)]
pub struct JsonResourceLoader {
    search_dirs: Vec<PathBuf>,
    loaded: Mutex<HashMap<(String, Option<String>), Arc<ResourceDescriptor>>>,
}

impl JsonResourceLoader {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    fn latest_versioned(dir: &Path, service_name: &str) -> Option<PathBuf> {
        let prefix = format!("{}-", service_name);
        let entries = std::fs::read_dir(dir).ok()?;

        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some("json")
                    && path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|stem| stem.starts_with(&prefix))
            })
            .max()
    }

    /// Resolve the file a descriptor would be loaded from
    pub fn find_path(&self, service_name: &str, api_version: Option<&str>) -> Option<PathBuf> {
        for dir in &self.search_dirs {
            if let Some(version) = api_version {
                let exact = dir.join(format!("{}-{}.json", service_name, version));
                if exact.is_file() {
                    return Some(exact);
                }
            }

            let plain = dir.join(format!("{}.json", service_name));
            if plain.is_file() {
                return Some(plain);
            }

            if let Some(latest) = Self::latest_versioned(dir, service_name) {
                return Some(latest);
            }
        }

        None
    }
}

impl ResourceLoader for JsonResourceLoader {
    fn load(&self, service_name: &str, api_version: Option<&str>) -> Result<Arc<ResourceDescriptor>> {
        let key = (service_name.to_string(), api_version.map(str::to_string));

        if let Some(descriptor) = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(descriptor));
        }

        let Some(path) = self.find_path(service_name, api_version) else {
            return Err(Error::DescriptorNotFound {
                service: service_name.to_string(),
                searched: self.search_dirs.clone(),
            });
        };

        tracing::debug!("Loading resource descriptor for {} from {:?}", service_name, path);
        let content = std::fs::read_to_string(&path)?;
        let descriptor: Arc<ResourceDescriptor> = Arc::new(serde_json::from_str(&content)?);

        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&descriptor));

        Ok(descriptor)
    }
}

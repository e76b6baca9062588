//! Explicit mapping from resource name to its backend operations

use super::api::ResourceApi;
use super::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// CRUD verb requested of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Get,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Registry of resource backends.
///
/// Lookups never fall back: an unknown name or unsupported verb is an error
/// returned before any remote call is made.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    apis: BTreeMap<String, Arc<dyn ResourceApi>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn register(mut self, name: impl Into<String>, api: Arc<dyn ResourceApi>) -> Self {
        self.insert(name, api);
        self
    }

    /// Register `api` under `name`, replacing any previous entry
    pub fn insert(&mut self, name: impl Into<String>, api: Arc<dyn ResourceApi>) {
        let name = name.into();
        debug!(resource = %name, "Resource registered");
        self.apis.insert(name, api);
    }

    /// Look up the backend for `(name, verb)`
    pub fn resolve(&self, name: &str, verb: Verb) -> Result<Arc<dyn ResourceApi>, ResourceError> {
        let api = self
            .apis
            .get(name)
            .ok_or_else(|| ResourceError::UnknownResource {
                name: name.to_string(),
                known: self.names(),
            })?;

        if !api.supports(verb) {
            return Err(ResourceError::UnsupportedVerb {
                resource: name.to_string(),
                verb,
            });
        }
        Ok(api.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.apis.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.apis.keys().cloned().collect()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.names())
            .finish()
    }
}

//! Realm authorizer
//!
//! The decision a resource-owning service makes when the gateway delegates
//! to it: find the resource named by the forwarded path, look up its realm
//! and allow iff the caller holds that realm as a role.

use crate::error::RealmError;
use crate::identity::RoleSet;
use crate::realm::types::{PathTemplate, Realm, ResourceRef};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves a resource to its realm
pub trait RealmLookup: Send + Sync {
    /// `None` when the resource does not exist
    fn realm_of(&self, kind: &str, id: &str) -> Option<Realm>;
}

/// In-memory resource table: kind -> id -> realm
///
/// Loaded from JSON shaped like
/// `{"photos": {"<id>": "public"}, "albums": {"<id>": "family"}}`.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    resources: HashMap<String, HashMap<String, Realm>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let resources = serde_json::from_str(json)?;
        Ok(Self { resources })
    }

    pub fn load(path: &Path) -> Result<Self, RealmError> {
        let location = path.display().to_string();
        let json = std::fs::read_to_string(path).map_err(|source| RealmError::Read {
            path: location.clone(),
            source,
        })?;
        let table = Self::from_json(&json).map_err(|source| RealmError::Parse {
            path: location.clone(),
            source,
        })?;

        info!(path = %location, resources = table.len(), "Loaded resource table");
        Ok(table)
    }

    pub fn insert(&mut self, kind: &str, id: &str, realm: Realm) {
        self.resources
            .entry(kind.to_string())
            .or_default()
            .insert(id.to_string(), realm);
    }

    pub fn len(&self) -> usize {
        self.resources.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RealmLookup for ResourceTable {
    fn realm_of(&self, kind: &str, id: &str) -> Option<Realm> {
        self.resources.get(kind)?.get(id).cloned()
    }
}

/// Outcome of a realm check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmDecision {
    Allowed,
    /// The caller lacks the resource's realm
    Denied,
    /// The path names a resource that does not exist
    NotFound,
    /// The path matches no template
    BadRequest,
}

impl RealmDecision {
    /// HTTP status of the decision
    pub fn status_code(&self) -> u16 {
        match self {
            RealmDecision::Allowed => 200,
            RealmDecision::Denied => 403,
            RealmDecision::NotFound => 404,
            RealmDecision::BadRequest => 400,
        }
    }
}

pub struct RealmAuthorizer {
    template: PathTemplate,
    lookup: Arc<dyn RealmLookup>,
}

impl RealmAuthorizer {
    pub fn new(template: PathTemplate, lookup: Arc<dyn RealmLookup>) -> Self {
        Self { template, lookup }
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    pub fn authorize(&self, uri: &str, roles: &RoleSet) -> RealmDecision {
        if uri.trim().is_empty() {
            return RealmDecision::BadRequest;
        }

        let Some(ResourceRef { kind, id }) = self.template.extract(uri) else {
            debug!(uri, "Path matches no resource template");
            return RealmDecision::BadRequest;
        };

        let Some(realm) = self.lookup.realm_of(&kind, &id) else {
            debug!(uri, kind = %kind, id = %id, "Unknown resource");
            return RealmDecision::NotFound;
        };

        let decision = if roles.contains(realm.as_role()) {
            RealmDecision::Allowed
        } else {
            RealmDecision::Denied
        };
        debug!(uri, kind = %kind, id = %id, %realm, roles = %roles, ?decision, "Realm check");
        decision
    }
}

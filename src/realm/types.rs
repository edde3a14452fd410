//! Realm types
//!
//! A realm is the access class of a single resource. Its label doubles as
//! the role a caller must hold to reach the resource.

use crate::error::RealmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access class of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Realm {
    Public,
    Protected,
    Private,
    /// Any other label, e.g. `family`
    Role(String),
}

impl Realm {
    /// Parse a realm label (case-insensitive)
    pub fn parse(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "public" => Realm::Public,
            "protected" => Realm::Protected,
            "private" => Realm::Private,
            _ => Realm::Role(label),
        }
    }

    /// Role a caller must hold
    pub fn as_role(&self) -> &str {
        match self {
            Realm::Public => "public",
            Realm::Protected => "protected",
            Realm::Private => "private",
            Realm::Role(role) => role,
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_role())
    }
}

impl From<Realm> for String {
    fn from(realm: Realm) -> Self {
        realm.as_role().to_string()
    }
}

impl From<String> for Realm {
    fn from(s: String) -> Self {
        Realm::parse(&s)
    }
}

/// Resource named by a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: String,
    pub id: String,
}

/// Normalize a request path
///
/// Drops the query and fragment, collapses repeated slashes and resolves
/// `.` and `..` segments. The result always starts with `/`.
pub fn normalize_path(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or_default();

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// `{prefix}/{kind}/{id}[/...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    prefix: Vec<String>,
    kinds: Vec<String>,
}

impl PathTemplate {
    /// Template for resources of `kinds` under `prefix` (e.g. `/photos/api`)
    pub fn new<I, S>(prefix: &str, kinds: I) -> Result<Self, RealmError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !prefix.starts_with('/') {
            return Err(RealmError::Template(format!(
                "prefix '{}' must start with '/'",
                prefix
            )));
        }

        let kinds: Vec<String> = kinds
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if kinds.is_empty() {
            return Err(RealmError::Template("at least one resource kind is required".into()));
        }
        if let Some(kind) = kinds.iter().find(|k| k.contains('/')) {
            return Err(RealmError::Template(format!(
                "resource kind '{}' must be a single path segment",
                kind
            )));
        }

        let prefix = normalize_path(prefix)
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self { prefix, kinds })
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Pull the resource out of a request path
    ///
    /// `None` when the path is not under the prefix, names an unknown kind,
    /// or stops before the id.
    pub fn extract(&self, uri: &str) -> Option<ResourceRef> {
        let normalized = normalize_path(uri);
        let mut segments = normalized.split('/').filter(|s| !s.is_empty());

        for expected in &self.prefix {
            if segments.next()? != expected.as_str() {
                return None;
            }
        }

        let kind = segments.next()?;
        let id = segments.next()?;
        self.kinds.iter().any(|k| k.as_str() == kind).then(|| ResourceRef {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }
}

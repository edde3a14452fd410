//! Identity types
//!
//! Caller identity, normalized role sets and the records exchanged with the
//! identity provider and user store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role every caller holds
pub const PUBLIC_ROLE: &str = "public";

/// Role injected for the configured administrator
pub const ADMIN_ROLE: &str = "admin";

/// Normalized set of role tokens
///
/// Tokens are trimmed and lower-cased on insertion. The comma-joined form
/// only exists at the HTTP boundary (`X-Forwarded-Roles`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The anonymous role set: `{"public"}`
    pub fn public() -> Self {
        let mut roles = Self::new();
        roles.insert(PUBLIC_ROLE);
        roles
    }

    /// Parse a comma-joined role string, dropping empty tokens
    pub fn parse(s: &str) -> Self {
        s.split(',').collect()
    }

    /// Insert a role, returning whether it was new
    pub fn insert(&mut self, role: &str) -> bool {
        let role = role.trim().to_lowercase();
        if role.is_empty() {
            return false;
        }
        self.0.insert(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role) || self.0.contains(&role.trim().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-joined, sorted form used on the wire
    pub fn to_header_value(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl<S: AsRef<str>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut roles = RoleSet::new();
        for role in iter {
            roles.insert(role.as_ref());
        }
        roles
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

impl From<RoleSet> for String {
    fn from(roles: RoleSet) -> Self {
        roles.to_header_value()
    }
}

impl From<String> for RoleSet {
    fn from(s: String) -> Self {
        RoleSet::parse(&s)
    }
}

/// A caller's resolved identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// `None` for anonymous callers
    pub email: Option<String>,
    pub display_name: String,
    pub picture: String,
    pub roles: RoleSet,
    pub enabled: bool,
}

impl Identity {
    /// Caller without a usable credential
    pub fn anonymous() -> Self {
        Self {
            email: None,
            display_name: String::new(),
            picture: String::new(),
            roles: RoleSet::public(),
            enabled: true,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.email.is_none()
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Raw session credential taken from the caller's cookie
///
/// Debug output is redacted; use [`Credential::expose`] where the value is
/// actually needed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential; blank values are treated as absent
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Claims returned by the identity provider for a verified credential
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VerifiedClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// A user as known to the user store
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Comma-separated roles, e.g. `public,protected,photos`
    #[serde(default)]
    pub roles: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

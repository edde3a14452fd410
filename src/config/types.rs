//! Configuration types for gatekeeper
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::identity::{RoleSet, UserRecord};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gateway listener
    pub server: ServerConfig,

    /// Rule file
    pub rules: RulesConfig,

    /// Identity provider and user store
    pub identity: IdentityConfig,

    /// Cookies and the per-caller identity cache
    pub session: SessionConfig,

    /// Delegated decisions
    pub delegation: DelegationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Reference resource service (`gatekeeper-realm`)
    pub realm: RealmConfig,
}

/// Gateway listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rule file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Path of the rule file (`action, pattern[, role]` per line)
    pub path: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("roles.csv"),
        }
    }
}

/// Identity provider and user store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Credential verification endpoint
    pub provider_url: String,

    /// Base URL of the user store (`GET {url}/users/{email}`)
    pub user_store_url: Option<String>,

    /// Email that always receives the `admin` role (env: ADMIN_EMAIL)
    pub admin_email: Option<String>,

    /// Roles of logged-in users unknown to the user store
    pub default_roles: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Users served from configuration when no user store URL is set
    pub users: Vec<UserRecord>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://127.0.0.1:8080/verify".to_string(),
            user_store_url: None,
            admin_email: None,
            default_roles: crate::identity::DEFAULT_USER_ROLES.to_string(),
            timeout_secs: 10,
            users: Vec::new(),
        }
    }
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn default_role_set(&self) -> RoleSet {
        RoleSet::parse(&self.default_roles)
    }
}

/// Session cookie and identity cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie holding the raw credential issued by the identity provider
    pub credential_cookie: String,

    /// Cookie holding the caller's session id
    pub cache_cookie: String,

    /// Seconds a resolved identity stays fresh
    pub cache_ttl_secs: u64,

    /// Seconds of inactivity before a caller session is dropped
    pub idle_timeout_secs: u64,

    /// Seconds between idle-session sweeps
    pub sweep_interval_secs: u64,

    /// `Domain` attribute of issued cookies
    pub cookie_domain: Option<String>,

    /// Mark issued cookies `Secure`
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_cookie: "session".to_string(),
            cache_cookie: "session_cache".to_string(),
            cache_ttl_secs: 3600,
            idle_timeout_secs: 14 * 24 * 60 * 60,
            sweep_interval_secs: 300,
            cookie_domain: None,
            secure_cookies: false,
        }
    }
}

impl SessionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Delegation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    /// Seconds allowed for a delegated decision
    pub timeout_secs: u64,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

impl DelegationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Reference resource service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    pub host: String,
    pub port: u16,

    /// Path prefix in front of `{kind}/{id}`
    pub prefix: String,

    /// Recognized resource kinds
    pub kinds: Vec<String>,

    /// JSON resource table
    pub resources: PathBuf,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
            prefix: "/photos/api".to_string(),
            kinds: vec!["photos".to_string(), "albums".to_string()],
            resources: PathBuf::from("resources.json"),
        }
    }
}

impl RealmConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

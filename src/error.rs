//! Error types for gatekeeper
//!
//! This module defines the error hierarchy used throughout the gateway.
//! Most of these never reach an HTTP response: rule, identity and
//! delegation failures are absorbed into a deny or anonymous outcome at the
//! boundary where they occur. Only [`DecisionError`] surfaces as a 500.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Delegation error: {0}")]
    Delegation(#[from] DelegationError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Realm error: {0}")]
    Realm(#[from] RealmError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },
}

/// A single rule line that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("line {line}: expected at least 2 fields, got {fields}")]
    TooFewFields { line: usize, fields: usize },

    #[error("line {line}: empty uri pattern")]
    EmptyPattern { line: usize },

    #[error("line {line}: empty delegation target")]
    EmptyDelegationTarget { line: usize },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl RuleError {
    /// Attach a line number to a pattern error
    pub fn at_line(self, line: usize) -> Self {
        match self {
            RuleError::InvalidPattern { pattern, reason } => RuleError::InvalidPattern {
                pattern,
                reason: format!("line {}: {}", line, reason),
            },
            other => other,
        }
    }
}

/// Identity resolution errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("User store error: {0}")]
    Directory(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl IdentityError {
    /// Map an identity provider HTTP status to an error
    pub fn from_provider_status(status: u16, body: &str) -> Self {
        match status {
            400 | 401 | 403 => IdentityError::InvalidCredential(if body.is_empty() {
                format!("rejected by identity provider (HTTP {})", status)
            } else {
                body.to_string()
            }),
            _ => IdentityError::Provider(format!("HTTP {}", status)),
        }
    }
}

/// Delegation failures
///
/// The delegation client never returns these to its caller; they exist so
/// the logged failure carries a class that separates network trouble from
/// a remote refusal or a request we could not even build.
#[derive(Error, Debug)]
pub enum DelegationError {
    #[error("delegation to {target} timed out after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },

    #[error("could not connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("{target} refused with HTTP {status}")]
    Rejected { target: String, status: u16 },

    #[error("could not build delegation request for {target}: {reason}")]
    InvalidRequest { target: String, reason: String },

    #[error("delegation to {target} failed: {source}")]
    Request {
        target: String,
        #[source]
        source: reqwest::Error,
    },
}

impl DelegationError {
    /// Short class name for structured logs
    pub fn class(&self) -> &'static str {
        match self {
            DelegationError::Timeout { .. } => "timeout",
            DelegationError::Connect { .. } => "connect",
            DelegationError::Rejected { .. } => "rejected",
            DelegationError::InvalidRequest { .. } => "invalid_request",
            DelegationError::Request { .. } => "request",
        }
    }
}

/// Faults inside the decision path itself
#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("role set cannot be encoded as a header value: {0}")]
    RoleHeader(String),
}

/// Resource table errors for resource-owning services
#[derive(Error, Debug)]
pub enum RealmError {
    #[error("Failed to read resource table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid resource table {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid path template: {0}")]
    Template(String),
}

/// Transport layer errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for identity operations
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

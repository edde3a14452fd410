//! Forward-auth gateway
//!
//! A reverse proxy calls `GET /authorize` for every protected request. The
//! gateway resolves the caller's roles from their session credential,
//! evaluates an ordered glob rule table against the requested path and,
//! when a rule says so, delegates the final answer to the service that
//! owns the resource.
//!
//! ## Rule Model
//!
//! ```text
//! # action, uri pattern, role (optional)
//! deny,  /auth/authorize
//! allow, /auth/*,          public
//! allow, /admin/*,         admin
//! allow, /photos/api/*,    !photos:8000
//! allow, /static/*
//! ```
//!
//! - the first rule whose pattern matches the full path decides
//! - `deny` always denies; no role column allows everyone
//! - a role allows callers holding that role
//! - `!host[:port]` asks `http://host:port/authorize`; any failure denies
//! - no match denies
//!
//! ## Example Configuration
//!
//! ```toml
//! [rules]
//! path = "/etc/gatekeeper/roles.csv"
//!
//! [identity]
//! provider_url = "http://idp:8080/verify"
//! user_store_url = "http://users:8080"
//! # admin_email from ADMIN_EMAIL env var
//!
//! [session]
//! cache_ttl_secs = 3600
//! secure_cookies = true
//! ```

pub mod config;
pub mod decision;
pub mod delegation;
pub mod error;
pub mod identity;
pub mod logging;
pub mod realm;
pub mod rules;
pub mod server;

// Re-export main types
pub use config::{AppConfig, load_config};
pub use decision::{Decision, DecisionEngine};
pub use error::{AppError, Result};
pub use server::AppState;

//! Authorization rules
//!
//! An ordered table of `action, uri_pattern[, role]` rules loaded from a
//! line-oriented file.
//!
//! ## Rule Source
//!
//! ```text
//! # action, uri_pattern, role
//! deny,  /auth/authorize
//! allow, /auth/users*, admin
//! allow, /auth/*, public
//! allow, /photos/api/albums/*, !photos:8000
//! ```
//!
//! - `action`: `allow` (any case); anything else denies
//! - `uri_pattern`: shell glob matched against the full request path
//! - `role`: empty applies to every caller, `!host[:port]` delegates the
//!   decision to that service, anything else names a required role
//!
//! The first rule whose pattern matches decides. A path no rule matches is
//! denied.

pub mod patterns;
pub mod store;
pub mod types;

pub use patterns::GlobPattern;
pub use store::{RuleStore, load_rules, parse_rule_line, parse_rules};
pub use types::{DELEGATION_MARKER, Rule, RuleAction, RuleTable, RuleTarget};

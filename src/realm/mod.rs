//! Resource realm authorization
//!
//! The contract resource-owning services implement so the gateway can
//! delegate to them: extract `{kind, id}` from the forwarded path, look up
//! the resource's realm and allow iff the caller's roles include it.
//! `NotFound` stays distinguishable from `Denied` so a proxy can tell a
//! missing resource from a forbidden one.

pub mod authorizer;
pub mod service;
pub mod types;

pub use authorizer::{RealmAuthorizer, RealmDecision, RealmLookup, ResourceTable};
pub use service::router;
pub use types::{PathTemplate, Realm, ResourceRef, normalize_path};

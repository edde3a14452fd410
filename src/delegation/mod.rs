//! Delegated authorization
//!
//! Rules with a `!host[:port]` target hand the decision to the service
//! owning the resource. See [`client::DelegationClient`].

pub mod client;

pub use client::{
    DEFAULT_DELEGATION_TIMEOUT, DelegationClient, RequestContext, X_FORWARDED_HOST,
    X_FORWARDED_METHOD, X_FORWARDED_PROTO, X_FORWARDED_ROLES, X_FORWARDED_URI, authorize_url,
};

//! Realm authorization endpoint
//!
//! HTTP face of [`RealmAuthorizer`] for resource-owning services. The
//! gateway delegates to `GET /authorize` with the original path in
//! `X-Forwarded-Uri` and the caller's roles in `X-Forwarded-Roles`.

use crate::delegation::{X_FORWARDED_ROLES, X_FORWARDED_URI};
use crate::identity::RoleSet;
use crate::realm::authorizer::{RealmAuthorizer, RealmDecision};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Router serving `/authorize` and `/health`
pub fn router(authorizer: Arc<RealmAuthorizer>) -> Router {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(authorizer)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn authorize(
    State(authorizer): State<Arc<RealmAuthorizer>>,
    headers: HeaderMap,
) -> Response {
    let uri = header_str(&headers, &X_FORWARDED_URI).unwrap_or_default();
    let roles = RoleSet::parse(header_str(&headers, &X_FORWARDED_ROLES).unwrap_or("public"));

    let decision = authorizer.authorize(uri, &roles);
    let status =
        StatusCode::from_u16(decision.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match decision {
        RealmDecision::Allowed => json!({"status": "authorized"}),
        RealmDecision::Denied => json!({"detail": format!("Access denied for {}", uri)}),
        RealmDecision::NotFound => json!({"detail": format!("Resource not found: {}", uri)}),
        RealmDecision::BadRequest if uri.is_empty() => {
            json!({"detail": "X-Forwarded-Uri header required"})
        }
        RealmDecision::BadRequest => {
            json!({"detail": format!("Unrecognized resource path: {}", uri)})
        }
    };

    (status, Json(body)).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

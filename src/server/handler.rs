//! Gateway request handlers
//!
//! `GET /authorize` is the forward-auth endpoint the reverse proxy calls for
//! every protected request. The proxy lets the request through on 200 and
//! copies `X-Forwarded-Roles` onto it; any other status blocks it.

use crate::decision::Decision;
use crate::delegation::{
    RequestContext, X_FORWARDED_HOST, X_FORWARDED_METHOD, X_FORWARDED_PROTO, X_FORWARDED_ROLES,
    X_FORWARDED_URI,
};
use crate::identity::{Credential, Identity, unix_now};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn request_context(headers: &HeaderMap, credential: Option<Credential>) -> RequestContext {
    let owned = |name: &HeaderName| header_str(headers, name).map(String::from);
    RequestContext {
        method: owned(&X_FORWARDED_METHOD),
        host: owned(&X_FORWARDED_HOST),
        proto: owned(&X_FORWARDED_PROTO),
        user_agent: owned(&header::USER_AGENT),
        credential,
    }
}

/// Resolve the caller through their session
///
/// Returns the identity and, when a new session was stored, the
/// `Set-Cookie` value issuing its id. Resolution failures degrade to the
/// anonymous identity.
async fn resolve_caller(
    state: &AppState,
    headers: &HeaderMap,
    credential: Option<&Credential>,
) -> (Identity, Option<String>) {
    let now = unix_now();
    let session_id = state.cookies.session_id(headers);
    let mut handle = state.sessions.load(session_id.as_ref(), credential, now);

    let identity = match state
        .resolver
        .resolve(credential, &mut handle.session, now)
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Identity resolution failed, treating caller as public");
            Identity::anonymous()
        }
    };

    // Callers with nothing cached do not get a session
    if handle.is_new && handle.session.is_empty() {
        return (identity, None);
    }

    let set_cookie = handle
        .is_new
        .then(|| state.cookies.session_cookie(&handle.id));
    state.sessions.store(handle.id, handle.session, now);
    (identity, set_cookie)
}

fn with_set_cookie(mut response: Response, set_cookie: Option<String>) -> Response {
    if let Some(cookie) = set_cookie
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// `GET /authorize`
pub async fn authorize(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let path = header_str(&headers, &X_FORWARDED_URI).unwrap_or("/");
    let credential = state.cookies.credential(&headers);

    let (identity, set_cookie) = resolve_caller(&state, &headers, credential.as_ref()).await;
    let ctx = request_context(&headers, credential);

    let response = match state.engine.decide(path, &identity.roles, &ctx).await {
        Ok(Decision::Allowed) => {
            let roles = identity.roles.to_header_value();
            debug!(path, user = ?identity.email, roles = %roles, "Authorized");
            match HeaderValue::from_str(&roles) {
                Ok(value) => (
                    StatusCode::OK,
                    [(X_FORWARDED_ROLES, value)],
                    Json(json!({
                        "status": "authorized",
                        "user": identity.email,
                        "roles": roles,
                    })),
                )
                    .into_response(),
                Err(e) => internal_error(&e.to_string()),
            }
        }
        Ok(Decision::Denied) => {
            info!(path, user = ?identity.email, roles = %identity.roles, "Access denied");
            (
                StatusCode::FORBIDDEN,
                Json(json!({"detail": "Access denied"})),
            )
                .into_response()
        }
        Err(e) => internal_error(&e.to_string()),
    };

    with_set_cookie(response, set_cookie)
}

fn internal_error(reason: &str) -> Response {
    error!(error = reason, "Error in authorization check");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "Internal server error in authorize"})),
    )
        .into_response()
}

/// Body of `GET /me`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeResponse {
    pub email: Option<String>,
    pub name: String,
    pub picture: String,
    pub roles: String,
    pub enabled: bool,
    pub logged_in: bool,
}

impl From<Identity> for MeResponse {
    fn from(identity: Identity) -> Self {
        Self {
            logged_in: !identity.is_anonymous(),
            roles: identity.roles.to_header_value(),
            email: identity.email,
            name: identity.display_name,
            picture: identity.picture,
            enabled: identity.enabled,
        }
    }
}

/// `GET /me`
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let credential = state.cookies.credential(&headers);
    let (identity, set_cookie) = resolve_caller(&state, &headers, credential.as_ref()).await;
    with_set_cookie(Json(MeResponse::from(identity)).into_response(), set_cookie)
}

#[derive(Debug, Deserialize)]
pub struct LogoutParams {
    redirect_uri: Option<String>,
}

/// `POST /logout`
///
/// Forgets the cached identity, expires the credential cookie and
/// redirects to `redirect_uri` (same-site paths only, default `/`).
pub async fn logout(
    State(state): State<AppState>,
    Query(params): Query<LogoutParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(credential) = state.cookies.credential(&headers) {
        let now = unix_now();
        let id = state.cookies.session_id(&headers);
        let mut handle = state.sessions.load(id.as_ref(), Some(&credential), now);
        if !handle.is_new && state.resolver.forget(&credential, &mut handle.session) {
            debug!("Cleared cached identity");
            state.sessions.store(handle.id, handle.session, now);
        }
    }

    let location = params
        .redirect_uri
        .filter(|uri| is_local_redirect(uri))
        .unwrap_or_else(|| "/".to_string());

    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    with_set_cookie(response, Some(state.cookies.expired_credential_cookie()))
}

/// Same-site path: browsers read `//host` and `/\host` as another origin
fn is_local_redirect(uri: &str) -> bool {
    let mut chars = uri.chars();
    chars.next() == Some('/') && !matches!(chars.next(), Some('/' | '\\'))
}

/// `GET /rules`
pub async fn rules_source(State(state): State<AppState>) -> Response {
    match state.rules().raw_source() {
        Ok(source) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv")],
            source,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Rule file not readable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "Rule file not available"})),
            )
                .into_response()
        }
    }
}

/// `POST /rules/reload`
pub async fn reload_rules(State(state): State<AppState>) -> Json<serde_json::Value> {
    let count = state.rules().reload();
    info!(rules = count, "Rule table reloaded");
    Json(json!({"rules": count}))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

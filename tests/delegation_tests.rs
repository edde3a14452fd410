//! Delegation client tests against a mock resource service

use gatekeeper::delegation::{DelegationClient, RequestContext, authorize_url};
use gatekeeper::identity::{Credential, RoleSet};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> DelegationClient {
    DelegationClient::new(Duration::from_secs(2)).unwrap()
}

fn target(server: &MockServer) -> String {
    server.address().to_string()
}

#[tokio::test]
async fn test_success_status_allows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let allowed = client()
        .delegate(&target(&server), "/photos/api/albums/a1", &RoleSet::public(), &RequestContext::default())
        .await;
    assert!(allowed);
}

#[tokio::test]
async fn test_any_2xx_allows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    assert!(
        client()
            .delegate(&target(&server), "/x", &RoleSet::public(), &RequestContext::default())
            .await
    );
}

#[tokio::test]
async fn test_non_success_statuses_deny() {
    for status in [301u16, 400, 403, 404, 500, 503] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/authorize"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let allowed = client()
            .delegate(&target(&server), "/x", &RoleSet::public(), &RequestContext::default())
            .await;
        assert!(!allowed, "status {} should deny", status);
    }
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let allowed = client()
        .delegate(&target(&server), "/photos/api/albums/a1", &RoleSet::public(), &RequestContext::default())
        .await;
    assert!(!allowed);
}

#[tokio::test]
async fn test_timeout_denies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = DelegationClient::new(Duration::from_millis(200)).unwrap();
    let allowed = client
        .delegate(&target(&server), "/x", &RoleSet::public(), &RequestContext::default())
        .await;
    assert!(!allowed);
}

#[tokio::test]
async fn test_unreachable_target_denies() {
    let allowed = client()
        .delegate("127.0.0.1:9", "/x", &RoleSet::public(), &RequestContext::default())
        .await;
    assert!(!allowed);
}

#[tokio::test]
async fn test_invalid_target_denies() {
    let allowed = client()
        .delegate("bad host:port", "/x", &RoleSet::public(), &RequestContext::default())
        .await;
    assert!(!allowed);
}

#[tokio::test]
async fn test_forwards_request_description() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .and(header("x-forwarded-uri", "/photos/api/albums/a1"))
        .and(header("x-forwarded-roles", "photos,public"))
        .and(header("x-forwarded-method", "DELETE"))
        .and(header("x-forwarded-host", "photos.example.com"))
        .and(header("x-forwarded-proto", "https"))
        .and(header("cookie", "sid=secret-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = RequestContext {
        method: Some("DELETE".into()),
        host: Some("photos.example.com".into()),
        proto: Some("https".into()),
        user_agent: Some("test-agent".into()),
        credential: None,
    }
    .with_credential(Credential::new("secret-token"));

    let client = client().with_credential_cookie("sid");
    let allowed = client
        .delegate(
            &target(&server),
            "/photos/api/albums/a1",
            &RoleSet::parse("public,photos"),
            &ctx,
        )
        .await;
    assert!(allowed);
}

#[tokio::test]
async fn test_proto_defaults_to_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .and(header("x-forwarded-proto", "http"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(
        client()
            .delegate(&target(&server), "/x", &RoleSet::public(), &RequestContext::default())
            .await
    );
}

#[test]
fn test_authorize_url_shape() {
    let url = authorize_url("photos-svc:8000").unwrap();
    assert_eq!(url.as_str(), "http://photos-svc:8000/authorize");
}

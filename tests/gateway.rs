//! End-to-end tests exercising the full request pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY, WWW_AUTHENTICATE,
};
use reqwest::StatusCode;

mod common;

use common::{gateway_config, start_gateway, MockMailer};

const ALLOWED_ORIGIN: &str = "https://acme.example";
const SITE_TOKEN: &str = "site-secret";
const TOKEN_HEADER: &str = "X-Formgate-Token";

async fn setup(rate_limit: i64) -> (SocketAddr, Arc<MockMailer>) {
    let mailer = Arc::new(MockMailer::default());
    let addr = start_gateway(gateway_config(rate_limit), Arc::clone(&mailer)).await;
    (addr, mailer)
}

fn form_url(addr: SocketAddr) -> String {
    format!("http://{addr}/v1/forms/acme/contact")
}

async fn submit(
    addr: SocketAddr,
    body: &str,
    token: Option<&str>,
    origin: Option<&str>,
) -> reqwest::Response {
    let mut request = reqwest::Client::new()
        .post(form_url(addr))
        .header("Content-Type", "application/json")
        .body(body.to_string());

    if let Some(token) = token {
        request = request.header(TOKEN_HEADER, token);
    }

    if let Some(origin) = origin {
        request = request.header(ORIGIN, origin);
    }

    request.send().await.expect("request should complete")
}

#[tokio::test]
async fn health_is_unauthenticated() {
    let (addr, _) = setup(20).await;

    let response = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-Request-Id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn valid_submission_is_accepted_and_notified() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"}"#,
        Some(SITE_TOKEN),
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert_eq!(response.headers()[VARY], "Origin");
    assert!(response.headers().contains_key("X-Request-Id"));
    assert_eq!(response.text().await.unwrap(), "accepted");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@acme.example");
    assert!(sent[0].subject.contains("Ada"));
    assert!(sent[0].html_body.contains("Ada"));
    assert!(sent[0].html_body.contains("hi"));
    assert!(sent[0].text_body.contains("Ada"));
    assert!(sent[0].text_body.contains("hi"));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"}"#,
        None,
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], TOKEN_HEADER);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"}"#,
        Some("not-the-token"),
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn disallowed_origin_is_forbidden() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"}"#,
        Some(SITE_TOKEN),
        Some("https://evil.example"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn missing_origin_is_forbidden_for_tenant_paths() {
    let (addr, mailer) = setup(20).await;

    let response = submit(addr, r#"{"name":"Ada","message":"hi"}"#, Some(SITE_TOKEN), None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (addr, _) = setup(20).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/v1/forms/acme/missing"))
        .header(TOKEN_HEADER, SITE_TOKEN)
        .header(ORIGIN, ALLOWED_ORIGIN)
        .body(r#"{"name":"Ada"}"#)
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_field_is_a_client_error() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi","extra":true}"#,
        Some(SITE_TOKEN),
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // Schema details stay in the log, not the response body.
    assert_eq!(response.text().await.unwrap(), "Bad Request");
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn missing_required_field_is_a_client_error() {
    let (addr, mailer) = setup(20).await;

    let response = submit(addr, r#"{"name":"Ada"}"#, Some(SITE_TOKEN), Some(ALLOWED_ORIGIN)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let (addr, mailer) = setup(20).await;

    let response = submit(addr, "{not json", Some(SITE_TOKEN), Some(ALLOWED_ORIGIN)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn trailing_json_values_are_rejected() {
    let (addr, mailer) = setup(20).await;

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"} {"second":true}"#,
        Some(SITE_TOKEN),
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (addr, mailer) = setup(20).await;

    let padding = "x".repeat(70_000);
    let body = format!(r#"{{"name":"Ada","message":"{padding}"}}"#);
    let response = submit(addr, &body, Some(SITE_TOKEN), Some(ALLOWED_ORIGIN)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn requests_over_the_limit_get_429() {
    let (addr, mailer) = setup(20).await;

    for _ in 0..20 {
        let response = submit(
            addr,
            r#"{"name":"Ada","message":"hi"}"#,
            Some(SITE_TOKEN),
            Some(ALLOWED_ORIGIN),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = submit(
        addr,
        r#"{"name":"Ada","message":"hi"}"#,
        Some(SITE_TOKEN),
        Some(ALLOWED_ORIGIN),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(mailer.sent().len(), 20);
}

#[tokio::test]
async fn preflight_reports_allowed_methods_and_headers() {
    let (addr, mailer) = setup(20).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, form_url(addr))
        .header(ORIGIN, ALLOWED_ORIGIN)
        .send()
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "600");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);

    let allow_headers = headers[ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
    assert!(allow_headers.contains("Content-Type"));
    assert!(allow_headers.contains(TOKEN_HEADER));

    // A preflight never triggers a notification.
    assert!(mailer.sent().is_empty());
}

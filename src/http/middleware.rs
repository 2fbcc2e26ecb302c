//! Request pipeline stages.
//!
//! Ordered cross-cutting checks applied to every inbound request before it
//! reaches a form handler. Outermost to innermost: panic recovery and the
//! body-size bound (tower-http layers wired in `server.rs`), then request
//! identification, access logging, optional debug header logging, path
//! resolution, CORS enforcement, token verification, and rate limiting.
//!
//! Ordering is deliberate: cheap rejecting checks run first, and token
//! verification precedes rate limiting so unauthenticated traffic cannot
//! exhaust a legitimate tenant's quota.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::http::server::AppState;
use crate::routing::registry::PathInfo;

/// Request extension carrying the request identifier.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Request extension carrying the resolved owning site id.
#[derive(Debug, Clone)]
pub struct SiteId(pub String);

fn plain_error(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

/// Attach a fresh random identifier to the request and echo it in the
/// `X-Request-Id` response header.
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().simple().to_string();

    let Ok(header_value) = HeaderValue::from_str(&id) else {
        tracing::error!("failed to assign a request ID");
        return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    };

    request.extensions_mut().insert(RequestId(id));

    let mut response = next.run(request).await;
    response.headers_mut().insert("X-Request-Id", header_value);

    response
}

/// Log one line per completed request.
pub async fn access_log(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_string(), |id| id.0.clone());

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        remote_ip = %addr.ip(),
        request_id = %request_id,
        "HTTP request"
    );

    response
}

/// Log raw request headers. Only active when `debugHeaders` is set.
pub async fn debug_headers(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.debug_headers {
        return next.run(request).await;
    }

    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_string(), |id| id.0.clone());

    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
        headers = ?request.headers(),
        "request headers"
    );

    next.run(request).await
}

/// Resolve the path against the registry and attach the owning site id.
pub async fn resolve_path(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(info) = state.registry.lookup(&path) else {
        return plain_error(StatusCode::NOT_FOUND, "Not Found");
    };

    if info.site.is_empty() {
        tracing::warn!(path = %path, "failed to assign site to request");
        return next.run(request).await;
    }

    tracing::debug!(site = %info.site, path = %path, "assigning site");

    let site = SiteId(info.site.clone());
    request.extensions_mut().insert(site);

    next.run(request).await
}

/// Whether a request path has the shape of a registered endpoint.
fn well_formed_path(path: &str) -> bool {
    !path.is_empty() && path != "/" && path.starts_with('/')
}

/// Enforce the per-tenant origin allow-list and echo CORS headers.
pub async fn enforce_cors(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if !well_formed_path(&path) {
        return plain_error(StatusCode::NOT_FOUND, "Not Found");
    }

    let Some(info) = state.registry.lookup(&path) else {
        return plain_error(StatusCode::FORBIDDEN, "Forbidden");
    };

    let wildcard = info.allows_any_origin();
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !wildcard {
        if origin.is_empty() {
            return plain_error(StatusCode::FORBIDDEN, "Forbidden");
        }

        if !info.allows_origin(&origin) {
            return plain_error(StatusCode::FORBIDDEN, "Forbidden");
        }
    }

    let mut response = next.run(request).await;

    if !origin.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&origin) {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
    }

    response
}

/// Verify the site or form token. CORS preflights bypass this stage.
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();

    if !well_formed_path(&path) {
        return plain_error(StatusCode::NOT_FOUND, "Not Found");
    }

    let Some(info) = state.registry.lookup(&path) else {
        return plain_error(StatusCode::FORBIDDEN, "Forbidden");
    };

    if info.token.is_empty() {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(info.token_header)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if presented.is_empty() || presented != info.token {
        return unauthorized(info);
    }

    next.run(request).await
}

fn unauthorized(info: &PathInfo) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, info.token_header)],
        "Unauthorized",
    )
        .into_response()
}

/// Enforce the fixed-window limit keyed by site and client IP.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let Some(site) = request.extensions().get::<SiteId>() else {
        tracing::error!(path = %request.uri().path(), "failed to get site for rate limiting");
        return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
    };

    let key = format!("{}|{}", site.0, addr.ip());

    if !state.limiter.allow(&key) {
        tracing::warn!(key = %key, "rate limit exceeded");
        return plain_error(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests");
    }

    next.run(request).await
}

//! Route handlers for the health check and form endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::config::schema::{Form, Notifier, FORM_TOKEN_HEADER, SITE_TOKEN_HEADER};
use crate::notify::mailer::MailerFactory;
use crate::notify::template::NotifierRuntime;
use crate::validate::validate_payload;

/// Startup error while preparing a form endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("site {site:?}, form {form:?}: {source}")]
    Template {
        site: String,
        form: String,
        source: crate::notify::template::TemplateError,
    },

    #[error("site {site:?}, form {form:?}: {source}")]
    Mailer {
        site: String,
        form: String,
        source: crate::notify::mailer::MailError,
    },
}

/// Per-form state shared by the submit and preflight handlers.
///
/// Built once at startup; the compiled notifier runtimes are immutable
/// and safe for unsynchronized concurrent reads.
pub struct FormEndpoint {
    pub site_id: String,
    pub form: Form,
    pub path: String,
    notifiers: Vec<NotifierRuntime>,
}

impl FormEndpoint {
    /// Compile the form's notifiers and freeze the endpoint state.
    pub fn new(
        site_id: &str,
        form: &Form,
        path: String,
        mailers: &dyn MailerFactory,
    ) -> Result<Self, EndpointError> {
        let mut notifiers = Vec::with_capacity(form.notifiers.len());

        for notifier in &form.notifiers {
            notifiers.push(compile_notifier(site_id, form, notifier, mailers)?);
        }

        Ok(Self {
            site_id: site_id.to_string(),
            form: form.clone(),
            path,
            notifiers,
        })
    }
}

fn compile_notifier(
    site_id: &str,
    form: &Form,
    notifier: &Notifier,
    mailers: &dyn MailerFactory,
) -> Result<NotifierRuntime, EndpointError> {
    let mailer = mailers.create(notifier).map_err(|source| EndpointError::Mailer {
        site: site_id.to_string(),
        form: form.id.clone(),
        source,
    })?;

    NotifierRuntime::new(form, notifier, mailer).map_err(|source| EndpointError::Template {
        site: site_id.to_string(),
        form: form.id.clone(),
        source,
    })
}

/// Handler for the health check route.
pub async fn health() -> Response {
    (StatusCode::OK, "ok").into_response()
}

/// Handler for `POST` on a form endpoint.
pub async fn submit_form(State(endpoint): State<Arc<FormEndpoint>>, body: Bytes) -> Response {
    // A single JSON object only; trailing values make the body malformed.
    let mut payload: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(
                path = %endpoint.path,
                site = %endpoint.site_id,
                form = %endpoint.form.id,
                err = %err,
                "rejecting malformed request body"
            );
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    if let Err(err) = validate_payload(&endpoint.form, &mut payload) {
        if err.is_invariant() {
            tracing::error!(
                path = %endpoint.path,
                site = %endpoint.site_id,
                form = %endpoint.form.id,
                field = %err.field(),
                err = %err,
                "payload validation invariant violated"
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }

        tracing::warn!(
            path = %endpoint.path,
            site = %endpoint.site_id,
            form = %endpoint.form.id,
            field = %err.field(),
            err = %err,
            "invalid request payload"
        );
        return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
    }

    // Notifiers run in configured order; the first failure aborts the
    // rest. Already-sent notifications are not rolled back.
    for notifier in &endpoint.notifiers {
        if let Err(err) = notifier.notify(&endpoint.form, &payload).await {
            tracing::error!(
                path = %endpoint.path,
                site = %endpoint.site_id,
                form = %endpoint.form.id,
                err = %err,
                "failed to send notification"
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    }

    (StatusCode::OK, "accepted").into_response()
}

/// Handler for `OPTIONS` on a form endpoint (CORS preflight).
pub async fn form_preflight(State(endpoint): State<Arc<FormEndpoint>>) -> Response {
    let mut allow_headers = format!("Content-Type, {SITE_TOKEN_HEADER}");
    if !endpoint.form.token.is_empty() {
        allow_headers.push_str(", ");
        allow_headers.push_str(FORM_TOKEN_HEADER);
    }

    let max_age = endpoint.form.access_control_max_age.to_string();

    let mut response = Response::new(axum::body::Body::empty());
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    if let Ok(value) = HeaderValue::from_str(&allow_headers) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    if let Ok(value) = HeaderValue::from_str(&max_age) {
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, value);
    }

    // 200 rather than 204: some browsers treat 204 as applying to the
    // resource itself and skip the follow-up request.
    response
}

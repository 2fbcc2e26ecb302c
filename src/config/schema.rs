//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from the JSON config
//! document. Unknown keys are rejected so that typos in a site's config fail
//! at startup instead of silently changing behavior.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Header carrying the shared site token.
pub const SITE_TOKEN_HEADER: &str = "X-Formgate-Token";

/// Header carrying a per-form token override.
pub const FORM_TOKEN_HEADER: &str = "X-Formgate-Form-Token";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Address the HTTP server binds to (e.g., "0.0.0.0:8080").
    pub listen_address: String,

    /// Sites registered with the gateway.
    pub sites: Vec<Site>,

    /// Minimum severity emitted to the log.
    pub log_level: LogLevel,

    /// Global rate limit settings.
    pub rate_limit: RateLimitConfig,

    /// Maximum size of a request body in bytes.
    pub max_body_bytes: i64,

    /// Log raw request headers. Never enable outside of debugging.
    pub debug_headers: bool,
}

/// Global rate limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Requests allowed per site and client IP within one minute.
    pub per_ip_site_minute: i64,
}

/// Log severity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

/// A site (tenant) registered with the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Site {
    /// Unique site identifier. The value `"_"` is reserved.
    pub id: String,

    /// Shared secret expected in the site token header.
    pub token: String,

    /// Origins allowed to submit to this site's forms. `"*"` disables
    /// the origin check.
    pub allowed_origins: Vec<String>,

    /// Forms exposed under this site.
    pub forms: Vec<Form>,
}

/// A form endpoint under a site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Form {
    /// Form identifier, unique within the owning site.
    pub id: String,

    /// Optional token override. When set, requests must present it in
    /// the form token header instead of the site token.
    pub token: String,

    /// Declared payload fields, keyed by payload key.
    pub fields: BTreeMap<String, FieldSchema>,

    /// Notification targets invoked after a successful submission.
    pub notifiers: Vec<Notifier>,

    /// Request body content type accepted by the form.
    pub content_type: ContentType,

    /// Value for `Access-Control-Max-Age` on preflight responses.
    pub access_control_max_age: i64,
}

/// Request body content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Json,
}

/// Declared type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "integer")]
    Int,
    String,
    Objects,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::Objects => "objects",
        };
        f.write_str(s)
    }
}

/// Schema for a single form field.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct FieldSchema {
    /// Human-readable name used in notifications. Falls back to the
    /// payload key when empty.
    pub display_name: String,

    /// Declared value type.
    #[serde(rename = "type")]
    pub kind: FieldType,

    /// Lower bound: integer value, string character count, or array
    /// element count depending on `kind`.
    pub min: i64,

    /// Upper bound, same unit as `min`. For strings, `0` means unbounded.
    pub max: i64,

    /// Whether the field must be present (and truthy/non-empty).
    pub required: bool,

    /// Sub-field types for `objects` fields. Each array element must
    /// match this shape exactly.
    pub shape: BTreeMap<String, FieldType>,

    /// Template rendering one array element of an `objects` field.
    pub display_template: String,
}

/// An outbound notification target for a form.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Notifier {
    /// Source address of the notification email.
    pub from: String,

    /// Destination address of the notification email.
    pub to: String,

    /// BCP 47 language tag for the rendered message.
    pub lang: String,

    /// Template for the email subject.
    pub subject: String,

    /// Template for an intro paragraph rendered before the form fields.
    pub intro: String,

    /// Presentation order of the fields in the message body. When
    /// non-empty, together with `hidden_fields` it must cover every
    /// declared field exactly once.
    pub field_order: Vec<String>,

    /// Fields omitted from the message body.
    pub hidden_fields: Vec<String>,

    /// SMTP username, or empty to read it from `username_env`.
    pub username: String,

    /// SMTP password, or empty to read it from `password_env`.
    pub password: String,

    /// Environment variable holding the SMTP username.
    pub username_env: String,

    /// Environment variable holding the SMTP password.
    pub password_env: String,

    /// SMTP server hostname.
    pub host: String,

    /// SMTP server port.
    pub port: u16,
}

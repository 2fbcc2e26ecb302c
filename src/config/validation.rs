//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check identifier uniqueness and reserved values
//! - Validate field constraint ranges and object shapes
//! - Verify notifier field order / hidden field partitioning
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::collections::BTreeSet;
use std::collections::HashSet;

use crate::config::schema::{FieldType, Form, GatewayConfig, Notifier, Site};

/// A single semantic violation found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Validate the full configuration tree.
pub fn validate_config(cfg: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if cfg.listen_address.is_empty() {
        errors.push(ValidationError::new("empty listenAddress"));
    }

    if cfg.max_body_bytes <= 0 {
        errors.push(ValidationError::new("maxBodyBytes must be greater than zero"));
    }

    if cfg.rate_limit.per_ip_site_minute <= 0 {
        errors.push(ValidationError::new(
            "global rate limit perIpSiteMinute must be greater than zero",
        ));
    }

    let mut seen_ids = HashSet::new();

    for site in &cfg.sites {
        validate_site(site, &mut seen_ids, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_site(site: &Site, seen_ids: &mut HashSet<String>, errors: &mut Vec<ValidationError>) {
    if site.id.is_empty() {
        errors.push(ValidationError::new("empty site ID"));
    }

    if site.id == "_" {
        errors.push(ValidationError::new("use of reserved site ID \"_\""));
    }

    if !seen_ids.insert(site.id.clone()) {
        errors.push(ValidationError::new(format!("duplicate site ID {:?}", site.id)));
    }

    if site.token.is_empty() {
        errors.push(ValidationError::new(format!("empty token for site {:?}", site.id)));
    }

    if site.allowed_origins.is_empty() {
        errors.push(ValidationError::new(format!(
            "no allowed origins for site {:?}",
            site.id
        )));
    }

    let mut seen_forms = HashSet::new();

    for form in &site.forms {
        if !seen_forms.insert(form.id.clone()) {
            errors.push(ValidationError::new(format!(
                "duplicate form ID {:?} in site {:?}",
                form.id, site.id
            )));
        }

        validate_form(site, form, errors);
    }
}

fn validate_form(site: &Site, form: &Form, errors: &mut Vec<ValidationError>) {
    let at = |msg: String| ValidationError::new(format!("site {:?}, form {:?}: {msg}", site.id, form.id));

    if form.id.is_empty() {
        errors.push(ValidationError::new(format!("empty form ID in site {:?}", site.id)));
    }

    if form.access_control_max_age < 0 {
        errors.push(at("accessControlMaxAge must be at least 0".to_string()));
    }

    for (name, field) in &form.fields {
        if field.min < 0 {
            errors.push(at(format!("field {name:?}: min must be at least 0")));
        }

        if field.max < field.min {
            errors.push(at(format!("field {name:?}: max must not be less than min")));
        }

        if field.kind == FieldType::Objects {
            if field.shape.is_empty() {
                errors.push(at(format!("field {name:?}: objects field has no shape")));
            }

            if field.display_template.is_empty() {
                errors.push(at(format!(
                    "field {name:?}: objects field has no displayTemplate"
                )));
            }

            for (sub, kind) in &field.shape {
                if *kind == FieldType::Objects {
                    errors.push(at(format!(
                        "field {name:?}: shape value {sub:?} must have a primitive type"
                    )));
                }
            }
        } else if !field.shape.is_empty() {
            errors.push(at(format!("field {name:?}: shape is only valid for objects fields")));
        }
    }

    for (i, notifier) in form.notifiers.iter().enumerate() {
        validate_notifier(site, form, i, notifier, errors);
    }
}

fn validate_notifier(
    site: &Site,
    form: &Form,
    index: usize,
    notifier: &Notifier,
    errors: &mut Vec<ValidationError>,
) {
    let at = |msg: String| {
        ValidationError::new(format!(
            "site {:?}, form {:?}, notifier {index}: {msg}",
            site.id, form.id
        ))
    };

    if notifier.from.is_empty() {
        errors.push(at("empty From address".to_string()));
    }

    if notifier.to.is_empty() {
        errors.push(at("empty To address".to_string()));
    }

    if notifier.lang.is_empty() {
        errors.push(at("empty language".to_string()));
    }

    if notifier.subject.is_empty() {
        errors.push(at("empty subject".to_string()));
    }

    if notifier.host.is_empty() {
        errors.push(at("empty SMTP host".to_string()));
    }

    if notifier.port == 0 {
        errors.push(at("invalid SMTP port 0".to_string()));
    }

    if notifier.username.is_empty() && notifier.username_env.is_empty() {
        errors.push(at(
            "no SMTP username or environment variable name provided".to_string()
        ));
    }

    if notifier.password.is_empty() && notifier.password_env.is_empty() {
        errors.push(at(
            "no SMTP password or environment variable name provided".to_string()
        ));
    }

    // Field order and hidden fields must reference declared fields, never
    // overlap, and, when an order is given, cover every field exactly once.
    let mut seen = BTreeSet::new();

    for name in notifier.field_order.iter().chain(&notifier.hidden_fields) {
        if !form.fields.contains_key(name) {
            errors.push(at(format!("unknown field {name:?} in fieldOrder or hiddenFields")));
        }

        if !seen.insert(name.clone()) {
            errors.push(at(format!(
                "field {name:?} appears more than once across fieldOrder and hiddenFields"
            )));
        }
    }

    if !notifier.field_order.is_empty() {
        for name in form.fields.keys() {
            if !seen.contains(name) {
                errors.push(at(format!(
                    "field {name:?} is missing from fieldOrder and hiddenFields"
                )));
            }
        }
    }
}

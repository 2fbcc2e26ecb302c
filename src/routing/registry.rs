//! Startup-built mapping from URL path to tenant metadata.

use std::collections::HashMap;

use crate::config::schema::{GatewayConfig, FORM_TOKEN_HEADER, SITE_TOKEN_HEADER};

/// Prefix of the versioned API paths.
pub const API_PREFIX: &str = "/v1";

/// Reserved site id for paths that belong to no tenant.
pub const RESERVED_SITE: &str = "_";

/// Read-only lookup record for one registered path.
#[derive(Debug, Clone)]
pub struct PathInfo {
    /// Owning site id, or [`RESERVED_SITE`] for infrastructure paths.
    pub site: String,

    /// Origins allowed for this path.
    pub allowed_origins: Vec<String>,

    /// Required token, empty when the path is unauthenticated.
    pub token: String,

    /// Header expected to carry the token.
    pub token_header: &'static str,
}

impl PathInfo {
    /// Whether the allowed-origin set contains the wildcard.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Whether `origin` is in the allowed set.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Static map from registered path to its tenant metadata.
///
/// Built once from the validated configuration before the server starts
/// accepting connections, then only read.
pub struct PathRegistry {
    paths: HashMap<String, PathInfo>,
}

impl PathRegistry {
    /// Build the registry from the site and form tree.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut paths = HashMap::new();

        paths.insert(
            "/health".to_string(),
            PathInfo {
                site: RESERVED_SITE.to_string(),
                allowed_origins: vec!["*".to_string()],
                token: String::new(),
                token_header: SITE_TOKEN_HEADER,
            },
        );

        for site in &config.sites {
            for form in &site.forms {
                let (token, token_header) = if form.token.is_empty() {
                    (site.token.clone(), SITE_TOKEN_HEADER)
                } else {
                    (form.token.clone(), FORM_TOKEN_HEADER)
                };

                paths.insert(
                    form_path(&site.id, &form.id),
                    PathInfo {
                        site: site.id.clone(),
                        allowed_origins: site.allowed_origins.clone(),
                        token,
                        token_header,
                    },
                );
            }
        }

        Self { paths }
    }

    /// Look up the metadata for a registered path.
    pub fn lookup(&self, path: &str) -> Option<&PathInfo> {
        self.paths.get(path)
    }
}

/// The registered path of a form endpoint.
pub fn form_path(site_id: &str, form_id: &str) -> String {
    format!("{API_PREFIX}/forms/{site_id}/{form_id}")
}

//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate a JSON configuration document.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_top_level_key() {
        let raw = r#"{
            "listenAddress": "127.0.0.1:8080",
            "maxBodyBytes": 4096,
            "rateLimit": {"perIpSiteMinute": 20},
            "surpriseKey": true
        }"#;

        let err = parse_config(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parses_minimal_document() {
        let raw = r#"{
            "listenAddress": "127.0.0.1:8080",
            "maxBodyBytes": 4096,
            "rateLimit": {"perIpSiteMinute": 20}
        }"#;

        let cfg = parse_config(raw).unwrap();
        assert_eq!(cfg.listen_address, "127.0.0.1:8080");
        assert!(!cfg.debug_headers);
    }

    #[test]
    fn surfaces_semantic_errors() {
        let raw = r#"{
            "listenAddress": "",
            "maxBodyBytes": 4096,
            "rateLimit": {"perIpSiteMinute": 20}
        }"#;

        let err = parse_config(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}

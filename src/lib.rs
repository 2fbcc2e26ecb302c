//! Multi-tenant HTTP form intake gateway library.
//!
//! Accepts form submissions from a fleet of independent sites, enforces
//! per-site security and throughput policy, validates each submission
//! against a declarative schema, and dispatches rendered notifications
//! through an outbound email provider. Sites and forms share one process
//! and one listening port, differentiated entirely by URL path.

pub mod config;
pub mod http;
pub mod notify;
pub mod routing;
pub mod security;
pub mod validate;

pub use config::{load_config, GatewayConfig};
pub use http::Server;

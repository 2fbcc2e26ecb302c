//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, pipeline wiring, shutdown)
//!     → middleware.rs (recovery, limits, request ID, logging,
//!       path resolution, CORS, tokens, rate limit)
//!     → handlers.rs (health check, form submission, preflight)
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use handlers::FormEndpoint;
pub use middleware::{RequestId, SiteId};
pub use server::{Server, SetupError};

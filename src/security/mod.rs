//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → pipeline resolves the owning site
//!     → rate_limit.rs (fixed window per site + client IP)
//!     → Pass to the form handler
//! ```
//!
//! # Design Decisions
//! - Token verification runs before rate limiting so unauthenticated
//!   traffic cannot drain a tenant's quota
//! - Rate limit state is process-local; no cross-process coordination

pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, LimiterError};

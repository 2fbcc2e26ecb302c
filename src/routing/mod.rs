//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry Compilation (at startup):
//!     Site/Form tree
//!     → one entry per form path plus /health
//!     → Freeze as immutable PathRegistry
//!
//! Incoming Request (path):
//!     → registry.rs (exact path lookup)
//!     → Return: PathInfo (site, origins, token) or NotFound
//! ```
//!
//! # Design Decisions
//! - Paths compiled at startup, immutable at runtime
//! - Exact string lookup only; no patterns in the hot path

pub mod registry;

pub use registry::{form_path, PathInfo, PathRegistry, RESERVED_SITE};

//! Token authentication store and audit log for Mnemo.
//!
//! Tokens are opaque `mcp_`-prefixed strings with 256 bits of entropy, bound
//! to exactly one user id. Validation checks existence, the enabled flag,
//! expiry, and the user binding; every outcome lands in the append-only
//! audit log before the caller sees the result.

pub mod cache;
pub mod error;
pub mod store;
pub mod token;

pub use cache::{CACHE_TTL, ValidationCache};
pub use error::{AuthError, Result};
pub use store::{AuditAction, AuditEvent, AuthStore, AuthToken, UserStats, Validation};
pub use token::{TOKEN_PREFIX, generate_token};

/// An auth store shared across request handlers.
pub type SharedAuthStore = std::sync::Arc<AuthStore>;

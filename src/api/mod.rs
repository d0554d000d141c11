//! REST API server module
//!
//! Every `/api` route requires a valid API token (unless authentication is
//! disabled) and is rate limited per identity, or per client address when
//! unauthenticated.

pub mod auth;
pub mod handlers;
mod rate_limiter;
mod server;
mod types;

pub use auth::Identity;
pub use server::{build_router, ApiServer};

//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Bearer auth (protected routes only)
//! 5. Role guard (admin routes only)

pub mod auth;
pub mod request_id;

pub use auth::{AuthClaims, authorize_role, require_bearer};
pub use request_id::request_id_middleware;

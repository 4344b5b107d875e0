//! HTTP middleware stack for the cart API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS
//! 3. `TraceLayer` (request span)
//! 4. Request ID (add unique ID to each request)
//! 5. Security headers
//! 6. Rate limiting (governor, cart routes only)
//!
//! Caller identity is an extractor ([`Caller`]) rather than a layer, so only
//! cart handlers pay for token resolution.

pub mod identity;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use identity::{Caller, SESSION_COOKIE, SESSION_HEADER};
pub use rate_limit::api_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;

//! HTTP middleware for the payment server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers
//! 2. CORS
//! 3. `TraceLayer` (opens the span `request_id` is recorded into)
//! 4. Request ID

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

//! Outbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Service call (assistant, orders, ...)
//!     → request.rs (Endpoint: method, URL, headers, body, overrides)
//!     → client.rs (HttpExecutor: retry loop, per-attempt timeout)
//!     → reqwest connection pool
//!     → error.rs (classify: TIMEOUT / NETWORK_ERROR / HTTP_<status>)
//! ```

pub mod client;
pub mod error;
pub mod request;

pub use client::{ExecutorSettings, HttpExecutor};
pub use error::{ErrorCode, RequestError, TransientErrors};
pub use request::{new_request_id, Endpoint, X_REQUEST_ID};

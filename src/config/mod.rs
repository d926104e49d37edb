//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → executor / breaker / assistant client built from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → HttpExecutor::reload swaps retry/timeout settings
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AssistantConfig, CircuitBreakerConfig, ClientConfig, LogFormat, ObservabilityConfig,
    RetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, validate_retries, ValidationError};

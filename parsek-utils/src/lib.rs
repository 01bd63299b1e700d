//! parsek-utils: Common utilities shared across parsek crates
//!
//! This crate provides:
//! - Unified error types ([`ParsekError`], [`Result`])
//! - Logging infrastructure ([`init_logging_with_config`], [`LogConfig`])
//! - Host path resolution ([`HostPaths`]) and XDG directories ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{ParsekError, Result};
pub use logging::{init_logging_with_config, LogConfig};
pub use paths::{ensure_dir, log_dir, state_dir, validate_plugin_id, HostPaths, CONFIG_FILE_NAME};

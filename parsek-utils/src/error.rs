//! Error types for parsek
//!
//! Provides a unified error type used across all parsek crates.

use std::path::PathBuf;

/// Main error type for parsek operations
#[derive(Debug, thiserror::Error)]
pub enum ParsekError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Parse Errors ===

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing or invalid version field '{key}'")]
    MissingVersion { key: String },

    #[error("Configuration does not match schema: {message}")]
    Bind { message: String },

    #[error("Failed to render configuration: {message}")]
    Render { message: String },

    // === Registration Errors ===

    #[error("Duplicate migration from version {from} in scope {scope}")]
    DuplicateMigration { scope: String, from: u32 },

    #[error("Migration {from} -> {to} in scope {scope} does not advance the version")]
    NonAdvancingMigration { scope: String, from: u32, to: u32 },

    // === Migration Errors ===

    #[error("Migration {from} -> {to} failed: {message}")]
    Migration { from: u32, to: u32, message: String },

    // === Watch Errors ===

    #[error("Watch error: {0}")]
    Watch(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParsekError {
    /// Create a parse error for the given file
    pub fn parse(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a bind error
    pub fn bind(msg: impl Into<String>) -> Self {
        Self::Bind {
            message: msg.into(),
        }
    }

    /// Create a watch error
    pub fn watch(msg: impl Into<String>) -> Self {
        Self::Watch(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error comes from an invalid migration set
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateMigration { .. } | Self::NonAdvancingMigration { .. }
        )
    }
}

/// Result type alias using ParsekError
pub type Result<T> = std::result::Result<T, ParsekError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Display Tests ====================

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ParsekError::Io(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = ParsekError::FileRead {
            path: PathBuf::from("/etc/parsek/config.conf"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/etc/parsek/config.conf"));
    }

    #[test]
    fn test_error_display_file_write() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");
        let err = ParsekError::FileWrite {
            path: PathBuf::from("/root/config.conf"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to write file"));
        assert!(msg.contains("/root/config.conf"));
    }

    #[test]
    fn test_error_display_parse() {
        let err = ParsekError::parse("config.conf", "expected `=`");
        assert_eq!(err.to_string(), "Failed to parse config.conf: expected `=`");
    }

    #[test]
    fn test_error_display_missing_version() {
        let err = ParsekError::MissingVersion {
            key: "config-version".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing or invalid version field 'config-version'"
        );
    }

    #[test]
    fn test_error_display_duplicate_migration() {
        let err = ParsekError::DuplicateMigration {
            scope: "global".into(),
            from: 1,
        };
        assert_eq!(
            err.to_string(),
            "Duplicate migration from version 1 in scope global"
        );
    }

    #[test]
    fn test_error_display_non_advancing_migration() {
        let err = ParsekError::NonAdvancingMigration {
            scope: "plugin:auth".into(),
            from: 3,
            to: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 -> 3"));
        assert!(msg.contains("plugin:auth"));
    }

    #[test]
    fn test_error_display_migration() {
        let err = ParsekError::Migration {
            from: 2,
            to: 3,
            message: "disk full".into(),
        };
        assert_eq!(err.to_string(), "Migration 2 -> 3 failed: disk full");
    }

    #[test]
    fn test_error_display_config() {
        let err = ParsekError::Config("missing key".into());
        assert_eq!(err.to_string(), "Configuration error: missing key");
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_registration_errors() {
        assert!(ParsekError::DuplicateMigration {
            scope: "global".into(),
            from: 1
        }
        .is_registration_error());
        assert!(ParsekError::NonAdvancingMigration {
            scope: "global".into(),
            from: 2,
            to: 1
        }
        .is_registration_error());
        assert!(!ParsekError::config("x").is_registration_error());
    }

    // ==================== From Trait Tests ====================

    #[test]
    fn test_from_io_error_preserves_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ParsekError = io_err.into();
        if let ParsekError::Io(inner) = err {
            assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied);
        } else {
            panic!("Expected Io variant");
        }
    }

    // ==================== Helper Function Tests ====================

    #[test]
    fn test_bind_helper() {
        let err = ParsekError::bind("missing field `server`");
        assert!(matches!(err, ParsekError::Bind { .. }));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_internal_helper() {
        let err = ParsekError::internal("invariant violated");
        assert!(matches!(err, ParsekError::Internal(_)));
        assert_eq!(err.to_string(), "Internal error: invariant violated");
    }
}

//! Configuration scopes

use std::fmt;
use std::path::PathBuf;

use parsek_utils::HostPaths;

/// Which configuration a store manages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Process-wide configuration
    Global,
    /// Configuration owned by one plugin
    Plugin(String),
}

impl Scope {
    /// Version field of the global configuration
    pub const GLOBAL_VERSION_KEY: &'static str = "config-version";
    /// Version field of plugin configurations
    pub const PLUGIN_VERSION_KEY: &'static str = "version";

    pub fn plugin(plugin_id: impl Into<String>) -> Self {
        Self::Plugin(plugin_id.into())
    }

    /// Top-level key holding the schema version
    pub fn version_key(&self) -> &'static str {
        match self {
            Self::Global => Self::GLOBAL_VERSION_KEY,
            Self::Plugin(_) => Self::PLUGIN_VERSION_KEY,
        }
    }

    /// Where this scope's file lives for the given host layout
    pub fn config_file(&self, paths: &HostPaths) -> PathBuf {
        match self {
            Self::Global => paths.config_file.clone(),
            Self::Plugin(id) => paths.plugin_config_file(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Plugin(id) => write!(f, "plugin:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_keys() {
        assert_eq!(Scope::Global.version_key(), "config-version");
        assert_eq!(Scope::plugin("auth").version_key(), "version");
    }

    #[test]
    fn test_config_file() {
        let paths = HostPaths::new("/opt/parsek/plugins").with_config_file("/etc/parsek.conf");
        assert_eq!(Scope::Global.config_file(&paths), PathBuf::from("/etc/parsek.conf"));
        assert_eq!(
            Scope::plugin("auth").config_file(&paths),
            PathBuf::from("/opt/parsek/plugins/auth/config.conf")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(Scope::plugin("auth").to_string(), "plugin:auth");
    }
}

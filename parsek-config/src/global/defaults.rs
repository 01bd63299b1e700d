//! Default configuration document
//!
//! Fresh global configuration files are rendered onto this template so that
//! new installations ship with documented settings.

/// Commented layout for a new global configuration file
pub const DEFAULT_CONFIG_TOML: &str = r##"# parsek configuration
#
# Edits are picked up while the server runs. Structural upgrades happen
# on startup, driven by config-version below.

# Schema version of this file. Managed by parsek; do not edit.
config-version = 1

[router]
# Prefix for every REST route
api-prefix = "/api"

[server]
# Address and port the HTTP server binds to
host = "0.0.0.0"
port = 8088
"##;

//! CLI argument parsing for the parsek host

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use parsek_utils::HostPaths;

/// Host for versioned parsek configuration
#[derive(Parser, Debug)]
#[command(name = "parsek")]
#[command(about = "Loads, migrates and hot-reloads parsek configuration")]
#[command(version)]
pub struct Cli {
    /// Global configuration file
    ///
    /// Overrides PARSEK_CONFIG_FILE. Defaults to config.conf in the
    /// working directory.
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Directory plugins are loaded from
    #[arg(long, env = "PARSEK_PLUGINS_DIR", default_value = "plugins", global = true)]
    pub plugins_dir: PathBuf,

    /// Directory holding per-plugin configuration folders
    ///
    /// Overrides PARSEK_PLUGIN_DATA_DIR. Defaults to the plugins directory.
    #[arg(long, global = true)]
    pub plugin_data_dir: Option<PathBuf>,

    /// Plugin scopes to manage in addition to the discovered ones
    /// (comma-separated or repeated)
    #[arg(long = "plugin", value_delimiter = ',', global = true)]
    pub plugins: Vec<String>,

    /// Verbose logging to stderr only
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load every scope and keep them hot-reloaded until Ctrl-C
    Run {
        /// Do not watch configuration files for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Bring every scope up to date, print what happened and exit
    Migrate,

    /// Print the effective configuration of a scope as JSON
    Show {
        /// Plugin id to show instead of the global configuration
        #[arg(long = "scope", value_name = "PLUGIN")]
        plugin: Option<String>,
    },
}

impl Cli {
    /// Subcommand to execute; `run` when none was given
    pub fn action(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { no_watch: false })
    }

    /// Host layout from the environment, with flags taking precedence
    pub fn host_paths(&self) -> HostPaths {
        let mut paths = HostPaths::from_env(&self.plugins_dir);
        if let Some(file) = &self.config_file {
            paths = paths.with_config_file(file);
        }
        if let Some(dir) = &self.plugin_data_dir {
            paths = paths.with_plugin_data_dir(dir);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::parse_from(["parsek"]);
        assert_eq!(cli.action(), Command::Run { no_watch: false });
        assert!(cli.plugins.is_empty());
    }

    #[test]
    fn test_flags_override_layout() {
        let cli = Cli::parse_from([
            "parsek",
            "--config-file",
            "/etc/parsek/config.conf",
            "--plugins-dir",
            "/srv/plugins",
            "--plugin-data-dir",
            "/var/lib/parsek",
            "migrate",
        ]);

        let paths = cli.host_paths();
        assert_eq!(paths.config_file, PathBuf::from("/etc/parsek/config.conf"));
        assert_eq!(paths.plugins_root, PathBuf::from("/srv/plugins"));
        assert_eq!(
            paths.plugin_config_file("auth"),
            PathBuf::from("/var/lib/parsek/auth/config.conf")
        );
        assert_eq!(cli.action(), Command::Migrate);
    }

    #[test]
    fn test_plugin_list() {
        let cli = Cli::parse_from(["parsek", "--plugin", "auth,search", "--plugin", "cache"]);
        assert_eq!(cli.plugins, vec!["auth", "search", "cache"]);
    }

    #[test]
    fn test_show_global() {
        let cli = Cli::parse_from(["parsek", "show"]);
        assert_eq!(cli.action(), Command::Show { plugin: None });
    }

    #[test]
    fn test_plugin_list_after_subcommand() {
        let cli = Cli::parse_from(["parsek", "show", "--plugin", "auth", "--scope", "auth"]);
        assert_eq!(cli.plugins, vec!["auth"]);
    }

    #[test]
    fn test_command_tree_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_show_plugin() {
        let cli = Cli::parse_from(["parsek", "show", "--scope", "auth"]);
        assert_eq!(
            cli.action(),
            Command::Show {
                plugin: Some("auth".into())
            }
        );
    }

    #[test]
    fn test_run_no_watch() {
        let cli = Cli::parse_from(["parsek", "run", "--no-watch"]);
        assert_eq!(cli.action(), Command::Run { no_watch: true });
    }
}

//! parsek: host process for versioned configuration
//!
//! Loads the global configuration and every plugin scope, migrates them to
//! their latest schema version, and keeps them hot-reloaded until Ctrl-C.

mod cli;
mod host;

use clap::Parser;
use tracing::{error, info};

use parsek_utils::{init_logging_with_config, LogConfig, ParsekError, Result};

use crate::cli::{Cli, Command};
use crate::host::Host;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let command = cli.action();

    if let Err(e) = init_logging_with_config(log_config(&cli, &command)) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let exit_code = match execute(&cli, command).await {
        Ok(()) => 0,
        Err(e) if e.is_registration_error() => {
            error!("Invalid migration set, refusing to start: {}", e);
            eprintln!("{}", e);
            2
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Long-running hosts log to file as well; one-shot commands keep stderr quiet
fn log_config(cli: &Cli, command: &Command) -> LogConfig {
    if cli.verbose {
        return LogConfig::development();
    }
    match command {
        Command::Run { .. } => LogConfig::host(),
        Command::Migrate | Command::Show { .. } => LogConfig::cli(),
    }
}

async fn execute(cli: &Cli, command: Command) -> Result<()> {
    let mut host = Host::new(cli.host_paths(), cli.plugins.clone())?;

    match command {
        Command::Run { no_watch } => serve(host, no_watch).await,
        Command::Migrate => {
            let outcomes = host.initialize()?;
            for outcome in &outcomes {
                println!("{}", outcome);
            }
            let failed = outcomes.iter().filter(|o| o.is_fallback()).count();
            if failed > 0 {
                return Err(ParsekError::config(format!(
                    "{} scope(s) could not be loaded and fell back to defaults",
                    failed
                )));
            }
            Ok(())
        }
        Command::Show { plugin } => {
            host.initialize()?;
            let json = match plugin {
                Some(plugin_id) => {
                    serde_json::to_string_pretty(&host.require_plugin(&plugin_id)?.config())
                }
                None => serde_json::to_string_pretty(&host.global().config()),
            }
            .map_err(|e| ParsekError::Render {
                message: e.to_string(),
            })?;
            println!("{}", json);
            Ok(())
        }
    }
}

async fn serve(mut host: Host, no_watch: bool) -> Result<()> {
    for outcome in host.initialize()? {
        info!("{}", outcome);
    }

    info!(
        data_dir = %host.paths().plugin_data_dir.display(),
        "Plugin scopes: {:?}",
        host.plugin_ids_loaded().collect::<Vec<_>>()
    );

    let global = host.global().config();
    match &global.router {
        Some(router) => info!(
            "Configured for {} with API prefix {}",
            global.server.bind_address(),
            router.api_prefix
        ),
        None => info!(
            "Configured for {} without a router section",
            global.server.bind_address()
        ),
    }

    if no_watch {
        info!("Hot-reload disabled");
    } else {
        host.listen()?;
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");

    host.shutdown();
    Ok(())
}

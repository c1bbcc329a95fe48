//! katmer - an agentless configuration-management and remote-execution engine.
//!
//! This is the CLI entry point; see [`katmer::cli`] for the argument surface
//! and [`katmer::engine`] for the execution core.

use anyhow::Result;
use clap::Parser;
use katmer::cli::commands::CommandContext;
use katmer::cli::{completions, Cli, Commands};
use katmer::config::EngineConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("katmer v{VERSION}");
    }

    let config = load_config(&cli).unwrap_or_else(|e| {
        if cli.verbosity() >= 1 {
            eprintln!("warning: failed to load config: {e}");
        }
        EngineConfig::default()
    });

    let mut ctx = CommandContext::new(&cli, config);

    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx).await?,
        Commands::Check(args) => args.execute(&mut ctx).await?,
        Commands::ListTargets(args) => args.execute(&mut ctx).await?,
        Commands::ListTasks(args) => args.execute(&mut ctx).await?,
        Commands::Validate(args) => args.execute(&mut ctx).await?,
        Commands::Completions { shell } => {
            completions::generate_completions(*shell);
            0
        }
    };

    std::process::exit(exit_code);
}

/// Load the layered [`EngineConfig`], then overlay the CLI flags that have a
/// config-layer counterpart. `--config` bypasses the default search path.
fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => katmer::config::load_from(path)?,
        None => EngineConfig::load()?,
    };

    let is_check = matches!(cli.command, Commands::Check(_)) || config.check_mode;

    Ok(config
        .with_inventory(cli.inventory.clone())
        .with_timeout_ms(cli.timeout_ms)
        .with_check_mode(is_check))
}

fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

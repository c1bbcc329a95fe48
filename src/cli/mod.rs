//! Command-line surface: `clap`-derived argument parsing for the `katmer`
//! binary. Subcommands wire straight into [`crate::engine::EngineEntry`];
//! this module owns flag parsing, environment-variable fallbacks, and
//! terminal output formatting only.

pub mod commands;
pub mod completions;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// An agentless configuration-management and remote-execution engine.
#[derive(Parser, Debug)]
#[command(name = "katmer", version, about, long_about = None)]
pub struct Cli {
    /// Path to the inventory file (YAML).
    #[arg(short = 'i', long, global = true, env = "KATMER_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Extra variables, as `key=value` or `@file.yml`. May be repeated.
    #[arg(short = 'e', long = "extra-vars", global = true, action = clap::ArgAction::Append)]
    pub extra_vars: Vec<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to an explicit config file, bypassing the default search path.
    #[arg(short = 'c', long, global = true, env = "KATMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Remote user to connect as, overriding inventory/config defaults.
    #[arg(short = 'u', long, global = true, env = "KATMER_REMOTE_USER")]
    pub remote_user: Option<String>,

    /// Private key file for SSH targets.
    #[arg(long, global = true, env = "KATMER_PRIVATE_KEY")]
    pub private_key: Option<PathBuf>,

    /// Per-command timeout in milliseconds.
    #[arg(long, global = true, env = "KATMER_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Number of targets to process concurrently per task. The engine is
    /// task-level sequential; this is accepted for compatibility with the
    /// reference flag surface but currently has no effect beyond validation.
    #[arg(long, global = true, default_value_t = 1, env = "KATMER_FORKS")]
    pub forks: usize,

    /// Disable colored output.
    #[arg(long, global = true, env = "KATMER_NO_COLOR")]
    pub no_color: bool,

    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task file against the inventory.
    Run(commands::run::RunArgs),
    /// Run a task file in check (dry-run) mode; no changes are made.
    Check(commands::check::CheckArgs),
    /// List targets matching a selection pattern.
    ListTargets(commands::list::ListTargetsArgs),
    /// List the tasks a task file would run, without executing them.
    ListTasks(commands::list::ListTasksArgs),
    /// Validate a task file's shape without touching any target.
    Validate(commands::validate::ValidateArgs),
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_inventory_and_extra_vars() {
        let cli = Cli::try_parse_from([
            "katmer",
            "-i",
            "inventory.yml",
            "-e",
            "env=prod",
            "run",
            "site.yml",
        ])
        .unwrap();
        assert_eq!(cli.inventory, Some(PathBuf::from("inventory.yml")));
        assert_eq!(cli.extra_vars, vec!["env=prod".to_string()]);
    }

    #[test]
    fn verbosity_counts_repeated_v_flags() {
        let cli = Cli::try_parse_from(["katmer", "-vvv", "run", "site.yml"]).unwrap();
        assert_eq!(cli.verbosity(), 3);
    }

    #[test]
    fn check_subcommand_parses() {
        let cli = Cli::try_parse_from(["katmer", "check", "site.yml"]).unwrap();
        assert!(matches!(cli.command, Commands::Check(_)));
    }
}

//! Command line interface definition

use clap::{Parser, Subcommand};
use devnet_types::{ColorChoice, ExecutionMode};
use std::path::PathBuf;

/// devnet - binary cache and upgrade orchestration for local chain devnets
#[derive(Parser)]
#[command(name = "devnet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Binary cache and upgrade orchestration for local chain devnets")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to <home>/logs/
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Devnet home directory (default: ~/.devnet)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Upgrade the running devnet to another binary or image
    Upgrade(UpgradeArgs),

    /// Show the devnet, its active binary and node state
    Status,

    /// Manage cached binaries
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Move a plain binary at the pointer location into the cache
    Migrate {
        /// Commit the binary was built from (detected via `version --long` if omitted)
        #[arg(long)]
        commit: Option<String>,

        /// Branch or tag the binary was built from
        #[arg(long = "ref", value_name = "REF")]
        git_ref: Option<String>,
    },
}

#[derive(clap::Args)]
pub struct UpgradeArgs {
    /// Upgrade handler name registered in the new binary
    #[arg(long, short = 'n', default_value = "")]
    pub name: String,

    /// Execution mode of the devnet nodes
    #[arg(long, value_enum, default_value_t = ExecutionMode::Docker)]
    pub mode: ExecutionMode,

    /// Local binary to import into the cache and switch to
    #[arg(long, value_name = "PATH", conflicts_with = "cache_ref")]
    pub binary: Option<PathBuf>,

    /// Commit --binary was built from, when `version --long` cannot tell
    #[arg(long, value_name = "HASH", requires = "binary")]
    pub commit: Option<String>,

    /// Docker image to switch to
    #[arg(long)]
    pub image: Option<String>,

    /// Version to upgrade to (published tag or cached ref)
    #[arg(long)]
    pub version: Option<String>,

    /// Cached commit hash prefix or git ref to activate
    #[arg(long = "cache-ref", value_name = "REF")]
    pub cache_ref: Option<String>,

    /// Voting period in seconds when the chain cannot be queried
    #[arg(long, default_value_t = 60)]
    pub voting_period: u64,

    /// Use --voting-period even if the chain reports another value
    #[arg(long)]
    pub force_voting_period: bool,

    /// Blocks to add after the voting period (0 derives a margin)
    #[arg(long, default_value_t = 0)]
    pub height_buffer: u64,

    /// Export genesis before and after the switch
    #[arg(long)]
    pub export: bool,

    /// Replace the binary directly without a governance proposal
    #[arg(long)]
    pub skip_governance: bool,

    /// Never prompt; fail when the cache holds more than one candidate
    #[arg(long)]
    pub non_interactive: bool,
}

/// Cache subcommands
#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cached binaries, most recent first
    #[command(alias = "ls")]
    List {
        /// Include binaries of every network
        #[arg(long)]
        all: bool,

        /// Run each binary to check it executes
        #[arg(long)]
        validate: bool,
    },

    /// Store an externally built binary
    Import {
        /// Path to the binary
        path: PathBuf,

        /// Full 40-character commit hash
        #[arg(long)]
        commit: String,

        /// Branch or tag the binary was built from
        #[arg(long = "ref", value_name = "REF", default_value = "unknown")]
        git_ref: String,

        /// Build setting that distinguishes this build (repeatable)
        #[arg(long = "setting", value_name = "KEY=VALUE", value_parser = parse_setting)]
        settings: Vec<(String, String)>,
    },

    /// Point the active binary at a cache entry
    Use {
        /// Cache key or commit hash prefix
        reference: String,
    },

    /// Remove every entry except those of the active commit
    Clean,
}

fn parse_setting(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(
            parse_setting("ledger=false").unwrap(),
            ("ledger".to_string(), "false".to_string())
        );
        assert!(parse_setting("ledger").is_err());
        assert!(parse_setting("=x").is_err());
    }

    #[test]
    fn test_upgrade_args() {
        let cli = Cli::parse_from([
            "devnet",
            "upgrade",
            "--name",
            "v2",
            "--mode",
            "local",
            "--cache-ref",
            "abc1234",
            "--skip-governance",
        ]);
        let Commands::Upgrade(args) = cli.command else {
            panic!("expected upgrade command");
        };
        assert_eq!(args.name, "v2");
        assert_eq!(args.mode, ExecutionMode::Local);
        assert_eq!(args.cache_ref.as_deref(), Some("abc1234"));
        assert!(args.skip_governance);
        assert_eq!(args.voting_period, 60);
    }

    #[test]
    fn test_binary_conflicts_with_cache_ref() {
        let result = Cli::try_parse_from([
            "devnet",
            "upgrade",
            "--binary",
            "/tmp/simd",
            "--cache-ref",
            "abc1234",
        ]);
        assert!(result.is_err());
    }
}

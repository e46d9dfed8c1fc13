//! devnet - binary cache and upgrade orchestration for local chain devnets
//!
//! The CLI parses arguments, prepares the devnet home and hands each
//! command to the ops crate while rendering its events.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod setup;

use crate::cli::{CacheCommands, Cli, Commands, UpgradeArgs};
use crate::display::OutputRenderer;
use crate::error::CliError;
use crate::events::EventHandler;
use crate::setup::SystemSetup;
use clap::Parser;
use devnet_config::Config;
use devnet_events::EventReceiver;
use devnet_ops::{
    ExecuteUpgradeInput, ImportRequest, NonInteractive, OperationResult, OpsContextBuilder,
    OpsCtx, UpgradeReport,
};
use devnet_types::ColorChoice;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Exit status after an interrupt, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {}", e);
            if json_mode {
                println!("{}", e.to_json());
            } else {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic; returns the process exit code
async fn run(cli: Cli) -> Result<i32, CliError> {
    // 1. File config (or defaults), 2. environment, 3. CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    init_tracing(cli.global.json, cli.global.debug, &config.logs_dir());
    info!("Starting devnet v{}", env!("CARGO_PKG_VERSION"));

    SystemSetup::new(config.clone()).initialize().await?;

    let (event_sender, event_receiver) = devnet_events::channel();

    let color = config.general.color;
    let mut builder = OpsContextBuilder::new()
        .with_config(config)
        .with_event_sender(event_sender);
    if cli.global.json || matches!(&cli.command, Commands::Upgrade(args) if args.non_interactive)
    {
        builder = builder.with_prompt(Arc::new(NonInteractive));
    }
    let ops_ctx = builder.build()?;

    let renderer = OutputRenderer::new(cli.global.json, color);
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug, cli.global.json);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result = execute_command_with_events(
        cli.command,
        ops_ctx,
        &cancel,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&result)?;

    if result.is_success() {
        info!("Command completed successfully");
        Ok(0)
    } else if cancel.is_cancelled() {
        Ok(EXIT_INTERRUPTED)
    } else {
        Ok(1)
    }
}

/// First Ctrl-C or SIGTERM cancels the running operation, a second one exits at once
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut signals = ShutdownSignals::new();
        if !signals.recv().await {
            return;
        }
        eprintln!("Interrupt received, stopping after the current step (interrupt again to abort)");
        cancel.cancel();

        if signals.recv().await {
            eprintln!("Aborted; run `devnet status` to inspect the devnet");
            process::exit(EXIT_INTERRUPTED);
        }
    });
}

/// Ctrl-C, plus SIGTERM on unix
struct ShutdownSignals {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignals {
    fn new() -> Self {
        Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .ok(),
        }
    }

    /// Wait for the next signal; false when none can be received
    async fn recv(&mut self) -> bool {
        #[cfg(unix)]
        if let Some(terminate) = self.terminate.as_mut() {
            return select! {
                received = tokio::signal::ctrl_c() => received.is_ok(),
                received = terminate.recv() => received.is_some(),
            };
        }
        tokio::signal::ctrl_c().await.is_ok()
    }
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    ops_ctx: OpsCtx,
    cancel: &CancellationToken,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, &ops_ctx, cancel));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    ctx: &OpsCtx,
    cancel: &CancellationToken,
) -> Result<OperationResult, CliError> {
    match command {
        Commands::Upgrade(args) => {
            let report = run_upgrade(ctx, cancel, args).await?;
            Ok(OperationResult::Upgrade(report))
        }

        Commands::Status => {
            let report = devnet_ops::status(ctx).await?;
            Ok(OperationResult::Status(report))
        }

        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::List { all, validate } => {
                let listing = devnet_ops::cache_list(ctx, cancel, all, validate).await?;
                Ok(OperationResult::CacheListing(listing))
            }
            CacheCommands::Import {
                path,
                commit,
                git_ref,
                settings,
            } => {
                let change = devnet_ops::cache_import(
                    ctx,
                    ImportRequest {
                        path,
                        commit_hash: commit,
                        git_ref,
                        build_settings: settings,
                    },
                )
                .await?;
                Ok(OperationResult::CacheChange(change))
            }
            CacheCommands::Use { reference } => {
                let change = devnet_ops::cache_use(ctx, cancel, &reference).await?;
                Ok(OperationResult::CacheChange(change))
            }
            CacheCommands::Clean => {
                let change = devnet_ops::cache_clean(ctx).await?;
                Ok(OperationResult::CacheChange(change))
            }
        },

        Commands::Migrate { commit, git_ref } => {
            let change = devnet_ops::migrate(ctx, commit, git_ref).await?;
            Ok(OperationResult::CacheChange(change))
        }
    }
}

async fn run_upgrade(
    ctx: &OpsCtx,
    cancel: &CancellationToken,
    args: UpgradeArgs,
) -> Result<UpgradeReport, CliError> {
    let orchestrator = ctx.upgrade_orchestrator().await?;

    // Tell the operator where an interrupt left the devnet
    let stage = orchestrator.stage_handle();
    let watcher_cancel = cancel.clone();
    let watcher = tokio::spawn(async move {
        watcher_cancel.cancelled().await;
        eprintln!("Interrupted during stage: {}", stage.get());
        eprintln!("devnet may be in an intermediate state; run `devnet status`");
    });

    let input = ExecuteUpgradeInput {
        upgrade_name: args.name,
        mode: args.mode,
        target_binary: args.binary,
        target_commit: args.commit,
        target_image: args.image,
        target_version: args.version,
        cache_ref: args.cache_ref,
        voting_period: Duration::from_secs(args.voting_period),
        force_voting_period: args.force_voting_period,
        height_buffer: args.height_buffer,
        with_export: args.export,
        skip_governance: args.skip_governance,
    };
    let output = orchestrator.execute(&input, cancel).await;
    watcher.abort();

    Ok(UpgradeReport::from(&output))
}

/// Initialize tracing/logging
///
/// Debug and JSON modes write JSON records to a file under `log_dir`;
/// otherwise only warnings reach stderr.
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, log_dir: &Path) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let file_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if debug_enabled {
                tracing_subscriber::EnvFilter::new("info,devnet=debug,devnet_ops=debug")
            } else {
                tracing_subscriber::EnvFilter::new("info")
            }
        })
    };

    if debug_enabled || json_mode {
        let log_file = log_dir.join(format!(
            "devnet-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));
        let file = std::fs::create_dir_all(log_dir).and_then(|()| std::fs::File::create(&log_file));
        match file {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(file_filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) if !json_mode => {
                eprintln!("Warning: Failed to create log file: {e}");
            }
            Err(_) => {}
        }
    }

    if json_mode {
        // Keep stdout and stderr clean for machine consumers
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("warn,devnet=warn,devnet_ops=warn")
                }),
            )
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs) {
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if let Some(home) = &global.home {
        config.paths.home = Some(home.clone());
    }
}

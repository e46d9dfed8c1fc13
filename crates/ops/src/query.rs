//! Read-only operations: devnet status and cache listings

use crate::{CacheListing, DevnetSummary, NodeStatus, OpsCtx, SelectorOptions, StatusReport};
use devnet_errors::{Error, UpgradeError, UserFacingError};
use devnet_events::{AppEvent, CacheEvent, EventEmitter};
use devnet_platform::{PlatformCommand, ProcessHandle};
use devnet_store::{scan_all_networks, sort_by_recency, summarize_failures};
use devnet_types::{DevnetMetadata, ExecutionMode, ValidatorInfo};
use tokio_util::sync::CancellationToken;

/// Report the devnet, its active binary and whether its nodes run
///
/// A missing devnet is not an error; the report says so.
///
/// # Errors
///
/// Returns an error if the metadata is unreadable or the pointer cannot be
/// inspected.
pub async fn status(ctx: &OpsCtx) -> Result<StatusReport, Error> {
    let devnet = match ctx.repository.load().await {
        Ok(devnet) => Some(devnet),
        Err(Error::Upgrade(UpgradeError::MetadataNotFound { .. })) => None,
        Err(e) => return Err(e),
    };

    let active = ctx.activation.current().await?;
    let plain_binary = active.is_none() && ctx.activation.has_plain_binary().await;

    let (height, height_error) = if devnet.is_some() {
        match ctx.rpc.get_height().await {
            Ok(height) => (Some(height), None),
            Err(e) => (None, Some(e.user_message().into_owned())),
        }
    } else {
        (None, None)
    };

    let nodes = match &devnet {
        Some(devnet) => node_statuses(ctx, devnet).await,
        None => Vec::new(),
    };

    Ok(StatusReport {
        home: ctx.config.home(),
        devnet: devnet.map(|d| DevnetSummary {
            chain_id: d.chain_id,
            network_type: d.network_type,
            binary_name: d.binary_name,
            execution_mode: d.execution_mode,
            current_version: d.current_version,
            docker_image: d.docker_image,
        }),
        active,
        plain_binary,
        height,
        height_error,
        nodes,
        cached_binaries: ctx.cache.list_keys().await?.len(),
    })
}

async fn node_statuses(ctx: &OpsCtx, devnet: &DevnetMetadata) -> Vec<NodeStatus> {
    let mut statuses = Vec::with_capacity(devnet.validators.len());
    for validator in &devnet.validators {
        let running = match devnet.execution_mode {
            ExecutionMode::Local => process_running(ctx, validator).await,
            ExecutionMode::Docker => container_running(ctx, validator).await,
        };
        statuses.push(NodeStatus {
            name: validator.name.clone(),
            running,
            pid: validator.pid,
        });
    }
    statuses
}

async fn process_running(ctx: &OpsCtx, validator: &ValidatorInfo) -> bool {
    match validator.pid {
        Some(pid) => {
            ctx.executor
                .is_running(&ProcessHandle {
                    pid,
                    name: validator.name.clone(),
                })
                .await
        }
        None => false,
    }
}

async fn container_running(ctx: &OpsCtx, validator: &ValidatorInfo) -> bool {
    let cmd = PlatformCommand::new("docker").args([
        "inspect",
        "--format",
        "{{.State.Running}}",
        validator.name.as_str(),
    ]);
    match ctx.executor.run(&cmd).await {
        Ok(output) => output.success() && output.stdout_str().trim() == "true",
        Err(e) => {
            tracing::debug!(node = %validator.name, error = %e, "docker inspect failed");
            false
        }
    }
}

/// List cached binaries, most recent first
///
/// `all_networks` lists entries of every network; `validate` runs each
/// binary so `is_valid` reflects whether it currently executes.
///
/// # Errors
///
/// Returns an error if the cache cannot be scanned or the listing is
/// cancelled.
pub async fn cache_list(
    ctx: &OpsCtx,
    cancel: &CancellationToken,
    all_networks: bool,
    validate: bool,
) -> Result<CacheListing, Error> {
    ctx.emit(AppEvent::Cache(CacheEvent::ScanStarted {
        network_type: (!all_networks).then(|| ctx.cache.network_type().to_string()),
        cache_dir: ctx.cache.root().to_path_buf(),
    }));
    let report = if all_networks {
        scan_all_networks(cancel, ctx.cache.root(), ctx.cache.binary_name()).await?
    } else {
        ctx.cache.scan(cancel).await?
    };
    ctx.emit(AppEvent::Cache(CacheEvent::ScanCompleted {
        found: report.binaries.len(),
        skipped: report.skipped.len(),
    }));

    let mut binaries = if validate && !report.binaries.is_empty() {
        ctx.selector(SelectorOptions::default())
            .validate(cancel, report.binaries)
            .await?
    } else {
        report.binaries
    };
    sort_by_recency(&mut binaries);
    if validate && !binaries.is_empty() && binaries.iter().all(|b| !b.is_valid) {
        ctx.emit_error_with_details(
            format!("All {} cached binaries failed validation", binaries.len()),
            summarize_failures(&binaries),
        );
    }

    let active_commit = ctx
        .activation
        .current()
        .await?
        .and_then(|active| active.commit_hash);

    Ok(CacheListing {
        cache_dir: ctx.cache.network_dir(),
        binaries,
        skipped: report.skipped.len(),
        validated: validate,
        active_commit,
    })
}

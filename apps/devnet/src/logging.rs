//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields so
//! that debug log files carry the same information the terminal shows.

use devnet_events::{AppEvent, CacheEvent, EventMessage, GeneralEvent, UpgradeEvent};
use tracing::{debug, error, info, trace, warn};

/// Log an event at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let event = &message.event;
    let meta = &message.meta;
    let level = meta.tracing_level();
    match event {
        AppEvent::Upgrade(upgrade_event) => match upgrade_event {
            UpgradeEvent::Started {
                upgrade_name,
                mode,
                skip_governance,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    upgrade_name = %upgrade_name,
                    mode = %mode,
                    skip_governance = skip_governance,
                    "Upgrade started"
                );
            }
            UpgradeEvent::StageChanged { stage } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    stage = %stage,
                    "Upgrade stage changed"
                );
            }
            UpgradeEvent::Plan {
                current_height,
                upgrade_height,
                voting_period,
                average_block_time,
                margin_blocks,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    current_height = current_height,
                    upgrade_height = upgrade_height,
                    voting_period_secs = voting_period.as_secs(),
                    average_block_time_ms = average_block_time.as_millis(),
                    margin_blocks = margin_blocks,
                    "Upgrade height planned"
                );
            }
            UpgradeEvent::ProposalSubmitted {
                proposal_id,
                upgrade_height,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    proposal_id = proposal_id,
                    upgrade_height = upgrade_height,
                    "Proposal submitted"
                );
            }
            UpgradeEvent::HeightProgress { current, target } => {
                trace!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    current = current,
                    target = target,
                    "Height progress"
                );
            }
            UpgradeEvent::Completed {
                duration,
                post_upgrade_height,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    duration_ms = duration.as_millis(),
                    post_upgrade_height = post_upgrade_height,
                    "Upgrade completed"
                );
            }
            UpgradeEvent::Failed { stage, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    stage = %stage,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Upgrade failed"
                );
            }
            UpgradeEvent::Cancelled { stage } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    stage = %stage,
                    "Upgrade cancelled"
                );
            }
            _ => log_at_level(level, message, "Upgrade event"),
        },

        AppEvent::Cache(cache_event) => match cache_event {
            CacheEvent::EntrySkipped { path, reason } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    path = %path.display(),
                    reason = %reason,
                    "Cache entry skipped"
                );
            }
            CacheEvent::BinaryInvalid {
                commit_hash_short,
                reason,
            } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    commit = %commit_hash_short,
                    reason = %reason,
                    "Cached binary failed validation"
                );
            }
            CacheEvent::Activated {
                binary_name,
                target,
                previous,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    binary_name = %binary_name,
                    target = %target.display(),
                    previous = ?previous,
                    "Active binary switched"
                );
            }
            CacheEvent::BinaryStored {
                cache_key,
                path,
                created,
            } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    cache_key = %cache_key,
                    path = %path.display(),
                    created = created,
                    "Binary stored"
                );
            }
            _ => log_at_level(level, message, "Cache event"),
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Warning"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    details = ?details,
                    "Error"
                );
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    correlation = ?meta.correlation_id,
                    message = %message,
                    context = ?context,
                    "Debug log"
                );
            }
            _ => log_at_level(level, message, "General event"),
        },
    }
}

fn log_at_level(level: tracing::Level, message: &EventMessage, label: &str) {
    let meta = &message.meta;
    let event = &message.event;
    match level {
        tracing::Level::ERROR => {
            error!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::WARN => {
            warn!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::INFO => {
            info!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::DEBUG => {
            debug!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
        tracing::Level::TRACE => {
            trace!(source = meta.source.as_str(), event_id = %meta.event_id, correlation = ?meta.correlation_id, event = ?event, "{label}");
        }
    }
}

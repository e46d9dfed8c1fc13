//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use devnet_events::{AppEvent, CacheEvent, EventMessage, GeneralEvent, UpgradeEvent};
use std::time::Duration;

/// Renders progress events to stderr while a command runs
pub struct EventHandler {
    term: Term,
    colors_enabled: bool,
    debug_enabled: bool,
    /// Suppress progress entirely (JSON output)
    quiet: bool,
    /// Last height printed, to avoid repeating identical progress lines
    last_height: Option<u64>,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            colors_enabled,
            debug_enabled,
            quiet,
            last_height: None,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }
        match message.event {
            AppEvent::Upgrade(event) => self.handle_upgrade_event(event),
            AppEvent::Cache(event) => self.handle_cache_event(event),
            AppEvent::General(event) => self.handle_general_event(event),
        }
    }

    fn handle_upgrade_event(&mut self, event: UpgradeEvent) {
        match event {
            UpgradeEvent::Started {
                upgrade_name,
                mode,
                skip_governance,
            } => {
                let path = if skip_governance {
                    "direct replacement"
                } else {
                    "governance"
                };
                let name = if upgrade_name.is_empty() {
                    String::new()
                } else {
                    format!(" '{upgrade_name}'")
                };
                self.show_status(&format!("Starting upgrade{name} ({mode}, {path})"));
            }
            UpgradeEvent::StageChanged { stage } => {
                self.show_debug(&format!("stage: {stage}"));
            }
            UpgradeEvent::GovParamsResolved {
                voting_period,
                source,
            } => {
                self.show_status(&format!(
                    "Voting period {} ({source})",
                    format_duration(voting_period)
                ));
            }
            UpgradeEvent::GovParamsFallback {
                voting_period,
                reason,
            } => {
                self.show_warning(&format!(
                    "Could not query governance parameters ({reason}); using {}",
                    format_duration(voting_period)
                ));
            }
            UpgradeEvent::BlockTimeSampled { average, samples } => {
                self.show_debug(&format!(
                    "average block time {} over {samples} samples",
                    format_duration(average)
                ));
            }
            UpgradeEvent::BlockTimeFallback { block_time, reason } => {
                self.show_warning(&format!(
                    "Could not sample block time ({reason}); assuming {}",
                    format_duration(block_time)
                ));
            }
            UpgradeEvent::Plan {
                current_height,
                upgrade_height,
                voting_period,
                average_block_time,
                margin_blocks,
            } => {
                self.show_status("Upgrade plan:");
                self.show_detail(&format!("current height   {current_height}"));
                self.show_detail(&format!("upgrade height   {upgrade_height}"));
                self.show_detail(&format!(
                    "voting period    {}",
                    format_duration(voting_period)
                ));
                self.show_detail(&format!(
                    "block time       {}",
                    format_duration(average_block_time)
                ));
                self.show_detail(&format!("safety margin    {margin_blocks} blocks"));
            }
            UpgradeEvent::ProposalSubmitted {
                proposal_id,
                upgrade_height,
            } => {
                self.show_status(&format!(
                    "Submitted proposal {proposal_id} for height {upgrade_height}"
                ));
            }
            UpgradeEvent::VoteCast {
                validator,
                proposal_id,
            } => {
                self.show_detail(&format!("{validator} voted yes on {proposal_id}"));
            }
            UpgradeEvent::HeightProgress { current, target } => {
                if self.last_height != Some(current) {
                    self.last_height = Some(current);
                    self.show_detail(&format!("height {current}/{target}"));
                }
            }
            UpgradeEvent::ProposalPassed { proposal_id } => {
                self.show_success(&format!("Proposal {proposal_id} passed"));
            }
            UpgradeEvent::UpgradeHeightReached { height } => {
                self.show_status(&format!("Chain halted at upgrade height {height}"));
            }
            UpgradeEvent::SkipGovernanceWarning => {
                self.show_warning(
                    "Skipping governance: the new binary must accept the existing chain state",
                );
            }
            UpgradeEvent::NodesStopped { count } => {
                self.show_status(&format!("Stopped {count} node(s)"));
            }
            UpgradeEvent::NodesStarted { count } => {
                self.show_status(&format!("Started {count} node(s)"));
            }
            UpgradeEvent::BinarySwitched { mode, target } => {
                self.show_status(&format!("Switched {mode} nodes to {target}"));
            }
            UpgradeEvent::GenesisExported { label, path } => {
                self.show_detail(&format!("{label} genesis exported to {}", path.display()));
            }
            UpgradeEvent::ExportFailed { label, reason } => {
                self.show_warning(&format!("{label} genesis export failed: {reason}"));
            }
            UpgradeEvent::Resumed { height } => {
                self.show_success(&format!("Chain resumed at height {height}"));
            }
            UpgradeEvent::Completed {
                duration,
                post_upgrade_height,
            } => {
                self.show_success(&format!(
                    "Upgrade completed in {} (height {post_upgrade_height})",
                    format_duration(duration)
                ));
            }
            UpgradeEvent::Failed { stage, failure } => {
                self.show_error(&format!("Upgrade failed after {stage}: {}", failure.message));
                if let Some(hint) = failure.hint {
                    self.show_detail(&hint);
                }
            }
            UpgradeEvent::Cancelled { stage } => {
                self.show_warning(&format!("Upgrade cancelled after {stage}"));
            }
        }
    }

    fn handle_cache_event(&mut self, event: CacheEvent) {
        match event {
            CacheEvent::ScanStarted {
                network_type,
                cache_dir,
            } => {
                let scope = network_type.unwrap_or_else(|| "all networks".to_string());
                self.show_debug(&format!("scanning {} ({scope})", cache_dir.display()));
            }
            CacheEvent::EntrySkipped { path, reason } => {
                self.show_debug(&format!("skipped {}: {reason}", path.display()));
            }
            CacheEvent::ScanCompleted { found, skipped } => {
                self.show_debug(&format!("found {found} cached binaries, skipped {skipped}"));
            }
            CacheEvent::ScanFallbackAllNetworks { network_type } => {
                self.show_warning(&format!(
                    "No cached binaries for {network_type}; considering every network"
                ));
            }
            CacheEvent::ValidationStarted { candidates } => {
                self.show_status(&format!("Validating {candidates} cached binaries"));
            }
            CacheEvent::BinaryValidated {
                commit_hash_short,
                version,
            } => {
                let version = version.unwrap_or_else(|| "unknown version".to_string());
                self.show_detail(&format!("{commit_hash_short} ok ({version})"));
            }
            CacheEvent::BinaryInvalid {
                commit_hash_short,
                reason,
            } => {
                self.show_warning(&format!("{commit_hash_short} is not usable: {reason}"));
            }
            CacheEvent::ValidationCompleted {
                valid,
                invalid,
                duration,
            } => {
                self.show_debug(&format!(
                    "validation: {valid} valid, {invalid} invalid in {}",
                    format_duration(duration)
                ));
            }
            CacheEvent::BinaryAutoSelected {
                commit_hash_short,
                git_ref,
                version,
            } => {
                let version = version.map(|v| format!(", {v}")).unwrap_or_default();
                self.show_status(&format!(
                    "Using the only cached binary {commit_hash_short} ({git_ref}{version})"
                ));
            }
            CacheEvent::BinarySelected {
                commit_hash_short,
                git_ref,
            } => {
                self.show_status(&format!("Selected {commit_hash_short} ({git_ref})"));
            }
            CacheEvent::BinaryStored {
                cache_key, created, ..
            } => {
                if created {
                    self.show_debug(&format!("stored {cache_key}"));
                }
            }
            CacheEvent::EntryRemoved { cache_key } => {
                self.show_detail(&format!("removed {cache_key}"));
            }
            CacheEvent::Activated {
                binary_name,
                target,
                ..
            } => {
                self.show_status(&format!("{binary_name} -> {}", target.display()));
            }
            CacheEvent::Migrated {
                binary_name,
                cache_key,
            } => {
                self.show_success(&format!("Migrated {binary_name} into {cache_key}"));
            }
        }
    }

    fn handle_general_event(&mut self, event: GeneralEvent) {
        match event {
            GeneralEvent::Warning { message, context } => {
                self.show_warning(&message);
                if let Some(context) = context {
                    self.show_detail(&context);
                }
            }
            GeneralEvent::Error { message, details } => {
                self.show_error(&message);
                if let Some(details) = details {
                    self.show_detail(&details);
                }
            }
            GeneralEvent::DebugLog { message, .. } => self.show_debug(&message),
            GeneralEvent::OperationStarted { operation } => {
                self.show_debug(&format!("{operation} started"));
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                self.show_debug(&format!("{operation} completed (success: {success})"));
            }
        }
    }

    fn style(&self, style: Style) -> Style {
        if self.colors_enabled {
            style.force_styling(true)
        } else {
            Style::new().force_styling(false)
        }
    }

    fn write(&self, line: &str) {
        // stderr going away is not worth failing the command over
        let _ = self.term.write_line(line);
    }

    fn show_status(&self, message: &str) {
        let style = self.style(Style::new().cyan().bold());
        self.write(&format!("{} {message}", style.apply_to("==>")));
    }

    fn show_detail(&self, message: &str) {
        let style = self.style(Style::new().dim());
        self.write(&format!("    {}", style.apply_to(message)));
    }

    fn show_success(&self, message: &str) {
        let style = self.style(Style::new().green().bold());
        self.write(&format!("{} {message}", style.apply_to("ok")));
    }

    fn show_warning(&self, message: &str) {
        let style = self.style(Style::new().yellow().bold());
        self.write(&format!("{} {message}", style.apply_to("warning:")));
    }

    fn show_error(&self, message: &str) {
        let style = self.style(Style::new().red().bold());
        self.write(&format!("{} {message}", style.apply_to("error:")));
    }

    fn show_debug(&self, message: &str) {
        if self.debug_enabled {
            let style = self.style(Style::new().dim());
            self.write(&format!("{}", style.apply_to(format!("debug: {message}"))));
        }
    }
}

/// Human-readable duration: `850ms`, `12.4s`, `3m05s`
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_400)), "12.4s");
        assert_eq!(format_duration(Duration::from_secs(185)), "3m05s");
    }

    #[test]
    fn test_quiet_handler_accepts_every_domain() {
        let mut handler = EventHandler::new(false, true, true);
        handler.handle_event(EventMessage::from_event(AppEvent::Upgrade(
            UpgradeEvent::SkipGovernanceWarning,
        )));
        handler.handle_event(EventMessage::from_event(AppEvent::Cache(
            CacheEvent::ScanCompleted {
                found: 1,
                skipped: 0,
            },
        )));
        handler.handle_event(EventMessage::from_event(AppEvent::General(
            GeneralEvent::warning("heads up"),
        )));
        assert_eq!(handler.last_height, None);
    }

    #[test]
    fn test_height_progress_deduplicates() {
        let mut handler = EventHandler::new(false, false, false);
        for current in [10, 10, 11] {
            handler.handle_event(EventMessage::from_event(AppEvent::Upgrade(
                UpgradeEvent::HeightProgress {
                    current,
                    target: 20,
                },
            )));
        }
        assert_eq!(handler.last_height, Some(11));
    }
}

//! Output rendering and formatting

use crate::events::format_duration;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use devnet_ops::{CacheChange, CacheListing, OperationResult, StatusReport, UpgradeReport};
use devnet_types::ColorChoice;
use std::io;
use std::time::Duration;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    /// Color configuration
    color_choice: ColorChoice,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool, color_choice: ColorChoice) -> Self {
        Self {
            json_output,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            self.render_json(result)
        } else {
            self.render_table(result)
        }
    }

    /// Render as JSON
    fn render_json(&self, result: &OperationResult) -> io::Result<()> {
        let json = result.to_json().map_err(io::Error::other)?;
        self.term.write_line(&json)
    }

    /// Render as formatted table
    fn render_table(&self, result: &OperationResult) -> io::Result<()> {
        match result {
            OperationResult::Status(report) => self.render_status(report),
            OperationResult::CacheListing(listing) => self.render_cache_listing(listing),
            OperationResult::CacheChange(change) => self.render_cache_change(change),
            OperationResult::Upgrade(report) => self.render_upgrade_report(report),
        }
    }

    fn render_status(&self, report: &StatusReport) -> io::Result<()> {
        self.term
            .write_line(&format!("Home:    {}", report.home.display()))?;

        let Some(devnet) = &report.devnet else {
            self.term
                .write_line("No devnet found. Provision one before upgrading.")?;
            return self.render_active_binary(report);
        };

        self.term
            .write_line(&format!("Chain:   {} ({})", devnet.chain_id, devnet.network_type))?;
        self.term.write_line(&format!(
            "Mode:    {} running {} {}",
            devnet.execution_mode, devnet.binary_name, devnet.current_version
        ))?;
        if let Some(image) = &devnet.docker_image {
            self.term.write_line(&format!("Image:   {image}"))?;
        }
        match (report.height, &report.height_error) {
            (Some(height), _) => self.term.write_line(&format!("Height:  {height}"))?,
            (None, Some(error)) => self
                .term
                .write_line(&format!("Height:  {}", self.style_warning(error)))?,
            (None, None) => self.term.write_line("Height:  -")?,
        }
        self.render_active_binary(report)?;

        if !report.nodes.is_empty() {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("Node").add_attribute(Attribute::Bold),
                Cell::new("State").add_attribute(Attribute::Bold),
                Cell::new("PID").add_attribute(Attribute::Bold),
            ]);
            for node in &report.nodes {
                let state = if node.running {
                    self.colored_cell("running", Color::Green)
                } else {
                    self.colored_cell("stopped", Color::Red)
                };
                table.add_row(vec![
                    Cell::new(&node.name),
                    state,
                    Cell::new(node.pid.map_or_else(|| "-".to_string(), |p| p.to_string())),
                ]);
            }
            self.term.write_line(&table.to_string())?;
        }
        Ok(())
    }

    fn render_active_binary(&self, report: &StatusReport) -> io::Result<()> {
        let line = match &report.active {
            Some(active) => format!(
                "Active:  {} -> {}",
                active.path.display(),
                active.target.display()
            ),
            None if report.plain_binary => format!(
                "Active:  {} (plain file, run `devnet migrate`)",
                self.style_warning("not managed")
            ),
            None => "Active:  none".to_string(),
        };
        self.term.write_line(&line)?;
        self.term
            .write_line(&format!("Cached:  {} binaries", report.cached_binaries))
    }

    fn render_cache_listing(&self, listing: &CacheListing) -> io::Result<()> {
        if listing.binaries.is_empty() {
            self.term.write_line(&format!(
                "No cached binaries in {}.",
                listing.cache_dir.display()
            ))?;
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let mut header = vec![
            Cell::new("").add_attribute(Attribute::Bold),
            Cell::new("Commit").add_attribute(Attribute::Bold),
            Cell::new("Ref").add_attribute(Attribute::Bold),
            Cell::new("Network").add_attribute(Attribute::Bold),
            Cell::new("Built").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
        ];
        if listing.validated {
            header.push(Cell::new("Version").add_attribute(Attribute::Bold));
        }
        table.set_header(header);

        for binary in &listing.binaries {
            let active = listing.active_commit.as_deref() == Some(binary.commit_hash.as_str());
            let mut row = vec![
                Cell::new(if active { "*" } else { "" }),
                Cell::new(&binary.commit_hash_short),
                Cell::new(&binary.git_ref),
                Cell::new(&binary.network_type),
                Cell::new(binary.build_time.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(format_size(binary.size_bytes)),
            ];
            if listing.validated {
                row.push(if binary.is_valid {
                    Cell::new(binary.detected_version.as_deref().unwrap_or("-"))
                } else {
                    self.colored_cell(
                        binary.validation_error.as_deref().unwrap_or("invalid"),
                        Color::Red,
                    )
                });
            }
            table.add_row(row);
        }

        self.term.write_line(&table.to_string())?;
        if listing.skipped > 0 {
            self.term.write_line(&format!(
                "{} unrecognized entries skipped (run with --debug for details)",
                listing.skipped
            ))?;
        }
        Ok(())
    }

    fn render_cache_change(&self, change: &CacheChange) -> io::Result<()> {
        self.term.write_line(&self.style_success(&change.summary))?;
        for key in &change.cache_keys {
            self.term.write_line(&format!("  {key}"))?;
        }
        Ok(())
    }

    fn render_upgrade_report(&self, report: &UpgradeReport) -> io::Result<()> {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let outcome = if report.success {
            self.colored_cell("succeeded", Color::Green)
        } else {
            self.colored_cell("failed", Color::Red)
        };
        table.add_row(vec![Cell::new("Outcome").add_attribute(Attribute::Bold), outcome]);
        table.add_row(vec![
            Cell::new("Last stage").add_attribute(Attribute::Bold),
            Cell::new(report.last_stage.to_string()),
        ]);

        let optional_rows = [
            ("Proposal", report.proposal_id.map(|id| id.to_string())),
            ("Upgrade height", report.upgrade_height.map(|h| h.to_string())),
            (
                "Resumed at",
                report.post_upgrade_height.map(|h| h.to_string()),
            ),
            ("Now running", report.new_binary.clone()),
            ("Version", report.new_version.clone()),
            (
                "Pre-upgrade export",
                report
                    .pre_genesis_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
            ),
            (
                "Post-upgrade export",
                report
                    .post_genesis_path
                    .as_ref()
                    .map(|p| p.display().to_string()),
            ),
        ];
        for (label, value) in optional_rows {
            if let Some(value) = value {
                table.add_row(vec![
                    Cell::new(label).add_attribute(Attribute::Bold),
                    Cell::new(value),
                ]);
            }
        }
        table.add_row(vec![
            Cell::new("Duration").add_attribute(Attribute::Bold),
            Cell::new(format_duration(Duration::from_millis(report.duration_ms))),
        ]);

        self.term.write_line(&table.to_string())?;

        if let Some(message) = &report.message {
            let code = report
                .code
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            self.term
                .write_line(&format!("{}{code}", self.style_error(message)))?;
            if let Some(hint) = &report.hint {
                self.term.write_line(&format!("  Hint: {hint}"))?;
            }
        }
        Ok(())
    }

    fn colors_enabled(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }

    fn colored_cell(&self, text: &str, color: Color) -> Cell {
        if self.colors_enabled() {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    fn style_success(&self, text: &str) -> String {
        self.styled(Style::new().green(), text)
    }

    fn style_warning(&self, text: &str) -> String {
        self.styled(Style::new().yellow(), text)
    }

    fn style_error(&self, text: &str) -> String {
        self.styled(Style::new().red().bold(), text)
    }

    fn styled(&self, style: Style, text: &str) -> String {
        if self.colors_enabled() {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Format a byte count with a binary unit
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 * 10 && unit < UNITS.len() - 1 {
        value /= 1024;
        unit += 1;
    }
    format!("{value} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(64 * 1024), "64 KiB");
        assert_eq!(format_size(85 * 1024 * 1024), "85 MiB");
    }

    #[test]
    fn test_styling_disabled_for_never() {
        let renderer = OutputRenderer::new(false, ColorChoice::Never);
        assert_eq!(renderer.style_error("boom"), "boom");
    }
}

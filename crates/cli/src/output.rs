//! Output formatting
//!
//! Machine-readable JSON goes to stdout; the colored one-line summary goes to
//! stderr so pipelines can consume stdout unchanged.

use std::io::IsTerminal;

use anyhow::Result;
use artifacts::ArtifactStatus;
use colored::Colorize;
use serde::Serialize;
use services::services::context::StageReport;

/// Output handler for stage reports and documents
pub struct OutputHandler {
    pub summary_enabled: bool,
}

impl OutputHandler {
    pub fn new(quiet: bool) -> Self {
        Self {
            summary_enabled: !quiet && std::io::stderr().is_terminal(),
        }
    }

    /// Print a stage report as JSON, plus a summary line for humans
    pub fn print_report(&self, report: &StageReport) -> Result<()> {
        self.print_json(report)?;
        if self.summary_enabled {
            eprintln!("{}", summary_line(report));
        }
        Ok(())
    }

    /// Print any serializable document as pretty JSON
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print a raw text document (e.g. TOML)
    pub fn print_text(&self, text: &str) {
        print!("{}", text);
        if !text.ends_with('\n') {
            println!();
        }
    }
}

fn status_label(status: ArtifactStatus) -> colored::ColoredString {
    match status {
        ArtifactStatus::Healthy => "healthy".bright_green(),
        ArtifactStatus::Partial => "partial".bright_yellow(),
        ArtifactStatus::Degraded => "degraded".yellow(),
        ArtifactStatus::Failed => "failed".bright_red(),
    }
}

fn summary_line(report: &StageReport) -> String {
    let mut line = format!(
        "{} {} {}",
        "▶".bright_cyan(),
        report.stage.bright_white(),
        status_label(report.status)
    );
    match &report.artifact_id {
        Some(id) => line.push_str(&format!(" {} ({} items)", id.dimmed(), report.items)),
        None => line.push_str(&format!(" {}", "no artifact".dimmed())),
    }
    if let Some(note) = &report.note {
        line.push_str(&format!(" - {}", note));
    }
    line
}

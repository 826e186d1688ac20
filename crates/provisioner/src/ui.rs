//! Console output for the provisioning CLI.
//!
//! Every function writes a whole line with a single `println!`, so output
//! from hosts provisioned concurrently never interleaves within a line.

use colored::Colorize;

use crate::phase::PhaseKind;
use crate::status::{HostState, StatusRecord};

/// Print a section header.
pub fn print_section(title: &str) {
    let rule = "═".repeat(70);
    println!("\n{}\n{}\n{}\n", rule.bright_black(), title.cyan().bold(), rule.bright_black());
}

/// Print a phase start line for `host`; `index` is zero-based within a
/// pipeline of `total` phases.
pub fn print_phase(host: &str, phase: PhaseKind, index: usize, total: usize) {
    println!("{}", phase_line(host, phase, index, total));
}

fn phase_line(host: &str, phase: PhaseKind, index: usize, total: usize) -> String {
    format!(
        "{} {} {} {}",
        format!("[{}/{total}]", index + 1).bright_black(),
        format!("{host}:").bold(),
        "▶".cyan(),
        phase.description().bold()
    )
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print one summary line per host.
pub fn print_summary(records: &[StatusRecord]) {
    print_section("Provisioning Summary");

    for record in records {
        let mark = match record.state {
            HostState::Completed => "✓".green().bold(),
            HostState::Failed => "✗".red().bold(),
            HostState::InProgress => "…".yellow().bold(),
        };
        let phases = record
            .completed_phases
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ");

        let line = if record.state == HostState::Failed {
            format!(
                "  {mark} {} {} at {}",
                record.host.bold(),
                record.state,
                record.current_phase
            )
        } else {
            format!("  {mark} {} {} [{phases}]", record.host.bold(), record.state)
        };
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_line_counts_within_pipeline() {
        colored::control::set_override(false);

        assert_eq!(
            phase_line("10.0.0.1", PhaseKind::Verify, 1, 2),
            "[2/2] 10.0.0.1: ▶ Verification"
        );
        assert_eq!(
            phase_line("10.0.0.1", PhaseKind::RequirementCheck, 0, 5),
            "[1/5] 10.0.0.1: ▶ System requirements check"
        );
    }
}

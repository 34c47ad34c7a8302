//! Terminal styling helpers for command output.

use crossterm::style::Stylize;
use svcdeck_core::{Metrics, ResourceState, Status};

/// Display width of a string; CJK and emoji count as two cells.
fn display_width(s: &str) -> usize {
    s.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum()
}

/// Print a boxed title.
pub fn print_header(title: &str) {
    let inner_width: usize = 58;
    let total_padding = inner_width.saturating_sub(display_width(title));
    let left_pad = total_padding / 2;
    let right_pad = total_padding - left_pad;

    println!();
    println!("{}", format!("╔{}╗", "═".repeat(inner_width)).dark_cyan());
    println!(
        "{}",
        format!("║{}{}{}║", " ".repeat(left_pad), title, " ".repeat(right_pad)).dark_cyan()
    );
    println!("{}", format!("╚{}╝", "═".repeat(inner_width)).dark_cyan());
    println!();
}

pub fn print_section(title: &str) {
    println!();
    println!("  {} {}", "▸".dark_cyan(), title.white().bold());
    println!("  {}", "─".repeat(50).dark_grey());
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

pub fn print_info(msg: &str) {
    println!("  {} {}", "ℹ".blue(), msg);
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {:<14} {}", format!("{}:", key).dark_grey(), value);
}

pub fn print_empty(msg: &str) {
    println!();
    println!("  {}", msg.dark_grey().italic());
    println!();
}

pub fn print_hint(msg: &str) {
    println!("  {} {}", "💡".yellow(), msg.dark_grey());
}

/// Spinner-style progress line, finished by one of the `finish_progress_*` helpers.
pub fn print_progress(msg: &str) {
    use std::io::Write;
    print!("  {} {}...", "⏳".yellow(), msg);
    let _ = std::io::stdout().flush();
}

pub fn finish_progress_success(msg: &str) {
    println!("\r  {} {}                    ", "✓".green(), msg);
}

pub fn finish_progress_error(msg: &str) {
    println!("\r  {} {}                    ", "✗".red(), msg);
}

pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  {}", header.white().bold());
    let separator: String = columns
        .iter()
        .map(|(_, width)| "─".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    println!("  {}", separator.dark_grey());
}

/// Plain status label, shared by the table renderer and tests.
pub fn status_label(status: Status, loading: bool) -> String {
    let label = match status {
        Status::Running => "● Running",
        Status::Stopped => "○ Stopped",
        Status::StartPending => "◐ Starting",
        Status::StopPending => "◑ Stopping",
        Status::ContinuePending => "◐ Resuming",
        Status::PausePending => "◑ Pausing",
        Status::Paused => "‖ Paused",
        Status::Error => "✗ Error",
        Status::NotApplicable => "· Directory",
    };
    if loading {
        format!("{} …", label)
    } else {
        label.to_string()
    }
}

pub fn format_state(status: Status, loading: bool) -> String {
    let label = status_label(status, loading);
    match status {
        Status::Running => label.green().to_string(),
        Status::Stopped | Status::NotApplicable => label.dark_grey().to_string(),
        Status::Error => label.red().to_string(),
        _ => label.yellow().to_string(),
    }
}

/// Human readable byte size.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Format uptime from milliseconds to human readable string.
pub fn format_uptime(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// One-line metrics summary; directories show size, services show process figures.
pub fn metrics_summary(state: &ResourceState, now_ms: i64) -> String {
    let m: &Metrics = &state.metrics;
    if state.config.is_directory() {
        return match m.total_size {
            Some(size) => format_bytes(size.max(0) as u64),
            None => "-".to_string(),
        };
    }
    if m.pid == 0 {
        return "-".to_string();
    }
    let uptime = (now_ms - m.create_time).max(0) as u64;
    format!(
        "pid {}  cpu {:.1}%  mem {}  up {}",
        m.pid,
        m.cpu,
        format_bytes(m.mem),
        format_uptime(uptime)
    )
}

/// Truncate by characters to keep CJK names intact.
pub fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() > max {
        format!("{}...", name.chars().take(max.saturating_sub(3)).collect::<String>())
    } else {
        name.to_string()
    }
}

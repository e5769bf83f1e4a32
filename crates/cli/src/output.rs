//! Terminal output utilities
//!
//! Status lines go to stdout, warnings and errors to stderr.

use owo_colors::OwoColorize;

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Print an indented `label: value` line
    pub fn field(label: &str, value: &str) {
        println!("  {:<18} {}", format!("{label}:").dimmed(), value);
    }
}

/// Rounded percentage saved going from `original` to `compressed` bytes.
///
/// Returns 0 for an empty original and a negative value when the output grew.
pub fn calculate_savings(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    ((original as f64 - compressed as f64) / original as f64 * 100.0).round() as i64
}

/// Savings as a coloured percentage
pub fn format_savings(original: u64, compressed: u64) -> String {
    let pct = calculate_savings(original, compressed);
    let text = format!("{pct}%");
    if pct > 0 {
        text.green().to_string()
    } else {
        text.yellow().to_string()
    }
}

/// `original → compressed (savings)` for one image
pub fn format_reduction(original: u64, compressed: u64) -> String {
    format!(
        "{} → {} ({})",
        format_size(original),
        format_size(compressed),
        format_savings(original, compressed)
    )
}

/// Format a file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Pixel dimensions as `WxH`
pub fn format_dimensions(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

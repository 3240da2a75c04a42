use owo_colors::OwoColorize;
use rolodex_core::{AttemptOutcome, PageReport};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!(
        "\n{} {} {}",
        "Rolodex".bold().bright_blue(),
        "v".dimmed(),
        VERSION.dimmed()
    );
    eprintln!("{}", "Scrape business cards from listing pages\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print a labelled value, indented under the current step
pub fn print_detail(label: &str, value: &str) {
    eprintln!("  {} {}", format!("{}:", label).dimmed(), value.bright_white());
}

/// Print timing information with color coding
pub fn print_timing(label: &str, duration: std::time::Duration) {
    let ms = duration.as_secs_f64() * 1000.0;
    let label = format!("{}:", label);

    if ms < 1000.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "fast".dimmed());
    } else if ms < 5000.0 {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "moderate".bright_yellow());
    } else {
        eprintln!("  {} {:>8.2}ms ({})", label.dimmed(), ms, "slow".bright_red());
    }
}

/// Print what one page contributed
pub fn print_page_details(page: &PageReport) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", page.url.bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());

    print_detail("Status", &page.status.to_string());
    if page.final_url.as_str() != page.url {
        print_detail("Final URL", page.final_url.as_str());
    }
    print_detail("Attempts", &format_attempts(page));
    print_detail("Cards", &page.result.total_cards.to_string());
    print_detail("Records", &page.result.records.len().to_string());
    print_detail("Skipped", &page.result.skipped_cards.to_string());
    eprintln!();
}

/// `3 (503, timeout, 200)`
fn format_attempts(page: &PageReport) -> String {
    let outcomes: Vec<String> = page
        .attempts
        .iter()
        .map(|a| match &a.outcome {
            AttemptOutcome::Status(code) => code.to_string(),
            AttemptOutcome::Timeout => "timeout".to_string(),
            AttemptOutcome::NetworkError(_) => "network error".to_string(),
        })
        .collect();
    format!("{} ({})", page.attempts.len(), outcomes.join(", "))
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}

// Notification history status: ledger size, file size, date span.

use colored::Colorize;

use crate::history::NotificationHistory;

/// Display ledger stats to the terminal.
pub fn show(history: &NotificationHistory, retention_days: u32) {
    let path = history.path();
    if !path.exists() {
        println!("History: {} (not created yet)", path.display());
        println!("\nIt is written after the first successful `paperwatch run`.");
        return;
    }

    let file_size = std::fs::metadata(path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("History: {} ({})", path.display(), file_size);
    println!("Notified papers: {}", history.len().to_string().bold());

    match history.date_range() {
        Some((oldest, newest)) => println!("Dates: {oldest} to {newest}"),
        None => println!("Dates: none recorded"),
    }
    println!(
        "Retention: {} days {}",
        retention_days,
        "(run `paperwatch history --prune` to apply now)".dimmed()
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}

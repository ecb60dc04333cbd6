// Colored terminal output for runs, dry runs and the debug commands.
//
// main.rs and the pipeline delegate all user-facing formatting here.

use colored::Colorize;

use super::truncate_chars;
use crate::config::Config;
use crate::fetch::DateWindow;
use crate::filter::names::NamePair;
use crate::filter::FilterVerdict;
use crate::pipeline::RunReport;
use crate::summarize::SummarizedPaper;

/// Show the banner and what this run is watching for.
pub fn display_watch_list(config: &Config, window: &DateWindow) {
    println!("{}", "=".repeat(60));
    println!(
        "{}",
        format!(
            "Research paper watch - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        )
        .bold()
    );
    println!("{}", "=".repeat(60));

    let topics = if config.keywords.topics.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        config.keywords.topics.join(", ")
    };
    let authors = if config.keywords.authors.is_empty() {
        "(none)".dimmed().to_string()
    } else {
        config.keywords.authors.join(", ")
    };
    println!("  Topics:  {topics}");
    println!("  Authors: {authors}");
    println!(
        "  Window:  {window} (similarity >= {:.2})",
        config.search.similarity_threshold
    );
}

/// List matched papers with their match reasons.
pub fn display_verdicts(verdicts: &[FilterVerdict<'_>]) {
    for (i, v) in verdicts.iter().enumerate() {
        println!("\n  [{}] {}", i + 1, truncate_chars(&v.paper.title, 70).bold());
        println!("      {} {}", "Reason:".dimmed(), v.match_reason().cyan());
    }
}

/// What a dry run would have posted.
pub fn display_dry_run(items: &[SummarizedPaper<'_>], send_if_empty: bool) {
    if items.is_empty() {
        if send_if_empty {
            println!("  [DRY RUN] Would post a \"no new papers\" message");
        } else {
            println!("  [DRY RUN] Nothing to post");
        }
        return;
    }

    println!(
        "  {} Would post {} papers:",
        "[DRY RUN]".yellow().bold(),
        items.len()
    );
    for item in items {
        println!("\n  ---");
        println!("  Title:   {}", item.paper.title);
        println!("  URL:     {}", item.paper.url().underline());
        println!("  Match:   {}", item.match_reason);
        match &item.summary {
            Ok(_) => println!("  Summary: {}", truncate_chars(item.japanese(), 100)),
            Err(e) => println!("  Summary: {} ({})", item.japanese(), e.red()),
        }
    }
}

/// End-of-run counts.
pub fn display_report(report: &RunReport) {
    println!("\n{}", "=== Run summary ===".bold());
    println!("  Fetched:    {}", report.fetched);
    println!("  Matched:    {}", report.matched);
    println!("  New:        {}", report.new);
    if report.summary_failures > 0 {
        println!(
            "  Summarized: {} ({} failed)",
            report.summarized,
            report.summary_failures.to_string().red()
        );
    } else {
        println!("  Summarized: {}", report.summarized);
    }
    println!("  Notified:   {}", report.notified.to_string().green());
    if report.pruned > 0 {
        println!("  Pruned:     {} old history entries", report.pruned);
    }
}

/// Output of `paperwatch normalize`.
pub fn display_name_pair(raw: &str, pair: Option<&NamePair>) {
    match pair {
        Some(p) => println!(
            "  {:<32} first={:<16} last={}",
            raw,
            p.first.cyan(),
            p.last.cyan()
        ),
        None => println!("  {:<32} {}", raw, "(unusable name)".red()),
    }
}

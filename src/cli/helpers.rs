//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::ParsedCasino;
use crate::repository::{create_memory_pool, create_pool};
use crate::services::ParserService;

/// Open the database and build the parser service.
pub async fn open_service(settings: &Settings) -> anyhow::Result<Arc<ParserService>> {
    settings.ensure_directories()?;
    let pool = create_pool(&settings.database_path()).await?;
    Ok(Arc::new(ParserService::from_settings(settings, pool)?))
}

/// Parser service backed by a throwaway in-memory database.
pub async fn open_dry_run_service(settings: &Settings) -> anyhow::Result<Arc<ParserService>> {
    let pool = create_memory_pool().await?;
    Ok(Arc::new(ParserService::from_settings(settings, pool)?))
}

/// Expand CLI inputs into URLs. Inputs that look like URLs are taken as-is;
/// anything else is read as a file with one URL per line (`#` comments and
/// blank lines skipped).
pub fn collect_urls(inputs: &[String]) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::new();
    for input in inputs {
        if input.starts_with("http://") || input.starts_with("https://") {
            urls.push(input.clone());
            continue;
        }

        let content = std::fs::read_to_string(Path::new(input))
            .map_err(|e| anyhow::anyhow!("Failed to read URL list {}: {}", input, e))?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(urls)
}

/// Truncate a string to at most `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")
    {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏").progress_chars("█▓░"));
    }
    pb
}

fn show(label: &str, value: impl std::fmt::Display) {
    println!("{:<20} {}", label, value);
}

fn show_opt(label: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        show(label, value);
    }
}

/// Human-readable summary of a parsed casino.
pub fn print_casino(casino: &ParsedCasino) {
    println!("\n{}", console::style(&casino.name).bold());
    println!("{}", "-".repeat(40));
    show("Source:", &casino.source_url);
    show_opt("Rating:", casino.rating);
    show_opt("Owner:", casino.owner.as_deref());
    show_opt("Operator:", casino.operator.as_deref());
    show_opt("Established:", casino.established);
    show_opt("Revenue:", casino.estimated_revenue.as_deref());
    show_opt("Withdrawal limit:", casino.withdrawal_limit_text.as_deref());
    show(
        "Features:",
        format!(
            "{} positive, {} negative, {} interesting",
            casino.features.positive.len(),
            casino.features.negative.len(),
            casino.features.interesting.len()
        ),
    );
    show("Payment methods:", casino.payment_methods.len());
    show("Licenses:", casino.licenses.len());
    show("Game types:", casino.game_types.len());
    show("Game providers:", casino.game_providers.len());
    show("Languages:", casino.languages.len());
    show("Screenshots:", casino.screenshots.len());
    for (kind, bonus) in casino.bonuses.iter() {
        show(&format!("Bonus ({}):", kind.as_str()), truncate(&bonus.name, 50));
    }
}

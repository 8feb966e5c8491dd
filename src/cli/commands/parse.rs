//! Single-page commands.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::services::ParseOutcome;

use super::super::helpers::{open_dry_run_service, open_service, print_casino};

fn report(outcome: &ParseOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match (&outcome.parsed, outcome.casino_id) {
        (Some(casino), Some(id)) if outcome.success => {
            print_casino(casino);
            println!(
                "\n{} {} casino #{}",
                style("✓").green(),
                if outcome.created { "Created" } else { "Updated" },
                id
            );
        }
        _ => {
            println!(
                "{} {}",
                style("✗").red(),
                outcome.error.as_deref().unwrap_or("Parse failed")
            );
        }
    }
    Ok(())
}

/// Fetch, parse and save one review page.
pub async fn cmd_parse(settings: &Settings, url: &str, dry_run: bool, json: bool) -> anyhow::Result<()> {
    if dry_run {
        let service = open_dry_run_service(settings).await?;
        let casino = service.parse_only(url).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&casino)?);
        } else {
            print_casino(&casino);
        }
        return Ok(());
    }

    let service = open_service(settings).await?;
    let outcome = service.parse_and_save(url, None).await;
    report(&outcome, json)?;
    if !outcome.success {
        anyhow::bail!("failed to parse {}", url);
    }
    Ok(())
}

/// Parse a saved HTML file as if it had been fetched from `url`.
pub async fn cmd_parse_html(settings: &Settings, file: &Path, url: &str, json: bool) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;

    let service = open_service(settings).await?;
    let outcome = service.parse_and_save_html(&html, url).await;
    report(&outcome, json)?;
    if !outcome.success {
        anyhow::bail!("failed to parse {}", file.display());
    }
    Ok(())
}

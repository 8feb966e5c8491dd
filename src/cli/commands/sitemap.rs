//! Sitemap discovery command.

use std::time::Duration;

use console::style;

use crate::config::Settings;
use crate::scrapers::fetch::build_client;
use crate::scrapers::sitemap::fetch_review_urls;

use super::super::helpers::open_service;
use super::batch::run_batch;

/// List review URLs from a sitemap, optionally parsing them all.
pub async fn cmd_sitemap(
    settings: &Settings,
    sitemap_url: &str,
    run: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let client = build_client(&settings.user_agent, Duration::from_secs(settings.request_timeout))?;
    let mut urls = fetch_review_urls(&client, sitemap_url).await?;
    if let Some(limit) = limit {
        urls.truncate(limit);
    }

    if urls.is_empty() {
        println!("{} No review URLs found in {}", style("!").yellow(), sitemap_url);
        return Ok(());
    }

    if !run {
        for url in &urls {
            println!("{}", url);
        }
        println!("\n{} review URLs", urls.len());
        return Ok(());
    }

    let service = open_service(settings).await?;
    run_batch(service, urls, Some(sitemap_url)).await?;
    Ok(())
}

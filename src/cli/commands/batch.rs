//! Batch command.

use std::sync::Arc;

use console::style;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::services::{BatchEvent, BatchRunner, JobSummary, ParserService};

use super::super::helpers::{collect_urls, open_service, progress_bar, truncate};

/// Parse every URL given on the command line or listed in files.
pub async fn cmd_batch(settings: &Settings, inputs: &[String], source: Option<&str>) -> anyhow::Result<()> {
    let urls = collect_urls(inputs)?;
    if urls.is_empty() {
        println!("{} No URLs to process", style("!").yellow());
        return Ok(());
    }

    let service = open_service(settings).await?;
    run_batch(service, urls, source.or(Some("cli"))).await?;
    Ok(())
}

/// Run a batch in the foreground with a progress bar.
pub async fn run_batch(
    service: Arc<ParserService>,
    urls: Vec<String>,
    source: Option<&str>,
) -> anyhow::Result<JobSummary> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = BatchRunner::new(service).with_events(tx);
    let job_id = runner.create_job(&urls, source).await?;

    println!(
        "{} Job {} started with {} URLs",
        style("→").cyan(),
        job_id,
        urls.len()
    );

    let pb = progress_bar(urls.len() as u64);
    let worker = tokio::spawn(async move { runner.run(&urls, job_id).await });

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Started { .. } => {}
            BatchEvent::UrlStarted { url, .. } => pb.set_message(truncate(&url, 60)),
            BatchEvent::UrlFinished { url, outcome, .. } => {
                if !outcome.success {
                    pb.println(format!(
                        "{} {}: {}",
                        style("✗").red(),
                        url,
                        outcome.error.as_deref().unwrap_or("failed")
                    ));
                }
                pb.inc(1);
            }
            BatchEvent::Finished(_) => break,
        }
    }
    pb.finish_and_clear();

    let summary = worker.await?;
    println!(
        "{} Job {} completed: {} succeeded, {} failed",
        style("✓").green(),
        summary.job_id,
        summary.successful,
        summary.failed
    );
    Ok(summary)
}

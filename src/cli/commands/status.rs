//! Status command for showing jobs and logs.

use console::style;

use crate::config::Settings;
use crate::models::{Job, LogStatus};
use crate::repository::{create_pool, AsyncCasinoRepository, AsyncJobRepository};

use super::super::helpers::truncate;

fn print_job_line(job: &Job) {
    println!(
        "{:<6} {:<11} {:>5}/{:<5} {:>4} ok {:>4} failed  {}",
        job.id,
        job.status.as_str(),
        job.processed_urls,
        job.total_urls,
        job.successful_urls,
        job.failed_urls,
        job.created_at.format("%Y-%m-%d %H:%M")
    );
}

/// Show overall state, or one job with its latest log rows.
pub async fn cmd_status(settings: &Settings, job_id: Option<i64>) -> anyhow::Result<()> {
    if !settings.database_exists() {
        println!(
            "{} No database yet. Run 'casinoscrape parse <url>' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let pool = create_pool(&settings.database_path()).await?;
    let jobs = AsyncJobRepository::new(pool.clone());

    let Some(job_id) = job_id else {
        let casinos = AsyncCasinoRepository::new(pool);
        println!("\n{}", style("casinoscrape Status").bold());
        println!("{}", "-".repeat(40));
        println!("{:<20} {}", "Database:", settings.database_path().display());
        println!("{:<20} {}", "Casinos:", casinos.count().await?);
        println!("{:<20} {}", "Active jobs:", jobs.active_jobs().await?.len());

        let recent = jobs.recent_jobs(10).await?;
        if !recent.is_empty() {
            println!("\n{}", style("Recent jobs").bold());
            println!("{}", "-".repeat(60));
            for job in &recent {
                print_job_line(job);
            }
        }
        return Ok(());
    };

    let Some(job) = jobs.get_job(job_id).await? else {
        println!("{} Job {} not found", style("!").yellow(), job_id);
        return Ok(());
    };

    println!("\n{}", style(format!("Job {}", job.id)).bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Status:", job.status.as_str());
    println!("{:<20} {}", "Source:", job.source.as_deref().unwrap_or("-"));
    println!(
        "{:<20} {}/{} ({:.0}%)",
        "Processed:",
        job.processed_urls,
        job.total_urls,
        job.progress() * 100.0
    );
    println!("{:<20} {}", "Successful:", job.successful_urls);
    println!("{:<20} {}", "Failed:", job.failed_urls);

    let logs = jobs.recent_logs(Some(job_id)).await?;
    if !logs.is_empty() {
        println!("\n{}", style("Latest log entries").bold());
        println!("{}", "-".repeat(60));
        for log in logs {
            let marker = match log.status {
                LogStatus::Success => style("✓").green(),
                LogStatus::Error => style("✗").red(),
                LogStatus::Pending => style("…").dim(),
            };
            println!("{} {:<50} {}", marker, truncate(&log.url, 50), truncate(&log.message, 60));
        }
    }
    Ok(())
}

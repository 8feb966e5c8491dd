//! Command-line interface.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "casinoscrape", version, about = "Scrape casino review pages into SQLite")]
pub struct Cli {
    /// Config file (TOML or JSON). Discovered automatically when omitted.
    #[arg(long, global = true, env = "CASINOSCRAPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory holding the database.
    #[arg(long, global = true, env = "CASINOSCRAPE_DATA")]
    pub data_dir: Option<PathBuf>,

    /// Resolve relative config paths against the current directory.
    #[arg(long, global = true)]
    pub cwd: bool,

    /// Debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, parse and save one review page
    Parse {
        url: String,

        /// Parse without writing to the database
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a saved HTML file
    ParseHtml {
        file: PathBuf,

        /// URL the HTML was taken from (selects the selector profile)
        #[arg(long)]
        url: String,

        #[arg(long)]
        json: bool,
    },

    /// Parse many pages as one job (URLs or files with one URL per line)
    Batch {
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Label stored on the job
        #[arg(long)]
        source: Option<String>,
    },

    /// List review URLs from a sitemap
    Sitemap {
        url: String,

        /// Parse every URL found as a batch job
        #[arg(long)]
        run: bool,

        /// Only take the first N URLs
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show database state or one job's progress
    Status { job_id: Option<i64> },

    /// Run the relay and job API server
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3030
        #[arg(long, env = "CASINOSCRAPE_BIND")]
        bind: Option<String>,
    },
}

/// Load settings and dispatch the parsed command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data_dir: cli.data_dir,
    })
    .await;

    match cli.command {
        Commands::Parse { url, dry_run, json } => {
            commands::cmd_parse(&settings, &url, dry_run, json).await
        }
        Commands::ParseHtml { file, url, json } => {
            commands::cmd_parse_html(&settings, &file, &url, json).await
        }
        Commands::Batch { inputs, source } => {
            commands::cmd_batch(&settings, &inputs, source.as_deref()).await
        }
        Commands::Sitemap { url, run, limit } => {
            commands::cmd_sitemap(&settings, &url, run, limit).await
        }
        Commands::Status { job_id } => commands::cmd_status(&settings, job_id).await,
        Commands::Serve { bind } => commands::cmd_serve(&settings, bind).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_args() {
        let cli = Cli::parse_from([
            "casinoscrape",
            "--verbose",
            "batch",
            "urls.txt",
            "https://casino.guru/x-review",
            "--source",
            "manual",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Batch { inputs, source } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(source.as_deref(), Some("manual"));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_parse_html_requires_url() {
        assert!(Cli::try_parse_from(["casinoscrape", "parse-html", "page.html"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

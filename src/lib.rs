//! Casino review scraper.
//!
//! Review pages are fetched through a chain of relay strategies, parsed with
//! per-site selector profiles and stored in SQLite. Batches run as background
//! jobs whose progress is written after every URL.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod server;
pub mod services;

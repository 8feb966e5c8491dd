//! Sitemap discovery of review URLs.

use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::info;

use super::dom::{static_selector, text_of};
use super::fetch::FetchError;

/// Path fragment identifying review pages in a sitemap.
pub const REVIEW_PATH: &str = "/casino-review";

static LOC: LazyLock<Selector> = LazyLock::new(|| static_selector("url loc"));

/// Review URLs in a sitemap document, in order, without duplicates.
pub fn extract_review_urls(xml: &str) -> Vec<String> {
    let doc = Html::parse_document(xml);
    let mut seen = HashSet::new();

    doc.select(&LOC)
        .map(text_of)
        .filter(|url| url.contains(REVIEW_PATH))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Download a sitemap and return its review URLs.
pub async fn fetch_review_urls(client: &Client, sitemap_url: &str) -> Result<Vec<String>, FetchError> {
    let response = client
        .get(sitemap_url)
        .send()
        .await
        .map_err(|source| FetchError::Http {
            url: sitemap_url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            strategy: "sitemap",
            status: status.as_u16(),
        });
    }

    let xml = response.text().await.map_err(|source| FetchError::Http {
        url: sitemap_url.to_string(),
        source,
    })?;

    let urls = extract_review_urls(&xml);
    info!("Found {} review URLs in {}", urls.len(), sitemap_url);
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_review_urls() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://casino.guru/casino-review/alpha</loc><lastmod>2024-01-01</lastmod></url>
              <url><loc> https://casino.guru/guides/blackjack </loc></url>
              <url><loc>https://casino.guru/casino-review/beta</loc></url>
              <url><loc>https://casino.guru/casino-review/alpha</loc></url>
            </urlset>"#;
        assert_eq!(
            extract_review_urls(xml),
            vec![
                "https://casino.guru/casino-review/alpha",
                "https://casino.guru/casino-review/beta"
            ]
        );
    }

    #[test]
    fn test_empty_sitemap() {
        assert!(extract_review_urls("<urlset></urlset>").is_empty());
    }
}

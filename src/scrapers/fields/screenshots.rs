//! Screenshot gallery parser.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

use crate::models::Screenshot;
use crate::scrapers::dom::{attr_nonempty, static_selector};

static GALLERY_IMG: LazyLock<Selector> = LazyLock::new(|| {
    static_selector(".gallery-image-figure img, .casino-detail-box-screenshots img")
});
static ANY_IMG: LazyLock<Selector> = LazyLock::new(|| static_selector("img"));

/// Collect gallery images, preferring the lazy-load URL over `src`.
pub fn parse_screenshots(fragment: &str) -> Vec<Screenshot> {
    if fragment.trim().is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_fragment(fragment);

    let mut images: Vec<_> = doc.select(&GALLERY_IMG).collect();
    if images.is_empty() {
        // Other layouts put bare images straight into the gallery container.
        images = doc.select(&ANY_IMG).collect();
    }

    let screenshots: Vec<Screenshot> = images
        .into_iter()
        .filter_map(|img| {
            let url = attr_nonempty(img, "data-src").or_else(|| attr_nonempty(img, "src"))?;
            Some(Screenshot {
                url,
                alt_text: attr_nonempty(img, "alt"),
            })
        })
        .collect();

    debug!("Parsed {} screenshots", screenshots.len());
    screenshots
}

//! Logo-tile lists: payment methods and game providers.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{GameProvider, LogoItem, PaymentMethod};
use crate::scrapers::dom::{attr_nonempty, static_selector};

static LOGO_ITEM: LazyLock<Selector> =
    LazyLock::new(|| static_selector(".casino-detail-logos-item"));
static LINK: LazyLock<Selector> = LazyLock::new(|| static_selector("a"));
static IMG: LazyLock<Selector> = LazyLock::new(|| static_selector("img"));

/// Lazy-load attributes carrying the real image URL; `src` is usually a
/// placeholder and is never used.
const LAZY_SRC_ATTRS: &[&str] = &["data-src", "data-lazy-src"];

pub fn parse_payment_methods(fragment: &str) -> Vec<PaymentMethod> {
    let items = parse_logo_items(fragment, |item| {
        // Payment tiles are always links; bare images are decoration.
        let link = item.select(&LINK).next()?;
        let img = item.select(&IMG).next()?;
        attr_nonempty(link, "title").or_else(|| attr_nonempty(img, "alt"))
    });
    debug!("Parsed {} payment methods", items.len());
    items
}

pub fn parse_game_providers(fragment: &str) -> Vec<GameProvider> {
    let items = parse_logo_items(fragment, |item| {
        let img = item.select(&IMG).next()?;
        attr_nonempty(img, "alt").or_else(|| {
            item.select(&LINK)
                .next()
                .and_then(|link| attr_nonempty(link, "title"))
        })
    });
    debug!("Parsed {} game providers", items.len());
    items
}

fn parse_logo_items<F>(fragment: &str, name_of: F) -> Vec<LogoItem>
where
    F: Fn(ElementRef<'_>) -> Option<String>,
{
    if fragment.trim().is_empty() {
        return Vec::new();
    }
    let doc = Html::parse_fragment(fragment);

    doc.select(&LOGO_ITEM)
        .filter_map(|item| {
            let name = name_of(item)?;
            let logo_url = item
                .select(&IMG)
                .next()
                .and_then(|img| LAZY_SRC_ATTRS.iter().find_map(|a| attr_nonempty(img, a)));
            Some(LogoItem { name, logo_url })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYMENTS: &str = r#"
        <div id="popover-payment-methods">
          <div class="casino-detail-logos-item">
            <a title="Visa" href="/pm/visa"><img alt="visa logo" src="data:," data-src="https://cdn.test/visa.svg"></a>
          </div>
          <div class="casino-detail-logos-item">
            <a href="/pm/skrill"><img alt="Skrill" data-src="https://cdn.test/skrill.svg"></a>
          </div>
          <div class="casino-detail-logos-item">
            <img alt="No link" data-src="https://cdn.test/x.svg">
          </div>
          <div class="casino-detail-logos-item">
            <a title="Bitcoin"><img src="/eager.png"></a>
          </div>
        </div>"#;

    #[test]
    fn test_payment_methods_name_chain_and_lazy_logo() {
        let methods = parse_payment_methods(PAYMENTS);
        assert_eq!(methods.len(), 3);
        assert_eq!(methods[0].name, "Visa");
        assert_eq!(methods[0].logo_url.as_deref(), Some("https://cdn.test/visa.svg"));
        assert_eq!(methods[1].name, "Skrill");
        assert_eq!(methods[2].name, "Bitcoin");
        assert_eq!(methods[2].logo_url, None);
    }

    #[test]
    fn test_game_providers_use_alt() {
        let html = r#"
            <div id="popover-game-providers">
              <div class="casino-detail-logos-item"><img alt="NetEnt" data-src="/netent.png"></div>
              <div class="casino-detail-logos-item"><img alt="" data-src="/blank.png"></div>
              <div class="casino-detail-logos-item"><a title="Pragmatic Play"><img data-src="/pp.png"></a></div>
            </div>"#;
        let providers = parse_game_providers(html);
        let names: Vec<_> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["NetEnt", "Pragmatic Play"]);
        assert_eq!(providers[1].logo_url.as_deref(), Some("/pp.png"));
    }

    #[test]
    fn test_empty_fragment() {
        assert!(parse_payment_methods("").is_empty());
        assert!(parse_game_providers("<div></div>").is_empty());
    }
}

//! Structured withdrawal-limit parser.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

use crate::models::WithdrawalLimits;
use crate::scrapers::dom::{closest, static_selector, text_of};

static HEADER: LazyLock<Selector> = LazyLock::new(|| static_selector(".info-col-section-header"));
static SECTION: LazyLock<Selector> = LazyLock::new(|| static_selector(".info-col-section"));
static BLOCK: LazyLock<Selector> = LazyLock::new(|| static_selector(".mr-m"));
static PERIOD: LazyLock<Selector> = LazyLock::new(|| static_selector(".fs-xs"));
static VALUE: LazyLock<Selector> = LazyLock::new(|| static_selector(".neo-fs-20"));

/// Find the "Withdrawal limits" section and read its per-period values.
pub fn parse_withdrawal_limits(fragment: &str) -> WithdrawalLimits {
    let mut limits = WithdrawalLimits::default();
    if fragment.trim().is_empty() {
        return limits;
    }
    let doc = Html::parse_fragment(fragment);

    let Some(header) = doc
        .select(&HEADER)
        .find(|h| text_of(*h).to_lowercase().contains("withdrawal limits"))
    else {
        return limits;
    };
    let Some(section) = closest(header, &SECTION) else {
        return limits;
    };

    for block in section.select(&BLOCK) {
        if text_of(block).is_empty() {
            continue;
        }
        let (Some(period), Some(value)) = (block.select(&PERIOD).next(), block.select(&VALUE).next())
        else {
            continue;
        };
        let period = text_of(period).to_lowercase();
        let value = Some(text_of(value));
        if period.contains("per day") {
            limits.per_day = value;
        } else if period.contains("per week") {
            limits.per_week = value;
        } else if period.contains("per month") {
            limits.per_month = value;
        }
    }

    debug!("Parsed withdrawal limits: {:?}", limits);
    limits
}

//! Bonus block parser.
//!
//! A bonus block shows the bonus name and links, via `data-popover-content`,
//! to a hidden popover listing condition lines. Each line carries a sprite
//! icon whose id says what the line means; lines sharing an icon (maximum
//! cashout vs. minimum deposit) are told apart by their label text.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{BonusDetails, BonusKind};
use crate::scrapers::dom::{
    collapse_whitespace, collapsed_text, first_text, icon_ref, parse_selector, static_selector,
    text_of,
};

static NO_DEPOSIT_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| static_selector(".info-col-bonus-wrapper-1"));
static DEPOSIT_WRAPPER: LazyLock<Selector> =
    LazyLock::new(|| static_selector(".info-col-bonus-wrapper"));
static NAME: LazyLock<Selector> = LazyLock::new(|| static_selector(".bonus-name-1"));
static SECONDARY_NAME: LazyLock<Selector> = LazyLock::new(|| static_selector(".bonus-name-2"));
static POPOVER_LINK: LazyLock<Selector> =
    LazyLock::new(|| static_selector("[data-popover-content]"));
static CONDITION_LINE: LazyLock<Selector> =
    LazyLock::new(|| static_selector(".bonus-conditions-line"));
static USE: LazyLock<Selector> = LazyLock::new(|| static_selector("use"));
static DIV: LazyLock<Selector> = LazyLock::new(|| static_selector("div"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| static_selector("span"));
static STRONG: LazyLock<Selector> = LazyLock::new(|| static_selector("strong"));

const MIN_DEPOSIT_LABEL: &str = "Minimum deposit:";
const MAX_CASHOUT_LABEL: &str = "Maximum cashout:";
const MAX_BET_LABEL: &str = "Maximum bet:";
const WAGERING_LABEL: &str = "Wagering requirements:";
const EXPIRATION_LABEL: &str = "Bonus expiration:";
const FREE_SPINS_LABEL: &str = "Free spins:";
const FREE_SPINS_CONDITIONS_LABEL: &str = "Free spins conditions:";
const FAST_MARKER: &str = "FAST";

/// Meaning of a condition line, keyed by its sprite icon id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BonusIcon {
    Category,
    MaximumCashout,
    WageringRequirements,
    MaximalBet,
    StopWatch,
    SpinsPerDay,
    FreeSpins,
    FreeSpinsConditions,
    Info,
}

impl BonusIcon {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "base_category_ico_bonuses" => Some(Self::Category),
            "bonus_ico_maximum_cashout" => Some(Self::MaximumCashout),
            "bonus_ico_wagering_requirements" => Some(Self::WageringRequirements),
            "bonus_ico_maximal_bet" => Some(Self::MaximalBet),
            "bonus_ico_stop_watch" => Some(Self::StopWatch),
            "bonus_ico_spins_per_day" => Some(Self::SpinsPerDay),
            "bonus_ico_freespins" => Some(Self::FreeSpins),
            "bonus_ico_expiration_freespins_1" => Some(Self::FreeSpinsConditions),
            "base_ui_ico_info" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Parse a bonus block. Missing pieces leave their fields empty.
pub fn parse_bonus(fragment: &str, kind: BonusKind) -> BonusDetails {
    let mut result = BonusDetails::default();
    if fragment.trim().is_empty() {
        return result;
    }

    let doc = Html::parse_fragment(fragment);
    let wrapper_sel = match kind {
        BonusKind::NoDeposit => &*NO_DEPOSIT_WRAPPER,
        BonusKind::Deposit => &*DEPOSIT_WRAPPER,
    };
    let scope = doc
        .select(wrapper_sel)
        .next()
        .unwrap_or_else(|| doc.root_element());

    result.name = first_text(scope, &NAME);
    result.secondary_name = first_text(scope, &SECONDARY_NAME);

    let Some(popover) = find_popover(&doc, scope) else {
        debug!("{} bonus has no popover content", kind.as_str());
        return result;
    };

    for line in popover.select(&CONDITION_LINE) {
        let Some(icon) = icon_ref(line, &USE) else {
            continue;
        };
        let Some(content) = line.select(&DIV).next() else {
            continue;
        };
        if text_of(content).is_empty() {
            continue;
        }
        match BonusIcon::from_id(&icon) {
            Some(icon) => apply_line(&mut result, kind, icon, content),
            None => debug!("Ignoring bonus line with unknown icon {}", icon),
        }
    }

    debug!(
        "Parsed {} bonus {:?} (wagering={:?})",
        kind.as_str(),
        result.name,
        result.wagering_requirements
    );
    result
}

/// Resolve the popover referenced by the block's `data-popover-content`.
fn find_popover<'a>(doc: &'a Html, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let target = scope
        .select(&POPOVER_LINK)
        .next()?
        .value()
        .attr("data-popover-content")?
        .trim();
    if target.is_empty() {
        return None;
    }
    let selector = parse_selector(target)?;
    doc.select(&selector).next()
}

fn apply_line(result: &mut BonusDetails, kind: BonusKind, icon: BonusIcon, content: ElementRef<'_>) {
    match icon {
        BonusIcon::Category => result.subtype = text_of(content),
        BonusIcon::MaximumCashout => {
            for span in content.select(&SPAN) {
                let text = text_of(span);
                if text.contains(MIN_DEPOSIT_LABEL) {
                    if kind == BonusKind::Deposit {
                        result.min_deposit = strong_or_after(span, &text, MIN_DEPOSIT_LABEL);
                    }
                } else if text.contains(MAX_CASHOUT_LABEL) {
                    result.max_cashout = strong_or_after(span, &text, MAX_CASHOUT_LABEL);
                } else if text.contains(MAX_BET_LABEL) {
                    result.max_bet = strong_or_after(span, &text, MAX_BET_LABEL);
                }
            }
        }
        BonusIcon::WageringRequirements => {
            result.wagering_requirements =
                labeled_value(content, WAGERING_LABEL).unwrap_or_else(|| text_of(content));
        }
        BonusIcon::MaximalBet => {
            if let Some(value) = labeled_value(content, MAX_BET_LABEL) {
                result.max_bet = value;
            }
        }
        BonusIcon::StopWatch => {
            if text_of(content).contains(FAST_MARKER) {
                result.process_speed = "Fast".to_string();
            }
            if let Some(value) = labeled_value(content, EXPIRATION_LABEL) {
                result.expiration = value;
            }
        }
        BonusIcon::SpinsPerDay => {
            if let Some(value) = labeled_value(content, EXPIRATION_LABEL) {
                result.expiration = value;
            }
        }
        BonusIcon::FreeSpins => {
            let text = collapsed_text(content);
            if let Some((_, rest)) = text.split_once(FREE_SPINS_LABEL) {
                result.free_spins_value = rest.trim().to_string();
            }
        }
        BonusIcon::FreeSpinsConditions => {
            let strongs: Vec<String> = content
                .select(&STRONG)
                .map(text_of)
                .filter(|s| !s.is_empty())
                .collect();
            result.free_spins_conditions = if strongs.is_empty() {
                labeled_value(content, FREE_SPINS_CONDITIONS_LABEL).unwrap_or_default()
            } else {
                strongs.join(", ")
            };
        }
        BonusIcon::Info => result.other_info = collapsed_text(content),
    }
}

/// Value for `label` inside `content`: the `<strong>` of the span carrying
/// the label, or else the text following the label.
fn labeled_value(content: ElementRef<'_>, label: &str) -> Option<String> {
    for span in content.select(&SPAN) {
        let text = text_of(span);
        if text.contains(label) {
            return Some(strong_or_after(span, &text, label));
        }
    }
    let text = collapsed_text(content);
    text.split_once(label)
        .map(|(_, rest)| rest.trim().to_string())
}

fn strong_or_after(span: ElementRef<'_>, text: &str, label: &str) -> String {
    let strong = first_text(span, &STRONG);
    if !strong.is_empty() {
        return strong;
    }
    text.split_once(label)
        .map(|(_, rest)| collapse_whitespace(rest))
        .unwrap_or_default()
}

//! Review page parser.
//!
//! Runs the field parsers against one full page using a [`SelectorProfile`]
//! and assembles a [`ParsedCasino`]. Every step is independent; a missing
//! section just leaves its field empty. Only an unrecognizable page or a
//! missing name fails the parse.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use super::dom::{attr_nonempty, doc_first_text, first_text, outer_html_all, text_of};
use super::fields::{
    last_flag_code, parse_bonus, parse_game_providers, parse_languages, parse_payment_methods,
    parse_screenshots, parse_withdrawal_limits,
};
use super::profile::SelectorProfile;
use super::sanitize::sanitize_children;
use crate::models::{BonusKind, Bonuses, Features, License, ParsedCasino};

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)").expect("valid number regex")
});
static LEADING_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("valid integer regex"));
static TH: LazyLock<Selector> = LazyLock::new(|| super::dom::static_selector("th"));
static TD: LazyLock<Selector> = LazyLock::new(|| super::dom::static_selector("td"));
static LI: LazyLock<Selector> = LazyLock::new(|| super::dom::static_selector("li"));

const TITLE_SEPARATORS: &[&str] = &[" - ", " – ", " | "];

/// Errors that make a page unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("page does not appear to be a casino review: {0}")]
    InvalidPageStructure(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("invalid selector for {field}: {selector:?}")]
    InvalidSelector { field: &'static str, selector: String },
}

/// Profile selectors compiled once per parse.
struct PageSelectors {
    logo: Selector,
    heading: Selector,
    title: Selector,
    rating: Selector,
    description: Selector,
    description_html: Selector,
    info_pair: Selector,
    info_label: Selector,
    info_value: Selector,
    legacy_info_row: Selector,
    section: Selector,
    section_header: Selector,
    withdrawal_limit_text: Selector,
    withdrawal_limits: Selector,
    features_column: Selector,
    payment_methods: Selector,
    license_item: Selector,
    license_name: Selector,
    license_flag: Selector,
    game_types: Selector,
    game_providers: Selector,
    no_deposit_bonus: Selector,
    deposit_bonus: Selector,
    screenshots: Selector,
    languages: Selector,
    language_option: Selector,
    external_id: Selector,
}

fn compile(field: &'static str, css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::InvalidSelector {
        field,
        selector: css.to_string(),
    })
}

impl PageSelectors {
    fn compile(p: &SelectorProfile) -> Result<Self, ParseError> {
        Ok(Self {
            logo: compile("logo", &p.logo)?,
            heading: compile("heading", &p.heading)?,
            title: compile("title", &p.title)?,
            rating: compile("rating", &p.rating)?,
            description: compile("description", &p.description)?,
            description_html: compile("description_html", &p.description_html)?,
            info_pair: compile("info_pair", &p.info_pair)?,
            info_label: compile("info_label", &p.info_label)?,
            info_value: compile("info_value", &p.info_value)?,
            legacy_info_row: compile("legacy_info_row", &p.legacy_info_row)?,
            section: compile("section", &p.section)?,
            section_header: compile("section_header", &p.section_header)?,
            withdrawal_limit_text: compile("withdrawal_limit_text", &p.withdrawal_limit_text)?,
            withdrawal_limits: compile("withdrawal_limits", &p.withdrawal_limits)?,
            features_column: compile("features_column", &p.features_column)?,
            payment_methods: compile("payment_methods", &p.payment_methods)?,
            license_item: compile("license_item", &p.license_item)?,
            license_name: compile("license_name", &p.license_name)?,
            license_flag: compile("license_flag", &p.license_flag)?,
            game_types: compile("game_types", &p.game_types)?,
            game_providers: compile("game_providers", &p.game_providers)?,
            no_deposit_bonus: compile("no_deposit_bonus", &p.no_deposit_bonus)?,
            deposit_bonus: compile("deposit_bonus", &p.deposit_bonus)?,
            screenshots: compile("screenshots", &p.screenshots)?,
            languages: compile("languages", &p.languages)?,
            language_option: compile("language_option", &p.language_option)?,
            external_id: compile("external_id", &p.external_id)?,
        })
    }
}

/// Parse a full review page.
pub fn parse_page(
    html: &str,
    url: &str,
    profile: &SelectorProfile,
) -> Result<ParsedCasino, ParseError> {
    let sel = PageSelectors::compile(profile)?;
    let doc = Html::parse_document(html);

    let logo = doc.select(&sel.logo).next();
    if logo.is_none() && doc.select(&sel.heading).next().is_none() {
        return Err(ParseError::InvalidPageStructure(format!(
            "no logo or heading found at {}",
            url
        )));
    }

    let name = extract_name(&doc, &sel, logo);
    if name.is_empty() {
        return Err(ParseError::MissingRequiredField("name"));
    }
    debug!("Parsing {} with profile {}", name, profile.name);

    let mut casino = ParsedCasino {
        name,
        logo_url: logo.and_then(|l| attr_nonempty(l, "src")),
        rating: doc.select(&sel.rating).next().and_then(|el| parse_rating(&text_of(el))),
        description: extract_description(&doc, &sel),
        description_html: doc
            .select(&sel.description_html)
            .next()
            .map(sanitize_children)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        source_url: url.to_string(),
        ..Default::default()
    };

    extract_info(&doc, &sel, &mut casino);

    casino.withdrawal_limit_text = extract_withdrawal_text(&doc, &sel);
    casino.withdrawal_limits =
        parse_withdrawal_limits(&outer_html_all(&doc, &sel.withdrawal_limits));

    casino.features = extract_features(&doc, &sel);
    casino.payment_methods = parse_payment_methods(&outer_html_all(&doc, &sel.payment_methods));
    casino.licenses = extract_licenses(&doc, &sel);
    casino.game_types = doc
        .select(&sel.game_types)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    casino.game_providers = parse_game_providers(&outer_html_all(&doc, &sel.game_providers));
    casino.bonuses = extract_bonuses(&doc, &sel);
    casino.screenshots = parse_screenshots(&outer_html_all(&doc, &sel.screenshots));
    casino.languages = parse_languages(&languages_fragment(&doc, &sel));
    casino.external_id = doc
        .select(&sel.external_id)
        .next()
        .and_then(|el| attr_nonempty(el, &profile.external_id_attr));

    debug!(
        "Parsed {}: rating={:?}, {} payment methods, {} providers, {} languages",
        casino.name,
        casino.rating,
        casino.payment_methods.len(),
        casino.game_providers.len(),
        casino.languages.len()
    );
    Ok(casino)
}

/// Logo alt text, then the first heading, then the `<title>` prefix.
fn extract_name(doc: &Html, sel: &PageSelectors, logo: Option<ElementRef<'_>>) -> String {
    if let Some(alt) = logo.and_then(|l| attr_nonempty(l, "alt")) {
        let name = alt.strip_suffix(" Logo").unwrap_or(&alt).trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let heading = doc_first_text(doc, &sel.heading);
    if !heading.is_empty() {
        return heading;
    }

    let title = doc_first_text(doc, &sel.title);
    let prefix = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.split_once(sep).map(|(head, _)| head))
        .min_by_key(|head| head.len())
        .unwrap_or(&title);
    prefix.trim().to_string()
}

/// Parse a rating such as `"8,5"` or `"4.2/5"`. Anything else is `None`.
pub fn parse_rating(text: &str) -> Option<f64> {
    let normalized = text.trim().replacen(',', ".", 1);
    let number = LEADING_NUMBER.find(&normalized)?;
    number
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Leading integer of a value such as `"2015 (Malta)"`; zero counts as absent.
fn parse_year(text: &str) -> Option<i32> {
    LEADING_INT
        .find(text.trim())
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| *y != 0)
}

fn extract_description(doc: &Html, sel: &PageSelectors) -> Option<String> {
    let parts: Vec<String> = doc
        .select(&sel.description)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Owner, operator, established year and revenue.
///
/// The label/value layout is tried first; the legacy table layout only when
/// none of owner, operator or established was found.
fn extract_info(doc: &Html, sel: &PageSelectors, casino: &mut ParsedCasino) {
    for pair in doc.select(&sel.info_pair) {
        let label = first_text(pair, &sel.info_label).to_lowercase();
        let value = first_text(pair, &sel.info_value);
        assign_info(casino, &label, value, false);
    }

    if casino.owner.is_some() || casino.operator.is_some() || casino.established.is_some() {
        return;
    }

    for row in doc.select(&sel.legacy_info_row) {
        let label = first_text(row, &TH).to_lowercase();
        let value = first_text(row, &TD);
        assign_info(casino, &label, value, true);
    }
}

fn assign_info(casino: &mut ParsedCasino, label: &str, value: String, legacy: bool) {
    if label.contains("owner") {
        casino.owner = non_empty(value);
    } else if label.contains("operator") {
        casino.operator = non_empty(value);
    } else if label.contains("established") || (legacy && label.contains("founded")) {
        casino.established = parse_year(&value);
    } else if label.contains("revenue") {
        casino.estimated_revenue = non_empty(value);
    }
}

fn extract_withdrawal_text(doc: &Html, sel: &PageSelectors) -> Option<String> {
    let section = doc.select(&sel.section).find(|section| {
        first_text(*section, &sel.section_header)
            .to_lowercase()
            .contains("withdrawal limits")
    })?;
    let text = section
        .select(&sel.withdrawal_limit_text)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    non_empty(text)
}

/// Bullets under the "Positives", "Negatives" and "Interesting facts"
/// columns. The list is the element right after the labeled column.
fn extract_features(doc: &Html, sel: &PageSelectors) -> Features {
    let mut features = Features::default();

    for column in doc.select(&sel.features_column) {
        let label = text_of(column);
        let target = if label.contains("Positives") {
            &mut features.positive
        } else if label.contains("Negatives") {
            &mut features.negative
        } else if label.contains("Interesting facts") {
            &mut features.interesting
        } else {
            continue;
        };

        let Some(list) = column.next_siblings().find_map(ElementRef::wrap) else {
            continue;
        };
        target.extend(list.select(&LI).map(text_of).filter(|t| !t.is_empty()));
    }

    features
}

fn extract_licenses(doc: &Html, sel: &PageSelectors) -> Vec<License> {
    doc.select(&sel.license_item)
        .filter_map(|item| {
            let name = first_text(item, &sel.license_name);
            if name.is_empty() {
                return None;
            }
            let country_code = item
                .select(&sel.license_flag)
                .next()
                .and_then(|flag| flag.value().attr("class"))
                .and_then(last_flag_code);
            Some(License { name, country_code })
        })
        .collect()
}

fn extract_bonuses(doc: &Html, sel: &PageSelectors) -> Bonuses {
    let no_deposit = parse_bonus(
        &outer_html_all(doc, &sel.no_deposit_bonus),
        BonusKind::NoDeposit,
    );
    let deposit = parse_bonus(&outer_html_all(doc, &sel.deposit_bonus), BonusKind::Deposit);

    Bonuses {
        no_deposit: no_deposit.has_name().then_some(no_deposit),
        deposit: deposit.has_name().then_some(deposit),
    }
}

/// The languages box, or a synthetic wrapper around loose language blocks.
fn languages_fragment(doc: &Html, sel: &PageSelectors) -> String {
    let fragment = outer_html_all(doc, &sel.languages);
    if !fragment.is_empty() {
        return fragment;
    }
    let options = outer_html_all(doc, &sel.language_option);
    if options.is_empty() {
        debug!("No languages section found");
        return String::new();
    }
    format!("<div>{}</div>", options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Result<ParsedCasino, ParseError> {
        parse_page(html, "https://casino.guru/casino-review/test", &SelectorProfile::default())
    }

    #[test]
    fn test_rejects_non_casino_page() {
        let err = parse("<html><body><p>Hello</p></body></html>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidPageStructure(_)));
    }

    #[test]
    fn test_empty_name_is_missing_field() {
        let err = parse("<html><body><h1>  </h1></body></html>").unwrap_err();
        assert!(matches!(err, ParseError::MissingRequiredField("name")));
    }

    #[test]
    fn test_name_from_logo_alt() {
        let casino = parse(
            r#"<html><body><img class="casino-logo" alt="Spin Palace Logo" src="/logo.png"><h1>Review</h1></body></html>"#,
        )
        .unwrap();
        assert_eq!(casino.name, "Spin Palace");
        assert_eq!(casino.logo_url.as_deref(), Some("/logo.png"));
    }

    #[test]
    fn test_name_from_title_fallback() {
        let casino = parse(
            r#"<html><head><title>Lucky Star Casino - Review 2024</title></head><body><img class="casino-logo" src="/l.png"><h1></h1></body></html>"#,
        )
        .unwrap();
        assert_eq!(casino.name, "Lucky Star Casino");
    }

    #[test]
    fn test_rating_parsing() {
        assert_eq!(parse_rating("8,5"), Some(8.5));
        assert_eq!(parse_rating(" 4.2/5 "), Some(4.2));
        assert_eq!(parse_rating("N/A"), None);
        assert_eq!(parse_rating(""), None);
    }

    #[test]
    fn test_year_parsing() {
        assert_eq!(parse_year("2015 (Malta)"), Some(2015));
        assert_eq!(parse_year("0"), None);
        assert_eq!(parse_year("unknown"), None);
    }

    #[test]
    fn test_invalid_rating_is_null_not_error() {
        let casino = parse(
            r#"<html><body><h1>X Casino</h1><div class="rating"><b>N/A</b></div></body></html>"#,
        )
        .unwrap();
        assert_eq!(casino.rating, None);
        assert!(casino.payment_methods.is_empty());
        assert!(casino.bonuses.deposit.is_none());
    }

    #[test]
    fn test_info_layouts() {
        let new_layout = parse(
            r#"<html><body><h1>A</h1>
            <div class="info-col-section-revenues">
              <div class="my-m"><label class="info-col-section-header">Owner</label><b>Acme Ltd</b></div>
              <div class="my-m"><label class="info-col-section-header">Established</label><b>2019</b></div>
              <div class="my-m"><label class="info-col-section-header">Estimated annual revenues</label><b>&gt; $1,000,000</b></div>
            </div>
            <table class="casino-information"><tr><th>Operator</th><td>Ignored</td></tr></table>
            </body></html>"#,
        )
        .unwrap();
        assert_eq!(new_layout.owner.as_deref(), Some("Acme Ltd"));
        assert_eq!(new_layout.established, Some(2019));
        assert_eq!(new_layout.estimated_revenue.as_deref(), Some("> $1,000,000"));
        assert_eq!(new_layout.operator, None);

        let legacy = parse(
            r#"<html><body><h1>B</h1>
            <table class="casino-information">
              <tr><th>Operator</th><td>Beta NV</td></tr>
              <tr><th>Founded</th><td>2008</td></tr>
            </table></body></html>"#,
        )
        .unwrap();
        assert_eq!(legacy.operator.as_deref(), Some("Beta NV"));
        assert_eq!(legacy.established, Some(2008));
    }

    #[test]
    fn test_features_and_licenses() {
        let casino = parse(
            r#"<html><body><h1>C</h1>
            <div class="casino-detail-box-pros">
              <div class="col"><h4>Positives</h4></div>
              <div class="col"><ul><li>Fast payouts</li><li>Live chat</li></ul></div>
              <div class="col"><h4>Negatives</h4></div>
              <div class="col"><ul><li>High fees</li></ul></div>
            </div>
            <ul class="license-list">
              <li><i class="flag-icon-mt flag-icon"></i><a class="link-secondary">Malta Gaming Authority</a></li>
              <li><a class="link-secondary">Curacao eGaming</a></li>
              <li><span>No name</span></li>
            </ul>
            </body></html>"#,
        )
        .unwrap();
        assert_eq!(casino.features.positive, vec!["Fast payouts", "Live chat"]);
        assert_eq!(casino.features.negative, vec!["High fees"]);
        assert!(casino.features.interesting.is_empty());
        assert_eq!(casino.licenses.len(), 2);
        assert_eq!(casino.licenses[0].country_code.as_deref(), Some("mt"));
        assert_eq!(casino.licenses[1].country_code, None);
    }

    #[test]
    fn test_external_id_and_description_html() {
        let casino = parse(
            r#"<html><body><h1>D</h1>
            <div class="casino-detail-main-col" data-module="modules/casino-detail-tabs" data-casino-id="4821"></div>
            <div class="casino-detail-box-description"><div class="wrap"><p onclick="x()">Great <b>site</b></p></div></div>
            </body></html>"#,
        )
        .unwrap();
        assert_eq!(casino.external_id.as_deref(), Some("4821"));
        assert_eq!(casino.description_html.as_deref(), Some("<p>Great <b>site</b></p>"));
        assert_eq!(casino.description.as_deref(), Some("Great site"));
    }

    #[test]
    fn test_invalid_profile_selector() {
        let profile = SelectorProfile {
            rating: "[[".into(),
            ..SelectorProfile::default()
        };
        let err = parse_page("<h1>x</h1>", "u", &profile).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSelector { field: "rating", .. }));
    }
}

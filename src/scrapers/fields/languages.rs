//! Language availability parser.
//!
//! Each `.language-option` block describes one channel (website, support,
//! live chat). Its full language list lives in a popover; when the popover is
//! missing only the primary language can be inferred from the flag shown on
//! the block itself.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::{CasinoLanguage, LanguageType};
use crate::scrapers::dom::{parse_selector, static_selector, text_of};

static OPTION: LazyLock<Selector> = LazyLock::new(|| static_selector(".language-option"));
static MIDDLE: LazyLock<Selector> = LazyLock::new(|| static_selector(".middle"));
static POPOVER_LINK: LazyLock<Selector> =
    LazyLock::new(|| static_selector("[data-popover-content]"));
static ROW: LazyLock<Selector> = LazyLock::new(|| static_selector(".flex.items-center"));
static FLAG: LazyLock<Selector> = LazyLock::new(|| static_selector(r#"[class*="flag-icon-"]"#));
static NAME_SPAN: LazyLock<Selector> =
    LazyLock::new(|| static_selector(r#"span:not([class*="flag-icon-"])"#));
static PRIMARY_FLAG: LazyLock<Selector> =
    LazyLock::new(|| static_selector(r#".flag-icon-circle-medium [class*="flag-icon-"]"#));

static FLAG_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^flag-icon-([a-z]{2})$").expect("valid flag regex"));

/// Parse every language block in the fragment.
pub fn parse_languages(fragment: &str) -> Vec<CasinoLanguage> {
    let mut languages = Vec::new();
    if fragment.trim().is_empty() {
        return languages;
    }
    let doc = Html::parse_fragment(fragment);

    for option in doc.select(&OPTION) {
        let middle = option
            .select(&MIDDLE)
            .next()
            .map(text_of)
            .unwrap_or_default()
            .to_lowercase();
        let Some(language_type) = classify(&middle) else {
            debug!("Skipping language block {:?}", middle);
            continue;
        };

        match popover_for(&doc, option) {
            Some(popover) => {
                for row in popover.select(&ROW) {
                    if let Some(language) = parse_row(row, language_type) {
                        languages.push(language);
                    }
                }
            }
            None => {
                if let Some(language) = primary_language(option, &middle, language_type) {
                    languages.push(language);
                }
            }
        }
    }

    debug!("Parsed {} languages", languages.len());
    languages
}

fn classify(middle: &str) -> Option<LanguageType> {
    if middle.contains("website") {
        Some(LanguageType::Website)
    } else if middle.contains("support") {
        Some(LanguageType::Support)
    } else if middle.contains("live chat") {
        Some(LanguageType::Livechat)
    } else {
        None
    }
}

fn popover_for<'a>(doc: &'a Html, option: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let target = option
        .select(&POPOVER_LINK)
        .next()?
        .value()
        .attr("data-popover-content")?
        .trim();
    if target.is_empty() {
        return None;
    }
    doc.select(&parse_selector(target)?).next()
}

fn parse_row(row: ElementRef<'_>, language_type: LanguageType) -> Option<CasinoLanguage> {
    let flag = row.select(&FLAG).next()?;
    let country_code = flag_country_code(flag)?;
    let name = row.select(&NAME_SPAN).next().map(text_of)?;
    if name.is_empty() {
        return None;
    }
    Some(CasinoLanguage {
        name,
        country_code: Some(country_code),
        language_type,
    })
}

fn primary_language(
    option: ElementRef<'_>,
    middle: &str,
    language_type: LanguageType,
) -> Option<CasinoLanguage> {
    let flag = option.select(&PRIMARY_FLAG).next()?;
    let country_code = flag_country_code(flag)?;
    let name = if middle.contains("english") {
        "English"
    } else {
        language_for_country(&country_code)
    };
    Some(CasinoLanguage {
        name: name.to_string(),
        country_code: Some(country_code),
        language_type,
    })
}

/// Country code from the **last** `flag-icon-xx` class on the element.
///
/// Flags are sometimes re-tagged without removing the old class, so the last
/// token is the current one.
pub fn flag_country_code(el: ElementRef<'_>) -> Option<String> {
    el.value()
        .attr("class")
        .and_then(last_flag_code)
}

pub(crate) fn last_flag_code(class_attr: &str) -> Option<String> {
    class_attr
        .split_whitespace()
        .rev()
        .find_map(|token| {
            FLAG_CLASS
                .captures(&token.to_lowercase())
                .map(|c| c[1].to_string())
        })
}

/// Primary language shown for a country flag.
pub fn language_for_country(code: &str) -> &'static str {
    match code {
        "gb" | "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "cn" => "Chinese",
        "jp" => "Japanese",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_flag_class_wins() {
        assert_eq!(
            last_flag_code("flag-icon flag-icon-gb flag-icon-squared flag-icon-de").as_deref(),
            Some("de")
        );
        assert_eq!(last_flag_code("flag-icon flag-icon-squared"), None);
    }

    #[test]
    fn test_popover_languages() {
        let html = r##"
          <div class="casino-detail-box-languages">
            <div class="language-option">
              <div class="middle">Website</div>
              <span data-popover-content="#popover-languages-website">+3</span>
            </div>
            <div class="language-option">
              <div class="middle">Live chat</div>
              <span data-popover-content="#popover-languages-livechat">+1</span>
            </div>
            <div id="popover-languages-website">
              <div class="flex items-center"><i class="flag-icon flag-icon-gb"></i><span>English</span></div>
              <div class="flex items-center"><i class="flag-icon flag-icon-gb flag-icon-de"></i><span>German</span></div>
              <div class="flex items-center"><span>No flag</span></div>
            </div>
            <div id="popover-languages-livechat">
              <div class="flex items-center"><i class="flag-icon-fi"></i><span>Finnish</span></div>
            </div>
          </div>"##;
        let languages = parse_languages(html);
        assert_eq!(languages.len(), 3);
        assert_eq!(languages[1].name, "German");
        assert_eq!(languages[1].country_code.as_deref(), Some("de"));
        assert_eq!(languages[1].language_type, LanguageType::Website);
        assert_eq!(languages[2].language_type, LanguageType::Livechat);
    }

    #[test]
    fn test_primary_language_fallback() {
        let html = r#"
          <div>
            <div class="language-option">
              <div class="flag-icon-circle-medium"><i class="flag-icon flag-icon-fr"></i></div>
              <div class="middle">Customer support</div>
            </div>
            <div class="language-option">
              <div class="flag-icon-circle-medium"><i class="flag-icon flag-icon-xx"></i></div>
              <div class="middle">Website</div>
            </div>
            <div class="language-option">
              <div class="flag-icon-circle-medium"><i class="flag-icon flag-icon-us"></i></div>
              <div class="middle">Live chat in English</div>
            </div>
            <div class="language-option"><div class="middle">Newsletter</div></div>
          </div>"#;
        let languages = parse_languages(html);
        let summary: Vec<_> = languages
            .iter()
            .map(|l| (l.name.as_str(), l.language_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("French", LanguageType::Support),
                ("Unknown", LanguageType::Website),
                ("English", LanguageType::Livechat),
            ]
        );
    }

    #[test]
    fn test_no_options() {
        assert!(parse_languages("<div class='casino-detail-box-languages'></div>").is_empty());
    }
}

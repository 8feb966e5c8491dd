//! Per-site selector profiles.
//!
//! A profile names the CSS selectors the page parser uses to find each
//! section of a review page. Profiles are matched against the URL host; any
//! unknown host gets the casino.guru layout.

use serde::{Deserialize, Serialize};
use url::Url;

/// CSS selectors describing one site family's review-page layout.
///
/// Deserialized profiles may omit fields; missing ones fall back to the
/// casino.guru defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorProfile {
    /// Profile identifier used in logs.
    pub name: String,
    /// Substring matched against the URL host (case-insensitive).
    pub host_pattern: String,

    /// Logo image; its `alt` seeds the casino name and `src` the logo URL.
    pub logo: String,
    pub heading: String,
    pub title: String,
    pub rating: String,
    pub description: String,
    /// Container whose inner HTML is sanitized into `description_html`.
    pub description_html: String,

    /// Label/value blocks in the newer info layout.
    pub info_pair: String,
    pub info_label: String,
    pub info_value: String,
    /// Table rows in the legacy info layout (`th` label, `td` value).
    pub legacy_info_row: String,

    /// Generic info section and its header, used for the plain-text
    /// withdrawal limit.
    pub section: String,
    pub section_header: String,
    pub withdrawal_limit_text: String,
    /// Container holding the structured per-period withdrawal limits.
    pub withdrawal_limits: String,

    /// Columns holding the "Positives" / "Negatives" / "Interesting facts"
    /// headings; the list follows the heading's element.
    pub features_column: String,

    pub payment_methods: String,
    pub license_item: String,
    pub license_name: String,
    pub license_flag: String,
    pub game_types: String,
    pub game_providers: String,
    pub no_deposit_bonus: String,
    pub deposit_bonus: String,
    pub screenshots: String,
    pub languages: String,
    /// Individual language blocks, used when the languages box is absent.
    pub language_option: String,

    pub external_id: String,
    pub external_id_attr: String,
}

impl Default for SelectorProfile {
    fn default() -> Self {
        Self::casino_guru()
    }
}

impl SelectorProfile {
    /// Layout of casino.guru review pages.
    pub fn casino_guru() -> Self {
        Self {
            name: "casino.guru".to_string(),
            host_pattern: "casino.guru".to_string(),
            logo: ".casino-logo".to_string(),
            heading: "h1".to_string(),
            title: "title".to_string(),
            rating: ".rating b, .casino-rating__value".to_string(),
            description: ".casino-description p, .casino-detail-box-description".to_string(),
            description_html: ".casino-detail-box-description".to_string(),
            info_pair: ".info-col-section-revenues .my-m".to_string(),
            info_label: "label.info-col-section-header".to_string(),
            info_value: "b".to_string(),
            legacy_info_row: ".casino-information tr".to_string(),
            section: ".info-col-section".to_string(),
            section_header: ".info-col-section-header".to_string(),
            withdrawal_limit_text: ".fs-m.text-bold, .neo-fs-20".to_string(),
            withdrawal_limits: ".payments-withdrawal".to_string(),
            features_column: ".casino-detail-box-pros .col".to_string(),
            payment_methods: "#popover-payment-methods".to_string(),
            license_item: "ul.license-list li".to_string(),
            license_name: "a.link-secondary".to_string(),
            license_flag: "i[class^='flag-icon-'], i[class*=' flag-icon-']".to_string(),
            game_types: ".game-types-list li, .casino-card-available-games-ul li".to_string(),
            game_providers: "#popover-game-providers".to_string(),
            no_deposit_bonus: ".info-col-bonus-wrapper-1".to_string(),
            deposit_bonus: ".info-col-bonus-wrapper".to_string(),
            screenshots: ".casino-detail-box-screenshots".to_string(),
            languages: ".casino-detail-box-languages".to_string(),
            language_option: ".language-option".to_string(),
            external_id: r#".casino-detail-main-col[data-module="modules/casino-detail-tabs"]"#
                .to_string(),
            external_id_attr: "data-casino-id".to_string(),
        }
    }

    /// Layout of askgamblers.com review pages.
    pub fn askgamblers() -> Self {
        Self {
            name: "askgamblers".to_string(),
            host_pattern: "askgamblers.com".to_string(),
            logo: ".casino-logo img".to_string(),
            heading: ".casino-title h1, h1".to_string(),
            rating: ".casino-rating .rating-value".to_string(),
            description: ".casino-description".to_string(),
            description_html: ".casino-description".to_string(),
            info_pair: ".casino-info-item".to_string(),
            info_label: ".info-label".to_string(),
            info_value: ".info-value".to_string(),
            payment_methods: ".payment-methods-section".to_string(),
            license_item: ".licenses-section .license-item".to_string(),
            license_name: ".license-name".to_string(),
            license_flag: ".license-country".to_string(),
            game_types: ".game-types-list .game-type-item".to_string(),
            game_providers: ".game-providers-section".to_string(),
            no_deposit_bonus: ".bonus-item.no-deposit".to_string(),
            deposit_bonus: ".bonus-item.welcome".to_string(),
            screenshots: ".screenshots-gallery".to_string(),
            languages: ".casino-languages".to_string(),
            features_column: ".pros-cons .col".to_string(),
            ..Self::casino_guru()
        }
    }

    /// Whether this profile applies to `haystack` (a lowercase host or URL).
    fn matches(&self, haystack: &str) -> bool {
        let pattern = self.host_pattern.trim().to_lowercase();
        !pattern.is_empty() && haystack.contains(&pattern)
    }
}

/// Ordered set of profiles with a default fallback.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<SelectorProfile>,
    default: SelectorProfile,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileRegistry {
    /// Built-in profiles only.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![SelectorProfile::askgamblers(), SelectorProfile::casino_guru()],
            default: SelectorProfile::casino_guru(),
        }
    }

    /// Built-in profiles plus configured ones, which take precedence.
    pub fn with_profiles(extra: impl IntoIterator<Item = SelectorProfile>) -> Self {
        let mut registry = Self::builtin();
        let mut profiles: Vec<SelectorProfile> = extra.into_iter().collect();
        profiles.append(&mut registry.profiles);
        registry.profiles = profiles;
        registry
    }

    /// Pick the profile for a URL. Unknown hosts get the default profile.
    pub fn resolve(&self, url: &str) -> &SelectorProfile {
        let haystack = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_else(|| url.to_lowercase());

        self.profiles
            .iter()
            .find(|p| p.matches(&haystack))
            .unwrap_or(&self.default)
    }

    pub fn get(&self, name: &str) -> Option<&SelectorProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

//! Casino record produced by the page parser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully parsed casino review page.
///
/// List fields are always present (possibly empty). Numeric fields are
/// `None` when their text could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedCasino {
    pub name: String,
    pub logo_url: Option<String>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    /// Whitelist-sanitized HTML version of the description.
    pub description_html: Option<String>,
    pub owner: Option<String>,
    pub operator: Option<String>,
    pub established: Option<i32>,
    pub estimated_revenue: Option<String>,
    /// Free-text withdrawal limit from the older page layout.
    pub withdrawal_limit_text: Option<String>,
    pub withdrawal_limits: WithdrawalLimits,
    pub features: Features,
    pub payment_methods: Vec<PaymentMethod>,
    pub licenses: Vec<License>,
    pub game_types: Vec<String>,
    pub game_providers: Vec<GameProvider>,
    pub bonuses: Bonuses,
    pub screenshots: Vec<Screenshot>,
    pub languages: Vec<CasinoLanguage>,
    /// Site-native casino identifier.
    pub external_id: Option<String>,
    pub source_url: String,
}

/// Scalar columns of a persisted casino row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Casino {
    pub id: i64,
    pub name: String,
    pub logo_url: Option<String>,
    pub rating: Option<f64>,
    pub owner: Option<String>,
    pub operator: Option<String>,
    pub established: Option<i32>,
    pub withdrawal_limits: WithdrawalLimits,
    pub external_id: Option<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured withdrawal limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalLimits {
    pub per_day: Option<String>,
    pub per_week: Option<String>,
    pub per_month: Option<String>,
}

impl WithdrawalLimits {
    pub fn is_empty(&self) -> bool {
        self.per_day.is_none() && self.per_week.is_none() && self.per_month.is_none()
    }
}

/// Pros, cons and trivia listed on the review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub interesting: Vec<String>,
}

/// Feature list a bullet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Positive,
    Negative,
    Interesting,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Interesting => "interesting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "interesting" => Some(Self::Interesting),
            _ => None,
        }
    }
}

impl Features {
    /// Iterate every bullet tagged with its list.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, &str)> {
        let positive = self.positive.iter().map(|s| (FeatureKind::Positive, s.as_str()));
        let negative = self.negative.iter().map(|s| (FeatureKind::Negative, s.as_str()));
        let interesting = self
            .interesting
            .iter()
            .map(|s| (FeatureKind::Interesting, s.as_str()));
        positive.chain(negative).chain(interesting)
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + self.interesting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named logo tile (payment method or game provider).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoItem {
    pub name: String,
    pub logo_url: Option<String>,
}

pub type PaymentMethod = LogoItem;
pub type GameProvider = LogoItem;

/// Gambling license with an optional ISO country code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub country_code: Option<String>,
}

/// Which bonus block a [`BonusDetails`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    NoDeposit,
    Deposit,
}

impl BonusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoDeposit => "no_deposit",
            Self::Deposit => "deposit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "no_deposit" => Some(Self::NoDeposit),
            "deposit" => Some(Self::Deposit),
            _ => None,
        }
    }
}

/// Bonus conditions. Every field is an empty string when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusDetails {
    pub name: String,
    pub secondary_name: String,
    pub subtype: String,
    /// Only populated for deposit bonuses.
    pub min_deposit: String,
    pub wagering_requirements: String,
    pub max_cashout: String,
    pub max_bet: String,
    pub expiration: String,
    pub process_speed: String,
    pub free_spins_value: String,
    pub free_spins_conditions: String,
    pub other_info: String,
}

impl BonusDetails {
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonuses {
    pub no_deposit: Option<BonusDetails>,
    pub deposit: Option<BonusDetails>,
}

impl Bonuses {
    pub fn iter(&self) -> impl Iterator<Item = (BonusKind, &BonusDetails)> {
        self.no_deposit
            .iter()
            .map(|b| (BonusKind::NoDeposit, b))
            .chain(self.deposit.iter().map(|b| (BonusKind::Deposit, b)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub url: String,
    pub alt_text: Option<String>,
}

/// Where a language is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageType {
    Website,
    Support,
    Livechat,
}

impl LanguageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Support => "support",
            Self::Livechat => "livechat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "website" => Some(Self::Website),
            "support" => Some(Self::Support),
            "livechat" => Some(Self::Livechat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasinoLanguage {
    pub name: String,
    pub country_code: Option<String>,
    pub language_type: LanguageType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_iter_tags_each_list() {
        let features = Features {
            positive: vec!["Fast payouts".into()],
            negative: vec!["High wagering".into(), "No app".into()],
            interesting: vec![],
        };
        let tagged: Vec<_> = features.iter().collect();
        assert_eq!(tagged.len(), 3);
        assert_eq!(tagged[0], (FeatureKind::Positive, "Fast payouts"));
        assert_eq!(tagged[2], (FeatureKind::Negative, "No app"));
    }

    #[test]
    fn test_bonuses_iter_skips_missing() {
        let bonuses = Bonuses {
            no_deposit: None,
            deposit: Some(BonusDetails {
                name: "100% up to $500".into(),
                ..Default::default()
            }),
        };
        let kinds: Vec<_> = bonuses.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![BonusKind::Deposit]);
    }

    #[test]
    fn test_enum_round_trip_names() {
        for t in [LanguageType::Website, LanguageType::Support, LanguageType::Livechat] {
            assert_eq!(LanguageType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(BonusKind::from_str("reload"), None);
    }
}

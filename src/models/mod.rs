//! Domain models.

mod casino;
mod job;

pub use casino::{
    BonusDetails, BonusKind, Bonuses, Casino, CasinoLanguage, FeatureKind, Features, GameProvider,
    LanguageType, License, LogoItem, ParsedCasino, PaymentMethod, Screenshot, WithdrawalLimits,
};
pub use job::{Job, JobStatus, LogStatus, ParseLog};

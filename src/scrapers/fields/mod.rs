//! Field parsers.
//!
//! Each parser takes one HTML fragment already scoped to its container and
//! returns a typed value. They never fail: missing markup yields empty
//! fields or empty lists.

mod bonus;
mod languages;
mod logos;
mod screenshots;
mod withdrawal;

pub use bonus::parse_bonus;
pub use languages::{flag_country_code, language_for_country, parse_languages};
pub use logos::{parse_game_providers, parse_payment_methods};
pub use screenshots::parse_screenshots;
pub use withdrawal::parse_withdrawal_limits;

pub(crate) use languages::last_flag_code;

//! Casino repository.
//!
//! Casinos are matched by case-insensitive name through a lowercased
//! `name_key` column. Child collections fall in
//! two groups:
//!
//! - owned rows (features, languages, bonuses, screenshots) are deleted and
//!   re-inserted on every save, so re-parsing never accumulates duplicates;
//! - shared reference rows (payment methods, licenses, game types, game
//!   providers) are looked up or created, then linked through a join table
//!   that is checked before insert.
//!
//! Related-data writes are individual statements. A failing write is logged
//! and skipped; it never fails the save as a whole.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use super::{name_key, parse_datetime, Result};
use crate::models::{
    BonusDetails, BonusKind, Casino, CasinoLanguage, License, LogoItem, ParsedCasino,
    Screenshot,
};

/// Bonus name stored when the parsed bonus has none.
pub const UNKNOWN_BONUS_NAME: &str = "Unknown Bonus";

/// Row type for SQLx query mapping.
#[derive(sqlx::FromRow)]
struct CasinoRow {
    id: i64,
    name: String,
    logo_url: Option<String>,
    rating: Option<f64>,
    owner: Option<String>,
    operator: Option<String>,
    established: Option<i64>,
    withdrawal_limits: Option<String>,
    external_id: Option<String>,
    source_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<CasinoRow> for Casino {
    fn from(row: CasinoRow) -> Self {
        Casino {
            id: row.id,
            name: row.name,
            logo_url: row.logo_url,
            rating: row.rating,
            owner: row.owner,
            operator: row.operator,
            established: row.established.and_then(|y| i32::try_from(y).ok()),
            withdrawal_limits: row
                .withdrawal_limits
                .and_then(|json| serde_json::from_str(&json).ok())
                .unwrap_or_default(),
            external_id: row.external_id,
            source_url: row.source_url,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        }
    }
}

/// Number of rows per related collection.
///
/// Returned by [`AsyncCasinoRepository::save_related`] (rows written) and
/// [`AsyncCasinoRepository::related_counts`] (rows stored).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelatedCounts {
    pub features: usize,
    pub payment_methods: usize,
    pub licenses: usize,
    pub game_types: usize,
    pub game_providers: usize,
    pub languages: usize,
    pub bonuses: usize,
    pub screenshots: usize,
}

/// Shared lookup tables and their join tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTable {
    PaymentMethods,
    Licenses,
    GameTypes,
    GameProviders,
}

impl ReferenceTable {
    fn table(&self) -> &'static str {
        match self {
            Self::PaymentMethods => "payment_methods",
            Self::Licenses => "licenses",
            Self::GameTypes => "game_types",
            Self::GameProviders => "game_providers",
        }
    }

    fn join_table(&self) -> &'static str {
        match self {
            Self::PaymentMethods => "casino_payment_methods",
            Self::Licenses => "casino_licenses",
            Self::GameTypes => "casino_game_types",
            Self::GameProviders => "casino_game_providers",
        }
    }

    fn join_column(&self) -> &'static str {
        match self {
            Self::PaymentMethods => "payment_method_id",
            Self::Licenses => "license_id",
            Self::GameTypes => "game_type_id",
            Self::GameProviders => "game_provider_id",
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn limits_json(casino: &ParsedCasino) -> Result<Option<String>> {
    if casino.withdrawal_limits.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(&casino.withdrawal_limits)?))
    }
}

/// Async SQLx-backed casino repository.
#[derive(Clone)]
pub struct AsyncCasinoRepository {
    pool: SqlitePool,
}

impl AsyncCasinoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Id of the casino whose name matches, ignoring case.
    pub async fn find_id_by_name(&self, name: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM casinos WHERE name_key = ?")
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Casino>> {
        let row = sqlx::query_as::<_, CasinoRow>(
            r#"SELECT id, name, logo_url, rating, owner, operator, established,
                      withdrawal_limits, external_id, source_url, created_at, updated_at
               FROM casinos WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Casino::from))
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM casinos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a new casino with every scalar field.
    pub async fn insert(&self, casino: &ParsedCasino) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let limits = limits_json(casino)?;

        let result = sqlx::query(
            r#"INSERT INTO casinos (
                   name, name_key, logo_url, rating, description, description_html, owner,
                   operator, established, estimated_revenue, withdrawal_limit_text,
                   withdrawal_limits, external_id, source_url, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)"#,
        )
        .bind(casino.name.trim())
        .bind(name_key(&casino.name))
        .bind(&casino.logo_url)
        .bind(casino.rating)
        .bind(&casino.description)
        .bind(&casino.description_html)
        .bind(&casino.owner)
        .bind(&casino.operator)
        .bind(casino.established)
        .bind(&casino.estimated_revenue)
        .bind(&casino.withdrawal_limit_text)
        .bind(limits)
        .bind(&casino.external_id)
        .bind(&casino.source_url)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrite the scalar fields of an existing casino. The name is left
    /// as first stored.
    pub async fn update(&self, id: i64, casino: &ParsedCasino) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let limits = limits_json(casino)?;

        sqlx::query(
            r#"UPDATE casinos SET
                   logo_url = ?1, rating = ?2, description = ?3, description_html = ?4,
                   owner = ?5, operator = ?6, established = ?7, estimated_revenue = ?8,
                   withdrawal_limit_text = ?9, withdrawal_limits = ?10, external_id = ?11,
                   source_url = ?12, updated_at = ?13
               WHERE id = ?14"#,
        )
        .bind(&casino.logo_url)
        .bind(casino.rating)
        .bind(&casino.description)
        .bind(&casino.description_html)
        .bind(&casino.owner)
        .bind(&casino.operator)
        .bind(casino.established)
        .bind(&casino.estimated_revenue)
        .bind(&casino.withdrawal_limit_text)
        .bind(limits)
        .bind(&casino.external_id)
        .bind(&casino.source_url)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update the casino with the same name, or insert it.
    ///
    /// Returns the casino id and whether a new row was created.
    pub async fn upsert(&self, casino: &ParsedCasino) -> Result<(i64, bool)> {
        match self.find_id_by_name(&casino.name).await? {
            Some(id) => {
                debug!("Updating casino {} ({})", casino.name, id);
                self.update(id, casino).await?;
                Ok((id, false))
            }
            None => {
                let id = self.insert(casino).await?;
                debug!("Inserted casino {} ({})", casino.name, id);
                Ok((id, true))
            }
        }
    }

    /// Persist every related collection of a parsed casino.
    pub async fn save_related(&self, casino_id: i64, casino: &ParsedCasino) -> RelatedCounts {
        RelatedCounts {
            features: self.replace_features(casino_id, casino).await,
            payment_methods: self
                .link_logo_items(casino_id, ReferenceTable::PaymentMethods, &casino.payment_methods)
                .await,
            licenses: self.link_licenses(casino_id, &casino.licenses).await,
            game_types: self.link_game_types(casino_id, &casino.game_types).await,
            game_providers: self
                .link_logo_items(casino_id, ReferenceTable::GameProviders, &casino.game_providers)
                .await,
            languages: self.replace_languages(casino_id, &casino.languages).await,
            bonuses: self.replace_bonuses(casino_id, casino).await,
            screenshots: self.replace_screenshots(casino_id, &casino.screenshots).await,
        }
    }

    async fn delete_children(&self, table: &str, casino_id: i64) -> bool {
        let sql = format!("DELETE FROM {} WHERE casino_id = ?", table);
        match sqlx::query(&sql).bind(casino_id).execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to clear {} for casino {}: {}", table, casino_id, e);
                false
            }
        }
    }

    async fn replace_features(&self, casino_id: i64, casino: &ParsedCasino) -> usize {
        if !self.delete_children("casino_features", casino_id).await {
            return 0;
        }

        let mut saved = 0;
        for (kind, text) in casino.features.iter() {
            let result = sqlx::query(
                "INSERT INTO casino_features (casino_id, feature_type, text) VALUES (?, ?, ?)",
            )
            .bind(casino_id)
            .bind(kind.as_str())
            .bind(text)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => saved += 1,
                Err(e) => warn!("Failed to save {} feature {:?}: {}", kind.as_str(), text, e),
            }
        }
        saved
    }

    async fn replace_languages(&self, casino_id: i64, languages: &[CasinoLanguage]) -> usize {
        if !self.delete_children("casino_languages", casino_id).await {
            return 0;
        }

        let mut saved = 0;
        for language in languages {
            let language_id = match self.language_id(language).await {
                Ok(id) => id,
                Err(e) => {
                    warn!("Failed to resolve language {}: {}", language.name, e);
                    continue;
                }
            };

            let result = sqlx::query(
                "INSERT INTO casino_languages (casino_id, language_id, type) VALUES (?, ?, ?)",
            )
            .bind(casino_id)
            .bind(language_id)
            .bind(language.language_type.as_str())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => saved += 1,
                Err(e) => warn!("Failed to link language {}: {}", language.name, e),
            }
        }
        saved
    }

    /// Get-or-create a language by name and country code.
    async fn language_id(&self, language: &CasinoLanguage) -> Result<i64> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM languages WHERE name_key = ? AND country_code IS ? LIMIT 1",
        )
        .bind(name_key(&language.name))
        .bind(&language.country_code)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let result =
            sqlx::query("INSERT INTO languages (name, name_key, country_code) VALUES (?, ?, ?)")
                .bind(&language.name)
                .bind(name_key(&language.name))
                .bind(&language.country_code)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    async fn replace_bonuses(&self, casino_id: i64, casino: &ParsedCasino) -> usize {
        if !self.delete_children("casino_bonuses", casino_id).await {
            return 0;
        }

        let mut saved = 0;
        for (kind, bonus) in casino.bonuses.iter() {
            match self.insert_bonus(casino_id, kind, bonus).await {
                Ok(()) => saved += 1,
                Err(e) => warn!("Failed to save {} bonus: {}", kind.as_str(), e),
            }
        }
        saved
    }

    async fn insert_bonus(&self, casino_id: i64, kind: BonusKind, bonus: &BonusDetails) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO casino_bonuses (
                   casino_id, bonus_type, name, secondary_name, subtype, min_deposit,
                   wagering_requirements, max_cashout, max_bet, expiration, process_speed,
                   free_spins_value, free_spins_conditions, other_info)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(casino_id)
        .bind(kind.as_str())
        .bind(non_empty(&bonus.name).unwrap_or(UNKNOWN_BONUS_NAME))
        .bind(non_empty(&bonus.secondary_name))
        .bind(non_empty(&bonus.subtype))
        .bind(non_empty(&bonus.min_deposit))
        .bind(non_empty(&bonus.wagering_requirements))
        .bind(non_empty(&bonus.max_cashout))
        .bind(non_empty(&bonus.max_bet))
        .bind(non_empty(&bonus.expiration))
        .bind(non_empty(&bonus.process_speed))
        .bind(non_empty(&bonus.free_spins_value))
        .bind(non_empty(&bonus.free_spins_conditions))
        .bind(non_empty(&bonus.other_info))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_screenshots(&self, casino_id: i64, screenshots: &[Screenshot]) -> usize {
        if !self.delete_children("screenshots", casino_id).await {
            return 0;
        }

        let mut saved = 0;
        for shot in screenshots {
            let result =
                sqlx::query("INSERT INTO screenshots (casino_id, url, alt_text) VALUES (?, ?, ?)")
                    .bind(casino_id)
                    .bind(&shot.url)
                    .bind(&shot.alt_text)
                    .execute(&self.pool)
                    .await;

            match result {
                Ok(_) => saved += 1,
                Err(e) => warn!("Failed to save screenshot {}: {}", shot.url, e),
            }
        }
        saved
    }

    /// Payment methods and game providers: get-or-create with logo backfill.
    async fn link_logo_items(
        &self,
        casino_id: i64,
        table: ReferenceTable,
        items: &[LogoItem],
    ) -> usize {
        let mut linked = 0;
        for item in items {
            let result = async {
                let id = self
                    .logo_item_id(table, &item.name, item.logo_url.as_deref())
                    .await?;
                self.ensure_link(table, casino_id, id).await
            }
            .await;

            match result {
                Ok(_) => linked += 1,
                Err(e) => warn!("Failed to link {} {}: {}", table.table(), item.name, e),
            }
        }
        linked
    }

    async fn logo_item_id(
        &self,
        table: ReferenceTable,
        name: &str,
        logo_url: Option<&str>,
    ) -> Result<i64> {
        let select = format!(
            "SELECT id, logo_url FROM {} WHERE name_key = ?",
            table.table()
        );
        let existing = sqlx::query_as::<_, (i64, Option<String>)>(&select)
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some((id, stored_logo)) => {
                if let (None, Some(logo)) = (stored_logo, logo_url) {
                    let update = format!("UPDATE {} SET logo_url = ? WHERE id = ?", table.table());
                    sqlx::query(&update)
                        .bind(logo)
                        .bind(id)
                        .execute(&self.pool)
                        .await?;
                    debug!("Backfilled logo for {} {}", table.table(), name);
                }
                Ok(id)
            }
            None => {
                let insert = format!(
                    "INSERT INTO {} (name, name_key, logo_url) VALUES (?, ?, ?)",
                    table.table()
                );
                let result = sqlx::query(&insert)
                    .bind(name)
                    .bind(name_key(name))
                    .bind(logo_url)
                    .execute(&self.pool)
                    .await?;
                Ok(result.last_insert_rowid())
            }
        }
    }

    async fn link_licenses(&self, casino_id: i64, licenses: &[License]) -> usize {
        let mut linked = 0;
        for license in licenses {
            let result = async {
                let id = self.license_id(license).await?;
                self.ensure_link(ReferenceTable::Licenses, casino_id, id).await
            }
            .await;

            match result {
                Ok(_) => linked += 1,
                Err(e) => warn!("Failed to link license {}: {}", license.name, e),
            }
        }
        linked
    }

    /// Get-or-create a license, refreshing its country code when a new one
    /// was parsed.
    async fn license_id(&self, license: &License) -> Result<i64> {
        let existing = sqlx::query_as::<_, (i64, Option<String>)>(
            "SELECT id, country_code FROM licenses WHERE name_key = ?",
        )
        .bind(name_key(&license.name))
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some((id, stored_code)) => {
                if license.country_code.is_some() && license.country_code != stored_code {
                    sqlx::query("UPDATE licenses SET country_code = ? WHERE id = ?")
                        .bind(&license.country_code)
                        .bind(id)
                        .execute(&self.pool)
                        .await?;
                }
                Ok(id)
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO licenses (name, name_key, country_code) VALUES (?, ?, ?)",
                )
                .bind(&license.name)
                .bind(name_key(&license.name))
                .bind(&license.country_code)
                .execute(&self.pool)
                .await?;
                Ok(result.last_insert_rowid())
            }
        }
    }

    async fn link_game_types(&self, casino_id: i64, game_types: &[String]) -> usize {
        let mut linked = 0;
        for name in game_types {
            let result = async {
                let id = self.game_type_id(name).await?;
                self.ensure_link(ReferenceTable::GameTypes, casino_id, id).await
            }
            .await;

            match result {
                Ok(_) => linked += 1,
                Err(e) => warn!("Failed to link game type {}: {}", name, e),
            }
        }
        linked
    }

    async fn game_type_id(&self, name: &str) -> Result<i64> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM game_types WHERE name_key = ?")
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let result = sqlx::query("INSERT INTO game_types (name, name_key) VALUES (?, ?)")
            .bind(name)
            .bind(name_key(name))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert the join row unless it already exists. Returns true if a row
    /// was inserted.
    async fn ensure_link(&self, table: ReferenceTable, casino_id: i64, ref_id: i64) -> Result<bool> {
        let exists = format!(
            "SELECT COUNT(*) FROM {} WHERE casino_id = ? AND {} = ?",
            table.join_table(),
            table.join_column()
        );
        let count = sqlx::query_scalar::<_, i64>(&exists)
            .bind(casino_id)
            .bind(ref_id)
            .fetch_one(&self.pool)
            .await?;

        if count > 0 {
            return Ok(false);
        }

        let insert = format!(
            "INSERT INTO {} (casino_id, {}) VALUES (?, ?)",
            table.join_table(),
            table.join_column()
        );
        sqlx::query(&insert)
            .bind(casino_id)
            .bind(ref_id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }

    /// Rows currently stored for each related collection of a casino.
    pub async fn related_counts(&self, casino_id: i64) -> Result<RelatedCounts> {
        let count = |table: &'static str| {
            let sql = format!("SELECT COUNT(*) FROM {} WHERE casino_id = ?", table);
            let pool = self.pool.clone();
            async move {
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(casino_id)
                    .fetch_one(&pool)
                    .await
                    .map(|n| n as usize)
            }
        };

        Ok(RelatedCounts {
            features: count("casino_features").await?,
            payment_methods: count("casino_payment_methods").await?,
            licenses: count("casino_licenses").await?,
            game_types: count("casino_game_types").await?,
            game_providers: count("casino_game_providers").await?,
            languages: count("casino_languages").await?,
            bonuses: count("casino_bonuses").await?,
            screenshots: count("screenshots").await?,
        })
    }

    /// Total rows in a shared reference table.
    pub async fn reference_count(&self, table: ReferenceTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.table());
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
impl AsyncCasinoRepository {
    /// Stored logo of a payment method or game provider.
    async fn reference_logo(&self, table: ReferenceTable, name: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT logo_url FROM {} WHERE name_key = ?",
            table.table()
        );
        let logo = sqlx::query_scalar::<_, Option<String>>(&sql)
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await?;
        Ok(logo.flatten())
    }

    /// Bonus rows of a casino as `(bonus_type, name)`.
    async fn bonus_names(&self, casino_id: i64) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT bonus_type, name FROM casino_bonuses WHERE casino_id = ? ORDER BY id",
        )
        .bind(casino_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

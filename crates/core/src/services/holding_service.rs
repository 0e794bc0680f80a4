use chrono::NaiveDateTime;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::services::earnings_service::round2;
use crate::services::quote_service::QuoteService;
use crate::services::snapshot_service::SnapshotService;
use crate::storage::traits::FundStore;

/// Longest fund code accepted.
const MAX_FUND_CODE_LEN: usize = 16;

/// Manages holdings: add, edit principal, remove.
///
/// All constraint checks run before anything is written.
pub struct HoldingService {
    snapshot_service: SnapshotService,
}

impl HoldingService {
    pub fn new() -> Self {
        Self {
            snapshot_service: SnapshotService::new(),
        }
    }

    /// Trim and check a fund code: non-empty ASCII alphanumerics.
    pub fn normalize_fund_code(&self, fund_code: &str) -> Result<String, CoreError> {
        let code = fund_code.trim();
        if code.is_empty() {
            return Err(CoreError::ValidationError("Fund code must not be empty".into()));
        }
        if code.len() > MAX_FUND_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::ValidationError(format!(
                "Invalid fund code '{code}'"
            )));
        }
        Ok(code.to_string())
    }

    /// Round a principal to 2 decimals; it must stay strictly positive.
    pub fn normalize_principal(&self, principal: f64) -> Result<f64, CoreError> {
        if !principal.is_finite() {
            return Err(CoreError::ValidationError("Principal must be a finite number".into()));
        }
        let rounded = round2(principal);
        if rounded <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Principal must be greater than 0, got {principal}"
            )));
        }
        Ok(rounded)
    }

    /// Add a fund to a user's holdings.
    ///
    /// The fund is validated against the quote source (no quote means the fund
    /// does not exist) and its name is taken from that quote. The same quote
    /// then seeds the first day's snapshot and earnings record.
    pub async fn add_holding(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
        added_at: NaiveDateTime,
    ) -> Result<Holding, CoreError> {
        let code = self.normalize_fund_code(fund_code)?;
        let principal = self.normalize_principal(invest_principal)?;

        if store.get_user(user_id).await?.is_none() {
            return Err(CoreError::UserNotFound(user_id));
        }
        if store.get_holding(user_id, &code).await?.is_some() {
            return Err(CoreError::DuplicateHolding {
                user_id,
                fund_code: code,
            });
        }

        let quote = quotes.fetch(&code).await.map_err(|e| {
            log::warn!("Fund {code} rejected, quote lookup failed: {e}");
            CoreError::FundNotFound(code.clone())
        })?;

        let holding = Holding::new(user_id, code.clone(), quote.name.clone(), principal, added_at);
        store.insert_holding(holding.clone()).await?;
        log::info!("User {user_id} added fund {code} with principal {principal:.2}");

        // The sweep fills the day in later if this first write fails.
        if let Err(e) = self
            .snapshot_service
            .record_day(store, user_id, &code, Some(&quote), holding.added_on(), added_at)
            .await
        {
            log::warn!("First-day snapshot for user {user_id} fund {code} failed: {e}");
        }

        // The holding itself is already saved; pending first-day rows go out
        // with the next flush.
        if let Err(e) = store.flush().await {
            log::warn!("First-day snapshot for user {user_id} fund {code} not saved yet: {e}");
        }
        Ok(holding)
    }

    /// Replace the invested principal of an existing holding.
    pub async fn update_principal(
        &self,
        store: &dyn FundStore,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
    ) -> Result<f64, CoreError> {
        let principal = self.normalize_principal(invest_principal)?;
        store.update_principal(user_id, fund_code.trim(), principal).await?;
        log::info!("User {user_id} set principal of fund {} to {principal:.2}", fund_code.trim());
        Ok(principal)
    }

    /// Remove a holding and its earnings history. Shared quote snapshots stay.
    /// Returns the number of earnings records removed.
    pub async fn remove_holding(
        &self,
        store: &dyn FundStore,
        user_id: i64,
        fund_code: &str,
    ) -> Result<usize, CoreError> {
        let removed = store.delete_holding(user_id, fund_code.trim()).await?;
        log::info!(
            "User {user_id} removed fund {} ({removed} earnings records dropped)",
            fund_code.trim()
        );
        Ok(removed)
    }
}

impl Default for HoldingService {
    fn default() -> Self {
        Self::new()
    }
}

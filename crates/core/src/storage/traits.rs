use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::earnings::EarningsRecord;
use crate::models::holding::{Holding, User};
use crate::models::quote::QuoteSnapshot;

/// What a [`FundStore::write_daily`] call actually inserted.
///
/// `false` means a row with the same key already existed and the write was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DailyWrite {
    pub quote_inserted: bool,
    pub earnings_inserted: bool,
}

/// Read/write contract of the persistence layer.
///
/// Uniqueness is enforced on (user, fund) holdings, (fund, date) quote
/// snapshots and (user, fund, date) earnings records. Inserts of snapshot
/// rows are insert-if-absent: when two writers race on the same key, exactly
/// one inserts and the other observes the existing row without an error.
#[async_trait]
pub trait FundStore: Send + Sync {
    // ── Users ───────────────────────────────────────────────────────

    /// Register a user; names are unique.
    async fn insert_user(&self, name: &str) -> Result<User, CoreError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, CoreError>;

    // ── Holdings ────────────────────────────────────────────────────

    /// Insert a holding. Fails with `DuplicateHolding` if the pair exists and
    /// `UserNotFound` if the user is unknown.
    async fn insert_holding(&self, holding: Holding) -> Result<(), CoreError>;

    async fn get_holding(&self, user_id: i64, fund_code: &str) -> Result<Option<Holding>, CoreError>;

    /// All holdings of one user, newest first.
    async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, CoreError>;

    /// Every (user, fund) pair across all users.
    async fn all_holdings(&self) -> Result<Vec<Holding>, CoreError>;

    async fn update_principal(
        &self,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
    ) -> Result<(), CoreError>;

    /// Delete a holding and that user's earnings records for the fund.
    /// Quote snapshots are shared and stay. Returns the number of earnings
    /// records removed.
    async fn delete_holding(&self, user_id: i64, fund_code: &str) -> Result<usize, CoreError>;

    // ── Quote snapshots ─────────────────────────────────────────────

    async fn get_quote_snapshot(
        &self,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<QuoteSnapshot>, CoreError>;

    /// All snapshots of a fund, ascending by date.
    async fn quote_snapshots(&self, fund_code: &str) -> Result<Vec<QuoteSnapshot>, CoreError>;

    // ── Earnings records ────────────────────────────────────────────

    async fn get_earnings(
        &self,
        user_id: i64,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<EarningsRecord>, CoreError>;

    /// The most recent record strictly before `date`.
    async fn latest_earnings_before(
        &self,
        user_id: i64,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<EarningsRecord>, CoreError>;

    /// Records in `[from, to]`, ascending by date.
    async fn earnings_between(
        &self,
        user_id: i64,
        fund_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EarningsRecord>, CoreError>;

    /// Sum of `day_earn` over records in `[from, until)`; 0.0 when there are none.
    async fn sum_day_earn(
        &self,
        user_id: i64,
        fund_code: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<f64, CoreError>;

    // ── Daily snapshot write ────────────────────────────────────────

    /// Atomically insert a quote snapshot and/or an earnings record, each only
    /// if its key is absent. Nothing is written if any check fails.
    async fn write_daily(
        &self,
        quote: Option<QuoteSnapshot>,
        earnings: Option<EarningsRecord>,
    ) -> Result<DailyWrite, CoreError>;

    /// Make pending writes durable. Stores without a durable backend do nothing.
    async fn flush(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

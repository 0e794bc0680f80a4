pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{NaiveDate, NaiveDateTime};
use models::{
    earnings::LiveEarnings,
    holding::{Holding, User},
    quote::FundQuote,
    settings::TrackerSettings,
    views::{FundRow, PieCharts, StatSummary, SweepReport, TrendChart},
};
use providers::{fundgz::FundgzProvider, traits::QuoteSource};
use services::{
    earnings_service::EarningsService,
    holding_service::HoldingService,
    quote_service::QuoteService,
    report_service::ReportService,
    scheduler::DailyScheduler,
    snapshot_service::{SnapshotOutcome, SnapshotService},
};
use std::sync::Arc;
use storage::{memory::MemoryStore, traits::FundStore};

use errors::CoreError;

/// Main entry point for the fund tracker core library.
///
/// Holds the persistence store, the quote source and all services operating
/// on them. Every operation takes the authenticated user id explicitly; the
/// tracker keeps no per-request state and is shared behind an `Arc`.
#[must_use]
pub struct FundTracker {
    settings: TrackerSettings,
    store: Arc<dyn FundStore>,
    quote_service: QuoteService,
    holding_service: HoldingService,
    snapshot_service: SnapshotService,
    report_service: ReportService,
    earnings_service: EarningsService,
}

impl std::fmt::Debug for FundTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FundTracker")
            .field("settings", &self.settings)
            .field("quote_source", &self.quote_service.source_name())
            .finish()
    }
}

impl FundTracker {
    /// Build a tracker on the live quote feed. With a `ledger_path` the ledger
    /// is loaded from (and flushed to) that file; otherwise it lives in memory.
    pub fn new(settings: TrackerSettings) -> Result<Self, CoreError> {
        settings.validate()?;
        let store: Arc<dyn FundStore> = match &settings.ledger_path {
            Some(path) => Arc::new(MemoryStore::open(path.clone())?),
            None => Arc::new(MemoryStore::new()),
        };
        let source: Arc<dyn QuoteSource> = Arc::new(FundgzProvider::new(&settings)?);
        Ok(Self::with_parts(settings, store, source))
    }

    /// Build a tracker from explicit collaborators (custom store or quote source).
    pub fn with_parts(
        settings: TrackerSettings,
        store: Arc<dyn FundStore>,
        source: Arc<dyn QuoteSource>,
    ) -> Self {
        let quote_service = QuoteService::new(source, settings.max_concurrent_fetches);
        Self {
            settings,
            store,
            quote_service,
            holding_service: HoldingService::new(),
            snapshot_service: SnapshotService::new(),
            report_service: ReportService::new(),
            earnings_service: EarningsService::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn FundStore> {
        &self.store
    }

    /// A stopped scheduler configured for the settings' sweep time.
    pub fn scheduler(&self) -> DailyScheduler {
        DailyScheduler::new(self.settings.sweep_time)
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Create a user. With a ledger file the user exists only once saved.
    pub async fn register_user(&self, name: &str) -> Result<User, CoreError> {
        self.store.insert_user(name).await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, CoreError> {
        self.store.get_user(user_id).await
    }

    // ── Fund lookup ─────────────────────────────────────────────────

    /// Look a fund up on the quote source before adding it.
    pub async fn query_fund(&self, fund_code: &str) -> Result<FundQuote, CoreError> {
        let code = self.holding_service.normalize_fund_code(fund_code)?;
        self.quote_service.fetch(&code).await.map_err(|e| {
            log::warn!("Fund lookup for {code} failed: {e}");
            CoreError::FundNotFound(code)
        })
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Add a fund to the user's holdings and record its first day.
    pub async fn add_holding(
        &self,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
        added_at: NaiveDateTime,
    ) -> Result<Holding, CoreError> {
        self.holding_service
            .add_holding(
                self.store.as_ref(),
                &self.quote_service,
                user_id,
                fund_code,
                invest_principal,
                added_at,
            )
            .await
    }

    /// Change the invested principal. Returns the stored (rounded) value.
    pub async fn update_principal(
        &self,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
    ) -> Result<f64, CoreError> {
        self.holding_service
            .update_principal(self.store.as_ref(), user_id, fund_code, invest_principal)
            .await
    }

    /// Remove a holding and its earnings history.
    /// Returns the number of earnings records removed.
    pub async fn remove_holding(&self, user_id: i64, fund_code: &str) -> Result<usize, CoreError> {
        self.holding_service
            .remove_holding(self.store.as_ref(), user_id, fund_code)
            .await
    }

    pub async fn get_holding(&self, user_id: i64, fund_code: &str) -> Result<Holding, CoreError> {
        self.store
            .get_holding(user_id, fund_code.trim())
            .await?
            .ok_or_else(|| CoreError::HoldingNotFound {
                user_id,
                fund_code: fund_code.trim().to_string(),
            })
    }

    /// The user's holdings, newest first.
    pub async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, CoreError> {
        self.store.list_holdings(user_id).await
    }

    // ── Views ───────────────────────────────────────────────────────

    pub async fn list_view(&self, user_id: i64, today: NaiveDate) -> Result<Vec<FundRow>, CoreError> {
        self.report_service
            .list_view(self.store.as_ref(), &self.quote_service, user_id, today)
            .await
    }

    pub async fn pie_view(&self, user_id: i64, today: NaiveDate) -> Result<PieCharts, CoreError> {
        self.report_service
            .pie_view(self.store.as_ref(), &self.quote_service, user_id, today)
            .await
    }

    pub async fn trend_view(
        &self,
        user_id: i64,
        fund_code: &str,
        today: NaiveDate,
    ) -> Result<TrendChart, CoreError> {
        self.report_service
            .trend_view(
                self.store.as_ref(),
                &self.quote_service,
                user_id,
                fund_code.trim(),
                today,
            )
            .await
    }

    pub async fn stat_view(&self, user_id: i64, today: NaiveDate) -> Result<StatSummary, CoreError> {
        self.report_service
            .stat_view(self.store.as_ref(), &self.quote_service, user_id, today)
            .await
    }

    /// Live two-pass figures for one pair; all zeros when the user does not
    /// hold the fund, 0% change when the quote fetch fails.
    pub async fn live_earnings(
        &self,
        user_id: i64,
        fund_code: &str,
        today: NaiveDate,
    ) -> Result<LiveEarnings, CoreError> {
        let code = fund_code.trim();
        if self.store.get_holding(user_id, code).await?.is_none() {
            return Ok(LiveEarnings::default());
        }
        let change_pct = self
            .quote_service
            .latest(code)
            .await
            .map_or(0.0, |q| q.estimated_change_pct);
        self.earnings_service
            .estimate_for_pair(self.store.as_ref(), user_id, code, change_pct, today)
            .await
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Fetch a quote and record one (user, fund, date).
    ///
    /// A failed flush leaves the rows pending in memory; calling again is a
    /// no-op write followed by another flush attempt.
    pub async fn record_day(
        &self,
        user_id: i64,
        fund_code: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SnapshotOutcome, CoreError> {
        let code = fund_code.trim();
        let quote = self.quote_service.latest(code).await;
        let outcome = self
            .snapshot_service
            .record_day(self.store.as_ref(), user_id, code, quote.as_ref(), date, now)
            .await?;
        self.store.flush().await?;
        Ok(outcome)
    }

    /// Manual refresh: record `date` for every holding of one user.
    pub async fn refresh(
        &self,
        user_id: i64,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SweepReport, CoreError> {
        let holdings = self.store.list_holdings(user_id).await?;
        self.snapshot_service
            .sweep(self.store.as_ref(), &self.quote_service, &holdings, date, now)
            .await
    }

    /// Record `date` for every (user, fund) pair across all users.
    pub async fn run_daily_sweep(
        &self,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SweepReport, CoreError> {
        let holdings = self.store.all_holdings().await?;
        self.snapshot_service
            .sweep(self.store.as_ref(), &self.quote_service, &holdings, date, now)
            .await
    }
}

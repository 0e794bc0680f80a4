use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::earnings::EarningsRecord;
use crate::models::holding::Holding;
use crate::models::quote::{FundQuote, QuoteSnapshot};
use crate::models::views::SweepReport;
use crate::services::earnings_service::{DailyFigures, EarningsService};
use crate::services::quote_service::QuoteService;
use crate::storage::traits::FundStore;

/// Result of recording one (user, fund, date).
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOutcome {
    pub date: NaiveDate,

    /// Change percent used for the day
    pub change_pct: f64,

    /// False when the fund already had a snapshot for the date
    pub quote_written: bool,

    /// False when the holding already had a record for the date
    pub earnings_written: bool,

    /// Figures of the newly written record, if one was written
    pub figures: Option<DailyFigures>,
}

/// Writes the daily quote snapshot and earnings record for holdings.
///
/// Once-a-day semantics: whichever of add-fund, manual refresh or the
/// scheduled sweep gets there first writes the rows; later calls for the same
/// date are no-ops and never double count.
pub struct SnapshotService {
    earnings_service: EarningsService,
}

impl SnapshotService {
    pub fn new() -> Self {
        Self {
            earnings_service: EarningsService::new(),
        }
    }

    /// Ensure one quote snapshot and one earnings record exist for
    /// `(user_id, fund_code, date)`.
    ///
    /// `quote` is the freshly fetched quote; `None` means the fetch failed and
    /// nothing is written. The principal is read from the holding at call time.
    /// Persisted figures use the one-pass form: the previous record's
    /// cumulative earn plus today's earning on the principal as it stood.
    pub async fn record_day(
        &self,
        store: &dyn FundStore,
        user_id: i64,
        fund_code: &str,
        quote: Option<&FundQuote>,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SnapshotOutcome, CoreError> {
        let quote = quote.ok_or_else(|| CoreError::QuoteUnavailable {
            fund_code: fund_code.to_string(),
            reason: "no quote fetched for this cycle".into(),
        })?;

        let holding = store
            .get_holding(user_id, fund_code)
            .await?
            .ok_or_else(|| CoreError::HoldingNotFound {
                user_id,
                fund_code: fund_code.to_string(),
            })?;

        if date < holding.added_on() {
            return Err(CoreError::ValidationError(format!(
                "Cannot record {date} for fund {fund_code}: holding was added on {}",
                holding.added_on()
            )));
        }

        let change_pct = quote.estimated_change_pct;

        let snapshot = match store.get_quote_snapshot(fund_code, date).await? {
            Some(_) => None,
            None => Some(QuoteSnapshot::from_quote(fund_code, quote, date, now)),
        };

        let (record, figures) = match store.get_earnings(user_id, fund_code, date).await? {
            Some(_) => (None, None),
            None => {
                let figures = self
                    .compute_figures(store, &holding, change_pct, date)
                    .await?;
                let record = EarningsRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    fund_code: fund_code.to_string(),
                    record_date: date,
                    principal_at_recording: figures.principal_at_recording,
                    day_change_pct: change_pct,
                    day_earn: figures.day_earn,
                    cumulative_earn: figures.cumulative_earn,
                    created_at: now,
                };
                (Some(record), Some(figures))
            }
        };

        let written = store.write_daily(snapshot, record).await?;
        log::debug!(
            "Recorded {fund_code} for user {user_id} on {date}: quote_written={} earnings_written={}",
            written.quote_inserted,
            written.earnings_inserted
        );

        Ok(SnapshotOutcome {
            date,
            change_pct,
            quote_written: written.quote_inserted,
            earnings_written: written.earnings_inserted,
            // A concurrent writer may have won the race for the record.
            figures: if written.earnings_inserted { figures } else { None },
        })
    }

    /// Fetch and record every holding in `holdings` for `date`.
    ///
    /// Pairs are independent: a failed fetch or write is counted and logged,
    /// and the sweep carries on. Successful writes are flushed together at the
    /// end; only a failing flush is returned as an error.
    pub async fn sweep(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        holdings: &[Holding],
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<SweepReport, CoreError> {
        let mut report = SweepReport::empty(date);
        if holdings.is_empty() {
            log::info!("Snapshot sweep for {date}: no holdings, nothing to record");
            return Ok(report);
        }

        let results = join_all(holdings.iter().map(|holding| async move {
            let quote = quotes.latest(&holding.fund_code).await;
            self.record_day(
                store,
                holding.user_id,
                &holding.fund_code,
                quote.as_ref(),
                date,
                now,
            )
            .await
        }))
        .await;

        for (holding, result) in holdings.iter().zip(results) {
            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    if !matches!(e, CoreError::QuoteUnavailable { .. }) {
                        log::error!(
                            "Snapshot for user {} fund {} on {date} failed: {e}",
                            holding.user_id,
                            holding.fund_code
                        );
                    }
                    report.failed += 1;
                    report
                        .failed_pairs
                        .push((holding.user_id, holding.fund_code.clone()));
                }
            }
        }

        store.flush().await?;

        log::info!(
            "Snapshot sweep for {date} finished: {} succeeded, {} failed",
            report.succeeded,
            report.failed
        );
        Ok(report)
    }

    async fn compute_figures(
        &self,
        store: &dyn FundStore,
        holding: &Holding,
        change_pct: f64,
        date: NaiveDate,
    ) -> Result<DailyFigures, CoreError> {
        let prior_cumulative = store
            .latest_earnings_before(holding.user_id, &holding.fund_code, date)
            .await?
            .filter(|r| r.record_date >= holding.added_on())
            .map(|r| r.cumulative_earn)
            .unwrap_or(0.0);
        Ok(self
            .earnings_service
            .next_record(holding.invest_principal, prior_cumulative, change_pct))
    }
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new()
    }
}

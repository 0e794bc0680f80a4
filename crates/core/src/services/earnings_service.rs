use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::earnings::LiveEarnings;
use crate::models::holding::Holding;
use crate::storage::traits::FundStore;

/// Round a money amount to 2 decimals (half away from zero).
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid handing out -0.0 for tiny negative results.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// The three numbers persisted for one day by the snapshot writer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFigures {
    pub principal_at_recording: f64,
    pub day_earn: f64,
    pub cumulative_earn: f64,
}

/// Earnings arithmetic: daily earning, historical accumulation, current
/// principal and today's estimate.
///
/// Pure business logic. The only method touching storage is
/// [`historical_earn_sum`](Self::historical_earn_sum), which reads through the
/// store it is handed.
///
/// # Two-pass estimate
///
/// `today_earn` depends on `current_principal`, which depends on `total_earn`,
/// which depends on `today_earn`. [`live_estimate`](Self::live_estimate)
/// resolves this with exactly two passes:
///
/// 1. `provisional = today_earn(invest_principal, pct)`
/// 2. `current = current_principal(invest_principal, total_earn(history, provisional))`,
///    then `today = today_earn(current, pct)` and `total = total_earn(history, today)`.
///
/// This is an approximation, not a converged fixed point, and must stay that way.
pub struct EarningsService;

impl EarningsService {
    pub fn new() -> Self {
        Self
    }

    /// `round(principal × change_pct / 100, 2)`
    pub fn daily_earn(&self, principal: f64, change_pct: f64) -> f64 {
        round2(principal * (change_pct / 100.0))
    }

    /// `round(historical_sum + today_earn, 2)`
    pub fn total_earn(&self, historical_sum: f64, today_earn: f64) -> f64 {
        round2(historical_sum + today_earn)
    }

    /// `round(invest_principal + total_earn, 2)`
    pub fn current_principal(&self, invest_principal: f64, total_earn: f64) -> f64 {
        round2(invest_principal + total_earn)
    }

    /// `round(current_principal × change_pct / 100, 2)`
    pub fn today_earn(&self, current_principal: f64, change_pct: f64) -> f64 {
        self.daily_earn(current_principal, change_pct)
    }

    /// Two-pass as-of-now estimate for a holding whose day is not persisted yet.
    pub fn live_estimate(&self, invest_principal: f64, historical_sum: f64, change_pct: f64) -> LiveEarnings {
        // Pass 1: invested principal stands in for the current principal.
        let provisional_today_earn = self.today_earn(invest_principal, change_pct);

        // Pass 2
        let provisional_total = self.total_earn(historical_sum, provisional_today_earn);
        let current_principal = self.current_principal(invest_principal, provisional_total);
        let today_earn = self.today_earn(current_principal, change_pct);
        let total_earn = self.total_earn(historical_sum, today_earn);

        LiveEarnings {
            historical_sum,
            provisional_today_earn,
            current_principal,
            today_earn,
            total_earn,
        }
    }

    /// One-pass figures for a persisted day: the day's earning on the principal
    /// as it stood after the previous record, added to the running total.
    pub fn next_record(&self, invest_principal: f64, prior_cumulative: f64, change_pct: f64) -> DailyFigures {
        let principal_at_recording = self.current_principal(invest_principal, prior_cumulative);
        let day_earn = self.daily_earn(principal_at_recording, change_pct);
        DailyFigures {
            principal_at_recording,
            day_earn,
            cumulative_earn: round2(prior_cumulative + day_earn),
        }
    }

    /// Sum of persisted `day_earn` in `[added_on, as_of)`, rounded. The day
    /// being computed is always excluded.
    pub async fn historical_earn_sum(
        &self,
        store: &dyn FundStore,
        holding: &Holding,
        as_of: NaiveDate,
    ) -> Result<f64, CoreError> {
        let sum = store
            .sum_day_earn(holding.user_id, &holding.fund_code, holding.added_on(), as_of)
            .await?;
        Ok(round2(sum))
    }

    /// Read the history for `holding` and run the two-pass estimate for `as_of`.
    pub async fn estimate_for(
        &self,
        store: &dyn FundStore,
        holding: &Holding,
        change_pct: f64,
        as_of: NaiveDate,
    ) -> Result<LiveEarnings, CoreError> {
        let historical_sum = self.historical_earn_sum(store, holding, as_of).await?;
        Ok(self.live_estimate(holding.invest_principal, historical_sum, change_pct))
    }

    /// Like [`estimate_for`](Self::estimate_for) but keyed by (user, fund).
    /// A pair without a holding yields all-zero figures.
    pub async fn estimate_for_pair(
        &self,
        store: &dyn FundStore,
        user_id: i64,
        fund_code: &str,
        change_pct: f64,
        as_of: NaiveDate,
    ) -> Result<LiveEarnings, CoreError> {
        match store.get_holding(user_id, fund_code).await? {
            Some(holding) => self.estimate_for(store, &holding, change_pct, as_of).await,
            None => Ok(LiveEarnings::default()),
        }
    }
}

impl Default for EarningsService {
    fn default() -> Self {
        Self::new()
    }
}

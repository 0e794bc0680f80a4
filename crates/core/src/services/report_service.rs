use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::earnings::LiveEarnings;
use crate::models::holding::Holding;
use crate::models::quote::FundQuote;
use crate::models::views::{FundRow, PieCharts, PieSlice, StatSummary, TrendChart, TrendPoint};
use crate::services::earnings_service::{round2, EarningsService};
use crate::services::quote_service::QuoteService;
use crate::storage::traits::FundStore;

/// A holding paired with its live quote and two-pass estimate.
struct LiveHolding {
    holding: Holding,
    quote: Option<FundQuote>,
    estimate: LiveEarnings,
}

impl LiveHolding {
    fn change_pct(&self) -> f64 {
        self.quote.as_ref().map_or(0.0, |q| q.estimated_change_pct)
    }
}

/// Builds the read-only views: holdings list, pie charts, trend line and totals.
///
/// Every view fetches live quotes (never cached) and runs the two-pass
/// estimate for `today`. A failed fetch degrades that fund to a 0% change for
/// the cycle instead of failing the view.
pub struct ReportService {
    earnings_service: EarningsService,
}

impl ReportService {
    pub fn new() -> Self {
        Self {
            earnings_service: EarningsService::new(),
        }
    }

    /// One row per holding, newest holding first.
    pub async fn list_view(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<FundRow>, CoreError> {
        let live = self.live_holdings(store, quotes, user_id, today).await?;
        let yesterday = today.pred_opt();

        let mut rows = Vec::with_capacity(live.len());
        for item in live {
            let stored_yesterday = match yesterday {
                Some(day) => {
                    store
                        .get_earnings(user_id, &item.holding.fund_code, day)
                        .await?
                }
                None => None,
            };
            let today_change_pct = item.change_pct();
            rows.push(FundRow {
                fund_code: item.holding.fund_code.clone(),
                fund_name: item.holding.fund_name.clone(),
                invest_principal: item.holding.invest_principal,
                cumulative_earn: item.estimate.total_earn,
                current_principal: item.estimate.current_principal,
                yesterday_change_pct: stored_yesterday.as_ref().map_or(0.0, |r| r.day_change_pct),
                yesterday_earn: stored_yesterday.as_ref().map_or(0.0, |r| r.day_earn),
                today_change_pct,
                today_earn: item.estimate.today_earn,
                today_unit_net_value: item.quote.as_ref().map_or(0.0, |q| q.unit_net_value),
                today_estimated_at: item.quote.as_ref().map(|q| q.estimated_at),
                added_at: item.holding.added_at,
            });
        }
        Ok(rows)
    }

    /// Principal share and live-earning share per fund.
    ///
    /// With no holdings, each pie is a single "no data" placeholder slice so a
    /// renderer never receives an empty distribution.
    pub async fn pie_view(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<PieCharts, CoreError> {
        let live = self.live_holdings(store, quotes, user_id, today).await?;
        if live.is_empty() {
            return Ok(PieCharts {
                principal_pie: vec![PieSlice::placeholder()],
                today_earn_pie: vec![PieSlice::placeholder()],
            });
        }

        let principals: Vec<(String, f64)> = live
            .iter()
            .map(|l| (l.holding.fund_name.clone(), l.holding.invest_principal))
            .collect();
        let earnings: Vec<(String, f64)> = live
            .iter()
            .map(|l| (l.holding.fund_name.clone(), l.estimate.today_earn))
            .collect();

        Ok(PieCharts {
            principal_pie: distribute(&principals),
            today_earn_pie: distribute(&earnings),
        })
    }

    /// Persisted daily series from the add date through `today`, plus one
    /// synthetic live row when today is not persisted yet.
    ///
    /// A holding with no records whose quote fetch fails yields an empty series.
    pub async fn trend_view(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        fund_code: &str,
        today: NaiveDate,
    ) -> Result<TrendChart, CoreError> {
        let holding = store
            .get_holding(user_id, fund_code)
            .await?
            .ok_or_else(|| CoreError::HoldingNotFound {
                user_id,
                fund_code: fund_code.to_string(),
            })?;

        let mut points: Vec<TrendPoint> = store
            .earnings_between(user_id, fund_code, holding.added_on(), today)
            .await?
            .into_iter()
            .map(|r| TrendPoint {
                date: r.record_date,
                change_pct: round2(r.day_change_pct),
                day_earn: round2(r.day_earn),
                cumulative_earn: round2(r.cumulative_earn),
                persisted: true,
            })
            .collect();

        let today_persisted = points.last().is_some_and(|p| p.date == today);
        if !today_persisted && today >= holding.added_on() {
            let quote = quotes.latest(fund_code).await;
            if quote.is_some() || !points.is_empty() {
                let change_pct = round2(quote.as_ref().map_or(0.0, |q| q.estimated_change_pct));
                let estimate = self
                    .earnings_service
                    .estimate_for(store, &holding, change_pct, today)
                    .await?;
                points.push(TrendPoint {
                    date: today,
                    change_pct,
                    day_earn: estimate.today_earn,
                    cumulative_earn: estimate.total_earn,
                    persisted: false,
                });
            }
        }

        Ok(TrendChart {
            fund_code: holding.fund_code,
            fund_name: holding.fund_name,
            points,
        })
    }

    /// Totals across all of the user's holdings.
    pub async fn stat_view(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<StatSummary, CoreError> {
        let live = self.live_holdings(store, quotes, user_id, today).await?;

        let mut stat = StatSummary::default();
        for item in &live {
            stat.total_invest += item.holding.invest_principal;
            stat.total_current += item.estimate.current_principal;
            stat.total_today_earn += item.estimate.today_earn;
            stat.total_earn += item.estimate.total_earn;
        }

        Ok(StatSummary {
            total_invest: round2(stat.total_invest),
            total_current: round2(stat.total_current),
            total_today_earn: round2(stat.total_today_earn),
            total_earn: round2(stat.total_earn),
        })
    }

    async fn live_holdings(
        &self,
        store: &dyn FundStore,
        quotes: &QuoteService,
        user_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<LiveHolding>, CoreError> {
        let holdings = store.list_holdings(user_id).await?;
        let codes: Vec<String> = holdings.iter().map(|h| h.fund_code.clone()).collect();
        let fetched = quotes.latest_many(&codes).await;

        let mut live = Vec::with_capacity(holdings.len());
        for (holding, quote) in holdings.into_iter().zip(fetched) {
            let change_pct = quote.as_ref().map_or(0.0, |q| q.estimated_change_pct);
            let estimate = self
                .earnings_service
                .estimate_for(store, &holding, change_pct, today)
                .await?;
            live.push(LiveHolding {
                holding,
                quote,
                estimate,
            });
        }
        Ok(live)
    }
}

impl Default for ReportService {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage shares of `values`; every share is 0.0 when the total is 0.
pub fn distribute(values: &[(String, f64)]) -> Vec<PieSlice> {
    let total: f64 = values.iter().map(|(_, v)| v).sum();
    values
        .iter()
        .map(|(name, value)| PieSlice {
            name: name.clone(),
            value: round2(*value),
            pct: if total.abs() > 0.0 {
                round2(value / total * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

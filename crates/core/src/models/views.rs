use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Label of the placeholder slice returned for an empty pie.
pub const NO_DATA_LABEL: &str = "no data";

/// One row of the holdings list view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRow {
    pub fund_code: String,
    pub fund_name: String,

    /// Amount invested
    pub invest_principal: f64,

    /// Persisted history plus today's live estimate
    pub cumulative_earn: f64,

    /// Invested principal adjusted by earnings
    pub current_principal: f64,

    /// Yesterday's stored change percent (0.0 when nothing was stored)
    pub yesterday_change_pct: f64,

    /// Yesterday's stored earning (0.0 when nothing was stored)
    pub yesterday_earn: f64,

    /// Live change percent (0.0 when the quote fetch failed)
    pub today_change_pct: f64,

    /// Live earning estimate
    pub today_earn: f64,

    /// Last published unit net value from the live quote (0.0 when the fetch failed)
    pub today_unit_net_value: f64,

    /// Estimate timestamp from the live quote, if any
    pub today_estimated_at: Option<NaiveDateTime>,

    pub added_at: NaiveDateTime,
}

/// A single pie slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    /// Share of the total, in percent, rounded to 2 decimals
    pub pct: f64,
}

impl PieSlice {
    /// The slice rendered when there is nothing to distribute.
    pub fn placeholder() -> Self {
        Self {
            name: NO_DATA_LABEL.to_string(),
            value: 1.0,
            pct: 100.0,
        }
    }
}

/// The two independent distributions of the pie view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieCharts {
    /// Share of total invested principal per fund
    pub principal_pie: Vec<PieSlice>,
    /// Share of total live earning per fund
    pub today_earn_pie: Vec<PieSlice>,
}

/// One day on a fund's earnings trend line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub change_pct: f64,
    pub day_earn: f64,
    pub cumulative_earn: f64,
    /// False for the synthetic row built from the live estimate
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendChart {
    pub fund_code: String,
    pub fund_name: String,
    /// Ascending by date
    pub points: Vec<TrendPoint>,
}

/// Totals across all holdings of one user.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatSummary {
    pub total_invest: f64,
    pub total_current: f64,
    pub total_today_earn: f64,
    pub total_earn: f64,
}

/// Tally of one snapshot sweep (scheduled or manual refresh).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub date: NaiveDate,
    /// Pairs processed without error (including idempotent no-ops)
    pub succeeded: usize,
    /// Pairs whose quote fetch or write failed
    pub failed: usize,
    /// (user_id, fund_code) pairs that failed, in processing order
    pub failed_pairs: Vec<(i64, String)>,
}

impl SweepReport {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            succeeded: 0,
            failed: 0,
            failed_pairs: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

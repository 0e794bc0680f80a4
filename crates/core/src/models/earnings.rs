use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted daily earnings entry for one holding.
///
/// Unique per `(user_id, fund_code, record_date)` and never updated.
/// `cumulative_earn` is the running total from the holding's add date
/// through `record_date` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub fund_code: String,
    pub record_date: NaiveDate,

    /// Principal the day's earning was computed against
    pub principal_at_recording: f64,

    /// Change percent applied for the day
    pub day_change_pct: f64,

    /// `round(principal_at_recording × day_change_pct / 100, 2)`
    pub day_earn: f64,

    /// Previous cumulative earn plus `day_earn`
    pub cumulative_earn: f64,

    pub created_at: NaiveDateTime,
}

/// Storage key for an earnings record: (user_id, fund_code, record_date)
pub type EarningsKey = (i64, String, NaiveDate);

/// The as-of-now figures for one holding, produced by the two-pass estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveEarnings {
    /// Sum of persisted day earnings in `[added_on, today)`
    pub historical_sum: f64,

    /// First-pass estimate, computed on the invested principal
    pub provisional_today_earn: f64,

    /// Invested principal plus the first-pass total
    pub current_principal: f64,

    /// Final estimate, computed on `current_principal`
    pub today_earn: f64,

    /// `historical_sum + today_earn`
    pub total_earn: f64,
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parsed valuation payload from the quote source.
///
/// Every field is validated at the parse boundary; numeric fields that the
/// source reports as empty strings are normalized to `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundQuote {
    pub fund_code: String,

    /// Fund display name
    pub name: String,

    /// Date of the last published unit net value
    pub net_value_date: NaiveDate,

    /// Last published unit net value
    pub unit_net_value: f64,

    /// Intraday estimated unit value
    pub estimated_value: f64,

    /// Estimated daily change, in percent (e.g., 1.5 means +1.5%)
    pub estimated_change_pct: f64,

    /// When the estimate was produced
    pub estimated_at: NaiveDateTime,
}

/// One fund's valuation for one calendar date, shared by every holder of the fund.
///
/// Unique per `(fund_code, record_date)` and immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub id: Uuid,
    pub fund_code: String,
    pub record_date: NaiveDate,
    pub net_value_date: NaiveDate,
    pub unit_net_value: f64,
    pub estimated_value: f64,
    pub estimated_change_pct: f64,
    pub estimated_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl QuoteSnapshot {
    /// Snapshot `quote` under the code it was requested for, which is the
    /// code every lookup uses.
    pub fn from_quote(
        fund_code: &str,
        quote: &FundQuote,
        record_date: NaiveDate,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fund_code: fund_code.to_string(),
            record_date,
            net_value_date: quote.net_value_date,
            unit_net_value: quote.unit_net_value,
            estimated_value: quote.estimated_value,
            estimated_change_pct: quote.estimated_change_pct,
            estimated_at: quote.estimated_at,
            created_at,
        }
    }
}

/// Storage key for a quote snapshot: (fund_code, record_date)
pub type QuoteKey = (String, NaiveDate);

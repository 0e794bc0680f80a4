use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// An account that owns holdings. Authentication lives outside the core;
/// only the identity is tracked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A user's tracked position in one fund.
///
/// Unique per `(user_id, fund_code)`. The principal is user-editable;
/// `added_at` bounds every historical accumulation from below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: i64,

    /// Fund identifier as used by the quote source (e.g., "004253")
    pub fund_code: String,

    /// Display name taken from the quote at the time the fund was added
    pub fund_name: String,

    /// Amount invested, rounded to 2 decimals, always > 0
    pub invest_principal: f64,

    /// When the holding was created
    pub added_at: NaiveDateTime,
}

impl Holding {
    pub fn new(
        user_id: i64,
        fund_code: impl Into<String>,
        fund_name: impl Into<String>,
        invest_principal: f64,
        added_at: NaiveDateTime,
    ) -> Self {
        Self {
            user_id,
            fund_code: fund_code.into(),
            fund_name: fund_name.into(),
            invest_principal,
            added_at,
        }
    }

    /// Calendar date the holding was added; no earnings exist before it.
    pub fn added_on(&self) -> NaiveDate {
        self.added_at.date()
    }

    pub fn key(&self) -> HoldingKey {
        (self.user_id, self.fund_code.clone())
    }
}

/// Storage key for a holding: (user_id, fund_code)
pub type HoldingKey = (i64, String);

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::earnings::{EarningsKey, EarningsRecord};
use super::holding::{Holding, HoldingKey, User};
use super::quote::{QuoteKey, QuoteSnapshot};

/// The main data container. Everything in here gets serialized and saved to
/// the ledger file.
///
/// Map keys mirror the uniqueness constraints: one holding per (user, fund),
/// one quote snapshot per (fund, date), one earnings record per
/// (user, fund, date).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub users: BTreeMap<i64, User>,

    pub holdings: BTreeMap<HoldingKey, Holding>,

    /// Shared across every user holding the fund; never deleted by holding removal.
    pub quotes: BTreeMap<QuoteKey, QuoteSnapshot>,

    pub earnings: BTreeMap<EarningsKey, EarningsRecord>,

    /// Next id handed out by user registration
    pub next_user_id: i64,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            next_user_id: 1,
            ..Self::default()
        }
    }

    /// Number of stored rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.users.len() + self.holdings.len() + self.quotes.len() + self.earnings.len()
    }
}

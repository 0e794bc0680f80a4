use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::errors::CoreError;
use crate::models::earnings::EarningsRecord;
use crate::models::holding::{Holding, User};
use crate::models::ledger::Ledger;
use crate::models::quote::QuoteSnapshot;

use super::manager::StorageManager;
use super::traits::{DailyWrite, FundStore};

/// In-process [`FundStore`] backed by a [`Ledger`] behind an async `RwLock`.
///
/// Every check-and-insert happens under a single write guard, which is what
/// makes concurrent insert-if-absent safe.
///
/// When opened with a path, user and holding changes are written to a staged
/// copy of the ledger, saved, and only then published. Daily snapshot writes
/// are applied in memory and saved by the next `flush`. All saves are
/// serialized through `save_lock`.
pub struct MemoryStore {
    ledger: RwLock<Ledger>,
    path: Option<PathBuf>,
    dirty: AtomicBool,
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("path", &self.path)
            .field("dirty", &self.dirty.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryStore {
    /// Empty, memory-only store.
    pub fn new() -> Self {
        Self::with_ledger(Ledger::new())
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: RwLock::new(ledger),
            path: None,
            dirty: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        }
    }

    /// Open a file-backed store. A missing file starts an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let ledger = if path.exists() {
            StorageManager::load_from_file(&path)?
        } else {
            Ledger::new()
        };
        log::info!(
            "Opened ledger {} ({} rows)",
            path.display(),
            ledger.total_rows()
        );
        Ok(Self {
            ledger: RwLock::new(ledger),
            path: Some(path),
            dirty: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns `true` if the ledger changed since it was opened or last flushed.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// A point-in-time copy of the whole ledger.
    pub async fn snapshot(&self) -> Ledger {
        self.ledger.read().await.clone()
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Apply `change` to the ledger. File-backed stores save the changed copy
    /// first and leave the ledger untouched if the save fails.
    async fn commit<T, F>(&self, change: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut Ledger) -> Result<T, CoreError> + Send,
        T: Send,
    {
        let Some(path) = &self.path else {
            let mut ledger = self.ledger.write().await;
            let value = change(&mut *ledger)?;
            self.mark_dirty();
            return Ok(value);
        };

        // Lock order: save_lock, then the ledger.
        let _saving = self.save_lock.lock().await;
        let mut ledger = self.ledger.write().await;
        let mut staged = ledger.clone();
        let value = change(&mut staged)?;
        let bytes = StorageManager::save_to_bytes(&staged)?;
        write_ledger_file(path, bytes).await?;
        *ledger = staged;
        // Everything in memory is on disk now, including earlier daily writes.
        self.dirty.store(false, Ordering::SeqCst);
        Ok(value)
    }
}

async fn write_ledger_file(path: &Path, bytes: Vec<u8>) -> Result<(), CoreError> {
    let target = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || StorageManager::write_atomic(&target, &bytes))
        .await
        .map_err(|e| CoreError::Storage(format!("Ledger write task failed: {e}")))?;
    result.map_err(|e| {
        log::error!("Failed to save ledger to {}: {e}", path.display());
        CoreError::Storage(format!("Failed to save ledger: {e}"))
    })
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FundStore for MemoryStore {
    async fn insert_user(&self, name: &str) -> Result<User, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError("User name must not be empty".into()));
        }
        self.commit(|ledger| {
            if ledger.users.values().any(|u| u.name == name) {
                return Err(CoreError::ValidationError(format!(
                    "User name '{name}' is already taken"
                )));
            }
            let id = ledger.next_user_id.max(1);
            ledger.next_user_id = id + 1;
            let user = User {
                id,
                name: name.to_string(),
            };
            ledger.users.insert(id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, CoreError> {
        Ok(self.ledger.read().await.users.get(&user_id).cloned())
    }

    async fn insert_holding(&self, holding: Holding) -> Result<(), CoreError> {
        self.commit(move |ledger| {
            if !ledger.users.contains_key(&holding.user_id) {
                return Err(CoreError::UserNotFound(holding.user_id));
            }
            let key = holding.key();
            if ledger.holdings.contains_key(&key) {
                return Err(CoreError::DuplicateHolding {
                    user_id: holding.user_id,
                    fund_code: holding.fund_code,
                });
            }
            ledger.holdings.insert(key, holding);
            Ok(())
        })
        .await
    }

    async fn get_holding(&self, user_id: i64, fund_code: &str) -> Result<Option<Holding>, CoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .holdings
            .get(&(user_id, fund_code.to_string()))
            .cloned())
    }

    async fn list_holdings(&self, user_id: i64) -> Result<Vec<Holding>, CoreError> {
        let ledger = self.ledger.read().await;
        let mut holdings: Vec<Holding> = ledger
            .holdings
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        holdings.sort_by(|a, b| {
            b.added_at
                .cmp(&a.added_at)
                .then_with(|| a.fund_code.cmp(&b.fund_code))
        });
        Ok(holdings)
    }

    async fn all_holdings(&self) -> Result<Vec<Holding>, CoreError> {
        Ok(self.ledger.read().await.holdings.values().cloned().collect())
    }

    async fn update_principal(
        &self,
        user_id: i64,
        fund_code: &str,
        invest_principal: f64,
    ) -> Result<(), CoreError> {
        self.commit(|ledger| {
            let holding = ledger
                .holdings
                .get_mut(&(user_id, fund_code.to_string()))
                .ok_or_else(|| CoreError::HoldingNotFound {
                    user_id,
                    fund_code: fund_code.to_string(),
                })?;
            holding.invest_principal = invest_principal;
            Ok(())
        })
        .await
    }

    async fn delete_holding(&self, user_id: i64, fund_code: &str) -> Result<usize, CoreError> {
        self.commit(|ledger| {
            if ledger
                .holdings
                .remove(&(user_id, fund_code.to_string()))
                .is_none()
            {
                return Err(CoreError::HoldingNotFound {
                    user_id,
                    fund_code: fund_code.to_string(),
                });
            }
            let before = ledger.earnings.len();
            ledger
                .earnings
                .retain(|(uid, code, _), _| !(*uid == user_id && code == fund_code));
            Ok(before - ledger.earnings.len())
        })
        .await
    }

    async fn get_quote_snapshot(
        &self,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<QuoteSnapshot>, CoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger.quotes.get(&(fund_code.to_string(), date)).cloned())
    }

    async fn quote_snapshots(&self, fund_code: &str) -> Result<Vec<QuoteSnapshot>, CoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .quotes
            .values()
            .filter(|q| q.fund_code == fund_code)
            .cloned()
            .collect())
    }

    async fn get_earnings(
        &self,
        user_id: i64,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<EarningsRecord>, CoreError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .earnings
            .get(&(user_id, fund_code.to_string(), date))
            .cloned())
    }

    async fn latest_earnings_before(
        &self,
        user_id: i64,
        fund_code: &str,
        date: NaiveDate,
    ) -> Result<Option<EarningsRecord>, CoreError> {
        let ledger = self.ledger.read().await;
        let code = fund_code.to_string();
        Ok(ledger
            .earnings
            .range((user_id, code.clone(), NaiveDate::MIN)..(user_id, code, date))
            .next_back()
            .map(|(_, r)| r.clone()))
    }

    async fn earnings_between(
        &self,
        user_id: i64,
        fund_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EarningsRecord>, CoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let ledger = self.ledger.read().await;
        let code = fund_code.to_string();
        Ok(ledger
            .earnings
            .range((user_id, code.clone(), from)..=(user_id, code, to))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn sum_day_earn(
        &self,
        user_id: i64,
        fund_code: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<f64, CoreError> {
        if from >= until {
            return Ok(0.0);
        }
        let ledger = self.ledger.read().await;
        let code = fund_code.to_string();
        Ok(ledger
            .earnings
            .range((user_id, code.clone(), from)..(user_id, code, until))
            .map(|(_, r)| r.day_earn)
            .sum())
    }

    async fn write_daily(
        &self,
        quote: Option<QuoteSnapshot>,
        earnings: Option<EarningsRecord>,
    ) -> Result<DailyWrite, CoreError> {
        let mut ledger = self.ledger.write().await;

        // Validate everything before touching either table.
        if let Some(record) = &earnings {
            if !ledger
                .holdings
                .contains_key(&(record.user_id, record.fund_code.clone()))
            {
                return Err(CoreError::HoldingNotFound {
                    user_id: record.user_id,
                    fund_code: record.fund_code.clone(),
                });
            }
        }

        let mut outcome = DailyWrite::default();

        if let Some(snapshot) = quote {
            let key = (snapshot.fund_code.clone(), snapshot.record_date);
            if !ledger.quotes.contains_key(&key) {
                ledger.quotes.insert(key, snapshot);
                outcome.quote_inserted = true;
            }
        }

        if let Some(record) = earnings {
            let key = (record.user_id, record.fund_code.clone(), record.record_date);
            if !ledger.earnings.contains_key(&key) {
                ledger.earnings.insert(key, record);
                outcome.earnings_inserted = true;
            }
        }

        if outcome.quote_inserted || outcome.earnings_inserted {
            self.mark_dirty();
        }
        Ok(outcome)
    }

    async fn flush(&self) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _saving = self.save_lock.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let bytes = {
            let ledger = self.ledger.read().await;
            StorageManager::save_to_bytes(&ledger)
        };
        let result = match bytes {
            Ok(bytes) => write_ledger_file(path, bytes).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.mark_dirty();
            return Err(e);
        }
        log::debug!("Ledger flushed to {}", path.display());
        Ok(())
    }
}

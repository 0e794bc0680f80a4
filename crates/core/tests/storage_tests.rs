// ═══════════════════════════════════════════════════════════════════
// Storage Tests: ledger file format, StorageManager, MemoryStore
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use uuid::Uuid;

use fund_tracker_core::errors::CoreError;
use fund_tracker_core::models::earnings::EarningsRecord;
use fund_tracker_core::models::holding::Holding;
use fund_tracker_core::models::ledger::Ledger;
use fund_tracker_core::models::quote::{FundQuote, QuoteSnapshot};
use fund_tracker_core::storage::format::{self, CURRENT_VERSION, HEADER_SIZE, MAGIC};
use fund_tracker_core::storage::manager::StorageManager;
use fund_tracker_core::storage::memory::MemoryStore;
use fund_tracker_core::storage::traits::FundStore;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn at(date: NaiveDate, h: u32) -> NaiveDateTime {
    date.and_hms_opt(h, 0, 0).unwrap()
}

fn snapshot(code: &str, date: NaiveDate, pct: f64) -> QuoteSnapshot {
    let quote = FundQuote {
        fund_code: code.into(),
        name: format!("Fund {code}"),
        net_value_date: date,
        unit_net_value: 1.0,
        estimated_value: 1.0,
        estimated_change_pct: pct,
        estimated_at: at(date, 14),
    };
    QuoteSnapshot::from_quote(code, &quote, date, at(date, 15))
}

fn record(user_id: i64, code: &str, date: NaiveDate, day_earn: f64, cumulative: f64) -> EarningsRecord {
    EarningsRecord {
        id: Uuid::new_v4(),
        user_id,
        fund_code: code.into(),
        record_date: date,
        principal_at_recording: 10000.0,
        day_change_pct: 1.0,
        day_earn,
        cumulative_earn: cumulative,
        created_at: at(date, 15),
    }
}

async fn store_with_holding(code: &str, added: NaiveDate) -> (MemoryStore, i64) {
    let store = MemoryStore::new();
    let user = store.insert_user("alice").await.unwrap();
    store
        .insert_holding(Holding::new(user.id, code, "Fund", 10000.0, at(added, 10)))
        .await
        .unwrap();
    (store, user.id)
}

// ── File format ─────────────────────────────────────────────────────

mod file_format {
    use super::*;

    #[test]
    fn header_layout() {
        let bytes = format::write_file(CURRENT_VERSION, b"payload");
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(bytes.len(), HEADER_SIZE + 7);
        let (header, payload) = format::read_file(&bytes).unwrap();
        assert_eq!(header.version, CURRENT_VERSION);
        assert_eq!(header.payload_len, 7);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn too_small() {
        let err = format::read_file(b"FND").unwrap_err();
        assert!(matches!(err, CoreError::InvalidFileFormat(_)));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = format::write_file(CURRENT_VERSION, b"x");
        bytes[0] = b'X';
        let err = format::read_file(&bytes).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid ledger file format: Invalid magic bytes, not a ledger file"
        );
    }

    #[test]
    fn version_zero_and_future_rejected() {
        let zero = format::write_file(0, b"x");
        assert!(matches!(
            format::read_file(&zero),
            Err(CoreError::UnsupportedVersion(0))
        ));
        let future = format::write_file(CURRENT_VERSION + 1, b"x");
        assert!(matches!(
            format::read_file(&future),
            Err(CoreError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn truncated_payload() {
        let bytes = format::write_file(CURRENT_VERSION, b"0123456789");
        let err = format::read_file(&bytes[..HEADER_SIZE + 4]).unwrap_err();
        assert!(err.to_string().contains("expected 10 bytes of payload, got 4"));
    }
}

// ── StorageManager ──────────────────────────────────────────────────

mod manager {
    use super::*;

    #[test]
    fn bytes_roundtrip_preserves_ledger() {
        let mut ledger = Ledger::new();
        let h = Holding::new(1, "004253", "Fund", 10000.0, at(d(2024, 3, 15), 10));
        ledger.holdings.insert(h.key(), h);
        let r = record(1, "004253", d(2024, 3, 15), 150.0, 150.0);
        ledger
            .earnings
            .insert((1, "004253".into(), d(2024, 3, 15)), r);
        ledger.next_user_id = 2;

        let bytes = StorageManager::save_to_bytes(&ledger).unwrap();
        let back = StorageManager::load_from_bytes(&bytes).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn corrupt_payload_is_deserialization_error() {
        let bytes = format::write_file(CURRENT_VERSION, &[0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            StorageManager::load_from_bytes(&bytes),
            Err(CoreError::Deserialization(_))
        ));
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.fndl");
        let ledger = Ledger::new();
        StorageManager::save_to_file(&ledger, &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(StorageManager::load_from_file(&path).unwrap(), ledger);
    }
}

// ── MemoryStore: users & holdings ───────────────────────────────────

mod memory_holdings {
    use super::*;

    #[tokio::test]
    async fn user_ids_start_at_one() {
        let store = MemoryStore::new();
        let a = store.insert_user("alice").await.unwrap();
        let b = store.insert_user("  bob ").await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(b.name, "bob");
        assert_eq!(store.get_user(2).await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn user_names_are_unique_and_non_empty() {
        let store = MemoryStore::new();
        store.insert_user("alice").await.unwrap();
        assert!(matches!(
            store.insert_user("alice").await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(store.insert_user("   ").await.is_err());
    }

    #[tokio::test]
    async fn holding_requires_user() {
        let store = MemoryStore::new();
        let result = store
            .insert_holding(Holding::new(9, "004253", "Fund", 1.0, at(d(2024, 3, 15), 10)))
            .await;
        assert!(matches!(result, Err(CoreError::UserNotFound(9))));
    }

    #[tokio::test]
    async fn duplicate_holding_rejected() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        let result = store
            .insert_holding(Holding::new(uid, "004253", "Fund", 5.0, at(d(2024, 3, 16), 10)))
            .await;
        assert!(matches!(result, Err(CoreError::DuplicateHolding { .. })));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_per_user() {
        let store = MemoryStore::new();
        let alice = store.insert_user("alice").await.unwrap();
        let bob = store.insert_user("bob").await.unwrap();
        for (code, day) in [("000001", 1), ("000002", 3), ("000003", 2)] {
            store
                .insert_holding(Holding::new(alice.id, code, "Fund", 1.0, at(d(2024, 3, day), 10)))
                .await
                .unwrap();
        }
        store
            .insert_holding(Holding::new(bob.id, "000009", "Fund", 1.0, at(d(2024, 3, 5), 10)))
            .await
            .unwrap();

        let codes: Vec<String> = store
            .list_holdings(alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.fund_code)
            .collect();
        assert_eq!(codes, vec!["000002", "000003", "000001"]);
        assert_eq!(store.all_holdings().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn update_principal() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        store.update_principal(uid, "004253", 12000.0).await.unwrap();
        let h = store.get_holding(uid, "004253").await.unwrap().unwrap();
        assert_eq!(h.invest_principal, 12000.0);
        assert!(matches!(
            store.update_principal(uid, "161725", 1.0).await,
            Err(CoreError::HoldingNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_cascades_earnings_but_keeps_quotes() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        for (i, day) in [15, 16].into_iter().enumerate() {
            store
                .write_daily(
                    Some(snapshot("004253", d(2024, 3, day), 1.0)),
                    Some(record(uid, "004253", d(2024, 3, day), 100.0, 100.0 * (i + 1) as f64)),
                )
                .await
                .unwrap();
        }

        let removed = store.delete_holding(uid, "004253").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_holding(uid, "004253").await.unwrap().is_none());
        assert!(store.get_earnings(uid, "004253", d(2024, 3, 15)).await.unwrap().is_none());
        assert_eq!(store.quote_snapshots("004253").await.unwrap().len(), 2);

        assert!(matches!(
            store.delete_holding(uid, "004253").await,
            Err(CoreError::HoldingNotFound { .. })
        ));
    }
}

// ── MemoryStore: daily writes & queries ─────────────────────────────

mod memory_daily {
    use super::*;

    #[tokio::test]
    async fn write_daily_is_insert_if_absent() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        let first = store
            .write_daily(
                Some(snapshot("004253", d(2024, 3, 15), 1.5)),
                Some(record(uid, "004253", d(2024, 3, 15), 150.0, 150.0)),
            )
            .await
            .unwrap();
        assert!(first.quote_inserted && first.earnings_inserted);

        let second = store
            .write_daily(
                Some(snapshot("004253", d(2024, 3, 15), 9.9)),
                Some(record(uid, "004253", d(2024, 3, 15), 999.0, 999.0)),
            )
            .await
            .unwrap();
        assert!(!second.quote_inserted && !second.earnings_inserted);

        let kept = store.get_earnings(uid, "004253", d(2024, 3, 15)).await.unwrap().unwrap();
        assert_eq!(kept.day_earn, 150.0);
        let snap = store.get_quote_snapshot("004253", d(2024, 3, 15)).await.unwrap().unwrap();
        assert_eq!(snap.estimated_change_pct, 1.5);
    }

    #[tokio::test]
    async fn write_daily_without_holding_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .write_daily(
                Some(snapshot("004253", d(2024, 3, 15), 1.0)),
                Some(record(1, "004253", d(2024, 3, 15), 1.0, 1.0)),
            )
            .await;
        assert!(matches!(result, Err(CoreError::HoldingNotFound { .. })));
        assert!(store.get_quote_snapshot("004253", d(2024, 3, 15)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_writers_insert_exactly_once() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        let store = Arc::new(store);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .write_daily(
                            Some(snapshot("004253", d(2024, 3, 15), 1.0)),
                            Some(record(uid, "004253", d(2024, 3, 15), i as f64, i as f64)),
                        )
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut quote_inserts = 0;
        let mut earnings_inserts = 0;
        for task in tasks {
            let written = task.await.unwrap();
            quote_inserts += usize::from(written.quote_inserted);
            earnings_inserts += usize::from(written.earnings_inserted);
        }
        assert_eq!(quote_inserts, 1);
        assert_eq!(earnings_inserts, 1);
    }

    #[tokio::test]
    async fn range_queries() {
        let (store, uid) = store_with_holding("004253", d(2024, 3, 1)).await;
        for (day, earn) in [(1, 10.0), (2, 20.0), (5, 50.0)] {
            store
                .write_daily(None, Some(record(uid, "004253", d(2024, 3, day), earn, 0.0)))
                .await
                .unwrap();
        }

        let before = store
            .latest_earnings_before(uid, "004253", d(2024, 3, 5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.record_date, d(2024, 3, 2));
        assert!(store
            .latest_earnings_before(uid, "004253", d(2024, 3, 1))
            .await
            .unwrap()
            .is_none());

        let between = store
            .earnings_between(uid, "004253", d(2024, 3, 2), d(2024, 3, 5))
            .await
            .unwrap();
        assert_eq!(between.len(), 2);
        assert_eq!(between[0].record_date, d(2024, 3, 2));
        assert_eq!(between[1].record_date, d(2024, 3, 5));

        // `until` is exclusive
        let sum = store
            .sum_day_earn(uid, "004253", d(2024, 3, 1), d(2024, 3, 5))
            .await
            .unwrap();
        assert_eq!(sum, 30.0);
        assert_eq!(
            store.sum_day_earn(uid, "004253", d(2024, 3, 5), d(2024, 3, 5)).await.unwrap(),
            0.0
        );
    }

    #[tokio::test]
    async fn queries_do_not_leak_across_funds() {
        let (store, uid) = store_with_holding("000001", d(2024, 3, 1)).await;
        store
            .insert_holding(Holding::new(uid, "000002", "Fund", 1.0, at(d(2024, 3, 1), 10)))
            .await
            .unwrap();
        store
            .write_daily(None, Some(record(uid, "000002", d(2024, 3, 1), 5.0, 5.0)))
            .await
            .unwrap();
        assert!(store
            .latest_earnings_before(uid, "000001", d(2024, 3, 10))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.sum_day_earn(uid, "000001", d(2024, 3, 1), d(2024, 3, 10)).await.unwrap(),
            0.0
        );
    }
}

// ── MemoryStore: persistence ────────────────────────────────────────

mod memory_persistence {
    use super::*;

    #[tokio::test]
    async fn memory_only_flush_is_noop() {
        let store = MemoryStore::new();
        store.insert_user("alice").await.unwrap();
        assert!(store.path().is_none());
        store.flush().await.unwrap();
    }

    #[tokio::test]
    async fn flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.fndl");

        let store = MemoryStore::open(&path).unwrap();
        assert!(!store.has_unsaved_changes());
        let user = store.insert_user("alice").await.unwrap();
        store
            .insert_holding(Holding::new(user.id, "004253", "Fund", 10000.0, at(d(2024, 3, 15), 10)))
            .await
            .unwrap();
        // User and holding changes are saved as they happen.
        assert!(!store.has_unsaved_changes());
        assert!(path.exists());

        store
            .write_daily(Some(snapshot("004253", d(2024, 3, 15), 1.5)), None)
            .await
            .unwrap();
        assert!(store.has_unsaved_changes());
        store.flush().await.unwrap();
        assert!(!store.has_unsaved_changes());

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().await, store.snapshot().await);
        let next = reopened.insert_user("bob").await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn no_op_write_keeps_store_clean() {
        let (store, _uid) = store_with_holding("004253", d(2024, 3, 15)).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.fndl");
        StorageManager::save_to_file(&store.snapshot().await, &path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        reopened.write_daily(None, None).await.unwrap();
        assert!(!reopened.has_unsaved_changes());
    }

    #[test]
    fn open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.fndl");
        std::fs::write(&path, b"not a ledger at all").unwrap();
        assert!(matches!(
            MemoryStore::open(&path),
            Err(CoreError::InvalidFileFormat(_))
        ));
    }

    #[tokio::test]
    async fn failed_save_leaves_ledger_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        std::fs::create_dir(&ledger_dir).unwrap();
        let path = ledger_dir.join("funds.fndl");

        let store = MemoryStore::open(&path).unwrap();
        let alice = store.insert_user("alice").await.unwrap();
        store
            .insert_holding(Holding::new(alice.id, "004253", "Fund", 10000.0, at(d(2024, 3, 15), 10)))
            .await
            .unwrap();
        std::fs::remove_dir_all(&ledger_dir).unwrap();

        assert!(matches!(
            store.insert_user("bob").await,
            Err(CoreError::Storage(_))
        ));
        assert!(store
            .insert_holding(Holding::new(alice.id, "161725", "Fund", 500.0, at(d(2024, 3, 15), 11)))
            .await
            .is_err());
        assert!(store.update_principal(alice.id, "004253", 1.0).await.is_err());
        assert!(store.delete_holding(alice.id, "004253").await.is_err());

        assert!(store.get_user(2).await.unwrap().is_none());
        let holdings = store.list_holdings(alice.id).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].invest_principal, 10000.0);

        // Once the directory is back the same request goes through.
        std::fs::create_dir(&ledger_dir).unwrap();
        let bob = store.insert_user("bob").await.unwrap();
        assert_eq!(bob.id, 2);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.get_user(bob.id).await.unwrap(), Some(bob));
        assert_eq!(reopened.list_holdings(alice.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_flush_keeps_rows_pending() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_dir = dir.path().join("ledger");
        std::fs::create_dir(&ledger_dir).unwrap();
        let path = ledger_dir.join("funds.fndl");

        let store = MemoryStore::open(&path).unwrap();
        std::fs::remove_dir_all(&ledger_dir).unwrap();
        store
            .write_daily(Some(snapshot("004253", d(2024, 3, 15), 1.5)), None)
            .await
            .unwrap();
        assert!(matches!(store.flush().await, Err(CoreError::Storage(_))));
        assert!(store.has_unsaved_changes());

        std::fs::create_dir(&ledger_dir).unwrap();
        store.flush().await.unwrap();
        let reopened = MemoryStore::open(&path).unwrap();
        assert!(reopened
            .get_quote_snapshot("004253", d(2024, 3, 15))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_saves_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.fndl");
        let store = Arc::new(MemoryStore::open(&path).unwrap());

        let users: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.insert_user(&format!("user{i}")).await })
            })
            .collect();
        for task in users {
            task.await.unwrap().unwrap();
        }

        let start = d(2024, 3, 1);
        let flushes: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                let date = start + chrono::Duration::days(i);
                tokio::spawn(async move {
                    store.write_daily(Some(snapshot("004253", date, 1.0)), None).await?;
                    store.flush().await
                })
            })
            .collect();
        for task in flushes {
            task.await.unwrap().unwrap();
        }

        assert!(!store.has_unsaved_changes());
        assert!(!path.with_extension("tmp").exists());
        let reopened = MemoryStore::open(&path).unwrap();
        let ledger = reopened.snapshot().await;
        assert_eq!(ledger.users.len(), 32);
        assert_eq!(ledger.quotes.len(), 32);
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::MemoryStore;

/// Background task that rewrites the WAL once enough appends pile up.
/// The first check runs one `period` after start.
pub async fn run_compactor(store: Arc<MemoryStore>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// One compactor pass. Returns whether the log was rewritten.
pub async fn compact_if_due(store: &MemoryStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold.max(1) {
        debug!("compactor: {appends} appends since last compaction");
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            true
        }
        Err(e) => {
            warn!("WAL compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::SlotStore;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use ulid::Ulid;

    const PERIOD: Duration = Duration::from_secs(30);

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotledger_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn churn(store: &MemoryStore, flips: usize) -> Ulid {
        let slot = store
            .insert(AvailabilitySlot {
                id: Ulid::nil(),
                date: NaiveDate::from_ymd_opt(2025, 9, 16).unwrap(),
                window_start: "09:00".into(),
                window_end: "09:50".into(),
                is_available: true,
                kind: SlotKind::InHour,
            })
            .await
            .unwrap();
        for i in 0..flips {
            let expected = i % 2 == 0;
            assert!(store.compare_and_set_available(slot.id, expected, !expected).await.unwrap());
        }
        slot.id
    }

    #[tokio::test]
    async fn compacts_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = MemoryStore::open(&path).unwrap();
        let id = churn(&store, 9).await;
        assert_eq!(store.appends_since_compact().await, 10);

        assert!(!compact_if_due(&store, 20).await);
        assert!(compact_if_due(&store, 10).await);
        assert_eq!(store.appends_since_compact().await, 0);
        drop(store);

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.slot_count(), 1);
        // Nine flips from available leaves the slot closed.
        assert!(!reopened.get(id).await.unwrap().unwrap().is_available);
    }

    #[tokio::test]
    async fn volatile_store_never_compacts() {
        let store = MemoryStore::new();
        churn(&store, 3).await;
        assert!(!compact_if_due(&store, 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_waits_a_period_then_compacts() {
        let path = test_wal_path("background.wal");
        let store = Arc::new(MemoryStore::open(&path).unwrap());
        churn(&store, 4).await;
        assert_eq!(store.appends_since_compact().await, 5);

        let task = tokio::spawn(run_compactor(store.clone(), 5, PERIOD));

        tokio::time::sleep(PERIOD / 2).await;
        assert_eq!(store.appends_since_compact().await, 5);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(store.appends_since_compact().await, 0);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_leaves_small_logs_alone() {
        let path = test_wal_path("background_small.wal");
        let store = Arc::new(MemoryStore::open(&path).unwrap());
        churn(&store, 1).await;

        let task = tokio::spawn(run_compactor(store.clone(), 100, PERIOD));
        tokio::time::sleep(PERIOD * 5 + PERIOD / 2).await;
        assert_eq!(store.appends_since_compact().await, 2);

        task.abort();
    }
}

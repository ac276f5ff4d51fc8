use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::limits::NOTIFY_CHANNEL_CAPACITY;
use crate::model::LedgerEvent;

/// Broadcast hub for committed ledger transitions, per date plus one feed
/// carrying everything.
pub struct NotifyHub {
    all: broadcast::Sender<LedgerEvent>,
    by_date: DashMap<NaiveDate, broadcast::Sender<LedgerEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            all: broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0,
            by_date: DashMap::new(),
        }
    }

    /// Every event, regardless of date.
    pub fn subscribe_all(&self) -> broadcast::Receiver<LedgerEvent> {
        self.all.subscribe()
    }

    /// Events for bookings on `date`. Creates the channel if needed.
    pub fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<LedgerEvent> {
        self.by_date
            .entry(date)
            .or_insert_with(|| broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event. No-op if nobody is listening.
    pub fn send(&self, event: &LedgerEvent) {
        let _ = self.all.send(event.clone());
        if let Some(date) = event.date()
            && let Some(sender) = self.by_date.get(&date)
        {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop date channels nobody listens to any more.
    pub fn prune(&self) {
        self.by_date.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn date_channels(&self) -> usize {
        self.by_date.len()
    }
}

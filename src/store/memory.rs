use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::WAL_CHANNEL_CAPACITY;
use crate::model::*;
use crate::wal::Wal;

use super::{BookingStore, SlotStore, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: StoreEvent,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<StoreEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (StoreEvent, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that arrive while a flush is pending are batched
/// behind a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_control(&mut wal, cmd);
            continue;
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let _ = tx.send(
                result
                    .as_ref()
                    .map(|_| ())
                    .map_err(|e| io::Error::new(e.kind(), e.to_string())),
            );
        }

        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so a half-written batch is not
    // carried into the next one.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.compact(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// DashMap-backed booking and slot store.
///
/// Reads go straight to the maps. Mutations are serialized by `write_lock`
/// so that check, log and apply happen as one step, which is what makes
/// `compare_and_set_available` a real compare-and-swap.
pub struct MemoryStore {
    bookings: DashMap<Ulid, Booking>,
    slots: DashMap<Ulid, AvailabilitySlot>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store: nothing survives the process.
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            slots: DashMap::new(),
            wal_tx: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Durable store: replay the WAL at `path`, then log every mutation to
    /// it. Must be called inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let replay = Wal::replay(path)?;
        if replay.discarded_tail {
            warn!("discarded damaged WAL tail in {}", path.display());
        }
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            wal_tx: Some(wal_tx),
            ..Self::new()
        };
        for event in &replay.events {
            store.apply(event.clone());
        }
        info!(
            "replayed {} WAL records: {} bookings, {} slots",
            replay.events.len(),
            store.bookings.len(),
            store.slots.len()
        );
        Ok(store)
    }

    pub fn is_durable(&self) -> bool {
        self.wal_tx.is_some()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn apply(&self, event: StoreEvent) {
        match event {
            StoreEvent::SlotPut(slot) => {
                self.slots.insert(slot.id, slot);
            }
            StoreEvent::SlotRemoved { id } => {
                self.slots.remove(&id);
            }
            StoreEvent::BookingPut(booking) => {
                self.bookings.insert(booking.id, booking);
            }
            StoreEvent::BookingRemoved { id } => {
                self.bookings.remove(&id);
            }
        }
    }

    async fn send(&self, cmd: WalCommand) -> Result<(), StoreError> {
        if let Some(tx) = &self.wal_tx {
            tx.send(cmd)
                .await
                .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        }
        Ok(())
    }

    /// Log (when durable) then apply. Caller holds `write_lock`.
    async fn commit(&self, event: StoreEvent) -> Result<(), StoreError> {
        if self.wal_tx.is_some() {
            let (tx, rx) = oneshot::channel();
            self.send(WalCommand::Append { event: event.clone(), response: tx }).await?;
            rx.await
                .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
                .map_err(|e| StoreError::Wal(e.to_string()))?;
        }
        self.apply(event);
        Ok(())
    }

    /// Rewrite the WAL as one put per live record.
    pub async fn compact(&self) -> Result<(), StoreError> {
        if self.wal_tx.is_none() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut events: Vec<StoreEvent> = self
            .slots
            .iter()
            .map(|e| StoreEvent::SlotPut(e.value().clone()))
            .collect();
        events.extend(self.bookings.iter().map(|e| StoreEvent::BookingPut(e.value().clone())));

        let (tx, rx) = oneshot::channel();
        self.send(WalCommand::Compact { events, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        if self.wal_tx.is_none() {
            return 0;
        }
        let (tx, rx) = oneshot::channel();
        if self.send(WalCommand::AppendsSinceCompact { response: tx }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    fn booking(&self, id: &Ulid) -> Option<Booking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    fn slot(&self, id: &Ulid) -> Option<AvailabilitySlot> {
        self.slots.get(id).map(|e| e.value().clone())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        let mut found: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|b| b.id);
        Ok(found)
    }

    async fn get(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        Ok(self.booking(&id))
    }

    async fn insert(&self, mut booking: Booking) -> Result<Booking, StoreError> {
        let _guard = self.write_lock.lock().await;
        booking.id = Ulid::new();
        self.commit(StoreEvent::BookingPut(booking.clone())).await?;
        Ok(booking)
    }

    async fn update(&self, id: Ulid, patch: BookingPatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut booking = self.booking(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply(&mut booking);
        self.commit(StoreEvent::BookingPut(booking)).await
    }

    async fn delete(&self, id: Ulid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if !self.bookings.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.commit(StoreEvent::BookingRemoved { id }).await
    }
}

#[async_trait]
impl SlotStore for MemoryStore {
    async fn find(&self, filter: &SlotFilter) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let mut found: Vec<AvailabilitySlot> = self
            .slots
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|s| s.id);
        Ok(found)
    }

    async fn get(&self, id: Ulid) -> Result<Option<AvailabilitySlot>, StoreError> {
        Ok(self.slot(&id))
    }

    async fn insert(&self, mut slot: AvailabilitySlot) -> Result<AvailabilitySlot, StoreError> {
        let _guard = self.write_lock.lock().await;
        slot.id = Ulid::new();
        self.commit(StoreEvent::SlotPut(slot.clone())).await?;
        Ok(slot)
    }

    async fn update(&self, id: Ulid, patch: SlotPatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut slot = self.slot(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply(&mut slot);
        self.commit(StoreEvent::SlotPut(slot)).await
    }

    async fn delete(&self, id: Ulid) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if !self.slots.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        self.commit(StoreEvent::SlotRemoved { id }).await
    }

    async fn compare_and_set_available(
        &self,
        id: Ulid,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut slot = self.slot(&id).ok_or(StoreError::NotFound(id))?;
        if slot.is_available != expected {
            return Ok(false);
        }
        slot.is_available = new;
        self.commit(StoreEvent::SlotPut(slot)).await?;
        Ok(true)
    }
}

mod audit;
mod conflict;
mod error;
mod lifecycle;
mod matcher;
mod transitions;

pub use audit::AuditReport;
pub use conflict::{ConflictHit, find_conflict};
pub use error::{EngineError, NoAvailabilityReason};
pub use matcher::{SlotMatch, match_slot};
pub use transitions::{Confirmation, CreateOutcome, Release};

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::store::{BookingStore, CustomerDirectory, ServiceCatalog, SlotStore};
use crate::time::{FULL_DAY, Window};

/// A slot whose stored times parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSlot {
    pub id: Ulid,
    pub window: Window,
    pub is_available: bool,
}

/// A confirmed booking reduced to what the interval checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedWindow {
    pub booking_id: Ulid,
    pub customer_id: Ulid,
    pub service_name: String,
    pub date: NaiveDate,
    pub window: Window,
    pub full_day: bool,
    pub consumed_slots: Vec<Ulid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Booking,
    Slot,
}

/// A stored record left out of a pass because its times did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skipped {
    pub id: Ulid,
    pub record: RecordKind,
    pub reason: String,
}

pub(crate) struct Loaded<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skipped>,
}

fn report_skip(skipped: &mut Vec<Skipped>, id: Ulid, record: RecordKind, reason: String) {
    warn!("skipping {record:?} {id}: {reason}");
    let label = match record {
        RecordKind::Booking => "booking",
        RecordKind::Slot => "slot",
    };
    metrics::counter!(crate::observability::MALFORMED_RECORDS_TOTAL, "record" => label).increment(1);
    skipped.push(Skipped { id, record, reason });
}

/// Holds a date lock. On drop the map entry goes too, unless another
/// caller is already waiting on it.
pub(super) struct DateGuard<'a> {
    locks: &'a DashMap<NaiveDate, Arc<Mutex<()>>>,
    date: NaiveDate,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DateGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.date, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// The reconciliation engine. Holds no booking or slot state of its own;
/// every decision is made from a fresh read of the stores.
pub struct Engine {
    pub(super) bookings: Arc<dyn BookingStore>,
    pub(super) slots: Arc<dyn SlotStore>,
    pub(super) customers: Arc<dyn CustomerDirectory>,
    pub(super) catalog: Arc<dyn ServiceCatalog>,
    pub(super) config: EngineConfig,
    pub notify: Arc<NotifyHub>,
    /// Serializes read-decide-write sequences per calendar date.
    date_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        slots: Arc<dyn SlotStore>,
        customers: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ServiceCatalog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            bookings,
            slots,
            customers,
            catalog,
            config,
            notify: Arc::new(NotifyHub::new()),
            date_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) async fn lock_date(&self, date: Option<NaiveDate>) -> Option<DateGuard<'_>> {
        let date = date?;
        let lock = self.date_locks.entry(date).or_default().clone();
        Some(DateGuard {
            locks: &self.date_locks,
            date,
            guard: Some(lock.lock_owned().await),
        })
    }

    pub(super) fn is_quote_exempt(&self, booking: &Booking) -> bool {
        self.catalog.is_quote_exempt(&booking.service_name)
    }

    pub(super) async fn load_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.bookings.get(id).await?.ok_or(EngineError::NotFound(id))
    }

    /// Slots matching `filter`, ordered by start then id.
    pub(super) async fn load_slots(&self, filter: &SlotFilter) -> Result<Loaded<ParsedSlot>, EngineError> {
        let raw = self.slots.find(filter).await?;
        if raw.len() > MAX_SLOTS_PER_DATE {
            return Err(EngineError::LimitExceeded("too many slots on date"));
        }
        let mut items = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();
        for slot in raw {
            match slot.window() {
                Ok(window) => items.push(ParsedSlot {
                    id: slot.id,
                    window,
                    is_available: slot.is_available,
                }),
                Err(e) => report_skip(&mut skipped, slot.id, RecordKind::Slot, e.to_string()),
            }
        }
        items.sort_by_key(|s| (s.window.start, s.id));
        Ok(Loaded { items, skipped })
    }

    /// Confirmed bookings on `date` that occupy time, ordered by start then id.
    ///
    /// Full-day bookings occupy the in-hour band. Quote-exempt bookings
    /// without times occupy nothing.
    pub(super) async fn load_confirmed(
        &self,
        date: NaiveDate,
        exclude: Option<Ulid>,
    ) -> Result<Loaded<ConfirmedWindow>, EngineError> {
        let raw = self.bookings.find(&BookingFilter::confirmed_on(date)).await?;
        if raw.len() > MAX_BOOKINGS_PER_DATE {
            return Err(EngineError::LimitExceeded("too many bookings on date"));
        }
        let mut items = Vec::with_capacity(raw.len());
        let mut skipped = Vec::new();
        for booking in raw {
            if Some(booking.id) == exclude {
                continue;
            }
            let requested = match booking.requested() {
                Ok(r) => r,
                Err(e) => {
                    report_skip(&mut skipped, booking.id, RecordKind::Booking, e.to_string());
                    continue;
                }
            };
            let window = match requested.window {
                RequestedWindow::Timed(w) => w,
                RequestedWindow::FullDay if self.is_quote_exempt(&booking) => continue,
                RequestedWindow::FullDay => FULL_DAY,
                RequestedWindow::Incomplete => {
                    report_skip(
                        &mut skipped,
                        booking.id,
                        RecordKind::Booking,
                        "only one time bound is set".into(),
                    );
                    continue;
                }
            };
            items.push(ConfirmedWindow {
                booking_id: booking.id,
                customer_id: booking.customer_id,
                service_name: booking.service_name,
                date,
                window,
                full_day: requested.window.is_full_day(),
                consumed_slots: booking.consumed_slots,
            });
        }
        items.sort_by_key(|b| (b.window.start, b.booking_id));
        Ok(Loaded { items, skipped })
    }
}

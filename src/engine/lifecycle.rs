use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::classify::classify;
use crate::limits::MAX_SLOTS_PER_DATE;
use crate::model::*;
use crate::time::{FULL_DAY, Window};

use super::{Engine, EngineError, NoAvailabilityReason, ParsedSlot, SlotMatch};

/// Slot-ledger side effect decided for a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SlotPlan {
    Consume { date: NaiveDate, matched: SlotMatch },
    Fabricate { date: NaiveDate, window: Window },
    /// Quote-exempt: the ledger is left alone.
    Untouched,
}

/// Where a fabricated slot would go, if the booking says enough to place one.
pub(super) fn fabrication_target(requested: &Requested) -> Result<(NaiveDate, Window), EngineError> {
    let date = requested
        .date
        .ok_or(EngineError::SlotFabricationFailed("booking has no date"))?;
    let window = requested
        .window
        .occupied()
        .ok_or(EngineError::SlotFabricationFailed("booking window is incomplete"))?;
    Ok((date, window))
}

impl Engine {
    /// Declare an open slot. Without an explicit kind, the window's class
    /// decides (`Mixed` windows become `Standard`).
    pub async fn add_slot(
        &self,
        date: NaiveDate,
        window: Window,
        kind: Option<SlotKind>,
    ) -> Result<AvailabilitySlot, EngineError> {
        self.ensure_slot_room(date).await?;
        let kind = kind.unwrap_or_else(|| classify(&window).into());
        let slot = self
            .slots
            .insert(AvailabilitySlot {
                id: Ulid::nil(),
                date,
                window_start: window.start_hhmm(),
                window_end: window.end_hhmm(),
                is_available: true,
                kind,
            })
            .await?;
        debug!("declared {kind:?} slot {} for {window} on {date}", slot.id);
        Ok(slot)
    }

    /// Flip every slot in `ids` from available to unavailable. If any swap
    /// loses, the ones already flipped are handed back.
    pub(super) async fn consume_slots(&self, date: NaiveDate, ids: &[Ulid]) -> Result<(), EngineError> {
        let mut taken = Vec::with_capacity(ids.len());
        for &id in ids {
            let swapped = match self.slots.compare_and_set_available(id, true, false).await {
                Ok(swapped) => swapped,
                Err(e) => {
                    self.release_slots(&taken).await;
                    return Err(e.into());
                }
            };
            if !swapped {
                warn!("slot {id} was taken concurrently");
                metrics::counter!(crate::observability::SLOT_SWAPS_LOST_TOTAL).increment(1);
                self.release_slots(&taken).await;
                return Err(EngineError::no_availability(Some(date), NoAvailabilityReason::SlotTaken));
            }
            taken.push(id);
        }
        Ok(())
    }

    /// Best-effort flip back to available; returns the ids actually flipped.
    pub(super) async fn release_slots(&self, ids: &[Ulid]) -> Vec<Ulid> {
        let mut released = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.slots.compare_and_set_available(id, false, true).await {
                Ok(true) => released.push(id),
                Ok(false) => debug!("slot {id} already available"),
                Err(e) => warn!("could not release slot {id}: {e}"),
            }
        }
        released
    }

    async fn ensure_slot_room(&self, date: NaiveDate) -> Result<(), EngineError> {
        if self.slots.find(&SlotFilter::on(date)).await?.len() >= MAX_SLOTS_PER_DATE {
            return Err(EngineError::LimitExceeded("too many slots on date"));
        }
        Ok(())
    }

    /// Create one slot for `window`, already unavailable. Refused once the
    /// date holds `MAX_SLOTS_PER_DATE` slots.
    pub(super) async fn fabricate_slot(&self, date: NaiveDate, window: Window) -> Result<Ulid, EngineError> {
        self.ensure_slot_room(date).await?;
        let slot = self
            .slots
            .insert(AvailabilitySlot {
                id: Ulid::nil(),
                date,
                window_start: window.start_hhmm(),
                window_end: window.end_hhmm(),
                is_available: false,
                kind: self.config.fabricated_slot_kind,
            })
            .await?;
        info!("fabricated slot {} for {window} on {date}", slot.id);
        metrics::counter!(crate::observability::SLOTS_FABRICATED_TOTAL).increment(1);
        Ok(slot.id)
    }

    /// Put back the slot(s) a booking consumed.
    ///
    /// Recorded slot ids are used when present; ids whose slot has since been
    /// deleted are skipped. Bookings without recorded ids fall back to a
    /// window lookup among the unavailable slots of their date, ignoring
    /// slots another confirmed booking has on record. Finding nothing is fine.
    pub(super) async fn restore_slots(&self, booking: &Booking) -> Result<Vec<Ulid>, EngineError> {
        if !booking.consumed_slots.is_empty() {
            let mut present = Vec::with_capacity(booking.consumed_slots.len());
            for &id in &booking.consumed_slots {
                match self.slots.get(id).await? {
                    Some(_) => present.push(id),
                    None => debug!("slot {id} of booking {} no longer exists", booking.id),
                }
            }
            return Ok(self.note_restored(self.release_slots(&present).await));
        }

        let Some(date) = booking.date else {
            return Ok(Vec::new());
        };
        let requested = booking.requested()?;
        let Some(window) = requested.window.occupied() else {
            return Ok(Vec::new());
        };

        let claimed: HashSet<Ulid> = self
            .load_confirmed(date, Some(booking.id))
            .await?
            .items
            .into_iter()
            .flat_map(|b| b.consumed_slots)
            .collect();
        let closed: Vec<ParsedSlot> = self
            .load_slots(&SlotFilter::closed_on(date))
            .await?
            .items
            .into_iter()
            .filter(|s| !claimed.contains(&s.id))
            .collect();

        let targets: Vec<Ulid> = if requested.window.is_full_day() {
            closed.iter().filter(|s| s.window.overlaps(&FULL_DAY)).map(|s| s.id).collect()
        } else {
            closed
                .iter()
                .find(|s| s.window == window)
                .or_else(|| closed.iter().find(|s| s.window.overlaps(&window)))
                .map(|s| vec![s.id])
                .unwrap_or_default()
        };
        if targets.is_empty() {
            debug!("no consumed slot found for booking {} on {date}", booking.id);
        }
        Ok(self.note_restored(self.release_slots(&targets).await))
    }

    fn note_restored(&self, restored: Vec<Ulid>) -> Vec<Ulid> {
        if !restored.is_empty() {
            metrics::counter!(crate::observability::SLOTS_RESTORED_TOTAL).increment(restored.len() as u64);
        }
        restored
    }
}

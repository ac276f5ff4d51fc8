use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::MAX_SERVICE_NAME_LEN;
use crate::model::*;

use super::conflict::find_conflict;
use super::lifecycle::{SlotPlan, fabrication_target};
use super::matcher::match_slot;
use super::{Engine, EngineError, NoAvailabilityReason};

/// Result of a committed confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub booking_id: Ulid,
    /// Slots now held by the booking (including a fabricated one).
    pub slots: Vec<Ulid>,
    pub fabricated: Option<Ulid>,
}

/// Result of a cancellation or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub booking_id: Ulid,
    pub restored: Vec<Ulid>,
}

/// Result of `create`. A booking asked for as confirmed that could not be
/// confirmed is still stored, as pending, with the reason in `downgraded`.
#[derive(Debug)]
pub struct CreateOutcome {
    pub booking: Booking,
    pub confirmation: Option<Confirmation>,
    pub downgraded: Option<EngineError>,
}

fn record<T>(transition: &'static str, started: Instant, result: &Result<T, EngineError>) {
    let outcome = crate::observability::outcome_label(result);
    metrics::counter!(crate::observability::TRANSITIONS_TOTAL, "transition" => transition, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(crate::observability::TRANSITION_DURATION_SECONDS, "transition" => transition)
        .record(started.elapsed().as_secs_f64());
    if let Err(EngineError::Conflict(_)) = result {
        metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
    }
}

impl Engine {
    /// Store a new booking at the requested status. Confirmed requests go
    /// through the confirmation path and fall back to pending on failure.
    pub async fn create(&self, new: NewBooking) -> Result<CreateOutcome, EngineError> {
        let started = Instant::now();
        let result = self.create_inner(new).await;
        record("create", started, &result);
        result
    }

    async fn create_inner(&self, new: NewBooking) -> Result<CreateOutcome, EngineError> {
        if new.service_name.len() > MAX_SERVICE_NAME_LEN {
            return Err(EngineError::LimitExceeded("service name too long"));
        }
        let requested_status = new.status;
        if requested_status != BookingStatus::Confirmed {
            let booking = self.bookings.insert(new.into_booking(requested_status)).await?;
            self.announce_created(&booking);
            return Ok(CreateOutcome { booking, confirmation: None, downgraded: None });
        }

        let _date_guard = self.lock_date(new.date).await;
        let pending = self.bookings.insert(new.into_booking(BookingStatus::Pending)).await?;
        match self.confirm_locked(&pending).await {
            Ok(confirmation) => {
                let booking = self.load_booking(pending.id).await?;
                self.announce_created(&booking);
                self.announce_confirmed(&booking, &confirmation);
                Ok(CreateOutcome { booking, confirmation: Some(confirmation), downgraded: None })
            }
            Err(e) => {
                warn!("booking {} stored as pending: {e}", pending.id);
                self.announce_created(&pending);
                Ok(CreateOutcome { booking: pending, confirmation: None, downgraded: Some(e) })
            }
        }
    }

    /// Confirm a pending/paid booking: match (or fabricate) a slot, check for
    /// overlaps, take the slot, then write the status. Nothing is written
    /// unless every check passes.
    pub async fn confirm(&self, id: Ulid) -> Result<Confirmation, EngineError> {
        let started = Instant::now();
        let result = self.confirm_inner(id).await;
        record("confirm", started, &result);
        result
    }

    async fn confirm_inner(&self, id: Ulid) -> Result<Confirmation, EngineError> {
        let date = self.load_booking(id).await?.date;
        let _date_guard = self.lock_date(date).await;
        // Re-read under the lock; the status may have moved meanwhile.
        let booking = self.load_booking(id).await?;
        if !booking.status.is_confirmable() {
            return Err(EngineError::InvalidTransition {
                id,
                status: booking.status,
                action: "confirm",
            });
        }
        let confirmation = self.confirm_locked(&booking).await?;
        self.announce_confirmed(&booking, &confirmation);
        Ok(confirmation)
    }

    /// Confirmation body; the caller holds the date lock.
    async fn confirm_locked(&self, booking: &Booking) -> Result<Confirmation, EngineError> {
        let requested = booking.requested()?;
        let plan = self.plan_confirmation(booking, &requested).await?;

        let (slots, fabricated) = match plan {
            SlotPlan::Consume { date, matched } => {
                let ids = matched.slot_ids();
                self.consume_slots(date, &ids).await?;
                (ids, None)
            }
            SlotPlan::Fabricate { date, window } => {
                let id = self.fabricate_slot(date, window).await?;
                (vec![id], Some(id))
            }
            SlotPlan::Untouched => (Vec::new(), None),
        };

        let patch = BookingPatch {
            status: Some(BookingStatus::Confirmed),
            consumed_slots: Some(slots.clone()),
        };
        if let Err(e) = self.bookings.update(booking.id, patch).await {
            // Status write failed: give the slots back before surfacing it.
            match fabricated {
                Some(id) => {
                    if let Err(del) = self.slots.delete(id).await {
                        warn!("could not remove fabricated slot {id}: {del}");
                    }
                }
                None => {
                    self.release_slots(&slots).await;
                }
            }
            return Err(e.into());
        }

        info!("confirmed booking {} holding {} slot(s)", booking.id, slots.len());
        Ok(Confirmation { booking_id: booking.id, slots, fabricated })
    }

    /// Decide the slot side effect and run the conflict check. Read-only.
    async fn plan_confirmation(
        &self,
        booking: &Booking,
        requested: &Requested,
    ) -> Result<SlotPlan, EngineError> {
        if self.is_quote_exempt(booking) {
            // No slot needed, but a timed booking still may not overlap.
            if let (Some(date), RequestedWindow::Timed(window)) = (requested.date, requested.window)
                && let Some(hit) = self.detect_conflict(date, window, Some(booking.id)).await?
            {
                return Err(EngineError::Conflict(Box::new(hit)));
            }
            return Ok(SlotPlan::Untouched);
        }

        let Some(date) = requested.date else {
            let missing = EngineError::no_availability(None, NoAvailabilityReason::MissingDate);
            return self.fallback(missing, requested);
        };

        let open = self.load_slots(&SlotFilter::open_on(date)).await?;
        let confirmed = self.load_confirmed(date, Some(booking.id)).await?;

        let plan = match match_slot(date, requested.window, &open.items, &confirmed.items) {
            Ok(matched) => SlotPlan::Consume { date, matched },
            Err(e @ EngineError::NoAvailability { .. }) => self.fallback(e, requested)?,
            Err(e) => return Err(e),
        };

        // Fabrication already guaranteed a window; a matched request has one too.
        let window = requested.window.occupied().ok_or(EngineError::no_availability(
            Some(date),
            NoAvailabilityReason::IncompleteWindow,
        ))?;
        if let Some(hit) = find_conflict(date, &window, &confirmed.items, Some(booking.id)) {
            return Err(EngineError::Conflict(Box::new(self.enrich(hit).await)));
        }
        Ok(plan)
    }

    /// What to do once matching found nothing.
    fn fallback(&self, no_availability: EngineError, requested: &Requested) -> Result<SlotPlan, EngineError> {
        if !self.config.fabricate_missing_slots {
            return Err(no_availability);
        }
        let (date, window) = fabrication_target(requested)?;
        info!("{no_availability}; planning a slot for {window} on {date}");
        Ok(SlotPlan::Fabricate { date, window })
    }

    /// Cancel a booking, putting back whatever slot it held.
    pub async fn cancel(&self, id: Ulid) -> Result<Release, EngineError> {
        let started = Instant::now();
        let result = self.cancel_inner(id).await;
        record("cancel", started, &result);
        result
    }

    async fn cancel_inner(&self, id: Ulid) -> Result<Release, EngineError> {
        let date = self.load_booking(id).await?.date;
        let _date_guard = self.lock_date(date).await;
        let booking = self.load_booking(id).await?;
        if booking.status == BookingStatus::Cancelled {
            return Err(EngineError::InvalidTransition {
                id,
                status: booking.status,
                action: "cancel",
            });
        }

        let restored = self.restore_best_effort(&booking).await;
        self.bookings
            .update(
                id,
                BookingPatch {
                    status: Some(BookingStatus::Cancelled),
                    consumed_slots: Some(Vec::new()),
                },
            )
            .await?;

        info!("cancelled booking {id}, restored {} slot(s)", restored.len());
        self.notify.send(&LedgerEvent::BookingCancelled {
            id,
            date: booking.date,
            restored: restored.clone(),
        });
        Ok(Release { booking_id: id, restored })
    }

    /// Remove a booking row, putting back whatever slot it held.
    pub async fn delete(&self, id: Ulid) -> Result<Release, EngineError> {
        let started = Instant::now();
        let result = self.delete_inner(id).await;
        record("delete", started, &result);
        result
    }

    async fn delete_inner(&self, id: Ulid) -> Result<Release, EngineError> {
        let date = self.load_booking(id).await?.date;
        let _date_guard = self.lock_date(date).await;
        let booking = self.load_booking(id).await?;

        let restored = self.restore_best_effort(&booking).await;
        self.bookings.delete(id).await?;

        info!("deleted booking {id}, restored {} slot(s)", restored.len());
        self.notify.send(&LedgerEvent::BookingDeleted {
            id,
            date: booking.date,
            restored: restored.clone(),
        });
        Ok(Release { booking_id: id, restored })
    }

    /// Only bookings that can hold a slot get one back. Failures are logged
    /// and do not block the transition.
    async fn restore_best_effort(&self, booking: &Booking) -> Vec<Ulid> {
        if booking.status != BookingStatus::Confirmed && booking.consumed_slots.is_empty() {
            return Vec::new();
        }
        match self.restore_slots(booking).await {
            Ok(restored) => restored,
            Err(e) => {
                warn!("slot restoration for booking {} failed: {e}", booking.id);
                Vec::new()
            }
        }
    }

    fn announce_created(&self, booking: &Booking) {
        self.notify.send(&LedgerEvent::BookingCreated {
            id: booking.id,
            date: booking.date,
            status: booking.status,
        });
    }

    fn announce_confirmed(&self, booking: &Booking, confirmation: &Confirmation) {
        self.notify.send(&LedgerEvent::BookingConfirmed {
            id: booking.id,
            date: booking.date,
            slots: confirmation.slots.clone(),
            fabricated: confirmation.fabricated,
        });
    }
}

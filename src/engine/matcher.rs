use chrono::NaiveDate;
use serde::Serialize;
use ulid::Ulid;

use crate::model::RequestedWindow;
use crate::time::FULL_DAY;

use super::{ConfirmedWindow, EngineError, NoAvailabilityReason, ParsedSlot};

/// Slots chosen to host a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotMatch {
    Single(Ulid),
    /// Every open slot overlapping the in-hour band, ordered by start.
    FullDay(Vec<Ulid>),
}

impl SlotMatch {
    pub fn slot_ids(&self) -> Vec<Ulid> {
        match self {
            SlotMatch::Single(id) => vec![*id],
            SlotMatch::FullDay(ids) => ids.clone(),
        }
    }
}

/// Find the open slot(s) that can host `requested` on `date`.
///
/// `open` and `confirmed` must be ordered by window start; the first
/// surviving candidate wins, with no preference for the tightest fit.
pub fn match_slot(
    date: NaiveDate,
    requested: RequestedWindow,
    open: &[ParsedSlot],
    confirmed: &[ConfirmedWindow],
) -> Result<SlotMatch, EngineError> {
    let fail = |reason| Err(EngineError::no_availability(Some(date), reason));
    let open = open.iter().filter(|s| s.is_available);

    let window = match requested {
        RequestedWindow::FullDay => {
            let group: Vec<Ulid> = open.filter(|s| s.window.overlaps(&FULL_DAY)).map(|s| s.id).collect();
            if group.is_empty() {
                return fail(NoAvailabilityReason::NoSlots);
            }
            return Ok(SlotMatch::FullDay(group));
        }
        RequestedWindow::Incomplete => return fail(NoAvailabilityReason::IncompleteWindow),
        RequestedWindow::Timed(w) => w,
    };

    let mut any_open = false;
    let mut any_containing = false;
    for slot in open {
        any_open = true;
        // Equality is the degenerate case of containment.
        if !slot.window.contains_window(&window) {
            continue;
        }
        any_containing = true;
        let taken = confirmed
            .iter()
            .any(|b| b.date == date && b.window.overlaps(&slot.window) && b.window.overlaps(&window));
        if !taken {
            return Ok(SlotMatch::Single(slot.id));
        }
    }

    fail(if !any_open {
        NoAvailabilityReason::NoSlots
    } else if !any_containing {
        NoAvailabilityReason::NoContainingSlot
    } else {
        NoAvailabilityReason::AllCandidatesBooked
    })
}

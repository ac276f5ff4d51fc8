use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;
use ulid::Ulid;

use crate::model::BookingStatus;
use crate::store::StoreError;
use crate::time::MalformedTime;

use super::conflict::ConflictHit;

/// Why no slot could host a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAvailabilityReason {
    /// No open slot at all on the date.
    NoSlots,
    /// Open slots exist but none contains the requested window.
    NoContainingSlot,
    /// Every containing slot already hosts an overlapping confirmed booking.
    AllCandidatesBooked,
    MissingDate,
    /// Only one of the two time bounds is set.
    IncompleteWindow,
    /// A matched slot was consumed by a concurrent confirmation.
    SlotTaken,
}

impl fmt::Display for NoAvailabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoAvailabilityReason::NoSlots => "no open slots on this date",
            NoAvailabilityReason::NoContainingSlot => "no open slot contains the requested window",
            NoAvailabilityReason::AllCandidatesBooked => {
                "every slot containing the requested window is already booked"
            }
            NoAvailabilityReason::MissingDate => "booking has no date",
            NoAvailabilityReason::IncompleteWindow => "booking has only one time bound",
            NoAvailabilityReason::SlotTaken => "slot was taken by a concurrent confirmation",
        })
    }
}

fn on_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| format!(" on {d}")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    MalformedTime(#[from] MalformedTime),
    #[error("no availability{}: {reason}", on_date(.date))]
    NoAvailability {
        date: Option<NaiveDate>,
        reason: NoAvailabilityReason,
    },
    #[error("{0}")]
    Conflict(Box<ConflictHit>),
    #[error("cannot fabricate slot: {0}")]
    SlotFabricationFailed(&'static str),
    #[error("booking not found: {0}")]
    NotFound(Ulid),
    #[error("cannot {action} booking {id} in status {status}")]
    InvalidTransition {
        id: Ulid,
        status: BookingStatus,
        action: &'static str,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn no_availability(date: Option<NaiveDate>, reason: NoAvailabilityReason) -> Self {
        EngineError::NoAvailability { date, reason }
    }
}

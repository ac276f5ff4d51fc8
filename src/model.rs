use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time::{FULL_DAY, MalformedTime, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingStatus {
    Pending,
    DepositPaid,
    Paid,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::DepositPaid => "depositPaid",
            BookingStatus::Paid => "paid",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses `confirm` may start from.
    pub fn is_confirmable(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::DepositPaid | BookingStatus::Paid
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    InHour,
    OutOfHour,
    Standard,
}

/// A customer appointment as the dashboard stores it. Time-of-day bounds are
/// kept as written (`"HH:MM"` / `"HH:MM:SS"`) and parsed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Ulid,
    pub customer_id: Ulid,
    pub service_name: String,
    pub date: Option<NaiveDate>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub status: BookingStatus,
    /// Slots taken at confirmation; restoration prefers these over a window lookup.
    pub consumed_slots: Vec<Ulid>,
}

impl Booking {
    /// Resolve the stored bounds into what the booking asks for.
    pub fn requested(&self) -> Result<Requested, MalformedTime> {
        let window = match (self.window_start.as_deref(), self.window_end.as_deref()) {
            (None, None) => RequestedWindow::FullDay,
            (Some(start), Some(end)) => RequestedWindow::Timed(Window::parse(start, end)?),
            _ => RequestedWindow::Incomplete,
        };
        Ok(Requested { date: self.date, window })
    }
}

/// Fields accepted by `create`; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub customer_id: Ulid,
    pub service_name: String,
    pub date: Option<NaiveDate>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub status: BookingStatus,
}

impl NewBooking {
    pub fn into_booking(self, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::nil(),
            customer_id: self.customer_id,
            service_name: self.service_name,
            date: self.date,
            window_start: self.window_start,
            window_end: self.window_end,
            status,
            consumed_slots: Vec::new(),
        }
    }
}

/// A declared, bookable window on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: Ulid,
    pub date: NaiveDate,
    pub window_start: String,
    pub window_end: String,
    pub is_available: bool,
    pub kind: SlotKind,
}

impl AvailabilitySlot {
    pub fn window(&self) -> Result<Window, MalformedTime> {
        Window::parse(&self.window_start, &self.window_end)
    }
}

/// What a booking window resolves to before matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedWindow {
    /// No bounds at all: the whole in-hour band.
    FullDay,
    Timed(Window),
    /// Exactly one bound present.
    Incomplete,
}

impl RequestedWindow {
    /// The interval this request occupies, if it has one.
    pub fn occupied(&self) -> Option<Window> {
        match self {
            RequestedWindow::FullDay => Some(FULL_DAY),
            RequestedWindow::Timed(w) => Some(*w),
            RequestedWindow::Incomplete => None,
        }
    }

    pub fn is_full_day(&self) -> bool {
        matches!(self, RequestedWindow::FullDay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requested {
    pub date: Option<NaiveDate>,
    pub window: RequestedWindow,
}

// ── Store filters and patches ────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn confirmed_on(date: NaiveDate) -> Self {
        Self { date: Some(date), status: Some(BookingStatus::Confirmed) }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        self.date.is_none_or(|d| booking.date == Some(d))
            && self.status.is_none_or(|s| booking.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotFilter {
    pub date: Option<NaiveDate>,
    pub is_available: Option<bool>,
}

impl SlotFilter {
    pub fn on(date: NaiveDate) -> Self {
        Self { date: Some(date), is_available: None }
    }

    pub fn open_on(date: NaiveDate) -> Self {
        Self { date: Some(date), is_available: Some(true) }
    }

    pub fn closed_on(date: NaiveDate) -> Self {
        Self { date: Some(date), is_available: Some(false) }
    }

    pub fn matches(&self, slot: &AvailabilitySlot) -> bool {
        self.date.is_none_or(|d| slot.date == d)
            && self.is_available.is_none_or(|a| slot.is_available == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub consumed_slots: Option<Vec<Ulid>>,
}

impl BookingPatch {
    pub fn apply(self, booking: &mut Booking) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(slots) = self.consumed_slots {
            booking.consumed_slots = slots;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPatch {
    pub is_available: Option<bool>,
    pub kind: Option<SlotKind>,
}

impl SlotPatch {
    pub fn apply(self, slot: &mut AvailabilitySlot) {
        if let Some(available) = self.is_available {
            slot.is_available = available;
        }
        if let Some(kind) = self.kind {
            slot.kind = kind;
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Committed transitions, broadcast to whatever views need to refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEvent {
    BookingCreated {
        id: Ulid,
        date: Option<NaiveDate>,
        status: BookingStatus,
    },
    BookingConfirmed {
        id: Ulid,
        date: Option<NaiveDate>,
        slots: Vec<Ulid>,
        fabricated: Option<Ulid>,
    },
    BookingCancelled {
        id: Ulid,
        date: Option<NaiveDate>,
        restored: Vec<Ulid>,
    },
    BookingDeleted {
        id: Ulid,
        date: Option<NaiveDate>,
        restored: Vec<Ulid>,
    },
}

impl LedgerEvent {
    pub fn booking_id(&self) -> Ulid {
        match self {
            LedgerEvent::BookingCreated { id, .. }
            | LedgerEvent::BookingConfirmed { id, .. }
            | LedgerEvent::BookingCancelled { id, .. }
            | LedgerEvent::BookingDeleted { id, .. } => *id,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            LedgerEvent::BookingCreated { date, .. }
            | LedgerEvent::BookingConfirmed { date, .. }
            | LedgerEvent::BookingCancelled { date, .. }
            | LedgerEvent::BookingDeleted { date, .. } => *date,
        }
    }
}

/// Store mutations. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    SlotPut(AvailabilitySlot),
    SlotRemoved { id: Ulid },
    BookingPut(Booking),
    BookingRemoved { id: Ulid },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(start: Option<&str>, end: Option<&str>) -> Booking {
        Booking {
            id: Ulid::new(),
            customer_id: Ulid::new(),
            service_name: "Consultation".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 16),
            window_start: start.map(String::from),
            window_end: end.map(String::from),
            status: BookingStatus::Pending,
            consumed_slots: Vec::new(),
        }
    }

    #[test]
    fn requested_full_day_when_no_bounds() {
        let req = booking(None, None).requested().unwrap();
        assert_eq!(req.window, RequestedWindow::FullDay);
        assert_eq!(req.window.occupied(), Some(FULL_DAY));
    }

    #[test]
    fn requested_timed() {
        let req = booking(Some("09:00:00"), Some("09:50:00")).requested().unwrap();
        assert_eq!(req.window, RequestedWindow::Timed(Window::new(540, 590)));
    }

    #[test]
    fn requested_half_window_is_incomplete() {
        let req = booking(Some("09:00"), None).requested().unwrap();
        assert_eq!(req.window, RequestedWindow::Incomplete);
        assert_eq!(req.window.occupied(), None);
    }

    #[test]
    fn requested_malformed() {
        assert!(booking(Some("nine"), Some("10:00")).requested().is_err());
    }

    #[test]
    fn filters() {
        let mut b = booking(None, None);
        let date = b.date.unwrap();
        assert!(BookingFilter::default().matches(&b));
        assert!(!BookingFilter::confirmed_on(date).matches(&b));
        b.status = BookingStatus::Confirmed;
        assert!(BookingFilter::confirmed_on(date).matches(&b));
        b.date = None;
        assert!(!BookingFilter::confirmed_on(date).matches(&b));
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut b = booking(None, None);
        let slot = Ulid::new();
        BookingPatch { status: None, consumed_slots: Some(vec![slot]) }.apply(&mut b);
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.consumed_slots, vec![slot]);
    }

    #[test]
    fn status_serializes_camel_case() {
        let json = serde_json::to_string(&BookingStatus::DepositPaid).unwrap();
        assert_eq!(json, "\"depositPaid\"");
        assert_eq!(BookingStatus::DepositPaid.to_string(), "depositPaid");
    }

    #[test]
    fn store_event_serialization_roundtrip() {
        let event = StoreEvent::BookingPut(booking(Some("09:00"), Some("10:00")));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: StoreEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}

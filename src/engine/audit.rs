use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use crate::model::SlotFilter;
use crate::time::FULL_DAY;

use super::{ConfirmedWindow, Engine, EngineError, ParsedSlot, Skipped};

/// Read-only consistency report for one date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub date: Option<NaiveDate>,
    /// Pairs of confirmed bookings whose windows overlap.
    pub overlaps: Vec<(Ulid, Ulid)>,
    /// Unavailable slots no confirmed booking accounts for.
    pub orphaned_slots: Vec<Ulid>,
    /// Confirmed bookings that should hold a slot but none accounts for them.
    pub unbacked_bookings: Vec<Ulid>,
    pub skipped: Vec<Skipped>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.overlaps.is_empty() && self.orphaned_slots.is_empty() && self.unbacked_bookings.is_empty()
    }
}

/// Does `slot` belong to `booking`? Recorded ids decide when present;
/// otherwise the window relationship does.
fn accounts_for(booking: &ConfirmedWindow, slot: &ParsedSlot) -> bool {
    if !booking.consumed_slots.is_empty() {
        return booking.consumed_slots.contains(&slot.id);
    }
    if booking.full_day {
        slot.window.overlaps(&FULL_DAY)
    } else {
        slot.window.contains_window(&booking.window)
    }
}

impl Engine {
    /// Check the ledger for `date`. Records with unparsable times are listed
    /// in `skipped` and left out of every other check.
    pub async fn audit(&self, date: NaiveDate) -> Result<AuditReport, EngineError> {
        let slots = self.load_slots(&SlotFilter::on(date)).await?;
        let confirmed = self.load_confirmed(date, None).await?;
        let bookings = &confirmed.items;
        let closed: Vec<&ParsedSlot> = slots.items.iter().filter(|s| !s.is_available).collect();

        let mut report = AuditReport { date: Some(date), ..AuditReport::default() };

        for (i, a) in bookings.iter().enumerate() {
            for b in &bookings[i + 1..] {
                if a.window.overlaps(&b.window) {
                    report.overlaps.push((a.booking_id, b.booking_id));
                }
            }
        }

        report.orphaned_slots = closed
            .iter()
            .filter(|s| !bookings.iter().any(|b| accounts_for(b, s)))
            .map(|s| s.id)
            .collect();

        // Quote-exempt timed bookings occupy time but never hold a slot.
        let exempt: Vec<Ulid> = self
            .bookings
            .find(&crate::model::BookingFilter::confirmed_on(date))
            .await?
            .into_iter()
            .filter(|b| self.is_quote_exempt(b))
            .map(|b| b.id)
            .collect();
        report.unbacked_bookings = bookings
            .iter()
            .filter(|b| !exempt.contains(&b.booking_id))
            .filter(|b| !closed.iter().any(|s| accounts_for(b, s)))
            .map(|b| b.booking_id)
            .collect();

        report.skipped = slots.skipped;
        report.skipped.extend(confirmed.skipped);

        info!(
            "audit {date}: {} overlaps, {} orphaned slots, {} unbacked bookings, {} skipped",
            report.overlaps.len(),
            report.orphaned_slots.len(),
            report.unbacked_bookings.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Window;

    fn booking(window: Window, full_day: bool, consumed: Vec<Ulid>) -> ConfirmedWindow {
        ConfirmedWindow {
            booking_id: Ulid::new(),
            customer_id: Ulid::new(),
            service_name: "Massage".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 16).unwrap(),
            window,
            full_day,
            consumed_slots: consumed,
        }
    }

    fn closed(window: Window) -> ParsedSlot {
        ParsedSlot { id: Ulid::new(), window, is_available: false }
    }

    #[test]
    fn recorded_ids_take_precedence() {
        let s = closed(Window::new(540, 600));
        let other = closed(Window::new(540, 600));
        let b = booking(Window::new(540, 600), false, vec![other.id]);
        assert!(!accounts_for(&b, &s));
        assert!(accounts_for(&b, &other));
    }

    #[test]
    fn window_containment_without_records() {
        let b = booking(Window::new(600, 650), false, vec![]);
        assert!(accounts_for(&b, &closed(Window::new(540, 720))));
        assert!(!accounts_for(&b, &closed(Window::new(630, 720))));
    }

    #[test]
    fn full_day_accounts_for_band_slots() {
        let b = booking(FULL_DAY, true, vec![]);
        assert!(accounts_for(&b, &closed(Window::new(780, 1020))));
        assert!(!accounts_for(&b, &closed(Window::new(1080, 1140))));
    }
}

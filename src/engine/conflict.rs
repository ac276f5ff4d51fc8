use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::time::Window;

use super::{ConfirmedWindow, Engine, EngineError};

/// An existing confirmed booking a candidate window runs into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictHit {
    pub booking_id: Ulid,
    pub customer_id: Ulid,
    /// Empty when the directory could not resolve the customer.
    pub customer_name: Option<String>,
    pub service_name: String,
    pub date: NaiveDate,
    pub window: Window,
}

impl fmt::Display for ConflictHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflicts with booking {} ({} for ", self.booking_id, self.service_name)?;
        match &self.customer_name {
            Some(name) => write!(f, "{name}")?,
            None => write!(f, "customer {}", self.customer_id)?,
        }
        write!(f, ") on {} at {}", self.date, self.window)
    }
}

/// First confirmed booking on `date` whose window overlaps `window`.
/// `confirmed` is scanned in order; `exclude` skips the booking being edited.
pub fn find_conflict<'a>(
    date: NaiveDate,
    window: &Window,
    confirmed: &'a [ConfirmedWindow],
    exclude: Option<Ulid>,
) -> Option<&'a ConfirmedWindow> {
    confirmed.iter().find(|b| {
        Some(b.booking_id) != exclude && b.date == date && b.window.overlaps(window)
    })
}

impl Engine {
    /// Attach a customer display name. Lookup failures only lose the name.
    pub(super) async fn enrich(&self, hit: &ConfirmedWindow) -> ConflictHit {
        let customer_name = match self.customers.display_name(hit.customer_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("customer lookup for {} failed: {e}", hit.customer_id);
                None
            }
        };
        ConflictHit {
            booking_id: hit.booking_id,
            customer_id: hit.customer_id,
            customer_name,
            service_name: hit.service_name.clone(),
            date: hit.date,
            window: hit.window,
        }
    }

    /// Check `window` on `date` against the confirmed bookings in the store.
    /// Confirmed bookings with unparsable times are skipped and reported.
    pub async fn detect_conflict(
        &self,
        date: NaiveDate,
        window: Window,
        exclude: Option<Ulid>,
    ) -> Result<Option<ConflictHit>, EngineError> {
        let confirmed = self.load_confirmed(date, exclude).await?;
        match find_conflict(date, &window, &confirmed.items, exclude) {
            Some(hit) => {
                debug!("{window} on {date} overlaps booking {}", hit.booking_id);
                Ok(Some(self.enrich(hit).await))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn w(start: &str, end: &str) -> Window {
        Window::parse(start, end).unwrap()
    }

    fn confirmed(date: NaiveDate, start: &str, end: &str) -> ConfirmedWindow {
        ConfirmedWindow {
            booking_id: Ulid::new(),
            customer_id: Ulid::new(),
            service_name: "Facial".into(),
            date,
            window: w(start, end),
            full_day: false,
            consumed_slots: vec![],
        }
    }

    #[test]
    fn overlap_on_same_date_is_reported() {
        let a = confirmed(day(16), "09:00", "09:50");
        let list = [a.clone()];
        let hit = find_conflict(day(16), &w("09:20", "10:10"), &list, None).unwrap();
        assert_eq!(hit.booking_id, a.booking_id);
    }

    #[test]
    fn other_date_never_conflicts() {
        let list = [confirmed(day(17), "09:00", "09:50")];
        assert!(find_conflict(day(16), &w("09:00", "09:50"), &list, None).is_none());
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let list = [confirmed(day(16), "09:00", "09:50")];
        assert!(find_conflict(day(16), &w("09:50", "10:40"), &list, None).is_none());
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let a = confirmed(day(16), "09:00", "09:50");
        let id = a.booking_id;
        let list = [a];
        assert!(find_conflict(day(16), &w("09:00", "09:50"), &list, Some(id)).is_none());
    }

    #[test]
    fn first_hit_in_order_wins() {
        let a = confirmed(day(16), "09:00", "10:00");
        let b = confirmed(day(16), "09:30", "11:00");
        let list = [a.clone(), b];
        let hit = find_conflict(day(16), &w("09:45", "10:30"), &list, None).unwrap();
        assert_eq!(hit.booking_id, a.booking_id);
    }

    #[test]
    fn display_falls_back_to_customer_id() {
        let hit = ConflictHit {
            booking_id: Ulid::new(),
            customer_id: Ulid::new(),
            customer_name: None,
            service_name: "Facial".into(),
            date: day(16),
            window: w("09:00", "09:50"),
        };
        let text = hit.to_string();
        assert!(text.contains(&hit.customer_id.to_string()));
        assert!(text.contains("09:00–09:50"));
    }
}

use serde::{Deserialize, Serialize};

use crate::model::SlotKind;
use crate::time::{EVENING_BAND, FULL_DAY, MORNING_BAND, Window};

/// Business-hours label for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowClass {
    InHour,
    OutOfHour,
    Mixed,
}

/// Classify `window` against the in-hour band (09:00–17:00) and the two
/// out-of-hour bands (08:00–09:00, 18:00–20:00).
///
/// A window touching none of the bands falls back to `OutOfHour`.
pub fn classify(window: &Window) -> WindowClass {
    if FULL_DAY.contains_window(window) {
        return WindowClass::InHour;
    }
    if MORNING_BAND.contains_window(window) || EVENING_BAND.contains_window(window) {
        return WindowClass::OutOfHour;
    }
    // Not inside any single band, so touching one means crossing its edge.
    if [FULL_DAY, MORNING_BAND, EVENING_BAND]
        .iter()
        .any(|band| band.overlaps(window))
    {
        return WindowClass::Mixed;
    }
    WindowClass::OutOfHour
}

impl From<WindowClass> for SlotKind {
    fn from(class: WindowClass) -> Self {
        match class {
            WindowClass::InHour => SlotKind::InHour,
            WindowClass::OutOfHour => SlotKind::OutOfHour,
            WindowClass::Mixed => SlotKind::Standard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(start: &str, end: &str) -> Window {
        Window::parse(start, end).unwrap()
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(classify(&w("09:00", "17:00")), WindowClass::InHour);
        assert_eq!(classify(&w("08:00", "09:00")), WindowClass::OutOfHour);
        assert_eq!(classify(&w("08:30", "09:30")), WindowClass::Mixed);
    }

    #[test]
    fn evening_band() {
        assert_eq!(classify(&w("18:00", "20:00")), WindowClass::OutOfHour);
        assert_eq!(classify(&w("19:30", "20:30")), WindowClass::Mixed);
        assert_eq!(classify(&w("16:30", "17:30")), WindowClass::Mixed);
    }

    #[test]
    fn gap_between_bands_falls_back_to_out_of_hour() {
        assert_eq!(classify(&w("17:00", "18:00")), WindowClass::OutOfHour);
        assert_eq!(classify(&w("06:00", "07:00")), WindowClass::OutOfHour);
        assert_eq!(classify(&w("21:00", "22:00")), WindowClass::OutOfHour);
    }

    #[test]
    fn window_spanning_gap_and_band_is_mixed() {
        assert_eq!(classify(&w("07:00", "08:30")), WindowClass::Mixed);
        assert_eq!(classify(&w("17:30", "18:30")), WindowClass::Mixed);
    }

    #[test]
    fn slot_kind_mapping() {
        assert_eq!(SlotKind::from(WindowClass::InHour), SlotKind::InHour);
        assert_eq!(SlotKind::from(WindowClass::Mixed), SlotKind::Standard);
    }
}

//! Hard limits. Requests beyond these fail with `LimitExceeded` instead of
//! degrading the per-date scans.

pub const MAX_SERVICE_NAME_LEN: usize = 256;

/// Slots considered on a single date.
pub const MAX_SLOTS_PER_DATE: usize = 512;

/// Confirmed bookings considered on a single date.
pub const MAX_BOOKINGS_PER_DATE: usize = 512;

pub const WAL_CHANNEL_CAPACITY: usize = 4096;

pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

//! Input bounds enforced at the engine boundary.

use crate::model::Ms;

/// Maximum number of rooms a single engine will manage.
pub const MAX_ROOMS: usize = 10_000;

/// Maximum booking records (any status) kept per room.
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;

/// Maximum room name length in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Maximum booking title length in bytes.
pub const MAX_TITLE_LEN: usize = 512;

/// Timestamps before the Unix epoch are rejected outright.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;

/// 2100-01-01T00:00:00Z. Anything later is a caller bug.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Sanity cap on a single booking window, independent of the configured
/// business maximum: 30 days.
pub const MAX_SPAN_DURATION_MS: Ms = 30 * 24 * 3_600_000;

/// Widest window accepted by search/availability queries: 92 days.
pub const MAX_QUERY_WINDOW_MS: Ms = 92 * 24 * 3_600_000;

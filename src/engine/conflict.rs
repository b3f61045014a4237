use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::BookingError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// Structural and range validation shared by create/update.
pub(crate) fn validate_window(span: &Span) -> Result<(), BookingError> {
    if span.end <= span.start {
        return Err(BookingError::InvalidWindow);
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(BookingError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(BookingError::LimitExceeded("window too wide"));
    }
    Ok(())
}

/// Widen a window symmetrically by the turnover buffer. Used only for
/// conflict tests; the persisted booking keeps the caller's window.
pub fn apply_buffer(span: &Span, buffer_ms: Ms) -> Span {
    if buffer_ms <= 0 {
        return *span;
    }
    Span::new(
        (span.start - buffer_ms).max(MIN_VALID_TIMESTAMP_MS),
        span.end + buffer_ms,
    )
}

/// Standard open-overlap test on half-open intervals: a conflict exists iff
/// some slot-occupying booking `b` (other than `exclude`) satisfies
/// `b.start < window.end && b.end > window.start`.
///
/// Returns the first conflicting booking id. Pure read; callers hold at
/// least a read lock on the room.
pub(crate) fn find_conflict(
    room: &RoomState,
    window: &Span,
    exclude: Option<Ulid>,
) -> Option<Ulid> {
    room.overlapping(window)
        .find(|b| b.status.occupies_slot() && exclude != Some(b.id))
        .map(|b| b.id)
}

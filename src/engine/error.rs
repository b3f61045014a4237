use ulid::Ulid;

use crate::model::Ms;

/// Business-rule and infrastructure failures of the booking engine.
///
/// The first five variants are the recoverable validation taxonomy callers
/// are expected to match on; `WalError` is an infrastructure fault and is
/// never produced by a rule violation.
#[derive(Debug)]
pub enum BookingError {
    /// Window end is not after its start.
    InvalidWindow,
    /// Window starts before the current time.
    PastWindow { start: Ms, now: Ms },
    /// Window is longer than the configured maximum.
    DurationExceeded { requested_ms: Ms, max_ms: Ms },
    /// Room is unknown or inactive.
    RoomUnavailable(Ulid),
    /// A slot-occupying booking overlaps the (buffer-padded) window;
    /// carries the conflicting booking id.
    SlotTaken(Ulid),
    /// The booking is completed or otherwise closed to this operation.
    BookingClosed(Ulid),
    NotFound(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidWindow => write!(f, "window end must be after start"),
            BookingError::PastWindow { start, now } => {
                write!(f, "window starts in the past ({start} < {now})")
            }
            BookingError::DurationExceeded { requested_ms, max_ms } => {
                write!(f, "window of {requested_ms}ms exceeds maximum {max_ms}ms")
            }
            BookingError::RoomUnavailable(id) => {
                write!(f, "room {id} does not exist or is inactive")
            }
            BookingError::SlotTaken(id) => {
                write!(f, "slot conflicts with booking {id}")
            }
            BookingError::BookingClosed(id) => {
                write!(f, "booking {id} is closed and cannot be modified")
            }
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

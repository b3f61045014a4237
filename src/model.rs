use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Clamp to the intersection with `bounds`. Caller guarantees overlap.
    pub fn clamped_to(&self, bounds: &Span) -> Span {
        Span::new(self.start.max(bounds.start), self.end.min(bounds.end))
    }
}

/// Booking lifecycle state.
///
/// `Scheduled` and `InProgress` occupy the room's slot; `Completed` and
/// `Cancelled` are terminal and never block a new reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn occupies_slot(&self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// A room reservation. `id`, `room_id` and `owner_id` are immutable after
/// creation; a room move is modeled as cancel + recreate by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub room_id: Ulid,
    pub owner_id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: Ulid,
    pub name: String,
    pub floor: i32,
    /// Seats in the room — a search filter, never a concurrency limit.
    pub capacity: u32,
    /// Inactive rooms keep their history but accept no new bookings.
    pub is_active: bool,
    /// Every booking ever made for this room, sorted by `span.start`.
    /// Cancellation flips status; records are never removed.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(id: Ulid, name: String, floor: i32, capacity: u32) -> Self {
        Self {
            id,
            name,
            floor,
            capacity,
            is_active: true,
            bookings: Vec::new(),
        }
    }

    /// Insert keeping the vec sorted by `span.start`.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove by id. Only used when a reschedule changes the sort key;
    /// lifecycle transitions go through `set_status`.
    pub fn take_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn set_status(&mut self, id: Ulid, status: BookingStatus) {
        if let Some(b) = self.bookings.iter_mut().find(|b| b.id == id) {
            b.status = status;
        }
    }

    /// Bookings whose span overlaps the query window, any status.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }
}

/// WAL record format — flat, one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        id: Ulid,
        name: String,
        floor: i32,
        capacity: u32,
    },
    RoomUpdated {
        id: Ulid,
        name: String,
        floor: i32,
        capacity: u32,
        is_active: bool,
    },
    BookingCreated {
        id: Ulid,
        room_id: Ulid,
        owner_id: Ulid,
        span: Span,
        title: Option<String>,
    },
    BookingRescheduled {
        id: Ulid,
        room_id: Ulid,
        span: Span,
        title: Option<String>,
    },
    BookingStarted {
        id: Ulid,
        room_id: Ulid,
    },
    BookingCompleted {
        id: Ulid,
        room_id: Ulid,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: Ulid,
    pub name: String,
    pub floor: i32,
    pub capacity: u32,
    pub is_active: bool,
}

impl RoomInfo {
    pub fn from_state(rs: &RoomState) -> Self {
        Self {
            id: rs.id,
            name: rs.name.clone(),
            floor: rs.floor,
            capacity: rs.capacity,
            is_active: rs.is_active,
        }
    }
}

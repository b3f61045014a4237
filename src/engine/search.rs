use ulid::Ulid;

use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;
use crate::observability;

use super::conflict::{apply_buffer, find_conflict};
use super::queries::sort_rooms;
use super::{BookingError, Engine};

impl Engine {
    /// Every active room seating at least `min_capacity` that is free for
    /// the buffer-padded window. Output is ascending by `(floor, name, id)`
    /// so results are deterministic for callers and tests.
    ///
    /// One read lock + one binary-search probe per candidate room; the probe
    /// is cheap enough that batching across rooms has not been worth it.
    pub async fn find_available_rooms(
        &self,
        window: Span,
        min_capacity: u32,
    ) -> Result<Vec<RoomInfo>, BookingError> {
        validate_query_window(&window)?;
        metrics::counter!(observability::ROOM_SEARCHES_TOTAL).increment(1);

        let padded = apply_buffer(&window, self.policy.buffer_ms);
        let mut available = Vec::new();
        for rs in self.snapshot_rooms() {
            let guard = rs.read().await;
            if guard.is_active
                && guard.capacity >= min_capacity
                && find_conflict(&guard, &padded, None).is_none()
            {
                available.push(RoomInfo::from_state(&guard));
            }
        }
        sort_rooms(&mut available);
        Ok(available)
    }

    /// The gaps between slot-occupying bookings within `window` — what the
    /// room schedule view renders as bookable. Buffer padding is a conflict
    /// rule, not a schedule fact, so it is not subtracted here.
    pub async fn free_windows(
        &self,
        room_id: Ulid,
        window: Span,
    ) -> Result<Vec<Span>, BookingError> {
        validate_query_window(&window)?;
        let Some(rs) = self.room(&room_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;

        let mut occupied: Vec<Span> = guard
            .overlapping(&window)
            .filter(|b| b.status.occupies_slot())
            .map(|b| b.span.clamped_to(&window))
            .collect();
        occupied.sort_by_key(|s| s.start);

        Ok(subtract_spans(&[window], &merge_spans(&occupied)))
    }
}

fn validate_query_window(window: &Span) -> Result<(), BookingError> {
    if window.end <= window.start {
        return Err(BookingError::InvalidWindow);
    }
    if window.duration_ms() > MAX_QUERY_WINDOW_MS {
        return Err(BookingError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// Merge sorted overlapping/adjacent spans into a disjoint sorted list.
pub fn merge_spans(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
    for &span in sorted {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Subtract `occupied` (sorted, disjoint) from each span in `base`.
pub fn subtract_spans(base: &[Span], occupied: &[Span]) -> Vec<Span> {
    let mut free = Vec::new();
    for &b in base {
        let mut cursor = b.start;
        for o in occupied {
            if o.end <= cursor {
                continue;
            }
            if o.start >= b.end {
                break;
            }
            if o.start > cursor {
                free.push(Span::new(cursor, o.start));
            }
            cursor = cursor.max(o.end);
            if cursor >= b.end {
                break;
            }
        }
        if cursor < b.end {
            free.push(Span::new(cursor, b.end));
        }
    }
    free
}

use ulid::Ulid;

use crate::model::*;

use super::conflict::find_conflict;
use super::{BookingError, Engine, SharedRoomState};

impl Engine {
    /// Raw half-open overlap test against the room's slot-occupying
    /// bookings, optionally excluding one booking (edit flows). No buffer is
    /// applied here — the planner pads windows itself before calling down.
    ///
    /// Unknown rooms have no bookings and therefore no conflicts.
    pub async fn has_conflict(
        &self,
        room_id: Ulid,
        window: Span,
        exclude: Option<Ulid>,
    ) -> Result<bool, BookingError> {
        if window.end <= window.start {
            return Err(BookingError::InvalidWindow);
        }
        let Some(rs) = self.room(&room_id) else {
            return Ok(false);
        };
        let guard = rs.read().await;
        Ok(find_conflict(&guard, &window, exclude).is_some())
    }

    pub async fn get_booking(&self, booking_id: Ulid) -> Option<Booking> {
        let room_id = self.room_of_booking(&booking_id)?;
        let rs = self.room(&room_id)?;
        let guard = rs.read().await;
        guard.booking(booking_id).cloned()
    }

    /// All bookings for a room (any status), ascending by start time.
    pub async fn bookings_for_room(&self, room_id: Ulid) -> Vec<Booking> {
        let Some(rs) = self.room(&room_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        guard.bookings.clone()
    }

    /// All bookings owned by `owner_id` across rooms, most recent start
    /// first.
    pub async fn bookings_for_owner(&self, owner_id: Ulid) -> Vec<Booking> {
        let mut found = Vec::new();
        for rs in self.snapshot_rooms() {
            let guard = rs.read().await;
            found.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.owner_id == owner_id)
                    .cloned(),
            );
        }
        found.sort_by(|a, b| b.span.start.cmp(&a.span.start).then(a.id.cmp(&b.id)));
        found
    }

    pub async fn get_room(&self, room_id: Ulid) -> Option<RoomInfo> {
        let rs = self.room(&room_id)?;
        let guard = rs.read().await;
        Some(RoomInfo::from_state(&guard))
    }

    /// All rooms, ascending by `(floor, name, id)`.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms = Vec::new();
        for rs in self.snapshot_rooms() {
            let guard = rs.read().await;
            rooms.push(RoomInfo::from_state(&guard));
        }
        sort_rooms(&mut rooms);
        rooms
    }

    /// Clone the room Arcs out of the map so locks are never awaited while
    /// a DashMap shard guard is held.
    pub(super) fn snapshot_rooms(&self) -> Vec<SharedRoomState> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }
}

pub(super) fn sort_rooms(rooms: &mut [RoomInfo]) {
    rooms.sort_by(|a, b| {
        a.floor
            .cmp(&b.floor)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

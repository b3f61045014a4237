use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{apply_buffer, find_conflict, now_ms, validate_window};
use super::{BookingError, Engine};

/// Partial update for `update_booking`. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    pub room_id: Option<Ulid>,
    pub window: Option<Span>,
    pub title: Option<String>,
}

/// A lifecycle transition that has become due, found by `collect_due_transitions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueTransition {
    Start(Ulid),
    Complete(Ulid),
}

impl Engine {
    pub async fn create_room(
        &self,
        name: String,
        floor: i32,
        capacity: u32,
    ) -> Result<RoomInfo, BookingError> {
        if self.rooms.len() >= MAX_ROOMS {
            return Err(BookingError::LimitExceeded("too many rooms"));
        }
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(BookingError::LimitExceeded("room name empty or too long"));
        }
        if capacity == 0 {
            return Err(BookingError::LimitExceeded("capacity must be positive"));
        }

        let id = Ulid::new();
        let event = Event::RoomCreated {
            id,
            name: name.clone(),
            floor,
            capacity,
        };
        self.wal_append(&event).await?;
        let rs = RoomState::new(id, name, floor, capacity);
        let info = RoomInfo::from_state(&rs);
        self.rooms
            .insert(id, std::sync::Arc::new(tokio::sync::RwLock::new(rs)));
        metrics::gauge!(observability::ROOMS).set(self.rooms.len() as f64);
        Ok(info)
    }

    /// Replace a room's attributes. Deactivation blocks new bookings but
    /// leaves existing ones standing.
    pub async fn update_room(
        &self,
        id: Ulid,
        name: String,
        floor: i32,
        capacity: u32,
        is_active: bool,
    ) -> Result<RoomInfo, BookingError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(BookingError::LimitExceeded("room name empty or too long"));
        }
        if capacity == 0 {
            return Err(BookingError::LimitExceeded("capacity must be positive"));
        }
        let rs = self.room(&id).ok_or(BookingError::NotFound(id))?;
        let mut guard = rs.write().await;

        let event = Event::RoomUpdated {
            id,
            name,
            floor,
            capacity,
            is_active,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        Ok(RoomInfo::from_state(&guard))
    }

    /// Create a booking after running the full validation pipeline:
    /// window structure, past-dated start, duration cap, room existence and
    /// activity, then the buffer-padded conflict check — all before a single
    /// WAL append, under the room's write lock.
    pub async fn create_booking(
        &self,
        owner_id: Ulid,
        room_id: Ulid,
        span: Span,
        title: Option<String>,
    ) -> Result<Booking, BookingError> {
        validate_title(&title)?;
        self.validate_booking_window(&span)?;

        let rs = self
            .room(&room_id)
            .ok_or(BookingError::RoomUnavailable(room_id))?;
        let mut guard = rs.write().await;
        if !guard.is_active {
            return Err(BookingError::RoomUnavailable(room_id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(BookingError::LimitExceeded("too many bookings on room"));
        }

        let padded = apply_buffer(&span, self.policy.buffer_ms);
        if let Some(conflicting) = find_conflict(&guard, &padded, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::SlotTaken(conflicting));
        }

        let id = Ulid::new();
        let event = Event::BookingCreated {
            id,
            room_id,
            owner_id,
            span,
            title: title.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);

        let room_name = guard.name.clone();
        drop(guard);
        self.notify
            .notify(owner_id, format!("Booking {id} confirmed for room {room_name}"))
            .await;

        Ok(Booking {
            id,
            room_id,
            owner_id,
            span,
            status: BookingStatus::Scheduled,
            title,
        })
    }

    /// Edit a scheduled booking, re-running the full creation pipeline with
    /// the booking itself excluded from the conflict check. A room change is
    /// modeled as cancel + recreate: the old record becomes `Cancelled` and a
    /// fresh booking (new id) is created in the target room.
    pub async fn update_booking(
        &self,
        booking_id: Ulid,
        changes: BookingChanges,
    ) -> Result<Booking, BookingError> {
        validate_title(&changes.title)?;
        let current_room = self
            .room_of_booking(&booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        let target_room = changes.room_id.unwrap_or(current_room);

        if target_room == current_room {
            self.reschedule_in_place(booking_id, current_room, changes).await
        } else {
            self.move_to_room(booking_id, current_room, target_room, changes)
                .await
        }
    }

    async fn reschedule_in_place(
        &self,
        booking_id: Ulid,
        room_id: Ulid,
        changes: BookingChanges,
    ) -> Result<Booking, BookingError> {
        let rs = self
            .room(&room_id)
            .ok_or(BookingError::NotFound(room_id))?;
        let mut guard = rs.write().await;

        let current = guard
            .booking(booking_id)
            .ok_or(BookingError::NotFound(booking_id))?
            .clone();
        if current.status != BookingStatus::Scheduled {
            return Err(BookingError::BookingClosed(booking_id));
        }

        let span = changes.window.unwrap_or(current.span);
        let title = changes.title.or(current.title);
        self.validate_booking_window(&span)?;
        if !guard.is_active {
            return Err(BookingError::RoomUnavailable(room_id));
        }

        let padded = apply_buffer(&span, self.policy.buffer_ms);
        if let Some(conflicting) = find_conflict(&guard, &padded, Some(booking_id)) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::SlotTaken(conflicting));
        }

        let event = Event::BookingRescheduled {
            id: booking_id,
            room_id,
            span,
            title: title.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);
        self.notify
            .notify(current.owner_id, format!("Booking {booking_id} updated"))
            .await;

        Ok(Booking {
            id: booking_id,
            room_id,
            owner_id: current.owner_id,
            span,
            status: BookingStatus::Scheduled,
            title,
        })
    }

    async fn move_to_room(
        &self,
        booking_id: Ulid,
        src_room: Ulid,
        dst_room: Ulid,
        changes: BookingChanges,
    ) -> Result<Booking, BookingError> {
        let src = self
            .room(&src_room)
            .ok_or(BookingError::NotFound(src_room))?;
        let dst = self
            .room(&dst_room)
            .ok_or(BookingError::RoomUnavailable(dst_room))?;

        // Acquire write locks in sorted id order to prevent deadlocks.
        let (mut src_guard, mut dst_guard) = if src_room < dst_room {
            let a = src.write_owned().await;
            let b = dst.write_owned().await;
            (a, b)
        } else {
            let b = dst.write_owned().await;
            let a = src.write_owned().await;
            (a, b)
        };

        let current = src_guard
            .booking(booking_id)
            .ok_or(BookingError::NotFound(booking_id))?
            .clone();
        if current.status != BookingStatus::Scheduled {
            return Err(BookingError::BookingClosed(booking_id));
        }

        let span = changes.window.unwrap_or(current.span);
        let title = changes.title.or(current.title);
        self.validate_booking_window(&span)?;
        if !dst_guard.is_active {
            return Err(BookingError::RoomUnavailable(dst_room));
        }
        if dst_guard.bookings.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(BookingError::LimitExceeded("too many bookings on room"));
        }

        let padded = apply_buffer(&span, self.policy.buffer_ms);
        if let Some(conflicting) = find_conflict(&dst_guard, &padded, None) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(BookingError::SlotTaken(conflicting));
        }

        // Cancel first: if the second append fails the slot is released, but
        // no booking can ever end up duplicated across two rooms.
        let cancel = Event::BookingCancelled {
            id: booking_id,
            room_id: src_room,
        };
        self.persist_and_apply(&mut src_guard, &cancel).await?;

        let new_id = Ulid::new();
        let create = Event::BookingCreated {
            id: new_id,
            room_id: dst_room,
            owner_id: current.owner_id,
            span,
            title: title.clone(),
        };
        self.persist_and_apply(&mut dst_guard, &create).await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);

        let dst_name = dst_guard.name.clone();
        drop(src_guard);
        drop(dst_guard);
        self.notify
            .notify(
                current.owner_id,
                format!("Booking {booking_id} moved to room {dst_name} as {new_id}"),
            )
            .await;

        Ok(Booking {
            id: new_id,
            room_id: dst_room,
            owner_id: current.owner_id,
            span,
            status: BookingStatus::Scheduled,
            title,
        })
    }

    /// Cancel a booking. Idempotent: cancelling an already-cancelled booking
    /// is a no-op. Cancellation never needs a conflict re-check — it only
    /// ever releases a slot.
    pub async fn cancel_booking(
        &self,
        booking_id: Ulid,
        actor_id: Ulid,
    ) -> Result<(), BookingError> {
        let (room_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let current = guard
            .booking(booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        let owner_id = current.owner_id;
        match current.status {
            BookingStatus::Cancelled => return Ok(()),
            BookingStatus::Completed => return Err(BookingError::BookingClosed(booking_id)),
            BookingStatus::Scheduled | BookingStatus::InProgress => {}
        }

        let event = Event::BookingCancelled {
            id: booking_id,
            room_id,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        drop(guard);

        let message = if actor_id == owner_id {
            format!("Booking {booking_id} cancelled")
        } else {
            format!("Booking {booking_id} cancelled by {actor_id}")
        };
        self.notify.notify(owner_id, message).await;
        Ok(())
    }

    // ── Time-driven transitions (called by housekeeping) ─────────

    /// `scheduled → in-progress`. Idempotent if already in progress.
    pub async fn mark_in_progress(&self, booking_id: Ulid) -> Result<(), BookingError> {
        let (room_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let current = guard
            .booking(booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        match current.status {
            BookingStatus::InProgress => return Ok(()),
            BookingStatus::Scheduled => {}
            _ => return Err(BookingError::BookingClosed(booking_id)),
        }
        let event = Event::BookingStarted {
            id: booking_id,
            room_id,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// `scheduled | in-progress → completed`. Idempotent if already completed.
    pub async fn mark_completed(&self, booking_id: Ulid) -> Result<(), BookingError> {
        let (room_id, mut guard) = self.resolve_booking_write(&booking_id).await?;
        let current = guard
            .booking(booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        match current.status {
            BookingStatus::Completed => return Ok(()),
            BookingStatus::Scheduled | BookingStatus::InProgress => {}
            BookingStatus::Cancelled => return Err(BookingError::BookingClosed(booking_id)),
        }
        let event = Event::BookingCompleted {
            id: booking_id,
            room_id,
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Scan for bookings whose status is out of date at `now`.
    pub fn collect_due_transitions(&self, now: Ms) -> Vec<DueTransition> {
        let mut due = Vec::new();
        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            if let Ok(guard) = rs.try_read() {
                for b in &guard.bookings {
                    match b.status {
                        BookingStatus::Scheduled | BookingStatus::InProgress
                            if b.span.end <= now =>
                        {
                            due.push(DueTransition::Complete(b.id));
                        }
                        BookingStatus::Scheduled if b.span.contains_instant(now) => {
                            due.push(DueTransition::Start(b.id));
                        }
                        _ => {}
                    }
                }
            }
        }
        due
    }

    fn validate_booking_window(&self, span: &Span) -> Result<(), BookingError> {
        validate_window(span)?;
        let now = now_ms();
        if span.start < now {
            return Err(BookingError::PastWindow { start: span.start, now });
        }
        if span.duration_ms() > self.policy.max_duration_ms {
            return Err(BookingError::DurationExceeded {
                requested_ms: span.duration_ms(),
                max_ms: self.policy.max_duration_ms,
            });
        }
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Booking history (including cancelled and
    /// completed records) is preserved.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let mut events = Vec::new();

        for entry in self.rooms.iter() {
            let rs = entry.value().clone();
            let guard = rs.try_read().expect("compact: uncontended read");

            events.push(Event::RoomCreated {
                id: guard.id,
                name: guard.name.clone(),
                floor: guard.floor,
                capacity: guard.capacity,
            });
            if !guard.is_active {
                events.push(Event::RoomUpdated {
                    id: guard.id,
                    name: guard.name.clone(),
                    floor: guard.floor,
                    capacity: guard.capacity,
                    is_active: false,
                });
            }

            for b in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    room_id: guard.id,
                    owner_id: b.owner_id,
                    span: b.span,
                    title: b.title.clone(),
                });
                match b.status {
                    BookingStatus::Scheduled => {}
                    BookingStatus::InProgress => events.push(Event::BookingStarted {
                        id: b.id,
                        room_id: guard.id,
                    }),
                    BookingStatus::Completed => events.push(Event::BookingCompleted {
                        id: b.id,
                        room_id: guard.id,
                    }),
                    BookingStatus::Cancelled => events.push(Event::BookingCancelled {
                        id: b.id,
                        room_id: guard.id,
                    }),
                }
            }
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(super::WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(super::WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn validate_title(title: &Option<String>) -> Result<(), BookingError> {
    if let Some(t) = title
        && t.len() > MAX_TITLE_LEN {
            return Err(BookingError::LimitExceeded("title too long"));
        }
    Ok(())
}

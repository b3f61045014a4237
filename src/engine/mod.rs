mod conflict;
mod error;
mod mutations;
mod queries;
mod search;

pub use conflict::apply_buffer;
pub use error::BookingError;
pub use mutations::{BookingChanges, DueTransition};
pub use search::{merge_spans, subtract_spans};

pub(crate) use conflict::now_ms;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::config::BookingPolicy;
use crate::model::*;
use crate::notify::NotificationSink;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and group-commits appends: it blocks on
/// the first Append, buffers every Append already waiting in the channel, and
/// pays a single flush_sync for the whole batch before answering any sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // The batch window: everything already queued joins this flush.
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Commit the batch before compaction touches the file.
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even when an append failed: the batch's senders all get an error,
    // and leftover buffered bytes must not leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine: room table, booking index, WAL writer, notifier.
///
/// Every mutation acquires the target room's write lock, validates, appends
/// to the WAL, then applies to memory — the lock held across check-and-write
/// is what guarantees at-most-one-winner for conflicting requests.
pub struct Engine {
    pub(super) rooms: DashMap<Ulid, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) notify: Arc<dyn NotificationSink>,
    /// Reverse lookup: booking id → room id.
    pub(super) booking_index: DashMap<Ulid, Ulid>,
    pub(super) policy: BookingPolicy,
}

/// Apply an event directly to a RoomState (no locking — caller holds the lock).
fn apply_to_room(rs: &mut RoomState, event: &Event, index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::RoomUpdated {
            name,
            floor,
            capacity,
            is_active,
            ..
        } => {
            rs.name = name.clone();
            rs.floor = *floor;
            rs.capacity = *capacity;
            rs.is_active = *is_active;
        }
        Event::BookingCreated {
            id,
            room_id,
            owner_id,
            span,
            title,
        } => {
            rs.insert_booking(Booking {
                id: *id,
                room_id: *room_id,
                owner_id: *owner_id,
                span: *span,
                status: BookingStatus::Scheduled,
                title: title.clone(),
            });
            index.insert(*id, *room_id);
        }
        Event::BookingRescheduled { id, span, title, .. } => {
            // Reinsert so the sort-by-start invariant holds.
            if let Some(mut b) = rs.take_booking(*id) {
                b.span = *span;
                b.title = title.clone();
                rs.insert_booking(b);
            }
        }
        Event::BookingStarted { id, .. } => rs.set_status(*id, BookingStatus::InProgress),
        Event::BookingCompleted { id, .. } => rs.set_status(*id, BookingStatus::Completed),
        Event::BookingCancelled { id, .. } => rs.set_status(*id, BookingStatus::Cancelled),
        // RoomCreated is handled at the DashMap level, not here
        Event::RoomCreated { .. } => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        policy: BookingPolicy,
        notify: Arc<dyn NotificationSink>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            wal_tx,
            notify,
            booking_index: DashMap::new(),
            policy,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in &events {
            match event {
                Event::RoomCreated {
                    id,
                    name,
                    floor,
                    capacity,
                } => {
                    let rs = RoomState::new(*id, name.clone(), *floor, *capacity);
                    engine.rooms.insert(*id, Arc::new(RwLock::new(rs)));
                }
                other => {
                    if let Some(room_id) = event_room_id(other)
                        && let Some(entry) = engine.rooms.get(&room_id) {
                            let rs_arc = entry.clone();
                            let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                            apply_to_room(&mut guard, other, &engine.booking_index);
                        }
                }
            }
        }
        metrics::gauge!(crate::observability::ROOMS).set(engine.rooms.len() as f64);

        Ok(engine)
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        self.policy
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::WalError(e.to_string()))
    }

    pub(super) fn room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub(super) fn room_of_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_index.get(booking_id).map(|e| *e.value())
    }

    /// WAL-append + apply in one call. The caller holds the room write lock,
    /// so nothing is visible to readers until the append has succeeded.
    pub(super) async fn persist_and_apply(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.booking_index);
        Ok(())
    }

    /// Lookup booking → room, acquire the room's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<RoomState>), BookingError> {
        let room_id = self
            .room_of_booking(booking_id)
            .ok_or(BookingError::NotFound(*booking_id))?;
        let rs = self
            .room(&room_id)
            .ok_or(BookingError::NotFound(room_id))?;
        let guard = rs.write_owned().await;
        Ok((room_id, guard))
    }
}

/// Extract the room id from an event (None for RoomCreated).
fn event_room_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::BookingCreated { room_id, .. }
        | Event::BookingRescheduled { room_id, .. }
        | Event::BookingStarted { room_id, .. }
        | Event::BookingCompleted { room_id, .. }
        | Event::BookingCancelled { room_id, .. } => Some(*room_id),
        Event::RoomUpdated { id, .. } => Some(*id),
        Event::RoomCreated { .. } => None,
    }
}

//! atrium — a meeting-room booking engine.
//!
//! Decides whether a reservation may be created for a room and a half-open
//! time window, applies turnover buffer padding during conflict checks,
//! tracks the booking lifecycle (scheduled / in-progress / completed /
//! cancelled), and answers available-room searches. State is kept in memory
//! and made durable through an append-only WAL replayed at startup.
//!
//! The crate is a library: it owns no wire protocol or UI. A host
//! application constructs an [`engine::Engine`], passes acting identities
//! explicitly into every call, and receives typed [`engine::BookingError`]
//! values for every business-rule violation.

pub mod config;
pub mod engine;
pub mod housekeeping;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;

//! dutycal-core library.
//!
//! Duty-roster events persisted in a wide-column store: the week-bucket
//! index codec, the event codec and store, and the recurrence scheduler
//! that keeps the roster populated.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per component ([`error::StoreError`],
//!   [`scheduler::ScheduleError`], [`roster::RosterError`],
//!   [`lock::LockError`]); configuration loading uses `anyhow::Result`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Time**: instants are `DateTime<chrono_tz::Tz>`; write timestamps are
//!   microseconds since the Unix epoch.

pub mod backend;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod lock;
pub mod roster;
pub mod scheduler;
pub mod store;
pub mod week;

#[cfg(test)]
mod test_support;

pub use backend::{ColumnBackend, ConsistencyLevel};
pub use config::{DutyCalConfig, RecurrenceRule};
pub use db::SqliteBackend;
pub use error::{ErrorKind, StoreError};
pub use event::{Event, NewEvent, derive_id};
pub use scheduler::{ScheduleReport, Scheduler};
pub use store::{EventStore, RangeQuery};

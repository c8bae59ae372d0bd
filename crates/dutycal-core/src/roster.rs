//! Ownership changes on existing shifts.
//!
//! These are read-modify-write cycles over [`EventStore::fetch`] and
//! [`EventStore::sync`]; two users racing for the same shift are merged by
//! write timestamp, so the later sync wins.

use tracing::info;

use crate::backend::ColumnBackend;
use crate::error::StoreError;
use crate::event::Event;
use crate::store::EventStore;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("no acting user given")]
    AnonymousUser,

    #[error("event {id} is owned by {owner:?}, not by the acting user")]
    NotOwner { id: String, owner: String },

    #[error("event {id} is a required shift and cannot be deleted")]
    Required { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RosterError {
    /// Stable `E####` code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AnonymousUser => "E6001",
            Self::NotOwner { .. } => "E6002",
            Self::Required { .. } => "E6003",
            Self::Store(err) => err.kind().code(),
        }
    }
}

/// Make `user` the owner of event `id`, whoever held it before.
///
/// # Errors
///
/// [`RosterError::AnonymousUser`] for an empty user, otherwise the fetch or
/// sync failure.
pub fn take<B: ColumnBackend>(
    store: &EventStore<B>,
    id: &str,
    user: &str,
) -> Result<Event, RosterError> {
    if user.is_empty() {
        return Err(RosterError::AnonymousUser);
    }
    let mut event = store.fetch(id, true)?;
    let previous = std::mem::replace(&mut event.owner, user.to_string());
    store.sync(&mut event)?;
    info!(id, user, previous = %previous, "shift taken");
    Ok(event)
}

/// Release event `id` if `user` owns it.
///
/// # Errors
///
/// [`RosterError::NotOwner`] if someone else (or nobody) owns it, otherwise
/// the fetch or sync failure.
pub fn disclaim<B: ColumnBackend>(
    store: &EventStore<B>,
    id: &str,
    user: &str,
) -> Result<Event, RosterError> {
    if user.is_empty() {
        return Err(RosterError::AnonymousUser);
    }
    let mut event = store.fetch(id, true)?;
    if event.owner != user {
        return Err(RosterError::NotOwner {
            id: event.id,
            owner: event.owner,
        });
    }
    event.owner.clear();
    store.sync(&mut event)?;
    info!(id, user, "shift disclaimed");
    Ok(event)
}

/// Delete event `id` on behalf of its owner. Required shifts stay; they can
/// only be disclaimed.
///
/// # Errors
///
/// [`RosterError::Required`] or [`RosterError::NotOwner`] when the user may
/// not delete it, otherwise the fetch or delete failure.
pub fn remove<B: ColumnBackend>(
    store: &EventStore<B>,
    id: &str,
    user: &str,
) -> Result<Event, RosterError> {
    if user.is_empty() {
        return Err(RosterError::AnonymousUser);
    }
    let event = store.fetch(id, true)?;
    if event.required {
        return Err(RosterError::Required { id: event.id });
    }
    if event.owner != user {
        return Err(RosterError::NotOwner {
            id: event.id,
            owner: event.owner,
        });
    }
    store.delete(&event)?;
    info!(id, user, "shift deleted");
    Ok(event)
}

//! Position record store: a mutable active set and an append-only archive.
//!
//! The two collections are disjoint by id. `archive_and_remove` is the only
//! path from one to the other and callers never observe an id in both or in
//! neither.
//!
//! Reads never fail. A missing or unreadable store lists as empty, and the
//! `StoreHealth` attached to every listing tells the caller which case it was
//! so a degraded store can be reported instead of silently masked.

pub mod json;
pub mod memory;

use std::collections::HashSet;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::{ArchivedPosition, Position, PositionId};

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Store errors. Storage being unavailable is not an error on reads; see `StoreHealth`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position '{id}' not found")]
    NotFound { id: PositionId },

    #[error("position id '{id}' already exists")]
    DuplicateId { id: PositionId },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Condition of the underlying collection when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreHealth {
    Ok,
    /// Nothing persisted yet (fresh installation).
    Missing,
    /// Present but could not be read or parsed; listed as empty.
    Unreadable(String),
}

impl StoreHealth {
    pub fn is_degraded(&self) -> bool {
        matches!(self, StoreHealth::Unreadable(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            StoreHealth::Ok => "ok",
            StoreHealth::Missing => "empty (nothing saved yet)",
            StoreHealth::Unreadable(_) => "unreadable (listed as empty)",
        }
    }
}

/// A read of one collection plus the health of the read.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub health: StoreHealth,
}

impl<T> Listing<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self {
            items,
            health: StoreHealth::Ok,
        }
    }

    pub fn missing() -> Self {
        Self {
            items: Vec::new(),
            health: StoreHealth::Missing,
        }
    }

    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            health: StoreHealth::Unreadable(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Durable collection of active positions and archived ones.
///
/// Every mutation is all-or-nothing from the caller's point of view.
pub trait PositionStore: Send + Sync {
    /// Active positions in insertion order.
    fn list_active(&self) -> Listing<Position>;

    /// Archived positions in insertion order.
    fn list_history(&self) -> Listing<ArchivedPosition>;

    /// Insert a new active record. Fails with `DuplicateId` if the id is active or archived.
    fn create(&mut self, position: Position) -> Result<(), StoreError>;

    /// Replace the active record with the same id. Fails with `NotFound` if absent.
    fn update(&mut self, position: Position) -> Result<(), StoreError>;

    /// Mark inactive, stamp `closed_at`, append to the archive and drop from the active set.
    fn archive_and_remove(
        &mut self,
        id: &PositionId,
        closed_at: NaiveDateTime,
    ) -> Result<ArchivedPosition, StoreError>;

    fn get(&self, id: &PositionId) -> Result<Position, StoreError> {
        self.list_active()
            .items
            .into_iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    /// Fresh id derived from the current local time.
    fn generate_id(&self) -> PositionId {
        self.generate_id_at(chrono::Local::now().naive_local())
    }

    /// Fresh id derived from `now`, not colliding with any active or archived id.
    fn generate_id_at(&self, now: NaiveDateTime) -> PositionId {
        let mut taken: HashSet<PositionId> =
            self.list_active().items.into_iter().map(|p| p.id).collect();
        taken.extend(self.list_history().items.into_iter().map(|a| a.position.id));
        next_free_id(PositionId::from_timestamp(now), &taken)
    }
}

/// First of `base`, `base-2`, `base-3`, ... not in `taken`.
pub fn next_free_id(base: PositionId, taken: &HashSet<PositionId>) -> PositionId {
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| base.with_suffix(n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}

/// Drop active entries whose id already sits in the archive.
///
/// That state can only come from a crash between the archive write and the
/// active rewrite; the archive is authoritative.
pub(crate) fn drop_archived(
    active: Vec<Position>,
    history: &[ArchivedPosition],
) -> (Vec<Position>, Vec<PositionId>) {
    let archived: HashSet<&PositionId> = history.iter().map(|a| a.id()).collect();
    let mut dropped = Vec::new();
    let kept = active
        .into_iter()
        .filter(|p| {
            if archived.contains(&p.id) {
                dropped.push(p.id.clone());
                false
            } else {
                true
            }
        })
        .collect();
    (kept, dropped)
}

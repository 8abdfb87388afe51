//! In-memory store. Same contract as the file store, nothing durable.

use chrono::NaiveDateTime;

use super::{Listing, PositionStore, StoreError};
use crate::domain::{ArchivedPosition, Position, PositionId};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    active: Vec<Position>,
    history: Vec<ArchivedPosition>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryStore {
    fn list_active(&self) -> Listing<Position> {
        Listing::ok(self.active.clone())
    }

    fn list_history(&self) -> Listing<ArchivedPosition> {
        Listing::ok(self.history.clone())
    }

    fn create(&mut self, position: Position) -> Result<(), StoreError> {
        let taken = self.active.iter().any(|p| p.id == position.id)
            || self.history.iter().any(|a| a.id() == &position.id);
        if taken {
            return Err(StoreError::DuplicateId { id: position.id });
        }
        self.active.push(position);
        Ok(())
    }

    fn update(&mut self, position: Position) -> Result<(), StoreError> {
        let slot = self
            .active
            .iter_mut()
            .find(|p| p.id == position.id)
            .ok_or_else(|| StoreError::NotFound {
                id: position.id.clone(),
            })?;
        *slot = position;
        Ok(())
    }

    fn archive_and_remove(
        &mut self,
        id: &PositionId,
        closed_at: NaiveDateTime,
    ) -> Result<ArchivedPosition, StoreError> {
        let idx = self
            .active
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        let mut position = self.active.remove(idx);
        position.is_active = false;
        position.updated_at = closed_at;
        let archived = ArchivedPosition {
            position,
            closed_at,
        };
        self.history.push(archived.clone());
        Ok(archived)
    }
}

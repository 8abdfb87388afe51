//! JSON file store.
//!
//! Layout: `{data_dir}/positions.json` (active) and `{data_dir}/history.json`
//! (archive), each a pretty-printed JSON array.
//!
//! Features:
//! - Atomic writes (write to .tmp, fsync, rename into place)
//! - Full rewrite per mutation, never an in-place edit
//! - Archive written before the active set, so a crash leaves the id archived
//! - Unreadable files are moved aside ({file}.{timestamp}.quarantined) before
//!   the next write instead of being overwritten

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{drop_archived, Listing, PositionStore, StoreError};
use crate::domain::{ArchivedPosition, Position, PositionId};

pub const ACTIVE_FILE: &str = "positions.json";
pub const HISTORY_FILE: &str = "history.json";

/// Position store backed by two JSON files in a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn active_path(&self) -> PathBuf {
        self.data_dir.join(ACTIVE_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    /// Active positions as stored, without dropping crash leftovers.
    fn read_active_raw(&self) -> Listing<Position> {
        let mut listing: Listing<Position> = read_collection(&self.active_path());
        listing.items.retain(|p| p.is_active);
        listing
    }

    /// Active set for a read-modify-write cycle, reconciled against the archive.
    fn active_for_write(&self, history: &[ArchivedPosition]) -> Pending<Position> {
        let listing = self.read_active_raw();
        let degraded = listing.health.is_degraded();
        let (items, dropped) = drop_archived(listing.items, history);
        if !dropped.is_empty() {
            warn!(ids = ?dropped, "Dropping active entries already present in the archive");
        }
        Pending {
            items,
            path: self.active_path(),
            degraded,
        }
    }

    fn history_for_write(&self) -> Pending<ArchivedPosition> {
        let listing: Listing<ArchivedPosition> = read_collection(&self.history_path());
        Pending {
            degraded: listing.health.is_degraded(),
            items: listing.items,
            path: self.history_path(),
        }
    }
}

/// One collection loaded for a mutation. Nothing on disk changes until `save`.
struct Pending<T> {
    items: Vec<T>,
    path: PathBuf,
    /// The file existed but could not be read.
    degraded: bool,
}

impl<T: Serialize> Pending<T> {
    /// Replace the file, moving an unreadable original aside first.
    fn save(&mut self) -> Result<(), StoreError> {
        if self.degraded {
            quarantine(&self.path)?;
            self.degraded = false;
        }
        write_collection(&self.path, &self.items)
    }
}

impl PositionStore for JsonFileStore {
    fn list_active(&self) -> Listing<Position> {
        let listing = self.read_active_raw();
        if listing.is_empty() {
            return listing;
        }
        let history: Listing<ArchivedPosition> = read_collection(&self.history_path());
        let (items, dropped) = drop_archived(listing.items, &history.items);
        if !dropped.is_empty() {
            warn!(
                ids = ?dropped,
                "Active positions found in the archive (interrupted close), treating as closed"
            );
        }
        Listing {
            items,
            health: listing.health,
        }
    }

    fn list_history(&self) -> Listing<ArchivedPosition> {
        read_collection(&self.history_path())
    }

    fn create(&mut self, position: Position) -> Result<(), StoreError> {
        let history = self.history_for_write();
        let mut active = self.active_for_write(&history.items);

        let taken = active.items.iter().any(|p| p.id == position.id)
            || history.items.iter().any(|a| a.id() == &position.id);
        if taken {
            return Err(StoreError::DuplicateId { id: position.id });
        }

        active.items.push(position);
        active.save()
    }

    fn update(&mut self, position: Position) -> Result<(), StoreError> {
        let history = self.history_for_write();
        let mut active = self.active_for_write(&history.items);

        let slot = active
            .items
            .iter_mut()
            .find(|p| p.id == position.id)
            .ok_or_else(|| StoreError::NotFound {
                id: position.id.clone(),
            })?;
        *slot = position;

        active.save()
    }

    fn archive_and_remove(
        &mut self,
        id: &PositionId,
        closed_at: NaiveDateTime,
    ) -> Result<ArchivedPosition, StoreError> {
        let mut history = self.history_for_write();
        let mut active = self.active_for_write(&history.items);

        let idx = active
            .items
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;

        let mut position = active.items.remove(idx);
        position.is_active = false;
        position.updated_at = closed_at;
        let archived = ArchivedPosition {
            position,
            closed_at,
        };

        history.items.push(archived.clone());
        history.save()?;

        if let Err(e) = active.save() {
            // Roll the archive back so the id stays only in the active set.
            history.items.pop();
            if let Err(rollback) = history.save() {
                warn!(%id, error = %rollback, "Archive rollback failed; id will read as closed");
            }
            return Err(e);
        }

        info!(%id, "Archived position");
        Ok(archived)
    }
}

/// Read a JSON array. Missing → empty `Missing`; unreadable or corrupt → empty `Unreadable`.
fn read_collection<T: DeserializeOwned>(path: &Path) -> Listing<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Listing::missing(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file unreadable, listing as empty");
            return Listing::unreadable(e.to_string());
        }
    };

    if content.trim().is_empty() {
        return Listing::ok(Vec::new());
    }

    match serde_json::from_str::<Vec<T>>(&content) {
        Ok(items) => Listing::ok(items),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store file corrupt, listing as empty");
            Listing::unreadable(e.to_string())
        }
    }
}

/// Rewrite a JSON array atomically: write to `.tmp`, fsync, rename over the target.
fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let result = (|| -> Result<(), StoreError> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, items)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        // Clean up temp file on failure; the previous version is untouched.
        let _ = fs::remove_file(&tmp_path);
    } else {
        debug!(path = %path.display(), count = items.len(), "Saved store file");
    }
    result
}

/// Move an unreadable store file aside so the next write does not destroy it.
fn quarantine(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        return Ok(());
    }
    let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".into());
    let target = path.with_file_name(format!("{file_name}.{stamp}.quarantined"));
    fs::rename(path, &target)?;
    warn!(
        from = %path.display(),
        to = %target.display(),
        "Quarantined unreadable store file"
    );
    Ok(())
}

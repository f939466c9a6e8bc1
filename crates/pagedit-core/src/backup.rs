//! Backup-before-mutation and restore-to-original.
//!
//! Every page gets exactly one backup, taken from its stored bytes before
//! the first edit touches it. Later edits never refresh it, so restoring
//! always returns to the pristine page.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PageditError, Result};
use crate::storage::{PageId, PageStorage};

/// Handle to a page's backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Page the backup belongs to.
    pub page: PageId,
    /// Where the backup lives.
    pub location: String,
    /// True if this call created it, false if it already existed.
    pub created: bool,
}

/// Page-scoped mutual exclusion.
///
/// Edits and restores of the same page are serialized; different pages
/// never contend. A page's entry is dropped again once no guard refers to
/// it, so the map only holds pages with work in flight.
#[derive(Debug, Default)]
pub struct PageLocks {
    locks: Mutex<HashMap<PageId, Arc<Mutex<()>>>>,
}

/// Held for the duration of one read-modify-persist sequence on a page.
pub struct PageGuard<'a> {
    owner: &'a PageLocks,
    page: PageId,
    lock: Arc<Mutex<()>>,
}

impl PageGuard<'_> {
    fn hold(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.map();
        // Release our reference under the map lock so concurrent drops
        // cannot both see the other's count.
        let lock = std::mem::take(&mut self.lock);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&self.page);
        }
    }
}

impl PageLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<PageId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get the lock for a page, creating it on first use.
    pub fn for_page(&self, page: &PageId) -> PageGuard<'_> {
        let lock = self.map().entry(page.clone()).or_default().clone();
        PageGuard {
            owner: self,
            page: page.clone(),
            lock,
        }
    }

    /// Number of pages with a live lock entry.
    pub fn tracked(&self) -> usize {
        self.map().len()
    }

    /// Run `f` while holding the page's lock.
    pub fn with_page<T>(&self, page: &PageId, f: impl FnOnce() -> T) -> T {
        let guard = self.for_page(page);
        let _held = guard.hold();
        f()
    }
}

/// Maintains the one-backup-per-page invariant.
#[derive(Clone)]
pub struct BackupStore {
    storage: Arc<dyn PageStorage>,
}

impl BackupStore {
    pub fn new(storage: Arc<dyn PageStorage>) -> Self {
        Self { storage }
    }

    /// Make sure a backup exists, creating it from the current page if not.
    ///
    /// Idempotent: an existing backup is returned untouched even if the page
    /// has been edited since. Callers must hold the page lock.
    pub fn ensure(&self, page: &PageId) -> Result<Backup> {
        if !self.storage.contains(page) {
            return Err(PageditError::NotFound(page.to_string()));
        }

        let created = if self.storage.has_backup(page) {
            false
        } else {
            info!("Creating backup for {}", page);
            self.storage.copy_page_to_backup(page)?;
            true
        };

        Ok(Backup {
            page: page.clone(),
            location: self.storage.backup_location(page),
            created,
        })
    }

    /// Copy the backup back onto the page.
    ///
    /// Fails with [`PageditError::NoBackup`] if the page was never backed up.
    pub fn restore(&self, page: &PageId) -> Result<()> {
        if !self.storage.has_backup(page) {
            return Err(PageditError::NoBackup(page.to_string()));
        }
        self.storage.copy_backup_to_page(page)
    }

    /// Decode the backup pixels.
    pub fn load(&self, page: &PageId) -> Result<RgbImage> {
        self.storage.load_backup(page)
    }
}

/// Outcome of a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The page now matches its backup.
    Restored,
    /// The page was never edited; nothing changed.
    NothingToRestore,
}

/// Reverts pages to their backups.
#[derive(Clone)]
pub struct RestoreEngine {
    storage: Arc<dyn PageStorage>,
    backups: BackupStore,
    locks: Arc<PageLocks>,
}

impl RestoreEngine {
    pub fn new(storage: Arc<dyn PageStorage>, locks: Arc<PageLocks>) -> Self {
        Self {
            backups: BackupStore::new(storage.clone()),
            storage,
            locks,
        }
    }

    /// Restore a page to its original state.
    ///
    /// A page without a backup is reported as [`RestoreOutcome::NothingToRestore`]
    /// with a warning rather than as an error.
    pub fn restore(&self, page: &PageId) -> Result<RestoreOutcome> {
        if !self.storage.contains(page) {
            return Err(PageditError::NotFound(page.to_string()));
        }

        self.locks.with_page(page, || match self.backups.restore(page) {
            Ok(()) => {
                info!("Restored {} from backup", page);
                Ok(RestoreOutcome::Restored)
            }
            Err(PageditError::NoBackup(_)) => {
                warn!("No backup found for {}, cannot restore", page);
                Ok(RestoreOutcome::NothingToRestore)
            }
            Err(e) => {
                debug!("Restore of {} failed: {}", page, e);
                Err(e)
            }
        })
    }
}

//! Page image storage.
//!
//! A session owns an ordered set of page images. Each page can carry one
//! backup stored next to it under a fixed suffix, so external tooling can
//! tell the pristine page from the edited one.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PageditError, Result};

/// Stable identity of one page within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    pub session: String,
    pub index: u32,
}

impl PageId {
    pub fn new(session: impl Into<String>, index: u32) -> Self {
        Self {
            session: session.into(),
            index,
        }
    }

    /// Storage file name of the live page.
    pub fn file_name(&self) -> String {
        format!("page_{}.png", self.index)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/page_{}", self.session, self.index)
    }
}

/// Backing store for live pages and their backups.
///
/// Backup operations copy stored bytes, never re-encode, so a restore
/// reproduces the original page exactly.
pub trait PageStorage: Send + Sync {
    /// Whether the live page exists.
    fn contains(&self, page: &PageId) -> bool;

    /// All pages of a session in index order.
    fn pages(&self, session: &str) -> Result<Vec<PageId>>;

    /// Decode the live page.
    fn load_page(&self, page: &PageId) -> Result<RgbImage>;

    /// Replace the live page.
    fn save_page(&self, page: &PageId, image: &RgbImage) -> Result<()>;

    /// Whether a backup exists for the page.
    fn has_backup(&self, page: &PageId) -> bool;

    /// Decode the backup.
    fn load_backup(&self, page: &PageId) -> Result<RgbImage>;

    /// Copy the live page to its backup slot, replacing nothing else.
    fn copy_page_to_backup(&self, page: &PageId) -> Result<()>;

    /// Copy the backup over the live page.
    fn copy_backup_to_page(&self, page: &PageId) -> Result<()>;

    /// Human-readable location of the backup, for logs and diagnostics.
    fn backup_location(&self, page: &PageId) -> String;
}

/// Session directories on disk: `<root>/<session>/page_<i>.png`.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
    backup_suffix: String,
}

impl DirStorage {
    /// Create storage rooted at `root` with the given backup suffix.
    pub fn new(root: impl Into<PathBuf>, backup_suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            backup_suffix: backup_suffix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh session directory and return its id.
    pub fn create_session(&self) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        fs::create_dir_all(self.root.join(&id))?;
        info!("Created session {}", id);
        Ok(id)
    }

    /// Directory of an existing session.
    pub fn session_dir(&self, session: &str) -> Result<PathBuf> {
        // Session ids are single path components.
        if session.is_empty() || session.contains(['/', '\\']) || session == "." || session == ".." {
            return Err(PageditError::NotFound(format!("session {}", session)));
        }
        let dir = self.root.join(session);
        if !dir.is_dir() {
            return Err(PageditError::NotFound(format!("session {}", session)));
        }
        Ok(dir)
    }

    pub fn page_path(&self, page: &PageId) -> PathBuf {
        self.root.join(&page.session).join(page.file_name())
    }

    pub fn backup_path(&self, page: &PageId) -> PathBuf {
        self.root
            .join(&page.session)
            .join(format!("{}{}", page.file_name(), self.backup_suffix))
    }

    fn existing_page_path(&self, page: &PageId) -> Result<PathBuf> {
        self.session_dir(&page.session)?;
        let path = self.page_path(page);
        if !path.is_file() {
            return Err(PageditError::NotFound(page.to_string()));
        }
        Ok(path)
    }
}

/// Copy `source` over `dest` through a sibling temp file, so `dest` is
/// either untouched or complete.
fn copy_replacing(source: &Path, dest: &Path) -> Result<()> {
    let mut name = dest.as_os_str().to_owned();
    name.push(".tmp");
    let tmp = PathBuf::from(name);

    if let Err(e) = fs::copy(source, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, dest)?;
    debug!("Copied {} -> {}", source.display(), dest.display());
    Ok(())
}

fn parse_page_index(name: &str) -> Option<u32> {
    name.strip_prefix("page_")?.strip_suffix(".png")?.parse().ok()
}

impl PageStorage for DirStorage {
    fn contains(&self, page: &PageId) -> bool {
        self.existing_page_path(page).is_ok()
    }

    fn pages(&self, session: &str) -> Result<Vec<PageId>> {
        let dir = self.session_dir(session)?;
        let mut indices: Vec<u32> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(parse_page_index))
            .collect();
        indices.sort_unstable();
        Ok(indices.into_iter().map(|i| PageId::new(session, i)).collect())
    }

    fn load_page(&self, page: &PageId) -> Result<RgbImage> {
        let path = self.existing_page_path(page)?;
        Ok(image::open(path)?.to_rgb8())
    }

    fn save_page(&self, page: &PageId, image: &RgbImage) -> Result<()> {
        self.session_dir(&page.session)?;
        let path = self.page_path(page);
        // Write to a sibling file first so a failed encode never truncates
        // the live page.
        let tmp = path.with_extension("png.tmp");
        image.save_with_format(&tmp, image::ImageFormat::Png)?;
        fs::rename(&tmp, &path)?;
        debug!("Saved page image: {}", path.display());
        Ok(())
    }

    fn has_backup(&self, page: &PageId) -> bool {
        self.backup_path(page).is_file()
    }

    fn load_backup(&self, page: &PageId) -> Result<RgbImage> {
        let path = self.backup_path(page);
        if !path.is_file() {
            return Err(PageditError::NoBackup(page.to_string()));
        }
        Ok(image::open(path)?.to_rgb8())
    }

    fn copy_page_to_backup(&self, page: &PageId) -> Result<()> {
        let source = self.existing_page_path(page)?;
        copy_replacing(&source, &self.backup_path(page))
    }

    fn copy_backup_to_page(&self, page: &PageId) -> Result<()> {
        let backup = self.backup_path(page);
        if !backup.is_file() {
            return Err(PageditError::NoBackup(page.to_string()));
        }
        copy_replacing(&backup, &self.page_path(page))
    }

    fn backup_location(&self, page: &PageId) -> String {
        self.backup_path(page).display().to_string()
    }
}

/// In-process storage, used by tests and by embedders that manage their
/// own persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pages: RwLock<HashMap<PageId, RgbImage>>,
    backups: RwLock<HashMap<PageId, RgbImage>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a live page.
    pub fn insert_page(&self, page: PageId, image: RgbImage) {
        write_map(&self.pages).insert(page, image);
    }
}

fn read_map<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_map<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PageStorage for MemoryStorage {
    fn contains(&self, page: &PageId) -> bool {
        read_map(&self.pages).contains_key(page)
    }

    fn pages(&self, session: &str) -> Result<Vec<PageId>> {
        let mut pages: Vec<PageId> = read_map(&self.pages)
            .keys()
            .filter(|p| p.session == session)
            .cloned()
            .collect();
        if pages.is_empty() {
            return Err(PageditError::NotFound(format!("session {}", session)));
        }
        pages.sort();
        Ok(pages)
    }

    fn load_page(&self, page: &PageId) -> Result<RgbImage> {
        read_map(&self.pages)
            .get(page)
            .cloned()
            .ok_or_else(|| PageditError::NotFound(page.to_string()))
    }

    fn save_page(&self, page: &PageId, image: &RgbImage) -> Result<()> {
        write_map(&self.pages).insert(page.clone(), image.clone());
        Ok(())
    }

    fn has_backup(&self, page: &PageId) -> bool {
        read_map(&self.backups).contains_key(page)
    }

    fn load_backup(&self, page: &PageId) -> Result<RgbImage> {
        read_map(&self.backups)
            .get(page)
            .cloned()
            .ok_or_else(|| PageditError::NoBackup(page.to_string()))
    }

    fn copy_page_to_backup(&self, page: &PageId) -> Result<()> {
        let image = self.load_page(page)?;
        write_map(&self.backups).insert(page.clone(), image);
        Ok(())
    }

    fn copy_backup_to_page(&self, page: &PageId) -> Result<()> {
        let backup = self.load_backup(page)?;
        write_map(&self.pages).insert(page.clone(), backup);
        Ok(())
    }

    fn backup_location(&self, page: &PageId) -> String {
        format!("memory:{}.original", page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_page_display() {
        assert_eq!(PageId::new("abc", 2).to_string(), "abc/page_2");
        assert_eq!(PageId::new("abc", 2).file_name(), "page_2.png");
    }

    #[test]
    fn test_parse_page_index() {
        assert_eq!(parse_page_index("page_12.png"), Some(12));
        assert_eq!(parse_page_index("page_12.png.original"), None);
        assert_eq!(parse_page_index("input.png"), None);
    }

    #[test]
    fn test_dir_storage_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::new(tmp.path(), ".original");
        let session = storage.create_session().unwrap();
        let page = PageId::new(&session, 0);

        assert!(!storage.contains(&page));
        storage
            .save_page(&page, &RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])))
            .unwrap();
        assert!(storage.contains(&page));
        assert!(!storage.has_backup(&page));

        storage.copy_page_to_backup(&page).unwrap();
        assert!(storage.has_backup(&page));
        assert!(storage.backup_path(&page).ends_with("page_0.png.original"));

        // Backup files never show up as pages.
        assert_eq!(storage.pages(&session).unwrap(), vec![page.clone()]);
    }

    #[test]
    fn test_dir_storage_missing_session() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::new(tmp.path(), ".original");
        let err = storage.load_page(&PageId::new("nope", 0)).unwrap_err();
        assert_eq!(err.kind(), "not_found");
        let err = storage.load_page(&PageId::new("../etc", 0)).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_memory_storage_backup_copy() {
        let storage = MemoryStorage::new();
        let page = PageId::new("s", 0);
        storage.insert_page(page.clone(), RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])));

        assert_eq!(storage.load_backup(&page).unwrap_err().kind(), "no_backup");
        storage.copy_page_to_backup(&page).unwrap();
        storage
            .save_page(&page, &RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])))
            .unwrap();
        storage.copy_backup_to_page(&page).unwrap();
        assert_eq!(storage.load_page(&page).unwrap().get_pixel(0, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_dir_storage_copies_leave_no_partial_files() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = DirStorage::new(tmp.path(), ".original");
        let session = storage.create_session().unwrap();
        let page = PageId::new(&session, 0);
        let original = RgbImage::from_fn(6, 5, |x, y| Rgb([x as u8 * 40, y as u8 * 50, 9]));
        storage.save_page(&page, &original).unwrap();

        // A half-written temp from an earlier crash is neither a backup nor a page.
        let stale = tmp.path().join(&session).join("page_0.png.original.tmp");
        fs::write(&stale, b"\x89PNG trunc").unwrap();
        assert!(!storage.has_backup(&page));
        assert_eq!(storage.pages(&session).unwrap(), vec![page.clone()]);

        storage.copy_page_to_backup(&page).unwrap();
        assert!(!stale.exists());
        assert_eq!(
            fs::read(storage.backup_path(&page)).unwrap(),
            fs::read(storage.page_path(&page)).unwrap()
        );

        storage.save_page(&page, &RgbImage::new(6, 5)).unwrap();
        storage.copy_backup_to_page(&page).unwrap();
        assert_eq!(storage.load_page(&page).unwrap(), original);

        let leftovers: Vec<_> = fs::read_dir(tmp.path().join(&session))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

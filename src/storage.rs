// SPDX-License-Identifier: GPL-3.0-only

//! Storage collaborators for persisted frames
//!
//! The save worker writes through the [`FrameStore`] trait and announces new
//! files through [`MediaIndexer`]. [`DirectoryStore`] is the real flat output
//! directory; [`MemoryStore`] keeps everything in memory for dry runs and
//! tests.

use crate::constants::persistence::slot_from_file_name;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Durable destination for encoded frames
pub trait FrameStore: Send {
    /// Free bytes available to this store
    fn available_bytes(&self) -> io::Result<u64>;

    /// Write (or replace) the file `name` and return where it went
    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Catalog to notify when a new file lands on disk
///
/// Notification is best-effort; errors are logged by the caller and never
/// fail the write.
pub trait MediaIndexer: Send {
    fn index(&self, path: &Path) -> Result<(), String>;
}

impl<F> MediaIndexer for F
where
    F: Fn(&Path) -> Result<(), String> + Send,
{
    fn index(&self, path: &Path) -> Result<(), String> {
        self(path)
    }
}

/// Indexer that only records new files in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndexer;

impl MediaIndexer for LogIndexer {
    fn index(&self, path: &Path) -> Result<(), String> {
        debug!(path = %path.display(), "Indexed frame");
        Ok(())
    }
}

/// Flat directory of `pic_<slot>.jpg` files
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    /// Open (and create if needed) the output directory
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Output directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slots already holding a frame from an earlier session, sorted
    ///
    /// Temporary `.part` files and unrelated names are ignored.
    pub fn saved_slots(&self) -> io::Result<Vec<u32>> {
        let mut slots = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(slot) = entry.file_name().to_str().and_then(slot_from_file_name) {
                slots.push(slot);
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }
}

impl FrameStore for DirectoryStore {
    fn available_bytes(&self) -> io::Result<u64> {
        available_space(&self.dir)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!(".{}.part", name));

        // Replace atomically: readers see either the previous round's file
        // or the new one
        std::fs::write(&tmp_path, bytes)?;
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }
        Ok(path)
    }
}

/// Free space on the filesystem holding `path`, as seen by unprivileged users
#[cfg(unix)]
pub fn available_space(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs is plain-old-data, c_path is NUL-terminated and lives
    // for the duration of the call
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if result != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free space query is only implemented for unix",
    ))
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    files: BTreeMap<String, Vec<u8>>,
    write_log: Vec<String>,
}

/// In-memory frame store
///
/// Clones share the same contents, so a test can keep one handle while the
/// save worker owns another.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    available: u64,
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    /// Create a store that reports `available` free bytes
    pub fn new(available: u64) -> Self {
        Self {
            available,
            inner: Arc::new(Mutex::new(MemoryStoreInner::default())),
        }
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.files.get(name).cloned())
    }

    /// Number of distinct files held
    pub fn file_count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.files.len())
            .unwrap_or(0)
    }

    /// Every write in order, by file name
    pub fn write_log(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.write_log.clone())
            .unwrap_or_default()
    }
}

impl FrameStore for MemoryStore {
    fn available_bytes(&self) -> io::Result<u64> {
        Ok(self.available)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("memory store lock poisoned"))?;
        inner.files.insert(name.to_string(), bytes.to_vec());
        inner.write_log.push(name.to_string());
        Ok(PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_store_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(tmp.path().join("out")).unwrap();

        let path = store.write("pic_3.jpg", b"first").unwrap();
        assert_eq!(path, tmp.path().join("out").join("pic_3.jpg"));
        store.write("pic_3.jpg", b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        let entries: Vec<_> = std::fs::read_dir(store.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1, "no temporary files left behind");
    }

    #[test]
    fn test_directory_store_lists_saved_slots() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(tmp.path()).unwrap();
        assert!(store.saved_slots().unwrap().is_empty());

        store.write("pic_42.jpg", b"a").unwrap();
        store.write("pic_7.jpg", b"b").unwrap();
        std::fs::write(tmp.path().join(".pic_8.jpg.part"), b"c").unwrap();
        std::fs::write(tmp.path().join("pic_500.jpg"), b"d").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"e").unwrap();

        assert_eq!(store.saved_slots().unwrap(), vec![7, 42]);
    }

    #[test]
    fn test_directory_store_reports_space() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(tmp.path()).unwrap();
        assert!(store.available_bytes().unwrap() > 0);
    }

    #[test]
    fn test_memory_store_shares_contents() {
        let store = MemoryStore::new(1);
        let mut writer = store.clone();
        writer.write("pic_0.jpg", &[1, 2]).unwrap();
        writer.write("pic_0.jpg", &[3]).unwrap();

        assert_eq!(store.get("pic_0.jpg"), Some(vec![3]));
        assert_eq!(store.file_count(), 1);
        assert_eq!(store.write_log(), vec!["pic_0.jpg", "pic_0.jpg"]);
        assert_eq!(store.available_bytes().unwrap(), 1);
    }

    #[test]
    fn test_closure_indexer() {
        let indexer = |path: &Path| {
            if path.ends_with("pic_1.jpg") {
                Ok(())
            } else {
                Err("unexpected".to_string())
            }
        };
        assert!(indexer.index(Path::new("/tmp/pic_1.jpg")).is_ok());
        assert!(indexer.index(Path::new("/tmp/pic_2.jpg")).is_err());
    }
}

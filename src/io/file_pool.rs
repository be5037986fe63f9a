//! Reference-counted registry of open files keyed by file id. Handles are
//! shared; positional reads and writes never touch the file cursor, so
//! concurrent workers can use one handle safely. Refcounts are advisory
//! and only consulted for shutdown hygiene.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use parking_lot::RwLock;

use crate::errors::{ErrorCode, Result, Severity, VegoError};

/// One registered file. Borrowers hold an `Arc` but the pool stays the
/// owner of record.
#[derive(Debug)]
pub struct PooledFile {
    path: PathBuf,
    file: File,
    refs: AtomicU64,
}

impl PooledFile {
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn refcount(&self) -> u64 {
        self.refs.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePoolStats {
    pub files: usize,
    pub active_refs: u64,
}

#[derive(Debug, Default)]
pub struct FilePool {
    files: RwLock<HashMap<String, Arc<PooledFile>>>,
}

impl FilePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` read/write (creating it) under `file_id`. Registering
    /// the same id with the same path again is a no-op; a different path
    /// is an error.
    pub fn register(&self, file_id: &str, path: &Path) -> Result<()> {
        let mut files = self.files.write();
        if let Some(existing) = files.get(file_id) {
            if existing.path == path {
                return Ok(());
            }
            return Err(VegoError::invalid_argument(
                "pool.register",
                "file id already registered with a different path",
            )
            .with_context("file_id", file_id)
            .with_context("registered_path", existing.path.display().to_string())
            .with_context("requested_path", path.display().to_string()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                VegoError::io("pool.register", e)
                    .with_context("file_id", file_id)
                    .with_context("path", path.display().to_string())
            })?;
        files.insert(
            file_id.to_string(),
            Arc::new(PooledFile { path: path.to_path_buf(), file, refs: AtomicU64::new(0) }),
        );
        Ok(())
    }

    /// Borrow a handle, incrementing its refcount.
    pub fn get(&self, file_id: &str) -> Result<Arc<PooledFile>> {
        let files = self.files.read();
        let entry = files.get(file_id).ok_or_else(|| {
            VegoError::new(ErrorCode::FileNotRegistered, "pool.get", "file not registered")
                .with_context("file_id", file_id)
        })?;
        entry.refs.fetch_add(1, Ordering::SeqCst);
        Ok(entry.clone())
    }

    /// Return a handle, decrementing its refcount (clamped at zero).
    pub fn put(&self, file_id: &str) {
        let files = self.files.read();
        if let Some(entry) = files.get(file_id) {
            let _ = entry.refs.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
        }
    }

    /// Synonym used by external collaborators.
    pub fn get_file(&self, file_id: &str) -> Result<Arc<PooledFile>> {
        self.get(file_id)
    }

    /// Synonym used by external collaborators.
    pub fn release_file(&self, file_id: &str) {
        self.put(file_id);
    }

    /// Close every handle. Active references make this a warning, not a
    /// failure callers must unwind from.
    pub fn close(&self) -> Result<()> {
        let mut files = self.files.write();
        let busy: Vec<String> = files
            .iter()
            .filter(|(_, f)| f.refcount() > 0)
            .map(|(id, _)| id.clone())
            .collect();
        files.clear();
        if busy.is_empty() {
            Ok(())
        } else {
            warn!("file pool closed with active references: {busy:?}");
            Err(VegoError::new(
                ErrorCode::ValidationFailed,
                "pool.close",
                "closed while files were still referenced",
            )
            .with_severity(Severity::Warn)
            .with_context("file_ids", busy.join(",")))
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> FilePoolStats {
        let files = self.files.read();
        FilePoolStats {
            files: files.len(),
            active_refs: files.values().map(|f| f.refcount()).sum(),
        }
    }
}

#[cfg(unix)]
pub(crate) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
pub(crate) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

/// Fill `buf` from `offset`, stopping early only at end of file. Returns
/// the number of bytes actually read.
pub(crate) fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        match read_at(file, &mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(unix)]
pub(crate) fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, buf, offset)
}

#[cfg(windows)]
pub(crate) fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    let mut written = 0usize;
    while written < buf.len() {
        match std::os::windows::fs::FileExt::seek_write(file, &buf[written..], offset + written as u64) {
            Ok(0) => {
                return Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "short write"));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

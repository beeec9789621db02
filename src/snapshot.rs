// src/snapshot.rs

//! Change detection against a cached copy of the system status file
//!
//! Merging and rewriting the user status file is the only expensive step
//! of a sync, so a pass first checks whether the system database changed
//! since the last one. The check is an exact byte comparison done in
//! fixed-size windows that stops at the first difference.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Default comparison window (20 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 20 * 1024;

/// Chunked byte-for-byte comparison against a previous snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotComparator {
    chunk_size: usize,
}

impl Default for SnapshotComparator {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SnapshotComparator {
    /// Create a comparator with the given window size (at least one byte)
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Check whether `current` differs from the snapshot in `previous`
    ///
    /// The snapshot length is taken by seeking to its end. A length
    /// mismatch answers immediately without reading any content. A
    /// snapshot that ends before its declared length counts as different.
    pub fn differs<R: Read + Seek>(&self, current: &[u8], mut previous: R) -> io::Result<bool> {
        let previous_len = previous.seek(SeekFrom::End(0))?;
        if previous_len != current.len() as u64 {
            debug!(
                "Snapshot length {} differs from current length {}",
                previous_len,
                current.len()
            );
            return Ok(true);
        }

        previous.seek(SeekFrom::Start(0))?;
        let mut window = vec![0u8; self.chunk_size.min(current.len())];

        for (idx, expected) in current.chunks(self.chunk_size).enumerate() {
            let actual = &mut window[..expected.len()];
            match previous.read_exact(actual) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(true),
                Err(e) => return Err(e),
            }

            if actual != expected {
                debug!("Snapshot differs in chunk {}", idx);
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Owner of the previous-snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the snapshot for reading, or `None` if there is none yet
    pub fn open(&self) -> Result<Option<File>> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file(&self.path, e)),
        }
    }

    /// Write the first baseline snapshot
    pub fn establish(&self, contents: &[u8]) -> Result<()> {
        info!("Establishing baseline snapshot at {}", self.path.display());
        self.replace(contents)
    }

    /// Refresh the snapshot after a completed sync
    pub fn record(&self, contents: &[u8]) -> Result<()> {
        debug!("Recording snapshot at {}", self.path.display());
        self.replace(contents)
    }

    /// Atomically swap in new snapshot contents
    fn replace(&self, contents: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| Error::file(dir, e))?;
        staged.write_all(contents)?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .map_err(|e| Error::file(&self.path, e.error))?;

        Ok(())
    }
}

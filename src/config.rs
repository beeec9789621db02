// src/config.rs

//! Runtime configuration
//!
//! Built once at startup and handed to every component by reference.
//! Nothing in the library reads the process environment itself.

use crate::control::codec::DEFAULT_BATCH_SIZE;
use crate::snapshot::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;

/// System status file name inside the scratch directory
pub const SYSTEM_STATUS_FILE: &str = "root-status";

/// User status file name inside the scratch directory
pub const USER_STATUS_FILE: &str = "user-status";

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE: &str = "root-status.old";

/// dpkg package descriptor directory, relative to the chroot
pub const INFO_DIR: &str = "var/lib/dpkg/info";

/// Immutable settings for one sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Native dpkg architecture (e.g., "amd64")
    pub arch: String,
    /// Root of the user-scope chroot
    pub chroot: PathBuf,
    /// Directory holding the working copies of both status files
    pub scratch_dir: PathBuf,
    /// Directory holding the snapshot
    pub data_dir: PathBuf,
    /// Snapshot comparison window in bytes
    pub chunk_size: usize,
    /// Stanzas per write when dumping the merged database
    pub batch_size: usize,
}

impl Config {
    pub fn new(
        arch: impl Into<String>,
        chroot: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            arch: arch.into(),
            chroot: chroot.into(),
            scratch_dir: scratch_dir.into(),
            data_dir: data_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn system_status_path(&self) -> PathBuf {
        self.scratch_dir.join(SYSTEM_STATUS_FILE)
    }

    pub fn user_status_path(&self) -> PathBuf {
        self.scratch_dir.join(USER_STATUS_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn info_dir(&self) -> PathBuf {
        self.chroot.join(INFO_DIR)
    }
}

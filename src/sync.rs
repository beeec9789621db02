// src/sync.rs

//! End-to-end synchronization pass
//!
//! One pass reads the system status file, decides from the snapshot
//! whether anything changed, and if so rewrites the user status file in
//! place with the merged database:
//!
//! 1. No snapshot yet: the system file becomes the baseline, nothing else
//!    happens.
//! 2. Snapshot identical to the system file: nothing to do.
//! 3. Otherwise: parse both databases, collect owned packages from the
//!    chroot, merge, overwrite the user file and truncate it to the new
//!    length, then refresh the snapshot.

use crate::config::Config;
use crate::control::{self, Database, ParseMode};
use crate::error::{Error, Result};
use crate::reconcile::{MergeReport, OwnedSet, Reconciler};
use crate::snapshot::{SnapshotComparator, SnapshotStore};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

/// Knobs for a single pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Merge even when the snapshot matches
    pub force: bool,
    /// Compute the merge without writing anything
    pub dry_run: bool,
}

/// State of the system status file relative to the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// No snapshot has been taken yet
    Missing,
    Unchanged,
    Changed,
}

/// What a pass did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// First run: baseline snapshot written, no merge
    Bootstrapped,
    /// System database unchanged since the last pass
    Unchanged,
    /// User status file rewritten
    Merged(MergeReport),
    /// Dry run: merge computed but not written
    Planned(MergeReport),
}

/// Runs sync passes for one configuration
pub struct Synchronizer<'a> {
    config: &'a Config,
    snapshots: SnapshotStore,
    comparator: SnapshotComparator,
}

impl<'a> Synchronizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            snapshots: SnapshotStore::new(config.snapshot_path()),
            comparator: SnapshotComparator::new(config.chunk_size),
        }
    }

    /// Compare the system status file against the snapshot
    pub fn check(&self) -> Result<SnapshotStatus> {
        let system_raw = read_file(&self.config.system_status_path())?;
        self.compare(&system_raw)
    }

    /// Run one pass
    pub fn run(&self, options: &SyncOptions) -> Result<SyncOutcome> {
        let system_path = self.config.system_status_path();
        let system_raw = read_file(&system_path)?;

        match self.compare(&system_raw)? {
            SnapshotStatus::Missing => {
                self.snapshots.establish(&system_raw)?;
                return Ok(SyncOutcome::Bootstrapped);
            }
            SnapshotStatus::Unchanged if !options.force => {
                info!("System status unchanged since last sync");
                return Ok(SyncOutcome::Unchanged);
            }
            _ => {}
        }

        let system_text = std::str::from_utf8(&system_raw)
            .map_err(|_| Error::InvalidEncoding { path: system_path })?;
        let system = control::parse(system_text);

        let user_path = self.config.user_status_path();
        let mut user_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&user_path)
            .map_err(|e| Error::file(&user_path, e))?;
        let secondary = control::parse_reader(BufReader::new(&user_file), ParseMode::Permissive)
            .map_err(|e| match e {
                Error::Io(source) if source.kind() == io::ErrorKind::InvalidData => {
                    Error::InvalidEncoding {
                        path: user_path.clone(),
                    }
                }
                other => with_path(other, &user_path),
            })?;
        debug!(
            "Loaded {} system and {} user entries",
            system.len(),
            secondary.len()
        );

        let owned = OwnedSet::from_info_dir(&self.config.info_dir())?;
        let merge = Reconciler::new(&self.config.arch).reconcile(system, secondary, &owned);

        if options.dry_run {
            return Ok(SyncOutcome::Planned(merge.report));
        }

        let length = overwrite(&mut user_file, &merge.database, self.config.batch_size)
            .map_err(|e| with_path(e, &user_path))?;
        drop(user_file);
        info!("Rewrote {} ({} bytes)", user_path.display(), length);

        self.snapshots.record(&system_raw)?;
        Ok(SyncOutcome::Merged(merge.report))
    }

    fn compare(&self, system_raw: &[u8]) -> Result<SnapshotStatus> {
        let Some(previous) = self.snapshots.open()? else {
            return Ok(SnapshotStatus::Missing);
        };

        let differs = self
            .comparator
            .differs(system_raw, previous)
            .map_err(|e| Error::file(self.snapshots.path(), e))?;

        Ok(if differs {
            SnapshotStatus::Changed
        } else {
            SnapshotStatus::Unchanged
        })
    }
}

/// Rewrite `file` from the start and cut it to the written length
fn overwrite(file: &mut File, db: &Database, batch_size: usize) -> Result<u64> {
    file.seek(SeekFrom::Start(0))?;
    let written = control::write_database(file, db, batch_size)?;

    let end = file.stream_position()?;
    debug_assert_eq!(end, written, "stream position disagrees with bytes written");
    file.set_len(end)?;

    Ok(end)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::file(path, e))
}

fn with_path(err: Error, path: &Path) -> Error {
    match err {
        Error::Io(source) => Error::file(path, source),
        other => other,
    }
}

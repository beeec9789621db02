// src/lib.rs

//! status-sync
//!
//! Keeps a user-scope dpkg status database in step with the system one.
//! Packages installed in the user's chroot keep their own entries; every
//! other entry is taken verbatim from the system status file.
//!
//! # Architecture
//!
//! - `control`: order-preserving stanza container and control-file codec
//! - `snapshot`: cheap change detection against the last seen system file
//! - `reconcile`: ownership matching and the overlay merge
//! - `sync`: the end-to-end pass tying the pieces to files on disk

pub mod config;
pub mod control;
mod error;
pub mod reconcile;
pub mod snapshot;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use sync::{SnapshotStatus, SyncOptions, SyncOutcome, Synchronizer};

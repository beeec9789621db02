// src/reconcile.rs

//! Overlay merge of the user status database onto the system one
//!
//! The system database decides which entries exist and in what order.
//! For every system entry whose package is owned by the user scope, the
//! user database's entry replaces it in place. Nothing is inserted or
//! removed, so user-only packages with no system counterpart are dropped
//! from the merge and reported instead.

use crate::control::{Database, Stanza};
use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Field carrying the package name
pub const PACKAGE_FIELD: &str = "Package";

/// Field carrying the package architecture
pub const ARCHITECTURE_FIELD: &str = "Architecture";

/// Architecture of architecture-independent packages
pub const ARCH_ALL: &str = "all";

/// Identity of a stanza for matching: `name:architecture`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    name: String,
    architecture: String,
}

impl PackageKey {
    pub fn new(name: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: architecture.into(),
        }
    }

    /// Derive the key from a stanza's `Package` and `Architecture` fields
    ///
    /// Returns `None` when either field is missing.
    pub fn from_stanza(stanza: &Stanza) -> Option<Self> {
        Some(Self::new(
            stanza.field(PACKAGE_FIELD)?,
            stanza.field(ARCHITECTURE_FIELD)?,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.architecture)
    }
}

impl Serialize for PackageKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Package identifiers owned by the user scope
///
/// Holds bare names (`bash`) and fully-qualified tokens (`libc6:amd64`).
#[derive(Debug, Clone, Default)]
pub struct OwnedSet {
    ids: HashSet<String>,
}

impl OwnedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the file stems of a dpkg `info` directory
    ///
    /// `bash.list` contributes `bash`, `libc6:amd64.md5sums` contributes
    /// `libc6:amd64`.
    pub fn from_info_dir(path: &Path) -> Result<Self> {
        let entries = fs::read_dir(path).map_err(|e| Error::file(path, e))?;

        let mut owned = Self::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::file(path, e))?;
            let file_name = entry.file_name();
            if let Some(stem) = Path::new(&file_name).file_stem() {
                owned.insert(stem.to_string_lossy());
            }
        }

        debug!(
            "Found {} owned package identifiers in {}",
            owned.len(),
            path.display()
        );
        Ok(owned)
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether the package identified by `key` belongs to the user scope
    ///
    /// A bare name owns the native and `all` architectures; any other
    /// architecture needs the qualified token.
    pub fn owns(&self, key: &PackageKey, native_arch: &str) -> bool {
        let arch = key.architecture();
        if self.contains(key.name()) && (arch == ARCH_ALL || arch == native_arch) {
            return true;
        }
        self.contains(&key.to_string())
    }
}

impl<S: Into<String>> FromIterator<S> for OwnedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Summary of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Entries in the system database (and in the result)
    pub total: usize,
    /// System entries replaced by a user entry
    pub substituted: usize,
    /// Distinct owned entries in the user database
    pub owned: usize,
    /// Owned user entries with no system counterpart, sorted
    pub unmatched: Vec<PackageKey>,
}

/// Result of [`Reconciler::reconcile`]
#[derive(Debug)]
pub struct Merge {
    pub database: Database,
    pub report: MergeReport,
}

/// Overlay merge engine
#[derive(Debug, Clone)]
pub struct Reconciler {
    arch: String,
}

impl Reconciler {
    /// Create an engine for the given native architecture
    pub fn new(arch: impl Into<String>) -> Self {
        Self { arch: arch.into() }
    }

    /// Replace owned entries of `system` with their `secondary` versions
    ///
    /// Stanzas lacking `Package` or `Architecture` never match. When the
    /// user database lists a key twice, the later stanza wins.
    pub fn reconcile(&self, system: Database, secondary: Database, owned: &OwnedSet) -> Merge {
        let overlay = self.owned_entries(secondary, owned);

        let mut matched = HashSet::new();
        let mut substituted = 0;
        let mut database = Vec::with_capacity(system.len());
        for stanza in system {
            let replacement =
                PackageKey::from_stanza(&stanza).and_then(|key| overlay.get_key_value(&key));

            match replacement {
                Some((key, user_stanza)) => {
                    matched.insert(key);
                    substituted += 1;
                    database.push(user_stanza.clone());
                }
                None => database.push(stanza),
            }
        }

        let mut unmatched: Vec<PackageKey> = overlay
            .keys()
            .filter(|key| !matched.contains(key))
            .cloned()
            .collect();
        unmatched.sort();

        for key in &unmatched {
            warn!("Owned package {} is not in the system database; not merged", key);
        }

        let report = MergeReport {
            total: database.len(),
            substituted,
            owned: overlay.len(),
            unmatched,
        };
        info!(
            "Merged {} of {} entries from the user database",
            report.substituted, report.total
        );

        Merge { database, report }
    }

    /// Index the owned user stanzas by key, last one winning
    fn owned_entries(&self, secondary: Database, owned: &OwnedSet) -> HashMap<PackageKey, Stanza> {
        let mut overlay = HashMap::new();

        for stanza in secondary {
            match PackageKey::from_stanza(&stanza) {
                Some(key) if owned.owns(&key, &self.arch) => {
                    overlay.insert(key, stanza);
                }
                Some(_) => {}
                None => debug!("Ignoring user entry without package identity"),
            }
        }

        overlay
    }
}

//! # File-existence collaborator and its memoizing cache.
//!
//! Admission validates that an executable target is readable before spawning
//! a worker for it. The readability check itself is a host capability behind
//! the [`Probe`] trait; the cluster wraps it in a [`FileCache`] that probes
//! each distinct path at most once for the process lifetime.
//!
//! ## Rules
//! - Write-once per distinct path; never invalidated.
//! - Both outcomes are memoized: a path that probed unreadable stays
//!   unreadable for the life of the cluster.
//! - A failed probe never surfaces in a raw filesystem form; the admission
//!   boundary converts it to a parameter error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Host capability: can this path be read?
pub trait Probe: Send + Sync + 'static {
    /// Returns true if `path` refers to a readable file.
    fn accessible(&self, path: &Path) -> bool;
}

/// Default probe backed by the local filesystem.
#[derive(Debug, Default)]
pub struct FsProbe;

impl Probe for FsProbe {
    fn accessible(&self, path: &Path) -> bool {
        path.is_file() && std::fs::File::open(path).is_ok()
    }
}

/// Per-path memoizing wrapper around a [`Probe`].
///
/// Owned by the control loop; not shared, not locked.
pub(crate) struct FileCache {
    probe: Arc<dyn Probe>,
    seen: HashMap<PathBuf, bool>,
}

impl FileCache {
    pub(crate) fn new(probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            seen: HashMap::new(),
        }
    }

    /// Consults the cache; on miss, probes once and memoizes the outcome.
    pub(crate) fn accessible(&mut self, path: &Path) -> bool {
        if let Some(known) = self.seen.get(path) {
            return *known;
        }
        let ok = self.probe.accessible(path);
        self.seen.insert(path.to_path_buf(), ok);
        ok
    }
}

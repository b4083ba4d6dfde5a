//! Parsed-descriptor cache for the directory finder
//!
//! Entries are keyed by the canonical path of the descriptor file rather than
//! by module name, so the finder still visits every search path on a lookup
//! and its ambiguity check sees all candidate files. An entry is only reused
//! while the file's modification time is unchanged.

use crate::ModuleDescriptor;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

#[derive(Debug)]
struct Entry {
    descriptor: Arc<ModuleDescriptor>,
    modified: Option<SystemTime>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Entries {
    by_path: FxHashMap<PathBuf, Entry>,
    clock: u64,
}

/// Bounded, thread-safe map from descriptor file to parsed descriptor.
///
/// When full, the least recently used file is dropped.
#[derive(Debug)]
pub struct DescriptorCache {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl DescriptorCache {
    /// Create a cache holding at most `capacity` descriptors (0 means unbounded)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity,
        }
    }

    /// The descriptor parsed from `path`, if it was read at modification time
    /// `modified`
    pub fn get(&self, path: &Path, modified: Option<SystemTime>) -> Option<Arc<ModuleDescriptor>> {
        let mut entries = self.entries.lock();
        entries.clock += 1;
        let now = entries.clock;

        let entry = entries.by_path.get_mut(path)?;
        if entry.modified.is_some() && entry.modified == modified {
            entry.last_used = now;
            trace!("Reusing parsed descriptor {}", path.display());
            return Some(entry.descriptor.clone());
        }

        trace!("Descriptor {} changed on disk", path.display());
        entries.by_path.remove(path);
        None
    }

    /// Remember the descriptor parsed from `path` at modification time `modified`
    pub fn insert(&self, path: PathBuf, modified: Option<SystemTime>, descriptor: Arc<ModuleDescriptor>) {
        let mut entries = self.entries.lock();
        entries.clock += 1;
        let now = entries.clock;

        if self.capacity > 0
            && entries.by_path.len() >= self.capacity
            && !entries.by_path.contains_key(&path)
        {
            let oldest = entries
                .by_path
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                trace!("Dropping parsed descriptor {}", oldest.display());
                entries.by_path.remove(&oldest);
            }
        }

        entries.by_path.insert(
            path,
            Entry {
                descriptor,
                modified,
                last_used: now,
            },
        );
    }

    /// Number of descriptor files currently held
    pub fn len(&self) -> usize {
        self.entries.lock().by_path.len()
    }

    /// Whether the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

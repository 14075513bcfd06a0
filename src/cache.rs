//! Dataset cache injected into the pipeline.
//!
//! Entries are keyed by resolved path and never revalidated against the
//! file on disk; the update path bypasses the cache and invalidates the
//! entry it wrote.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use log::debug;

use crate::dataset::Dataset;

pub trait DatasetCache: Send + Sync {
    fn get(&self, path: &Path) -> Option<Arc<Dataset>>;
    fn put(&self, path: &Path, dataset: Arc<Dataset>);
    fn invalidate(&self, path: &Path);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<PathBuf, Arc<Dataset>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DatasetCache for MemoryCache {
    fn get(&self, path: &Path) -> Option<Arc<Dataset>> {
        let entries = self.entries.read().ok()?;
        let hit = entries.get(path).cloned();
        if hit.is_some() {
            debug!("Cache hit for {path:?}");
        }
        hit
    }

    fn put(&self, path: &Path, dataset: Arc<Dataset>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(path.to_path_buf(), dataset);
        }
    }

    fn invalidate(&self, path: &Path) {
        if let Ok(mut entries) = self.entries.write()
            && entries.remove(path).is_some()
        {
            debug!("Invalidated cached dataset for {path:?}");
        }
    }
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl DatasetCache for NoCache {
    fn get(&self, _path: &Path) -> Option<Arc<Dataset>> {
        None
    }

    fn put(&self, _path: &Path, _dataset: Arc<Dataset>) {}

    fn invalidate(&self, _path: &Path) {}
}

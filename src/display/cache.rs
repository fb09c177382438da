use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{PanelError, Result};

use super::icon::load_icon;

/// Default number of decoded icons kept in memory
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 64;

#[derive(Default)]
struct Entries {
    icons: HashMap<PathBuf, Arc<[u8]>>,
    order: VecDeque<PathBuf>,
}

/// Decoded key icons by source path.
///
/// Entries never change once inserted. When full, the oldest entry is evicted.
/// A capacity of 0 disables caching.
pub struct ImageCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_CACHE_CAPACITY)
    }
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, path: &Path) -> Option<Arc<[u8]>> {
        self.entries().icons.get(path).cloned()
    }

    /// Insert a decoded icon and return the cached copy.
    ///
    /// If the path is already cached the existing entry wins.
    pub fn insert(&self, path: &Path, icon: Vec<u8>) -> Arc<[u8]> {
        let icon: Arc<[u8]> = icon.into();
        if self.capacity == 0 {
            return icon;
        }

        let mut entries = self.entries();
        if let Some(existing) = entries.icons.get(path) {
            return existing.clone();
        }

        while entries.order.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                debug!("Evicting cached icon {:?}", oldest);
                entries.icons.remove(&oldest);
            }
        }
        entries.order.push_back(path.to_path_buf());
        entries.icons.insert(path.to_path_buf(), icon.clone());
        icon
    }

    pub fn len(&self) -> usize {
        self.entries().icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached icon for `path`, decoding the file on a miss
    pub async fn load(&self, path: &Path) -> Result<Arc<[u8]>> {
        if let Some(icon) = self.get(path) {
            debug!("Icon cache hit: {:?}", path);
            return Ok(icon);
        }

        let owned = path.to_path_buf();
        let icon = tokio::task::spawn_blocking(move || load_icon(&owned))
            .await
            .map_err(|e| PanelError::DeviceIo(format!("image decode task failed: {}", e)))??;
        Ok(self.insert(path, icon))
    }
}

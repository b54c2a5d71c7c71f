use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use crate::directory::{DirEntry, Directory};
use crate::tile::TileId;

/// Default number of decoded leaf directories kept by [`LruDirectoryCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Result of a directory cache lookup.
pub enum DirCacheResult {
    /// The directory was not found in the cache.
    NotCached,
    /// The tile was not found in the directory.
    NotFound,
    /// The tile was found in the directory.
    Found(DirEntry),
}

impl From<Option<&DirEntry>> for DirCacheResult {
    fn from(entry: Option<&DirEntry>) -> Self {
        match entry {
            Some(entry) => Self::Found(entry.clone()),
            None => Self::NotFound,
        }
    }
}

/// A cache for decoded leaf directories.
///
/// Keys are the byte offsets of directory blocks within the archive. The
/// root directories never pass through here; they stay resident in the
/// reader for the lifetime of the instance.
pub trait DirectoryCache {
    /// Gets a directory from the cache, using the offset as a key, and
    /// looks `tile_id` up in it.
    fn get_dir_entry(
        &self,
        offset: u64,
        tile_id: TileId,
    ) -> impl Future<Output = DirCacheResult> + Send;

    /// Inserts a directory into the cache, using the offset as a key.
    /// Note that the cache must be internally mutable.
    fn insert_dir(&self, offset: u64, directory: Directory) -> impl Future<Output = ()> + Send;
}

/// A cache that does not cache anything.
pub struct NoCache;

impl DirectoryCache for NoCache {
    #[inline]
    async fn get_dir_entry(&self, _offset: u64, _tile_id: TileId) -> DirCacheResult {
        DirCacheResult::NotCached
    }

    #[inline]
    async fn insert_dir(&self, _offset: u64, _directory: Directory) {}
}

/// A bounded least-recently-used directory cache.
///
/// The most recently touched key sits at the front of the recency list;
/// inserting past capacity evicts keys from the tail. Lookups promote
/// their key to the front.
pub struct LruDirectoryCache {
    inner: Arc<Mutex<LruInner>>,
}

struct LruInner {
    capacity: usize,
    directories: HashMap<u64, Directory>,
    /// Key recency, most recently used first.
    recency: VecDeque<u64>,
}

impl Default for LruDirectoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl LruDirectoryCache {
    /// Creates a cache holding at most `capacity` directories.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruInner {
                capacity: capacity.max(1),
                directories: HashMap::new(),
                recency: VecDeque::new(),
            })),
        }
    }

    /// Number of directories currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().directories.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `offset` is currently cached.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        self.lock().directories.contains_key(&offset)
    }

    /// Drops the directory cached at `offset`, if any.
    pub fn remove(&self, offset: u64) -> bool {
        let mut inner = self.lock();
        if inner.directories.remove(&offset).is_some() {
            inner.recency.retain(|&key| key != offset);
            true
        } else {
            false
        }
    }

    // Panic if the lock is poisoned is not something the user can handle
    #[expect(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, LruInner> {
        self.inner.lock().unwrap()
    }
}

impl LruInner {
    fn touch(&mut self, offset: u64) {
        if let Some(pos) = self.recency.iter().position(|&key| key == offset) {
            self.recency.remove(pos);
        }
        self.recency.push_front(offset);
    }

    fn insert(&mut self, offset: u64, directory: Directory) {
        self.directories.insert(offset, directory);
        self.touch(offset);
        while self.directories.len() > self.capacity {
            if let Some(oldest) = self.recency.pop_back() {
                self.directories.remove(&oldest);
            }
        }
    }
}

impl DirectoryCache for LruDirectoryCache {
    async fn get_dir_entry(&self, offset: u64, tile_id: TileId) -> DirCacheResult {
        let mut inner = self.lock();
        if inner.directories.contains_key(&offset) {
            inner.touch(offset);
            log::trace!("directory cache hit at offset {offset}");
            inner.directories[&offset].find_tile_id(tile_id.value()).into()
        } else {
            DirCacheResult::NotCached
        }
    }

    async fn insert_dir(&self, offset: u64, directory: Directory) {
        self.lock().insert(offset, directory);
    }
}

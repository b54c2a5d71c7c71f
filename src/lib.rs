#![doc = include_str!("../README.md")]

mod async_reader;
pub use async_reader::{AsyncBackend, AsyncS2PmTilesReader};

#[cfg(feature = "file-async")]
mod backend_file;
#[cfg(feature = "file-async")]
pub use backend_file::FileBackend;

#[cfg(feature = "http-async")]
mod backend_http;
#[cfg(feature = "http-async")]
pub use backend_http::HttpBackend;

mod backend_memory;
pub use backend_memory::MemoryBackend;

#[cfg(feature = "mmap-async-tokio")]
mod backend_mmap;
#[cfg(feature = "mmap-async-tokio")]
pub use backend_mmap::MmapBackend;

mod cache;
pub use cache::{
    DEFAULT_CACHE_CAPACITY, DirCacheResult, DirectoryCache, LruDirectoryCache, NoCache,
};

mod compression;

mod directory;
pub use directory::{DirEntry, Directory};

mod error;
pub use error::{S2PmtError, S2PmtResult};

mod header;
pub use header::{Compression, Flavor, Header, MAX_INITIAL_BYTES, TileType};

mod tile;
pub use tile::{Face, MAX_TILE_ID, MAX_ZOOM, PYRAMID_SIZE_BY_ZOOM, TileCoord, TileId};

mod varint;

#[cfg(feature = "write")]
mod writer;
#[cfg(feature = "write")]
pub use writer::{S2PmTilesStreamWriter, S2PmTilesWriter};

/// Re-export of crate exposed in our API to simplify dependency management
pub use bytes;
/// Re-export of crate exposed in our API to simplify dependency management
#[cfg(feature = "http-async")]
pub use reqwest;

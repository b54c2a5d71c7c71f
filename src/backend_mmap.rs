use std::io;
use std::path::Path;

use bytes::{Buf as _, Bytes};
use fmmap::tokio::{AsyncMmapFile, AsyncMmapFileExt as _, AsyncOptions};

use crate::async_reader::{AsyncBackend, AsyncS2PmTilesReader, clamped_range, ensure_exact_read};
use crate::cache::{DirectoryCache, NoCache};
use crate::error::{S2PmtError, S2PmtResult};

impl AsyncS2PmTilesReader<MmapBackend, NoCache> {
    /// Creates a new reader from a file path using the async mmap backend.
    ///
    /// Fails if the path does not exist or is an invalid archive.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> S2PmtResult<Self> {
        Self::new_with_cached_path(NoCache, path).await
    }
}

impl<C: DirectoryCache + Sync + Send> AsyncS2PmTilesReader<MmapBackend, C> {
    /// Creates a new cached reader from a file path using the async mmap
    /// backend.
    ///
    /// Fails if the path does not exist or is an invalid archive.
    pub async fn new_with_cached_path<P: AsRef<Path>>(cache: C, path: P) -> S2PmtResult<Self> {
        let backend = MmapBackend::try_from(path).await?;

        Self::try_from_cached_source(backend, cache).await
    }
}

/// Byte-range access over a memory-mapped archive file.
pub struct MmapBackend {
    file: AsyncMmapFile,
}

impl MmapBackend {
    /// Memory-maps the archive at `p`.
    pub async fn try_from<P: AsRef<Path>>(p: P) -> S2PmtResult<Self> {
        Ok(Self {
            file: AsyncMmapFile::open_with_options(p, AsyncOptions::new().read(true))
                .await
                .map_err(|_| S2PmtError::UnableToOpenMmapFile)?,
        })
    }
}

impl From<fmmap::error::Error> for S2PmtError {
    fn from(_: fmmap::error::Error) -> Self {
        Self::Reading(io::Error::from(io::ErrorKind::UnexpectedEof))
    }
}

impl AsyncBackend for MmapBackend {
    async fn read_exact(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        ensure_exact_read(self.read(offset, length).await?, length)
    }

    async fn read(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        let range = clamped_range(self.file.len(), offset, length);
        if range.is_empty() {
            return Ok(Bytes::new());
        }
        Ok(self.file.reader(range.start)?.copy_to_bytes(range.len()))
    }
}

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt as _, AsyncSeekExt as _};
use tokio::sync::Mutex;

use crate::async_reader::{AsyncBackend, AsyncS2PmTilesReader, ensure_exact_read};
use crate::cache::{DirectoryCache, NoCache};
use crate::error::{S2PmtError, S2PmtResult};

impl AsyncS2PmTilesReader<FileBackend, NoCache> {
    /// Creates a new reader from a file path using positioned reads.
    ///
    /// Fails if the path does not exist or is an invalid archive.
    pub async fn new_with_file_path<P: AsRef<Path>>(path: P) -> S2PmtResult<Self> {
        Self::new_with_cached_file_path(NoCache, path).await
    }
}

impl<C: DirectoryCache + Sync + Send> AsyncS2PmTilesReader<FileBackend, C> {
    /// Creates a new cached reader from a file path using positioned reads.
    ///
    /// Fails if the path does not exist or is an invalid archive.
    pub async fn new_with_cached_file_path<P: AsRef<Path>>(
        cache: C,
        path: P,
    ) -> S2PmtResult<Self> {
        let backend = FileBackend::try_from_path(path).await?;

        Self::try_from_cached_source(backend, cache).await
    }
}

/// Byte-range access over an archive file descriptor.
pub struct FileBackend {
    file: Mutex<File>,
}

impl FileBackend {
    /// Opens the archive at `path` for reading.
    pub async fn try_from_path<P: AsRef<Path>>(path: P) -> S2PmtResult<Self> {
        Ok(Self {
            file: Mutex::new(File::open(path).await?),
        })
    }
}

impl AsyncBackend for FileBackend {
    async fn read_exact(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        ensure_exact_read(self.read(offset, length).await?, length)
    }

    async fn read(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        let length = usize::try_from(length)
            .map_err(|_| S2PmtError::Reading(std::io::ErrorKind::UnexpectedEof.into()))?;
        let mut buffer = vec![0; length];
        let mut filled = 0;

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;
        while filled < buffer.len() {
            let n = file.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);

        Ok(Bytes::from(buffer))
    }
}

use bytes::Bytes;

use crate::async_reader::{AsyncBackend, clamped_range, ensure_exact_read};
use crate::error::S2PmtResult;

/// Byte-range access over an archive image held in memory.
pub struct MemoryBackend {
    buffer: Bytes,
}

impl MemoryBackend {
    /// Wraps an in-memory archive image.
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }
}

impl From<Vec<u8>> for MemoryBackend {
    fn from(buffer: Vec<u8>) -> Self {
        Self::new(buffer)
    }
}

impl From<Bytes> for MemoryBackend {
    fn from(buffer: Bytes) -> Self {
        Self::new(buffer)
    }
}

impl AsyncBackend for MemoryBackend {
    async fn read_exact(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        ensure_exact_read(self.read(offset, length).await?, length)
    }

    async fn read(&self, offset: u64, length: u64) -> S2PmtResult<Bytes> {
        Ok(self
            .buffer
            .slice(clamped_range(self.buffer.len(), offset, length)))
    }
}

use thiserror::Error;

use crate::header::Compression;

/// A specialized [`Result`] type for archive operations.
pub type S2PmtResult<T> = Result<T, S2PmtError>;

/// Errors that can occur while reading or writing archives.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum S2PmtError {
    /// The first bytes of the archive are neither the planar nor the cubic magic.
    #[error("Invalid magic number")]
    InvalidMagicNumber,
    /// The magic number was recognized, but the spec version is not supported.
    #[error("Unsupported archive spec version {0}")]
    UnsupportedSpecVersion(u8),
    /// The header is too short or otherwise unparseable.
    #[error("Invalid header")]
    InvalidHeader,
    /// The header carries a compression tag outside the known set.
    #[error("Invalid compression tag {0}")]
    InvalidCompression(u8),
    /// The requested compression algorithm is not available.
    #[error("Unsupported compression: {0:?}")]
    UnsupportedCompression(Compression),
    /// The header carries a tile type tag outside the known set.
    #[error("Invalid tile type tag {0}")]
    InvalidTileType(u8),
    /// Zoom is above the supported maximum, or x/y lies outside the zoom grid.
    #[error("Invalid tile coordinate")]
    InvalidCoordinate,
    /// A varint ran past its ten-byte maximum, indicating corruption.
    #[error("Varint is longer than ten bytes")]
    VarintOverflow,
    /// A directory block failed to decode.
    #[error("Invalid directory entry")]
    InvalidEntry,
    /// A leaf directory decoded to zero entries.
    #[error("Leaf directory contains no entries")]
    EmptyDirectory,
    /// A tile lookup walked through more than four directory levels.
    #[error("Directory traversal exceeded four levels")]
    DepthExceeded,
    /// A directory entry length does not fit in 32 bits.
    #[error("Directory entry field does not fit in 32 bits")]
    IndexEntryOverflow,
    /// The compressed metadata leaves no room for the root directories.
    #[error("Compressed metadata does not fit the archive prelude")]
    MetadataTooLarge,
    /// The metadata blob is not valid UTF-8.
    #[error("Metadata is not valid UTF-8")]
    InvalidMetadata(#[from] std::string::FromUtf8Error),
    /// A backend returned a different number of bytes than requested.
    #[error("Unexpected number of bytes returned [expected: {0}, received: {1}]")]
    UnexpectedNumberOfBytesReturned(usize, usize),
    /// An underlying I/O failure.
    #[error(transparent)]
    Reading(#[from] std::io::Error),
    /// The memory-mapped file could not be opened.
    #[cfg(feature = "mmap-async-tokio")]
    #[error("Unable to open mmap file")]
    UnableToOpenMmapFile,
    /// The server ignored the range request and replied with a full body.
    #[cfg(feature = "http-async")]
    #[error("Range requests unsupported")]
    RangeRequestsUnsupported,
    /// The server returned more bytes than the range request asked for.
    #[cfg(feature = "http-async")]
    #[error("HTTP response body is too long, Response {0}B > requested {1}B")]
    ResponseBodyTooLong(usize, usize),
    /// An HTTP transport failure.
    #[cfg(feature = "http-async")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The requested byte range could not be encoded as a header value.
    #[cfg(feature = "http-async")]
    #[error(transparent)]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}

use std::future::Future;

use bytes::Bytes;

use crate::cache::{DirCacheResult, DirectoryCache, NoCache};
use crate::compression::decompress_all;
use crate::directory::{DirEntry, Directory};
use crate::error::{S2PmtError, S2PmtResult};
use crate::header::{Flavor, Header, MAX_INITIAL_BYTES};
use crate::tile::{Face, TileCoord, TileId};

/// Maximum number of directory levels a lookup may traverse: the root
/// plus up to three levels of leaf fan-out.
const MAX_DIRECTORY_DEPTH: usize = 4;

/// A means of fetching byte ranges from an archive.
pub trait AsyncBackend {
    /// Reads exactly `length` bytes starting at `offset`.
    fn read_exact(
        &self,
        offset: u64,
        length: u64,
    ) -> impl Future<Output = S2PmtResult<Bytes>> + Send;

    /// Reads up to `length` bytes starting at `offset`; the result is
    /// shorter only when the archive ends inside the requested range.
    fn read(&self, offset: u64, length: u64) -> impl Future<Output = S2PmtResult<Bytes>> + Send;
}

/// Clamps a requested byte range to a source of `len` bytes, yielding the
/// addressable part.
pub(crate) fn clamped_range(len: usize, offset: u64, length: u64) -> std::ops::Range<usize> {
    let bound = len as u64;
    let start = offset.min(bound) as usize;
    let end = offset.saturating_add(length).min(bound) as usize;
    start..end
}

/// Checks that a permissive read actually returned `length` bytes.
pub(crate) fn ensure_exact_read(data: Bytes, length: u64) -> S2PmtResult<Bytes> {
    let expected = usize::try_from(length)
        .map_err(|_| S2PmtError::Reading(std::io::ErrorKind::UnexpectedEof.into()))?;
    if data.len() == expected {
        Ok(data)
    } else {
        Err(S2PmtError::UnexpectedNumberOfBytesReturned(
            expected,
            data.len(),
        ))
    }
}

/// An asynchronous archive reader for both the planar and cubic flavors.
///
/// The reader fetches the whole prelude once at construction and keeps
/// the decoded root directories resident; leaf directories are loaded on
/// demand through the directory cache.
pub struct AsyncS2PmTilesReader<B, C = NoCache> {
    backend: B,
    cache: C,
    header: Header,
    roots: [Directory; 6],
    /// Compressed metadata, sliced out of the prelude.
    metadata_bytes: Bytes,
}

impl<B: AsyncBackend + Sync + Send> AsyncS2PmTilesReader<B, NoCache> {
    /// Creates a new reader from a specified source and validates the
    /// archive prelude.
    ///
    /// Note: Prefer using `new_with_*` methods of the backends.
    pub async fn try_from_source(backend: B) -> S2PmtResult<Self> {
        Self::try_from_cached_source(backend, NoCache).await
    }
}

impl<B: AsyncBackend + Sync + Send, C: DirectoryCache + Sync + Send> AsyncS2PmTilesReader<B, C> {
    /// Creates a new reader with a directory cache from a specified
    /// source, and validates the archive prelude.
    pub async fn try_from_cached_source(backend: B, cache: C) -> S2PmtResult<Self> {
        let prelude = backend.read(0, MAX_INITIAL_BYTES as u64).await?;
        let header = Header::try_from_bytes(prelude.clone())?;

        let mut roots: [Directory; 6] = std::array::from_fn(|_| Directory::default());
        for &face in header_faces(&header) {
            let (offset, length) = header.root_range(face);
            let block = prelude_slice(&prelude, offset, length)?;
            let decompressed = decompress_all(header.internal_compression, &block)?;
            roots[face.index()] = Directory::try_from(Bytes::from(decompressed))?;
        }

        let metadata_bytes =
            prelude_slice(&prelude, header.metadata_offset, header.metadata_length)?;

        Ok(Self {
            backend,
            cache,
            header,
            roots,
            metadata_bytes,
        })
    }

    /// The decoded archive header.
    #[must_use]
    pub fn get_header(&self) -> &Header {
        &self.header
    }

    /// Decompresses and returns the metadata blob.
    ///
    /// By convention the blob contains a UTF-8 JSON object; only the
    /// UTF-8 part is enforced here.
    pub async fn get_metadata(&self) -> S2PmtResult<String> {
        let decompressed =
            decompress_all(self.header.internal_compression, &self.metadata_bytes)?;
        Ok(String::from_utf8(decompressed)?)
    }

    /// Fetches a face-0 tile and decompresses it with the archive's tile
    /// compression.
    ///
    /// Returns `None` when the coordinate addresses no tile.
    pub async fn get_tile(&self, coord: TileCoord) -> S2PmtResult<Option<Bytes>> {
        self.get_tile_s2(Face::Face0, coord).await
    }

    /// Fetches a tile from the given cube face and decompresses it with
    /// the archive's tile compression.
    ///
    /// On a planar archive only [`Face::Face0`] can resolve tiles; other
    /// faces report `None`.
    pub async fn get_tile_s2(&self, face: Face, coord: TileCoord) -> S2PmtResult<Option<Bytes>> {
        let Some(data) = self.get_tile_raw_s2(face, coord).await? else {
            return Ok(None);
        };
        let decompressed = decompress_all(self.header.tile_compression, &data)?;
        Ok(Some(Bytes::from(decompressed)))
    }

    /// Fetches a face-0 tile exactly as stored, without decompressing.
    pub async fn get_tile_raw(&self, coord: TileCoord) -> S2PmtResult<Option<Bytes>> {
        self.get_tile_raw_s2(Face::Face0, coord).await
    }

    /// Fetches a tile from the given cube face exactly as stored.
    pub async fn get_tile_raw_s2(
        &self,
        face: Face,
        coord: TileCoord,
    ) -> S2PmtResult<Option<Bytes>> {
        // Zoom levels the archive does not cover need no lookup at all.
        if coord.z() < self.header.min_zoom || coord.z() > self.header.max_zoom {
            return Ok(None);
        }
        let Some(entry) = self.find_tile_entry(face, coord.tile_id()).await? else {
            return Ok(None);
        };
        let data = self
            .backend
            .read_exact(self.header.data_offset + entry.offset, u64::from(entry.length))
            .await?;
        Ok(Some(data))
    }

    async fn find_tile_entry(&self, face: Face, tile_id: TileId) -> S2PmtResult<Option<DirEntry>> {
        // The root is resident; it never goes through the cache.
        let mut entry = self.roots[face.index()].find_tile_id(tile_id.value()).cloned();
        let (leaf_base, _) = self.header.leaf_range(face);

        let mut depth = 1;
        while let Some(needle) = entry {
            if !needle.is_leaf() {
                return Ok(Some(needle));
            }
            depth += 1;
            if depth > MAX_DIRECTORY_DEPTH {
                return Err(S2PmtError::DepthExceeded);
            }
            let offset = leaf_base + needle.offset;
            entry = match self.cache.get_dir_entry(offset, tile_id).await {
                DirCacheResult::Found(found) => Some(found),
                DirCacheResult::NotFound => None,
                DirCacheResult::NotCached => {
                    let directory = self.read_directory(offset, u64::from(needle.length)).await?;
                    let found = directory.find_tile_id(tile_id.value()).cloned();
                    self.cache.insert_dir(offset, directory).await;
                    found
                }
            };
        }
        Ok(None)
    }

    async fn read_directory(&self, offset: u64, length: u64) -> S2PmtResult<Directory> {
        let bytes = self.backend.read_exact(offset, length).await?;
        let decompressed = decompress_all(self.header.internal_compression, &bytes)?;
        let directory = Directory::try_from(Bytes::from(decompressed))?;
        if directory.is_empty() {
            return Err(S2PmtError::EmptyDirectory);
        }
        Ok(directory)
    }
}

fn header_faces(header: &Header) -> &'static [Face] {
    match header.flavor {
        Flavor::Planar => &Face::ALL[..1],
        Flavor::Cubic => &Face::ALL,
    }
}

fn prelude_slice(prelude: &Bytes, offset: u64, length: u64) -> S2PmtResult<Bytes> {
    let start = usize::try_from(offset).map_err(|_| S2PmtError::InvalidHeader)?;
    let end = start
        .checked_add(usize::try_from(length).map_err(|_| S2PmtError::InvalidHeader)?)
        .ok_or(S2PmtError::InvalidHeader)?;
    if end > prelude.len() {
        return Err(S2PmtError::InvalidHeader);
    }
    Ok(prelude.slice(start..end))
}

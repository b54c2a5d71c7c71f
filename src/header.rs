use std::io::Write;
use std::num::NonZeroU64;

use bytes::{Buf, Bytes};

use crate::error::{S2PmtError, S2PmtResult};
use crate::tile::Face;

/// Size of the fixed prelude region at the start of every archive.
///
/// The prelude holds the header, the root directory (or directories), and
/// the metadata blob, zero-padded to exactly this many bytes. The tile
/// data region always begins right behind it, so a reader can fetch
/// everything it needs to start resolving tiles in a single range request.
pub const MAX_INITIAL_BYTES: usize = 98_304;

/// Size of the planar header image.
pub(crate) const HEADER_SIZE: usize = 127;

/// Size of the cubic header: the planar image plus five root and five leaf
/// ranges for faces 1 through 5.
pub(crate) const S2_HEADER_SIZE: usize = 262;

const PLANAR_MAGIC: &[u8; 2] = b"PM";
const CUBIC_MAGIC: &[u8; 2] = b"S2";
const PLANAR_VERSION: u8 = 3;
const CUBIC_VERSION: u8 = 1;

/// Archive flavor: a single quadtree, or one quadtree per cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// One root directory covering a single quadtree.
    Planar,
    /// Six root directories, one per face of the cubed sphere.
    Cubic,
}

/// Compression applied to directories, metadata, or tile payloads.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum Compression {
    /// Unknown compression; neither direction is usable.
    Unknown = 0,
    /// No compression; the identity codec.
    None = 1,
    /// Gzip.
    Gzip = 2,
    /// Brotli.
    Brotli = 3,
    /// Zstandard.
    Zstd = 4,
}

impl TryFrom<u8> for Compression {
    type Error = S2PmtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::None),
            2 => Ok(Self::Gzip),
            3 => Ok(Self::Brotli),
            4 => Ok(Self::Zstd),
            v => Err(S2PmtError::InvalidCompression(v)),
        }
    }
}

impl From<Compression> for u8 {
    fn from(value: Compression) -> Self {
        value as Self
    }
}

/// Type of the tile payloads; stored in the header but never interpreted.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum TileType {
    /// Unknown payload type.
    Unknown = 0,
    /// Protobuf vector tiles.
    Pbf = 1,
    /// PNG raster tiles.
    Png = 2,
    /// JPEG raster tiles.
    Jpeg = 3,
    /// WebP raster tiles.
    Webp = 4,
    /// AVIF raster tiles.
    Avif = 5,
}

impl TryFrom<u8> for TileType {
    type Error = S2PmtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Pbf),
            2 => Ok(Self::Png),
            3 => Ok(Self::Jpeg),
            4 => Ok(Self::Webp),
            5 => Ok(Self::Avif),
            v => Err(S2PmtError::InvalidTileType(v)),
        }
    }
}

impl From<TileType> for u8 {
    fn from(value: TileType) -> Self {
        value as Self
    }
}

/// The fixed-size archive header.
///
/// All offsets are absolute byte positions in the file, except that
/// directory entries themselves hold offsets relative to the region the
/// header points them at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Which of the two archive flavors this header describes.
    pub flavor: Flavor,
    /// Spec version of the flavor (planar: 3, cubic: 1).
    pub version: u8,
    /// Offset of the face-0 root directory.
    pub root_offset: u64,
    /// Serialized length of the face-0 root directory.
    pub root_length: u64,
    /// Offset of the compressed metadata blob.
    pub metadata_offset: u64,
    /// Length of the compressed metadata blob.
    pub metadata_length: u64,
    /// Offset of the face-0 leaf directory region.
    pub leaf_offset: u64,
    /// Length of the face-0 leaf directory region.
    pub leaf_length: u64,
    /// Offset of the tile data region; always [`MAX_INITIAL_BYTES`].
    pub data_offset: u64,
    /// Length of the tile data region.
    pub data_length: u64,
    /// Total number of addressable tiles across all faces.
    pub n_addressed_tiles: Option<NonZeroU64>,
    /// Number of tile entries in the face-0 directories.
    pub n_tile_entries: Option<NonZeroU64>,
    /// Number of distinct tile payloads in the archive.
    pub n_tile_contents: Option<NonZeroU64>,
    /// Whether tiles were supplied in ascending tile-id order.
    pub clustered: bool,
    /// Compression of directories and metadata.
    pub internal_compression: Compression,
    /// Compression of tile payloads.
    pub tile_compression: Compression,
    /// Payload type of the tiles.
    pub tile_type: TileType,
    /// Lowest zoom level with tiles.
    pub min_zoom: u8,
    /// Highest zoom level with tiles.
    pub max_zoom: u8,
    /// Root directory ranges for faces 1..=5 (cubic only; `(offset, length)`).
    pub face_root_ranges: [(u64, u64); 5],
    /// Leaf directory ranges for faces 1..=5 (cubic only; `(offset, length)`).
    pub face_leaf_ranges: [(u64, u64); 5],
}

impl Header {
    pub(crate) fn new(
        flavor: Flavor,
        internal_compression: Compression,
        tile_compression: Compression,
        tile_type: TileType,
    ) -> Self {
        Self {
            flavor,
            version: match flavor {
                Flavor::Planar => PLANAR_VERSION,
                Flavor::Cubic => CUBIC_VERSION,
            },
            root_offset: 0,
            root_length: 0,
            metadata_offset: 0,
            metadata_length: 0,
            leaf_offset: 0,
            leaf_length: 0,
            data_offset: MAX_INITIAL_BYTES as u64,
            data_length: 0,
            n_addressed_tiles: None,
            n_tile_entries: None,
            n_tile_contents: None,
            clustered: true,
            internal_compression,
            tile_compression,
            tile_type,
            min_zoom: 0,
            max_zoom: 0,
            face_root_ranges: [(0, 0); 5],
            face_leaf_ranges: [(0, 0); 5],
        }
    }

    /// Serialized size of this header.
    #[must_use]
    pub fn size(&self) -> usize {
        match self.flavor {
            Flavor::Planar => HEADER_SIZE,
            Flavor::Cubic => S2_HEADER_SIZE,
        }
    }

    /// `(offset, length)` of the root directory for `face`.
    #[must_use]
    pub fn root_range(&self, face: Face) -> (u64, u64) {
        match face {
            Face::Face0 => (self.root_offset, self.root_length),
            f => self.face_root_ranges[f.index() - 1],
        }
    }

    /// `(offset, length)` of the leaf directory region for `face`.
    #[must_use]
    pub fn leaf_range(&self, face: Face) -> (u64, u64) {
        match face {
            Face::Face0 => (self.leaf_offset, self.leaf_length),
            f => self.face_leaf_ranges[f.index() - 1],
        }
    }

    pub(crate) fn set_root_range(&mut self, face: Face, offset: u64, length: u64) {
        match face {
            Face::Face0 => {
                self.root_offset = offset;
                self.root_length = length;
            }
            f => self.face_root_ranges[f.index() - 1] = (offset, length),
        }
    }

    pub(crate) fn set_leaf_range(&mut self, face: Face, offset: u64, length: u64) {
        match face {
            Face::Face0 => {
                self.leaf_offset = offset;
                self.leaf_length = length;
            }
            f => self.face_leaf_ranges[f.index() - 1] = (offset, length),
        }
    }

    /// Decodes a header from the start of the prelude.
    ///
    /// The magic number selects the flavor; an unrecognized magic or an
    /// unknown spec version for a recognized magic is an error.
    pub fn try_from_bytes(bytes: Bytes) -> S2PmtResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(S2PmtError::InvalidHeader);
        }
        let flavor = if &bytes[0..2] == CUBIC_MAGIC {
            Flavor::Cubic
        } else if &bytes[0..2] == PLANAR_MAGIC {
            Flavor::Planar
        } else {
            return Err(S2PmtError::InvalidMagicNumber);
        };
        let version = bytes[7];
        match (flavor, version) {
            (Flavor::Planar, PLANAR_VERSION) | (Flavor::Cubic, CUBIC_VERSION) => {}
            _ => return Err(S2PmtError::UnsupportedSpecVersion(version)),
        }
        if flavor == Flavor::Cubic && bytes.len() < S2_HEADER_SIZE {
            return Err(S2PmtError::InvalidHeader);
        }

        let mut buf = bytes.slice(8..);
        let mut header = Self {
            flavor,
            version,
            root_offset: buf.get_u64_le(),
            root_length: buf.get_u64_le(),
            metadata_offset: buf.get_u64_le(),
            metadata_length: buf.get_u64_le(),
            leaf_offset: buf.get_u64_le(),
            leaf_length: buf.get_u64_le(),
            data_offset: buf.get_u64_le(),
            data_length: buf.get_u64_le(),
            n_addressed_tiles: NonZeroU64::new(buf.get_u64_le()),
            n_tile_entries: NonZeroU64::new(buf.get_u64_le()),
            n_tile_contents: NonZeroU64::new(buf.get_u64_le()),
            clustered: buf.get_u8() == 1,
            internal_compression: buf.get_u8().try_into()?,
            tile_compression: buf.get_u8().try_into()?,
            tile_type: buf.get_u8().try_into()?,
            min_zoom: buf.get_u8(),
            max_zoom: buf.get_u8(),
            face_root_ranges: [(0, 0); 5],
            face_leaf_ranges: [(0, 0); 5],
        };

        if flavor == Flavor::Cubic {
            let mut buf = bytes.slice(102..);
            for range in &mut header.face_root_ranges {
                *range = (buf.get_u64_le(), buf.get_u64_le());
            }
            for range in &mut header.face_leaf_ranges {
                *range = (buf.get_u64_le(), buf.get_u64_le());
            }
        }

        Ok(header)
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self.flavor {
            Flavor::Planar => writer.write_all(PLANAR_MAGIC)?,
            Flavor::Cubic => writer.write_all(CUBIC_MAGIC)?,
        }
        writer.write_all(&[0_u8; 5])?;
        writer.write_all(&[self.version])?;
        let counter = |v: Option<NonZeroU64>| v.map_or(0, NonZeroU64::get);
        for value in [
            self.root_offset,
            self.root_length,
            self.metadata_offset,
            self.metadata_length,
            self.leaf_offset,
            self.leaf_length,
            self.data_offset,
            self.data_length,
            counter(self.n_addressed_tiles),
            counter(self.n_tile_entries),
            counter(self.n_tile_contents),
        ] {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.write_all(&[
            u8::from(self.clustered),
            self.internal_compression.into(),
            self.tile_compression.into(),
            self.tile_type.into(),
            self.min_zoom,
            self.max_zoom,
        ])?;
        match self.flavor {
            // bytes 102..127 are reserved
            Flavor::Planar => writer.write_all(&[0_u8; HEADER_SIZE - 102])?,
            Flavor::Cubic => {
                for (offset, length) in self.face_root_ranges {
                    writer.write_all(&offset.to_le_bytes())?;
                    writer.write_all(&length.to_le_bytes())?;
                }
                for (offset, length) in self.face_leaf_ranges {
                    writer.write_all(&offset.to_le_bytes())?;
                    writer.write_all(&length.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }
}

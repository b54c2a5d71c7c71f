use std::fmt::{Debug, Formatter};
use std::io::Write;

use bytes::{Buf, Bytes};
use varint_rs::VarintWriter as _;

use crate::error::{S2PmtError, S2PmtResult};
use crate::header::Compression;
use crate::{compression, varint};

/// An entry in a root or leaf directory.
///
/// Tile entries (`run_length >= 1`) locate a payload within the tile data
/// region; leaf pointers (`run_length == 0`) locate a leaf directory
/// within the leaf directory region of their face.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Tile id of the first tile covered by this entry.
    pub tile_id: u64,
    /// Byte offset relative to the region this entry points into.
    pub offset: u64,
    /// Byte length of the payload or leaf block.
    pub length: u32,
    /// Number of consecutive tile ids sharing the payload; `0` marks a
    /// leaf pointer.
    pub run_length: u32,
}

impl DirEntry {
    pub(crate) fn is_leaf(&self) -> bool {
        self.run_length == 0
    }
}

/// An ordered list of entries, sorted by ascending tile id.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<DirEntry>,
}

impl Debug for Directory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Directory [entries: {}]", self.entries.len()))
    }
}

impl Directory {
    pub(crate) fn from_entries(entries: Vec<DirEntry>) -> Self {
        Self { entries }
    }

    pub(crate) fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the entry responsible for `tile_id`.
    ///
    /// Returns the entry whose run covers the id, or the leaf pointer
    /// under which the id would be filed. Leaf pointers must be resolved
    /// by the caller; a `None` means the tile is not in this directory.
    #[must_use]
    pub fn find_tile_id(&self, tile_id: u64) -> Option<&DirEntry> {
        match self.entries.binary_search_by(|e| e.tile_id.cmp(&tile_id)) {
            Ok(idx) => self.entries.get(idx),
            Err(0) => None,
            Err(next) => {
                let previous = self.entries.get(next - 1)?;
                if previous.is_leaf() || tile_id - previous.tile_id < u64::from(previous.run_length)
                {
                    Some(previous)
                } else {
                    None
                }
            }
        }
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_entries_to(&self.entries, writer)
    }
}

/// Serializes entries columnar: count, tile-id deltas, run lengths,
/// lengths, then offsets with the `+1` sentinel.
pub(crate) fn write_entries_to<W: Write>(
    entries: &[DirEntry],
    writer: &mut W,
) -> std::io::Result<()> {
    writer.write_usize_varint(entries.len())?;

    let mut last_id = 0;
    for entry in entries {
        writer.write_u64_varint(entry.tile_id - last_id)?;
        last_id = entry.tile_id;
    }

    for entry in entries {
        writer.write_u32_varint(entry.run_length)?;
    }

    for entry in entries {
        writer.write_u32_varint(entry.length)?;
    }

    let mut previous: Option<&DirEntry> = None;
    for entry in entries {
        if let Some(p) = previous
            && entry.offset == p.offset + u64::from(p.length)
        {
            writer.write_u64_varint(0)?;
        } else {
            writer.write_u64_varint(entry.offset + 1)?;
        }
        previous = Some(entry);
    }

    Ok(())
}

/// Serializes entries and applies the internal compression.
pub(crate) fn serialize_entries(
    entries: &[DirEntry],
    internal_compression: Compression,
) -> S2PmtResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(entries.len() * 8 + 8);
    write_entries_to(entries, &mut buf)?;
    compression::compress_all(internal_compression, &buf)
}

impl TryFrom<Bytes> for Directory {
    type Error = S2PmtError;

    fn try_from(buffer: Bytes) -> Result<Self, Self::Error> {
        let mut buffer = buffer;
        let n_entries = varint::read_usize(&mut buffer)?;

        // Every entry spends at least one byte in each of the four columns.
        if n_entries > buffer.remaining() / 4 {
            return Err(S2PmtError::InvalidEntry);
        }

        let mut entries = vec![DirEntry::default(); n_entries];

        let mut next_tile_id = 0;
        for entry in &mut entries {
            next_tile_id += varint::read_u64(&mut buffer)?;
            entry.tile_id = next_tile_id;
        }

        for entry in &mut entries {
            entry.run_length = varint::read_u32(&mut buffer)?;
        }

        for entry in &mut entries {
            entry.length = varint::read_u32(&mut buffer)?;
        }

        let mut previous: Option<(u64, u32)> = None;
        for entry in &mut entries {
            let offset = varint::read_u64(&mut buffer)?;
            entry.offset = match (offset, previous) {
                (0, Some((prev_offset, prev_length))) => prev_offset + u64::from(prev_length),
                (0, None) => return Err(S2PmtError::InvalidEntry),
                (v, _) => v - 1,
            };
            previous = Some((entry.offset, entry.length));
        }

        Ok(Self { entries })
    }
}

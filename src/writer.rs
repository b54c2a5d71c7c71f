use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::BuildHasherDefault;
use std::io::{BufWriter, Seek, Write};
use std::num::NonZeroU64;

use countio::Counter;
use log::debug;
use twox_hash::XxHash3_64;

use crate::compression::compress_all;
use crate::directory::{DirEntry, serialize_entries};
use crate::error::{S2PmtError, S2PmtResult};
use crate::header::{Compression, Flavor, Header, MAX_INITIAL_BYTES, TileType};
use crate::tile::{Face, TileCoord};

/// First leaf chunk size tried when the root directory overflows its
/// prelude budget; doubled until the root fits.
const INITIAL_LEAF_SIZE: usize = 4096;

/// Smallest workable root budget; below this the metadata has eaten the
/// prelude.
const MIN_ROOT_BUDGET: usize = 512;

/// Builder for creating a new writer.
pub struct S2PmTilesWriter {
    internal_compression: Compression,
    tile_compression: Compression,
    tile_type: TileType,
    metadata: String,
}

struct TileLocation {
    offset: u64,
    length: u32,
}

/// Streaming archive writer.
///
/// Tiles are deduplicated as they arrive and appended behind the reserved
/// prelude; directories and the header are laid down by
/// [`finalize`](Self::finalize).
pub struct S2PmTilesStreamWriter<W: Write + Seek> {
    out: Counter<BufWriter<W>>,
    header: Header,
    metadata: String,
    entries: [Vec<DirEntry>; 6],

    /// The number of addressable tiles in this archive, across all faces.
    n_addressed_tiles: u64,

    /// A map of tile content locations by the hash of their stored bytes.
    /// Use `len()` to get the number of distinct tile contents.
    tile_content_map: HashMap<u64, TileLocation, BuildHasherDefault<XxHash3_64>>,

    prev_written_tile_offset: u64,
    zoom_range: Option<(u8, u8)>,
}

impl S2PmTilesWriter {
    /// Create a new writer with default values.
    #[must_use]
    pub fn new(tile_type: TileType) -> Self {
        let tile_compression = match tile_type {
            TileType::Pbf => Compression::Gzip,
            _ => Compression::None,
        };
        Self {
            internal_compression: Compression::Gzip,
            tile_compression,
            tile_type,
            metadata: "{}".to_string(),
        }
    }

    /// Set the compression for metadata and directories.
    #[must_use]
    pub fn internal_compression(mut self, compression: Compression) -> Self {
        self.internal_compression = compression;
        self
    }

    /// Set the compression for tile data.
    #[must_use]
    pub fn tile_compression(mut self, compression: Compression) -> Self {
        self.tile_compression = compression;
        self
    }

    /// Set the metadata, which must contain a valid JSON object.
    #[must_use]
    pub fn metadata(mut self, metadata: &str) -> Self {
        self.metadata = metadata.to_string();
        self
    }

    /// Create a new planar archive writer.
    pub fn create<W: Write + Seek>(self, writer: W) -> S2PmtResult<S2PmTilesStreamWriter<W>> {
        self.create_with_flavor(Flavor::Planar, writer)
    }

    /// Create a new cubic archive writer addressing all six faces.
    pub fn create_s2<W: Write + Seek>(self, writer: W) -> S2PmtResult<S2PmTilesStreamWriter<W>> {
        self.create_with_flavor(Flavor::Cubic, writer)
    }

    fn create_with_flavor<W: Write + Seek>(
        self,
        flavor: Flavor,
        writer: W,
    ) -> S2PmtResult<S2PmTilesStreamWriter<W>> {
        let mut out = Counter::new(BufWriter::new(writer));

        // We use the following layout:
        // +---------------------------------+-----------+------------------+
        // |             prelude             |           |                  |
        // | Header | Root Dir(s) | Metadata | Tile Data | Leaf Directories |
        // |        (zero-padded to 96 KiB)  |           |                  |
        // +---------------------------------+-----------+------------------+
        // This allows writing without temporary files. But it requires Seek
        // support, since the prelude contents are only known at the end.

        // Reserve the prelude; tile data lands directly behind it.
        out.write_all(&vec![0_u8; MAX_INITIAL_BYTES])?;

        let header = Header::new(
            flavor,
            self.internal_compression,
            self.tile_compression,
            self.tile_type,
        );

        Ok(S2PmTilesStreamWriter {
            out,
            header,
            metadata: self.metadata,
            entries: std::array::from_fn(|_| Vec::new()),
            n_addressed_tiles: 0,
            tile_content_map: HashMap::default(),
            prev_written_tile_offset: 0,
            zoom_range: None,
        })
    }
}

impl<W: Write + Seek> S2PmTilesStreamWriter<W> {
    /// Add a face-0 tile to the writer.
    ///
    /// Tiles are deduplicated and written to output.
    /// The tile id generated from `z/x/y` should be increasing for best
    /// read performance.
    pub fn add_tile(&mut self, coord: TileCoord, data: &[u8]) -> S2PmtResult<()> {
        self.add_tile_inner(Face::Face0, coord, data, self.header.tile_compression)
    }

    /// Add a pre-compressed face-0 tile to the writer.
    ///
    /// Use this method only if you want to manage the compression aspects
    /// before storing the tile. Otherwise, you should use
    /// [`add_tile`](Self::add_tile) instead.
    pub fn add_raw_tile(&mut self, coord: TileCoord, data: &[u8]) -> S2PmtResult<()> {
        self.add_tile_inner(Face::Face0, coord, data, Compression::None)
    }

    /// Add a tile on the given cube face to the writer.
    ///
    /// Only cubic writers address faces beyond [`Face::Face0`].
    pub fn add_tile_s2(&mut self, face: Face, coord: TileCoord, data: &[u8]) -> S2PmtResult<()> {
        if self.header.flavor == Flavor::Planar && face != Face::Face0 {
            return Err(S2PmtError::InvalidCoordinate);
        }
        self.add_tile_inner(face, coord, data, self.header.tile_compression)
    }

    /// Add a pre-compressed tile on the given cube face to the writer.
    pub fn add_raw_tile_s2(
        &mut self,
        face: Face,
        coord: TileCoord,
        data: &[u8],
    ) -> S2PmtResult<()> {
        if self.header.flavor == Flavor::Planar && face != Face::Face0 {
            return Err(S2PmtError::InvalidCoordinate);
        }
        self.add_tile_inner(face, coord, data, Compression::None)
    }

    fn add_tile_inner(
        &mut self,
        face: Face,
        coord: TileCoord,
        data: &[u8],
        tile_compression: Compression,
    ) -> S2PmtResult<()> {
        if data.is_empty() {
            // Ignore empty tiles, since the format cannot address them
            return Ok(());
        }

        let tile_id = coord.tile_id().value();

        // Deduplication works on the stored bytes, so compress first.
        let stored = compress_all(tile_compression, data)?;
        let tile_hash: u64 = XxHash3_64::oneshot(&stored);

        self.n_addressed_tiles += 1;
        self.zoom_range = Some(match self.zoom_range {
            None => (coord.z(), coord.z()),
            Some((lo, hi)) => (lo.min(coord.z()), hi.max(coord.z())),
        });

        // If the tile id is not in order, mark the archive as unclustered
        if let Some(last) = self.entries[face.index()].last()
            && tile_id < last.tile_id
        {
            self.header.clustered = false;
        }

        // Based on the tile hash, either get the existing location or write
        // the stored bytes to the archive
        let location = match self.tile_content_map.entry(tile_hash) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let offset = self.prev_written_tile_offset;
                self.out.write_all(&stored)?;
                self.prev_written_tile_offset += stored.len() as u64;
                e.insert(TileLocation {
                    offset,
                    length: into_u32(stored.len())?,
                })
            }
        };

        // If the payload repeats at the next consecutive id, extend the run
        if let Some(last) = self.entries[face.index()].last_mut()
            && last.tile_id + u64::from(last.run_length) == tile_id
            && last.offset == location.offset
        {
            last.run_length += 1;
            return Ok(());
        }

        self.entries[face.index()].push(DirEntry {
            tile_id,
            offset: location.offset,
            length: location.length,
            run_length: 1, // Will be increased by following identical tiles
        });

        Ok(())
    }

    /// Finish writing the archive and return the underlying writer.
    pub fn finalize(mut self) -> S2PmtResult<W> {
        // All tile payloads are on disk; the data region length is final.
        self.header.data_length =
            self.out.writer_bytes() as u64 - MAX_INITIAL_BYTES as u64;

        if let Some((lo, hi)) = self.zoom_range {
            self.header.min_zoom = lo;
            self.header.max_zoom = hi;
        }

        for face_entries in &mut self.entries {
            normalize_entries(face_entries);
        }

        self.header.n_addressed_tiles = NonZeroU64::new(self.n_addressed_tiles);
        self.header.n_tile_entries = NonZeroU64::new(self.entries[0].len() as u64);
        self.header.n_tile_contents = NonZeroU64::new(self.tile_content_map.len() as u64);

        // Metadata shares the prelude with the root directories.
        let metadata = compress_all(
            self.header.internal_compression,
            self.metadata.as_bytes(),
        )?;

        let faces: &[Face] = match self.header.flavor {
            Flavor::Planar => &Face::ALL[..1],
            Flavor::Cubic => &Face::ALL,
        };
        let budget = root_budget(self.header.flavor, self.header.size(), metadata.len())?;

        // Partition each face, appending its leaf block behind the tiles.
        let mut roots: Vec<Vec<u8>> = Vec::with_capacity(faces.len());
        for &face in faces {
            let face_entries = std::mem::take(&mut self.entries[face.index()]);
            let (root, leaves) =
                optimize_directories(&face_entries, self.header.internal_compression, budget)?;
            if !leaves.is_empty() {
                let leaf_offset = self.out.writer_bytes() as u64;
                let mut leaf_length = 0_u64;
                for leaf in &leaves {
                    self.out.write_all(leaf)?;
                    leaf_length += leaf.len() as u64;
                }
                self.header.set_leaf_range(face, leaf_offset, leaf_length);
            }
            roots.push(root);
        }

        // Lay out the prelude left to right: header, roots in face order,
        // then metadata; the remainder stays zero.
        let mut cursor = self.header.size() as u64;
        for (face, root) in faces.iter().zip(&roots) {
            self.header.set_root_range(*face, cursor, root.len() as u64);
            cursor += root.len() as u64;
        }
        self.header.metadata_offset = cursor;
        self.header.metadata_length = metadata.len() as u64;

        let mut prelude = Vec::with_capacity(MAX_INITIAL_BYTES);
        self.header.write_to(&mut prelude)?;
        for root in &roots {
            prelude.extend_from_slice(root);
        }
        prelude.extend_from_slice(&metadata);
        prelude.resize(MAX_INITIAL_BYTES, 0);

        debug!(
            "committing archive: {} addressed tiles, {} contents, prelude {} of {} bytes used",
            self.n_addressed_tiles,
            self.tile_content_map.len(),
            cursor + metadata.len() as u64,
            MAX_INITIAL_BYTES
        );

        // Patch the reserved prelude in place.
        self.out.rewind()?;
        self.out.write_all(&prelude)?;
        self.out.flush()?;

        self.out
            .into_inner()
            .into_inner()
            .map_err(|e| S2PmtError::Reading(e.into_error()))
    }
}

/// Sorts a face's entries and restores the directory invariants: one
/// entry per tile id (last writer wins) and no adjacent mergeable runs.
fn normalize_entries(entries: &mut Vec<DirEntry>) {
    entries.sort_by_key(|e| e.tile_id);
    entries.dedup_by(|current, previous| {
        if current.tile_id == previous.tile_id {
            *previous = current.clone();
            true
        } else {
            false
        }
    });
    entries.dedup_by(|current, previous| {
        if !current.is_leaf()
            && !previous.is_leaf()
            && previous.tile_id + u64::from(previous.run_length) == current.tile_id
            && previous.offset == current.offset
            && previous.length == current.length
        {
            previous.run_length += current.run_length;
            true
        } else {
            false
        }
    });
}

fn root_budget(flavor: Flavor, header_size: usize, metadata_len: usize) -> S2PmtResult<usize> {
    let available = MAX_INITIAL_BYTES
        .checked_sub(header_size)
        .and_then(|rest| rest.checked_sub(metadata_len))
        .ok_or(S2PmtError::MetadataTooLarge)?;
    let budget = match flavor {
        Flavor::Planar => available,
        // all six roots share the prelude, so each face gets a sixth
        Flavor::Cubic => available / 6,
    };
    if budget < MIN_ROOT_BUDGET {
        return Err(S2PmtError::MetadataTooLarge);
    }
    Ok(budget)
}

/// Serializes `entries` as a single root if it fits `target_root_len`,
/// otherwise splits them into leaf chunks, doubling the chunk size until
/// the root of leaf pointers fits.
///
/// Returns the compressed root block and the compressed leaf blocks in
/// entry order; leaf pointer offsets are relative to the start of the
/// face's leaf block.
fn optimize_directories(
    entries: &[DirEntry],
    internal_compression: Compression,
    target_root_len: usize,
) -> S2PmtResult<(Vec<u8>, Vec<Vec<u8>>)> {
    let root = serialize_entries(entries, internal_compression)?;
    if root.len() < target_root_len {
        return Ok((root, Vec::new()));
    }
    debug!(
        "root of {} entries is {} bytes, over the {target_root_len} byte budget; splitting into leaves",
        entries.len(),
        root.len(),
    );

    let mut leaf_size = INITIAL_LEAF_SIZE;
    loop {
        let mut root_entries = Vec::with_capacity(entries.len() / leaf_size + 1);
        let mut leaves = Vec::with_capacity(entries.len() / leaf_size + 1);
        let mut offset = 0_u64;
        for chunk in entries.chunks(leaf_size) {
            let leaf = serialize_entries(chunk, internal_compression)?;
            root_entries.push(DirEntry {
                tile_id: chunk[0].tile_id,
                offset,
                length: into_u32(leaf.len())?,
                run_length: 0,
            });
            offset += leaf.len() as u64;
            leaves.push(leaf);
        }
        let root = serialize_entries(&root_entries, internal_compression)?;
        if root.len() < target_root_len {
            return Ok((root, leaves));
        }
        leaf_size *= 2;
    }
}

fn into_u32(v: usize) -> S2PmtResult<u32> {
    v.try_into().map_err(|_| S2PmtError::IndexEntryOverflow)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::num::NonZeroU64;

    use super::*;
    use crate::backend_memory::MemoryBackend;
    use crate::async_reader::AsyncS2PmTilesReader;
    use crate::header::{HEADER_SIZE, S2_HEADER_SIZE};

    fn memory_writer(tile_type: TileType) -> S2PmTilesWriter {
        S2PmTilesWriter::new(tile_type)
            .internal_compression(Compression::None)
            .tile_compression(Compression::None)
    }

    fn coord(z: u8, x: u64, y: u64) -> TileCoord {
        TileCoord::new(z, x, y).unwrap()
    }

    async fn open(
        buffer: Vec<u8>,
    ) -> AsyncS2PmTilesReader<MemoryBackend, crate::cache::NoCache> {
        AsyncS2PmTilesReader::try_from_source(MemoryBackend::from(buffer))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn single_tile_planar_archive() {
        let mut writer = memory_writer(TileType::Pbf)
            .metadata(r#"{"metadata":true}"#)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_tile(coord(0, 0, 0), b"hello world").unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        let header = reader.get_header();
        assert_eq!(header.flavor, Flavor::Planar);
        assert_eq!(header.version, 3);
        assert_eq!(header.root_offset, HEADER_SIZE as u64);
        assert_eq!(header.root_length, 5);
        assert_eq!(header.metadata_offset, 132);
        assert_eq!(header.metadata_length, 17);
        assert_eq!(header.data_offset, MAX_INITIAL_BYTES as u64);
        assert_eq!(header.data_length, 11);
        assert_eq!(header.leaf_length, 0);
        assert_eq!(header.n_addressed_tiles, NonZeroU64::new(1));
        assert_eq!(header.n_tile_entries, NonZeroU64::new(1));
        assert_eq!(header.n_tile_contents, NonZeroU64::new(1));
        assert!(header.clustered);
        assert_eq!(header.min_zoom, 0);
        assert_eq!(header.max_zoom, 0);

        assert_eq!(
            reader.get_tile(coord(0, 0, 0)).await.unwrap().unwrap(),
            b"hello world".as_ref()
        );
        assert_eq!(reader.get_metadata().await.unwrap(), r#"{"metadata":true}"#);
    }

    #[tokio::test]
    async fn single_tile_cubic_archive() {
        let mut writer = memory_writer(TileType::Pbf)
            .create_s2(Cursor::new(Vec::new()))
            .unwrap();
        writer
            .add_tile_s2(Face::Face0, coord(0, 0, 0), b"hello world")
            .unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        let header = reader.get_header();
        assert_eq!(header.flavor, Flavor::Cubic);
        assert_eq!(header.version, 1);
        assert_eq!(header.root_offset, S2_HEADER_SIZE as u64);
        assert_eq!(header.root_length, 5);
        // empty per-face roots are single count bytes, tightly packed
        assert_eq!(header.face_root_ranges[0], (267, 1));
        assert_eq!(header.face_root_ranges[4], (271, 1));
        assert_eq!(header.metadata_offset, 272);
        assert_eq!(header.data_offset, MAX_INITIAL_BYTES as u64);

        assert_eq!(
            reader
                .get_tile_s2(Face::Face0, coord(0, 0, 0))
                .await
                .unwrap()
                .unwrap(),
            b"hello world".as_ref()
        );
        assert!(reader
            .get_tile_s2(Face::Face3, coord(0, 0, 0))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn tiles_on_all_faces() {
        let mut writer = memory_writer(TileType::Png)
            .create_s2(Cursor::new(Vec::new()))
            .unwrap();
        for face in Face::ALL {
            let payload = format!("face {}", face.index());
            writer
                .add_tile_s2(face, coord(1, 0, 1), payload.as_bytes())
                .unwrap();
        }
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        assert_eq!(
            reader.get_header().n_addressed_tiles,
            NonZeroU64::new(6)
        );
        // the face-0 quirk: entries are counted on face 0 only
        assert_eq!(reader.get_header().n_tile_entries, NonZeroU64::new(1));
        for face in Face::ALL {
            let tile = reader
                .get_tile_s2(face, coord(1, 0, 1))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(tile, format!("face {}", face.index()).as_bytes());
        }
    }

    #[tokio::test]
    async fn dedup_and_run_lengths() {
        let mut writer = memory_writer(TileType::Pbf)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_tile(coord(0, 0, 0), b"hello world").unwrap();
        writer.add_tile(coord(1, 0, 1), b"hello world").unwrap();
        writer.add_tile(coord(5, 2, 9), b"hello world 2").unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        let header = reader.get_header();
        assert_eq!(header.n_addressed_tiles, NonZeroU64::new(3));
        assert_eq!(header.n_tile_contents, NonZeroU64::new(2));
        // ids 0 and 2 are not consecutive, so no run forms
        assert_eq!(header.n_tile_entries, NonZeroU64::new(3));
        // both copies share eleven bytes; the third tile adds thirteen
        assert_eq!(header.data_length, 24);

        for (c, payload) in [
            (coord(0, 0, 0), b"hello world".as_ref()),
            (coord(1, 0, 1), b"hello world".as_ref()),
            (coord(5, 2, 9), b"hello world 2".as_ref()),
        ] {
            assert_eq!(reader.get_tile(c).await.unwrap().unwrap(), payload);
        }
    }

    #[tokio::test]
    async fn consecutive_identical_tiles_form_a_run() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        // ids 1, 2, 3 in Hilbert order
        writer.add_tile(coord(1, 0, 0), b"ocean").unwrap();
        writer.add_tile(coord(1, 0, 1), b"ocean").unwrap();
        writer.add_tile(coord(1, 1, 1), b"ocean").unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        let header = reader.get_header();
        assert_eq!(header.n_addressed_tiles, NonZeroU64::new(3));
        assert_eq!(header.n_tile_entries, NonZeroU64::new(1));
        assert_eq!(header.n_tile_contents, NonZeroU64::new(1));
        assert_eq!(header.data_length, 5);

        for c in [coord(1, 0, 0), coord(1, 0, 1), coord(1, 1, 1)] {
            assert_eq!(
                reader.get_tile(c).await.unwrap().unwrap(),
                b"ocean".as_ref()
            );
        }
        // the neighbor past the run is absent
        assert!(reader.get_tile(coord(1, 1, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn large_archive_fans_out_into_leaves() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        let mut count = 0_u64;
        for z in 0..=7_u8 {
            for x in 0..1_u64 << z {
                for y in 0..1_u64 << z {
                    writer
                        .add_tile(coord(z, x, y), format!("{z}-{x}-{y}").as_bytes())
                        .unwrap();
                    count += 1;
                }
            }
        }
        assert_eq!(count, 21_845);
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        let header = reader.get_header();
        assert_eq!(header.n_addressed_tiles, NonZeroU64::new(21_845));
        // row-major write order is not Hilbert order
        assert!(!header.clustered);
        assert_eq!(header.min_zoom, 0);
        assert_eq!(header.max_zoom, 7);
        assert!(header.leaf_length > 0);

        assert_eq!(
            reader.get_tile(coord(6, 22, 45)).await.unwrap().unwrap(),
            b"6-22-45".as_ref()
        );
    }

    #[tokio::test]
    async fn unclustered_flag_tracks_append_order() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_tile(coord(1, 1, 1), &[0, 1, 2, 3]).unwrap();
        assert!(writer.header.clustered);
        writer.add_tile(coord(0, 0, 0), &[0, 1, 2, 3]).unwrap();
        assert!(!writer.header.clustered);

        let buffer = writer.finalize().unwrap().into_inner();
        let reader = open(buffer).await;
        assert!(!reader.get_header().clustered);
        // both tiles resolve even though they arrived out of order
        assert!(reader.get_tile(coord(0, 0, 0)).await.unwrap().is_some());
        assert!(reader.get_tile(coord(1, 1, 1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_ids_resolve_to_the_last_write() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_tile(coord(2, 1, 1), b"first").unwrap();
        writer.add_tile(coord(2, 1, 1), b"second").unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        assert_eq!(
            reader.get_tile(coord(2, 1, 1)).await.unwrap().unwrap(),
            b"second".as_ref()
        );
        assert_eq!(reader.get_header().n_tile_entries, NonZeroU64::new(1));
    }

    #[tokio::test]
    async fn compressed_tiles_round_trip() {
        let mut writer = S2PmTilesWriter::new(TileType::Pbf)
            .create(Cursor::new(Vec::new()))
            .unwrap();

        // stored gzipped, returned decompressed
        writer.add_tile(coord(1, 0, 0), b"regular tile").unwrap();
        // stored verbatim
        writer.add_raw_tile(coord(1, 0, 1), b"raw tile").unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        assert_eq!(reader.get_header().tile_compression, Compression::Gzip);

        let raw = reader.get_tile_raw(coord(1, 0, 0)).await.unwrap().unwrap();
        assert_ne!(raw, b"regular tile".as_ref());
        assert_eq!(
            reader.get_tile(coord(1, 0, 0)).await.unwrap().unwrap(),
            b"regular tile".as_ref()
        );
        assert_eq!(
            reader
                .get_tile_raw(coord(1, 0, 1))
                .await
                .unwrap()
                .unwrap(),
            b"raw tile".as_ref()
        );
    }

    #[tokio::test]
    async fn empty_payloads_are_skipped() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        writer.add_tile(coord(0, 0, 0), &[]).unwrap();
        let buffer = writer.finalize().unwrap().into_inner();

        let reader = open(buffer).await;
        assert_eq!(reader.get_header().n_addressed_tiles, None);
        assert!(reader.get_tile(coord(0, 0, 0)).await.unwrap().is_none());
    }

    #[test]
    fn planar_writers_reject_other_faces() {
        let mut writer = memory_writer(TileType::Png)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        assert!(matches!(
            writer.add_tile_s2(Face::Face1, coord(0, 0, 0), b"x"),
            Err(S2PmtError::InvalidCoordinate)
        ));
    }

    #[test]
    fn oversized_metadata_is_rejected() {
        let metadata = "x".repeat(MAX_INITIAL_BYTES);
        let writer = memory_writer(TileType::Png)
            .metadata(&metadata)
            .create(Cursor::new(Vec::new()))
            .unwrap();
        assert!(matches!(
            writer.finalize(),
            Err(S2PmtError::MetadataTooLarge)
        ));
    }

    #[test]
    fn normalize_merges_adjacent_runs() {
        let entry = |tile_id, offset, length, run_length| DirEntry {
            tile_id,
            offset,
            length,
            run_length,
        };
        let mut entries = vec![
            entry(4, 10, 5, 1),
            entry(0, 0, 10, 2),
            entry(2, 0, 10, 2),
            entry(5, 10, 5, 1),
        ];
        normalize_entries(&mut entries);
        assert_eq!(
            entries,
            vec![entry(0, 0, 10, 4), entry(4, 10, 5, 2)]
        );
    }
}

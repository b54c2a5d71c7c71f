#![allow(clippy::unreadable_literal)]

use hilbert_2d::Variant;

use crate::error::{S2PmtError, S2PmtResult};

/// The highest zoom level that can be addressed.
///
/// `4^26` is the largest per-zoom tile count whose pyramid base still fits
/// the 53-bit-safe integer range shared with other readers of the format.
pub const MAX_ZOOM: u8 = 26;

/// The largest valid tile id: the last tile of zoom [`MAX_ZOOM`].
pub const MAX_TILE_ID: u64 = PYRAMID_SIZE_BY_ZOOM[MAX_ZOOM as usize] + (1 << (2 * MAX_ZOOM)) - 1;

/// The pre-computed sizes of the tile pyramid for each zoom level.
///
/// ```
/// # use s2_pmtiles::PYRAMID_SIZE_BY_ZOOM;
/// let mut size_at_level = 0_u64;
/// for z in 0..PYRAMID_SIZE_BY_ZOOM.len() {
///     assert_eq!(PYRAMID_SIZE_BY_ZOOM[z], size_at_level, "Invalid value at zoom {z}");
///     // add number of tiles at this zoom level
///     size_at_level += 4_u64.pow(z as u32);
/// }
/// ```
pub const PYRAMID_SIZE_BY_ZOOM: [u64; 27] = [
    /*  0 */ 0,
    /*  1 */ 1,
    /*  2 */ 5,
    /*  3 */ 21,
    /*  4 */ 85,
    /*  5 */ 341,
    /*  6 */ 1365,
    /*  7 */ 5461,
    /*  8 */ 21845,
    /*  9 */ 87381,
    /* 10 */ 349525,
    /* 11 */ 1398101,
    /* 12 */ 5592405,
    /* 13 */ 22369621,
    /* 14 */ 89478485,
    /* 15 */ 357913941,
    /* 16 */ 1431655765,
    /* 17 */ 5726623061,
    /* 18 */ 22906492245,
    /* 19 */ 91625968981,
    /* 20 */ 366503875925,
    /* 21 */ 1466015503701,
    /* 22 */ 5864062014805,
    /* 23 */ 23456248059221,
    /* 24 */ 93824992236885,
    /* 25 */ 375299968947541,
    /* 26 */ 1501199875790165,
];

/// One of the six planes of the cubed-sphere projection.
///
/// Planar archives address [`Face::Face0`] only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    /// Face 0, the sole face of a planar archive.
    #[default]
    Face0 = 0,
    /// Face 1.
    Face1 = 1,
    /// Face 2.
    Face2 = 2,
    /// Face 3.
    Face3 = 3,
    /// Face 4.
    Face4 = 4,
    /// Face 5.
    Face5 = 5,
}

impl Face {
    /// All six faces, in face order.
    pub const ALL: [Self; 6] = [
        Self::Face0,
        Self::Face1,
        Self::Face2,
        Self::Face3,
        Self::Face4,
        Self::Face5,
    ];

    /// The face number as an array index.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Face {
    type Error = S2PmtError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(S2PmtError::InvalidCoordinate)
    }
}

/// A tile position addressed by zoom and column/row within the zoom grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    z: u8,
    x: u64,
    y: u64,
}

impl TileCoord {
    /// Creates a coordinate, validating that the zoom is at most
    /// [`MAX_ZOOM`] and that `x`/`y` lie within the `2^z × 2^z` grid.
    pub fn new(z: u8, x: u64, y: u64) -> S2PmtResult<Self> {
        if z > MAX_ZOOM || x >= 1 << z || y >= 1 << z {
            return Err(S2PmtError::InvalidCoordinate);
        }
        Ok(Self { z, x, y })
    }

    /// Zoom level.
    #[must_use]
    pub fn z(self) -> u8 {
        self.z
    }

    /// Column within the zoom grid.
    #[must_use]
    pub fn x(self) -> u64 {
        self.x
    }

    /// Row within the zoom grid.
    #[must_use]
    pub fn y(self) -> u64 {
        self.y
    }

    /// The Hilbert tile id of this coordinate.
    #[must_use]
    pub fn tile_id(self) -> TileId {
        // The 0/0/0 case would fail hilbert_2d::u64::xy2h_discrete at order 0
        if self.z == 0 {
            return TileId(0);
        }
        let hilbert =
            hilbert_2d::u64::xy2h_discrete(self.x, self.y, self.z.into(), Variant::Hilbert);
        TileId(PYRAMID_SIZE_BY_ZOOM[usize::from(self.z)] + hilbert)
    }
}

impl From<TileCoord> for TileId {
    fn from(coord: TileCoord) -> Self {
        coord.tile_id()
    }
}

/// The monotone Hilbert-curve index of a tile within its face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(u64);

impl TileId {
    /// Creates a tile id, validating it against [`MAX_TILE_ID`].
    pub fn new(value: u64) -> S2PmtResult<Self> {
        if value > MAX_TILE_ID {
            return Err(S2PmtError::InvalidCoordinate);
        }
        Ok(Self(value))
    }

    /// The raw 64-bit id.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// The zoom and grid position this id addresses.
    #[must_use]
    pub fn coords(self) -> TileCoord {
        if self.0 == 0 {
            return TileCoord { z: 0, x: 0, y: 0 };
        }
        let mut z = MAX_ZOOM;
        for (zoom, &base) in PYRAMID_SIZE_BY_ZOOM.iter().enumerate().skip(1) {
            if self.0 < base {
                z = zoom as u8 - 1;
                break;
            }
        }
        let hilbert = self.0 - PYRAMID_SIZE_BY_ZOOM[usize::from(z)];
        let (x, y) = hilbert_2d::u64::h2xy_discrete(hilbert, z.into(), Variant::Hilbert);
        TileCoord { z, x, y }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0, 0, 0)]
    #[case(1, 0, 1, 2)]
    #[case(1, 1, 0, 4)]
    #[case(1, 1, 1, 3)]
    #[case(2, 0, 0, 5)]
    #[case(2, 0, 1, 8)]
    #[case(2, 1, 0, 6)]
    #[case(2, 1, 1, 7)]
    #[case(12, 3423, 1763, 19_078_479)]
    fn known_tile_ids(#[case] z: u8, #[case] x: u64, #[case] y: u64, #[case] id: u64) {
        let coord = TileCoord::new(z, x, y).unwrap();
        assert_eq!(coord.tile_id().value(), id);
        assert_eq!(TileId::new(id).unwrap().coords(), coord);
    }

    #[test]
    fn round_trip_all_corners() {
        for z in 0..=MAX_ZOOM {
            let dim: u64 = (1 << z) - 1;
            for (x, y) in [(0, 0), (dim, 0), (0, dim), (dim, dim)] {
                let coord = TileCoord::new(z, x, y).unwrap();
                assert_eq!(
                    coord.tile_id().coords(),
                    coord,
                    "Failed round-trip for z={z}, x={x}, y={y}",
                );
            }
        }
    }

    #[test]
    fn round_trip_low_zoom_sweep() {
        for z in 0..=6_u8 {
            for x in 0..1_u64 << z {
                for y in 0..1_u64 << z {
                    let coord = TileCoord::new(z, x, y).unwrap();
                    assert_eq!(coord.tile_id().coords(), coord);
                }
            }
        }
    }

    #[test]
    fn zoom_bases_are_the_pyramid_sizes() {
        for z in 1..=MAX_ZOOM {
            let coord = TileCoord::new(z, 0, 0).unwrap();
            // (0, 0) is always the origin of the curve at every zoom
            assert_eq!(coord.tile_id().value(), PYRAMID_SIZE_BY_ZOOM[usize::from(z)]);
        }
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        assert!(matches!(
            TileCoord::new(30, 0, 0),
            Err(S2PmtError::InvalidCoordinate)
        ));
        assert!(matches!(
            TileCoord::new(27, 0, 0),
            Err(S2PmtError::InvalidCoordinate)
        ));
        assert!(matches!(
            TileCoord::new(2, 4, 0),
            Err(S2PmtError::InvalidCoordinate)
        ));
        assert!(matches!(
            TileCoord::new(0, 0, 1),
            Err(S2PmtError::InvalidCoordinate)
        ));
        assert!(matches!(
            TileId::new(MAX_TILE_ID + 1),
            Err(S2PmtError::InvalidCoordinate)
        ));
    }

    #[test]
    fn max_tile_id_is_the_last_tile_of_max_zoom() {
        let coords = TileId::new(MAX_TILE_ID).unwrap().coords();
        assert_eq!(coords.z(), MAX_ZOOM);
        assert_eq!(coords.tile_id().value(), MAX_TILE_ID);
    }

    #[test]
    fn faces_convert_from_numbers() {
        assert_eq!(Face::try_from(0).unwrap(), Face::Face0);
        assert_eq!(Face::try_from(5).unwrap(), Face::Face5);
        assert!(matches!(
            Face::try_from(6),
            Err(S2PmtError::InvalidCoordinate)
        ));
    }
}

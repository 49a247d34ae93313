//! # Voxel Grid
//!
//! World data is organized into fixed-size chunks. Each chunk owns exactly
//! one `VoxelGrid`: a dense `width × height × width` array of block cells.
//! The grid is pure data. It never generates anything and never talks to a
//! renderer; it only guards the instance-ownership contract:
//!
//! - only the renderer assigns a cell's instance id
//! - only the data layer invalidates it (every id change clears it)
//!
//! ## Bounds
//!
//! Boundary math is everywhere in generation, so accessors are tolerant:
//! out-of-range reads return [`BlockCell::EMPTY`] and out-of-range writes
//! are silently ignored.

use serde::{Deserialize, Serialize};

/// Block type identifier. `0` is the empty sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty (air) block.
    pub const EMPTY: Self = Self(0);

    /// Returns true if this is the empty sentinel.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Index of a render instance inside a renderer-owned buffer.
pub type InstanceId = u32;

/// A single cell of the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockCell {
    /// Block type.
    pub id: BlockId,
    /// Render instance, assigned by the renderer only.
    pub instance: Option<InstanceId>,
}

impl BlockCell {
    /// Empty cell with no instance.
    pub const EMPTY: Self = Self {
        id: BlockId::EMPTY,
        instance: None,
    };
}

/// Chunk dimensions in blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDims {
    /// Width and depth (X and Z).
    pub width: u32,
    /// Height (Y).
    pub height: u32,
}

impl ChunkDims {
    /// Creates chunk dimensions.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total cells per chunk.
    #[inline]
    #[must_use]
    pub const fn volume(self) -> usize {
        self.width as usize * self.width as usize * self.height as usize
    }

    /// Width as a signed coordinate bound.
    #[inline]
    #[must_use]
    pub const fn width_i32(self) -> i32 {
        self.width as i32
    }

    /// Height as a signed coordinate bound.
    #[inline]
    #[must_use]
    pub const fn height_i32(self) -> i32 {
        self.height as i32
    }
}

impl Default for ChunkDims {
    fn default() -> Self {
        Self::new(64, 32)
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to the containing chunk.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32, width: u32) -> Self {
        Self {
            x: block_x.div_euclid(width as i32),
            z: block_z.div_euclid(width as i32),
        }
    }

    /// World X of the chunk origin.
    #[inline]
    #[must_use]
    pub const fn origin_x(self, width: u32) -> i32 {
        self.x * width as i32
    }

    /// World Z of the chunk origin.
    #[inline]
    #[must_use]
    pub const fn origin_z(self, width: u32) -> i32 {
        self.z * width as i32
    }

    /// Chebyshev (ring) distance between two chunks.
    #[inline]
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// Converts a world block position to chunk-local coordinates.
///
/// Y passes through unchanged.
#[inline]
#[must_use]
pub const fn world_to_local(world_x: i32, world_y: i32, world_z: i32, width: u32) -> (i32, i32, i32) {
    (
        world_x.rem_euclid(width as i32),
        world_y,
        world_z.rem_euclid(width as i32),
    )
}

/// Face-neighbour offsets (±X, ±Y, ±Z).
pub const FACE_NEIGHBOURS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// A chunk's block storage.
///
/// Cells are stored flat in `[y][z][x]` order.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    dims: ChunkDims,
    cells: Vec<BlockCell>,
}

impl VoxelGrid {
    /// Creates an all-empty grid.
    #[must_use]
    pub fn new(dims: ChunkDims) -> Self {
        Self {
            dims,
            cells: vec![BlockCell::EMPTY; dims.volume()],
        }
    }

    /// Grid dimensions.
    #[inline]
    #[must_use]
    pub const fn dims(&self) -> ChunkDims {
        self.dims
    }

    /// Returns true if the local coordinate lies inside the grid.
    #[inline]
    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32, z: i32) -> bool {
        (0..self.dims.width_i32()).contains(&x)
            && (0..self.dims.height_i32()).contains(&y)
            && (0..self.dims.width_i32()).contains(&z)
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if !self.in_bounds(x, y, z) {
            return None;
        }
        let w = self.dims.width as usize;
        Some((y as usize * w + z as usize) * w + x as usize)
    }

    /// Gets a cell; out of range yields [`BlockCell::EMPTY`].
    #[inline]
    #[must_use]
    pub fn cell(&self, x: i32, y: i32, z: i32) -> BlockCell {
        self.index(x, y, z).map_or(BlockCell::EMPTY, |i| self.cells[i])
    }

    /// Gets a cell's block id; out of range yields [`BlockId::EMPTY`].
    #[inline]
    #[must_use]
    pub fn block_id(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.cell(x, y, z).id
    }

    /// Sets a cell's block id and clears its instance.
    ///
    /// Out-of-range coordinates are ignored.
    #[inline]
    pub fn set_block_id(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if let Some(i) = self.index(x, y, z) {
            self.cells[i] = BlockCell { id, instance: None };
        }
    }

    /// Gets a cell's render instance.
    #[inline]
    #[must_use]
    pub fn instance(&self, x: i32, y: i32, z: i32) -> Option<InstanceId> {
        self.cell(x, y, z).instance
    }

    /// Sets a cell's render instance. Renderer use only.
    ///
    /// Empty cells never carry an instance; the call is ignored for them.
    #[inline]
    pub fn set_instance(&mut self, x: i32, y: i32, z: i32, instance: Option<InstanceId>) {
        if let Some(i) = self.index(x, y, z) {
            if !self.cells[i].id.is_empty() {
                self.cells[i].instance = instance;
            }
        }
    }

    /// True iff all 6 face neighbours are non-empty.
    ///
    /// Out-of-bounds neighbours count as empty, so edge blocks are never
    /// obscured.
    #[must_use]
    pub fn is_obscured(&self, x: i32, y: i32, z: i32) -> bool {
        FACE_NEIGHBOURS
            .iter()
            .all(|&(dx, dy, dz)| !self.block_id(x + dx, y + dy, z + dz).is_empty())
    }

    /// Visits every non-empty cell in fixed y → z → x order.
    pub fn for_each_filled(&self, mut f: impl FnMut(i32, i32, i32, BlockCell)) {
        let w = self.dims.width_i32();
        for y in 0..self.dims.height_i32() {
            for z in 0..w {
                for x in 0..w {
                    let cell = self.cells[self.index_unchecked(x, y, z)];
                    if !cell.id.is_empty() {
                        f(x, y, z, cell);
                    }
                }
            }
        }
    }

    #[inline]
    fn index_unchecked(&self, x: i32, y: i32, z: i32) -> usize {
        let w = self.dims.width as usize;
        (y as usize * w + z as usize) * w + x as usize
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.id.is_empty()).count()
    }

    /// Topmost non-empty y of a column for which `skip` is false.
    #[must_use]
    pub fn top_filled_y(&self, x: i32, z: i32, skip: impl Fn(BlockId) -> bool) -> Option<i32> {
        if !self.in_bounds(x, 0, z) {
            return None;
        }
        (0..self.dims.height_i32()).rev().find(|&y| {
            let id = self.block_id(x, y, z);
            !id.is_empty() && !skip(id)
        })
    }

    /// Resets every cell to empty.
    pub fn clear(&mut self) {
        self.cells.fill(BlockCell::EMPTY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VoxelGrid {
        VoxelGrid::new(ChunkDims::new(4, 4))
    }

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0, 16), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(15, 15, 16), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(16, 16, 16), ChunkCoord::new(1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1, 16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-16, -16, 16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-17, -17, 16), ChunkCoord::new(-2, -2));
        assert_eq!(world_to_local(-1, 5, 17, 16), (15, 5, 1));
    }

    #[test]
    fn test_chebyshev() {
        let a = ChunkCoord::new(0, 0);
        assert_eq!(a.chebyshev(ChunkCoord::new(3, -1)), 3);
        assert_eq!(a.chebyshev(ChunkCoord::new(-2, 2)), 2);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn test_out_of_range_is_tolerated() {
        let mut g = grid();
        g.set_block_id(-1, 0, 0, BlockId(3));
        g.set_block_id(0, 4, 0, BlockId(3));
        g.set_instance(9, 9, 9, Some(1));
        assert_eq!(g.cell(-1, 0, 0), BlockCell::EMPTY);
        assert_eq!(g.block_id(0, 4, 0), BlockId::EMPTY);
        assert_eq!(g.filled_count(), 0);
    }

    #[test]
    fn test_set_block_clears_instance() {
        let mut g = grid();
        g.set_block_id(1, 1, 1, BlockId(2));
        g.set_instance(1, 1, 1, Some(7));
        assert_eq!(g.instance(1, 1, 1), Some(7));

        g.set_block_id(1, 1, 1, BlockId(5));
        assert_eq!(g.instance(1, 1, 1), None);
    }

    #[test]
    fn test_empty_cells_refuse_instances() {
        let mut g = grid();
        g.set_instance(0, 0, 0, Some(3));
        assert_eq!(g.instance(0, 0, 0), None);
    }

    #[test]
    fn test_obscured_flips_when_neighbour_cleared() {
        let mut g = grid();
        for y in 0..3 {
            for z in 0..3 {
                for x in 0..3 {
                    g.set_block_id(x, y, z, BlockId(1));
                }
            }
        }
        assert!(g.is_obscured(1, 1, 1));
        g.set_block_id(1, 2, 1, BlockId::EMPTY);
        assert!(!g.is_obscured(1, 1, 1));
    }

    #[test]
    fn test_edge_blocks_never_obscured() {
        let mut g = grid();
        for y in 0..4 {
            for z in 0..4 {
                for x in 0..4 {
                    g.set_block_id(x, y, z, BlockId(1));
                }
            }
        }
        assert!(g.is_obscured(1, 1, 1));
        assert!(!g.is_obscured(0, 1, 1));
        assert!(!g.is_obscured(1, 3, 1));
    }

    #[test]
    fn test_for_each_filled_order() {
        let mut g = grid();
        g.set_block_id(3, 0, 0, BlockId(1));
        g.set_block_id(0, 1, 0, BlockId(2));
        g.set_block_id(0, 0, 2, BlockId(3));

        let mut seen = Vec::new();
        g.for_each_filled(|x, y, z, cell| seen.push((x, y, z, cell.id.0)));
        assert_eq!(seen, vec![(3, 0, 0, 1), (0, 0, 2, 3), (0, 1, 0, 2)]);
    }

    #[test]
    fn test_top_filled_y_skips() {
        let mut g = grid();
        g.set_block_id(2, 1, 2, BlockId(1));
        g.set_block_id(2, 3, 2, BlockId(9));
        assert_eq!(g.top_filled_y(2, 2, |_| false), Some(3));
        assert_eq!(g.top_filled_y(2, 2, |id| id == BlockId(9)), Some(1));
        assert_eq!(g.top_filled_y(0, 0, |_| false), None);
        assert_eq!(g.top_filled_y(-1, 0, |_| false), None);
    }
}

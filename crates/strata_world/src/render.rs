//! # Render Contract
//!
//! The world never draws. It tells a [`RenderSink`] when a chunk's grid was
//! rebuilt, when single blocks appear or disappear, and when a chunk goes
//! away. The sink owns instance handles and writes them back into the grid.
//!
//! [`InstanceRenderer`] is the reference sink: one dense transform buffer per
//! (chunk, block id), ready for instanced upload. Removal is swap-and-pop, so
//! the block that moved into the hole gets its handle rewritten.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use strata_procedural::{BlockId, ChunkCoord, InstanceId, VoxelGrid};
use tracing::debug;

/// Receiver of chunk and block visibility changes.
pub trait RenderSink {
    /// Drops every instance of `coord` and recreates them from `grid`.
    fn rebuild_chunk(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid);

    /// Block `(x, y, z)` of `coord` is filled and may need an instance.
    fn add_instance(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid, x: i32, y: i32, z: i32);

    /// Block `(x, y, z)` of `coord` is about to be cleared.
    fn remove_instance(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid, x: i32, y: i32, z: i32);

    /// Chunk `coord` was evicted.
    fn chunk_disposed(&mut self, coord: ChunkCoord);
}

/// Sink that draws nothing. For servers, tools and tests.
#[derive(Debug, Default)]
pub struct NullRenderer {
    /// Rebuild requests received.
    pub rebuilds: u64,
    /// Disposal notices received.
    pub disposals: u64,
}

impl RenderSink for NullRenderer {
    fn rebuild_chunk(&mut self, _coord: ChunkCoord, _grid: &mut VoxelGrid) {
        self.rebuilds += 1;
    }

    fn add_instance(&mut self, _coord: ChunkCoord, _grid: &mut VoxelGrid, _x: i32, _y: i32, _z: i32) {}

    fn remove_instance(&mut self, _coord: ChunkCoord, _grid: &mut VoxelGrid, _x: i32, _y: i32, _z: i32) {}

    fn chunk_disposed(&mut self, _coord: ChunkCoord) {
        self.disposals += 1;
    }
}

/// Per-instance data for upload.
///
/// 16 bytes: world position of the block's min corner plus its id.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// World position (x, y, z).
    pub position: [f32; 3],
    /// Block id, widened for the shader.
    pub block: u32,
}

impl InstanceTransform {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[derive(Default)]
struct InstanceBatch {
    transforms: Vec<InstanceTransform>,
    owners: Vec<(i32, i32, i32)>,
}

/// Reference instancing sink.
pub struct InstanceRenderer {
    chunk_width: u32,
    chunks: HashMap<ChunkCoord, HashMap<BlockId, InstanceBatch>>,
}

impl InstanceRenderer {
    /// Creates an empty renderer for chunks `chunk_width` wide.
    #[must_use]
    pub fn new(chunk_width: u32) -> Self {
        Self {
            chunk_width,
            chunks: HashMap::new(),
        }
    }

    /// Transforms of one (chunk, block id) batch.
    #[must_use]
    pub fn instances(&self, coord: ChunkCoord, id: BlockId) -> &[InstanceTransform] {
        self.chunks
            .get(&coord)
            .and_then(|batches| batches.get(&id))
            .map(|batch| batch.transforms.as_slice())
            .unwrap_or(&[])
    }

    /// Raw bytes of one batch, for buffer upload.
    #[must_use]
    pub fn instance_bytes(&self, coord: ChunkCoord, id: BlockId) -> &[u8] {
        bytemuck::cast_slice(self.instances(coord, id))
    }

    /// Instances of one chunk.
    #[must_use]
    pub fn chunk_instance_count(&self, coord: ChunkCoord) -> usize {
        self.chunks
            .get(&coord)
            .map_or(0, |batches| batches.values().map(|b| b.transforms.len()).sum())
    }

    /// Instances across all chunks.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.chunks
            .values()
            .flat_map(HashMap::values)
            .map(|b| b.transforms.len())
            .sum()
    }

    /// Chunks with live batches.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn transform(&self, coord: ChunkCoord, x: i32, y: i32, z: i32, id: BlockId) -> InstanceTransform {
        InstanceTransform {
            position: [
                (coord.origin_x(self.chunk_width) + x) as f32,
                y as f32,
                (coord.origin_z(self.chunk_width) + z) as f32,
            ],
            block: u32::from(id.0),
        }
    }

    fn push(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid, x: i32, y: i32, z: i32, id: BlockId) {
        let transform = self.transform(coord, x, y, z, id);
        let batch = self.chunks.entry(coord).or_default().entry(id).or_default();
        let instance = batch.transforms.len() as InstanceId;
        batch.transforms.push(transform);
        batch.owners.push((x, y, z));
        grid.set_instance(x, y, z, Some(instance));
    }
}

impl RenderSink for InstanceRenderer {
    fn rebuild_chunk(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid) {
        self.chunks.remove(&coord);

        let mut visible = Vec::new();
        let mut hidden = Vec::new();
        let view: &VoxelGrid = grid;
        view.for_each_filled(|x, y, z, cell| {
            if view.is_obscured(x, y, z) {
                hidden.push((x, y, z));
            } else {
                visible.push((x, y, z, cell.id));
            }
        });

        for (x, y, z) in hidden {
            grid.set_instance(x, y, z, None);
        }
        for &(x, y, z, id) in &visible {
            self.push(coord, grid, x, y, z, id);
        }
        debug!(chunk = %coord, instances = visible.len(), "chunk instances rebuilt");
    }

    fn add_instance(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid, x: i32, y: i32, z: i32) {
        let cell = grid.cell(x, y, z);
        if cell.id.is_empty() || cell.instance.is_some() || grid.is_obscured(x, y, z) {
            return;
        }
        self.push(coord, grid, x, y, z, cell.id);
    }

    fn remove_instance(&mut self, coord: ChunkCoord, grid: &mut VoxelGrid, x: i32, y: i32, z: i32) {
        let cell = grid.cell(x, y, z);
        let Some(instance) = cell.instance else {
            return;
        };
        let Some(batch) = self.chunks.get_mut(&coord).and_then(|b| b.get_mut(&cell.id)) else {
            return;
        };
        let index = instance as usize;
        if index >= batch.transforms.len() {
            return;
        }

        batch.transforms.swap_remove(index);
        batch.owners.swap_remove(index);
        grid.set_instance(x, y, z, None);
        if let Some(&(mx, my, mz)) = batch.owners.get(index) {
            grid.set_instance(mx, my, mz, Some(instance));
        }
    }

    fn chunk_disposed(&mut self, coord: ChunkCoord) {
        self.chunks.remove(&coord);
    }
}

//! # Chunk Lifecycle Manager
//!
//! Streams chunks around a moving anchor, builds them through the
//! cooperative scheduler and serves the gameplay read/write interface.
//!
//! ## Chunk lifecycle
//!
//! ```text
//! Init ──data──▶ DataReady ──mesh──▶ MeshReady ──unload──▶ Disposed
//!                    ▲                    │
//!                    └────regenerate──────┘
//! ```
//!
//! - **Load ring**: Chebyshev radius `view_distance` around the anchor chunk.
//! - **Keep ring**: `view_distance + unload_padding`. Chunks between the two
//!   rings stay loaded, so an anchor oscillating across a border does not
//!   thrash.
//! - Work is keyed `chunk:<cx>,<cz>:data` / `chunk:<cx>,<cz>:mesh` with
//!   priority equal to the ring distance. Unloading cancels by the
//!   `chunk:<cx>,<cz>:` prefix.
//! - The chunk under the anchor is built synchronously if it is still `Init`
//!   when streaming runs, so the anchor never stands over the void.

use std::collections::HashMap;

use strata_procedural::{
    world_to_local, BlockId, ChunkCoord, ConfigResult, FloraRecord, HeightFieldGenerator, HeightMap,
    TreePlacement, VoxelGrid, WorldParams, FACE_NEIGHBOURS,
};
use tracing::{debug, info, warn};

use crate::config::WorldConfig;
use crate::error::{TaskError, TaskResult};
use crate::ledger::ModificationLedger;
use crate::render::RenderSink;
use crate::scheduler::{CooperativeScheduler, FrameBudget, PumpReport};
use crate::store::WorldStore;
use crate::Instant;

/// Lifecycle state of a chunk. Only moves forward, except that
/// regeneration re-enters at `DataReady`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkState {
    /// Allocated, nothing generated.
    Init,
    /// Voxels generated and edits replayed.
    DataReady,
    /// Renderer has rebuilt the chunk.
    MeshReady,
    /// Evicted.
    Disposed,
}

impl ChunkState {
    /// Lower-case name for logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::DataReady => "data_ready",
            Self::MeshReady => "mesh_ready",
            Self::Disposed => "disposed",
        }
    }

    /// Returns `true` once voxels are readable.
    #[inline]
    #[must_use]
    pub const fn has_data(self) -> bool {
        matches!(self, Self::DataReady | Self::MeshReady)
    }
}

/// One loaded chunk.
pub struct Chunk {
    coord: ChunkCoord,
    state: ChunkState,
    grid: VoxelGrid,
    height_map: Option<HeightMap>,
    trees: Vec<TreePlacement>,
    flora: Vec<FloraRecord>,
    generations: u32,
}

impl Chunk {
    fn new(coord: ChunkCoord, config: &WorldConfig) -> Self {
        Self {
            coord,
            state: ChunkState::Init,
            grid: VoxelGrid::new(config.chunk),
            height_map: None,
            trees: Vec::new(),
            flora: Vec::new(),
            generations: 0,
        }
    }

    /// Chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ChunkState {
        self.state
    }

    /// Voxel storage.
    #[inline]
    #[must_use]
    pub const fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Surface heights from the last generation.
    #[must_use]
    pub fn height_map(&self) -> Option<&HeightMap> {
        self.height_map.as_ref()
    }

    /// External-model trees from the last generation.
    #[must_use]
    pub fn trees(&self) -> &[TreePlacement] {
        &self.trees
    }

    /// Flora records from the last generation.
    #[must_use]
    pub fn flora(&self) -> &[FloraRecord] {
        &self.flora
    }

    /// How many times this chunk has been generated.
    #[must_use]
    pub const fn generations(&self) -> u32 {
        self.generations
    }
}

/// World statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Chunks currently loaded.
    pub loaded_chunks: usize,
    /// Loaded chunks with voxels.
    pub data_ready_chunks: usize,
    /// Loaded chunks handed to the renderer.
    pub mesh_ready_chunks: usize,
    /// Scheduler tasks waiting.
    pub pending_tasks: usize,
    /// First-time generations this session.
    pub generated_total: u64,
    /// Regenerations this session.
    pub regenerated_total: u64,
    /// Chunks evicted this session.
    pub unloaded_total: u64,
    /// Anchor chunks built outside the scheduler.
    pub fallback_builds: u64,
    /// Scheduled tasks that failed.
    pub failed_tasks: u64,
    /// Chunks with recorded edits.
    pub modified_chunks: usize,
    /// Recorded block edits.
    pub modified_blocks: usize,
}

/// Everything scheduled work may touch.
pub struct WorldState<R> {
    config: WorldConfig,
    generator: HeightFieldGenerator,
    chunks: HashMap<ChunkCoord, Chunk>,
    ledger: ModificationLedger,
    renderer: R,
    generated_total: u64,
    regenerated_total: u64,
    unloaded_total: u64,
    fallback_builds: u64,
}

impl<R: RenderSink> WorldState<R> {
    /// Generates `coord` and replays its edits.
    ///
    /// Without `regenerate`, a chunk that already has data is left alone.
    fn build_data(&mut self, coord: ChunkCoord, regenerate: bool) -> TaskResult {
        let chunk = self.chunks.get_mut(&coord).ok_or(TaskError::ChunkGone(coord))?;
        match chunk.state {
            ChunkState::Disposed => return Err(TaskError::ChunkGone(coord)),
            ChunkState::DataReady | ChunkState::MeshReady if !regenerate => return Ok(()),
            _ => {}
        }

        let out = self.generator.generate(&mut chunk.grid, coord);
        let mut replayed = 0usize;
        for ((x, y, z), id) in self.ledger.chunk_deltas(coord) {
            chunk.grid.set_block_id(x, y, z, id);
            replayed += 1;
        }

        if chunk.state == ChunkState::Init {
            self.generated_total += 1;
        } else {
            self.regenerated_total += 1;
        }
        chunk.height_map = Some(out.height_map);
        chunk.trees = out.trees;
        chunk.flora = out.flora;
        chunk.state = ChunkState::DataReady;
        chunk.generations += 1;
        debug!(chunk = %coord, replayed, "chunk data ready");
        Ok(())
    }

    /// Hands a chunk with data to the renderer.
    fn build_mesh(&mut self, coord: ChunkCoord) -> TaskResult {
        let chunk = self.chunks.get_mut(&coord).ok_or(TaskError::ChunkGone(coord))?;
        if !chunk.state.has_data() {
            return Err(TaskError::WrongState {
                coord,
                expected: ChunkState::DataReady.name(),
                found: chunk.state.name(),
            });
        }
        self.renderer.rebuild_chunk(coord, &mut chunk.grid);
        chunk.state = ChunkState::MeshReady;
        debug!(chunk = %coord, "chunk mesh ready");
        Ok(())
    }

    fn dispose(&mut self, coord: ChunkCoord) {
        if let Some(mut chunk) = self.chunks.remove(&coord) {
            chunk.state = ChunkState::Disposed;
            let width = self.config.chunk.width;
            self.generator
                .climate_mut()
                .invalidate(coord.origin_x(width), coord.origin_z(width));
            self.renderer.chunk_disposed(coord);
            self.unloaded_total += 1;
            debug!(chunk = %coord, state = chunk.state.name(), "chunk evicted");
        }
    }

    /// Resolves a world block to a chunk with data and local coordinates.
    fn locate(&self, x: i32, y: i32, z: i32) -> Option<(ChunkCoord, (i32, i32, i32))> {
        let width = self.config.chunk.width;
        let coord = ChunkCoord::from_block_pos(x, z, width);
        let chunk = self.chunks.get(&coord)?;
        let local = world_to_local(x, y, z, width);
        (chunk.state.has_data() && chunk.grid.in_bounds(local.0, local.1, local.2)).then_some((coord, local))
    }

    /// Gives a newly exposed block an instance if it now needs one.
    fn reveal(&mut self, x: i32, y: i32, z: i32) {
        let Some((coord, (lx, ly, lz))) = self.locate(x, y, z) else {
            return;
        };
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            if chunk.state == ChunkState::MeshReady {
                self.renderer.add_instance(coord, &mut chunk.grid, lx, ly, lz);
            }
        }
    }
}

fn chunk_prefix(coord: ChunkCoord) -> String {
    format!("chunk:{coord}:")
}

fn data_key(coord: ChunkCoord) -> String {
    format!("chunk:{coord}:data")
}

fn mesh_key(coord: ChunkCoord) -> String {
    format!("chunk:{coord}:mesh")
}

type WorldScheduler<R> = CooperativeScheduler<WorldState<R>>;

fn enqueue_data<R: RenderSink + 'static>(
    scheduler: &mut WorldScheduler<R>,
    coord: ChunkCoord,
    priority: u32,
    regenerate: bool,
) {
    scheduler.enqueue(
        data_key(coord),
        priority,
        move |world: &mut WorldState<R>, scheduler: &mut WorldScheduler<R>| {
            world.build_data(coord, regenerate)?;
            enqueue_mesh(scheduler, coord, priority);
            Ok(())
        },
    );
}

fn enqueue_mesh<R: RenderSink + 'static>(scheduler: &mut WorldScheduler<R>, coord: ChunkCoord, priority: u32) {
    scheduler.enqueue(
        mesh_key(coord),
        priority,
        move |world: &mut WorldState<R>, _: &mut WorldScheduler<R>| world.build_mesh(coord),
    );
}

/// Owner of every loaded chunk.
pub struct ChunkLifecycleManager<R: RenderSink + 'static> {
    world: WorldState<R>,
    scheduler: WorldScheduler<R>,
    anchor: Option<ChunkCoord>,
}

impl<R: RenderSink + 'static> ChunkLifecycleManager<R> {
    /// Creates a manager and loads the world's stored edits.
    ///
    /// # Errors
    ///
    /// Returns [`strata_procedural::ConfigError::Invalid`] if `config` fails
    /// validation.
    pub fn new(config: WorldConfig, store: Box<dyn WorldStore>, renderer: R) -> ConfigResult<Self> {
        config.validate()?;
        let mut ledger = ModificationLedger::new(store, config.ledger_key(), config.save_debounce());
        ledger.open();

        info!(
            world = %config.name,
            seed = config.generation.seed.value(),
            width = config.chunk.width,
            height = config.chunk.height,
            "world opened"
        );

        Ok(Self {
            scheduler: CooperativeScheduler::new(config.fallback_budget()),
            world: WorldState {
                generator: HeightFieldGenerator::new(config.generation.clone()),
                chunks: HashMap::new(),
                ledger,
                renderer,
                generated_total: 0,
                regenerated_total: 0,
                unloaded_total: 0,
                fallback_builds: 0,
                config,
            },
            anchor: None,
        })
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Moves the anchor to world block `(x, z)`.
    ///
    /// Does nothing if the anchor stays in the same chunk, unless `force`.
    pub fn update_streaming(&mut self, x: i32, z: i32, force: bool) {
        let center = ChunkCoord::from_block_pos(x, z, self.world.config.chunk.width);
        if self.anchor == Some(center) && !force {
            return;
        }
        self.anchor = Some(center);

        let view = self.world.config.view_distance;
        let keep = self.world.config.keep_distance();

        let evicted: Vec<ChunkCoord> = self
            .world
            .chunks
            .keys()
            .copied()
            .filter(|c| c.chebyshev(center) > keep)
            .collect();
        for &coord in &evicted {
            self.scheduler.cancel_by_prefix(&chunk_prefix(coord));
            self.world.dispose(coord);
        }

        let mut created = 0usize;
        let radius = view as i32;
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(center.x + dx, center.z + dz);
                let priority = coord.chebyshev(center);
                match self.world.chunks.get(&coord).map(Chunk::state) {
                    None => {
                        let chunk = Chunk::new(coord, &self.world.config);
                        self.world.chunks.insert(coord, chunk);
                        enqueue_data(&mut self.scheduler, coord, priority, false);
                        created += 1;
                    }
                    // Re-prioritize work that has not started
                    Some(ChunkState::Init) if self.scheduler.is_pending(&data_key(coord)) => {
                        enqueue_data(&mut self.scheduler, coord, priority, false);
                    }
                    _ => {}
                }
            }
        }

        if self.world.chunks.get(&center).map(Chunk::state) == Some(ChunkState::Init) {
            warn!(chunk = %center, "anchor chunk not ready, building synchronously");
            self.build_now(center, false);
            self.world.fallback_builds += 1;
        }

        info!(
            anchor = %center,
            created,
            evicted = evicted.len(),
            loaded = self.world.chunks.len(),
            "streaming updated"
        );
    }

    /// Loads and fully builds every chunk within `radius` of world block
    /// `(x, z)` right now. For spawn preloading.
    pub fn ensure_loaded_around(&mut self, x: i32, z: i32, radius: u32) {
        let center = ChunkCoord::from_block_pos(x, z, self.world.config.chunk.width);
        let r = radius as i32;
        for dz in -r..=r {
            for dx in -r..=r {
                let coord = ChunkCoord::new(center.x + dx, center.z + dz);
                if !self.world.chunks.contains_key(&coord) {
                    let chunk = Chunk::new(coord, &self.world.config);
                    self.world.chunks.insert(coord, chunk);
                }
                if self.world.chunks.get(&coord).map(Chunk::state) != Some(ChunkState::MeshReady) {
                    self.build_now(coord, false);
                }
            }
        }
    }

    /// Runs both stages of `coord` immediately, dropping its queued work.
    fn build_now(&mut self, coord: ChunkCoord, regenerate: bool) {
        self.scheduler.cancel_by_prefix(&chunk_prefix(coord));
        let result = self
            .world
            .build_data(coord, regenerate)
            .and_then(|()| self.world.build_mesh(coord));
        if let Err(e) = result {
            warn!(chunk = %coord, error = %e, "synchronous build failed");
        }
    }

    fn anchor_distance(&self, coord: ChunkCoord) -> u32 {
        self.anchor.map_or(0, |a| coord.chebyshev(a))
    }

    // =========================================================================
    // Frame driving
    // =========================================================================

    /// Runs scheduled work within `budget`, then saves edits if the
    /// debounce has passed.
    pub fn tick(&mut self, budget: FrameBudget, now: Instant) -> PumpReport {
        let report = self.scheduler.pump(&mut self.world, budget);
        self.world.ledger.flush_if_due(now);
        report
    }

    /// Runs every pending task regardless of budget.
    pub fn flush_work(&mut self) -> PumpReport {
        self.scheduler.drain(&mut self.world)
    }

    /// Returns `true` if scheduled work remains.
    #[must_use]
    pub fn needs_pump(&self) -> bool {
        self.scheduler.needs_pump()
    }

    /// Saves edits immediately. Failures are logged.
    pub fn save_now(&mut self) {
        self.world.ledger.save_logged();
    }

    // =========================================================================
    // Gameplay interface
    // =========================================================================

    /// Block id at a world position; EMPTY if unloaded or out of range.
    #[must_use]
    pub fn block_world(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.world
            .locate(x, y, z)
            .and_then(|(coord, (lx, ly, lz))| {
                self.world.chunks.get(&coord).map(|c| c.grid.block_id(lx, ly, lz))
            })
            .unwrap_or(BlockId::EMPTY)
    }

    /// Places `id` into an empty cell.
    ///
    /// Returns `false` for EMPTY ids, occupied or out-of-range cells and
    /// chunks without data.
    pub fn add_block_world(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if id.is_empty() {
            return false;
        }
        let Some((coord, (lx, ly, lz))) = self.world.locate(x, y, z) else {
            return false;
        };
        let world = &mut self.world;
        let Some(chunk) = world.chunks.get_mut(&coord) else {
            return false;
        };
        if !chunk.grid.block_id(lx, ly, lz).is_empty() {
            return false;
        }

        chunk.grid.set_block_id(lx, ly, lz, id);
        if chunk.state == ChunkState::MeshReady {
            world.renderer.add_instance(coord, &mut chunk.grid, lx, ly, lz);
        }
        let width = world.config.chunk.width;
        world.ledger.record(x, y, z, id, width, Instant::now());
        true
    }

    /// Clears a filled cell and reveals its face neighbours.
    ///
    /// Returns `false` for empty or out-of-range cells and chunks without
    /// data.
    pub fn remove_block_world(&mut self, x: i32, y: i32, z: i32) -> bool {
        let Some((coord, (lx, ly, lz))) = self.world.locate(x, y, z) else {
            return false;
        };
        let world = &mut self.world;
        let Some(chunk) = world.chunks.get_mut(&coord) else {
            return false;
        };
        if chunk.grid.block_id(lx, ly, lz).is_empty() {
            return false;
        }

        if chunk.state == ChunkState::MeshReady {
            world.renderer.remove_instance(coord, &mut chunk.grid, lx, ly, lz);
        }
        chunk.grid.set_block_id(lx, ly, lz, BlockId::EMPTY);
        let width = world.config.chunk.width;
        world.ledger.record(x, y, z, BlockId::EMPTY, width, Instant::now());

        // Neighbours may live in adjacent chunks
        for (dx, dy, dz) in FACE_NEIGHBOURS {
            world.reveal(x + dx, y + dy, z + dz);
        }
        true
    }

    /// Highest non-foliage block of a world column.
    #[must_use]
    pub fn top_solid_y_world(&self, x: i32, z: i32) -> Option<i32> {
        let (coord, (lx, _, lz)) = self.world.locate(x, 0, z)?;
        let chunk = self.world.chunks.get(&coord)?;
        let params = self.world.generator.params();
        chunk.grid.top_filled_y(lx, lz, |id| params.is_foliage(id))
    }

    /// Returns `true` if a non-foliage block exists at or below world `y`.
    #[must_use]
    pub fn has_ground(&self, x: i32, y: i32, z: i32) -> bool {
        let params = self.world.generator.params();
        (0..=y.min(self.world.config.chunk.height_i32() - 1)).any(|yy| {
            let id = self.block_world(x, yy, z);
            !id.is_empty() && !params.is_foliage(id)
        })
    }

    // =========================================================================
    // Regeneration
    // =========================================================================

    /// Swaps in new generation parameters and regenerates every loaded
    /// chunk. Edits are replayed on top.
    ///
    /// # Errors
    ///
    /// Returns [`strata_procedural::ConfigError::Invalid`] and changes
    /// nothing if `params` fail validation.
    pub fn update_params(&mut self, params: WorldParams) -> ConfigResult<()> {
        params.validate()?;
        self.world.generator.update_params(params.clone());
        self.world.config.generation = params;

        let coords: Vec<ChunkCoord> = self.world.chunks.keys().copied().collect();
        for &coord in &coords {
            let priority = self.anchor_distance(coord);
            enqueue_data(&mut self.scheduler, coord, priority, true);
        }
        if let Some(anchor) = self.anchor.filter(|a| self.world.chunks.contains_key(a)) {
            self.build_now(anchor, true);
        }
        info!(chunks = coords.len(), "parameters updated, regenerating");
        Ok(())
    }

    /// Regenerates one loaded chunk now and queues its remesh.
    ///
    /// Returns `false` if the chunk is not loaded.
    pub fn regenerate_chunk(&mut self, coord: ChunkCoord) -> bool {
        if !self.world.chunks.contains_key(&coord) {
            return false;
        }
        self.scheduler.cancel(&data_key(coord));
        if let Err(e) = self.world.build_data(coord, true) {
            warn!(chunk = %coord, error = %e, "regeneration failed");
            return false;
        }
        let priority = self.anchor_distance(coord);
        enqueue_mesh(&mut self.scheduler, coord, priority);
        true
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Loaded chunk at `coord`.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.world.chunks.get(&coord)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.world.chunks.len()
    }

    /// Chunk the anchor is in.
    #[must_use]
    pub fn anchor(&self) -> Option<ChunkCoord> {
        self.anchor
    }

    /// World configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.world.config
    }

    /// Edit ledger.
    #[must_use]
    pub fn ledger(&self) -> &ModificationLedger {
        &self.world.ledger
    }

    /// Render sink.
    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.world.renderer
    }

    /// Render sink, mutable.
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.world.renderer
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> WorldStats {
        let chunks = self.world.chunks.values();
        WorldStats {
            loaded_chunks: self.world.chunks.len(),
            data_ready_chunks: chunks.clone().filter(|c| c.state.has_data()).count(),
            mesh_ready_chunks: chunks.filter(|c| c.state == ChunkState::MeshReady).count(),
            pending_tasks: self.scheduler.pending(),
            generated_total: self.world.generated_total,
            regenerated_total: self.world.regenerated_total,
            unloaded_total: self.world.unloaded_total,
            fallback_builds: self.world.fallback_builds,
            failed_tasks: self.scheduler.total_failed(),
            modified_chunks: self.world.ledger.modified_chunk_count(),
            modified_blocks: self.world.ledger.modified_block_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{InstanceRenderer, NullRenderer};
    use crate::ledger::tests::FailingStore;
    use crate::store::MemoryStore;
    use std::time::Duration;
    use strata_procedural::blocks;

    /// Headless world without trees, so column tops are terrain.
    fn config(name: &str, seed: u64) -> WorldConfig {
        let mut config = WorldConfig::headless(name, seed);
        config.generation.vegetation.frequency = 0.0;
        config
    }

    fn manager() -> ChunkLifecycleManager<NullRenderer> {
        ChunkLifecycleManager::new(config("unit", 7), Box::new(MemoryStore::new()), NullRenderer::default())
            .unwrap()
    }

    #[test]
    fn test_anchor_chunk_built_synchronously() {
        let mut m = manager();
        m.update_streaming(5, 5, false);
        let chunk = m.chunk(ChunkCoord::new(0, 0)).unwrap();
        assert_eq!(chunk.state(), ChunkState::MeshReady);
        assert_eq!(m.stats().fallback_builds, 1);
        assert!(m.top_solid_y_world(5, 5).is_some());
        // Neighbours still queued
        assert_eq!(m.chunk(ChunkCoord::new(1, 1)).unwrap().state(), ChunkState::Init);
        assert!(m.needs_pump());
    }

    #[test]
    fn test_same_chunk_update_is_noop() {
        let mut m = manager();
        m.update_streaming(1, 1, false);
        let pending = m.stats().pending_tasks;
        m.update_streaming(14, 2, false);
        assert_eq!(m.stats().pending_tasks, pending);
    }

    #[test]
    fn test_flush_builds_ring_once() {
        let mut m = manager();
        m.update_streaming(0, 0, false);
        m.flush_work();
        let stats = m.stats();
        assert_eq!(stats.loaded_chunks, 9);
        assert_eq!(stats.mesh_ready_chunks, 9);
        assert_eq!(stats.generated_total, 9);
        assert_eq!(stats.regenerated_total, 0);
        assert_eq!(m.renderer().rebuilds, 9);
    }

    #[test]
    fn test_eviction_cancels_pending_work() {
        let mut m = manager();
        m.update_streaming(0, 0, false);
        // Jump far away before any queued chunk was built
        m.update_streaming(16 * 100, 0, false);
        let report = m.flush_work();
        assert_eq!(report.failed, 0);
        assert!(m.chunk(ChunkCoord::new(0, 0)).is_none());
        assert_eq!(m.stats().unloaded_total, 9);
        assert_eq!(m.renderer().disposals, 9);
    }

    #[test]
    fn test_edits_require_loaded_data() {
        let mut m = manager();
        assert!(!m.add_block_world(0, 20, 0, blocks::STONE));
        assert!(!m.remove_block_world(0, 0, 0));
        assert_eq!(m.block_world(0, 0, 0), BlockId::EMPTY);
    }

    #[test]
    fn test_add_and_remove_round_trip() {
        let mut m = manager();
        m.ensure_loaded_around(0, 0, 0);
        let top = m.top_solid_y_world(3, 3).unwrap();
        assert!(m.add_block_world(3, top + 1, 3, blocks::STONE));
        assert!(!m.add_block_world(3, top + 1, 3, blocks::STONE));
        assert_eq!(m.block_world(3, top + 1, 3), blocks::STONE);
        assert!(m.remove_block_world(3, top + 1, 3));
        assert!(!m.remove_block_world(3, top + 1, 3));
        assert!(!m.add_block_world(3, 32, 3, blocks::STONE));
        assert_eq!(m.stats().modified_blocks, 1);
        assert!(m.ledger().is_dirty());
    }

    #[test]
    fn test_store_failure_keeps_world_running() {
        let store = FailingStore::default();
        let mut m = ChunkLifecycleManager::new(config("ro", 7), Box::new(store.clone()), NullRenderer::default())
            .unwrap();
        m.ensure_loaded_around(0, 0, 0);
        let top = m.top_solid_y_world(8, 8).unwrap();
        let t0 = Instant::now();
        assert!(m.remove_block_world(8, top, 8));

        m.tick(FrameBudget::Fallback, t0 + Duration::from_secs(5));
        m.save_now();
        assert!(store.attempts() >= 1);
        assert!(m.ledger().is_dirty());
        assert_eq!(m.ledger().modified_block_count(), 1);
        assert_eq!(m.block_world(8, top, 8), BlockId::EMPTY);
    }

    #[test]
    fn test_regenerate_replays_edits() {
        let mut m = manager();
        m.ensure_loaded_around(0, 0, 0);
        let top = m.top_solid_y_world(8, 8).unwrap();
        assert!(m.remove_block_world(8, top, 8));

        assert!(m.regenerate_chunk(ChunkCoord::new(0, 0)));
        assert_eq!(m.block_world(8, top, 8), BlockId::EMPTY);
        assert_eq!(m.chunk(ChunkCoord::new(0, 0)).unwrap().state(), ChunkState::DataReady);
        m.flush_work();
        assert_eq!(m.chunk(ChunkCoord::new(0, 0)).unwrap().state(), ChunkState::MeshReady);
        assert_eq!(m.stats().regenerated_total, 1);
        assert!(!m.regenerate_chunk(ChunkCoord::new(50, 50)));
    }

    #[test]
    fn test_update_params_regenerates_loaded_chunks() {
        let mut m = manager();
        m.update_streaming(0, 0, false);
        m.flush_work();
        let before = m.top_solid_y_world(4, 4).unwrap();

        let mut params = m.config().generation.clone();
        params.terrain.offset += 6.0;
        m.update_params(params).unwrap();
        // Anchor chunk regenerated synchronously
        assert!(m.top_solid_y_world(4, 4).unwrap() > before);
        m.flush_work();
        assert_eq!(m.stats().regenerated_total, 9);
        assert_eq!(m.stats().mesh_ready_chunks, 9);
    }

    #[test]
    fn test_update_params_rejects_invalid() {
        let mut m = manager();
        let mut params = m.config().generation.clone();
        params.terrain.octaves = 0;
        assert!(m.update_params(params).is_err());
        assert_eq!(m.config().generation.terrain.octaves, 4);
    }

    #[test]
    fn test_removal_reveals_neighbour_instances() {
        let mut m = ChunkLifecycleManager::new(
            config("reveal", 3),
            Box::new(MemoryStore::new()),
            InstanceRenderer::new(16),
        )
        .unwrap();
        m.ensure_loaded_around(0, 0, 0);
        let coord = ChunkCoord::new(0, 0);

        // A buried block two below the surface
        let grid = m.chunk(coord).unwrap().grid();
        let (x, z, top) = (1..15)
            .flat_map(|z| (1..15).map(move |x| (x, z)))
            .filter_map(|(x, z)| Some((x, z, m.top_solid_y_world(x, z)?)))
            .find(|&(x, z, top)| top >= 3 && grid.is_obscured(x, top - 2, z))
            .expect("some column has a buried block");
        let below = top - 2;
        assert_eq!(grid.instance(x, below, z), None);

        assert!(m.remove_block_world(x, top, z));
        assert!(m.remove_block_world(x, top - 1, z));
        let grid = m.chunk(coord).unwrap().grid();
        assert!(!grid.is_obscured(x, below, z));
        assert!(grid.instance(x, below, z).is_some());
    }
}

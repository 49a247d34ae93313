//! # Height Field Generator
//!
//! Fills one chunk's [`VoxelGrid`] from a [`WorldParams`] snapshot.
//!
//! ## Passes
//!
//! 1. **Height map**: every column's surface height, complete before any
//!    block is written so slope logic can see its neighbours.
//! 2. **Column fill**: bedrock, deep stone, biome subsurface and surface,
//!    beach override near the water, bare rock on steep slopes.
//! 3. **Ores**: 3D noise turns stone into resources.
//! 4. **Vegetation**: trees as voxels, or placement records.
//! 5. **Flora**: placement records only.
//!
//! Heights are sampled at *world* coordinates, so neighbouring chunks meet
//! without seams. Random choices come from ChaCha streams keyed by
//! `(seed, chunk origin, pass)`: output is a pure function of the snapshot and the
//! chunk coordinate.

use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::climate::{ClimateField, ClimateSample};
use crate::grid::{BlockId, ChunkCoord, VoxelGrid};
use crate::noise::SimplexNoise;
use crate::params::{BiomeDef, TreeArchetype, VegetationMode, WorldParams};

/// Seed purpose of the height noise.
const HEIGHT_NOISE_PURPOSE: u64 = 0x4845_4947_4854;
/// Seed purpose base of ore noise (one stream per resource).
const ORE_NOISE_PURPOSE: u64 = 0x4f52_4500;

/// Random stream purposes, one per pass.
const PASS_FILL: u64 = 1;
const PASS_TREES: u64 = 2;
const PASS_FLORA: u64 = 3;

/// 4-neighbour column offsets.
const COLUMN_NEIGHBOURS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Surface height of every column of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeightMap {
    width: u32,
    heights: Vec<i32>,
}

impl HeightMap {
    /// All-zero height map.
    #[must_use]
    pub fn new(width: u32) -> Self {
        Self {
            width,
            heights: vec![0; (width * width) as usize],
        }
    }

    /// Footprint width.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of local column `(x, z)`, or `None` outside the footprint.
    #[inline]
    #[must_use]
    pub fn get(&self, x: i32, z: i32) -> Option<i32> {
        let w = self.width as i32;
        if (0..w).contains(&x) && (0..w).contains(&z) {
            Some(self.heights[(z * w + x) as usize])
        } else {
            None
        }
    }

    #[inline]
    fn set(&mut self, x: i32, z: i32, height: i32) {
        let w = self.width as i32;
        self.heights[(z * w + x) as usize] = height;
    }

    /// Heights in z-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[i32] {
        &self.heights
    }
}

/// A tree left for an external model instancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreePlacement {
    /// Chunk-local X.
    pub x: i32,
    /// Y of the trunk base.
    pub y: i32,
    /// Chunk-local Z.
    pub z: i32,
    /// Archetype type id.
    pub type_id: u16,
}

/// A flora decoration for an external instancer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloraRecord {
    /// Chunk-local X.
    pub x: i32,
    /// Y of the cell the decoration occupies.
    pub y: i32,
    /// Chunk-local Z.
    pub z: i32,
    /// Flora type id.
    pub type_id: u16,
}

/// Everything generation produces besides the voxels themselves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedChunk {
    /// Surface heights (before vegetation).
    pub height_map: HeightMap,
    /// External-model trees (empty in voxel mode).
    pub trees: Vec<TreePlacement>,
    /// Flora records.
    pub flora: Vec<FloraRecord>,
}

/// Terrain generator bound to one parameter snapshot.
pub struct HeightFieldGenerator {
    params: Arc<WorldParams>,
    climate: ClimateField,
    height_noise: SimplexNoise,
    ore_noise: Vec<SimplexNoise>,
}

impl HeightFieldGenerator {
    /// Creates a generator for a snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `params.biomes` is empty. Run [`WorldParams::validate`]
    /// first on untrusted parameters.
    #[must_use]
    pub fn new(params: WorldParams) -> Self {
        let params = Arc::new(params);
        Self {
            climate: ClimateField::new(&params),
            height_noise: SimplexNoise::new(params.seed.derive(HEIGHT_NOISE_PURPOSE)),
            ore_noise: Self::ore_noise(&params),
            params,
        }
    }

    fn ore_noise(params: &WorldParams) -> Vec<SimplexNoise> {
        (0..params.resources.len() as u64)
            .map(|i| SimplexNoise::new(params.seed.derive(ORE_NOISE_PURPOSE + i)))
            .collect()
    }

    /// Current snapshot.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &Arc<WorldParams> {
        &self.params
    }

    /// The climate field.
    #[inline]
    #[must_use]
    pub fn climate(&self) -> &ClimateField {
        &self.climate
    }

    /// The climate field, for cache invalidation.
    #[inline]
    pub fn climate_mut(&mut self) -> &mut ClimateField {
        &mut self.climate
    }

    /// Swaps in a new snapshot.
    ///
    /// Noise is rebuilt and the climate cache dropped. Already generated
    /// chunks are untouched: callers regenerate them.
    ///
    /// # Panics
    ///
    /// Panics if `params.biomes` is empty.
    pub fn update_params(&mut self, params: WorldParams) {
        self.climate.reconfigure(&params);
        self.height_noise = SimplexNoise::new(params.seed.derive(HEIGHT_NOISE_PURPOSE));
        self.ore_noise = Self::ore_noise(&params);
        self.params = Arc::new(params);
    }

    /// Surface height of a world column for a chunk `height` tall.
    #[must_use]
    pub fn height_at(&self, world_x: i32, world_z: i32, height: u32) -> i32 {
        let sample = self.climate.sample(world_x, world_z);
        self.column_height(world_x, world_z, &sample, height)
    }

    /// Surface height of a world column given its climate.
    ///
    /// `floor(H · (offset/H + magnitude/H · fbm))`, clamped to `[0, H-1]`,
    /// with biome-blended magnitude and offset.
    fn column_height(&self, world_x: i32, world_z: i32, sample: &ClimateSample, height: u32) -> i32 {
        let terrain = &self.params.terrain;
        let (magnitude_scale, offset_shift) = self.blended_shape(sample);
        let magnitude = terrain.magnitude * magnitude_scale;
        let offset = terrain.offset + offset_shift;

        let h = f64::from(height);
        let noise = self.height_noise.fbm(
            f64::from(world_x) / terrain.scale,
            f64::from(world_z) / terrain.scale,
            terrain.octaves,
            terrain.gain,
            terrain.lacunarity,
        );
        let raw = (h * (offset / h + magnitude / h * noise)).floor();
        (raw as i32).clamp(0, height as i32 - 1)
    }

    fn blended_shape(&self, sample: &ClimateSample) -> (f64, f64) {
        let registry = self.climate.registry();
        match &sample.weights {
            Some(weights) => weights.iter().fold((0.0, 0.0), |(m, o), (id, w)| {
                let shape = registry.get(*id).shape;
                (m + shape.magnitude_scale * w, o + shape.offset_shift * w)
            }),
            None => {
                let shape = registry.get(sample.biome).shape;
                (shape.magnitude_scale, shape.offset_shift)
            }
        }
    }

    /// Generates chunk `coord` into `grid`, replacing its contents.
    pub fn generate(&mut self, grid: &mut VoxelGrid, coord: ChunkCoord) -> GeneratedChunk {
        let dims = grid.dims();
        let origin_x = coord.origin_x(dims.width);
        let origin_z = coord.origin_z(dims.width);
        let batch = self.climate.generate_batch(origin_x, origin_z, dims.width);
        grid.clear();

        // Pass 1: complete height map
        let w = dims.width_i32();
        let mut height_map = HeightMap::new(dims.width);
        for z in 0..w {
            for x in 0..w {
                let sample = batch.get(x as u32, z as u32);
                let height = self.column_height(origin_x + x, origin_z + z, sample, dims.height);
                height_map.set(x, z, height);
            }
        }

        // Pass 2: layered materials
        let mut rng = self.chunk_rng(origin_x, origin_z, PASS_FILL);
        for z in 0..w {
            for x in 0..w {
                let sample = batch.get(x as u32, z as u32);
                self.fill_column(grid, &height_map, &mut rng, sample, (origin_x, origin_z), x, z);
            }
        }

        // Pass 3: ores replace stone
        self.place_ores(grid, origin_x, origin_z);

        // Pass 4: vegetation
        let mut trees = Vec::new();
        let mut rng = self.chunk_rng(origin_x, origin_z, PASS_TREES);
        for z in 0..w {
            for x in 0..w {
                let sample = batch.get(x as u32, z as u32);
                let surface = height_map.get(x, z).unwrap_or(0);
                if let Some(placement) = self.grow_tree(grid, &mut rng, sample, x, surface, z) {
                    trees.push(placement);
                }
            }
        }

        // Pass 5: flora records
        let mut flora = Vec::new();
        let mut rng = self.chunk_rng(origin_x, origin_z, PASS_FLORA);
        for z in 0..w {
            for x in 0..w {
                let sample = batch.get(x as u32, z as u32);
                let surface = height_map.get(x, z).unwrap_or(0);
                if let Some(record) = self.place_flora(grid, &mut rng, sample, x, surface, z) {
                    flora.push(record);
                }
            }
        }

        debug!(
            chunk = %coord,
            trees = trees.len(),
            flora = flora.len(),
            "chunk generated"
        );

        GeneratedChunk {
            height_map,
            trees,
            flora,
        }
    }

    fn chunk_rng(&self, origin_x: i32, origin_z: i32, pass: u64) -> ChaCha8Rng {
        let packed = (u64::from(origin_x as u32) << 32) | u64::from(origin_z as u32);
        ChaCha8Rng::seed_from_u64(self.params.seed.derive(pass).derive(packed).value())
    }

    /// Material biome of a column: canonical, or drawn by blend weight.
    fn material_biome(&self, sample: &ClimateSample, rng: &mut ChaCha8Rng) -> &BiomeDef {
        let registry = self.climate.registry();
        if let Some(weights) = &sample.weights {
            if let Ok(dist) = WeightedIndex::new(weights.iter().map(|(_, w)| *w)) {
                return registry.get(weights[dist.sample(rng)].0);
            }
        }
        registry.get(sample.biome)
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_column(
        &self,
        grid: &mut VoxelGrid,
        heights: &HeightMap,
        rng: &mut ChaCha8Rng,
        sample: &ClimateSample,
        (origin_x, origin_z): (i32, i32),
        x: i32,
        z: i32,
    ) {
        let params = &*self.params;
        let dims = grid.dims();
        let surface = heights.get(x, z).unwrap_or(0);
        let biome = self.material_biome(sample, rng);

        let beach = surface <= params.water.offset + params.water.shore_depth;
        let exposure = params.terrain.exposure;
        let steep = COLUMN_NEIGHBOURS.iter().any(|&(dx, dz)| {
            let neighbour = heights.get(x + dx, z + dz).unwrap_or_else(|| {
                self.height_at(origin_x + x + dx, origin_z + z + dz, dims.height)
            });
            neighbour <= surface - exposure.slope_threshold
        });

        let deep_top = surface - params.terrain.soil_depth as i32;
        for y in 0..=surface {
            let id = match params.blocks.bedrock {
                Some(bedrock) if y == 0 => bedrock,
                _ if y <= deep_top => params.blocks.stone,
                _ if steep && y > surface - exposure.max_depth => params.blocks.rock,
                _ if beach => params.blocks.beach,
                _ if y == surface => biome.surface,
                _ => biome.subsurface,
            };
            grid.set_block_id(x, y, z, id);
        }
    }

    fn place_ores(&self, grid: &mut VoxelGrid, origin_x: i32, origin_z: i32) {
        let dims = grid.dims();
        let stone = self.params.blocks.stone;
        for (resource, noise) in self.params.resources.iter().zip(&self.ore_noise) {
            let [sx, sy, sz] = resource.scale;
            for y in 0..dims.height_i32() {
                for z in 0..dims.width_i32() {
                    for x in 0..dims.width_i32() {
                        if grid.block_id(x, y, z) != stone {
                            continue;
                        }
                        let value = noise.sample3(
                            f64::from(origin_x + x) / sx,
                            f64::from(y) / sy,
                            f64::from(origin_z + z) / sz,
                        );
                        if value > resource.scarcity {
                            grid.set_block_id(x, y, z, resource.id);
                        }
                    }
                }
            }
        }
    }

    fn grow_tree(
        &self,
        grid: &mut VoxelGrid,
        rng: &mut ChaCha8Rng,
        sample: &ClimateSample,
        x: i32,
        surface: i32,
        z: i32,
    ) -> Option<TreePlacement> {
        let params = &*self.params;
        let biome = self.climate.registry().get(sample.biome);
        if biome.trees.is_empty() || biome.tree_density <= 0.0 {
            return None;
        }
        if !params.vegetation.allowed_surfaces.contains(&grid.block_id(x, surface, z)) {
            return None;
        }
        if !grid.block_id(x, surface + 1, z).is_empty() {
            return None;
        }
        if rng.gen::<f64>() >= biome.tree_density * params.vegetation.frequency {
            return None;
        }

        let dist = WeightedIndex::new(biome.trees.iter().map(|t| t.weight)).ok()?;
        let archetype = &biome.trees[dist.sample(rng)];
        let trunk_height = rng.gen_range(archetype.trunk_height[0]..=archetype.trunk_height[1]) as i32;
        let canopy_radius = rng.gen_range(archetype.canopy_radius[0]..=archetype.canopy_radius[1]) as i32;
        let base = surface + 1;

        match params.vegetation.mode {
            VegetationMode::ExternalModel => Some(TreePlacement {
                x,
                y: base,
                z,
                type_id: archetype.type_id,
            }),
            VegetationMode::Voxel => {
                self.stamp_tree(grid, rng, archetype, (x, base, z), trunk_height, canopy_radius);
                None
            }
        }
    }

    fn stamp_tree(
        &self,
        grid: &mut VoxelGrid,
        rng: &mut ChaCha8Rng,
        archetype: &TreeArchetype,
        (x, base, z): (i32, i32, i32),
        trunk_height: i32,
        canopy_radius: i32,
    ) {
        for y in base..base + trunk_height {
            if grid.block_id(x, y, z).is_empty() {
                grid.set_block_id(x, y, z, archetype.trunk);
            }
        }

        if canopy_radius == 0 {
            return;
        }
        let top = base + trunk_height - 1;
        let r = canopy_radius;
        for dy in -r..=r {
            for dz in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy + dz * dz > r * r {
                        continue;
                    }
                    // Thinning roll happens for every cell so the stream
                    // does not depend on what is already there.
                    let keep = rng.gen::<f64>() < self.params.vegetation.canopy_density;
                    let (lx, ly, lz) = (x + dx, top + dy, z + dz);
                    if keep && grid.block_id(lx, ly, lz).is_empty() {
                        grid.set_block_id(lx, ly, lz, archetype.leaves);
                    }
                }
            }
        }
    }

    fn place_flora(
        &self,
        grid: &VoxelGrid,
        rng: &mut ChaCha8Rng,
        sample: &ClimateSample,
        x: i32,
        surface: i32,
        z: i32,
    ) -> Option<FloraRecord> {
        let params = &*self.params;
        let biome = self.climate.registry().get(sample.biome);
        if biome.flora.is_empty() || biome.flora_density <= 0.0 {
            return None;
        }
        if rng.gen::<f64>() >= biome.flora_density * params.flora.frequency {
            return None;
        }
        let y = surface + 1;
        if !grid.in_bounds(x, y, z) || !grid.block_id(x, y, z).is_empty() {
            return None;
        }
        let ground = grid.block_id(x, surface, z);
        if ground.is_empty() || params.is_foliage(ground) {
            return None;
        }
        let dist = WeightedIndex::new(biome.flora.iter().map(|f| f.weight)).ok()?;
        Some(FloraRecord {
            x,
            y,
            z,
            type_id: biome.flora[dist.sample(rng)].type_id,
        })
    }
}

/// Height of the topmost block of `grid` column `(x, z)` that is not foliage.
#[must_use]
pub fn top_solid_y(grid: &VoxelGrid, params: &WorldParams, x: i32, z: i32) -> Option<i32> {
    grid.top_filled_y(x, z, |id: BlockId| params.is_foliage(id))
}

//! # STRATA Procedural Generation
//!
//! Deterministic terrain for an infinite, chunked voxel world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: same parameter snapshot and chunk coordinate, same voxels
//! 2. **Seamless**: every sample is taken at world coordinates
//! 3. **Snapshot-driven**: parameters are immutable; changing them means regenerating
//!
//! ## Core Components
//!
//! - `SimplexNoise`: seeded 2D/3D noise and fBm
//! - `VoxelGrid`: one chunk's block ids and render instance handles
//! - `ClimateField`: temperature/humidity, biome classification and blending
//! - `HeightFieldGenerator`: height map, layered fill, ores, vegetation, flora
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_procedural::{ChunkCoord, ChunkDims, HeightFieldGenerator, VoxelGrid, WorldParams};
//!
//! let mut generator = HeightFieldGenerator::new(WorldParams::with_seed(1337));
//! let mut grid = VoxelGrid::new(ChunkDims::new(64, 32));
//! let out = generator.generate(&mut grid, ChunkCoord::new(0, 0));
//!
//! let surface = out.height_map.get(32, 32).unwrap();
//! assert!(!grid.block_id(32, surface, 32).is_empty());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

pub mod climate;
pub mod error;
pub mod grid;
pub mod noise;
pub mod params;
pub mod terrain;

pub use climate::{BiomeRegistry, ClimateBatch, ClimateField, ClimateSample};
pub use error::{ConfigError, ConfigResult};
pub use grid::{
    world_to_local, BlockCell, BlockId, ChunkCoord, ChunkDims, InstanceId, VoxelGrid, FACE_NEIGHBOURS,
};
pub use noise::{SimplexNoise, WorldSeed};
pub use params::{
    blocks, BiomeDef, BiomeId, BlockPalette, ClimateParams, ClimateRange, ExposureParams, FloraKind,
    FloraParams, ResourceParams, TerrainParams, TerrainShape, TreeArchetype, VegetationMode,
    VegetationParams, WaterParams, WorldParams,
};
pub use terrain::{
    top_solid_y, FloraRecord, GeneratedChunk, HeightFieldGenerator, HeightMap, TreePlacement,
};

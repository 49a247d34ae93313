//! # Generation Parameters
//!
//! Every knob that affects terrain output lives in one immutable snapshot,
//! [`WorldParams`]. Generators receive the snapshot explicitly; changing a
//! knob means building a new snapshot and regenerating, never mutating a
//! shared object in place.
//!
//! Parameters are plain data and load from TOML:
//!
//! ```toml
//! seed = 1337
//!
//! [terrain]
//! scale = 168.0
//! magnitude = 6.0
//! offset = 8.0
//!
//! [[resources]]
//! name = "coal"
//! id = 5
//! scale = [20.0, 20.0, 20.0]
//! scarcity = 0.8
//! ```
//!
//! Anything omitted takes its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::grid::BlockId;
use crate::noise::WorldSeed;

/// Default block ids used by the built-in palette and biomes.
pub mod blocks {
    use crate::grid::BlockId;

    /// Grass.
    pub const GRASS: BlockId = BlockId(1);
    /// Dirt.
    pub const DIRT: BlockId = BlockId(2);
    /// Generic stone (ore host).
    pub const STONE: BlockId = BlockId(3);
    /// Sand.
    pub const SAND: BlockId = BlockId(4);
    /// Coal ore.
    pub const COAL_ORE: BlockId = BlockId(5);
    /// Iron ore.
    pub const IRON_ORE: BlockId = BlockId(6);
    /// Oak trunk.
    pub const TRUNK: BlockId = BlockId(7);
    /// Oak leaves.
    pub const LEAVES: BlockId = BlockId(8);
    /// Snow.
    pub const SNOW: BlockId = BlockId(9);
    /// Bedrock.
    pub const BEDROCK: BlockId = BlockId(10);
    /// Jungle trunk.
    pub const JUNGLE_TRUNK: BlockId = BlockId(11);
    /// Jungle leaves.
    pub const JUNGLE_LEAVES: BlockId = BlockId(12);
    /// Cactus.
    pub const CACTUS: BlockId = BlockId(13);
    /// Jungle grass.
    pub const JUNGLE_GRASS: BlockId = BlockId(14);
}

/// Biome identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiomeId(pub u16);

/// Closed interval on a normalized climate axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimateRange {
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound (inclusive).
    pub max: f64,
}

impl ClimateRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True if `value` lies inside the range.
    #[inline]
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Midpoint.
    #[inline]
    #[must_use]
    pub fn center(self) -> f64 {
        (self.min + self.max) * 0.5
    }

    /// Half the width.
    #[inline]
    #[must_use]
    pub fn half_extent(self) -> f64 {
        (self.max - self.min) * 0.5
    }
}

/// Per-biome terrain shape modifiers, blended across biome borders.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainShape {
    /// Multiplier on the global terrain magnitude.
    pub magnitude_scale: f64,
    /// Blocks added to the global terrain offset.
    pub offset_shift: f64,
}

impl Default for TerrainShape {
    fn default() -> Self {
        Self {
            magnitude_scale: 1.0,
            offset_shift: 0.0,
        }
    }
}

/// A tree shape that vegetation can stamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeArchetype {
    /// Type id reported in external-model placements.
    pub type_id: u16,
    /// Relative selection weight inside its biome.
    pub weight: f64,
    /// Trunk block.
    pub trunk: BlockId,
    /// Canopy block.
    pub leaves: BlockId,
    /// Trunk height range `[min, max]` in blocks.
    pub trunk_height: [u32; 2],
    /// Canopy radius range `[min, max]`; `[0, 0]` means no canopy.
    pub canopy_radius: [u32; 2],
}

/// A small decoration reported to an external instancer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloraKind {
    /// Type id reported in flora records.
    pub type_id: u16,
    /// Relative selection weight inside its biome.
    pub weight: f64,
}

/// A named climate classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeDef {
    /// Identifier.
    pub id: BiomeId,
    /// Human-readable name.
    pub name: String,
    /// Temperature rectangle edge.
    pub temperature: ClimateRange,
    /// Humidity rectangle edge.
    pub humidity: ClimateRange,
    /// Terrain shape modifiers.
    #[serde(default)]
    pub shape: TerrainShape,
    /// Top block of a column.
    pub surface: BlockId,
    /// Blocks between the surface and deep stone.
    pub subsurface: BlockId,
    /// Chance per eligible column of a tree, before the global frequency.
    #[serde(default)]
    pub tree_density: f64,
    /// Trees this biome grows.
    #[serde(default)]
    pub trees: Vec<TreeArchetype>,
    /// Chance per column of a flora record, before the global frequency.
    #[serde(default)]
    pub flora_density: f64,
    /// Flora this biome grows.
    #[serde(default)]
    pub flora: Vec<FloraKind>,
}

/// Height field shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Horizontal noise scale in blocks (larger = smoother).
    pub scale: f64,
    /// Height variation in blocks.
    pub magnitude: f64,
    /// Base height in blocks.
    pub offset: f64,
    /// fBm octaves.
    pub octaves: u32,
    /// fBm amplitude decay per octave.
    pub gain: f64,
    /// fBm frequency growth per octave.
    pub lacunarity: f64,
    /// Depth of the biome subsurface layer.
    pub soil_depth: u32,
    /// Steep-slope rock exposure.
    pub exposure: ExposureParams,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            scale: 168.0,
            magnitude: 6.0,
            offset: 8.0,
            octaves: 4,
            gain: 0.5,
            lacunarity: 2.0,
            soil_depth: 3,
            exposure: ExposureParams::default(),
        }
    }
}

/// Steep columns expose bare rock near their surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureParams {
    /// A 4-neighbour at least this many blocks lower makes a column steep.
    pub slope_threshold: i32,
    /// How many blocks below the surface the rock reaches.
    pub max_depth: i32,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            slope_threshold: 3,
            max_depth: 2,
        }
    }
}

/// Climate field knobs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateParams {
    /// Horizontal noise scale in blocks.
    pub scale: f64,
    /// Extra normalized distance outside a biome rectangle that still blends.
    pub blend_threshold: f64,
    /// Biome used when no rectangle matches or an id is unknown.
    pub default_biome: BiomeId,
}

impl Default for ClimateParams {
    fn default() -> Self {
        Self {
            scale: 512.0,
            blend_threshold: 0.25,
            default_biome: BiomeId(1),
        }
    }
}

/// Water level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterParams {
    /// Water surface height.
    pub offset: i32,
    /// Columns up to this many blocks above the water become beach.
    pub shore_depth: i32,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            offset: 4,
            shore_depth: 1,
        }
    }
}

/// Biome-independent materials.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockPalette {
    /// Deep layer and ore host.
    pub stone: BlockId,
    /// Material of exposed steep slopes.
    pub rock: BlockId,
    /// Shared beach material.
    pub beach: BlockId,
    /// Optional floor at y = 0.
    pub bedrock: Option<BlockId>,
    /// Blocks that never count as solid ground.
    pub foliage: Vec<BlockId>,
}

impl Default for BlockPalette {
    fn default() -> Self {
        Self {
            stone: blocks::STONE,
            rock: blocks::STONE,
            beach: blocks::SAND,
            bedrock: Some(blocks::BEDROCK),
            foliage: vec![blocks::LEAVES, blocks::JUNGLE_LEAVES],
        }
    }
}

/// An ore that replaces stone where its noise is high.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceParams {
    /// Name, for logs.
    pub name: String,
    /// Ore block.
    pub id: BlockId,
    /// Noise scale per axis (x, y, z).
    pub scale: [f64; 3],
    /// Noise value the sample must exceed.
    pub scarcity: f64,
}

/// Whether trees become voxels or placement records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VegetationMode {
    /// Stamp trunk and canopy voxels.
    #[default]
    Voxel,
    /// Emit [`crate::terrain::TreePlacement`] records only.
    ExternalModel,
}

/// Global vegetation knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationParams {
    /// Multiplier on every biome's tree density.
    pub frequency: f64,
    /// Chance that a canopy cell inside the sphere is filled.
    pub canopy_density: f64,
    /// Voxel or external-model trees.
    pub mode: VegetationMode,
    /// Surface blocks a tree may grow from.
    pub allowed_surfaces: Vec<BlockId>,
}

impl Default for VegetationParams {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            canopy_density: 0.7,
            mode: VegetationMode::Voxel,
            allowed_surfaces: vec![
                blocks::GRASS,
                blocks::JUNGLE_GRASS,
                blocks::SNOW,
                blocks::SAND,
            ],
        }
    }
}

/// Global flora knobs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloraParams {
    /// Multiplier on every biome's flora density.
    pub frequency: f64,
}

impl Default for FloraParams {
    fn default() -> Self {
        Self { frequency: 1.0 }
    }
}

/// Complete, immutable generation snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// World seed.
    pub seed: WorldSeed,
    /// Height field.
    pub terrain: TerrainParams,
    /// Climate field.
    pub climate: ClimateParams,
    /// Water level.
    pub water: WaterParams,
    /// Shared materials.
    pub blocks: BlockPalette,
    /// Ores, applied in declaration order.
    pub resources: Vec<ResourceParams>,
    /// Trees.
    pub vegetation: VegetationParams,
    /// Flora.
    pub flora: FloraParams,
    /// Biomes in match order: the first rectangle containing a climate
    /// sample wins.
    pub biomes: Vec<BiomeDef>,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            seed: WorldSeed::default(),
            terrain: TerrainParams::default(),
            climate: ClimateParams::default(),
            water: WaterParams::default(),
            blocks: BlockPalette::default(),
            resources: default_resources(),
            vegetation: VegetationParams::default(),
            flora: FloraParams::default(),
            biomes: default_biomes(),
        }
    }
}

impl WorldParams {
    /// Default parameters with a given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: WorldSeed::new(seed),
            ..Self::default()
        }
    }

    /// Parses and validates parameters from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let params: Self = toml::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Reads, parses and validates parameters from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_toml_path(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every constraint generation relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !is_positive(self.terrain.scale) {
            return invalid(format!("terrain.scale must be positive, got {}", self.terrain.scale));
        }
        if self.terrain.octaves == 0 {
            return invalid("terrain.octaves must be at least 1".into());
        }
        if !is_positive(self.climate.scale) {
            return invalid(format!("climate.scale must be positive, got {}", self.climate.scale));
        }
        if self.biomes.is_empty() {
            return invalid("at least one biome is required".into());
        }
        if !self.biomes.iter().any(|b| b.id == self.climate.default_biome) {
            return invalid(format!(
                "climate.default_biome {} is not a declared biome",
                self.climate.default_biome.0
            ));
        }
        for biome in &self.biomes {
            if biome.temperature.min > biome.temperature.max || biome.humidity.min > biome.humidity.max {
                return invalid(format!("biome '{}' has an inverted climate range", biome.name));
            }
            for tree in &biome.trees {
                if tree.trunk_height[0] > tree.trunk_height[1] || tree.canopy_radius[0] > tree.canopy_radius[1] {
                    return invalid(format!(
                        "tree {} in biome '{}' has an inverted range",
                        tree.type_id, biome.name
                    ));
                }
                if tree.weight < 0.0 {
                    return invalid(format!("tree {} has a negative weight", tree.type_id));
                }
            }
            if biome.flora.iter().any(|f| f.weight < 0.0) {
                return invalid(format!("biome '{}' has a negative flora weight", biome.name));
            }
        }
        for resource in &self.resources {
            if !resource.scale.iter().copied().all(is_positive) {
                return invalid(format!("resource '{}' needs positive scales", resource.name));
            }
        }
        Ok(())
    }

    /// True if `id` is foliage (never solid ground).
    #[inline]
    #[must_use]
    pub fn is_foliage(&self, id: BlockId) -> bool {
        self.blocks.foliage.contains(&id)
    }
}

/// NaN-safe `value > 0`.
fn is_positive(value: f64) -> bool {
    value > 0.0
}

fn default_resources() -> Vec<ResourceParams> {
    vec![
        ResourceParams {
            name: "coal".into(),
            id: blocks::COAL_ORE,
            scale: [20.0, 20.0, 20.0],
            scarcity: 0.8,
        },
        ResourceParams {
            name: "iron".into(),
            id: blocks::IRON_ORE,
            scale: [40.0, 40.0, 40.0],
            scarcity: 0.9,
        },
    ]
}

fn oak() -> TreeArchetype {
    TreeArchetype {
        type_id: 1,
        weight: 1.0,
        trunk: blocks::TRUNK,
        leaves: blocks::LEAVES,
        trunk_height: [4, 6],
        canopy_radius: [2, 3],
    }
}

/// Built-in biome table.
///
/// Ranges touch at their borders; declaration order decides the shared edge.
fn default_biomes() -> Vec<BiomeDef> {
    vec![
        BiomeDef {
            id: BiomeId(0),
            name: "tundra".into(),
            temperature: ClimateRange::new(0.0, 0.35),
            humidity: ClimateRange::new(0.0, 1.0),
            shape: TerrainShape {
                magnitude_scale: 1.2,
                offset_shift: 1.0,
            },
            surface: blocks::SNOW,
            subsurface: blocks::DIRT,
            tree_density: 0.005,
            trees: vec![oak()],
            flora_density: 0.0,
            flora: Vec::new(),
        },
        BiomeDef {
            id: BiomeId(1),
            name: "temperate".into(),
            temperature: ClimateRange::new(0.35, 0.65),
            humidity: ClimateRange::new(0.0, 1.0),
            shape: TerrainShape::default(),
            surface: blocks::GRASS,
            subsurface: blocks::DIRT,
            tree_density: 0.02,
            trees: vec![oak()],
            flora_density: 0.05,
            flora: vec![
                FloraKind { type_id: 1, weight: 1.0 },
                FloraKind { type_id: 2, weight: 3.0 },
            ],
        },
        BiomeDef {
            id: BiomeId(2),
            name: "jungle".into(),
            temperature: ClimateRange::new(0.65, 1.0),
            humidity: ClimateRange::new(0.5, 1.0),
            shape: TerrainShape {
                magnitude_scale: 1.1,
                offset_shift: 0.0,
            },
            surface: blocks::JUNGLE_GRASS,
            subsurface: blocks::DIRT,
            tree_density: 0.05,
            trees: vec![
                TreeArchetype {
                    type_id: 2,
                    weight: 3.0,
                    trunk: blocks::JUNGLE_TRUNK,
                    leaves: blocks::JUNGLE_LEAVES,
                    trunk_height: [6, 9],
                    canopy_radius: [3, 4],
                },
                TreeArchetype {
                    weight: 1.0,
                    ..oak()
                },
            ],
            flora_density: 0.08,
            flora: vec![FloraKind { type_id: 3, weight: 1.0 }],
        },
        BiomeDef {
            id: BiomeId(3),
            name: "desert".into(),
            temperature: ClimateRange::new(0.65, 1.0),
            humidity: ClimateRange::new(0.0, 0.5),
            shape: TerrainShape {
                magnitude_scale: 0.6,
                offset_shift: -1.0,
            },
            surface: blocks::SAND,
            subsurface: blocks::SAND,
            tree_density: 0.004,
            trees: vec![TreeArchetype {
                type_id: 3,
                weight: 1.0,
                trunk: blocks::CACTUS,
                leaves: blocks::CACTUS,
                trunk_height: [2, 4],
                canopy_radius: [0, 0],
            }],
            flora_density: 0.01,
            flora: vec![FloraKind { type_id: 4, weight: 1.0 }],
        },
    ]
}

//! # Climate Field
//!
//! Determines biomes from two independent coherent-noise fields.
//!
//! - Temperature: simplex seeded at `seed + TEMPERATURE_SEED_OFFSET`
//! - Humidity: simplex seeded at `seed + HUMIDITY_SEED_OFFSET`
//!
//! Both are normalized from [-1, 1] to [0, 1]. A biome owns a rectangle in
//! (temperature, humidity) space. Two different questions get two different
//! answers:
//!
//! - **Canonical biome**: the first biome, in registry order, whose
//!   rectangle contains the sample. Rectangles may overlap; order is the
//!   tie-break.
//! - **Blend weights**: every biome whose normalized distance to its
//!   rectangle centre is below `1 + blend_threshold`, weighted by inverse
//!   distance. The canonical biome always takes part.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::noise::SimplexNoise;
use crate::params::{BiomeDef, BiomeId, ClimateParams, WorldParams};

/// Seed offset of the temperature field.
pub const TEMPERATURE_SEED_OFFSET: u64 = 1;
/// Seed offset of the humidity field.
pub const HUMIDITY_SEED_OFFSET: u64 = 2;

/// Keeps inverse-distance weights finite at a rectangle centre.
const BLEND_EPSILON: f64 = 1e-6;

/// Ordered biome table.
///
/// Classification is a linear scan in declaration order; the first
/// containing rectangle wins.
#[derive(Clone, Debug)]
pub struct BiomeRegistry {
    biomes: Vec<BiomeDef>,
    default_index: usize,
}

impl BiomeRegistry {
    /// Builds a registry. An unknown `default` falls back to the first biome.
    ///
    /// # Panics
    ///
    /// Panics if `biomes` is empty; [`WorldParams::validate`] rejects that.
    #[must_use]
    pub fn new(biomes: Vec<BiomeDef>, default: BiomeId) -> Self {
        assert!(!biomes.is_empty(), "biome registry needs at least one biome");
        let default_index = biomes.iter().position(|b| b.id == default).unwrap_or_else(|| {
            warn!(biome = default.0, "default biome not declared, using first biome");
            0
        });
        Self {
            biomes,
            default_index,
        }
    }

    /// The fallback biome.
    #[inline]
    #[must_use]
    pub fn default_biome(&self) -> &BiomeDef {
        &self.biomes[self.default_index]
    }

    /// Looks a biome up by id; unknown ids log and yield the default.
    #[must_use]
    pub fn get(&self, id: BiomeId) -> &BiomeDef {
        self.biomes.iter().find(|b| b.id == id).unwrap_or_else(|| {
            warn!(biome = id.0, "unknown biome id, using default");
            self.default_biome()
        })
    }

    /// Canonical biome of a climate point: first containing rectangle.
    #[must_use]
    pub fn classify(&self, temperature: f64, humidity: f64) -> &BiomeDef {
        self.biomes
            .iter()
            .find(|b| b.temperature.contains(temperature) && b.humidity.contains(humidity))
            .unwrap_or_else(|| self.default_biome())
    }

    /// Biomes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &BiomeDef> {
        self.biomes.iter()
    }

    /// Number of biomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    /// Always false; a registry holds at least one biome.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }
}

/// Climate of one world column.
#[derive(Clone, Debug, PartialEq)]
pub struct ClimateSample {
    /// Canonical biome.
    pub biome: BiomeId,
    /// Normalized temperature in [0, 1].
    pub temperature: f64,
    /// Normalized humidity in [0, 1].
    pub humidity: f64,
    /// Blend weights summing to 1, or `None` when one biome dominates.
    pub weights: Option<Vec<(BiomeId, f64)>>,
}

/// Climate samples of a `width × width` chunk footprint.
#[derive(Clone, Debug)]
pub struct ClimateBatch {
    /// World X of the footprint origin.
    pub origin_x: i32,
    /// World Z of the footprint origin.
    pub origin_z: i32,
    /// Footprint width.
    pub width: u32,
    samples: Vec<ClimateSample>,
}

impl ClimateBatch {
    /// Sample at local column `(x, z)`.
    ///
    /// # Panics
    ///
    /// Panics if the column lies outside the footprint.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, z: u32) -> &ClimateSample {
        &self.samples[(z * self.width + x) as usize]
    }
}

/// Seeded temperature/humidity field with a per-chunk batch cache.
pub struct ClimateField {
    params: ClimateParams,
    registry: BiomeRegistry,
    temperature: SimplexNoise,
    humidity: SimplexNoise,
    cache: HashMap<(i32, i32), Arc<ClimateBatch>>,
}

impl ClimateField {
    /// Creates a field from a parameter snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `params.biomes` is empty; see [`BiomeRegistry::new`].
    #[must_use]
    pub fn new(params: &WorldParams) -> Self {
        Self {
            params: params.climate,
            registry: BiomeRegistry::new(params.biomes.clone(), params.climate.default_biome),
            temperature: SimplexNoise::new(params.seed.offset(TEMPERATURE_SEED_OFFSET)),
            humidity: SimplexNoise::new(params.seed.offset(HUMIDITY_SEED_OFFSET)),
            cache: HashMap::new(),
        }
    }

    /// Rebuilds noise and registry from a new snapshot and drops the cache.
    ///
    /// # Panics
    ///
    /// Panics if `params.biomes` is empty.
    pub fn reconfigure(&mut self, params: &WorldParams) {
        *self = Self::new(params);
    }

    /// The biome table.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &BiomeRegistry {
        &self.registry
    }

    /// Normalized (temperature, humidity) of a world column.
    #[must_use]
    pub fn climate_at(&self, x: i32, z: i32) -> (f64, f64) {
        let sx = f64::from(x) / self.params.scale;
        let sz = f64::from(z) / self.params.scale;
        let normalize = |n: f64| ((n + 1.0) * 0.5).clamp(0.0, 1.0);
        (
            normalize(self.temperature.sample(sx, sz)),
            normalize(self.humidity.sample(sx, sz)),
        )
    }

    /// Full climate sample of a world column.
    #[must_use]
    pub fn sample(&self, x: i32, z: i32) -> ClimateSample {
        let (temperature, humidity) = self.climate_at(x, z);
        let biome = self.registry.classify(temperature, humidity).id;
        ClimateSample {
            biome,
            temperature,
            humidity,
            weights: self.blend_weights(temperature, humidity, biome),
        }
    }

    /// Blend weights of a world column.
    #[must_use]
    pub fn blend_weights_at(&self, x: i32, z: i32) -> Option<Vec<(BiomeId, f64)>> {
        self.sample(x, z).weights
    }

    /// Inverse-distance blend weights around a climate point.
    ///
    /// Returns `None` when fewer than two biomes take part.
    #[must_use]
    pub fn blend_weights(
        &self,
        temperature: f64,
        humidity: f64,
        canonical: BiomeId,
    ) -> Option<Vec<(BiomeId, f64)>> {
        let limit = 1.0 + self.params.blend_threshold;
        let mut candidates: Vec<(BiomeId, f64)> = Vec::new();

        for biome in self.registry.iter() {
            let dt = (temperature - biome.temperature.center())
                / biome.temperature.half_extent().max(f64::EPSILON);
            let dh = (humidity - biome.humidity.center())
                / biome.humidity.half_extent().max(f64::EPSILON);
            let distance = dt.hypot(dh);
            if distance < limit || biome.id == canonical {
                candidates.push((biome.id, distance));
            }
        }

        if candidates.len() <= 1 {
            return None;
        }

        for (_, value) in &mut candidates {
            *value = 1.0 / (*value + BLEND_EPSILON);
        }
        let total: f64 = candidates.iter().map(|(_, w)| w).sum();
        for (_, value) in &mut candidates {
            *value /= total;
        }
        Some(candidates)
    }

    /// Samples a `width × width` footprint, cached by origin.
    pub fn generate_batch(&mut self, origin_x: i32, origin_z: i32, width: u32) -> Arc<ClimateBatch> {
        if let Some(batch) = self.cache.get(&(origin_x, origin_z)) {
            if batch.width == width {
                return Arc::clone(batch);
            }
        }

        let mut samples = Vec::with_capacity((width * width) as usize);
        for z in 0..width as i32 {
            for x in 0..width as i32 {
                samples.push(self.sample(origin_x + x, origin_z + z));
            }
        }
        let batch = Arc::new(ClimateBatch {
            origin_x,
            origin_z,
            width,
            samples,
        });
        self.cache.insert((origin_x, origin_z), Arc::clone(&batch));
        batch
    }

    /// Drops one cached footprint (chunk unload).
    pub fn invalidate(&mut self, origin_x: i32, origin_z: i32) {
        self.cache.remove(&(origin_x, origin_z));
    }

    /// Drops every cached footprint (parameter change).
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached footprints.
    #[must_use]
    pub fn cached_batches(&self) -> usize {
        self.cache.len()
    }
}

//! # Terrain Quality Tests
//!
//! Whole-chunk properties: reproducibility, seamless edges, sensible columns.

use strata_procedural::{
    blocks, top_solid_y, ChunkCoord, ChunkDims, HeightFieldGenerator, VoxelGrid, WorldParams,
};

fn reference_params() -> WorldParams {
    let mut params = WorldParams::with_seed(1337);
    params.terrain.scale = 168.0;
    params.terrain.magnitude = 6.0;
    params.terrain.offset = 8.0;
    params
}

/// Test: The reference configuration gives a solid, reproducible column.
#[test]
fn test_reference_column_is_reproducible() {
    let dims = ChunkDims::new(64, 32);
    let coord = ChunkCoord::new(0, 0);

    let mut first = VoxelGrid::new(dims);
    let out = HeightFieldGenerator::new(reference_params()).generate(&mut first, coord);
    let mut second = VoxelGrid::new(dims);
    HeightFieldGenerator::new(reference_params()).generate(&mut second, coord);

    let surface = out.height_map.get(32, 32).expect("column inside chunk");
    let top = first.block_id(32, surface, 32);
    assert!(!top.is_empty(), "surface block at (32, {surface}, 32) is empty");
    assert_eq!(top, second.block_id(32, surface, 32));
    assert_eq!(first.filled_count(), second.filled_count());
}

/// Test: Heights agree along every edge of a 3x3 block of chunks.
#[test]
fn test_no_seams_between_neighbours() {
    let dims = ChunkDims::new(32, 32);
    let mut generator = HeightFieldGenerator::new(WorldParams::with_seed(2024));

    for cz in -1..=1 {
        for cx in -1..=1 {
            let mut grid = VoxelGrid::new(dims);
            let out = generator.generate(&mut grid, ChunkCoord::new(cx, cz));
            let (ox, oz) = (cx * 32, cz * 32);
            for i in 0..32 {
                // Edge columns must match the world-space height function
                for (x, z) in [(0, i), (31, i), (i, 0), (i, 31)] {
                    assert_eq!(
                        out.height_map.get(x, z),
                        Some(generator.height_at(ox + x, oz + z, dims.height)),
                        "seam at world ({}, {})",
                        ox + x,
                        oz + z
                    );
                }
            }
        }
    }
}

/// Test: Neighbouring surface heights stay close with the default knobs.
#[test]
fn test_terrain_is_walkable() {
    let dims = ChunkDims::new(64, 32);
    let mut generator = HeightFieldGenerator::new(reference_params());
    let mut grid = VoxelGrid::new(dims);
    let out = generator.generate(&mut grid, ChunkCoord::new(3, -2));

    let mut cliffs = 0;
    for z in 0..63 {
        for x in 0..63 {
            let h = out.height_map.get(x, z).unwrap();
            let dx = (h - out.height_map.get(x + 1, z).unwrap()).abs();
            let dz = (h - out.height_map.get(x, z + 1).unwrap()).abs();
            if dx > 1 || dz > 1 {
                cliffs += 1;
            }
        }
    }
    assert!(cliffs < 64 * 64 / 10, "too many cliffs: {cliffs}");
}

/// Test: Every column has a solid top that is not foliage.
#[test]
fn test_every_column_has_ground() {
    let params = reference_params();
    let mut generator = HeightFieldGenerator::new(params.clone());
    let mut grid = VoxelGrid::new(ChunkDims::new(64, 32));
    let out = generator.generate(&mut grid, ChunkCoord::new(-5, 7));

    for z in 0..64 {
        for x in 0..64 {
            let top = top_solid_y(&grid, &params, x, z).expect("column has ground");
            assert!(top >= out.height_map.get(x, z).unwrap());
            assert!(!params.is_foliage(grid.block_id(x, top, z)));
        }
    }
    assert_eq!(grid.block_id(10, 0, 10), blocks::BEDROCK);
}

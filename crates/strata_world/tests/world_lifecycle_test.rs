//! # World Lifecycle Integration Tests
//!
//! Streaming, editing and persistence through the public interface only.

use std::time::Duration;

use strata_procedural::{blocks, BlockId, ChunkCoord};
use strata_world::{
    ChunkLifecycleManager, ChunkState, FrameBudget, Instant, InstanceRenderer, MemoryStore,
    NullRenderer, WorldConfig, WorldStore,
};

/// The reference world: 64x32 chunks, seed 1337, default terrain knobs.
fn reference_config() -> WorldConfig {
    let mut config = WorldConfig {
        name: "reference".into(),
        view_distance: 1,
        unload_padding: 1,
        ..WorldConfig::default()
    };
    config.generation.seed = strata_procedural::WorldSeed::new(1337);
    config.generation.terrain.scale = 168.0;
    config.generation.terrain.magnitude = 6.0;
    config.generation.terrain.offset = 8.0;
    config
}

fn open(config: WorldConfig, store: &MemoryStore) -> ChunkLifecycleManager<NullRenderer> {
    ChunkLifecycleManager::new(config, Box::new(store.clone()), NullRenderer::default())
        .expect("valid config")
}

/// Test: Remove the top block of a column, regenerate, and it stays removed.
#[test]
fn test_removed_block_survives_regeneration() {
    let store = MemoryStore::new();
    let mut world = open(reference_config(), &store);
    world.update_streaming(32, 32, false);

    let top = world.top_solid_y_world(32, 32).expect("column has ground");
    assert!(!world.block_world(32, top, 32).is_empty());

    assert!(world.remove_block_world(32, top, 32));
    assert_eq!(world.block_world(32, top, 32), BlockId::EMPTY);

    assert!(world.regenerate_chunk(ChunkCoord::new(0, 0)));
    assert_eq!(world.block_world(32, top, 32), BlockId::EMPTY);
}

/// Test: Edits written by one session are replayed by the next.
#[test]
fn test_edits_persist_across_sessions() {
    let store = MemoryStore::new();
    let top;
    {
        let mut world = open(reference_config(), &store);
        world.update_streaming(10, 10, false);
        top = world.top_solid_y_world(10, 10).unwrap();
        assert!(world.remove_block_world(10, top, 10));
        assert!(world.add_block_world(10, top, 10, blocks::IRON_ORE));
        world.save_now();
    }
    assert!(store.read("strata/ledger/reference").unwrap().is_some());

    let mut world = open(reference_config(), &store);
    assert_eq!(world.stats().modified_blocks, 1);
    world.update_streaming(10, 10, false);
    assert_eq!(world.block_world(10, top, 10), blocks::IRON_ORE);
}

/// Test: Edits are written once the debounce passes, not before.
#[test]
fn test_debounced_save_on_tick() {
    let store = MemoryStore::new();
    let mut config = reference_config();
    config.save_debounce_ms = 200;
    let mut world = open(config, &store);
    world.update_streaming(0, 0, false);

    let top = world.top_solid_y_world(5, 5).unwrap();
    assert!(world.remove_block_world(5, top, 5));
    let now = Instant::now();
    world.tick(FrameBudget::Idle(Duration::ZERO), now);
    assert!(store.is_empty());

    world.tick(FrameBudget::Idle(Duration::ZERO), now + Duration::from_secs(1));
    assert!(!store.is_empty());
    assert!(!world.ledger().is_dirty());
}

/// Test: Walking back and forth across a chunk border never evicts chunks
/// inside the keep ring.
#[test]
fn test_streaming_hysteresis() {
    let store = MemoryStore::new();
    let mut world = open(WorldConfig::headless("hysteresis", 9), &store);
    world.update_streaming(8, 8, false);
    world.flush_work();
    let baseline = world.stats().unloaded_total;

    for step in 0..20 {
        let x = if step % 2 == 0 { 15 } else { 16 };
        world.update_streaming(x, 8, false);
        world.flush_work();
    }
    assert_eq!(world.stats().unloaded_total, baseline);
    // Ring around chunk 0 plus the column brought in by chunk 1
    assert_eq!(world.loaded_chunk_count(), 12);
    for coord in [ChunkCoord::new(-1, 0), ChunkCoord::new(2, 0)] {
        assert_eq!(world.chunk(coord).unwrap().state(), ChunkState::MeshReady);
    }
}

/// Test: Chunks past the keep ring are evicted.
#[test]
fn test_far_chunks_are_evicted() {
    let store = MemoryStore::new();
    let mut world = open(WorldConfig::headless("evict", 9), &store);
    world.update_streaming(0, 0, false);
    world.flush_work();

    // keep ring is 2: chunk 3 away drops the left column
    world.update_streaming(16 * 3, 0, false);
    world.flush_work();
    assert!(world.chunk(ChunkCoord::new(-1, 0)).is_none());
    assert!(world.chunk(ChunkCoord::new(1, 0)).is_some());
    assert!(world.stats().unloaded_total >= 3);
}

/// Test: The anchor never stands over the void, even without pumping.
#[test]
fn test_anchor_always_has_ground() {
    let store = MemoryStore::new();
    let mut world = open(WorldConfig::headless("walk", 42), &store);
    for step in 0..40 {
        let x = step * 7;
        world.update_streaming(x, 0, false);
        assert!(world.has_ground(x, 31, 0), "void at x={x}");
        world.tick(FrameBudget::Idle(Duration::from_millis(1)), Instant::now());
    }
}

/// Test: Scheduled work builds every chunk exactly once.
#[test]
fn test_each_chunk_generated_once() {
    let store = MemoryStore::new();
    let mut world = open(WorldConfig::headless("once", 5), &store);
    world.ensure_loaded_around(0, 0, 1);
    world.update_streaming(0, 0, false);
    world.flush_work();
    for dz in -1..=1 {
        for dx in -1..=1 {
            let chunk = world.chunk(ChunkCoord::new(dx, dz)).unwrap();
            assert_eq!(chunk.generations(), 1);
        }
    }
    assert_eq!(world.stats().generated_total, 9);
}

/// Test: Editing at a chunk border only touches the owning chunk's batches.
#[test]
fn test_border_edit_touches_owning_chunk() {
    let mut config = WorldConfig::headless("border", 11);
    config.generation.vegetation.frequency = 0.0;
    let mut world =
        ChunkLifecycleManager::new(config, Box::new(MemoryStore::new()), InstanceRenderer::new(16))
            .unwrap();
    world.ensure_loaded_around(0, 0, 1);

    // Stack a pillar straddling the border between chunk 0 and chunk 1
    let top = world.top_solid_y_world(15, 4).unwrap().max(world.top_solid_y_world(16, 4).unwrap());
    let y = top + 2;
    assert!(world.add_block_world(15, y, 4, blocks::STONE));
    assert!(world.add_block_world(16, y, 4, blocks::STONE));
    let left = world.renderer().chunk_instance_count(ChunkCoord::new(0, 0));
    let right = world.renderer().chunk_instance_count(ChunkCoord::new(1, 0));

    assert!(world.remove_block_world(16, y, 4));
    assert_eq!(world.renderer().chunk_instance_count(ChunkCoord::new(1, 0)), right - 1);
    assert_eq!(world.renderer().chunk_instance_count(ChunkCoord::new(0, 0)), left);
    assert!(world.chunk(ChunkCoord::new(0, 0)).unwrap().grid().instance(15, y, 4).is_some());
}

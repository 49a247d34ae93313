//! # STRATA World
//!
//! Chunk lifecycle for an infinite, editable voxel world.
//!
//! ## Design Principles
//!
//! 1. **Cooperative**: all heavy work runs through a budgeted scheduler
//!    pumped by the host's frame loop
//! 2. **Edits are data**: player changes live in a ledger and are replayed
//!    over every (re)generation
//! 3. **Renderer-agnostic**: visibility changes go through [`RenderSink`]
//!
//! ## Core Components
//!
//! - `CooperativeScheduler`: keyed, prioritized, cancellable work queue
//! - `ModificationLedger`: debounced edit persistence through a `WorldStore`
//! - `ChunkLifecycleManager`: streaming rings, editing, regeneration
//! - `InstanceRenderer`: reference swap-and-pop instancing sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_world::{ChunkLifecycleManager, FrameBudget, MemoryStore, NullRenderer, WorldConfig};
//!
//! let config = WorldConfig::headless("demo", 1337);
//! let mut world = ChunkLifecycleManager::new(config, Box::new(MemoryStore::new()), NullRenderer::default())?;
//!
//! world.update_streaming(0, 0, false);
//! while world.needs_pump() {
//!     world.tick(FrameBudget::Fallback, strata_world::Instant::now());
//! }
//! assert!(world.has_ground(0, 31, 0));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod render;
pub mod scheduler;
pub mod store;

/// Monotonic clock used for budgets and save debouncing.
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;
/// Monotonic clock used for budgets and save debouncing.
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

pub use config::WorldConfig;
pub use error::{ConfigError, StoreError, StoreResult, TaskError, TaskResult};
pub use ledger::{LocalPos, ModificationLedger};
pub use manager::{Chunk, ChunkLifecycleManager, ChunkState, WorldStats};
pub use render::{InstanceRenderer, InstanceTransform, NullRenderer, RenderSink};
pub use scheduler::{CooperativeScheduler, FrameBudget, PumpReport, Task};
pub use store::{FileStore, MemoryStore, WorldStore};

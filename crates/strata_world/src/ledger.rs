//! # Modification Ledger
//!
//! Player edits, kept apart from generated terrain so they survive
//! regeneration.
//!
//! ## Format
//!
//! One JSON document per world under `strata/ledger/<name>`:
//!
//! ```json
//! { "0,-1": { "3,12,7": 4, "3,13,7": 0 } }
//! ```
//!
//! Outer keys are chunk coordinates, inner keys chunk-local positions, values
//! block ids. `0` records a deletion. The last write per position wins.
//!
//! ## Durability
//!
//! Edits mark the ledger dirty and push a save deadline forward; the host
//! calls [`ModificationLedger::flush_if_due`] each tick. Store failures are
//! logged and dropped. The next edit or explicit save tries again.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use strata_procedural::{world_to_local, BlockId, ChunkCoord};
use tracing::{debug, error, info};

use crate::error::{StoreError, StoreResult};
use crate::store::WorldStore;
use crate::Instant;

/// Chunk-local block position.
pub type LocalPos = (i32, i32, i32);

type Document = BTreeMap<String, BTreeMap<String, u16>>;

/// Persistent record of block edits.
pub struct ModificationLedger {
    store: Box<dyn WorldStore>,
    key: String,
    chunks: HashMap<ChunkCoord, BTreeMap<LocalPos, BlockId>>,
    debounce: Duration,
    save_deadline: Option<Instant>,
    dirty: bool,
    opened: bool,
}

impl ModificationLedger {
    /// Creates an empty ledger writing to `store` under `key`.
    ///
    /// Nothing is read until [`Self::open`].
    #[must_use]
    pub fn new(store: Box<dyn WorldStore>, key: impl Into<String>, debounce: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            chunks: HashMap::new(),
            debounce,
            save_deadline: None,
            dirty: false,
            opened: false,
        }
    }

    /// Loads stored edits the first time it is called.
    ///
    /// A read or decode failure is logged and the ledger starts empty.
    pub fn open(&mut self) {
        if self.opened {
            return;
        }
        self.opened = true;
        if let Err(e) = self.load() {
            error!(key = %self.key, error = %e, "failed to load ledger, starting empty");
        }
    }

    /// Replaces in-memory edits with the stored document.
    ///
    /// # Errors
    ///
    /// Returns the store failure or a decode error; in-memory state is
    /// untouched on error.
    pub fn load(&mut self) -> StoreResult<()> {
        let Some(text) = self.store.read(&self.key)? else {
            return Ok(());
        };
        let document: Document = serde_json::from_str(&text)?;

        let mut chunks = HashMap::with_capacity(document.len());
        for (chunk_key, blocks) in document {
            let [cx, cz] = parse_coords::<2>(&chunk_key)?;
            let mut edits = BTreeMap::new();
            for (pos_key, id) in blocks {
                let [x, y, z] = parse_coords::<3>(&pos_key)?;
                edits.insert((x, y, z), BlockId(id));
            }
            chunks.insert(ChunkCoord::new(cx, cz), edits);
        }

        self.chunks = chunks;
        self.dirty = false;
        self.save_deadline = None;
        info!(
            key = %self.key,
            chunks = self.modified_chunk_count(),
            blocks = self.modified_block_count(),
            "ledger loaded"
        );
        Ok(())
    }

    /// Writes every edit to the store.
    ///
    /// # Errors
    ///
    /// Returns the store failure; the ledger stays dirty.
    pub fn save(&mut self) -> StoreResult<()> {
        let document: Document = self
            .chunks
            .iter()
            .map(|(coord, edits)| {
                let blocks = edits
                    .iter()
                    .map(|((x, y, z), id)| (format!("{x},{y},{z}"), id.0))
                    .collect();
                (coord.to_string(), blocks)
            })
            .collect();
        let text = serde_json::to_string(&document)?;
        self.store.write(&self.key, &text)?;

        self.dirty = false;
        self.save_deadline = None;
        debug!(key = %self.key, bytes = text.len(), "ledger saved");
        Ok(())
    }

    /// Records that world block `(x, y, z)` is now `id`.
    pub fn record(&mut self, x: i32, y: i32, z: i32, id: BlockId, chunk_width: u32, now: Instant) {
        let coord = ChunkCoord::from_block_pos(x, z, chunk_width);
        let local = world_to_local(x, y, z, chunk_width);
        self.chunks.entry(coord).or_default().insert(local, id);
        self.dirty = true;
        self.save_deadline = Some(now + self.debounce);
    }

    /// Edits of one chunk in ascending position order.
    pub fn chunk_deltas(&self, coord: ChunkCoord) -> impl Iterator<Item = (LocalPos, BlockId)> + '_ {
        self.chunks
            .get(&coord)
            .into_iter()
            .flat_map(|edits| edits.iter().map(|(pos, id)| (*pos, *id)))
    }

    /// Saves if dirty and the debounce deadline has passed.
    ///
    /// Returns `true` if a save was attempted.
    pub fn flush_if_due(&mut self, now: Instant) -> bool {
        match self.save_deadline {
            Some(deadline) if self.dirty && now >= deadline => {
                self.save_logged();
                true
            }
            _ => false,
        }
    }

    /// Saves now, logging instead of returning a failure.
    pub fn save_logged(&mut self) {
        if let Err(e) = self.save() {
            // No retry until the next edit re-arms the deadline
            self.save_deadline = None;
            error!(key = %self.key, error = %e, "failed to save ledger");
        }
    }

    /// Returns `true` if there are unsaved edits.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Chunks with at least one edit.
    #[must_use]
    pub fn modified_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Edited positions across all chunks.
    #[must_use]
    pub fn modified_block_count(&self) -> usize {
        self.chunks.values().map(BTreeMap::len).sum()
    }

    /// Store key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn parse_coords<const N: usize>(text: &str) -> StoreResult<[i32; N]> {
    let bad = || StoreError::BadKey(text.to_owned());
    let mut out = [0; N];
    let mut parts = text.split(',');
    for slot in &mut out {
        *slot = parts.next().ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;
    }
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const W: u32 = 16;

    /// Store whose writes always fail. Counts attempts.
    #[derive(Clone, Default)]
    pub(crate) struct FailingStore {
        pub(crate) writes: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl FailingStore {
        pub(crate) fn attempts(&self) -> usize {
            self.writes.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl WorldStore for FailingStore {
        fn read(&self, _key: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn write(&self, key: &str, _value: &str) -> StoreResult<()> {
            self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(StoreError::Io {
                path: key.into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn ledger(store: &MemoryStore) -> ModificationLedger {
        ModificationLedger::new(Box::new(store.clone()), "strata/ledger/test", Duration::from_millis(100))
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStore::new();
        let mut l = ledger(&store);
        let now = Instant::now();
        l.record(3, 5, 7, BlockId(4), W, now);
        l.record(3, 5, 7, BlockId(0), W, now);
        let deltas: Vec<_> = l.chunk_deltas(ChunkCoord::new(0, 0)).collect();
        assert_eq!(deltas, vec![((3, 5, 7), BlockId(0))]);
        assert_eq!(l.modified_block_count(), 1);
    }

    #[test]
    fn test_negative_coordinates_map_to_local() {
        let store = MemoryStore::new();
        let mut l = ledger(&store);
        l.record(-1, 2, -17, BlockId(9), W, Instant::now());
        let deltas: Vec<_> = l.chunk_deltas(ChunkCoord::new(-1, -2)).collect();
        assert_eq!(deltas, vec![((15, 2, 15), BlockId(9))]);
    }

    #[test]
    fn test_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut l = ledger(&store);
        let now = Instant::now();
        l.record(1, 2, 3, BlockId(7), W, now);
        l.record(-20, 4, 40, BlockId(0), W, now);
        l.save().unwrap();
        assert!(!l.is_dirty());

        let mut reopened = ledger(&store);
        reopened.open();
        assert_eq!(reopened.modified_chunk_count(), 2);
        assert_eq!(
            reopened.chunk_deltas(ChunkCoord::new(0, 0)).collect::<Vec<_>>(),
            vec![((1, 2, 3), BlockId(7))]
        );
        assert_eq!(
            reopened.chunk_deltas(ChunkCoord::new(-2, 2)).collect::<Vec<_>>(),
            vec![((12, 4, 8), BlockId(0))]
        );
    }

    #[test]
    fn test_document_shape() {
        let store = MemoryStore::new();
        let mut l = ledger(&store);
        l.record(1, 2, 3, BlockId(7), W, Instant::now());
        l.save().unwrap();
        let text = store.read("strata/ledger/test").unwrap().unwrap();
        assert_eq!(text, r#"{"0,0":{"1,2,3":7}}"#);
    }

    #[test]
    fn test_debounced_flush() {
        let store = MemoryStore::new();
        let mut l = ledger(&store);
        let t0 = Instant::now();
        l.record(0, 0, 0, BlockId(1), W, t0);
        assert!(!l.flush_if_due(t0 + Duration::from_millis(50)));
        assert!(store.is_empty());

        // A second edit pushes the deadline out
        l.record(1, 0, 0, BlockId(1), W, t0 + Duration::from_millis(80));
        assert!(!l.flush_if_due(t0 + Duration::from_millis(150)));
        assert!(l.flush_if_due(t0 + Duration::from_millis(200)));
        assert!(!store.is_empty());
        assert!(!l.flush_if_due(t0 + Duration::from_millis(400)));
    }

    #[test]
    fn test_failed_save_is_dropped_without_retry() {
        let store = FailingStore::default();
        let mut l = ModificationLedger::new(
            Box::new(store.clone()),
            "strata/ledger/test",
            Duration::from_millis(100),
        );
        let t0 = Instant::now();
        l.record(2, 3, 4, BlockId(0), W, t0);

        assert!(l.save().is_err());
        assert_eq!(store.attempts(), 1);

        // Deadline passed: one attempt, then the deadline is gone
        assert!(l.flush_if_due(t0 + Duration::from_millis(150)));
        assert_eq!(store.attempts(), 2);
        assert!(l.is_dirty());
        assert_eq!(l.modified_block_count(), 1);
        assert!(!l.flush_if_due(t0 + Duration::from_millis(1_000)));
        assert_eq!(store.attempts(), 2);

        // A new edit re-arms it
        l.record(2, 4, 4, BlockId(0), W, t0 + Duration::from_millis(1_000));
        assert!(l.flush_if_due(t0 + Duration::from_millis(1_200)));
        assert_eq!(store.attempts(), 3);
        assert_eq!(l.modified_block_count(), 2);
    }

    #[test]
    fn test_malformed_document_leaves_ledger_empty() {
        let store = MemoryStore::new();
        store.write("strata/ledger/test", r#"{"zero,0":{"1,2,3":7}}"#).unwrap();
        let mut l = ledger(&store);
        assert!(matches!(l.load(), Err(StoreError::BadKey(_))));
        l.open();
        assert_eq!(l.modified_chunk_count(), 0);
    }

    #[test]
    fn test_parse_coords() {
        assert_eq!(parse_coords::<2>("-3,4").unwrap(), [-3, 4]);
        assert!(parse_coords::<2>("1,2,3").is_err());
        assert!(parse_coords::<3>("1,2").is_err());
    }
}

//! Bounded LRU cache of materialized states keyed by sequence
//!
//! Entries accelerate seeks (timeline scrubbing, undo/redo); they are never a
//! source of truth. Each entry remembers the snapshot its replay started from
//! so that invalidating a snapshot also drops everything derived from it.

use std::collections::BTreeMap;
use wiretuner_core_types::Sequence;

#[derive(Debug, Clone)]
struct CacheEntry<S> {
    state: S,
    size_bytes: usize,
    base_snapshot_id: Option<i64>,
    last_used: u64,
}

/// A state handed back by the cache
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    pub sequence: Sequence,
    pub state: S,
    pub base_snapshot_id: Option<i64>,
}

#[derive(Debug)]
pub struct CheckpointCache<S> {
    entries: BTreeMap<Sequence, CacheEntry<S>>,
    max_entries: usize,
    byte_budget: usize,
    total_bytes: usize,
    tick: u64,
}

impl<S: Clone> CheckpointCache<S> {
    pub fn new(max_entries: usize, byte_budget: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_entries,
            byte_budget,
            total_bytes: 0,
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Insert or refresh the entry at `sequence`
    ///
    /// Returns false if the state alone exceeds the byte budget.
    pub fn insert(
        &mut self,
        sequence: Sequence,
        state: S,
        size_bytes: usize,
        base_snapshot_id: Option<i64>,
    ) -> bool {
        if self.max_entries == 0 || size_bytes > self.byte_budget {
            return false;
        }

        let last_used = self.next_tick();
        if let Some(old) = self.entries.insert(
            sequence,
            CacheEntry {
                state,
                size_bytes,
                base_snapshot_id,
                last_used,
            },
        ) {
            self.total_bytes -= old.size_bytes;
        }
        self.total_bytes += size_bytes;
        self.evict();
        true
    }

    /// Closest entry at or below `target`, marked as recently used
    pub fn nearest_at_or_before(&mut self, target: Sequence) -> Option<Checkpoint<S>> {
        let tick = self.next_tick();
        let (sequence, entry) = self.entries.range_mut(..=target).next_back()?;
        entry.last_used = tick;
        Some(Checkpoint {
            sequence: *sequence,
            state: entry.state.clone(),
            base_snapshot_id: entry.base_snapshot_id,
        })
    }

    pub fn contains(&self, sequence: Sequence) -> bool {
        self.entries.contains_key(&sequence)
    }

    /// Drop every entry derived from the given snapshot; returns how many
    pub fn invalidate_snapshot(&mut self, snapshot_id: i64) -> usize {
        let doomed: Vec<Sequence> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.base_snapshot_id == Some(snapshot_id))
            .map(|(sequence, _)| *sequence)
            .collect();
        for sequence in &doomed {
            self.remove(*sequence);
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn sequences(&self) -> Vec<Sequence> {
        self.entries.keys().copied().collect()
    }

    fn remove(&mut self, sequence: Sequence) {
        if let Some(entry) = self.entries.remove(&sequence) {
            self.total_bytes -= entry.size_bytes;
        }
    }

    fn evict(&mut self) {
        while self.entries.len() > self.max_entries || self.total_bytes > self.byte_budget {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(sequence, _)| *sequence);
            match oldest {
                Some(sequence) => self.remove(sequence),
                None => break,
            }
        }
    }
}

//! # Block Cache
//!
//! Bounded cache of open (memory-mapped) blocks, private to one `Column` and
//! guarded by the column mutex. Recency is tracked with a monotonic tick
//! counter; eviction syncs the victim before dropping its mapping, so a
//! cached block can always be reopened with its latest contents.

use std::path::Path;

use eyre::Result;
use hashbrown::HashMap;

use crate::storage::block::ColumnDataBlock;

#[derive(Debug)]
struct CacheEntry {
    block: ColumnDataBlock,
    last_used: u64,
}

#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<u64, CacheEntry>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::with_capacity(capacity),
        }
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Returns the cached block, opening (and caching) it if necessary.
    pub fn get_or_open(&mut self, dir: &Path, block_id: u64) -> Result<&mut ColumnDataBlock> {
        if !self.entries.contains_key(&block_id) {
            let block = ColumnDataBlock::open(dir, block_id)?;
            self.insert(block)?;
        }
        let tick = self.touch();
        let entry = self
            .entries
            .get_mut(&block_id)
            .expect("entry was just inserted or found");
        entry.last_used = tick;
        Ok(&mut entry.block)
    }

    /// Caches an already open block (typically one just created), evicting
    /// the least recently used entry if the cache is full.
    pub fn insert(&mut self, block: ColumnDataBlock) -> Result<()> {
        while self.entries.len() >= self.capacity {
            self.evict_lru()?;
        }
        let tick = self.touch();
        self.entries.insert(
            block.block_id(),
            CacheEntry {
                block,
                last_used: tick,
            },
        );
        Ok(())
    }

    fn evict_lru(&mut self) -> Result<()> {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(&id, _)| id);
        if let Some(id) = victim {
            if let Some(mut entry) = self.entries.remove(&id) {
                entry.block.sync()?;
            }
        }
        Ok(())
    }

    pub fn get_mut(&mut self, block_id: u64) -> Option<&mut ColumnDataBlock> {
        let tick = self.touch();
        let entry = self.entries.get_mut(&block_id)?;
        entry.last_used = tick;
        Some(&mut entry.block)
    }

    pub fn contains(&self, block_id: u64) -> bool {
        self.entries.contains_key(&block_id)
    }

    /// Drops a block from the cache after syncing it.
    pub fn remove(&mut self, block_id: u64) -> Result<()> {
        if let Some(mut entry) = self.entries.remove(&block_id) {
            entry.block.sync()?;
        }
        Ok(())
    }

    pub fn sync_all(&mut self) -> Result<()> {
        for entry in self.entries.values_mut() {
            entry.block.sync()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

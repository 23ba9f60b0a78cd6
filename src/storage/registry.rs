//! # Block Registry
//!
//! Tracks which block files exist in a column directory and how they chain
//! together. The registry is rebuilt on open by scanning block file names
//! and headers, and updated in memory as blocks are created.
//!
//! The prev → next adjacency is one-to-many: rollback can leave a block with
//! several registered successors (each reopened write head spawned a new
//! chain extension). Successors are kept most recently registered first, so
//! chain extension reuses the newest one.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use eyre::{ensure, Result};
use hashbrown::HashMap;

use crate::storage::block::ColumnDataBlock;

#[derive(Debug)]
pub struct BlockRegistry {
    dir: PathBuf,
    block_ids: BTreeSet<u64>,
    /// prev block id → successor block ids, newest first.
    next_blocks: HashMap<u64, Vec<u64>>,
    next_block_id: u64,
}

impl BlockRegistry {
    /// An empty registry for a freshly created column directory.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            block_ids: BTreeSet::new(),
            next_blocks: HashMap::new(),
            next_block_id: 1,
        }
    }

    /// Rebuilds the registry by scanning block files and their headers.
    /// Higher-numbered blocks register before lower ones so that adjacency
    /// lists come out newest-first.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(ColumnDataBlock::parse_file_name)
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        let mut registry = Self::new(dir);
        for &id in ids.iter().rev() {
            let block = ColumnDataBlock::open(dir, id)?;
            registry.register_scanned(id, block.prev_block_id());
        }
        registry.next_block_id = ids.last().map_or(1, |&max| max + 1);
        Ok(registry)
    }

    fn register_scanned(&mut self, block_id: u64, prev_block_id: u64) {
        self.block_ids.insert(block_id);
        if prev_block_id != 0 {
            // scan order is descending, so pushing keeps newest first
            self.next_blocks.entry(prev_block_id).or_default().push(block_id);
        }
    }

    /// Registers a newly created block as the newest successor of its
    /// predecessor.
    pub fn register_block(&mut self, block_id: u64, prev_block_id: u64) {
        self.block_ids.insert(block_id);
        if prev_block_id != 0 {
            self.next_blocks
                .entry(prev_block_id)
                .or_default()
                .insert(0, block_id);
        }
        if block_id >= self.next_block_id {
            self.next_block_id = block_id + 1;
        }
    }

    /// Hands out the next unused block id.
    pub fn allocate_block_id(&mut self) -> u64 {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, block_id: u64) -> bool {
        self.block_ids.contains(&block_id)
    }

    pub fn is_empty(&self) -> bool {
        self.block_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.block_ids.len()
    }

    pub fn lowest_block_id(&self) -> Option<u64> {
        self.block_ids.first().copied()
    }

    /// Successor block ids of `block_id`, newest first.
    pub fn next_blocks(&self, block_id: u64) -> &[u64] {
        self.next_blocks
            .get(&block_id)
            .map_or(&[], |v| v.as_slice())
    }

    /// All known block ids in ascending order.
    pub fn block_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.block_ids.iter().copied()
    }

    /// Validates that `block_id` is known, for address checks.
    pub fn require(&self, block_id: u64) -> Result<()> {
        ensure!(self.contains(block_id), "unknown block id {}", block_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_rebuilds_adjacency_newest_first() {
        let dir = tempdir().unwrap();
        ColumnDataBlock::create(dir.path(), 1, 0, 64).unwrap();
        ColumnDataBlock::create(dir.path(), 2, 1, 64).unwrap();
        ColumnDataBlock::create(dir.path(), 3, 1, 64).unwrap();
        ColumnDataBlock::create(dir.path(), 4, 3, 64).unwrap();

        let mut registry = BlockRegistry::scan(dir.path()).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.lowest_block_id(), Some(1));
        assert_eq!(registry.next_blocks(1), &[3, 2]);
        assert_eq!(registry.next_blocks(3), &[4]);
        assert_eq!(registry.next_blocks(4), &[] as &[u64]);
        assert_eq!(registry.allocate_block_id(), 5);
    }

    #[test]
    fn scan_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        ColumnDataBlock::create(dir.path(), 1, 0, 64).unwrap();
        std::fs::write(dir.path().join("init.flag"), b"").unwrap();
        std::fs::write(dir.path().join("b2.tmp"), b"junk").unwrap();

        let registry = BlockRegistry::scan(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_block_keeps_newest_first_and_bumps_counter() {
        let dir = tempdir().unwrap();
        let mut registry = BlockRegistry::new(dir.path());
        registry.register_block(1, 0);
        registry.register_block(2, 1);
        registry.register_block(3, 1);

        assert_eq!(registry.next_blocks(1), &[3, 2]);
        assert_eq!(registry.allocate_block_id(), 4);
        assert!(registry.contains(2));
        assert!(registry.require(9).is_err());
    }

    #[test]
    fn empty_registry_starts_at_block_one() {
        let dir = tempdir().unwrap();
        let mut registry = BlockRegistry::scan(dir.path()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.allocate_block_id(), 1);
    }
}

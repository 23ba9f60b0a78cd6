//! # Column Data Block Files
//!
//! One file per block, named `b<blockId>.sdb`, memory-mapped for the
//! lifetime of the open block:
//!
//! ```text
//! ┌──────────────────────────── 128-byte header ────────────────────────────┐
//! │ magic[16] │ version u32 │ data_area_size u32 │ block_id u64            │
//! │ prev_block_id u64 │ next_data_pos u32 │ state u8 │ reserved[3]         │
//! │ fill_timestamp u64 │ digest u64 │ reserved[64]                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │ data area (fixed capacity, data_area_size bytes)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All multi-byte header fields are little-endian via zerocopy wrappers.
//!
//! ## State Machine
//!
//! ```text
//! Current ──(chain extension)──> Closed
//!    │
//!    └──(rollback reopens)────── Available ──> Current
//! ```
//!
//! Exactly one block per column is Current (the write head). A Closed block
//! carries a finalized digest: CRC-64/ECMA-182 over the previous block's
//! digest bytes followed by the used part of the data area. Because each
//! digest folds in its predecessor's, the digest of the newest Closed block
//! authenticates the entire chain prefix.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_64_ECMA_182};
use eyre::{ensure, Context, Result};
use memmap2::MmapMut;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::BLOCK_HEADER_SIZE;
use crate::storage::BLOCK_FILE_EXTENSION;
use crate::zerocopy_accessors;

/// Magic bytes at offset 0 of every block file.
pub const BLOCK_MAGIC: [u8; 16] = *b"STRATA-COLBLOCK\0";

/// Current block file format version.
pub const BLOCK_FORMAT_VERSION: u32 = 1;

const BLOCK_DIGEST: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Lifecycle state of a block, stored in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockState {
    /// The write head: values are appended here.
    Current = 0,
    /// Has free space but is not the write head (left behind by rollback).
    Available = 1,
    /// Finalized: digest frozen, no further writes.
    Closed = 2,
}

impl BlockState {
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(BlockState::Current),
            1 => Ok(BlockState::Available),
            2 => Ok(BlockState::Closed),
            _ => eyre::bail!("invalid block state byte {}", raw),
        }
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct BlockHeader {
    magic: [u8; 16],
    version: U32,
    data_area_size: U32,
    block_id: U64,
    prev_block_id: U64,
    next_data_pos: U32,
    state: u8,
    reserved0: [u8; 3],
    fill_timestamp: U64,
    digest: U64,
    reserved1: [u8; 64],
}

const _: () = assert!(std::mem::size_of::<BlockHeader>() == BLOCK_HEADER_SIZE);

impl BlockHeader {
    zerocopy_accessors! {
        version: u32,
        data_area_size: u32,
        block_id: u64,
        prev_block_id: u64,
        next_data_pos: u32,
        fill_timestamp: u64,
        digest: u64,
    }
}

/// An open, memory-mapped column data block.
#[derive(Debug)]
pub struct ColumnDataBlock {
    path: PathBuf,
    mmap: MmapMut,
    dirty: bool,
}

impl ColumnDataBlock {
    /// File name for a block id, `b<blockId>.sdb`.
    pub fn file_name(block_id: u64) -> String {
        format!("b{}.{}", block_id, BLOCK_FILE_EXTENSION)
    }

    /// Parses a block id out of a block file name. Returns `None` for
    /// anything that is not a well-formed block file name.
    pub fn parse_file_name(name: &str) -> Option<u64> {
        let stem = name
            .strip_prefix('b')?
            .strip_suffix(&format!(".{}", BLOCK_FILE_EXTENSION))?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = stem.parse().ok()?;
        (id != 0).then_some(id)
    }

    /// Creates a new block file in `Current` state with an empty data area.
    pub fn create(
        dir: &Path,
        block_id: u64,
        prev_block_id: u64,
        data_area_size: usize,
    ) -> Result<Self> {
        ensure!(block_id != 0, "block id 0 is reserved for sentinels");
        let path = dir.join(Self::file_name(block_id));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create block file {}", path.display()))?;
        file.set_len((BLOCK_HEADER_SIZE + data_area_size) as u64)?;

        // SAFETY: the file was just created with the exact mapped length and
        // is accessed only through this mapping for the block's lifetime.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut block = Self {
            path,
            mmap,
            dirty: true,
        };

        let header = block.header_mut();
        header.magic = BLOCK_MAGIC;
        header.set_version(BLOCK_FORMAT_VERSION);
        header.set_data_area_size(data_area_size as u32);
        header.set_block_id(block_id);
        header.set_prev_block_id(prev_block_id);
        header.set_next_data_pos(0);
        header.state = BlockState::Current as u8;
        header.set_fill_timestamp(unix_timestamp());
        header.set_digest(0);

        block.sync()?;
        Ok(block)
    }

    /// Opens an existing block file, validating magic, version, and length.
    pub fn open(dir: &Path, block_id: u64) -> Result<Self> {
        let path = dir.join(Self::file_name(block_id));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open block file {}", path.display()))?;
        let file_len = file.metadata()?.len();
        ensure!(
            file_len >= BLOCK_HEADER_SIZE as u64,
            "block file {} is shorter than its header",
            path.display()
        );

        // SAFETY: length checked above; the mapping is exclusive to this
        // ColumnDataBlock while it is open.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let block = Self {
            path,
            mmap,
            dirty: false,
        };

        let header = block.header();
        ensure!(
            header.magic == BLOCK_MAGIC,
            "block file {} has invalid magic",
            block.path.display()
        );
        ensure!(
            header.version() == BLOCK_FORMAT_VERSION,
            "block file {} has unsupported version {}",
            block.path.display(),
            header.version()
        );
        ensure!(
            header.block_id() == block_id,
            "block file {} claims block id {}",
            block.path.display(),
            header.block_id()
        );
        ensure!(
            file_len == (BLOCK_HEADER_SIZE + header.data_area_size() as usize) as u64,
            "block file {} length {} does not match data area size {}",
            block.path.display(),
            file_len,
            header.data_area_size()
        );
        ensure!(
            header.next_data_pos() <= header.data_area_size(),
            "block file {} write cursor {} exceeds data area size {}",
            block.path.display(),
            header.next_data_pos(),
            header.data_area_size()
        );
        BlockState::from_u8(header.state)?;

        Ok(block)
    }

    fn header(&self) -> &BlockHeader {
        // Infallible: the struct is Unaligned and its size is const-asserted.
        BlockHeader::ref_from_bytes(&self.mmap[..BLOCK_HEADER_SIZE])
            .expect("block header layout is const-asserted")
    }

    fn header_mut(&mut self) -> &mut BlockHeader {
        self.dirty = true;
        BlockHeader::mut_from_bytes(&mut self.mmap[..BLOCK_HEADER_SIZE])
            .expect("block header layout is const-asserted")
    }

    pub fn block_id(&self) -> u64 {
        self.header().block_id()
    }

    pub fn prev_block_id(&self) -> u64 {
        self.header().prev_block_id()
    }

    pub fn data_area_size(&self) -> usize {
        self.header().data_area_size() as usize
    }

    pub fn next_data_pos(&self) -> u32 {
        self.header().next_data_pos()
    }

    pub fn set_next_data_pos(&mut self, pos: u32) {
        debug_assert!(pos as usize <= self.data_area_size());
        self.header_mut().set_next_data_pos(pos);
    }

    pub fn free_space(&self) -> usize {
        self.data_area_size() - self.next_data_pos() as usize
    }

    pub fn state(&self) -> BlockState {
        // Validated on open and only set through set_state.
        BlockState::from_u8(self.header().state).expect("block state was validated on open")
    }

    pub fn set_state(&mut self, state: BlockState) {
        self.header_mut().state = state as u8;
    }

    pub fn stored_digest(&self) -> u64 {
        self.header().digest()
    }

    pub fn fill_timestamp(&self) -> u64 {
        self.header().fill_timestamp()
    }

    /// Copies `buf.len()` bytes out of the data area at `offset`.
    pub fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        ensure!(
            start + buf.len() <= self.data_area_size(),
            "read of {} bytes at offset {} exceeds data area of block {}",
            buf.len(),
            offset,
            self.block_id()
        );
        let base = BLOCK_HEADER_SIZE + start;
        buf.copy_from_slice(&self.mmap[base..base + buf.len()]);
        Ok(())
    }

    /// Writes `data` into the data area at `offset`. Does not move the write
    /// cursor; used both for appends and for chunk-header back-patching.
    pub fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        ensure!(
            start + data.len() <= self.data_area_size(),
            "write of {} bytes at offset {} exceeds data area of block {}",
            data.len(),
            offset,
            self.block_id()
        );
        let base = BLOCK_HEADER_SIZE + start;
        self.mmap[base..base + data.len()].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    /// Appends `data` at the write cursor and advances it. Returns the
    /// offset the data was written at.
    pub fn append(&mut self, data: &[u8]) -> Result<u32> {
        ensure!(
            data.len() <= self.free_space(),
            "append of {} bytes exceeds {} free bytes in block {}",
            data.len(),
            self.free_space(),
            self.block_id()
        );
        let offset = self.next_data_pos();
        self.write_at(offset, data)?;
        self.set_next_data_pos(offset + data.len() as u32);
        Ok(offset)
    }

    /// CRC-64 over the previous block's digest followed by the used part of
    /// the data area.
    pub fn compute_digest(&self, prev_digest: u64) -> u64 {
        let used = self.next_data_pos() as usize;
        let mut digest = BLOCK_DIGEST.digest();
        digest.update(&prev_digest.to_le_bytes());
        digest.update(&self.mmap[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + used]);
        digest.finalize()
    }

    /// Freezes the digest, moves the block to `Closed`, and syncs. Returns
    /// the finalized digest for chaining into the successor.
    pub fn finalize(&mut self, prev_digest: u64) -> Result<u64> {
        let digest = self.compute_digest(prev_digest);
        let header = self.header_mut();
        header.set_digest(digest);
        header.set_fill_timestamp(unix_timestamp());
        header.state = BlockState::Closed as u8;
        self.sync()?;
        Ok(digest)
    }

    pub fn sync(&mut self) -> Result<()> {
        if self.dirty {
            self.mmap
                .flush()
                .wrap_err_with(|| format!("failed to sync block file {}", self.path.display()))?;
            self.dirty = false;
        }
        Ok(())
    }
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

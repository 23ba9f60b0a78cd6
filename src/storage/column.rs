//! # Column Orchestrator
//!
//! [`Column`] ties the storage collaborators together: block registry and
//! cache, free-space map, LOB chunking, and (for master columns) the TRID
//! counters and master index. One column owns one directory under the
//! database data directory.
//!
//! ## Write Path
//!
//! `put_record` coerces the incoming variant to the column's declared type,
//! picks a block with enough free space (first-fit over non-closed blocks,
//! else the chain is extended off the current write head), and appends the
//! fixed little-endian scalar encoding or a chunked LOB. Chain extension
//! finalizes the predecessor's digest only after the outgoing chunk header
//! has been patched with its forward link, so the digest always covers the
//! patched bytes.
//!
//! ## Read Path
//!
//! `read_record` decodes scalars in place. TEXT/BINARY values at or below
//! [`SMALL_LOB_THRESHOLD`] are materialized eagerly; larger ones come back
//! as lazy `ColumnClobStream`/`ColumnBlobStream` values that re-enter the
//! column lock per chunk.
//!
//! ## Lifecycle
//!
//! `create` builds the directory from scratch and writes the initialization
//! marker file last; `open` requires the marker and then verifies the whole
//! block chain (`check_data_consistency`) before accepting writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{bail, ensure, Context as _, Result};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{
    DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_DATA_AREA_SIZE, FIRST_USER_TRID,
    LOB_CHUNK_HEADER_SIZE, LOB_CHUNK_REUSE_THRESHOLD, MAX_CLOB_LENGTH, MAX_NAME_LENGTH,
    MAX_STRING_LENGTH, SMALL_LOB_THRESHOLD,
};
use crate::error::{ColumnRef, StorageError};
use crate::lob::LobStream;
use crate::storage::address::ColumnDataAddress;
use crate::storage::block::{BlockState, ColumnDataBlock};
use crate::storage::cache::BlockCache;
use crate::storage::chunk::LobChunkHeader;
use crate::storage::column_lob::{ColumnBlobStream, ColumnClobStream};
use crate::storage::index::MasterIndex;
use crate::storage::mcr::{DmlOperationType, MasterColumnRecord};
use crate::storage::registry::BlockRegistry;
use crate::storage::trid::TridCounterFile;
use crate::storage::{
    INIT_MARKER_FILE_NAME, MAIN_INDEX_ID_FILE_NAME, TRID_COUNTER_FILE_NAME,
};
use crate::types::{ColumnDataType, RawDateTime, Variant, VariantType};

/// What a column needs to know about its surroundings. Stands in for the
/// catalog: the owning database/table identity plus engine tunables.
#[derive(Debug, Clone)]
pub struct ColumnContext {
    pub database_name: String,
    pub table_name: String,
    pub database_id: u32,
    pub table_id: u32,
    pub data_dir: PathBuf,
    pub first_user_trid: u64,
    pub block_data_area_size: usize,
    pub block_cache_capacity: usize,
    pub not_null: bool,
}

impl ColumnContext {
    pub fn new(
        database_name: impl Into<String>,
        table_name: impl Into<String>,
        database_id: u32,
        table_id: u32,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            table_name: table_name.into(),
            database_id,
            table_id,
            data_dir: data_dir.into(),
            first_user_trid: FIRST_USER_TRID,
            block_data_area_size: DEFAULT_BLOCK_DATA_AREA_SIZE,
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
            not_null: false,
        }
    }
}

#[derive(Debug)]
struct ColumnInner {
    registry: BlockRegistry,
    cache: BlockCache,
    /// Free bytes per non-Closed block.
    free_space: HashMap<u64, usize>,
    /// The write head. Exactly one block is Current.
    current_block_id: u64,
    trid: Option<TridCounterFile>,
    index: Option<MasterIndex>,
}

/// A single column's storage engine.
#[derive(Debug)]
pub struct Column {
    name: String,
    data_type: ColumnDataType,
    master_column: bool,
    not_null: bool,
    column_ref: ColumnRef,
    dir: PathBuf,
    first_user_trid: u64,
    block_data_area_size: usize,
    inner: Mutex<ColumnInner>,
}

impl Column {
    /// Creates a new column directory, wiping any stale leftovers from an
    /// earlier failed creation. The initialization marker file is written
    /// last, so a directory without it is never trusted.
    pub fn create(
        ctx: &ColumnContext,
        name: &str,
        column_id: u64,
        data_type: ColumnDataType,
        master_column: bool,
    ) -> Result<Arc<Self>> {
        validate_column_name(name)?;
        let dir = ctx.data_dir.join(name);
        if dir.exists() {
            ensure!(
                !dir.join(INIT_MARKER_FILE_NAME).exists(),
                "column directory {} is already initialized",
                dir.display()
            );
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        let mut registry = BlockRegistry::new(&dir);
        let mut cache = BlockCache::new(ctx.block_cache_capacity);
        let first_block_id = registry.allocate_block_id();
        let block = ColumnDataBlock::create(&dir, first_block_id, 0, ctx.block_data_area_size)?;
        registry.register_block(first_block_id, 0);
        let mut free_space = HashMap::new();
        free_space.insert(first_block_id, block.free_space());
        cache.insert(block)?;

        let (trid, index) = if master_column {
            let counters =
                TridCounterFile::create(&dir.join(TRID_COUNTER_FILE_NAME), ctx.first_user_trid)?;
            let index = MasterIndex::create(&dir, 1)?;
            write_main_index_id(&dir, index.index_id())?;
            (Some(counters), Some(index))
        } else {
            (None, None)
        };

        std::fs::write(dir.join(INIT_MARKER_FILE_NAME), [])?;

        Ok(Arc::new(Self {
            name: name.to_owned(),
            data_type,
            master_column,
            not_null: ctx.not_null,
            column_ref: column_ref(ctx, name, column_id),
            dir,
            first_user_trid: ctx.first_user_trid,
            block_data_area_size: ctx.block_data_area_size,
            inner: Mutex::new(ColumnInner {
                registry,
                cache,
                free_space,
                current_block_id: first_block_id,
                trid,
                index,
            }),
        }))
    }

    /// Opens an existing column directory and verifies the block chain.
    pub fn open(
        ctx: &ColumnContext,
        name: &str,
        column_id: u64,
        data_type: ColumnDataType,
        master_column: bool,
    ) -> Result<Arc<Self>> {
        validate_column_name(name)?;
        let dir = ctx.data_dir.join(name);
        ensure!(
            dir.join(INIT_MARKER_FILE_NAME).exists(),
            "column directory {} was never fully initialized",
            dir.display()
        );

        let registry = BlockRegistry::scan(&dir)?;
        let cache = BlockCache::new(ctx.block_cache_capacity);

        let (trid, index) = if master_column {
            let counters = TridCounterFile::open(&dir.join(TRID_COUNTER_FILE_NAME))?;
            let index_id = read_main_index_id(&dir)?;
            let index = MasterIndex::open(&dir, index_id)?;
            (Some(counters), Some(index))
        } else {
            (None, None)
        };

        let column = Arc::new(Self {
            name: name.to_owned(),
            data_type,
            master_column,
            not_null: ctx.not_null,
            column_ref: column_ref(ctx, name, column_id),
            dir,
            first_user_trid: ctx.first_user_trid,
            block_data_area_size: ctx.block_data_area_size,
            inner: Mutex::new(ColumnInner {
                registry,
                cache,
                free_space: HashMap::new(),
                current_block_id: 0,
                trid,
                index,
            }),
        });
        column.check_data_consistency()?;
        Ok(column)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> ColumnDataType {
        self.data_type
    }

    pub fn is_master_column(&self) -> bool {
        self.master_column
    }

    pub fn column_ref(&self) -> &ColumnRef {
        &self.column_ref
    }

    /// Walks the whole block chain depth-first with an explicit stack:
    /// verifies every block's backward link, recomputes the digest of every
    /// Closed block against its predecessor's, and rebuilds the free-space
    /// map and the write-head pointer.
    pub fn check_data_consistency(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.free_space.clear();

        let root = match inner.registry.lowest_block_id() {
            Some(id) => id,
            None => bail!("column {} has no blocks", self.column_ref),
        };

        let mut stack = vec![(root, 0u64)];
        let mut visited = HashSet::new();
        let mut current = None;
        while let Some((block_id, expected_prev)) = stack.pop() {
            ensure!(
                visited.insert(block_id),
                "column {} block chain contains a cycle through block {}",
                self.column_ref,
                block_id
            );

            let block = self.block_mut(inner, block_id)?;
            let actual_prev = block.prev_block_id();
            if actual_prev != expected_prev {
                return Err(eyre::Report::new(StorageError::BlockChainBroken {
                    column: self.column_ref.clone(),
                    block_id,
                    expected_prev,
                    actual_prev,
                }));
            }
            let state = block.state();
            let free = block.free_space();
            let stored = block.stored_digest();

            match state {
                BlockState::Closed => {
                    let prev_digest = if expected_prev == 0 {
                        0
                    } else {
                        self.block_mut(inner, expected_prev)?.stored_digest()
                    };
                    let computed = self
                        .block_mut(inner, block_id)?
                        .compute_digest(prev_digest);
                    if computed != stored {
                        return Err(eyre::Report::new(StorageError::BlockDigestMismatch {
                            column: self.column_ref.clone(),
                            block_id,
                            computed,
                            stored,
                        }));
                    }
                }
                BlockState::Current => {
                    ensure!(
                        current.is_none(),
                        "column {} has more than one current block",
                        self.column_ref
                    );
                    current = Some(block_id);
                    inner.free_space.insert(block_id, free);
                }
                BlockState::Available => {
                    inner.free_space.insert(block_id, free);
                }
            }

            let successors = inner.registry.next_blocks(block_id).to_vec();
            for next in successors {
                stack.push((next, block_id));
            }
        }

        ensure!(
            visited.len() == inner.registry.len(),
            "column {} has {} blocks unreachable from block {}",
            self.column_ref,
            inner.registry.len() - visited.len(),
            root
        );
        inner.current_block_id = current.ok_or_else(|| {
            eyre::eyre!("column {} has no current block", self.column_ref)
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Stores a value, coercing it to the declared column type first.
    /// Returns the start and one-past-the-end addresses of the written
    /// data. NULL stores nothing and returns the NULL sentinel twice.
    pub fn put_record(
        &self,
        value: &mut Variant,
    ) -> Result<(ColumnDataAddress, ColumnDataAddress)> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if value.is_null() {
            if self.not_null {
                return Err(eyre::Report::new(StorageError::NullValueNotAllowed {
                    column: self.column_ref.clone(),
                }));
            }
            return Ok((ColumnDataAddress::NULL, ColumnDataAddress::NULL));
        }

        let source = value.value_type();
        match self.data_type {
            ColumnDataType::Text => match value {
                Variant::String(s) => {
                    ensure_within(self, source, s.len(), MAX_STRING_LENGTH / 2)?;
                    self.store_chunked(inner, &mut LobSource::bytes(s.as_bytes()))
                }
                Variant::Clob(stream) => {
                    ensure_within(self, source, stream.size() as usize, MAX_CLOB_LENGTH / 2)?;
                    self.store_stream(inner, source, stream.as_lob_stream())
                }
                _ => {
                    let cast = value
                        .as_string()
                        .map_err(|e| self.err_incompatible(source, e))?;
                    match cast {
                        Variant::String(s) => {
                            ensure_within(self, source, s.len(), MAX_STRING_LENGTH / 2)?;
                            self.store_chunked(inner, &mut LobSource::bytes(s.as_bytes()))
                        }
                        _ => unreachable!("as_string yields a string"),
                    }
                }
            },
            ColumnDataType::Binary => match value {
                Variant::Binary(b) => {
                    ensure_within(self, source, b.len(), MAX_STRING_LENGTH / 2)?;
                    self.store_chunked(inner, &mut LobSource::bytes(b))
                }
                Variant::Blob(stream) => {
                    ensure_within(self, source, stream.size() as usize, MAX_CLOB_LENGTH / 2)?;
                    self.store_stream(inner, source, stream.as_lob_stream())
                }
                _ => {
                    let cast = value
                        .as_binary()
                        .map_err(|e| self.err_incompatible(source, e))?;
                    match cast {
                        Variant::Binary(b) => {
                            ensure_within(self, source, b.len(), MAX_STRING_LENGTH / 2)?;
                            self.store_chunked(inner, &mut LobSource::bytes(&b))
                        }
                        _ => unreachable!("as_binary yields a binary"),
                    }
                }
            },
            _ => {
                let bytes = self.encode_scalar(value, source)?;
                self.store_scalar(inner, &bytes)
            }
        }
    }

    fn encode_scalar(&self, value: &mut Variant, source: VariantType) -> Result<Vec<u8>> {
        macro_rules! le_bytes {
            ($this:expr, $value:expr, $src:expr, $method:ident, $variant:ident) => {
                match $value
                    .$method()
                    .map_err(|e| $this.err_incompatible($src, e))?
                {
                    Variant::$variant(v) => v.to_le_bytes().to_vec(),
                    _ => unreachable!("cast yields its own variant"),
                }
            };
        }

        Ok(match self.data_type {
            ColumnDataType::Bool => {
                match value
                    .as_bool()
                    .map_err(|e| self.err_incompatible(source, e))?
                {
                    Variant::Bool(v) => vec![v as u8],
                    _ => unreachable!("cast yields its own variant"),
                }
            }
            ColumnDataType::Int8 => le_bytes!(self, value, source, as_int8, Int8),
            ColumnDataType::UInt8 => le_bytes!(self, value, source, as_uint8, UInt8),
            ColumnDataType::Int16 => le_bytes!(self, value, source, as_int16, Int16),
            ColumnDataType::UInt16 => le_bytes!(self, value, source, as_uint16, UInt16),
            ColumnDataType::Int32 => le_bytes!(self, value, source, as_int32, Int32),
            ColumnDataType::UInt32 => le_bytes!(self, value, source, as_uint32, UInt32),
            ColumnDataType::Int64 => le_bytes!(self, value, source, as_int64, Int64),
            ColumnDataType::UInt64 => le_bytes!(self, value, source, as_uint64, UInt64),
            ColumnDataType::Float => le_bytes!(self, value, source, as_float, Float),
            ColumnDataType::Double => le_bytes!(self, value, source, as_double, Double),
            ColumnDataType::Timestamp => {
                match value
                    .as_date_time()
                    .map_err(|e| self.err_incompatible(source, e))?
                {
                    Variant::DateTime(dt) => {
                        let mut buf = Vec::with_capacity(dt.serialized_size());
                        dt.serialize_into(&mut buf);
                        buf
                    }
                    _ => unreachable!("cast yields its own variant"),
                }
            }
            ColumnDataType::Text | ColumnDataType::Binary => {
                unreachable!("LOB types take the chunked path")
            }
        })
    }

    fn store_scalar(
        &self,
        inner: &mut ColumnInner,
        bytes: &[u8],
    ) -> Result<(ColumnDataAddress, ColumnDataAddress)> {
        let block_id = self.select_available_block(inner, bytes.len())?;
        let block = self.block_mut(inner, block_id)?;
        let offset = block.append(bytes)?;
        let end_offset = block.next_data_pos();
        block.sync()?;
        self.refresh_free_space(inner, block_id)?;
        Ok((
            ColumnDataAddress::new(block_id, offset),
            ColumnDataAddress::new(block_id, end_offset),
        ))
    }

    fn store_stream(
        &self,
        inner: &mut ColumnInner,
        source: VariantType,
        stream: &mut dyn LobStream,
    ) -> Result<(ColumnDataAddress, ColumnDataAddress)> {
        if !stream.rewind()? {
            return Err(self.err_incompatible(
                source,
                eyre::eyre!("LOB stream does not support rewind"),
            ));
        }
        let result = self.store_chunked(inner, &mut LobSource::stream(stream));
        stream.rewind()?;
        result
    }

    /// Writes a byte sequence as a chunk chain, extending the block chain as
    /// needed. Each outgoing chunk header is patched with its forward link
    /// *before* the block holding it is finalized, so closed-block digests
    /// always cover the final header bytes.
    fn store_chunked(
        &self,
        inner: &mut ColumnInner,
        lob_source: &mut LobSource<'_>,
    ) -> Result<(ColumnDataAddress, ColumnDataAddress)> {
        let total = lob_source.total_len();
        let mut remaining = total;

        let required = chunk_space_needed(remaining);
        let mut block_id = self.select_available_block(inner, required)?;
        let start_offset = self.block_mut(inner, block_id)?.next_data_pos();
        let start = ColumnDataAddress::new(block_id, start_offset);

        let mut chunk_buf = Vec::new();
        loop {
            let block = self.block_mut(inner, block_id)?;
            let capacity = block.free_space().saturating_sub(LOB_CHUNK_HEADER_SIZE) as u64;
            let chunk_len = remaining.min(capacity) as usize;
            let header_offset = block.next_data_pos();

            // written terminal first, patched below if the chain continues
            let remaining_before = remaining;
            block.append(&LobChunkHeader::terminal(remaining_before as u32, chunk_len as u32).encode())?;
            lob_source.fill(&mut chunk_buf, chunk_len)?;
            let block = self.block_mut(inner, block_id)?;
            block.append(&chunk_buf)?;
            remaining -= chunk_len as u64;

            if remaining == 0 {
                let end_offset = block.next_data_pos();
                block.sync()?;
                self.refresh_free_space(inner, block_id)?;
                return Ok((start, ColumnDataAddress::new(block_id, end_offset)));
            }

            let next_required = chunk_space_needed(remaining);
            let next_id = self.pick_or_create_next_block(inner, block_id, next_required)?;
            let next_offset = self.block_mut(inner, next_id)?.next_data_pos();

            let patched = LobChunkHeader {
                remaining_lob_length: remaining_before as u32,
                chunk_length: chunk_len as u32,
                next_chunk_block_id: next_id,
                next_chunk_offset: next_offset,
            };
            self.block_mut(inner, block_id)?
                .write_at(header_offset, &patched.encode())?;
            self.close_block(inner, block_id)?;

            self.promote_write_head(inner, next_id)?;
            block_id = next_id;
        }
    }

    /// First-fit scan over non-Closed blocks in ascending id order; when
    /// nothing fits, the chain is extended off the tracked block with the
    /// most free space, or off the write head when nothing is tracked.
    fn select_available_block(&self, inner: &mut ColumnInner, required: usize) -> Result<u64> {
        let mut candidates: Vec<u64> = inner.free_space.keys().copied().collect();
        candidates.sort_unstable();
        let mut most_free: Option<(u64, usize)> = None;
        for id in candidates {
            let free = inner.free_space.get(&id).copied().unwrap_or(0);
            if free >= required {
                return Ok(id);
            }
            if most_free.map_or(true, |(_, best)| free > best) {
                most_free = Some((id, free));
            }
        }
        let from = most_free.map_or(inner.current_block_id, |(id, _)| id);
        self.create_or_get_next_block(inner, from, required)
    }

    /// Moves the write head past `block_id`: reuses the newest registered
    /// successor with enough space, or creates a fresh block; finalizes the
    /// predecessor's digest. Returns the new write head.
    fn create_or_get_next_block(
        &self,
        inner: &mut ColumnInner,
        block_id: u64,
        required: usize,
    ) -> Result<u64> {
        let next_id = self.pick_or_create_next_block(inner, block_id, required)?;
        self.close_block(inner, block_id)?;
        self.promote_write_head(inner, next_id)?;
        Ok(next_id)
    }

    /// Makes `block_id` the write head. The previous head, if it is still
    /// marked Current, becomes Available so the chain keeps exactly one
    /// Current block.
    fn promote_write_head(&self, inner: &mut ColumnInner, block_id: u64) -> Result<()> {
        let old_head = inner.current_block_id;
        if old_head != block_id {
            let head = self.block_mut(inner, old_head)?;
            if head.state() == BlockState::Current {
                head.set_state(BlockState::Available);
            }
        }
        self.block_mut(inner, block_id)?.set_state(BlockState::Current);
        inner.current_block_id = block_id;
        Ok(())
    }

    /// The reuse-or-create half of chain extension, without finalizing the
    /// predecessor. LOB writes patch the outgoing chunk header between this
    /// and `close_block`.
    fn pick_or_create_next_block(
        &self,
        inner: &mut ColumnInner,
        block_id: u64,
        required: usize,
    ) -> Result<u64> {
        let successors = inner.registry.next_blocks(block_id).to_vec();
        for next in successors {
            let block = self.block_mut(inner, next)?;
            if block.state() != BlockState::Closed && block.free_space() >= required {
                return Ok(next);
            }
        }

        let new_id = inner.registry.allocate_block_id();
        let block = ColumnDataBlock::create(&self.dir, new_id, block_id, self.block_data_area_size)?;
        debug!(
            column = %self.column_ref,
            block_id = new_id,
            prev_block_id = block_id,
            "allocated column data block"
        );
        inner.registry.register_block(new_id, block_id);
        inner.free_space.insert(new_id, block.free_space());
        inner.cache.insert(block)?;
        Ok(new_id)
    }

    /// Finalizes a block: digest chained off the predecessor's stored
    /// digest, state Closed, dropped from the free-space map.
    fn close_block(&self, inner: &mut ColumnInner, block_id: u64) -> Result<()> {
        let prev_id = self.block_mut(inner, block_id)?.prev_block_id();
        let prev_digest = if prev_id == 0 {
            0
        } else {
            self.block_mut(inner, prev_id)?.stored_digest()
        };
        self.block_mut(inner, block_id)?.finalize(prev_digest)?;
        inner.free_space.remove(&block_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Reads the value at `address`. Sentinel addresses yield `Null`.
    /// TEXT/BINARY values above the small-LOB threshold come back as lazy
    /// streams; `hold_source` chooses whether they keep the column alive
    /// (`Arc`) or merely observe it (`Weak`).
    pub fn read_record(
        self: &Arc<Self>,
        address: ColumnDataAddress,
        hold_source: bool,
    ) -> Result<Variant> {
        if address.is_sentinel() {
            return Ok(Variant::Null);
        }

        let lazy_lob = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match self.data_type {
                ColumnDataType::Text | ColumnDataType::Binary => {
                    let header = self.chunk_header_at(inner, address)?;
                    let total = header.remaining_lob_length as u64;
                    if total <= SMALL_LOB_THRESHOLD as u64 {
                        let bytes = self.read_lob_bytes(inner, address)?;
                        return Ok(match self.data_type {
                            ColumnDataType::Text => {
                                let text = String::from_utf8(bytes).map_err(|e| {
                                    self.err_invalid_chunk(address, format!("not valid UTF-8: {}", e))
                                })?;
                                Variant::String(text)
                            }
                            _ => Variant::Binary(bytes),
                        });
                    }
                    total
                }
                _ => return self.decode_scalar(inner, address),
            }
        };

        // lock released: lazy streams take it per chunk read
        Ok(match self.data_type {
            ColumnDataType::Text => Variant::Clob(Box::new(ColumnClobStream::open(
                self, address, lazy_lob, hold_source,
            ))),
            _ => Variant::Blob(Box::new(ColumnBlobStream::open(
                self, address, lazy_lob, hold_source,
            ))),
        })
    }

    fn decode_scalar(&self, inner: &mut ColumnInner, address: ColumnDataAddress) -> Result<Variant> {
        macro_rules! read_le {
            ($this:expr, $inner:expr, $addr:expr, $t:ty, $variant:ident) => {{
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                $this.read_validated($inner, $addr, &mut buf)?;
                Variant::$variant(<$t>::from_le_bytes(buf))
            }};
        }

        Ok(match self.data_type {
            ColumnDataType::Bool => {
                let mut buf = [0u8; 1];
                self.read_validated(inner, address, &mut buf)?;
                match buf[0] {
                    0 => Variant::Bool(false),
                    1 => Variant::Bool(true),
                    other => {
                        return Err(self.err_invalid_chunk(
                            address,
                            format!("invalid boolean byte {}", other),
                        ))
                    }
                }
            }
            ColumnDataType::Int8 => read_le!(self, inner, address, i8, Int8),
            ColumnDataType::UInt8 => read_le!(self, inner, address, u8, UInt8),
            ColumnDataType::Int16 => read_le!(self, inner, address, i16, Int16),
            ColumnDataType::UInt16 => read_le!(self, inner, address, u16, UInt16),
            ColumnDataType::Int32 => read_le!(self, inner, address, i32, Int32),
            ColumnDataType::UInt32 => read_le!(self, inner, address, u32, UInt32),
            ColumnDataType::Int64 => read_le!(self, inner, address, i64, Int64),
            ColumnDataType::UInt64 => read_le!(self, inner, address, u64, UInt64),
            ColumnDataType::Float => {
                let mut buf = [0u8; 4];
                self.read_validated(inner, address, &mut buf)?;
                Variant::Float(f32::from_le_bytes(buf))
            }
            ColumnDataType::Double => {
                let mut buf = [0u8; 8];
                self.read_validated(inner, address, &mut buf)?;
                Variant::Double(f64::from_le_bytes(buf))
            }
            ColumnDataType::Timestamp => {
                let mut date_word = [0u8; 4];
                self.read_validated(inner, address, &mut date_word)?;
                let bytes = if date_word[0] & 1 != 0 {
                    let mut full = [0u8; 12];
                    self.read_validated(inner, address, &mut full)?;
                    full.to_vec()
                } else {
                    date_word.to_vec()
                };
                let (dt, _) = RawDateTime::deserialize(&bytes)
                    .map_err(|e| self.err_invalid_chunk(address, e.to_string()))?;
                Variant::DateTime(Box::new(dt))
            }
            ColumnDataType::Text | ColumnDataType::Binary => {
                unreachable!("LOB types take the chunked path")
            }
        })
    }

    fn read_validated(
        &self,
        inner: &mut ColumnInner,
        address: ColumnDataAddress,
        buf: &mut [u8],
    ) -> Result<()> {
        let block = self.block_mut(inner, address.block_id())?;
        if address.offset() as usize + buf.len() > block.data_area_size() {
            return Err(eyre::Report::new(StorageError::InvalidDataPosition {
                column: self.column_ref.clone(),
                block_id: address.block_id(),
                offset: address.offset(),
            }));
        }
        block.read_at(address.offset(), buf)
    }

    /// Materializes a whole chunk chain, cross-checking every link. Used for
    /// small LOBs and master column records.
    fn read_lob_bytes(
        &self,
        inner: &mut ColumnInner,
        start: ColumnDataAddress,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut address = start;
        let mut expected_remaining: Option<u32> = None;
        loop {
            let header = self.chunk_header_at(inner, address)?;
            if let Some(expected) = expected_remaining {
                if header.remaining_lob_length != expected {
                    return Err(self.err_invalid_chunk(
                        address,
                        format!(
                            "remaining length {} disagrees with chain ({} expected)",
                            header.remaining_lob_length, expected
                        ),
                    ));
                }
            }

            let payload_address =
                ColumnDataAddress::new(address.block_id(), address.offset() + LOB_CHUNK_HEADER_SIZE as u32);
            let offset = out.len();
            out.resize(offset + header.chunk_length as usize, 0);
            self.read_validated(inner, payload_address, &mut out[offset..])?;

            if !header.has_next() {
                if header.chunk_length != header.remaining_lob_length {
                    return Err(self.err_invalid_chunk(
                        address,
                        format!(
                            "chain ends with {} of {} bytes unread",
                            header.remaining_lob_length - header.chunk_length,
                            header.remaining_lob_length
                        ),
                    ));
                }
                return Ok(out);
            }
            ensure!(
                header.chunk_length > 0,
                "column {}: zero-length non-terminal LOB chunk at block {}",
                self.column_ref,
                address.block_id()
            );
            expected_remaining = Some(header.remaining_lob_length - header.chunk_length);
            address =
                ColumnDataAddress::new(header.next_chunk_block_id, header.next_chunk_offset);
        }
    }

    /// Reads and validates one chunk header: structural decode plus
    /// existence and range checks on the forward link.
    fn chunk_header_at(
        &self,
        inner: &mut ColumnInner,
        address: ColumnDataAddress,
    ) -> Result<LobChunkHeader> {
        let mut buf = [0u8; LOB_CHUNK_HEADER_SIZE];
        self.read_validated(inner, address, &mut buf)?;
        let header = LobChunkHeader::decode(&buf)
            .map_err(|e| self.err_invalid_chunk(address, e.to_string()))?;

        let payload_end =
            address.offset() as usize + LOB_CHUNK_HEADER_SIZE + header.chunk_length as usize;
        if payload_end > self.block_data_area_size {
            return Err(self.err_invalid_chunk(
                address,
                format!("chunk payload runs past the data area ({} bytes)", payload_end),
            ));
        }

        if header.has_next() {
            if !inner.registry.contains(header.next_chunk_block_id) {
                return Err(self.err_invalid_chunk(
                    address,
                    format!("next chunk names unknown block {}", header.next_chunk_block_id),
                ));
            }
            if header.next_chunk_offset as usize + LOB_CHUNK_HEADER_SIZE
                > self.block_data_area_size
            {
                return Err(self.err_invalid_chunk(
                    address,
                    format!("next chunk offset {} is out of range", header.next_chunk_offset),
                ));
            }
        }
        Ok(header)
    }

    // entry points for lazy column-backed streams

    pub(crate) fn lob_chunk_header(&self, address: ColumnDataAddress) -> Result<LobChunkHeader> {
        let mut guard = self.inner.lock();
        self.chunk_header_at(&mut guard, address)
    }

    pub(crate) fn lob_chunk_payload(
        &self,
        address: ColumnDataAddress,
        buf: &mut [u8],
    ) -> Result<()> {
        let mut guard = self.inner.lock();
        self.read_validated(&mut guard, address, buf)
    }

    // ------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------

    /// Undoes all writes after `target`: walks the backward chain from
    /// `first_available_block_id`, reopening every visited block, until the
    /// target block becomes the write head with its cursor at the target
    /// offset. The chain is verified read-only first; an unreachable or
    /// out-of-range target fails with the column unchanged.
    pub fn rollback_to_address(
        &self,
        target: ColumnDataAddress,
        first_available_block_id: u64,
    ) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let mut cursor = first_available_block_id;
        while cursor != target.block_id() {
            let prev = self.block_mut(inner, cursor)?.prev_block_id();
            if prev == 0 {
                return Err(eyre::Report::new(StorageError::UnreachableRollbackTarget {
                    column: self.column_ref.clone(),
                    target_block_id: target.block_id(),
                    from_block_id: first_available_block_id,
                }));
            }
            cursor = prev;
        }
        if target.offset() as usize > self.block_mut(inner, cursor)?.data_area_size() {
            return Err(eyre::Report::new(StorageError::InvalidDataPosition {
                column: self.column_ref.clone(),
                block_id: cursor,
                offset: target.offset(),
            }));
        }

        let mut block_id = first_available_block_id;
        loop {
            if block_id == target.block_id() {
                let block = self.block_mut(inner, block_id)?;
                block.set_next_data_pos(target.offset());
                block.set_state(BlockState::Current);
                block.sync()?;
                self.refresh_free_space(inner, block_id)?;
                inner.current_block_id = block_id;
                return Ok(());
            }

            let block = self.block_mut(inner, block_id)?;
            block.set_next_data_pos(0);
            block.set_state(BlockState::Available);
            block.sync()?;
            let prev = block.prev_block_id();
            self.refresh_free_space(inner, block_id)?;
            block_id = prev;
        }
    }

    // ------------------------------------------------------------------
    // Master column operations
    // ------------------------------------------------------------------

    pub fn generate_next_user_trid(&self) -> Result<u64> {
        let mut guard = self.inner.lock();
        let counters = self.require_trid_counters(&mut guard)?;
        counters.generate_next_user_trid()
    }

    pub fn generate_next_system_trid(&self) -> Result<u64> {
        let first_user_trid = self.first_user_trid;
        let mut guard = self.inner.lock();
        let counters = self.require_trid_counters(&mut guard)?;
        counters.generate_next_system_trid(first_user_trid)
    }

    /// Stores a master column record through the normal block path and
    /// applies the matching master index mutation. Insert requires an
    /// unused trid; Update and Delete require a present one.
    pub fn put_master_column_record(
        &self,
        record: &MasterColumnRecord,
    ) -> Result<ColumnDataAddress> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        ensure!(
            inner.index.is_some(),
            "column {} is not a master column",
            self.column_ref
        );

        let mut buf = Vec::with_capacity(record.serialized_size());
        record.serialize_into(&mut buf)?;

        // index precondition before any block write
        let present = inner
            .index
            .as_ref()
            .map(|index| index.get(record.trid).is_some())
            .unwrap_or(false);
        match record.operation {
            DmlOperationType::Insert => {
                if present {
                    return Err(eyre::Report::new(StorageError::DuplicateTrid {
                        column: self.column_ref.clone(),
                        trid: record.trid,
                    }));
                }
            }
            DmlOperationType::Update | DmlOperationType::Delete => {
                if !present {
                    return Err(eyre::Report::new(StorageError::TridNotFound {
                        column: self.column_ref.clone(),
                        trid: record.trid,
                    }));
                }
            }
        }

        let (start, _end) = self.store_chunked(inner, &mut LobSource::bytes(&buf))?;
        let index = inner
            .index
            .as_mut()
            .expect("master column index presence checked above");
        match record.operation {
            DmlOperationType::Insert => index.insert(record.trid, start)?,
            DmlOperationType::Update => index.update(record.trid, start)?,
            DmlOperationType::Delete => index.erase(record.trid)?,
        }
        Ok(start)
    }

    /// Reads back the master column record a trid currently points at.
    pub fn get_master_column_record(&self, trid: u64) -> Result<MasterColumnRecord> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let address = self.lookup_master_address(inner, trid)?;
        let bytes = self.read_lob_bytes(inner, address)?;
        let (record, _) = MasterColumnRecord::deserialize(&bytes)?;
        Ok(record)
    }

    pub fn find_master_record_address(&self, trid: u64) -> Result<ColumnDataAddress> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        self.lookup_master_address(inner, trid)
    }

    pub fn erase_from_master_index(&self, trid: u64) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        self.lookup_master_address(inner, trid)?;
        inner
            .index
            .as_mut()
            .expect("presence checked by lookup")
            .erase(trid)
    }

    fn lookup_master_address(
        &self,
        inner: &mut ColumnInner,
        trid: u64,
    ) -> Result<ColumnDataAddress> {
        let index = match inner.index.as_ref() {
            Some(index) => index,
            None => bail!("column {} is not a master column", self.column_ref),
        };
        index.get(trid).ok_or_else(|| {
            eyre::Report::new(StorageError::TridNotFound {
                column: self.column_ref.clone(),
                trid,
            })
        })
    }

    fn require_trid_counters<'a>(
        &self,
        inner: &'a mut ColumnInner,
    ) -> Result<&'a mut TridCounterFile> {
        match inner.trid.as_mut() {
            Some(counters) => Ok(counters),
            None => bail!("column {} is not a master column", self.column_ref),
        }
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn block_mut<'a>(
        &self,
        inner: &'a mut ColumnInner,
        block_id: u64,
    ) -> Result<&'a mut ColumnDataBlock> {
        if !inner.registry.contains(block_id) {
            return Err(eyre::Report::new(StorageError::BlockNotFound {
                column: self.column_ref.clone(),
                block_id,
            }));
        }
        inner
            .cache
            .get_or_open(&self.dir, block_id)
            .wrap_err_with(|| format!("column {}", self.column_ref))
    }

    fn refresh_free_space(&self, inner: &mut ColumnInner, block_id: u64) -> Result<()> {
        let block = self.block_mut(inner, block_id)?;
        let state = block.state();
        let free = block.free_space();
        if state == BlockState::Closed {
            inner.free_space.remove(&block_id);
        } else {
            inner.free_space.insert(block_id, free);
        }
        Ok(())
    }

    fn err_incompatible(&self, source: VariantType, cause: eyre::Report) -> eyre::Report {
        eyre::Report::new(StorageError::IncompatibleValue {
            column: self.column_ref.clone(),
            source_type: source,
            dest_type: self.data_type.variant_type(),
            reason: Some(cause.to_string()),
        })
    }

    pub(crate) fn err_invalid_chunk(&self, address: ColumnDataAddress, reason: String) -> eyre::Report {
        eyre::Report::new(StorageError::InvalidLobChunkHeader {
            column: self.column_ref.clone(),
            block_id: address.block_id(),
            offset: address.offset(),
            reason,
        })
    }
}

/// Free bytes a block must offer to start the next chunk there: the whole
/// rest of the LOB when it is small, else the reuse threshold.
fn chunk_space_needed(remaining: u64) -> usize {
    (LOB_CHUNK_HEADER_SIZE as u64 + remaining).min(LOB_CHUNK_REUSE_THRESHOLD as u64) as usize
}

fn ensure_within(
    column: &Column,
    source: VariantType,
    len: usize,
    max: usize,
) -> Result<()> {
    if len > max {
        return Err(column.err_incompatible(
            source,
            eyre::eyre!("value of {} bytes exceeds the column maximum of {}", len, max),
        ));
    }
    Ok(())
}

fn column_ref(ctx: &ColumnContext, name: &str, column_id: u64) -> ColumnRef {
    ColumnRef {
        database_name: ctx.database_name.clone(),
        table_name: ctx.table_name.clone(),
        column_name: name.to_owned(),
        database_id: ctx.database_id,
        table_id: ctx.table_id,
        column_id,
    }
}

fn validate_column_name(name: &str) -> Result<()> {
    ensure!(
        !name.is_empty() && name.len() <= MAX_NAME_LENGTH,
        "column name must be 1..={} bytes",
        MAX_NAME_LENGTH
    );
    let bytes = name.as_bytes();
    ensure!(
        bytes[0].is_ascii_alphabetic() || bytes[0] == b'_',
        "column name '{}' must start with a letter or underscore",
        name
    );
    ensure!(
        bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'_'),
        "column name '{}' may only contain letters, digits, and underscores",
        name
    );
    Ok(())
}

fn write_main_index_id(dir: &Path, index_id: u64) -> Result<()> {
    std::fs::write(dir.join(MAIN_INDEX_ID_FILE_NAME), index_id.to_be_bytes())
        .wrap_err("failed to write main index id file")
}

fn read_main_index_id(dir: &Path) -> Result<u64> {
    let bytes = std::fs::read(dir.join(MAIN_INDEX_ID_FILE_NAME))
        .wrap_err("failed to read main index id file")?;
    ensure!(bytes.len() == 8, "main index id file has wrong size");
    Ok(u64::from_be_bytes(bytes[..8].try_into().unwrap()))
}

/// Byte source for chunked writes: either an in-memory buffer or a LOB
/// stream drained incrementally.
enum LobSource<'a> {
    Bytes { data: &'a [u8], pos: usize },
    Stream { stream: &'a mut dyn LobStream },
}

impl<'a> LobSource<'a> {
    fn bytes(data: &'a [u8]) -> Self {
        LobSource::Bytes { data, pos: 0 }
    }

    fn stream(stream: &'a mut dyn LobStream) -> Self {
        LobSource::Stream { stream }
    }

    fn total_len(&self) -> u64 {
        match self {
            LobSource::Bytes { data, .. } => data.len() as u64,
            LobSource::Stream { stream } => stream.size(),
        }
    }

    /// Fills `buf` with exactly `len` source bytes.
    fn fill(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<()> {
        buf.clear();
        match self {
            LobSource::Bytes { data, pos } => {
                ensure!(*pos + len <= data.len(), "LOB source exhausted");
                buf.extend_from_slice(&data[*pos..*pos + len]);
                *pos += len;
            }
            LobSource::Stream { stream } => {
                buf.resize(len, 0);
                let mut filled = 0;
                while filled < len {
                    let n = stream.read(&mut buf[filled..])?;
                    ensure!(n > 0, "LOB stream ended {} bytes early", len - filled);
                    filled += n;
                }
            }
        }
        Ok(())
    }
}

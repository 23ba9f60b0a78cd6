//! # Strata Configuration Constants
//!
//! This module centralizes all configuration constants of the column storage
//! engine, grouping interdependent values together and documenting their
//! relationships.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_BLOCK_DATA_AREA_SIZE (8192 bytes)
//!       │
//!       ├─> LOB_CHUNK_HEADER_SIZE (20 bytes, fixed wire format)
//!       │     Every LOB chunk carries this header; a block data area must
//!       │     be able to hold at least one header plus a minimal payload.
//!       │
//!       ├─> LOB_CHUNK_REUSE_THRESHOLD (header + 32 bytes)
//!       │     When chaining to a next block mid-LOB we reserve slightly more
//!       │     than a bare header so a zero-length chunk is never stranded.
//!       │
//!       └─> MAX_MASTER_COLUMN_RECORD_SIZE (7680 bytes)
//!             Must fit in one block data area together with its varint
//!             length prefix, or put_master_column_record could never succeed.
//!
//! MAX_STRING_LENGTH (65535 bytes)
//!       │
//!       └─> TEXT columns store values up to MAX_STRING_LENGTH/2 as strings;
//!           larger values are promoted to CLOB (bounded by MAX_CLOB_LENGTH/2).
//!           The same halved thresholds govern BINARY/BLOB promotion.
//!
//! FIRST_USER_TRID (4096)
//!       │
//!       └─> System TRIDs live in [1, FIRST_USER_TRID); user TRIDs in
//!           [FIRST_USER_TRID, u64::MAX]. The system counter is exhausted at
//!           the boundary, the user counter at u64::MAX.
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `LOB_CHUNK_HEADER_SIZE + 1 <= DEFAULT_BLOCK_DATA_AREA_SIZE` — a block
//!    must hold at least one one-byte chunk.
//! 2. `MAX_MASTER_COLUMN_RECORD_SIZE < DEFAULT_BLOCK_DATA_AREA_SIZE` — an MCR
//!    plus its length prefix fits a fresh block.
//! 3. `SMALL_LOB_THRESHOLD <= MAX_STRING_LENGTH` — eagerly materialized LOBs
//!    are always representable as inline values.

// ============================================================================
// BLOCK LAYOUT
// ============================================================================

/// Size of the data area of a column data block, in bytes.
///
/// Each block file consists of a fixed 128-byte header followed by the data
/// area. Values are appended to the data area until it fills, at which point
/// a next block is chained.
pub const DEFAULT_BLOCK_DATA_AREA_SIZE: usize = 8192;

/// Size of the fixed block file header (magic, chain links, state, digest).
pub const BLOCK_HEADER_SIZE: usize = 128;

/// Default capacity of the per-column LRU block cache, in blocks.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 16;

// ============================================================================
// LOB CHUNKING
// These constants define the chunk-chain wire format and must never change
// for files written by released versions.
// ============================================================================

/// Serialized size of a `LobChunkHeader`: remaining length (4) + chunk
/// length (4) + next block id (8) + next offset (4).
pub const LOB_CHUNK_HEADER_SIZE: usize = 20;

/// Minimum free space required in a block before a new LOB chunk is started
/// there. Slightly more than a bare header so a chunk always carries payload.
pub const LOB_CHUNK_REUSE_THRESHOLD: usize = LOB_CHUNK_HEADER_SIZE + 32;

/// LOBs at or below this total length are materialized eagerly on read
/// instead of being surfaced as lazy column-backed streams.
pub const SMALL_LOB_THRESHOLD: usize = 256;

// ============================================================================
// VALUE LIMITS
// ============================================================================

/// Maximum length of an inline string value, in bytes.
pub const MAX_STRING_LENGTH: usize = 65535;

/// Maximum length of an inline binary value, in bytes.
pub const MAX_BINARY_LENGTH: usize = 65535;

/// Maximum length of a CLOB, in bytes.
pub const MAX_CLOB_LENGTH: usize = 1 << 30;

/// Maximum length of a BLOB, in bytes.
pub const MAX_BLOB_LENGTH: usize = 1 << 30;

/// Cap on the output of casting a CLOB/BLOB to another type. Casting first
/// materializes the stream; anything above this fails the cast.
pub const MAX_LOB_CAST_LENGTH: usize = 65536;

/// Cap on the streamed payload of a serialized CLOB/BLOB variant. Oversized
/// LOBs fail serialization and are encoded as zero-length so size estimation
/// never has to pre-read a stream.
pub const MAX_SERIALIZED_LOB_LENGTH: usize = 0xFFFF;

// ============================================================================
// MASTER COLUMN
// ============================================================================

/// First table row id available to user rows. TRIDs below this value are
/// reserved for system rows.
pub const FIRST_USER_TRID: u64 = 4096;

/// Hard cap on the serialized size of a master column record.
pub const MAX_MASTER_COLUMN_RECORD_SIZE: usize = 7680;

// ============================================================================
// NAMING
// ============================================================================

/// Maximum length of a column name, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

const _: () = assert!(
    LOB_CHUNK_HEADER_SIZE + 1 <= DEFAULT_BLOCK_DATA_AREA_SIZE,
    "block data area must hold at least one minimal LOB chunk"
);

const _: () = assert!(
    MAX_MASTER_COLUMN_RECORD_SIZE < DEFAULT_BLOCK_DATA_AREA_SIZE,
    "a master column record plus length prefix must fit one block data area"
);

const _: () = assert!(
    SMALL_LOB_THRESHOLD <= MAX_STRING_LENGTH,
    "eagerly materialized LOBs must be representable inline"
);

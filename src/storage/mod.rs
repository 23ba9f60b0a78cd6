//! # Column Storage Engine
//!
//! This module implements the on-disk storage of a single column: a chain of
//! fixed-capacity block files holding the column's values, plus the
//! master-column machinery (row id generation, master index) that makes one
//! designated column per table the authority on row existence.
//!
//! ## On-Disk Layout
//!
//! A column directory contains:
//!
//! ```text
//! <datadir>/<column>/
//! ├── b1.sdb            block files: 128-byte header + data area
//! ├── b2.sdb
//! ├── ...
//! ├── tc.stc            TRID counter file        (master column only)
//! ├── i1.sdi            master index op log      (master column only)
//! ├── mi.smi            main index id file       (master column only)
//! └── init.flag         initialization marker, written last
//! ```
//!
//! ## Block Chain Integrity
//!
//! Blocks form a chain through the `prev_block_id` header field. When a block
//! is closed its digest is finalized as CRC-64 over the previous block's
//! digest concatenated with the block's used data area, so the digest of the
//! newest closed block covers the whole chain prefix. `open` verifies the
//! chain with an explicit-stack depth-first walk.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` per column, held for the full duration of every
//! public entry point. Lazy LOB streams re-enter through `Arc<Column>` and
//! take the lock per chunk read.

pub mod address;
pub mod block;
pub mod cache;
pub mod chunk;
pub mod column;
pub mod column_lob;
pub mod index;
pub mod mcr;
pub mod registry;
pub mod trid;

pub use address::{ColumnDataAddress, ColumnDataRecord};
pub use block::{BlockState, ColumnDataBlock};
pub use chunk::LobChunkHeader;
pub use column::{Column, ColumnContext};
pub use column_lob::{ColumnBlobStream, ColumnClobStream};
pub use index::MasterIndex;
pub use mcr::{DmlOperationType, MasterColumnRecord};
pub use trid::TridCounterFile;

/// Name of the marker file written after a column directory is fully
/// initialized. Its absence on open means the directory is garbage.
pub const INIT_MARKER_FILE_NAME: &str = "init.flag";

/// Name of the TRID counter file inside a master column directory.
pub const TRID_COUNTER_FILE_NAME: &str = "tc.stc";

/// Name of the main-index-id file inside a master column directory.
pub const MAIN_INDEX_ID_FILE_NAME: &str = "mi.smi";

/// Extension of block data files (`b<blockId>.sdb`).
pub const BLOCK_FILE_EXTENSION: &str = "sdb";

/// Extension of master index log files (`i<indexId>.sdi`).
pub const INDEX_FILE_EXTENSION: &str = "sdi";

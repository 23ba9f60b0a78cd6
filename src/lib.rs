//! # Strata - Column Storage Engine
//!
//! Strata is the column storage subsystem of a relational engine: each table
//! column persists its values independently in a chain of fixed-capacity,
//! digest-verified block files, and one designated *master column* per table
//! records row existence, row ids, and the addresses of every other column's
//! values.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strata::storage::{Column, ColumnContext};
//! use strata::types::{ColumnDataType, Variant};
//!
//! let ctx = ColumnContext::new("shop", "orders", 1, 1, "./data");
//! let column = Column::create(&ctx, "amount", 1, ColumnDataType::Int64, false)?;
//!
//! let (address, _end) = column.put_record(&mut Variant::from(42i64))?;
//! assert_eq!(column.read_record(address, false)?, Variant::Int64(42));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           Column (orchestrator)              │
//! │  put_record / read_record / rollback / TRIDs │
//! ├───────────────┬──────────────┬───────────────┤
//! │ BlockRegistry │  BlockCache  │  MasterIndex  │
//! ├───────────────┴──────────────┴───────────────┤
//! │       ColumnDataBlock (mmap block files)     │
//! ├──────────────────────────────────────────────┤
//! │   Variant / LOB streams / varint encoding    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Value Model
//!
//! [`types::Variant`] is the tagged union flowing through the engine: null,
//! booleans, fixed-width integers, floats, packed date-times, strings,
//! binary buffers, and streamed character/binary LOBs. Values are coerced to
//! a column's declared [`types::ColumnDataType`] on write and surface again
//! as variants on read; LOBs above the small-object threshold come back as
//! lazy streams over the block chain.
//!
//! ## Integrity
//!
//! Closed blocks carry a CRC-64 digest folded over the previous block's
//! digest, so the newest closed block authenticates the whole chain prefix.
//! Opening a column re-walks the chain and refuses blocks whose digest or
//! backward link disagrees with what was recorded.

pub mod config;
pub mod encoding;
pub mod error;
pub mod lob;
#[macro_use]
pub mod macros;
pub mod storage;
pub mod types;

pub use error::{ColumnRef, ExhaustionError, StorageError};
pub use storage::{Column, ColumnContext, ColumnDataAddress, ColumnDataRecord};
pub use types::{ColumnDataType, Variant, VariantType};

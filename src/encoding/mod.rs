//! # Encoding Module
//!
//! Low-level byte encodings shared across the engine:
//!
//! - [`varint`]: LEB128 variable-length integers (unsigned, plus zigzag for
//!   signed), used by the self-describing `Variant` serialization and the
//!   compact form of `ColumnDataAddress`.
//!
//! Fixed-width little-endian scalar layouts used inside block data areas are
//! produced inline by the column read/write paths; only the shared
//! variable-length codec lives here.

pub mod varint;

pub use varint::{
    decode_varint, decode_varint_signed, encode_varint, encode_varint_signed, varint_len,
    varint_len_signed, MAX_VARINT_LEN,
};

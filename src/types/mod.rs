//! # Value Type System
//!
//! This module provides the dynamically typed value model of the storage
//! engine:
//!
//! - [`VariantType`]: the closed set of runtime value tags with stable wire
//!   values (a serialized variant starts with this tag byte)
//! - [`ColumnDataType`]: the declared type of a column, driving coercion and
//!   the on-disk encoding chosen by `Column::put_record`
//! - [`RawDateTime`]: owned date-time value with an optional time-of-day part
//! - [`Variant`]: the tagged-union value container itself
//!
//! ## Tag Stability
//!
//! `VariantType` discriminants are part of the on-disk format and must never
//! change: 0=Null, 1=Bool, 2..9 = signed/unsigned integers by width,
//! 10=Float, 11=Double, 12=DateTime (13..18 reserved for the rest of the
//! date/time family), 19=String, 20=Binary, 21=Clob, 22=Blob.

pub mod datetime;
pub mod variant;
mod variant_cast;
mod variant_ops;

pub use datetime::{RawDateTime, RawTime};
pub use variant::Variant;

use crate::config::LOB_CHUNK_HEADER_SIZE;

/// Runtime type tag of a [`Variant`]. Discriminant values are stable wire
/// format; see the module docs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariantType {
    Null = 0,
    Bool = 1,
    Int8 = 2,
    UInt8 = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    DateTime = 12,
    String = 19,
    Binary = 20,
    Clob = 21,
    Blob = 22,
}

/// Highest tag value a deserializer will accept.
pub const MAX_VARIANT_TYPE_TAG: u8 = VariantType::Blob as u8;

impl VariantType {
    /// Decodes a wire tag byte. Reserved date/time tags (13..=18) and
    /// anything above [`MAX_VARIANT_TYPE_TAG`] are rejected.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => VariantType::Null,
            1 => VariantType::Bool,
            2 => VariantType::Int8,
            3 => VariantType::UInt8,
            4 => VariantType::Int16,
            5 => VariantType::UInt16,
            6 => VariantType::Int32,
            7 => VariantType::UInt32,
            8 => VariantType::Int64,
            9 => VariantType::UInt64,
            10 => VariantType::Float,
            11 => VariantType::Double,
            12 => VariantType::DateTime,
            19 => VariantType::String,
            20 => VariantType::Binary,
            21 => VariantType::Clob,
            22 => VariantType::Blob,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            VariantType::Int8
                | VariantType::UInt8
                | VariantType::Int16
                | VariantType::UInt16
                | VariantType::Int32
                | VariantType::UInt32
                | VariantType::Int64
                | VariantType::UInt64
                | VariantType::Float
                | VariantType::Double
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            VariantType::Int8
                | VariantType::UInt8
                | VariantType::Int16
                | VariantType::UInt16
                | VariantType::Int32
                | VariantType::UInt32
                | VariantType::Int64
                | VariantType::UInt64
        )
    }

    pub fn is_lob(self) -> bool {
        matches!(self, VariantType::Clob | VariantType::Blob)
    }
}

/// Declared data type of a column.
///
/// Uses `#[repr(u8)]` for a single-byte discriminant in column metadata
/// records.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnDataType {
    Bool = 0,
    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,
    Float = 9,
    Double = 10,
    Text = 11,
    Binary = 12,
    Timestamp = 13,
}

impl ColumnDataType {
    /// Minimum number of free bytes a block must offer before a value of
    /// this type can be written to it. Fixed-width scalars require their full
    /// encoded width; TEXT/BINARY require room for at least a chunk header;
    /// TIMESTAMP requires its date part (time-of-day is optional on disk).
    pub fn min_required_length(self) -> usize {
        match self {
            ColumnDataType::Bool | ColumnDataType::Int8 | ColumnDataType::UInt8 => 1,
            ColumnDataType::Int16 | ColumnDataType::UInt16 => 2,
            ColumnDataType::Int32 | ColumnDataType::UInt32 | ColumnDataType::Float => 4,
            ColumnDataType::Int64 | ColumnDataType::UInt64 | ColumnDataType::Double => 8,
            ColumnDataType::Text | ColumnDataType::Binary => LOB_CHUNK_HEADER_SIZE,
            ColumnDataType::Timestamp => datetime::DATE_PART_SERIALIZED_SIZE,
        }
    }

    /// The variant type values of this column are surfaced as on read.
    pub fn variant_type(self) -> VariantType {
        match self {
            ColumnDataType::Bool => VariantType::Bool,
            ColumnDataType::Int8 => VariantType::Int8,
            ColumnDataType::UInt8 => VariantType::UInt8,
            ColumnDataType::Int16 => VariantType::Int16,
            ColumnDataType::UInt16 => VariantType::UInt16,
            ColumnDataType::Int32 => VariantType::Int32,
            ColumnDataType::UInt32 => VariantType::UInt32,
            ColumnDataType::Int64 => VariantType::Int64,
            ColumnDataType::UInt64 => VariantType::UInt64,
            ColumnDataType::Float => VariantType::Float,
            ColumnDataType::Double => VariantType::Double,
            ColumnDataType::Text => VariantType::String,
            ColumnDataType::Binary => VariantType::Binary,
            ColumnDataType::Timestamp => VariantType::DateTime,
        }
    }
}

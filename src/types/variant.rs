//! # Variant Value Container
//!
//! This module provides [`Variant`], the dynamically typed value used for all
//! column reads and writes. A variant holds exactly one active representation
//! at a time: an inline primitive, an owned heap payload (string, binary
//! buffer, date-time), or a polymorphic LOB stream.
//!
//! ## Variants
//!
//! | Variant | Rust payload | Notes |
//! |---------|--------------|-------|
//! | Null | - | SQL NULL |
//! | Bool | bool | |
//! | Int8..UInt64 | i8..u64 | all eight fixed widths |
//! | Float / Double | f32 / f64 | |
//! | DateTime | `Box<RawDateTime>` | heap-allocated, optional time part |
//! | String | String | |
//! | Binary | `Vec<u8>` | |
//! | Clob / Blob | `Box<dyn ClobStream>` / `Box<dyn BlobStream>` | may be uncloneable |
//!
//! ## Copying and Moving
//!
//! `Variant` deliberately does not implement `Clone`: duplicating a value may
//! require cloning a stream, and column-backed or wrapper streams refuse
//! cloning. [`Variant::try_clone`] surfaces that fallibility in the
//! signature. `std::mem::take` (via the `Default` impl) leaves `Null` behind,
//! matching move semantics.
//!
//! ## Comparison Semantics
//!
//! Two families:
//!
//! - **Strict** (`PartialEq`, [`Variant::compare`]): identical tags compare
//!   naturally; mismatched tags order by tag value and are never equal.
//!   CLOB/BLOB values are never equal to anything — including themselves —
//!   and order by (size, then allocation identity), an explicit quirk: LOBs
//!   are not sortable by content.
//! - **Compatible** ([`Variant::compatible_equal`] and friends): SQL-style
//!   heterogeneous comparison with numeric promotion, string ↔ date-time
//!   parsing, and typed errors for meaningless pairs.
//!
//! ## Serialization
//!
//! Self-describing tagged encoding: one type-tag byte, then a type-specific
//! payload (see [`Variant::serialize`]). The encoding is stable wire format.

use std::cmp::Ordering;
use std::fmt;

use eyre::Result;
use smallvec::SmallVec;

use crate::config::MAX_SERIALIZED_LOB_LENGTH;
use crate::encoding::{
    decode_varint, decode_varint_signed, encode_varint, encode_varint_signed, varint_len,
    varint_len_signed, MAX_VARINT_LEN,
};
use crate::error::{
    VariantDeserializationError, VariantSerializationError, VariantTypeCastError,
    WrongVariantTypeError,
};
use crate::lob::{BinaryBlobStream, BlobStream, ClobStream, StringClobStream};
use crate::types::{RawDateTime, VariantType};

/// Dynamically typed value container. See the module docs.
pub enum Variant {
    Null,
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    DateTime(Box<RawDateTime>),
    String(String),
    Binary(Vec<u8>),
    Clob(Box<dyn ClobStream>),
    Blob(Box<dyn BlobStream>),
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Null
    }
}

impl Variant {
    pub fn value_type(&self) -> VariantType {
        match self {
            Variant::Null => VariantType::Null,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int8(_) => VariantType::Int8,
            Variant::UInt8(_) => VariantType::UInt8,
            Variant::Int16(_) => VariantType::Int16,
            Variant::UInt16(_) => VariantType::UInt16,
            Variant::Int32(_) => VariantType::Int32,
            Variant::UInt32(_) => VariantType::UInt32,
            Variant::Int64(_) => VariantType::Int64,
            Variant::UInt64(_) => VariantType::UInt64,
            Variant::Float(_) => VariantType::Float,
            Variant::Double(_) => VariantType::Double,
            Variant::DateTime(_) => VariantType::DateTime,
            Variant::String(_) => VariantType::String,
            Variant::Binary(_) => VariantType::Binary,
            Variant::Clob(_) => VariantType::Clob,
            Variant::Blob(_) => VariantType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn from_clob(stream: Box<dyn ClobStream>) -> Self {
        Variant::Clob(stream)
    }

    pub fn from_blob(stream: Box<dyn BlobStream>) -> Self {
        Variant::Blob(stream)
    }

    /// Duplicates this value. Owned payloads are deep-copied; streams are
    /// cloned through their capability query. Fails for values holding an
    /// uncloneable stream (column-backed and wrapper streams).
    pub fn try_clone(&self) -> Result<Variant> {
        Ok(match self {
            Variant::Null => Variant::Null,
            Variant::Bool(v) => Variant::Bool(*v),
            Variant::Int8(v) => Variant::Int8(*v),
            Variant::UInt8(v) => Variant::UInt8(*v),
            Variant::Int16(v) => Variant::Int16(*v),
            Variant::UInt16(v) => Variant::UInt16(*v),
            Variant::Int32(v) => Variant::Int32(*v),
            Variant::UInt32(v) => Variant::UInt32(*v),
            Variant::Int64(v) => Variant::Int64(*v),
            Variant::UInt64(v) => Variant::UInt64(*v),
            Variant::Float(v) => Variant::Float(*v),
            Variant::Double(v) => Variant::Double(*v),
            Variant::DateTime(v) => Variant::DateTime(v.clone()),
            Variant::String(v) => Variant::String(v.clone()),
            Variant::Binary(v) => Variant::Binary(v.clone()),
            Variant::Clob(s) => Variant::Clob(
                s.try_clone_clob()
                    .ok_or_else(|| eyre::eyre!("CLOB stream is not cloneable"))?,
            ),
            Variant::Blob(s) => Variant::Blob(
                s.try_clone_blob()
                    .ok_or_else(|| eyre::eyre!("BLOB stream is not cloneable"))?,
            ),
        })
    }

    // ------------------------------------------------------------------
    // Strict accessors: the active tag must match.
    // ------------------------------------------------------------------

    pub fn get_bool(&self) -> Result<bool> {
        match self {
            Variant::Bool(v) => Ok(*v),
            _ => Err(self.wrong_type(VariantType::Bool)),
        }
    }

    pub fn get_int64(&self) -> Result<i64> {
        match self {
            Variant::Int64(v) => Ok(*v),
            _ => Err(self.wrong_type(VariantType::Int64)),
        }
    }

    pub fn get_uint64(&self) -> Result<u64> {
        match self {
            Variant::UInt64(v) => Ok(*v),
            _ => Err(self.wrong_type(VariantType::UInt64)),
        }
    }

    pub fn get_string(&self) -> Result<&str> {
        match self {
            Variant::String(v) => Ok(v),
            _ => Err(self.wrong_type(VariantType::String)),
        }
    }

    pub fn get_binary(&self) -> Result<&[u8]> {
        match self {
            Variant::Binary(v) => Ok(v),
            _ => Err(self.wrong_type(VariantType::Binary)),
        }
    }

    pub fn get_date_time(&self) -> Result<&RawDateTime> {
        match self {
            Variant::DateTime(v) => Ok(v),
            _ => Err(self.wrong_type(VariantType::DateTime)),
        }
    }

    pub fn get_clob(&mut self) -> Result<&mut dyn ClobStream> {
        match self {
            Variant::Clob(s) => Ok(s.as_mut()),
            _ => Err(self.wrong_type(VariantType::Clob)),
        }
    }

    pub fn get_blob(&mut self) -> Result<&mut dyn BlobStream> {
        match self {
            Variant::Blob(s) => Ok(s.as_mut()),
            _ => Err(self.wrong_type(VariantType::Blob)),
        }
    }

    fn wrong_type(&self, expected: VariantType) -> eyre::Report {
        eyre::Report::new(WrongVariantTypeError {
            expected,
            actual: self.value_type(),
        })
    }

    // ------------------------------------------------------------------
    // Strict comparison
    // ------------------------------------------------------------------

    /// Total strict ordering. Identical tags compare naturally; mismatched
    /// tags order by tag value; LOBs order by (size, allocation identity).
    pub fn compare(&self, other: &Variant) -> Ordering {
        match (self, other) {
            (Variant::Null, Variant::Null) => Ordering::Equal,
            (Variant::Bool(a), Variant::Bool(b)) => a.cmp(b),
            (Variant::Int8(a), Variant::Int8(b)) => a.cmp(b),
            (Variant::UInt8(a), Variant::UInt8(b)) => a.cmp(b),
            (Variant::Int16(a), Variant::Int16(b)) => a.cmp(b),
            (Variant::UInt16(a), Variant::UInt16(b)) => a.cmp(b),
            (Variant::Int32(a), Variant::Int32(b)) => a.cmp(b),
            (Variant::UInt32(a), Variant::UInt32(b)) => a.cmp(b),
            (Variant::Int64(a), Variant::Int64(b)) => a.cmp(b),
            (Variant::UInt64(a), Variant::UInt64(b)) => a.cmp(b),
            (Variant::Float(a), Variant::Float(b)) => a.total_cmp(b),
            (Variant::Double(a), Variant::Double(b)) => a.total_cmp(b),
            (Variant::DateTime(a), Variant::DateTime(b)) => a.cmp(b),
            (Variant::String(a), Variant::String(b)) => a.cmp(b),
            (Variant::Binary(a), Variant::Binary(b)) => a.cmp(b),
            (Variant::Clob(a), Variant::Clob(b)) => (a.size(), clob_identity(a.as_ref()))
                .cmp(&(b.size(), clob_identity(b.as_ref()))),
            (Variant::Blob(a), Variant::Blob(b)) => (a.size(), blob_identity(a.as_ref()))
                .cmp(&(b.size(), blob_identity(b.as_ref()))),
            (a, b) => (a.value_type() as u8).cmp(&(b.value_type() as u8)),
        }
    }

    // ------------------------------------------------------------------
    // Compatible comparison family
    // ------------------------------------------------------------------

    pub fn compatible_equal(&self, other: &Variant) -> Result<bool> {
        Ok(self.compatible_cmp(other)? == Ordering::Equal)
    }

    pub fn compatible_less(&self, other: &Variant) -> Result<bool> {
        Ok(self.compatible_cmp(other)? == Ordering::Less)
    }

    pub fn compatible_less_or_equal(&self, other: &Variant) -> Result<bool> {
        Ok(self.compatible_cmp(other)? != Ordering::Greater)
    }

    pub fn compatible_greater(&self, other: &Variant) -> Result<bool> {
        Ok(self.compatible_cmp(other)? == Ordering::Greater)
    }

    pub fn compatible_greater_or_equal(&self, other: &Variant) -> Result<bool> {
        Ok(self.compatible_cmp(other)? != Ordering::Less)
    }

    fn compatible_cmp(&self, other: &Variant) -> Result<Ordering> {
        match (self, other) {
            (Variant::Bool(a), Variant::Bool(b)) => Ok(a.cmp(b)),
            (Variant::String(a), Variant::String(b)) => Ok(a.as_str().cmp(b.as_str())),
            (Variant::Binary(a), Variant::Binary(b)) => Ok(a.cmp(b)),
            (Variant::DateTime(a), Variant::DateTime(b)) => Ok(a.cmp(b)),
            (Variant::String(s), Variant::DateTime(dt)) => {
                let parsed = RawDateTime::parse(s).map_err(|e| {
                    self.incompatible_with(other, format!("'{}' is not a date: {}", s, e))
                })?;
                Ok(parsed.cmp(dt))
            }
            (Variant::DateTime(dt), Variant::String(s)) => {
                let parsed = RawDateTime::parse(s).map_err(|e| {
                    self.incompatible_with(other, format!("'{}' is not a date: {}", s, e))
                })?;
                Ok(dt.as_ref().cmp(&parsed))
            }
            (a, b) if a.value_type().is_numeric() && b.value_type().is_numeric() => {
                Ok(numeric_cmp(a, b))
            }
            _ => Err(self.incompatible_with(other, "values are not comparable")),
        }
    }

    fn incompatible_with(&self, other: &Variant, reason: impl Into<String>) -> eyre::Report {
        eyre::Report::new(VariantTypeCastError::with_reason(
            self.value_type(),
            other.value_type(),
            reason,
        ))
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Size of the serialized form, in bytes. Cheap: LOB payloads use the
    /// stream's reported size and oversized LOBs count as zero-length.
    pub fn serialized_size(&self) -> u64 {
        1 + match self {
            Variant::Null => 0,
            Variant::Bool(_) | Variant::Int8(_) | Variant::UInt8(_) => 1,
            Variant::Int16(v) => varint_len_signed(*v as i64) as u64,
            Variant::UInt16(v) => varint_len(*v as u64) as u64,
            Variant::Int32(v) => varint_len_signed(*v as i64) as u64,
            Variant::UInt32(v) => varint_len(*v as u64) as u64,
            Variant::Int64(v) => varint_len_signed(*v) as u64,
            Variant::UInt64(v) => varint_len(*v) as u64,
            Variant::Float(_) => 4,
            Variant::Double(_) => 8,
            Variant::DateTime(dt) => dt.serialized_size() as u64,
            Variant::String(s) => varint_len(s.len() as u64) as u64 + s.len() as u64,
            Variant::Binary(b) => varint_len(b.len() as u64) as u64 + b.len() as u64,
            Variant::Clob(s) => lob_payload_size(s.size()),
            Variant::Blob(s) => lob_payload_size(s.size()),
        }
    }

    /// Appends the self-describing serialized form to `buf`.
    ///
    /// Takes `&mut self` because serializing a LOB reads its stream (the
    /// stream is rewound before and after, so the value is unchanged when
    /// this returns successfully).
    pub fn serialize(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(self.value_type() as u8);
        let mut scratch: SmallVec<[u8; MAX_VARINT_LEN]> = SmallVec::new();
        scratch.resize(MAX_VARINT_LEN, 0);

        match self {
            Variant::Null => {}
            Variant::Bool(v) => buf.push(*v as u8),
            Variant::Int8(v) => buf.push(*v as u8),
            Variant::UInt8(v) => buf.push(*v),
            Variant::Int16(v) => {
                let n = encode_varint_signed(*v as i64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::UInt16(v) => {
                let n = encode_varint(*v as u64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::Int32(v) => {
                let n = encode_varint_signed(*v as i64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::UInt32(v) => {
                let n = encode_varint(*v as u64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::Int64(v) => {
                let n = encode_varint_signed(*v, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::UInt64(v) => {
                let n = encode_varint(*v, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
            }
            Variant::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Variant::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Variant::DateTime(dt) => {
                dt.serialize_into(buf);
            }
            Variant::String(s) => {
                let n = encode_varint(s.len() as u64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
                buf.extend_from_slice(s.as_bytes());
            }
            Variant::Binary(b) => {
                let n = encode_varint(b.len() as u64, &mut scratch);
                buf.extend_from_slice(&scratch[..n]);
                buf.extend_from_slice(b);
            }
            Variant::Clob(s) => serialize_lob(s.as_lob_stream(), buf, &mut scratch)?,
            Variant::Blob(s) => serialize_lob(s.as_lob_stream(), buf, &mut scratch)?,
        }
        Ok(())
    }

    /// Decodes a serialized variant, returning the value and the number of
    /// bytes consumed. CLOB/BLOB payloads reconstruct as memory-backed
    /// streams, not their original backing.
    pub fn deserialize(data: &[u8]) -> Result<(Variant, usize)> {
        if data.is_empty() {
            return Err(not_enough(1));
        }
        let tag = data[0];
        let vt = VariantType::from_tag(tag)
            .ok_or_else(|| eyre::Report::new(VariantDeserializationError::UnknownTag { tag }))?;
        let rest = &data[1..];

        let (value, payload_len) = match vt {
            VariantType::Null => (Variant::Null, 0),
            VariantType::Bool => {
                let byte = *rest.first().ok_or_else(|| not_enough(1))?;
                match byte {
                    0 => (Variant::Bool(false), 1),
                    1 => (Variant::Bool(true), 1),
                    _ => return Err(corrupt(format!("invalid boolean byte {}", byte))),
                }
            }
            VariantType::Int8 => {
                let byte = *rest.first().ok_or_else(|| not_enough(1))?;
                (Variant::Int8(byte as i8), 1)
            }
            VariantType::UInt8 => {
                let byte = *rest.first().ok_or_else(|| not_enough(1))?;
                (Variant::UInt8(byte), 1)
            }
            VariantType::Int16 => {
                let (v, n) = decode_signed_in_range(rest, i16::MIN as i64, i16::MAX as i64)?;
                (Variant::Int16(v as i16), n)
            }
            VariantType::UInt16 => {
                let (v, n) = decode_unsigned_in_range(rest, u16::MAX as u64)?;
                (Variant::UInt16(v as u16), n)
            }
            VariantType::Int32 => {
                let (v, n) = decode_signed_in_range(rest, i32::MIN as i64, i32::MAX as i64)?;
                (Variant::Int32(v as i32), n)
            }
            VariantType::UInt32 => {
                let (v, n) = decode_unsigned_in_range(rest, u32::MAX as u64)?;
                (Variant::UInt32(v as u32), n)
            }
            VariantType::Int64 => {
                let (v, n) = decode_signed_in_range(rest, i64::MIN, i64::MAX)?;
                (Variant::Int64(v), n)
            }
            VariantType::UInt64 => {
                let (v, n) = decode_unsigned_in_range(rest, u64::MAX)?;
                (Variant::UInt64(v), n)
            }
            VariantType::Float => {
                if rest.len() < 4 {
                    return Err(not_enough(4 - rest.len()));
                }
                let bits = u32::from_be_bytes(rest[..4].try_into().unwrap());
                (Variant::Float(f32::from_bits(bits)), 4)
            }
            VariantType::Double => {
                if rest.len() < 8 {
                    return Err(not_enough(8 - rest.len()));
                }
                let bits = u64::from_be_bytes(rest[..8].try_into().unwrap());
                (Variant::Double(f64::from_bits(bits)), 8)
            }
            VariantType::DateTime => {
                let (dt, n) = RawDateTime::deserialize(rest)
                    .map_err(|e| corrupt(format!("invalid date-time: {}", e)))?;
                (Variant::DateTime(Box::new(dt)), n)
            }
            VariantType::String => {
                let (bytes, n) = decode_length_prefixed(rest)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| corrupt(format!("string is not valid UTF-8: {}", e)))?;
                (Variant::String(s.to_owned()), n)
            }
            VariantType::Binary => {
                let (bytes, n) = decode_length_prefixed(rest)?;
                (Variant::Binary(bytes.to_vec()), n)
            }
            VariantType::Clob => {
                let (bytes, n) = decode_length_prefixed(rest)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| corrupt(format!("CLOB is not valid UTF-8: {}", e)))?;
                (
                    Variant::Clob(Box::new(StringClobStream::new(s.to_owned()))),
                    n,
                )
            }
            VariantType::Blob => {
                let (bytes, n) = decode_length_prefixed(rest)?;
                (
                    Variant::Blob(Box::new(BinaryBlobStream::new(bytes.to_vec()))),
                    n,
                )
            }
        };

        Ok((value, 1 + payload_len))
    }
}

fn lob_payload_size(size: u64) -> u64 {
    if size > MAX_SERIALIZED_LOB_LENGTH as u64 {
        varint_len(0) as u64
    } else {
        varint_len(size) as u64 + size
    }
}

fn serialize_lob(
    stream: &mut dyn crate::lob::LobStream,
    buf: &mut Vec<u8>,
    scratch: &mut SmallVec<[u8; MAX_VARINT_LEN]>,
) -> Result<()> {
    let size = stream.size();
    if size > MAX_SERIALIZED_LOB_LENGTH as u64 {
        // Keep the output well-formed before reporting the failure.
        let n = encode_varint(0, scratch);
        buf.extend_from_slice(&scratch[..n]);
        return Err(eyre::Report::new(VariantSerializationError::LobTooLong {
            size,
            max: MAX_SERIALIZED_LOB_LENGTH as u64,
        }));
    }

    if !stream.rewind()? {
        return Err(eyre::Report::new(
            VariantSerializationError::RewindNotSupported,
        ));
    }

    let n = encode_varint(size, scratch);
    buf.extend_from_slice(&scratch[..n]);

    let start = buf.len();
    buf.resize(start + size as usize, 0);
    let mut filled = 0usize;
    while filled < size as usize {
        let n = stream.read(&mut buf[start + filled..])?;
        if n == 0 {
            return Err(eyre::Report::new(VariantSerializationError::LobTruncated {
                expected: size,
                actual: filled as u64,
            }));
        }
        filled += n;
    }

    if !stream.rewind()? {
        return Err(eyre::Report::new(
            VariantSerializationError::RewindNotSupported,
        ));
    }
    Ok(())
}

fn not_enough(needed: usize) -> eyre::Report {
    eyre::Report::new(VariantDeserializationError::NotEnoughData { needed })
}

fn corrupt(reason: String) -> eyre::Report {
    eyre::Report::new(VariantDeserializationError::CorruptData { reason })
}

fn decode_unsigned_in_range(data: &[u8], max: u64) -> Result<(u64, usize)> {
    if data.is_empty() {
        return Err(not_enough(1));
    }
    let (v, n) = decode_varint(data).map_err(|e| corrupt(format!("invalid varint: {}", e)))?;
    if v > max {
        return Err(corrupt(format!("integer {} out of range (max {})", v, max)));
    }
    Ok((v, n))
}

fn decode_signed_in_range(data: &[u8], min: i64, max: i64) -> Result<(i64, usize)> {
    if data.is_empty() {
        return Err(not_enough(1));
    }
    let (v, n) =
        decode_varint_signed(data).map_err(|e| corrupt(format!("invalid varint: {}", e)))?;
    if v < min || v > max {
        return Err(corrupt(format!(
            "integer {} out of range ({}..={})",
            v, min, max
        )));
    }
    Ok((v, n))
}

fn decode_length_prefixed(data: &[u8]) -> Result<(&[u8], usize)> {
    let (len, n) = decode_unsigned_in_range(data, MAX_SERIALIZED_LOB_LENGTH as u64)?;
    let len = len as usize;
    if data.len() < n + len {
        return Err(not_enough(n + len - data.len()));
    }
    Ok((&data[n..n + len], n + len))
}

fn clob_identity(stream: &dyn ClobStream) -> usize {
    stream as *const dyn ClobStream as *const () as usize
}

fn blob_identity(stream: &dyn BlobStream) -> usize {
    stream as *const dyn BlobStream as *const () as usize
}

fn numeric_cmp(a: &Variant, b: &Variant) -> Ordering {
    use Variant::*;

    // Integer/integer pairs compare exactly through i128; anything involving
    // a float compares as f64.
    let int_of = |v: &Variant| -> Option<i128> {
        Some(match v {
            Int8(x) => *x as i128,
            UInt8(x) => *x as i128,
            Int16(x) => *x as i128,
            UInt16(x) => *x as i128,
            Int32(x) => *x as i128,
            UInt32(x) => *x as i128,
            Int64(x) => *x as i128,
            UInt64(x) => *x as i128,
            _ => return None,
        })
    };

    match (int_of(a), int_of(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let fx = float_of(a);
            let fy = float_of(b);
            fx.total_cmp(&fy)
        }
    }
}

pub(crate) fn float_of(v: &Variant) -> f64 {
    use Variant::*;
    match v {
        Int8(x) => *x as f64,
        UInt8(x) => *x as f64,
        Int16(x) => *x as f64,
        UInt16(x) => *x as f64,
        Int32(x) => *x as f64,
        UInt32(x) => *x as f64,
        Int64(x) => *x as f64,
        UInt64(x) => *x as f64,
        Float(x) => *x as f64,
        Double(x) => *x,
        _ => f64::NAN,
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // LOBs are never equal, including to themselves.
            (Variant::Clob(_), _) | (_, Variant::Clob(_)) => false,
            (Variant::Blob(_), _) | (_, Variant::Blob(_)) => false,
            _ => {
                self.value_type() == other.value_type() && self.compare(other) == Ordering::Equal
            }
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "Null"),
            Variant::Bool(v) => write!(f, "Bool({})", v),
            Variant::Int8(v) => write!(f, "Int8({})", v),
            Variant::UInt8(v) => write!(f, "UInt8({})", v),
            Variant::Int16(v) => write!(f, "Int16({})", v),
            Variant::UInt16(v) => write!(f, "UInt16({})", v),
            Variant::Int32(v) => write!(f, "Int32({})", v),
            Variant::UInt32(v) => write!(f, "UInt32({})", v),
            Variant::Int64(v) => write!(f, "Int64({})", v),
            Variant::UInt64(v) => write!(f, "UInt64({})", v),
            Variant::Float(v) => write!(f, "Float({})", v),
            Variant::Double(v) => write!(f, "Double({})", v),
            Variant::DateTime(v) => write!(f, "DateTime({})", v),
            Variant::String(v) => write!(f, "String({:?})", v),
            Variant::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
            Variant::Clob(s) => write!(f, "Clob({} bytes)", s.size()),
            Variant::Blob(s) => write!(f, "Blob({} bytes)", s.size()),
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$variant(v)
                }
            }
        )*
    };
}

variant_from! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    Vec<u8> => Binary,
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_owned())
    }
}

impl From<&[u8]> for Variant {
    fn from(v: &[u8]) -> Self {
        Variant::Binary(v.to_vec())
    }
}

impl From<RawDateTime> for Variant {
    fn from(v: RawDateTime) -> Self {
        Variant::DateTime(Box::new(v))
    }
}

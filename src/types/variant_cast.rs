//! # Variant Value Casts
//!
//! The `as_xxx` family converts a variant's value to another representation,
//! returning a fresh variant and leaving the source unchanged (casts take
//! `&mut self` only because reading a LOB stream moves its cursor; the
//! stream is rewound afterwards).
//!
//! Conversion rules:
//!
//! - numeric → numeric: static cast (wrapping/truncating, float → int
//!   saturates at the target bounds)
//! - string → numeric: strict whole-string parse; trailing garbage and
//!   out-of-range values are cast errors
//! - binary → numeric: little-endian decode of the target's width; fails if
//!   the buffer is shorter than the width
//! - numeric → string/binary: decimal text / little-endian bytes
//! - binary → string: lowercase hex
//! - CLOB/BLOB sources: materialized first, capped at
//!   [`MAX_LOB_CAST_LENGTH`]; then treated as string/binary
//!
//! Everything else (date-time → numeric, NULL → anything) is a
//! [`VariantTypeCastError`].

use eyre::Result;

use crate::config::MAX_LOB_CAST_LENGTH;
use crate::error::VariantTypeCastError;
use crate::lob::{BlobStream, ClobStream};
use crate::types::{RawDateTime, Variant, VariantType};

macro_rules! le_decode {
    ($t:ty, $bytes:expr, $source:expr, $dest:expr) => {{
        const WIDTH: usize = std::mem::size_of::<$t>();
        let bytes: &[u8] = $bytes;
        if bytes.len() < WIDTH {
            return Err(cast_error(
                $source,
                $dest,
                format!(
                    "binary buffer of {} bytes is shorter than the target width {}",
                    bytes.len(),
                    WIDTH
                ),
            ));
        }
        <$t>::from_le_bytes(bytes[..WIDTH].try_into().unwrap())
    }};
}

macro_rules! numeric_cast {
    ($(#[$meta:meta])* $name:ident, $t:ty, $variant:ident, $vt:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self) -> Result<Variant> {
            const DEST: VariantType = VariantType::$vt;
            Ok(Variant::$variant(match self {
                Variant::Bool(v) => *v as u8 as $t,
                Variant::Int8(v) => *v as $t,
                Variant::UInt8(v) => *v as $t,
                Variant::Int16(v) => *v as $t,
                Variant::UInt16(v) => *v as $t,
                Variant::Int32(v) => *v as $t,
                Variant::UInt32(v) => *v as $t,
                Variant::Int64(v) => *v as $t,
                Variant::UInt64(v) => *v as $t,
                Variant::Float(v) => *v as $t,
                Variant::Double(v) => *v as $t,
                Variant::String(s) => parse_number::<$t>(s, VariantType::String, DEST)?,
                Variant::Binary(b) => le_decode!($t, b, VariantType::Binary, DEST),
                Variant::Clob(s) => {
                    let text = materialize_clob(s.as_mut(), DEST)?;
                    parse_number::<$t>(&text, VariantType::Clob, DEST)?
                }
                Variant::Blob(s) => {
                    let bytes = materialize_blob(s.as_mut(), DEST)?;
                    le_decode!($t, &bytes, VariantType::Blob, DEST)
                }
                other => return Err(unsupported_cast(other.value_type(), DEST)),
            }))
        }
    };
}

impl Variant {
    numeric_cast!(as_int8, i8, Int8, Int8);
    numeric_cast!(as_uint8, u8, UInt8, UInt8);
    numeric_cast!(as_int16, i16, Int16, Int16);
    numeric_cast!(as_uint16, u16, UInt16, UInt16);
    numeric_cast!(as_int32, i32, Int32, Int32);
    numeric_cast!(as_uint32, u32, UInt32, UInt32);
    numeric_cast!(as_int64, i64, Int64, Int64);
    numeric_cast!(as_uint64, u64, UInt64, UInt64);
    numeric_cast!(as_float, f32, Float, Float);
    numeric_cast!(as_double, f64, Double, Double);

    /// Converts to Bool. Numbers compare against zero; strings accept
    /// `true`/`false` (case-insensitive) and `1`/`0`.
    pub fn as_bool(&mut self) -> Result<Variant> {
        const DEST: VariantType = VariantType::Bool;
        Ok(Variant::Bool(match self {
            Variant::Bool(v) => *v,
            Variant::Int8(v) => *v != 0,
            Variant::UInt8(v) => *v != 0,
            Variant::Int16(v) => *v != 0,
            Variant::UInt16(v) => *v != 0,
            Variant::Int32(v) => *v != 0,
            Variant::UInt32(v) => *v != 0,
            Variant::Int64(v) => *v != 0,
            Variant::UInt64(v) => *v != 0,
            Variant::Float(v) => *v != 0.0,
            Variant::Double(v) => *v != 0.0,
            Variant::String(s) => parse_bool(s, VariantType::String)?,
            Variant::Clob(s) => {
                let text = materialize_clob(s.as_mut(), DEST)?;
                parse_bool(&text, VariantType::Clob)?
            }
            other => return Err(unsupported_cast(other.value_type(), DEST)),
        }))
    }

    /// Converts to String. Binary payloads render as lowercase hex.
    pub fn as_string(&mut self) -> Result<Variant> {
        const DEST: VariantType = VariantType::String;
        Ok(Variant::String(match self {
            Variant::Bool(v) => if *v { "true" } else { "false" }.to_owned(),
            Variant::Int8(v) => v.to_string(),
            Variant::UInt8(v) => v.to_string(),
            Variant::Int16(v) => v.to_string(),
            Variant::UInt16(v) => v.to_string(),
            Variant::Int32(v) => v.to_string(),
            Variant::UInt32(v) => v.to_string(),
            Variant::Int64(v) => v.to_string(),
            Variant::UInt64(v) => v.to_string(),
            Variant::Float(v) => v.to_string(),
            Variant::Double(v) => v.to_string(),
            Variant::DateTime(dt) => dt.to_string(),
            Variant::String(s) => s.clone(),
            Variant::Binary(b) => hex_encode(b),
            Variant::Clob(s) => materialize_clob(s.as_mut(), DEST)?,
            Variant::Blob(s) => hex_encode(&materialize_blob(s.as_mut(), DEST)?),
            other => return Err(unsupported_cast(other.value_type(), DEST)),
        }))
    }

    /// Converts to Binary. Numbers encode as little-endian fixed-width
    /// bytes; strings and CLOBs contribute their raw UTF-8 bytes.
    pub fn as_binary(&mut self) -> Result<Variant> {
        const DEST: VariantType = VariantType::Binary;
        Ok(Variant::Binary(match self {
            Variant::Bool(v) => vec![*v as u8],
            Variant::Int8(v) => v.to_le_bytes().to_vec(),
            Variant::UInt8(v) => v.to_le_bytes().to_vec(),
            Variant::Int16(v) => v.to_le_bytes().to_vec(),
            Variant::UInt16(v) => v.to_le_bytes().to_vec(),
            Variant::Int32(v) => v.to_le_bytes().to_vec(),
            Variant::UInt32(v) => v.to_le_bytes().to_vec(),
            Variant::Int64(v) => v.to_le_bytes().to_vec(),
            Variant::UInt64(v) => v.to_le_bytes().to_vec(),
            Variant::Float(v) => v.to_le_bytes().to_vec(),
            Variant::Double(v) => v.to_le_bytes().to_vec(),
            Variant::DateTime(dt) => {
                let mut buf = Vec::with_capacity(dt.serialized_size());
                dt.serialize_into(&mut buf);
                buf
            }
            Variant::String(s) => s.as_bytes().to_vec(),
            Variant::Binary(b) => b.clone(),
            Variant::Clob(s) => materialize_clob(s.as_mut(), DEST)?.into_bytes(),
            Variant::Blob(s) => materialize_blob(s.as_mut(), DEST)?,
            other => return Err(unsupported_cast(other.value_type(), DEST)),
        }))
    }

    /// Converts to DateTime from a date-time value or a parseable string.
    pub fn as_date_time(&mut self) -> Result<Variant> {
        const DEST: VariantType = VariantType::DateTime;
        Ok(Variant::DateTime(Box::new(match self {
            Variant::DateTime(dt) => *dt.as_ref(),
            Variant::String(s) => parse_date_time(s, VariantType::String)?,
            Variant::Clob(s) => {
                let text = materialize_clob(s.as_mut(), DEST)?;
                parse_date_time(&text, VariantType::Clob)?
            }
            other => return Err(unsupported_cast(other.value_type(), DEST)),
        })))
    }
}

fn cast_error(source: VariantType, dest: VariantType, reason: String) -> eyre::Report {
    eyre::Report::new(VariantTypeCastError::with_reason(source, dest, reason))
}

fn unsupported_cast(source: VariantType, dest: VariantType) -> eyre::Report {
    eyre::Report::new(VariantTypeCastError::new(source, dest))
}

fn parse_number<T: std::str::FromStr>(
    text: &str,
    source: VariantType,
    dest: VariantType,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    text.parse::<T>()
        .map_err(|e| cast_error(source, dest, format!("cannot parse '{}': {}", text, e)))
}

fn parse_bool(text: &str, source: VariantType) -> Result<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Ok(false)
    } else {
        Err(cast_error(
            source,
            VariantType::Bool,
            format!("'{}' is not a boolean", text),
        ))
    }
}

fn parse_date_time(text: &str, source: VariantType) -> Result<RawDateTime> {
    RawDateTime::parse(text)
        .map_err(|e| cast_error(source, VariantType::DateTime, e.to_string()))
}

fn hex_encode(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    out
}

fn check_lob_size(size: u64, source: VariantType, dest: VariantType) -> Result<()> {
    if size > MAX_LOB_CAST_LENGTH as u64 {
        return Err(cast_error(
            source,
            dest,
            format!(
                "LOB of {} bytes exceeds the castable maximum of {} bytes",
                size, MAX_LOB_CAST_LENGTH
            ),
        ));
    }
    Ok(())
}

fn materialize_clob(stream: &mut dyn ClobStream, dest: VariantType) -> Result<String> {
    check_lob_size(stream.size(), VariantType::Clob, dest)?;
    if !stream.rewind()? {
        return Err(cast_error(
            VariantType::Clob,
            dest,
            "stream does not support rewind".to_owned(),
        ));
    }
    let text = stream.read_as_string(MAX_LOB_CAST_LENGTH)?;
    stream.rewind()?;
    Ok(text)
}

fn materialize_blob(stream: &mut dyn BlobStream, dest: VariantType) -> Result<Vec<u8>> {
    check_lob_size(stream.size(), VariantType::Blob, dest)?;
    if !stream.rewind()? {
        return Err(cast_error(
            VariantType::Blob,
            dest,
            "stream does not support rewind".to_owned(),
        ));
    }
    let bytes = stream.read_as_binary(MAX_LOB_CAST_LENGTH)?;
    stream.rewind()?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lob::{BinaryBlobStream, StringClobStream};
    use crate::types::RawTime;

    #[test]
    fn numeric_to_numeric_is_a_static_cast() {
        assert_eq!(Variant::from(300i32).as_uint8().unwrap(), Variant::UInt8(44));
        assert_eq!(Variant::from(-1i32).as_uint64().unwrap(), Variant::UInt64(u64::MAX));
        assert_eq!(Variant::from(2.9f64).as_int32().unwrap(), Variant::Int32(2));
        assert_eq!(Variant::from(7u8).as_double().unwrap(), Variant::Double(7.0));
    }

    #[test]
    fn string_to_int_is_strict() {
        assert_eq!(
            Variant::from("255").as_uint8().unwrap(),
            Variant::UInt8(255)
        );
        assert!(Variant::from("256").as_uint8().is_err());
        assert!(Variant::from("-1").as_uint8().is_err());
        assert!(Variant::from("12x").as_int32().is_err());
        assert!(Variant::from(" 12").as_int32().is_err());
        assert!(Variant::from("").as_int64().is_err());
    }

    #[test]
    fn string_to_float_parses() {
        assert_eq!(
            Variant::from("2.5").as_double().unwrap(),
            Variant::Double(2.5)
        );
        assert!(Variant::from("2.5.0").as_float().is_err());
    }

    #[test]
    fn binary_to_int_decodes_little_endian() {
        assert_eq!(
            Variant::from(vec![0x39, 0x30]).as_uint16().unwrap(),
            Variant::UInt16(12345)
        );
        // longer buffers take the leading width bytes
        assert_eq!(
            Variant::from(vec![0x01, 0x00, 0xFF, 0xFF]).as_uint16().unwrap(),
            Variant::UInt16(1)
        );
    }

    #[test]
    fn binary_shorter_than_width_fails() {
        let err = Variant::from(vec![0x01]).as_uint32().unwrap_err();
        assert!(err.downcast_ref::<VariantTypeCastError>().is_some());
    }

    #[test]
    fn bool_conversions() {
        assert_eq!(Variant::from(0i32).as_bool().unwrap(), Variant::Bool(false));
        assert_eq!(Variant::from(-3i64).as_bool().unwrap(), Variant::Bool(true));
        assert_eq!(Variant::from("TRUE").as_bool().unwrap(), Variant::Bool(true));
        assert_eq!(Variant::from("0").as_bool().unwrap(), Variant::Bool(false));
        assert!(Variant::from("yes").as_bool().is_err());
        assert_eq!(Variant::from(true).as_int32().unwrap(), Variant::Int32(1));
    }

    #[test]
    fn to_string_conversions() {
        assert_eq!(
            Variant::from(-42i64).as_string().unwrap(),
            Variant::String("-42".into())
        );
        assert_eq!(
            Variant::from(vec![0xDE, 0xAD]).as_string().unwrap(),
            Variant::String("dead".into())
        );
        let dt = RawDateTime::new_date(2024, 6, 1).unwrap();
        assert_eq!(
            Variant::from(dt).as_string().unwrap(),
            Variant::String("2024-06-01".into())
        );
    }

    #[test]
    fn to_binary_conversions() {
        assert_eq!(
            Variant::from(0x0102_0304u32).as_binary().unwrap(),
            Variant::Binary(vec![4, 3, 2, 1])
        );
        assert_eq!(
            Variant::from("ab").as_binary().unwrap(),
            Variant::Binary(vec![b'a', b'b'])
        );
    }

    #[test]
    fn string_to_date_time() {
        let dt = Variant::from("2024-06-01 12:00:00").as_date_time().unwrap();
        let expected =
            RawDateTime::new_date_time(2024, 6, 1, RawTime::new(12, 0, 0, 0).unwrap()).unwrap();
        assert_eq!(dt, Variant::from(expected));

        assert!(Variant::from("not a date").as_date_time().is_err());
        assert!(Variant::from(1i32).as_date_time().is_err());
    }

    #[test]
    fn clob_materializes_then_parses() {
        let mut v = Variant::from_clob(Box::new(StringClobStream::new("1234")));
        assert_eq!(v.as_int32().unwrap(), Variant::Int32(1234));
        // the source stream is rewound, so the cast can run again
        assert_eq!(v.as_int32().unwrap(), Variant::Int32(1234));
    }

    #[test]
    fn blob_materializes_then_decodes() {
        let mut v = Variant::from_blob(Box::new(BinaryBlobStream::new(vec![0x2A, 0, 0, 0])));
        assert_eq!(v.as_int32().unwrap(), Variant::Int32(42));
        assert_eq!(
            v.as_string().unwrap(),
            Variant::String("2a000000".into())
        );
    }

    #[test]
    fn oversized_lob_cast_fails() {
        let big = vec![b'1'; MAX_LOB_CAST_LENGTH + 1];
        let mut v = Variant::from_blob(Box::new(BinaryBlobStream::new(big)));
        assert!(v.as_string().is_err());
    }

    #[test]
    fn null_and_date_time_numeric_casts_fail() {
        assert!(Variant::Null.as_int32().is_err());
        let dt = RawDateTime::new_date(2024, 1, 1).unwrap();
        assert!(Variant::from(dt).as_int64().is_err());
        assert!(Variant::Null.as_bool().is_err());
    }
}

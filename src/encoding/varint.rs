//! # Variable-Length Integer Encoding
//!
//! This module provides LEB128 variable-length integer encoding, used for the
//! integer payloads of serialized `Variant` values and for the compact form
//! of `ColumnDataAddress`. This is NOT used for type tags (which are a single
//! fixed byte) nor for the fixed little-endian scalar layouts inside block
//! data areas.
//!
//! ## Encoding Format
//!
//! Standard unsigned LEB128: each byte carries 7 value bits, the high bit is
//! the continuation flag.
//!
//! | Value Range            | Bytes |
//! |------------------------|-------|
//! | 0 - 127                | 1     |
//! | 128 - 16383            | 2     |
//! | 16384 - 2097151        | 3     |
//! | ...                    | ...   |
//! | up to u64::MAX         | 10    |
//!
//! Signed values use zigzag mapping (`(v << 1) ^ (v >> 63)`) before LEB128,
//! so small negative numbers stay short.
//!
//! ## Boundary Values
//!
//! Key boundary values for testing: 127/128 (1→2 bytes), 16383/16384
//! (2→3 bytes), and `u64::MAX` (10 bytes).
//!
//! ## Zero-Copy Design
//!
//! All functions operate on byte slices directly and perform no heap
//! allocation:
//! - `encode_varint` writes to a mutable slice, returns bytes written
//! - `decode_varint` reads from a slice, returns (value, bytes read)
//! - `varint_len` computes the encoded length without any I/O
//!
//! ## Error Handling
//!
//! `decode_varint` returns `eyre::Result` with descriptive messages:
//! - Empty buffer: "empty buffer for varint decode"
//! - Truncated encoding: "truncated varint"
//! - Overlong encoding: "varint overflows u64"

use eyre::{bail, ensure, Result};

/// Maximum encoded length of a u64 varint.
pub const MAX_VARINT_LEN: usize = 10;

pub fn varint_len(value: u64) -> usize {
    let mut v = value;
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

pub fn varint_len_signed(value: i64) -> usize {
    varint_len(zigzag_encode(value))
}

pub fn encode_varint(value: u64, buf: &mut [u8]) -> usize {
    let mut v = value;
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = (v as u8 & 0x7F) | 0x80;
        v >>= 7;
        i += 1;
    }
    buf[i] = v as u8;
    i + 1
}

pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize)> {
    ensure!(!buf.is_empty(), "empty buffer for varint decode");

    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        ensure!(i < MAX_VARINT_LEN, "varint overflows u64");
        if shift == 63 {
            ensure!(byte & 0x7E == 0, "varint overflows u64");
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    bail!("truncated varint")
}

pub fn encode_varint_signed(value: i64, buf: &mut [u8]) -> usize {
    encode_varint(zigzag_encode(value), buf)
}

pub fn decode_varint_signed(buf: &[u8]) -> Result<(i64, usize)> {
    let (raw, len) = decode_varint(buf)?;
    Ok((zigzag_decode(raw), len))
}

#[inline]
fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
fn zigzag_decode(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_len_boundaries() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16383), 2);
        assert_eq!(varint_len(16384), 3);
        assert_eq!(varint_len(u64::MAX), 10);
    }

    #[test]
    fn encode_varint_single_byte() {
        let mut buf = [0u8; MAX_VARINT_LEN];

        assert_eq!(encode_varint(0, &mut buf), 1);
        assert_eq!(buf[0], 0);

        assert_eq!(encode_varint(127, &mut buf), 1);
        assert_eq!(buf[0], 127);
    }

    #[test]
    fn encode_varint_multi_byte() {
        let mut buf = [0u8; MAX_VARINT_LEN];

        assert_eq!(encode_varint(128, &mut buf), 2);
        assert_eq!(&buf[..2], &[0x80, 0x01]);

        assert_eq!(encode_varint(300, &mut buf), 2);
        assert_eq!(&buf[..2], &[0xAC, 0x02]);
    }

    #[test]
    fn decode_varint_empty_buffer_fails() {
        assert!(decode_varint(&[]).is_err());
    }

    #[test]
    fn decode_varint_truncated_fails() {
        assert!(decode_varint(&[0x80]).is_err());
        assert!(decode_varint(&[0xFF, 0xFF]).is_err());
    }

    #[test]
    fn decode_varint_overlong_fails() {
        let buf = [0xFFu8; 11];
        assert!(decode_varint(&buf).is_err());

        // 10 bytes but with bits above position 63 set
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(decode_varint(&buf).is_err());
    }

    #[test]
    fn roundtrip_boundary_values() {
        let boundary_values = [
            0u64,
            1,
            127,
            128,
            16383,
            16384,
            2097151,
            2097152,
            u32::MAX as u64,
            u32::MAX as u64 + 1,
            u64::MAX,
        ];

        for &value in &boundary_values {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let encoded_len = encode_varint(value, &mut buf);
            let (decoded, decoded_len) = decode_varint(&buf).unwrap();

            assert_eq!(encoded_len, decoded_len, "length mismatch for {}", value);
            assert_eq!(value, decoded, "value mismatch for {}", value);
            assert_eq!(varint_len(value), encoded_len, "varint_len mismatch for {}", value);
        }
    }

    #[test]
    fn roundtrip_signed_values() {
        let values = [0i64, 1, -1, 63, -64, 64, -65, i64::MAX, i64::MIN];

        for &value in &values {
            let mut buf = [0u8; MAX_VARINT_LEN];
            let encoded_len = encode_varint_signed(value, &mut buf);
            let (decoded, decoded_len) = decode_varint_signed(&buf).unwrap();

            assert_eq!(encoded_len, decoded_len, "length mismatch for {}", value);
            assert_eq!(value, decoded, "value mismatch for {}", value);
            assert_eq!(varint_len_signed(value), encoded_len);
        }
    }

    #[test]
    fn zigzag_small_negatives_stay_short() {
        assert_eq!(varint_len_signed(-1), 1);
        assert_eq!(varint_len_signed(-64), 1);
        assert_eq!(varint_len_signed(-65), 2);
    }
}

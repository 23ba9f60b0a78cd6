//! # Column Data Addresses
//!
//! A [`ColumnDataAddress`] locates a value inside a column's block chain:
//! the block id plus the byte offset into that block's data area. Two
//! sentinel addresses use the reserved block id 0 (real blocks are numbered
//! from 1):
//!
//! | Address | Meaning |
//! |---------|---------|
//! | `(0, 0)` | NULL value |
//! | `(0, 1)` | declared default value |
//!
//! Two encodings exist:
//!
//! - **compact**: LEB128 varints (block id, then offset) — used inside
//!   master column records where addresses dominate the payload
//! - **plain**: fixed 12 bytes, big-endian (8-byte block id + 4-byte
//!   offset) — used as master index values, where fixed width keeps the
//!   op-log records seekable
//!
//! [`ColumnDataRecord`] pairs an address with the row's create/update
//! timestamps; it is the per-column payload of a master column record.

use eyre::{ensure, Result};

use crate::encoding::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};

/// Location of a value in a column's block chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnDataAddress {
    block_id: u64,
    offset: u32,
}

/// Size of the plain fixed-width encoding.
pub const PLAIN_ADDRESS_SIZE: usize = 12;

/// Size of the plain fixed-width encoding of a [`ColumnDataRecord`].
pub const PLAIN_RECORD_SIZE: usize = PLAIN_ADDRESS_SIZE + 16;

impl ColumnDataAddress {
    /// The NULL sentinel, `(0, 0)`.
    pub const NULL: ColumnDataAddress = ColumnDataAddress {
        block_id: 0,
        offset: 0,
    };

    /// The default-value sentinel, `(0, 1)`.
    pub const DEFAULT_VALUE: ColumnDataAddress = ColumnDataAddress {
        block_id: 0,
        offset: 1,
    };

    pub fn new(block_id: u64, offset: u32) -> Self {
        Self { block_id, offset }
    }

    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn is_default_value(&self) -> bool {
        *self == Self::DEFAULT_VALUE
    }

    /// True for any address with the reserved block id 0.
    pub fn is_sentinel(&self) -> bool {
        self.block_id == 0
    }

    pub fn serialized_size(&self) -> usize {
        varint_len(self.block_id) + varint_len(self.offset as u64)
    }

    /// Appends the compact varint encoding to `buf`.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        let mut scratch = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(self.block_id, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);
        let n = encode_varint(self.offset as u64, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);
    }

    /// Decodes the compact encoding, returning the address and the number of
    /// bytes consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        let (block_id, n1) = decode_varint(data)?;
        let (offset, n2) = decode_varint(&data[n1..])?;
        ensure!(
            offset <= u32::MAX as u64,
            "address offset {} overflows u32",
            offset
        );
        Ok((Self::new(block_id, offset as u32), n1 + n2))
    }

    /// The plain fixed-width big-endian encoding.
    pub fn encode_plain(&self) -> [u8; PLAIN_ADDRESS_SIZE] {
        let mut out = [0u8; PLAIN_ADDRESS_SIZE];
        out[..8].copy_from_slice(&self.block_id.to_be_bytes());
        out[8..].copy_from_slice(&self.offset.to_be_bytes());
        out
    }

    pub fn decode_plain(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= PLAIN_ADDRESS_SIZE,
            "plain address needs {} bytes, got {}",
            PLAIN_ADDRESS_SIZE,
            data.len()
        );
        Ok(Self::new(
            u64::from_be_bytes(data[..8].try_into().unwrap()),
            u32::from_be_bytes(data[8..12].try_into().unwrap()),
        ))
    }
}

impl Default for ColumnDataAddress {
    fn default() -> Self {
        Self::NULL
    }
}

/// Per-column entry of a master column record: where the value lives plus
/// the row's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDataRecord {
    pub address: ColumnDataAddress,
    pub create_timestamp: u64,
    pub update_timestamp: u64,
}

impl ColumnDataRecord {
    pub fn new(address: ColumnDataAddress, create_timestamp: u64, update_timestamp: u64) -> Self {
        Self {
            address,
            create_timestamp,
            update_timestamp,
        }
    }

    pub fn serialized_size(&self) -> usize {
        self.address.serialized_size()
            + varint_len(self.create_timestamp)
            + varint_len(self.update_timestamp)
    }

    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        self.address.serialize_into(buf);
        let mut scratch = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(self.create_timestamp, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);
        let n = encode_varint(self.update_timestamp, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);
    }

    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        let (address, mut consumed) = ColumnDataAddress::deserialize(data)?;
        let (create_timestamp, n) = decode_varint(&data[consumed..])?;
        consumed += n;
        let (update_timestamp, n) = decode_varint(&data[consumed..])?;
        consumed += n;
        Ok((
            Self::new(address, create_timestamp, update_timestamp),
            consumed,
        ))
    }

    pub fn encode_plain(&self) -> [u8; PLAIN_RECORD_SIZE] {
        let mut out = [0u8; PLAIN_RECORD_SIZE];
        out[..PLAIN_ADDRESS_SIZE].copy_from_slice(&self.address.encode_plain());
        out[12..20].copy_from_slice(&self.create_timestamp.to_be_bytes());
        out[20..28].copy_from_slice(&self.update_timestamp.to_be_bytes());
        out
    }

    pub fn decode_plain(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= PLAIN_RECORD_SIZE,
            "plain record needs {} bytes, got {}",
            PLAIN_RECORD_SIZE,
            data.len()
        );
        Ok(Self::new(
            ColumnDataAddress::decode_plain(data)?,
            u64::from_be_bytes(data[12..20].try_into().unwrap()),
            u64::from_be_bytes(data[20..28].try_into().unwrap()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_use_reserved_block_zero() {
        assert!(ColumnDataAddress::NULL.is_null());
        assert!(ColumnDataAddress::NULL.is_sentinel());
        assert!(ColumnDataAddress::DEFAULT_VALUE.is_default_value());
        assert!(!ColumnDataAddress::DEFAULT_VALUE.is_null());
        assert!(!ColumnDataAddress::new(1, 0).is_sentinel());
        assert_eq!(ColumnDataAddress::default(), ColumnDataAddress::NULL);
    }

    #[test]
    fn compact_roundtrip() {
        for addr in [
            ColumnDataAddress::NULL,
            ColumnDataAddress::DEFAULT_VALUE,
            ColumnDataAddress::new(1, 0),
            ColumnDataAddress::new(127, 128),
            ColumnDataAddress::new(u64::MAX, u32::MAX),
        ] {
            let mut buf = Vec::new();
            addr.serialize_into(&mut buf);
            assert_eq!(buf.len(), addr.serialized_size());

            let (decoded, consumed) = ColumnDataAddress::deserialize(&buf).unwrap();
            assert_eq!(decoded, addr);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn null_sentinel_is_two_zero_bytes_compact() {
        let mut buf = Vec::new();
        ColumnDataAddress::NULL.serialize_into(&mut buf);
        assert_eq!(buf, vec![0, 0]);
    }

    #[test]
    fn plain_roundtrip_is_fixed_width() {
        let addr = ColumnDataAddress::new(0x0102_0304_0506_0708, 0x0A0B_0C0D);
        let plain = addr.encode_plain();
        assert_eq!(plain[0], 0x01);
        assert_eq!(plain[8], 0x0A);
        assert_eq!(ColumnDataAddress::decode_plain(&plain).unwrap(), addr);

        assert!(ColumnDataAddress::decode_plain(&plain[..11]).is_err());
    }

    #[test]
    fn record_roundtrips_both_encodings() {
        let rec = ColumnDataRecord::new(ColumnDataAddress::new(3, 77), 1000, 2000);

        let mut buf = Vec::new();
        rec.serialize_into(&mut buf);
        assert_eq!(buf.len(), rec.serialized_size());
        let (decoded, consumed) = ColumnDataRecord::deserialize(&buf).unwrap();
        assert_eq!(decoded, rec);
        assert_eq!(consumed, buf.len());

        let plain = rec.encode_plain();
        assert_eq!(ColumnDataRecord::decode_plain(&plain).unwrap(), rec);
    }

    #[test]
    fn truncated_compact_address_fails() {
        let mut buf = Vec::new();
        ColumnDataAddress::new(u64::MAX, 5).serialize_into(&mut buf);
        assert!(ColumnDataAddress::deserialize(&buf[..4]).is_err());
    }
}

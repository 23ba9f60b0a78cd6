//! # Master Column Records
//!
//! A master column record (MCR) is what the master column of a table stores
//! per DML statement: which operation touched the row, the row's id and
//! timestamps, and where every other column of the table put its value.
//!
//! ## Serialized Layout
//!
//! ```text
//! varint total_length      length of everything after this prefix
//! u8     operation         Insert=0 / Update=1 / Delete=2
//! varint trid
//! varint create_timestamp
//! varint update_timestamp
//! varint column_count
//! column_count × ColumnDataRecord (compact encoding)
//! ```
//!
//! The size tag lets a reader skip a record without decoding it. A record
//! larger than [`MAX_MASTER_COLUMN_RECORD_SIZE`] is refused at serialization
//! time: the cap guarantees every MCR fits one block data area.

use eyre::{ensure, Result};

use crate::config::MAX_MASTER_COLUMN_RECORD_SIZE;
use crate::encoding::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
use crate::error::ExhaustionError;
use crate::storage::address::ColumnDataRecord;

/// DML operation recorded in an MCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DmlOperationType {
    Insert = 0,
    Update = 1,
    Delete = 2,
}

impl DmlOperationType {
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(DmlOperationType::Insert),
            1 => Ok(DmlOperationType::Update),
            2 => Ok(DmlOperationType::Delete),
            _ => eyre::bail!("invalid DML operation byte {}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterColumnRecord {
    pub operation: DmlOperationType,
    pub trid: u64,
    pub create_timestamp: u64,
    pub update_timestamp: u64,
    pub column_records: Vec<ColumnDataRecord>,
}

impl MasterColumnRecord {
    pub fn new(
        operation: DmlOperationType,
        trid: u64,
        create_timestamp: u64,
        update_timestamp: u64,
        column_records: Vec<ColumnDataRecord>,
    ) -> Self {
        Self {
            operation,
            trid,
            create_timestamp,
            update_timestamp,
            column_records,
        }
    }

    fn payload_size(&self) -> usize {
        1 + varint_len(self.trid)
            + varint_len(self.create_timestamp)
            + varint_len(self.update_timestamp)
            + varint_len(self.column_records.len() as u64)
            + self
                .column_records
                .iter()
                .map(|r| r.serialized_size())
                .sum::<usize>()
    }

    /// Total serialized size including the length prefix.
    pub fn serialized_size(&self) -> usize {
        let payload = self.payload_size();
        varint_len(payload as u64) + payload
    }

    /// Appends the size-tagged serialized form to `buf`. Fails with a typed
    /// exhaustion error when the record exceeds the hard cap.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        let total = self.serialized_size();
        if total > MAX_MASTER_COLUMN_RECORD_SIZE {
            return Err(eyre::Report::new(ExhaustionError::MasterRecordTooLong {
                size: total,
                max: MAX_MASTER_COLUMN_RECORD_SIZE,
            }));
        }

        let mut scratch = [0u8; MAX_VARINT_LEN];
        let n = encode_varint(self.payload_size() as u64, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);

        buf.push(self.operation as u8);
        for value in [self.trid, self.create_timestamp, self.update_timestamp] {
            let n = encode_varint(value, &mut scratch);
            buf.extend_from_slice(&scratch[..n]);
        }
        let n = encode_varint(self.column_records.len() as u64, &mut scratch);
        buf.extend_from_slice(&scratch[..n]);
        for record in &self.column_records {
            record.serialize_into(buf);
        }
        Ok(())
    }

    /// Decodes a size-tagged record, returning it and the bytes consumed.
    pub fn deserialize(data: &[u8]) -> Result<(Self, usize)> {
        let (payload_len, prefix_len) = decode_varint(data)?;
        let payload_len = payload_len as usize;
        ensure!(
            payload_len <= MAX_MASTER_COLUMN_RECORD_SIZE,
            "master column record of {} bytes exceeds the maximum",
            payload_len
        );
        ensure!(
            data.len() >= prefix_len + payload_len,
            "truncated master column record: need {} bytes, got {}",
            prefix_len + payload_len,
            data.len()
        );
        let payload = &data[prefix_len..prefix_len + payload_len];

        ensure!(!payload.is_empty(), "empty master column record payload");
        let operation = DmlOperationType::from_u8(payload[0])?;
        let mut pos = 1;

        let (trid, n) = decode_varint(&payload[pos..])?;
        pos += n;
        let (create_timestamp, n) = decode_varint(&payload[pos..])?;
        pos += n;
        let (update_timestamp, n) = decode_varint(&payload[pos..])?;
        pos += n;
        let (count, n) = decode_varint(&payload[pos..])?;
        pos += n;

        let mut column_records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (record, n) = ColumnDataRecord::deserialize(&payload[pos..])?;
            pos += n;
            column_records.push(record);
        }
        ensure!(
            pos == payload_len,
            "master column record has {} trailing bytes",
            payload_len - pos
        );

        Ok((
            Self::new(
                operation,
                trid,
                create_timestamp,
                update_timestamp,
                column_records,
            ),
            prefix_len + payload_len,
        ))
    }
}

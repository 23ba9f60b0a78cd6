//! # Master Index
//!
//! Unique persistent map from table row id (TRID) to the plain-encoded
//! address of that row's master column record. Lives in one append-only
//! operation log file per index, `i<indexId>.sdi`, replayed into an
//! in-memory `BTreeMap` on open.
//!
//! ## Log Record Format
//!
//! Fixed 25 bytes per record:
//!
//! ```text
//! ┌───────────┬────────┬────────────┬──────────────────────┐
//! │ crc32 u32 │ op u8  │ trid u64   │ address (plain 12B)  │
//! │ BE        │        │ BE         │                      │
//! └───────────┴────────┴────────────┴──────────────────────┘
//! ```
//!
//! The CRC-32 covers the 21 payload bytes that follow it. Replay fails on
//! any framing or checksum violation; a torn final record means the sync
//! contract was broken, not a condition to paper over.
//!
//! Every mutation appends a record and syncs before returning.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crc::{Crc, CRC_32_ISO_HDLC};
use eyre::{bail, ensure, Context, Result};
use std::collections::BTreeMap;

use crate::storage::address::ColumnDataAddress;
use crate::storage::INDEX_FILE_EXTENSION;

const LOG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

const LOG_RECORD_SIZE: usize = 25;
const LOG_PAYLOAD_SIZE: usize = LOG_RECORD_SIZE - 4;

const OP_INSERT: u8 = 0;
const OP_UPDATE: u8 = 1;
const OP_ERASE: u8 = 2;

#[derive(Debug)]
pub struct MasterIndex {
    index_id: u64,
    path: PathBuf,
    log: File,
    entries: BTreeMap<u64, ColumnDataAddress>,
}

impl MasterIndex {
    /// File name for an index id, `i<indexId>.sdi`.
    pub fn file_name(index_id: u64) -> String {
        format!("i{}.{}", index_id, INDEX_FILE_EXTENSION)
    }

    /// Creates a new empty index log.
    pub fn create(dir: &Path, index_id: u64) -> Result<Self> {
        let path = dir.join(Self::file_name(index_id));
        let log = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create index log {}", path.display()))?;
        Ok(Self {
            index_id,
            path,
            log,
            entries: BTreeMap::new(),
        })
    }

    /// Opens an existing index log and replays it.
    pub fn open(dir: &Path, index_id: u64) -> Result<Self> {
        let path = dir.join(Self::file_name(index_id));
        let bytes = std::fs::read(&path)
            .wrap_err_with(|| format!("failed to read index log {}", path.display()))?;
        ensure!(
            bytes.len() % LOG_RECORD_SIZE == 0,
            "index log {} has a torn record ({} trailing bytes)",
            path.display(),
            bytes.len() % LOG_RECORD_SIZE
        );

        let mut entries = BTreeMap::new();
        for record in bytes.chunks_exact(LOG_RECORD_SIZE) {
            let stored_crc = u32::from_be_bytes(record[..4].try_into().unwrap());
            let payload = &record[4..];
            let computed_crc = LOG_CRC.checksum(payload);
            ensure!(
                stored_crc == computed_crc,
                "index log {} has a corrupt record (crc {:#010x}, expected {:#010x})",
                path.display(),
                computed_crc,
                stored_crc
            );

            let op = payload[0];
            let trid = u64::from_be_bytes(payload[1..9].try_into().unwrap());
            let address = ColumnDataAddress::decode_plain(&payload[9..])?;
            match op {
                OP_INSERT | OP_UPDATE => {
                    entries.insert(trid, address);
                }
                OP_ERASE => {
                    entries.remove(&trid);
                }
                _ => bail!("index log {} has unknown op {}", path.display(), op),
            }
        }

        let log = OpenOptions::new()
            .append(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open index log {}", path.display()))?;
        Ok(Self {
            index_id,
            path,
            log,
            entries,
        })
    }

    pub fn index_id(&self) -> u64 {
        self.index_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, trid: u64) -> Option<ColumnDataAddress> {
        self.entries.get(&trid).copied()
    }

    /// Inserts a new entry. The trid must not be present.
    pub fn insert(&mut self, trid: u64, address: ColumnDataAddress) -> Result<()> {
        ensure!(
            !self.entries.contains_key(&trid),
            "index entry for trid {} already exists",
            trid
        );
        self.append_record(OP_INSERT, trid, address)?;
        self.entries.insert(trid, address);
        Ok(())
    }

    /// Replaces an existing entry. The trid must be present.
    pub fn update(&mut self, trid: u64, address: ColumnDataAddress) -> Result<()> {
        ensure!(
            self.entries.contains_key(&trid),
            "index entry for trid {} not found",
            trid
        );
        self.append_record(OP_UPDATE, trid, address)?;
        self.entries.insert(trid, address);
        Ok(())
    }

    /// Removes an existing entry. The trid must be present.
    pub fn erase(&mut self, trid: u64) -> Result<()> {
        ensure!(
            self.entries.contains_key(&trid),
            "index entry for trid {} not found",
            trid
        );
        self.append_record(OP_ERASE, trid, ColumnDataAddress::NULL)?;
        self.entries.remove(&trid);
        Ok(())
    }

    fn append_record(&mut self, op: u8, trid: u64, address: ColumnDataAddress) -> Result<()> {
        let mut payload = [0u8; LOG_PAYLOAD_SIZE];
        payload[0] = op;
        payload[1..9].copy_from_slice(&trid.to_be_bytes());
        payload[9..].copy_from_slice(&address.encode_plain());

        let mut record = [0u8; LOG_RECORD_SIZE];
        record[..4].copy_from_slice(&LOG_CRC.checksum(&payload).to_be_bytes());
        record[4..].copy_from_slice(&payload);

        self.log
            .write_all(&record)
            .wrap_err_with(|| format!("failed to append to index log {}", self.path.display()))?;
        self.log.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn addr(block_id: u64, offset: u32) -> ColumnDataAddress {
        ColumnDataAddress::new(block_id, offset)
    }

    #[test]
    fn mutations_replay_on_open() {
        let dir = tempdir().unwrap();
        {
            let mut index = MasterIndex::create(dir.path(), 1).unwrap();
            index.insert(4096, addr(1, 0)).unwrap();
            index.insert(4097, addr(1, 8)).unwrap();
            index.update(4096, addr(2, 0)).unwrap();
            index.insert(4098, addr(2, 8)).unwrap();
            index.erase(4097).unwrap();
        }

        let index = MasterIndex::open(dir.path(), 1).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(4096), Some(addr(2, 0)));
        assert_eq!(index.get(4097), None);
        assert_eq!(index.get(4098), Some(addr(2, 8)));
    }

    #[test]
    fn duplicate_insert_is_rejected_without_logging() {
        let dir = tempdir().unwrap();
        {
            let mut index = MasterIndex::create(dir.path(), 1).unwrap();
            index.insert(10, addr(1, 0)).unwrap();
            assert!(index.insert(10, addr(1, 4)).is_err());
        }

        let index = MasterIndex::open(dir.path(), 1).unwrap();
        assert_eq!(index.get(10), Some(addr(1, 0)));
    }

    #[test]
    fn update_and_erase_require_presence() {
        let dir = tempdir().unwrap();
        let mut index = MasterIndex::create(dir.path(), 1).unwrap();
        assert!(index.update(1, addr(1, 0)).is_err());
        assert!(index.erase(1).is_err());
    }

    #[test]
    fn corrupt_record_fails_replay() {
        let dir = tempdir().unwrap();
        {
            let mut index = MasterIndex::create(dir.path(), 1).unwrap();
            index.insert(1, addr(1, 0)).unwrap();
        }

        let path = dir.path().join(MasterIndex::file_name(1));
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(MasterIndex::open(dir.path(), 1).is_err());
    }

    #[test]
    fn torn_record_fails_replay() {
        let dir = tempdir().unwrap();
        {
            let mut index = MasterIndex::create(dir.path(), 1).unwrap();
            index.insert(1, addr(1, 0)).unwrap();
        }

        let path = dir.path().join(MasterIndex::file_name(1));
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(MasterIndex::open(dir.path(), 1).is_err());
    }
}

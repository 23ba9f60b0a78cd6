//! # Table Row Id Counters
//!
//! The master column of a table owns a small memory-mapped counter file
//! (`tc.stc`) handing out table row ids (TRIDs):
//!
//! ```text
//! ┌────────────┬───────────────┬─────────────────┐
//! │ marker u64 │ user_counter  │ system_counter  │     24 bytes total
//! └────────────┴───────────────┴─────────────────┘
//! ```
//!
//! Counters hold the *next* id to hand out. System TRIDs occupy
//! `[1, first_user_trid)`; user TRIDs occupy `[first_user_trid, u64::MAX]`.
//! Every increment is flushed before the id is returned, so a crash never
//! reissues an id.
//!
//! ## Endianness Migration
//!
//! Older engine builds wrote this file in native byte order. A file from a
//! foreign-endian host is detected by its byte-reversed marker and migrated
//! transparently: counters are byte-swapped, written to a temp file, and
//! atomically renamed over the original before reopening.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use eyre::{ensure, Context, Result};
use memmap2::MmapMut;
use tracing::warn;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::ExhaustionError;
use crate::zerocopy_accessors;

/// Marker at offset 0 of a counter file.
pub const TRID_COUNTER_MARKER: u64 = 0x5449445254534D43;

/// Fixed size of the counter file.
pub const TRID_COUNTER_FILE_SIZE: usize = 24;

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct TridCounterRecord {
    marker: U64,
    user_counter: U64,
    system_counter: U64,
}

const _: () = assert!(std::mem::size_of::<TridCounterRecord>() == TRID_COUNTER_FILE_SIZE);

impl TridCounterRecord {
    zerocopy_accessors! {
        marker: u64,
        user_counter: u64,
        system_counter: u64,
    }
}

/// Open handle on a master column's TRID counter file.
#[derive(Debug)]
pub struct TridCounterFile {
    path: PathBuf,
    mmap: MmapMut,
}

impl TridCounterFile {
    /// Creates the counter file with the user counter at `first_user_trid`
    /// and the system counter at 1.
    pub fn create(path: &Path, first_user_trid: u64) -> Result<Self> {
        ensure!(first_user_trid > 1, "first user trid must leave system id space");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .wrap_err_with(|| format!("failed to create counter file {}", path.display()))?;
        file.set_len(TRID_COUNTER_FILE_SIZE as u64)?;

        // SAFETY: just created with the exact mapped length; accessed only
        // through this mapping.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut counters = Self {
            path: path.to_path_buf(),
            mmap,
        };

        let record = counters.record_mut();
        record.set_marker(TRID_COUNTER_MARKER);
        record.set_user_counter(first_user_trid);
        record.set_system_counter(1);
        counters.flush()?;
        Ok(counters)
    }

    /// Opens an existing counter file, migrating a foreign-endian file in
    /// place first if its marker reads byte-reversed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open counter file {}", path.display()))?;
        ensure!(
            file.metadata()?.len() == TRID_COUNTER_FILE_SIZE as u64,
            "counter file {} has wrong size",
            path.display()
        );

        // SAFETY: length checked above; exclusive access through this mapping.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let counters = Self {
            path: path.to_path_buf(),
            mmap,
        };

        let marker = counters.record().marker();
        if marker == TRID_COUNTER_MARKER.swap_bytes() {
            drop(counters);
            Self::migrate_endianness(path)?;
            return Self::open(path);
        }
        ensure!(
            marker == TRID_COUNTER_MARKER,
            "counter file {} has invalid marker {:#018x}",
            path.display(),
            marker
        );
        Ok(counters)
    }

    fn migrate_endianness(path: &Path) -> Result<()> {
        warn!(path = %path.display(), "migrating foreign-endian trid counter file");
        let bytes = std::fs::read(path)?;
        ensure!(
            bytes.len() == TRID_COUNTER_FILE_SIZE,
            "counter file {} has wrong size",
            path.display()
        );

        let mut swapped = [0u8; TRID_COUNTER_FILE_SIZE];
        for (field, out) in bytes.chunks_exact(8).zip(swapped.chunks_exact_mut(8)) {
            for (i, &b) in field.iter().rev().enumerate() {
                out[i] = b;
            }
        }

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, swapped)?;
        std::fs::rename(&tmp_path, path)
            .wrap_err_with(|| format!("failed to replace counter file {}", path.display()))?;
        Ok(())
    }

    fn record(&self) -> &TridCounterRecord {
        TridCounterRecord::ref_from_bytes(&self.mmap[..TRID_COUNTER_FILE_SIZE])
            .expect("counter record layout is const-asserted")
    }

    fn record_mut(&mut self) -> &mut TridCounterRecord {
        TridCounterRecord::mut_from_bytes(&mut self.mmap[..TRID_COUNTER_FILE_SIZE])
            .expect("counter record layout is const-asserted")
    }

    fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .wrap_err_with(|| format!("failed to sync counter file {}", self.path.display()))
    }

    pub fn user_counter(&self) -> u64 {
        self.record().user_counter()
    }

    pub fn system_counter(&self) -> u64 {
        self.record().system_counter()
    }

    /// Hands out the next user TRID, flushing before returning it.
    pub fn generate_next_user_trid(&mut self) -> Result<u64> {
        let trid = self.user_counter();
        if trid == u64::MAX {
            return Err(eyre::Report::new(ExhaustionError::UserTridExhausted));
        }
        self.record_mut().set_user_counter(trid + 1);
        self.flush()?;
        Ok(trid)
    }

    /// Hands out the next system TRID, flushing before returning it. The
    /// system id space ends at `first_user_trid`.
    pub fn generate_next_system_trid(&mut self, first_user_trid: u64) -> Result<u64> {
        let trid = self.system_counter();
        if trid >= first_user_trid {
            return Err(eyre::Report::new(ExhaustionError::SystemTridExhausted {
                first_user_trid,
            }));
        }
        self.record_mut().set_system_counter(trid + 1);
        self.flush()?;
        Ok(trid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_open_preserves_counters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tc.stc");
        {
            let mut counters = TridCounterFile::create(&path, 4096).unwrap();
            assert_eq!(counters.generate_next_user_trid().unwrap(), 4096);
            assert_eq!(counters.generate_next_user_trid().unwrap(), 4097);
            assert_eq!(counters.generate_next_system_trid(4096).unwrap(), 1);
        }

        let counters = TridCounterFile::open(&path).unwrap();
        assert_eq!(counters.user_counter(), 4098);
        assert_eq!(counters.system_counter(), 2);
    }

    #[test]
    fn system_trid_space_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tc.stc");
        let mut counters = TridCounterFile::create(&path, 3).unwrap();

        assert_eq!(counters.generate_next_system_trid(3).unwrap(), 1);
        assert_eq!(counters.generate_next_system_trid(3).unwrap(), 2);
        let err = counters.generate_next_system_trid(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExhaustionError>(),
            Some(ExhaustionError::SystemTridExhausted { first_user_trid: 3 })
        ));
    }

    #[test]
    fn foreign_endian_file_is_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tc.stc");

        // a file as written by a big-endian host
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&TRID_COUNTER_MARKER.to_be_bytes());
        bytes.extend_from_slice(&5000u64.to_be_bytes());
        bytes.extend_from_slice(&7u64.to_be_bytes());
        std::fs::write(&path, bytes).unwrap();

        let counters = TridCounterFile::open(&path).unwrap();
        assert_eq!(counters.user_counter(), 5000);
        assert_eq!(counters.system_counter(), 7);
    }

    #[test]
    fn invalid_marker_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tc.stc");
        std::fs::write(&path, [0xABu8; TRID_COUNTER_FILE_SIZE]).unwrap();
        assert!(TridCounterFile::open(&path).is_err());
    }

    #[test]
    fn wrong_size_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tc.stc");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert!(TridCounterFile::open(&path).is_err());
    }
}

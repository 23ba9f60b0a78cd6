//! # LOB Streams
//!
//! This module provides the streaming interface for large character (CLOB)
//! and binary (BLOB) objects. Values too large to hold inline are surfaced
//! as streams so the row layer never has to materialize them in memory.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! LobStream                 fixed total size, mutable position, read/rewind
//! ├── ClobStream            + read_as_string, clone capability query
//! └── BlobStream            + read_as_binary, clone capability query
//! ```
//!
//! ## Read Contract
//!
//! `read` fills as much of the caller's buffer as it can and returns the
//! number of bytes written; `Ok(0)` means end of stream. Short reads are
//! normal — the `read_as_*` helpers loop until the requested amount is
//! exhausted.
//!
//! ## Cloneability
//!
//! Cloning is a capability, not a guarantee: `try_clone_clob`/
//! `try_clone_blob` return `None` for streams that cannot be duplicated
//! (wrapper streams and anything positioned mid-chunk over column storage).
//! Memory-backed streams share their immutable backing, so cloning them is
//! O(1).
//!
//! ## Concrete Adapters
//!
//! - [`memory::StringClobStream`] / [`memory::BinaryBlobStream`]: wrap a
//!   shared immutable string/buffer
//! - [`wrapper::BlobWrapperClobStream`]: presents BLOB bytes as hex text
//! - [`wrapper::ClobWrapperBlobStream`]: presents CLOB bytes as raw binary
//! - `storage::ColumnClobStream` / `storage::ColumnBlobStream`: stream
//!   chunk-by-chunk from column storage (defined next to the column engine)

pub mod memory;
pub mod wrapper;

pub use memory::{BinaryBlobStream, StringClobStream};
pub use wrapper::{BlobWrapperClobStream, ClobWrapperBlobStream};

use eyre::Result;

/// Abstract base for LOB streams: a fixed-size byte sequence with a cursor.
pub trait LobStream: Send {
    /// Total size of the stream content, in bytes.
    fn size(&self) -> u64;

    /// Current read position, in bytes from the start.
    fn pos(&self) -> u64;

    /// Reads up to `buf.len()` bytes into `buf`. Returns the number of bytes
    /// read; `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Resets the position to the start. Returns `false` if this stream does
    /// not support rewinding.
    fn rewind(&mut self) -> Result<bool>;

    fn remaining_size(&self) -> u64 {
        self.size() - self.pos()
    }
}

/// Character LOB stream.
pub trait ClobStream: LobStream {
    /// Duplicates the stream at its starting position, if supported.
    fn try_clone_clob(&self) -> Option<Box<dyn ClobStream>>;

    /// Reads up to `max_len` remaining bytes into an owned string, tolerating
    /// short reads. Fails if the content is not valid UTF-8.
    fn read_as_string(&mut self, max_len: usize) -> Result<String> {
        let bytes = read_remaining(self.as_lob_stream(), max_len)?;
        String::from_utf8(bytes).map_err(|e| eyre::eyre!("CLOB content is not valid UTF-8: {}", e))
    }

    #[doc(hidden)]
    fn as_lob_stream(&mut self) -> &mut dyn LobStream;
}

/// Binary LOB stream.
pub trait BlobStream: LobStream {
    /// Duplicates the stream at its starting position, if supported.
    fn try_clone_blob(&self) -> Option<Box<dyn BlobStream>>;

    /// Reads up to `max_len` remaining bytes into an owned buffer, tolerating
    /// short reads.
    fn read_as_binary(&mut self, max_len: usize) -> Result<Vec<u8>> {
        read_remaining(self.as_lob_stream(), max_len)
    }

    #[doc(hidden)]
    fn as_lob_stream(&mut self) -> &mut dyn LobStream;
}

fn read_remaining(stream: &mut dyn LobStream, max_len: usize) -> Result<Vec<u8>> {
    let want = stream.remaining_size().min(max_len as u64) as usize;
    let mut out = vec![0u8; want];
    let mut filled = 0;
    while filled < want {
        let n = stream.read(&mut out[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    out.truncate(filled);
    Ok(out)
}

//! # Column-Backed LOB Streams
//!
//! Lazy streams over a chunk chain in column storage. A stream holds only
//! the current chunk header and a cursor; every `read` re-enters the column
//! lock for the bytes it needs, so an open stream never pins block mappings.
//!
//! Each followed link is cross-validated against the previous header: the
//! next chunk must exist, sit inside its block's data area, and agree on how
//! many bytes of the LOB remain. Any disagreement surfaces as a typed
//! invalid-chunk-header error naming the column, block, and offset.
//!
//! The stream either keeps its column alive (`Arc`, `hold_source = true`) or
//! merely observes it (`Weak`); reading through a dropped column fails
//! instead of dangling.

use std::sync::{Arc, Weak};

use eyre::Result;

use crate::config::LOB_CHUNK_HEADER_SIZE;
use crate::lob::{BlobStream, ClobStream, LobStream};
use crate::storage::address::ColumnDataAddress;
use crate::storage::chunk::LobChunkHeader;
use crate::storage::column::Column;

enum ColumnHandle {
    Held(Arc<Column>),
    Observed(Weak<Column>),
}

impl ColumnHandle {
    fn new(column: &Arc<Column>, hold_source: bool) -> Self {
        if hold_source {
            ColumnHandle::Held(Arc::clone(column))
        } else {
            ColumnHandle::Observed(Arc::downgrade(column))
        }
    }

    fn resolve(&self) -> Result<Arc<Column>> {
        match self {
            ColumnHandle::Held(column) => Ok(Arc::clone(column)),
            ColumnHandle::Observed(weak) => weak.upgrade().ok_or_else(|| {
                eyre::eyre!("column storage was dropped while a LOB stream was still open")
            }),
        }
    }

    fn duplicate(&self) -> Self {
        match self {
            ColumnHandle::Held(column) => ColumnHandle::Held(Arc::clone(column)),
            ColumnHandle::Observed(weak) => ColumnHandle::Observed(Weak::clone(weak)),
        }
    }
}

struct ChunkCursor {
    /// Address of the chunk header.
    address: ColumnDataAddress,
    header: LobChunkHeader,
    /// Payload bytes of this chunk already handed out.
    consumed: u32,
}

/// Shared machinery of [`ColumnClobStream`] and [`ColumnBlobStream`].
struct ColumnLobStream {
    column: ColumnHandle,
    start: ColumnDataAddress,
    total_size: u64,
    pos: u64,
    cursor: Option<ChunkCursor>,
}

impl ColumnLobStream {
    fn open(column: &Arc<Column>, start: ColumnDataAddress, total_size: u64, hold_source: bool) -> Self {
        Self {
            column: ColumnHandle::new(column, hold_source),
            start,
            total_size,
            pos: 0,
            cursor: None,
        }
    }

    /// A fresh stream over the same chain, positioned at the start.
    fn duplicate(&self) -> Self {
        Self {
            column: self.column.duplicate(),
            start: self.start,
            total_size: self.total_size,
            pos: 0,
            cursor: None,
        }
    }

    fn load_chunk(
        &self,
        column: &Column,
        address: ColumnDataAddress,
        expected_remaining: u64,
    ) -> Result<ChunkCursor> {
        let header = column.lob_chunk_header(address)?;
        if header.remaining_lob_length as u64 != expected_remaining {
            return Err(column.err_invalid_chunk(
                address,
                format!(
                    "remaining length {} disagrees with chain ({} expected)",
                    header.remaining_lob_length, expected_remaining
                ),
            ));
        }
        if header.chunk_length == 0 && header.has_next() {
            return Err(column.err_invalid_chunk(
                address,
                "zero-length non-terminal chunk".to_owned(),
            ));
        }
        Ok(ChunkCursor {
            address,
            header,
            consumed: 0,
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.pos >= self.total_size {
            return Ok(0);
        }
        let column = self.column.resolve()?;

        if self.cursor.is_none() {
            self.cursor = Some(self.load_chunk(&column, self.start, self.total_size)?);
        }

        // advance past exhausted chunks
        loop {
            let cursor = self.cursor.as_ref().expect("chunk cursor was just loaded");
            if cursor.consumed < cursor.header.chunk_length {
                break;
            }
            if !cursor.header.has_next() {
                return Err(column.err_invalid_chunk(
                    cursor.address,
                    format!(
                        "chain ends with {} of {} bytes unread",
                        self.total_size - self.pos,
                        self.total_size
                    ),
                ));
            }
            let next = ColumnDataAddress::new(
                cursor.header.next_chunk_block_id,
                cursor.header.next_chunk_offset,
            );
            let expected = (cursor.header.remaining_lob_length - cursor.header.chunk_length) as u64;
            self.cursor = Some(self.load_chunk(&column, next, expected)?);
        }

        let cursor = self.cursor.as_mut().expect("chunk cursor was just loaded");
        let chunk_remaining = (cursor.header.chunk_length - cursor.consumed) as usize;
        let n = buf.len().min(chunk_remaining);
        let payload_offset =
            cursor.address.offset() + LOB_CHUNK_HEADER_SIZE as u32 + cursor.consumed;
        column.lob_chunk_payload(
            ColumnDataAddress::new(cursor.address.block_id(), payload_offset),
            &mut buf[..n],
        )?;
        cursor.consumed += n as u32;
        self.pos += n as u64;
        Ok(n)
    }

    fn rewind(&mut self) -> Result<bool> {
        self.pos = 0;
        self.cursor = None;
        Ok(true)
    }
}

macro_rules! column_stream {
    ($name:ident) => {
        impl LobStream for $name {
            fn size(&self) -> u64 {
                self.inner.total_size
            }

            fn pos(&self) -> u64 {
                self.inner.pos
            }

            fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
                self.inner.read(buf)
            }

            fn rewind(&mut self) -> Result<bool> {
                self.inner.rewind()
            }
        }
    };
}

/// CLOB streamed chunk-by-chunk from column storage.
pub struct ColumnClobStream {
    inner: ColumnLobStream,
}

impl ColumnClobStream {
    pub(crate) fn open(
        column: &Arc<Column>,
        start: ColumnDataAddress,
        total_size: u64,
        hold_source: bool,
    ) -> Self {
        Self {
            inner: ColumnLobStream::open(column, start, total_size, hold_source),
        }
    }
}

column_stream!(ColumnClobStream);

impl ClobStream for ColumnClobStream {
    fn try_clone_clob(&self) -> Option<Box<dyn ClobStream>> {
        // mid-chunk positions cannot be duplicated cheaply
        (self.inner.pos == 0).then(|| {
            Box::new(Self {
                inner: self.inner.duplicate(),
            }) as Box<dyn ClobStream>
        })
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

/// BLOB streamed chunk-by-chunk from column storage.
pub struct ColumnBlobStream {
    inner: ColumnLobStream,
}

impl ColumnBlobStream {
    pub(crate) fn open(
        column: &Arc<Column>,
        start: ColumnDataAddress,
        total_size: u64,
        hold_source: bool,
    ) -> Self {
        Self {
            inner: ColumnLobStream::open(column, start, total_size, hold_source),
        }
    }
}

column_stream!(ColumnBlobStream);

impl BlobStream for ColumnBlobStream {
    fn try_clone_blob(&self) -> Option<Box<dyn BlobStream>> {
        (self.inner.pos == 0).then(|| {
            Box::new(Self {
                inner: self.inner.duplicate(),
            }) as Box<dyn BlobStream>
        })
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

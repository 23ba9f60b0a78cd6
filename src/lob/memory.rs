//! # Memory-Backed LOB Streams
//!
//! Adapters presenting an in-memory string or buffer as a LOB stream. The
//! backing is shared, immutable, and reference-counted, so cloning a stream
//! is O(1) — both copies read the same bytes independently through their own
//! cursors.

use std::sync::Arc;

use eyre::Result;

use super::{BlobStream, ClobStream, LobStream};

/// CLOB stream over a shared immutable string.
#[derive(Debug, Clone)]
pub struct StringClobStream {
    data: Arc<str>,
    pos: u64,
}

impl StringClobStream {
    pub fn new(data: impl Into<Arc<str>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl LobStream for StringClobStream {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = copy_from(self.data.as_bytes(), &mut self.pos, buf);
        Ok(n)
    }

    fn rewind(&mut self) -> Result<bool> {
        self.pos = 0;
        Ok(true)
    }
}

impl ClobStream for StringClobStream {
    fn try_clone_clob(&self) -> Option<Box<dyn ClobStream>> {
        Some(Box::new(Self {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

/// BLOB stream over a shared immutable byte buffer.
#[derive(Debug, Clone)]
pub struct BinaryBlobStream {
    data: Arc<[u8]>,
    pos: u64,
}

impl BinaryBlobStream {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl LobStream for BinaryBlobStream {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = copy_from(&self.data, &mut self.pos, buf);
        Ok(n)
    }

    fn rewind(&mut self) -> Result<bool> {
        self.pos = 0;
        Ok(true)
    }
}

impl BlobStream for BinaryBlobStream {
    fn try_clone_blob(&self) -> Option<Box<dyn BlobStream>> {
        Some(Box::new(Self {
            data: Arc::clone(&self.data),
            pos: 0,
        }))
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

fn copy_from(data: &[u8], pos: &mut u64, buf: &mut [u8]) -> usize {
    let start = (*pos as usize).min(data.len());
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    *pos += n as u64;
    n
}

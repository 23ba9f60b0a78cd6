//! # Cross-Kind LOB Wrapper Streams
//!
//! Adapters that reinterpret a LOB of one kind as the other:
//!
//! - [`BlobWrapperClobStream`]: presents an underlying BLOB's bytes as a
//!   hex-encoded CLOB (each byte becomes two hex characters, so the wrapped
//!   stream is exactly twice the size of its source)
//! - [`ClobWrapperBlobStream`]: presents a CLOB's raw bytes as a BLOB with
//!   no transcoding and no size change
//!
//! ## In-Place Hex Expansion
//!
//! The hex wrapper avoids a scratch buffer: raw bytes are read into the tail
//! of the caller's own output buffer and expanded to hex from the front. The
//! expansion never overtakes unread tail bytes because every raw byte is
//! loaded before its two output characters are written. When the output
//! buffer ends between the two digits of a byte, the low nibble is carried
//! as pending state and emitted first on the next call.
//!
//! ## Cloneability
//!
//! Neither wrapper is cloneable: the underlying stream is owned exclusively
//! and may itself be uncloneable.

use eyre::Result;

use super::{BlobStream, ClobStream, LobStream};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Presents an underlying BLOB as a hex-encoded CLOB.
pub struct BlobWrapperClobStream {
    inner: Box<dyn BlobStream>,
    pos: u64,
    pending_nibble: Option<u8>,
}

impl BlobWrapperClobStream {
    pub fn new(inner: Box<dyn BlobStream>) -> Self {
        Self {
            inner,
            pos: 0,
            pending_nibble: None,
        }
    }
}

impl LobStream for BlobWrapperClobStream {
    fn size(&self) -> u64 {
        self.inner.size() * 2
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        if let Some(nibble) = self.pending_nibble.take() {
            buf[0] = nibble;
            written = 1;
        }

        let capacity = buf.len() - written;
        let want_raw = (self.inner.remaining_size() as usize).min(capacity.div_ceil(2));
        if want_raw == 0 {
            self.pos += written as u64;
            return Ok(written);
        }

        // Read raw bytes into the tail of the caller's buffer.
        let tail_start = buf.len() - want_raw;
        let mut raw = 0;
        while raw < want_raw {
            let n = self.inner.read(&mut buf[tail_start + raw..])?;
            if n == 0 {
                break;
            }
            raw += n;
        }

        // Expand to hex from the front. Each source byte is loaded before
        // its output positions are written, so the expansion cannot clobber
        // bytes it has not consumed yet.
        for i in 0..raw {
            let byte = buf[tail_start + i];
            buf[written] = HEX_DIGITS[(byte >> 4) as usize];
            written += 1;
            if written < buf.len() {
                buf[written] = HEX_DIGITS[(byte & 0x0F) as usize];
                written += 1;
            } else {
                self.pending_nibble = Some(HEX_DIGITS[(byte & 0x0F) as usize]);
            }
        }

        self.pos += written as u64;
        Ok(written)
    }

    fn rewind(&mut self) -> Result<bool> {
        if !self.inner.rewind()? {
            return Ok(false);
        }
        self.pos = 0;
        self.pending_nibble = None;
        Ok(true)
    }
}

impl ClobStream for BlobWrapperClobStream {
    fn try_clone_clob(&self) -> Option<Box<dyn ClobStream>> {
        None
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

/// Presents an underlying CLOB's raw bytes as a BLOB.
pub struct ClobWrapperBlobStream {
    inner: Box<dyn ClobStream>,
}

impl ClobWrapperBlobStream {
    pub fn new(inner: Box<dyn ClobStream>) -> Self {
        Self { inner }
    }
}

impl LobStream for ClobWrapperBlobStream {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn pos(&self) -> u64 {
        self.inner.pos()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    fn rewind(&mut self) -> Result<bool> {
        self.inner.rewind()
    }
}

impl BlobStream for ClobWrapperBlobStream {
    fn try_clone_blob(&self) -> Option<Box<dyn BlobStream>> {
        None
    }

    fn as_lob_stream(&mut self) -> &mut dyn LobStream {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lob::memory::{BinaryBlobStream, StringClobStream};

    #[test]
    fn hex_wrapper_doubles_size() {
        let s = BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![0u8; 10])));
        assert_eq!(s.size(), 20);
    }

    #[test]
    fn hex_wrapper_encodes_content() {
        let mut s =
            BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![0xDE, 0xAD, 0xBE])));
        assert_eq!(s.read_as_string(usize::MAX).unwrap(), "deadbe");
    }

    #[test]
    fn hex_wrapper_carries_pending_nibble_across_calls() {
        let mut s =
            BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![0x12, 0x34, 0x56])));

        let mut buf = [0u8; 3];
        assert_eq!(s.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"123");

        assert_eq!(s.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"456");

        assert_eq!(s.read(&mut buf).unwrap(), 0);
        assert_eq!(s.pos(), 6);
    }

    #[test]
    fn hex_wrapper_one_byte_at_a_time() {
        let mut s = BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![0xAB])));
        let mut out = String::new();
        let mut buf = [0u8; 1];
        while s.read(&mut buf).unwrap() == 1 {
            out.push(buf[0] as char);
        }
        assert_eq!(out, "ab");
    }

    #[test]
    fn hex_wrapper_rewind_clears_pending_state() {
        let mut s = BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![0xAB, 0xCD])));
        let mut buf = [0u8; 3];
        s.read(&mut buf).unwrap();

        assert!(s.rewind().unwrap());
        assert_eq!(s.pos(), 0);
        assert_eq!(s.read_as_string(usize::MAX).unwrap(), "abcd");
    }

    #[test]
    fn hex_wrapper_is_not_cloneable() {
        let s = BlobWrapperClobStream::new(Box::new(BinaryBlobStream::new(vec![1u8])));
        assert!(s.try_clone_clob().is_none());
    }

    #[test]
    fn clob_wrapper_passes_bytes_through_unchanged() {
        let mut s = ClobWrapperBlobStream::new(Box::new(StringClobStream::new("raw bytes")));
        assert_eq!(s.size(), 9);
        assert_eq!(s.read_as_binary(usize::MAX).unwrap(), b"raw bytes".to_vec());
        assert!(s.try_clone_blob().is_none());
    }
}

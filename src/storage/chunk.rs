//! # LOB Chunk Framing
//!
//! Values too large for one block are stored as a chain of chunks, each
//! prefixed by a fixed 20-byte little-endian header:
//!
//! ```text
//! ┌────────────────────┬──────────────┬─────────────────────┬───────────────────┐
//! │ remaining_lob_len  │ chunk_length │ next_chunk_block_id │ next_chunk_offset │
//! │ u32                │ u32          │ u64                 │ u32               │
//! └────────────────────┴──────────────┴─────────────────────┴───────────────────┘
//! ```
//!
//! `remaining_lob_length` counts this chunk's payload plus everything after
//! it, so `chunk_length <= remaining_lob_length` always holds and the reader
//! can cross-check each link. `next_chunk_block_id == 0` terminates the
//! chain (block ids start at 1).
//!
//! Headers are written with placeholder next-chunk fields and patched in
//! place once the next chunk's location is known; see
//! `Column::pick_or_create_next_block`.

use eyre::{ensure, Result};

use crate::config::LOB_CHUNK_HEADER_SIZE;

/// Header preceding every LOB chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobChunkHeader {
    pub remaining_lob_length: u32,
    pub chunk_length: u32,
    pub next_chunk_block_id: u64,
    pub next_chunk_offset: u32,
}

impl LobChunkHeader {
    /// A terminal header: no next chunk.
    pub fn terminal(remaining_lob_length: u32, chunk_length: u32) -> Self {
        Self {
            remaining_lob_length,
            chunk_length,
            next_chunk_block_id: 0,
            next_chunk_offset: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_chunk_block_id != 0
    }

    pub fn encode(&self) -> [u8; LOB_CHUNK_HEADER_SIZE] {
        let mut out = [0u8; LOB_CHUNK_HEADER_SIZE];
        out[..4].copy_from_slice(&self.remaining_lob_length.to_le_bytes());
        out[4..8].copy_from_slice(&self.chunk_length.to_le_bytes());
        out[8..16].copy_from_slice(&self.next_chunk_block_id.to_le_bytes());
        out[16..20].copy_from_slice(&self.next_chunk_offset.to_le_bytes());
        out
    }

    /// Decodes a header. Only structural validity is checked here; chain
    /// cross-validation (existing next block, in-range offsets) happens at
    /// the read site where column context is available.
    pub fn decode(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= LOB_CHUNK_HEADER_SIZE,
            "LOB chunk header needs {} bytes, got {}",
            LOB_CHUNK_HEADER_SIZE,
            data.len()
        );
        let header = Self {
            remaining_lob_length: u32::from_le_bytes(data[..4].try_into().unwrap()),
            chunk_length: u32::from_le_bytes(data[4..8].try_into().unwrap()),
            next_chunk_block_id: u64::from_le_bytes(data[8..16].try_into().unwrap()),
            next_chunk_offset: u32::from_le_bytes(data[16..20].try_into().unwrap()),
        };
        ensure!(
            header.chunk_length <= header.remaining_lob_length,
            "LOB chunk length {} exceeds remaining length {}",
            header.chunk_length,
            header.remaining_lob_length
        );
        Ok(header)
    }
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Shared chunk payload types for multi-round-trip transaction transfer.
//!
//! A signing flow first declares the total transaction size in its initiate
//! request, then streams the raw bytes in [`ChunkPayload`]s, each answered
//! by a [`ChunkAck`] naming the index just consumed. The receiver-side size
//! accounting lives in `vault-apps-core`.

/// Maximum payload bytes per chunk
pub const CHUNK_SIZE: usize = 2048;

/// One chunk of a streamed transaction
#[derive(Clone, PartialEq, Debug)]
pub struct ChunkPayload {
    /// Raw payload bytes for this chunk
    pub chunk: Vec<u8>,
    /// Zero-based index of this chunk
    pub chunk_index: u32,
    /// Total number of chunks the host intends to send
    pub total_chunks: u32,
    /// Bytes remaining after this chunk (zero on the final chunk)
    pub remaining_size: u32,
}

impl ChunkPayload {
    /// Split a transaction buffer into chunks the way the host does,
    /// useful for tests and host-side tooling.
    pub fn split(data: &[u8]) -> Vec<ChunkPayload> {
        let total_chunks = data.len().div_ceil(CHUNK_SIZE).max(1) as u32;
        let mut out = Vec::with_capacity(total_chunks as usize);
        let mut sent = 0usize;

        for index in 0..total_chunks {
            let take = (data.len() - sent).min(CHUNK_SIZE);
            out.push(ChunkPayload {
                chunk: data[sent..sent + take].to_vec(),
                chunk_index: index,
                total_chunks,
                remaining_size: (data.len() - sent - take) as u32,
            });
            sent += take;
        }

        out
    }
}

/// Acknowledgement for one consumed chunk
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ChunkAck {
    /// Index of the chunk just written into the transaction buffer
    pub chunk_index: u32,
}

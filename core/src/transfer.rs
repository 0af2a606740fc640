// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Chunked transfer receiver.
//!
//! A signing flow declares the total transaction size up front; the host
//! then streams the raw bytes in chunks, each acknowledged individually.
//! The receiver allocates the buffer exactly once, rejects any chunk that
//! would overflow it, and requires the final accounting to match the
//! declared size exactly; a mismatch aborts the session, it is never
//! retried.

use vault_apps_proto::chunk::{ChunkAck, ChunkPayload};

use crate::error::Error;

/// Upper bound on a host-declared transaction size; checked before the
/// single buffer allocation
pub const MAX_TXN_SIZE: usize = 16 * 1024;

/// Receiver state for one streamed transaction
#[derive(Clone, Debug)]
pub struct ChunkedReceiver {
    buffer: Vec<u8>,
    total_size: usize,
    received: usize,
    complete: bool,
}

impl ChunkedReceiver {
    /// Allocate for a host-declared total size.
    ///
    /// `total_size` is untrusted: zero or above [`MAX_TXN_SIZE`] is a
    /// data-flow error before any allocation happens.
    pub fn new(total_size: u32) -> Result<Self, Error> {
        let total_size = total_size as usize;
        if total_size == 0 || total_size > MAX_TXN_SIZE {
            return Err(Error::DataFlow);
        }

        Ok(Self {
            buffer: vec![0u8; total_size],
            total_size,
            received: 0,
            complete: false,
        })
    }

    /// Consume one chunk, returning the ack to transmit.
    ///
    /// Rejects index overruns and any chunk that would write past the
    /// declared size. When the host signals the final chunk
    /// (`remaining_size == 0` or last index) the accumulated byte count
    /// must equal the declared total.
    pub fn ingest(&mut self, payload: &ChunkPayload) -> Result<ChunkAck, Error> {
        if self.complete {
            return Err(Error::DataFlow);
        }

        if payload.chunk_index >= payload.total_chunks
            || self.received + payload.chunk.len() > self.total_size
        {
            return Err(Error::DataFlow);
        }

        self.buffer[self.received..self.received + payload.chunk.len()]
            .copy_from_slice(&payload.chunk);
        self.received += payload.chunk.len();

        if payload.remaining_size == 0 || payload.chunk_index + 1 == payload.total_chunks {
            if self.received != self.total_size {
                return Err(Error::DataFlow);
            }
            self.complete = true;
        }

        Ok(ChunkAck {
            chunk_index: payload.chunk_index,
        })
    }

    /// True once the final chunk has been accepted
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Take the reassembled buffer; accounting must have completed
    pub fn finish(self) -> Result<Vec<u8>, Error> {
        if !self.complete {
            return Err(Error::DataFlow);
        }
        Ok(self.buffer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn chunks_for(data: &[u8]) -> Vec<ChunkPayload> {
        ChunkPayload::split(data)
    }

    #[test]
    fn reassembles_multi_chunk() {
        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
        let mut rx = ChunkedReceiver::new(data.len() as u32).unwrap();

        for (i, c) in chunks_for(&data).iter().enumerate() {
            let ack = rx.ingest(c).unwrap();
            assert_eq!(ack.chunk_index, i as u32);
        }

        assert!(rx.is_complete());
        assert_eq!(rx.finish().unwrap(), data);
    }

    #[test]
    fn bounds_total_size() {
        assert_eq!(ChunkedReceiver::new(0).unwrap_err(), Error::DataFlow);
        assert_eq!(
            ChunkedReceiver::new(MAX_TXN_SIZE as u32 + 1).unwrap_err(),
            Error::DataFlow
        );
    }

    #[test]
    fn rejects_index_out_of_range() {
        let mut rx = ChunkedReceiver::new(8).unwrap();
        let bad = ChunkPayload {
            chunk: vec![0; 4],
            chunk_index: 1,
            total_chunks: 1,
            remaining_size: 4,
        };
        assert_eq!(rx.ingest(&bad).unwrap_err(), Error::DataFlow);
    }

    #[test]
    fn rejects_overflowing_chunk() {
        // declared 8 bytes but the host sends 12: must fail before any
        // write past the allocation
        let mut rx = ChunkedReceiver::new(8).unwrap();
        let bad = ChunkPayload {
            chunk: vec![0xaa; 12],
            chunk_index: 0,
            total_chunks: 1,
            remaining_size: 0,
        };
        assert_eq!(rx.ingest(&bad).unwrap_err(), Error::DataFlow);
    }

    #[test]
    fn rejects_short_delivery() {
        // final chunk flag with only half the declared bytes
        let mut rx = ChunkedReceiver::new(8).unwrap();
        let short = ChunkPayload {
            chunk: vec![0xbb; 4],
            chunk_index: 0,
            total_chunks: 1,
            remaining_size: 0,
        };
        assert_eq!(rx.ingest(&short).unwrap_err(), Error::DataFlow);
    }

    #[test]
    fn rejects_data_after_completion() {
        let mut rx = ChunkedReceiver::new(4).unwrap();
        let c = ChunkPayload {
            chunk: vec![1, 2, 3, 4],
            chunk_index: 0,
            total_chunks: 2,
            remaining_size: 0,
        };
        rx.ingest(&c).unwrap();
        assert!(rx.is_complete());

        let extra = ChunkPayload {
            chunk: vec![5],
            chunk_index: 1,
            total_chunks: 2,
            remaining_size: 0,
        };
        assert_eq!(rx.ingest(&extra).unwrap_err(), Error::DataFlow);
    }

    #[test]
    fn unfinished_buffer_unavailable() {
        let rx = ChunkedReceiver::new(4).unwrap();
        assert!(rx.finish().is_err());
    }
}

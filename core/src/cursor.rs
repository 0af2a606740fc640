// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Bounds-checked reader over untrusted transaction buffers.
//!
//! All three chain decoders walk host-supplied bytes through this cursor
//! instead of raw offset arithmetic; any read past the end of the buffer
//! fails closed with [`DecodeError::UnexpectedEof`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Structural decode failure
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum DecodeError {
    /// A read would exceed the remaining buffer
    #[error("unexpected end of buffer")]
    UnexpectedEof,
}

/// Forward-only reader tracking the remaining length of a borrowed buffer
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    /// Wrap a buffer, starting at offset zero
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// True when the buffer is fully consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `n` bytes, advancing the cursor
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        let out = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Read a fixed-size array, advancing the cursor
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, DecodeError> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64, DecodeError> {
        Ok(BigEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        Ok(LittleEndian::read_u64(self.read_bytes(8)?))
    }
}

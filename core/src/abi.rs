// Copyright (c) 2022-2023 The MobileCoin Foundation

//! EVM contract-ABI argument decoding.
//!
//! Calldata after the 4-byte selector is a sequence of 32-byte words:
//! static arguments sit inline, dynamic arguments hold a byte offset into
//! the tail where a length word precedes the payload. Only the whitelisted
//! types the coin apps display are decoded; everything is bounds-checked
//! against the calldata length; a declared offset or length outside the
//! buffer is a hard reject.

use crate::cursor::{Cursor, DecodeError};

/// ABI word size
pub const WORD_SIZE: usize = 32;

/// Upper bound on a dynamic `bytes` payload
pub const MAX_DYNAMIC_BYTES: usize = 4096;

/// Upper bound on a dynamic `uint256[]` element count
pub const MAX_ARRAY_ELEMENTS: usize = 128;

/// Whitelisted argument types
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum AbiType {
    Uint256,
    Address,
    BytesDynamic,
    Uint256ArrayDynamic,
}

impl AbiType {
    /// True when the in-place word is an offset into the tail
    pub fn is_dynamic(&self) -> bool {
        matches!(self, AbiType::BytesDynamic | AbiType::Uint256ArrayDynamic)
    }
}

/// Decoded argument values
#[derive(Clone, PartialEq, Debug)]
pub enum AbiValue {
    Uint256([u8; WORD_SIZE]),
    /// Low 20 bytes of the address word
    Address([u8; 20]),
    Bytes(Vec<u8>),
    Uint256Array(Vec<[u8; WORD_SIZE]>),
}

/// Decode failures
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum AbiError {
    #[error("calldata shorter than the declared layout")]
    ShortCalldata,
    #[error("dynamic offset outside the calldata")]
    BadOffset,
    #[error("dynamic length outside the calldata or limits")]
    BadLength,
}

impl From<DecodeError> for AbiError {
    fn from(_: DecodeError) -> Self {
        AbiError::ShortCalldata
    }
}

/// Read a word-sized unsigned value that must fit in a `usize`
fn read_word_usize(c: &mut Cursor) -> Result<usize, AbiError> {
    let word = c.read_array::<WORD_SIZE>()?;
    // values addressing calldata never exceed 32 bits
    if word[..WORD_SIZE - 4].iter().any(|&b| b != 0) {
        return Err(AbiError::BadLength);
    }
    let mut value = 0usize;
    for &b in &word[WORD_SIZE - 4..] {
        value = (value << 8) | b as usize;
    }
    Ok(value)
}

fn decode_dynamic(data: &[u8], offset: usize, ty: AbiType) -> Result<AbiValue, AbiError> {
    if offset > data.len() {
        return Err(AbiError::BadOffset);
    }
    let mut tail = Cursor::new(&data[offset..]);

    match ty {
        AbiType::BytesDynamic => {
            let len = read_word_usize(&mut tail)?;
            if len > MAX_DYNAMIC_BYTES || len > tail.remaining() {
                return Err(AbiError::BadLength);
            }
            Ok(AbiValue::Bytes(tail.read_bytes(len)?.to_vec()))
        }
        AbiType::Uint256ArrayDynamic => {
            let count = read_word_usize(&mut tail)?;
            if count > MAX_ARRAY_ELEMENTS || count * WORD_SIZE > tail.remaining() {
                return Err(AbiError::BadLength);
            }
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                out.push(tail.read_array::<WORD_SIZE>()?);
            }
            Ok(AbiValue::Uint256Array(out))
        }
        // static types never reach here
        _ => Err(AbiError::BadOffset),
    }
}

/// Decode the argument block of a contract call (selector already
/// stripped) against the expected type list.
pub fn decode_arguments(data: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, AbiError> {
    let mut head = Cursor::new(data);
    let mut out = Vec::with_capacity(types.len());

    for ty in types {
        match ty {
            AbiType::Uint256 => {
                out.push(AbiValue::Uint256(head.read_array()?));
            }
            AbiType::Address => {
                let word = head.read_array::<WORD_SIZE>()?;
                let mut addr = [0u8; 20];
                addr.copy_from_slice(&word[12..]);
                out.push(AbiValue::Address(addr));
            }
            _ => {
                let offset = read_word_usize(&mut head)?;
                out.push(decode_dynamic(data, offset, *ty)?);
            }
        }
    }

    Ok(out)
}

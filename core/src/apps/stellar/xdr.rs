// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Stellar XDR transaction-envelope decoding.
//!
//! Parses the big-endian `ENVELOPE_TYPE_TX` subset this app signs: one
//! ED25519 source account, optional time-bounds preconditions, any memo
//! kind, and exactly one `CREATE_ACCOUNT` or native-asset `PAYMENT`
//! operation. The byte offset at the end of operation parsing
//! ([`DecodedTxn::tagged_txn_len`]) delimits the signature-relevant prefix
//! of the envelope, distinct from the full buffer length.

use crate::cursor::{Cursor, DecodeError};

/// Envelope type tag for an unsigned transaction
pub const ENVELOPE_TYPE_TX: u32 = 2;

/// Maximum memo text bytes
pub const MEMO_TEXT_MAX: usize = 28;

/// Decode / validation failures, host-coded via [`TxnError::code`]
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum TxnError {
    #[error("structure exceeds the buffer")]
    ReadSizeMismatch,
    #[error("envelope type not ENVELOPE_TYPE_TX")]
    UnsupportedEnvelopeType,
    #[error("account type not ED25519")]
    UnsupportedAccountType,
    #[error("unsupported preconditions")]
    UnsupportedPreconditions,
    #[error("unknown memo kind")]
    UnsupportedMemo,
    #[error("memo text too long")]
    MemoTooLong,
    #[error("operation count must be one")]
    UnsupportedOperationCount,
    #[error("unsupported operation kind")]
    UnsupportedOperation,
    #[error("non-native asset")]
    UnsupportedAsset,
    #[error("unknown transaction extension")]
    UnsupportedExtension,
}

impl TxnError {
    /// Stable numeric code reported to the host
    pub fn code(&self) -> u32 {
        match self {
            TxnError::ReadSizeMismatch => 1,
            TxnError::UnsupportedEnvelopeType => 2,
            TxnError::UnsupportedAccountType => 3,
            TxnError::UnsupportedPreconditions => 4,
            TxnError::UnsupportedMemo => 5,
            TxnError::MemoTooLong => 6,
            TxnError::UnsupportedOperationCount => 7,
            TxnError::UnsupportedOperation => 8,
            TxnError::UnsupportedAsset => 9,
            TxnError::UnsupportedExtension => 10,
        }
    }
}

impl From<DecodeError> for TxnError {
    fn from(_: DecodeError) -> Self {
        TxnError::ReadSizeMismatch
    }
}

impl From<TxnError> for crate::error::Error {
    fn from(e: TxnError) -> Self {
        crate::error::Error::InvalidTxn(e.code())
    }
}

/// Decoded memo union
#[derive(Clone, PartialEq, Debug)]
pub enum Memo {
    None,
    Text(String),
    Id(u64),
    Hash([u8; 32]),
    Return([u8; 32]),
}

/// The one whitelisted operation
#[derive(Clone, PartialEq, Debug)]
pub enum Operation {
    CreateAccount {
        destination: [u8; 32],
        starting_balance: u64,
    },
    Payment {
        destination: [u8; 32],
        amount: u64,
    },
}

impl Operation {
    pub fn destination(&self) -> &[u8; 32] {
        match self {
            Operation::CreateAccount { destination, .. } => destination,
            Operation::Payment { destination, .. } => destination,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Operation::CreateAccount {
                starting_balance, ..
            } => *starting_balance,
            Operation::Payment { amount, .. } => *amount,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateAccount { .. } => "CREATE_ACCOUNT",
            Operation::Payment { .. } => "PAYMENT",
        }
    }
}

/// Decoded transaction envelope
#[derive(Clone, PartialEq, Debug)]
pub struct DecodedTxn {
    pub source_account: [u8; 32],
    pub fee: u32,
    pub sequence_number: u64,
    pub time_bounds: Option<(u64, u64)>,
    pub memo: Memo,
    pub operation: Operation,
    /// Offset one past the operation body and its extension tag: exactly
    /// the prefix covered by the signature base
    pub tagged_txn_len: usize,
}

fn read_memo(c: &mut Cursor) -> Result<Memo, TxnError> {
    let tag = c.read_u32_be()?;
    match tag {
        0 => Ok(Memo::None),
        1 => {
            let len = c.read_u32_be()? as usize;
            if len > MEMO_TEXT_MAX {
                return Err(TxnError::MemoTooLong);
            }
            let text = c.read_bytes(len)?;
            // XDR pads opaque data to a 4-byte boundary
            let padded = len.div_ceil(4) * 4;
            c.skip(padded - len)?;
            Ok(Memo::Text(String::from_utf8_lossy(text).into_owned()))
        }
        2 => Ok(Memo::Id(c.read_u64_be()?)),
        3 => Ok(Memo::Hash(c.read_array()?)),
        4 => Ok(Memo::Return(c.read_array()?)),
        _ => Err(TxnError::UnsupportedMemo),
    }
}

fn read_operation(c: &mut Cursor) -> Result<Operation, TxnError> {
    let count = c.read_u32_be()?;
    if count != 1 {
        return Err(TxnError::UnsupportedOperationCount);
    }

    // optional per-operation source account
    match c.read_u32_be()? {
        0 => (),
        1 => c.skip(36)?,
        _ => Err(TxnError::UnsupportedAccountType)?,
    }

    let kind = c.read_u32_be()?;
    match kind {
        // CREATE_ACCOUNT
        0 => {
            if c.read_u32_be()? != 0 {
                return Err(TxnError::UnsupportedAccountType);
            }
            let destination = c.read_array()?;
            let starting_balance = c.read_u64_be()?;
            Ok(Operation::CreateAccount {
                destination,
                starting_balance,
            })
        }
        // PAYMENT, native asset only
        1 => {
            if c.read_u32_be()? != 0 {
                return Err(TxnError::UnsupportedAccountType);
            }
            let destination = c.read_array()?;
            if c.read_u32_be()? != 0 {
                return Err(TxnError::UnsupportedAsset);
            }
            let amount = c.read_u64_be()?;
            Ok(Operation::Payment {
                destination,
                amount,
            })
        }
        _ => Err(TxnError::UnsupportedOperation),
    }
}

/// Decode a transaction envelope, never reading past `bytes.len()`
pub fn decode(bytes: &[u8]) -> Result<DecodedTxn, TxnError> {
    let mut c = Cursor::new(bytes);

    if c.read_u32_be()? != ENVELOPE_TYPE_TX {
        return Err(TxnError::UnsupportedEnvelopeType);
    }

    if c.read_u32_be()? != 0 {
        return Err(TxnError::UnsupportedAccountType);
    }
    let source_account = c.read_array()?;

    let fee = c.read_u32_be()?;
    let sequence_number = c.read_u64_be()?;

    let time_bounds = match c.read_u32_be()? {
        0 => None,
        1 => {
            let min = c.read_u64_be()?;
            let max = c.read_u64_be()?;
            Some((min, max))
        }
        _ => return Err(TxnError::UnsupportedPreconditions),
    };

    let memo = read_memo(&mut c)?;
    let operation = read_operation(&mut c)?;

    // transaction extension closes the signature-relevant prefix
    if c.read_u32_be()? != 0 {
        return Err(TxnError::UnsupportedExtension);
    }
    let tagged_txn_len = c.offset();

    Ok(DecodedTxn {
        source_account,
        fee,
        sequence_number,
        time_bounds,
        memo,
        operation,
        tagged_txn_len,
    })
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Build a canonical payment envelope (test / host-side helper)
    pub fn build_payment_txn(
        source: [u8; 32],
        destination: [u8; 32],
        amount: u64,
        fee: u32,
        sequence: u64,
        memo: &Memo,
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&source);
        out.extend_from_slice(&fee.to_be_bytes());
        out.extend_from_slice(&sequence.to_be_bytes());
        // time bounds [0, 0]
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&0u64.to_be_bytes());

        match memo {
            Memo::None => out.extend_from_slice(&0u32.to_be_bytes()),
            Memo::Text(t) => {
                out.extend_from_slice(&1u32.to_be_bytes());
                out.extend_from_slice(&(t.len() as u32).to_be_bytes());
                out.extend_from_slice(t.as_bytes());
                out.resize(out.len() + (t.len().div_ceil(4) * 4 - t.len()), 0);
            }
            Memo::Id(id) => {
                out.extend_from_slice(&2u32.to_be_bytes());
                out.extend_from_slice(&id.to_be_bytes());
            }
            Memo::Hash(h) => {
                out.extend_from_slice(&3u32.to_be_bytes());
                out.extend_from_slice(h);
            }
            Memo::Return(h) => {
                out.extend_from_slice(&4u32.to_be_bytes());
                out.extend_from_slice(h);
            }
        }

        // one payment operation, no per-op source account
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&destination);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&amount.to_be_bytes());

        // extension
        out.extend_from_slice(&0u32.to_be_bytes());
        out
    }

    #[test]
    fn decode_payment_round_trip() {
        let source = [0x10u8; 32];
        let dest = [0x20u8; 32];
        let bytes = build_payment_txn(source, dest, 50_000_000, 100, 12345, &Memo::None);

        let tx = decode(&bytes).unwrap();
        assert_eq!(tx.source_account, source);
        assert_eq!(tx.fee, 100);
        assert_eq!(tx.sequence_number, 12345);
        assert_eq!(tx.time_bounds, Some((0, 0)));
        assert_eq!(tx.memo, Memo::None);
        assert_eq!(tx.operation.destination(), &dest);
        assert_eq!(tx.operation.amount(), 50_000_000);
        // the whole buffer is signature-relevant here
        assert_eq!(tx.tagged_txn_len, bytes.len());
    }

    #[test]
    fn decode_memo_variants() {
        let m = Memo::Text("hello".to_string());
        let bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &m);
        assert_eq!(decode(&bytes).unwrap().memo, m);

        let m = Memo::Id(0xdead_beef);
        let bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &m);
        assert_eq!(decode(&bytes).unwrap().memo, m);

        let m = Memo::Hash([9u8; 32]);
        let bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &m);
        assert_eq!(decode(&bytes).unwrap().memo, m);
    }

    #[test]
    fn rejects_wrong_envelope_type() {
        let mut bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &Memo::None);
        bytes[3] = 3;
        assert_eq!(
            decode(&bytes).unwrap_err(),
            TxnError::UnsupportedEnvelopeType
        );
    }

    #[test]
    fn rejects_non_native_asset() {
        let mut bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &Memo::None);
        // asset type tag sits 12 bytes from the end (asset + amount + ext)
        let off = bytes.len() - 16;
        bytes[off + 3] = 1;
        assert_eq!(decode(&bytes).unwrap_err(), TxnError::UnsupportedAsset);
    }

    #[test]
    fn rejects_multi_operation() {
        let mut bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &Memo::None);
        // operation count is the first u32 after the memo tag; locate it by
        // rebuilding: header(4)+acct(4+32)+fee(4)+seq(8)+precond(4+16)+memo(4)
        let off = 4 + 36 + 4 + 8 + 20 + 4;
        bytes[off + 3] = 2;
        assert_eq!(
            decode(&bytes).unwrap_err(),
            TxnError::UnsupportedOperationCount
        );
    }

    #[test]
    fn rejects_oversized_memo_text() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(&1u64.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&64u32.to_be_bytes());
        bytes.extend_from_slice(&[b'a'; 64]);

        assert_eq!(decode(&bytes).unwrap_err(), TxnError::MemoTooLong);
    }

    #[test]
    fn truncation_never_panics() {
        let bytes = build_payment_txn([1; 32], [2; 32], 7, 100, 1, &Memo::Text("hi".into()));
        for len in 0..bytes.len() {
            let _ = decode(&bytes[..len]);
        }
        assert!(decode(&bytes).is_ok());
    }
}

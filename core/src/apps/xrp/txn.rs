// Copyright (c) 2022-2023 The MobileCoin Foundation

//! XRP binary-format transaction decoding.
//!
//! Walks the XRPL canonical field encoding after the 4-byte network
//! prefix: each field carries a 1-3 byte field id (type and field codes),
//! then a type-specific payload. Only the fields of a plain XRP `Payment`
//! are recognised; unknown type or field codes are hard rejects.

use crate::cursor::{Cursor, DecodeError};

/// Network prefix bytes preceding the field stream ("STX\0" for signing)
pub const NETWORK_PREFIX_LEN: usize = 4;

/// `Payment` transaction type
pub const PAYMENT_TXN_TYPE: u16 = 0;

/// Account id length
pub const ACCOUNT_ID_LEN: usize = 20;

/// Compressed signing key length
pub const SIGNING_PUB_KEY_LEN: usize = 33;

// field type codes
const TYPE_INT16: u8 = 1;
const TYPE_INT32: u8 = 2;
const TYPE_AMOUNT: u8 = 6;
const TYPE_BLOB: u8 = 7;
const TYPE_ACCOUNT: u8 = 8;

// field codes within each type
const FIELD_TRANSACTION_TYPE: u8 = 2;
const FIELD_FLAGS: u8 = 2;
const FIELD_SEQUENCE: u8 = 4;
const FIELD_DESTINATION_TAG: u8 = 14;
const FIELD_LAST_LEDGER_SEQUENCE: u8 = 27;
const FIELD_AMOUNT: u8 = 1;
const FIELD_FEE: u8 = 8;
const FIELD_SIGNING_PUB_KEY: u8 = 3;
const FIELD_ACCOUNT: u8 = 1;
const FIELD_DESTINATION: u8 = 3;

/// Decode / validation failures, host-coded via [`TxnError::code`]
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum TxnError {
    #[error("structure exceeds the buffer")]
    ReadSizeMismatch,
    #[error("unknown field type code")]
    UnknownFieldType,
    #[error("unknown field code")]
    UnknownFieldCode,
    #[error("token currency amounts not supported")]
    TokenAmountUnsupported,
    #[error("invalid field length")]
    InvalidLength,
    #[error("required field missing")]
    MissingField,
    #[error("transaction type not Payment")]
    UnsupportedTransactionType,
}

impl TxnError {
    /// Stable numeric code reported to the host
    pub fn code(&self) -> u32 {
        match self {
            TxnError::ReadSizeMismatch => 1,
            TxnError::UnknownFieldType => 2,
            TxnError::UnknownFieldCode => 3,
            TxnError::TokenAmountUnsupported => 4,
            TxnError::InvalidLength => 5,
            TxnError::MissingField => 6,
            TxnError::UnsupportedTransactionType => 7,
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

/// Decoded unsigned payment
#[derive(Clone, PartialEq, Debug, Default)]
pub struct UnsignedTxn {
    pub transaction_type: u16,
    pub flags: u32,
    pub sequence: u32,
    pub destination_tag: Option<u32>,
    pub last_ledger_sequence: u32,
    pub amount: Option<u64>,
    pub fee: u64,
    pub signing_pub_key: Option<[u8; SIGNING_PUB_KEY_LEN]>,
    pub account: Option<[u8; ACCOUNT_ID_LEN]>,
    pub destination: Option<[u8; ACCOUNT_ID_LEN]>,
}

/// XRPL length prefix: 1-3 bytes depending on the first byte's range
fn read_length(c: &mut Cursor) -> Result<usize, TxnError> {
    let byte1 = c.read_u8()? as usize;
    if byte1 <= 192 {
        Ok(byte1)
    } else if byte1 <= 240 {
        let byte2 = c.read_u8()? as usize;
        Ok(193 + (byte1 - 193) * 256 + byte2)
    } else if byte1 <= 254 {
        let byte2 = c.read_u8()? as usize;
        let byte3 = c.read_u8()? as usize;
        Ok(12481 + (byte1 - 241) * 65536 + byte2 * 256 + byte3)
    } else {
        Err(TxnError::InvalidLength)
    }
}

/// Field id: type and field codes packed into 1-3 bytes
fn read_field_id(c: &mut Cursor) -> Result<(u8, u8), TxnError> {
    let first = c.read_u8()?;
    let high = first >> 4;
    let low = first & 0x0f;

    match (high, low) {
        (0, 0) => {
            let type_code = c.read_u8()?;
            let field_code = c.read_u8()?;
            Ok((type_code, field_code))
        }
        (0, field) => Ok((c.read_u8()?, field)),
        (type_code, 0) => Ok((type_code, c.read_u8()?)),
        (type_code, field) => Ok((type_code, field)),
    }
}

fn read_amount(c: &mut Cursor) -> Result<u64, TxnError> {
    let raw = c.read_u64_be()?;
    if raw >> 63 != 0 {
        // high bit marks a token currency amount
        return Err(TxnError::TokenAmountUnsupported);
    }
    Ok(raw & 0xafff_ffff_ffff_ffff)
}

/// Decode a raw transaction buffer (network prefix included)
pub fn decode(bytes: &[u8]) -> Result<UnsignedTxn, TxnError> {
    let mut c = Cursor::new(bytes);
    c.skip(NETWORK_PREFIX_LEN)?;

    let mut txn = UnsignedTxn::default();

    while !c.is_empty() {
        let (type_code, field_code) = read_field_id(&mut c)?;

        match type_code {
            TYPE_INT16 => {
                let value = c.read_u16_be()?;
                match field_code {
                    FIELD_TRANSACTION_TYPE => txn.transaction_type = value,
                    _ => return Err(TxnError::UnknownFieldCode),
                }
            }
            TYPE_INT32 => {
                let value = c.read_u32_be()?;
                match field_code {
                    FIELD_FLAGS => txn.flags = value,
                    FIELD_SEQUENCE => txn.sequence = value,
                    FIELD_DESTINATION_TAG => txn.destination_tag = Some(value),
                    FIELD_LAST_LEDGER_SEQUENCE => txn.last_ledger_sequence = value,
                    _ => return Err(TxnError::UnknownFieldCode),
                }
            }
            TYPE_AMOUNT => {
                let value = read_amount(&mut c)?;
                match field_code {
                    FIELD_AMOUNT => txn.amount = Some(value),
                    FIELD_FEE => txn.fee = value,
                    _ => return Err(TxnError::UnknownFieldCode),
                }
            }
            TYPE_BLOB => {
                let len = read_length(&mut c)?;
                let data = c.read_bytes(len)?;
                match field_code {
                    FIELD_SIGNING_PUB_KEY => {
                        if len != SIGNING_PUB_KEY_LEN {
                            return Err(TxnError::InvalidLength);
                        }
                        let mut key = [0u8; SIGNING_PUB_KEY_LEN];
                        key.copy_from_slice(data);
                        txn.signing_pub_key = Some(key);
                    }
                    _ => return Err(TxnError::UnknownFieldCode),
                }
            }
            TYPE_ACCOUNT => {
                let len = read_length(&mut c)?;
                let data = c.read_bytes(len)?;
                if len != ACCOUNT_ID_LEN {
                    return Err(TxnError::InvalidLength);
                }
                let mut id = [0u8; ACCOUNT_ID_LEN];
                id.copy_from_slice(data);
                match field_code {
                    FIELD_ACCOUNT => txn.account = Some(id),
                    FIELD_DESTINATION => txn.destination = Some(id),
                    _ => return Err(TxnError::UnknownFieldCode),
                }
            }
            _ => return Err(TxnError::UnknownFieldType),
        }
    }

    Ok(txn)
}

/// Whitelist validation: plain payments only, with the display fields
/// present
pub fn validate(txn: &UnsignedTxn) -> Result<(), TxnError> {
    if txn.transaction_type != PAYMENT_TXN_TYPE {
        return Err(TxnError::UnsupportedTransactionType);
    }
    if txn.destination.is_none() || txn.amount.is_none() || txn.account.is_none() {
        return Err(TxnError::MissingField);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Serialize a canonical payment (test / host-side helper)
    pub fn build_payment_txn(
        account: [u8; 20],
        destination: [u8; 20],
        amount: u64,
        fee: u64,
        destination_tag: Option<u32>,
    ) -> Vec<u8> {
        let mut out = vec![0x53, 0x54, 0x58, 0x00]; // "STX\0" signing prefix

        // TransactionType = Payment
        out.push((TYPE_INT16 << 4) | FIELD_TRANSACTION_TYPE);
        out.extend_from_slice(&PAYMENT_TXN_TYPE.to_be_bytes());

        // Sequence
        out.push((TYPE_INT32 << 4) | FIELD_SEQUENCE);
        out.extend_from_slice(&7u32.to_be_bytes());

        if let Some(tag) = destination_tag {
            out.push((TYPE_INT32 << 4) | FIELD_DESTINATION_TAG);
            out.extend_from_slice(&tag.to_be_bytes());
        }

        // LastLedgerSequence (field code 27 needs the split encoding)
        out.push(TYPE_INT32 << 4);
        out.push(FIELD_LAST_LEDGER_SEQUENCE);
        out.extend_from_slice(&90_000_000u32.to_be_bytes());

        // Amount, positive-XRP bit set
        out.push((TYPE_AMOUNT << 4) | FIELD_AMOUNT);
        out.extend_from_slice(&(amount | 0x4000_0000_0000_0000).to_be_bytes());

        // Fee
        out.push((TYPE_AMOUNT << 4) | FIELD_FEE);
        out.extend_from_slice(&(fee | 0x4000_0000_0000_0000).to_be_bytes());

        // SigningPubKey
        out.push((TYPE_BLOB << 4) | FIELD_SIGNING_PUB_KEY);
        out.push(SIGNING_PUB_KEY_LEN as u8);
        out.extend_from_slice(&[0x02; SIGNING_PUB_KEY_LEN]);

        // Account + Destination
        out.push((TYPE_ACCOUNT << 4) | FIELD_ACCOUNT);
        out.push(ACCOUNT_ID_LEN as u8);
        out.extend_from_slice(&account);
        out.push((TYPE_ACCOUNT << 4) | FIELD_DESTINATION);
        out.push(ACCOUNT_ID_LEN as u8);
        out.extend_from_slice(&destination);

        out
    }

    #[test]
    fn decode_payment_round_trip() {
        let account = [0x0au8; 20];
        let destination = [0x0bu8; 20];
        let bytes = build_payment_txn(account, destination, 1_500_000, 12, Some(99));

        let txn = decode(&bytes).unwrap();
        validate(&txn).unwrap();

        assert_eq!(txn.transaction_type, PAYMENT_TXN_TYPE);
        assert_eq!(txn.sequence, 7);
        assert_eq!(txn.destination_tag, Some(99));
        assert_eq!(txn.last_ledger_sequence, 90_000_000);
        assert_eq!(txn.amount, Some(1_500_000));
        assert_eq!(txn.fee, 12);
        assert_eq!(txn.account, Some(account));
        assert_eq!(txn.destination, Some(destination));
    }

    #[test]
    fn amount_strips_positive_bit() {
        let bytes = build_payment_txn([1; 20], [2; 20], 42, 10, None);
        let txn = decode(&bytes).unwrap();
        assert_eq!(txn.amount, Some(42));
        assert_eq!(txn.fee, 10);
    }

    #[test]
    fn rejects_token_amount() {
        let mut bytes = build_payment_txn([1; 20], [2; 20], 42, 10, None);
        // set the not-XRP bit on the Amount field; it follows the
        // LastLedgerSequence block in build order
        let amount_off = 4 + 3 + 5 + 6 + 1;
        assert_eq!(bytes[amount_off - 1], (TYPE_AMOUNT << 4) | FIELD_AMOUNT);
        bytes[amount_off] |= 0x80;
        assert_eq!(
            decode(&bytes).unwrap_err(),
            TxnError::TokenAmountUnsupported
        );
    }

    #[test]
    fn rejects_unknown_field() {
        // field id type 3 (unsupported) at the start of the stream
        let bytes = [0x53, 0x54, 0x58, 0x00, 0x31, 0x00, 0x00];
        assert_eq!(decode(&bytes).unwrap_err(), TxnError::UnknownFieldType);
    }

    #[test]
    fn rejects_non_payment() {
        let mut bytes = build_payment_txn([1; 20], [2; 20], 42, 10, None);
        // TransactionType value bytes directly follow the prefix + field id
        bytes[6] = 3;
        let txn = decode(&bytes).unwrap();
        assert_eq!(
            validate(&txn).unwrap_err(),
            TxnError::UnsupportedTransactionType
        );
    }

    #[test]
    fn validate_requires_display_fields() {
        let txn = UnsignedTxn::default();
        assert_eq!(validate(&txn).unwrap_err(), TxnError::MissingField);
    }

    #[test]
    fn truncation_never_panics() {
        let bytes = build_payment_txn([1; 20], [2; 20], 42, 10, Some(7));
        for len in 0..bytes.len() {
            let _ = decode(&bytes[..len]);
        }
        assert!(decode(&bytes).is_ok());
    }
}

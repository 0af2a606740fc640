// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana unsigned-transaction decoding and whitelist validation.
//!
//! The wire format is the legacy message encoding: a 3-byte header, a
//! compact-array of 32-byte account addresses, a 32-byte recent blockhash,
//! then a compact-array of instructions. Only System-Program `Transfer`,
//! Token-Program `TransferChecked` and the two ComputeBudget fee
//! instructions are interpreted; everything else decodes structurally and
//! is rejected by [`validate`]: a closed-world policy that prevents
//! blind-signing unknown instruction semantics.

use crate::cursor::{Cursor, DecodeError};

/// Account address length
pub const ACCOUNT_ADDRESS_LENGTH: usize = 32;

/// Blockhash length
pub const BLOCKHASH_LENGTH: usize = 32;

/// Maximum instructions per message: compute unit limit, compute unit
/// price, and one transfer (plus one spare for account creation)
pub const MAX_INSTRUCTIONS: usize = 4;

/// System program id (all zeroes)
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// Token program id ("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA")
pub const TOKEN_PROGRAM_ID: [u8; 32] = [
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79,
    0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff,
    0x00, 0xa9,
];

/// Compute budget program id ("ComputeBudget111111111111111111111111111111")
pub const COMPUTE_BUDGET_PROGRAM_ID: [u8; 32] = [
    0x03, 0x06, 0x46, 0x6f, 0xe5, 0x21, 0x17, 0x32, 0xff, 0xec, 0xad, 0xba, 0x72, 0xc3, 0x9b,
    0xe7, 0xbc, 0x8c, 0xe5, 0xbb, 0xc5, 0xf7, 0x12, 0x6b, 0x2c, 0x43, 0x9b, 0x3a, 0x40, 0x00,
    0x00, 0x00,
];

/// System-Program `Transfer` discriminant (little-endian u32 in the
/// instruction data)
pub const SYSTEM_TRANSFER: u32 = 2;

/// Token-Program `TransferChecked` discriminant (single byte)
pub const TOKEN_TRANSFER_CHECKED: u8 = 12;

/// ComputeBudget `SetComputeUnitLimit` discriminant
pub const SET_COMPUTE_UNIT_LIMIT: u8 = 2;

/// ComputeBudget `SetComputeUnitPrice` discriminant
pub const SET_COMPUTE_UNIT_PRICE: u8 = 3;

/// Decode / validation failures, host-coded via [`TxnError::code`]
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum TxnError {
    #[error("structure shorter than required")]
    MinLength,
    #[error("compact-u16 overflow")]
    CompactU16Overflow,
    #[error("declared sizes exceed the buffer")]
    ReadSizeMismatch,
    #[error("unsupported program id")]
    UnsupportedProgram,
    #[error("unsupported instruction for a known program")]
    UnsupportedInstruction,
    #[error("too many instructions")]
    UnsupportedInstructionCount,
    #[error("account index out of range")]
    IndexOutOfRange,
    #[error("no transfer instruction present")]
    MissingTransfer,
    #[error("more than one transfer instruction")]
    DuplicateTransfer,
}

impl TxnError {
    /// Stable numeric code reported to the host
    pub fn code(&self) -> u32 {
        match self {
            TxnError::MissingTransfer | TxnError::DuplicateTransfer => 1,
            TxnError::MinLength => 2,
            TxnError::CompactU16Overflow => 3,
            TxnError::ReadSizeMismatch => 4,
            TxnError::UnsupportedProgram => 5,
            TxnError::UnsupportedInstruction => 6,
            TxnError::UnsupportedInstructionCount => 7,
            TxnError::IndexOutOfRange => 8,
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

/// Read a compact-u16: little-endian base-128 varint capped at 3 bytes.
///
/// A value needing a fourth continuation byte, or exceeding `u16::MAX`,
/// is an overflow error, never silently truncated.
pub fn read_compact_u16(c: &mut Cursor) -> Result<u16, TxnError> {
    let mut value: u32 = 0;

    for i in 0..3 {
        let byte = c.read_u8()?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            if value > u16::MAX as u32 {
                return Err(TxnError::CompactU16Overflow);
            }
            return Ok(value as u16);
        }
    }

    Err(TxnError::CompactU16Overflow)
}

/// Encode a compact-u16 (host-side / test helper)
pub fn encode_compact_u16(mut value: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            return out;
        }
    }
}

/// System-Program `Transfer` fields
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TransferData {
    pub funding_account: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub recipient_account: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub lamports: u64,
}

/// Token-Program `TransferChecked` fields
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TransferCheckedData {
    pub source: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub token_mint: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub destination: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub owner: [u8; ACCOUNT_ADDRESS_LENGTH],
    pub amount: u64,
    pub decimals: u8,
}

/// Interpreted instruction payloads; `Other` decodes structurally and is
/// rejected at validation
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum InstructionKind {
    Transfer(TransferData),
    TransferChecked(TransferCheckedData),
    ComputeUnitLimit(u32),
    ComputeUnitPrice(u64),
    Other,
}

/// One decoded instruction
#[derive(Clone, PartialEq, Debug)]
pub struct Instruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
    pub kind: InstructionKind,
}

/// Decoded unsigned message: a validated copy of the fields needed for
/// display and signing. Produced once, read-only afterwards.
#[derive(Clone, PartialEq, Debug)]
pub struct UnsignedMessage {
    pub required_signatures_count: u8,
    pub read_only_signed_count: u8,
    pub read_only_unsigned_count: u8,

    pub account_addresses: Vec<[u8; ACCOUNT_ADDRESS_LENGTH]>,

    pub blockhash: [u8; BLOCKHASH_LENGTH],
    /// Byte offset of the blockhash within the raw buffer, used for the
    /// pre-signing substitution
    pub blockhash_offset: usize,

    pub instructions: Vec<Instruction>,

    /// ComputeBudget extension values (zero when absent)
    pub compute_unit_limit: u32,
    pub compute_unit_price_micro_lamports: u64,
}

impl UnsignedMessage {
    /// The single whitelisted transfer instruction, if present
    pub fn transfer(&self) -> Option<&InstructionKind> {
        self.instructions.iter().find_map(|i| match &i.kind {
            k @ (InstructionKind::Transfer(_) | InstructionKind::TransferChecked(_)) => Some(k),
            _ => None,
        })
    }

    /// Priority fee in micro-lamports: 128-bit product of the compute-unit
    /// price and limit
    pub fn priority_fee_micro_lamports(&self) -> u128 {
        self.compute_unit_price_micro_lamports as u128 * self.compute_unit_limit as u128
    }
}

fn account_at(
    addresses: &[[u8; ACCOUNT_ADDRESS_LENGTH]],
    index: u8,
) -> Result<[u8; ACCOUNT_ADDRESS_LENGTH], TxnError> {
    addresses
        .get(index as usize)
        .copied()
        .ok_or(TxnError::IndexOutOfRange)
}

fn classify(
    addresses: &[[u8; ACCOUNT_ADDRESS_LENGTH]],
    program_id_index: u8,
    account_indices: &[u8],
    data: &[u8],
) -> Result<InstructionKind, TxnError> {
    let program_id = match addresses.get(program_id_index as usize) {
        Some(p) => p,
        // range-checked again at validation, structural decode continues
        None => return Ok(InstructionKind::Other),
    };

    if *program_id == SYSTEM_PROGRAM_ID {
        if account_indices.is_empty() || data.is_empty() {
            return Err(TxnError::MinLength);
        }
        if data.len() >= 12 {
            let mut c = Cursor::new(data);
            let discriminant = c.read_u32_le()?;
            if discriminant == SYSTEM_TRANSFER {
                let lamports = c.read_u64_le()?;
                if account_indices.len() < 2 {
                    return Err(TxnError::MinLength);
                }
                return Ok(InstructionKind::Transfer(TransferData {
                    funding_account: account_at(addresses, account_indices[0])?,
                    recipient_account: account_at(addresses, account_indices[1])?,
                    lamports,
                }));
            }
        }
        Ok(InstructionKind::Other)
    } else if *program_id == TOKEN_PROGRAM_ID {
        if account_indices.is_empty() || data.is_empty() {
            return Err(TxnError::MinLength);
        }
        if data[0] == TOKEN_TRANSFER_CHECKED && data.len() >= 10 {
            let mut c = Cursor::new(&data[1..]);
            let amount = c.read_u64_le()?;
            let decimals = c.read_u8()?;
            if account_indices.len() < 4 {
                return Err(TxnError::MinLength);
            }
            return Ok(InstructionKind::TransferChecked(TransferCheckedData {
                source: account_at(addresses, account_indices[0])?,
                token_mint: account_at(addresses, account_indices[1])?,
                destination: account_at(addresses, account_indices[2])?,
                owner: account_at(addresses, account_indices[3])?,
                amount,
                decimals,
            }));
        }
        Ok(InstructionKind::Other)
    } else if *program_id == COMPUTE_BUDGET_PROGRAM_ID {
        if data.is_empty() {
            return Err(TxnError::MinLength);
        }
        match data[0] {
            SET_COMPUTE_UNIT_LIMIT if data.len() >= 5 => {
                let units = Cursor::new(&data[1..]).read_u32_le()?;
                Ok(InstructionKind::ComputeUnitLimit(units))
            }
            SET_COMPUTE_UNIT_PRICE if data.len() >= 9 => {
                let micro_lamports = Cursor::new(&data[1..]).read_u64_le()?;
                Ok(InstructionKind::ComputeUnitPrice(micro_lamports))
            }
            _ => Ok(InstructionKind::Other),
        }
    } else {
        Ok(InstructionKind::Other)
    }
}

/// Decode a raw unsigned transaction buffer.
///
/// Never reads past `bytes.len()`; trailing bytes after the last
/// instruction are tolerated (the full declared buffer is what gets
/// signed either way).
pub fn decode(bytes: &[u8]) -> Result<UnsignedMessage, TxnError> {
    let mut c = Cursor::new(bytes);

    let required_signatures_count = c.read_u8()?;
    let read_only_signed_count = c.read_u8()?;
    let read_only_unsigned_count = c.read_u8()?;

    let address_count = read_compact_u16(&mut c)?;
    if address_count == 0 {
        return Err(TxnError::MinLength);
    }

    let mut account_addresses = Vec::with_capacity(address_count as usize);
    for _ in 0..address_count {
        account_addresses.push(c.read_array::<ACCOUNT_ADDRESS_LENGTH>()?);
    }

    let blockhash_offset = c.offset();
    let blockhash = c.read_array::<BLOCKHASH_LENGTH>()?;

    let instruction_count = read_compact_u16(&mut c)?;
    if instruction_count == 0 {
        return Err(TxnError::MinLength);
    }
    if instruction_count as usize > MAX_INSTRUCTIONS {
        return Err(TxnError::UnsupportedInstructionCount);
    }

    let mut compute_unit_limit = 0u32;
    let mut compute_unit_price = 0u64;

    let mut instructions = Vec::with_capacity(instruction_count as usize);
    for _ in 0..instruction_count {
        let program_id_index = c.read_u8()?;

        let index_count = read_compact_u16(&mut c)?;
        let account_indices = c.read_bytes(index_count as usize)?.to_vec();

        let data_len = read_compact_u16(&mut c)?;
        let data = c.read_bytes(data_len as usize)?.to_vec();

        let kind = classify(&account_addresses, program_id_index, &account_indices, &data)?;

        match kind {
            InstructionKind::ComputeUnitLimit(units) => compute_unit_limit = units,
            InstructionKind::ComputeUnitPrice(p) => compute_unit_price = p,
            _ => (),
        }

        instructions.push(Instruction {
            program_id_index,
            account_indices,
            data,
            kind,
        });
    }

    Ok(UnsignedMessage {
        required_signatures_count,
        read_only_signed_count,
        read_only_unsigned_count,
        account_addresses,
        blockhash,
        blockhash_offset,
        instructions,
        compute_unit_limit,
        compute_unit_price_micro_lamports: compute_unit_price,
    })
}

/// Whitelist validation over a decoded message.
///
/// Anything not explicitly recognised is rejected, never passed through;
/// extending the supported set requires touching both [`decode`]'s
/// classifier and this function.
pub fn validate(msg: &UnsignedMessage) -> Result<(), TxnError> {
    if msg.instructions.len() > MAX_INSTRUCTIONS {
        return Err(TxnError::UnsupportedInstructionCount);
    }

    let mut transfer_found = false;

    for ins in &msg.instructions {
        let idx = ins.program_id_index as usize;
        // index zero is the fee payer, never a program
        if idx == 0 || idx >= msg.account_addresses.len() {
            return Err(TxnError::IndexOutOfRange);
        }

        let program_id = &msg.account_addresses[idx];

        if *program_id == SYSTEM_PROGRAM_ID {
            match ins.kind {
                InstructionKind::Transfer(_) => {
                    if transfer_found {
                        return Err(TxnError::DuplicateTransfer);
                    }
                    transfer_found = true;
                }
                _ => return Err(TxnError::UnsupportedInstruction),
            }
        } else if *program_id == TOKEN_PROGRAM_ID {
            match ins.kind {
                InstructionKind::TransferChecked(_) => {
                    if transfer_found {
                        return Err(TxnError::DuplicateTransfer);
                    }
                    transfer_found = true;
                }
                _ => return Err(TxnError::UnsupportedInstruction),
            }
        } else if *program_id == COMPUTE_BUDGET_PROGRAM_ID {
            match ins.kind {
                InstructionKind::ComputeUnitLimit(_) | InstructionKind::ComputeUnitPrice(_) => (),
                _ => return Err(TxnError::UnsupportedInstruction),
            }
        } else {
            return Err(TxnError::UnsupportedProgram);
        }
    }

    if !transfer_found {
        return Err(TxnError::MissingTransfer);
    }

    Ok(())
}

/// Substitute the latest blockhash into the raw transaction bytes before
/// signing
pub fn update_blockhash(
    transaction: &mut [u8],
    blockhash_offset: usize,
    blockhash: &[u8; BLOCKHASH_LENGTH],
) -> Result<(), TxnError> {
    let end = blockhash_offset
        .checked_add(BLOCKHASH_LENGTH)
        .ok_or(TxnError::ReadSizeMismatch)?;
    if end > transaction.len() {
        return Err(TxnError::ReadSizeMismatch);
    }
    transaction[blockhash_offset..end].copy_from_slice(blockhash);
    Ok(())
}

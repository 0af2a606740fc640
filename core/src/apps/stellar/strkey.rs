// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Stellar strkey account-id encoding (SEP-0023 subset).
//!
//! `G...` addresses: version byte `0x30` (account id, ED25519), the raw
//! public key, then a little-endian CRC16-XModem checksum, base32-encoded
//! without padding.

/// Strkey version byte for an ED25519 account id (6 << 3)
const VERSION_ACCOUNT_ID: u8 = 0x30;

/// Encoded address length
pub const ADDRESS_LENGTH: usize = 56;

/// CRC16-XModem over `data` (polynomial 0x1021, zero initial value)
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode a raw 32-byte public key as a `G...` account address
pub fn encode_account_id(public_key: &[u8; 32]) -> String {
    let mut payload = [0u8; 35];
    payload[0] = VERSION_ACCOUNT_ID;
    payload[1..33].copy_from_slice(public_key);

    let checksum = crc16_xmodem(&payload[..33]);
    payload[33] = (checksum & 0xff) as u8;
    payload[34] = (checksum >> 8) as u8;

    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &payload)
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! XRP classic address encoding.
//!
//! Addresses are base58check over `0x00 ‖ account-id` using the ripple
//! alphabet; the account id itself is RIPEMD160(SHA256(pubkey)).

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use super::txn::ACCOUNT_ID_LEN;

/// Account-id type prefix for classic addresses
const TYPE_PREFIX_ACCOUNT_ID: u8 = 0x00;

/// Derive the 20-byte account id for a compressed public key
pub fn account_id(public_key: &[u8]) -> [u8; ACCOUNT_ID_LEN] {
    let sha = Sha256::digest(public_key);
    let ripe = Ripemd160::digest(sha);

    let mut out = [0u8; ACCOUNT_ID_LEN];
    out.copy_from_slice(&ripe);
    out
}

/// Encode an account id as a classic `r...` address
pub fn classic_address(account_id: &[u8; ACCOUNT_ID_LEN]) -> String {
    let mut payload = [0u8; ACCOUNT_ID_LEN + 1];
    payload[0] = TYPE_PREFIX_ACCOUNT_ID;
    payload[1..].copy_from_slice(account_id);

    bs58::encode(&payload)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check()
        .into_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn account_zero_address() {
        // the well-known ACCOUNT_ZERO special address
        assert_eq!(
            classic_address(&[0u8; ACCOUNT_ID_LEN]),
            "rrrrrrrrrrrrrrrrrrrrrhoLvTp"
        );
    }

    #[test]
    fn addresses_start_with_r() {
        let id = account_id(&[0x02u8; 33]);
        let addr = classic_address(&id);
        assert!(addr.starts_with('r'), "address: {addr}");
        assert!(addr.len() >= 25 && addr.len() <= 35);
    }

    #[test]
    fn account_id_is_hash160() {
        let key = [0x03u8; 33];
        let expected: [u8; 20] = {
            let sha = Sha256::digest(key);
            Ripemd160::digest(sha).into()
        };
        assert_eq!(account_id(&key), expected);
    }
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Starknet key derivation: BIP32 intermediate key plus grinding.
//!
//! The account path is the Ethereum-compatible
//! `m/2645'/1195502025'/1148870696'/0'/0'/i`; the secp256k1 scalar derived
//! there is ground into the Stark curve's scalar field: SHA-256 over
//! `seed ‖ counter` for counters 0..200, taking the first digest below the
//! fixed limit, reduced modulo the curve order. Exhausting all 200
//! counters is astronomically unlikely but surfaces as a distinct fatal
//! error, never a silent retry.

use lazy_static::lazy_static;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::curve::{public_key_x, scalar_to_be32, STARK_CURVE};
use crate::derive::{derive_secp256k1, harden, is_non_hardened, Seed};
use crate::error::Error;

/// `m/2645'`
pub const PURPOSE_INDEX: u32 = harden(2645);
/// `m/2645'/1195502025'` (layer)
pub const LAYER_INDEX: u32 = harden(1195502025);
/// `m/2645'/1195502025'/1148870696'` (application)
pub const APPLICATION_INDEX: u32 = harden(1148870696);
/// Fixed hardened levels 4 and 5
pub const ETH_1_INDEX: u32 = harden(0);
pub const ETH_2_INDEX: u32 = harden(0);

/// Grinding attempts before the fatal bail-out
pub const GRIND_ITERATIONS: u8 = 200;

lazy_static! {
    /// Rejection-sampling limit: the largest multiple of the curve order
    /// below 2^256, keeping the reduction unbiased
    static ref GRIND_LIMIT: BigUint = BigUint::parse_bytes(
        b"f80000000000020efffffffffffffff738a13b4b920e9411ae6da5f40b0358b1",
        16
    )
    .expect("grind limit constant");
}

/// Accepted account paths: exactly
/// `m/2645'/1195502025'/1148870696'/0'/0'/i` with a non-hardened address
pub fn derivation_path_guard(path: &[u32]) -> bool {
    match path {
        [purpose, layer, application, eth_1, eth_2, address] => {
            *purpose == PURPOSE_INDEX
                && *layer == LAYER_INDEX
                && *application == APPLICATION_INDEX
                && *eth_1 == ETH_1_INDEX
                && *eth_2 == ETH_2_INDEX
                && is_non_hardened(*address)
        }
        _ => false,
    }
}

/// Grind a 32-byte seed into a valid Stark private scalar.
///
/// Single canonical implementation, shared by the signing and public-key
/// flows.
pub fn grind_key(grind_seed: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, Error> {
    for counter in 0..GRIND_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(grind_seed);
        hasher.update([counter]);
        let digest = hasher.finalize();

        let candidate = BigUint::from_bytes_be(&digest);
        if candidate < *GRIND_LIMIT {
            let key = candidate % &STARK_CURVE.order;
            return Ok(Zeroizing::new(scalar_to_be32(&key)));
        }
    }

    log::error!("key grinding failed after {GRIND_ITERATIONS} iterations");
    Err(Error::KeyDerivation(0))
}

/// Derive the Stark key pair for a validated path.
///
/// Returns the ground private scalar (zeroized on drop) and the public
/// key's x coordinate.
pub fn derive_key_from_seed(
    seed: &Seed,
    path: &[u32],
) -> Result<(Zeroizing<[u8; 32]>, [u8; 32]), Error> {
    let xprv = derive_secp256k1(seed, path)?;
    let grind_seed: Zeroizing<[u8; 32]> =
        Zeroizing::new(xprv.private_key().to_bytes().into());
    drop(xprv);

    let private = grind_key(&grind_seed)?;
    let public = public_key_x(&private);

    Ok((private, public))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::derive::SEED_SIZE;

    #[test]
    fn path_guard() {
        assert!(derivation_path_guard(&[
            PURPOSE_INDEX,
            LAYER_INDEX,
            APPLICATION_INDEX,
            ETH_1_INDEX,
            ETH_2_INDEX,
            0
        ]));
        assert!(derivation_path_guard(&[
            PURPOSE_INDEX,
            LAYER_INDEX,
            APPLICATION_INDEX,
            ETH_1_INDEX,
            ETH_2_INDEX,
            5
        ]));

        // hardened address index
        assert!(!derivation_path_guard(&[
            PURPOSE_INDEX,
            LAYER_INDEX,
            APPLICATION_INDEX,
            ETH_1_INDEX,
            ETH_2_INDEX,
            harden(0)
        ]));
        // wrong application
        assert!(!derivation_path_guard(&[
            PURPOSE_INDEX,
            LAYER_INDEX,
            harden(7),
            ETH_1_INDEX,
            ETH_2_INDEX,
            0
        ]));
        // bad depth
        assert!(!derivation_path_guard(&[PURPOSE_INDEX, LAYER_INDEX]));
    }

    #[test]
    fn grind_is_deterministic_and_in_range() {
        let seed = [0x5au8; 32];
        let a = grind_key(&seed).unwrap();
        let b = grind_key(&seed).unwrap();
        assert_eq!(*a, *b);

        let value = BigUint::from_bytes_be(&*a);
        assert!(value < STARK_CURVE.order);
        assert!(!a.iter().all(|&b| b == 0));

        // different seeds grind to different keys
        let c = grind_key(&[0x5bu8; 32]).unwrap();
        assert_ne!(*a, *c);
    }

    #[test]
    fn derive_produces_valid_public_key() {
        use super::super::curve::{public_point, STARK_CURVE};

        let seed = Seed::from_bytes([0x21u8; SEED_SIZE]);
        let path = [
            PURPOSE_INDEX,
            LAYER_INDEX,
            APPLICATION_INDEX,
            ETH_1_INDEX,
            ETH_2_INDEX,
            0,
        ];

        let (private, public) = derive_key_from_seed(&seed, &path).unwrap();

        // the public point lies on the curve and matches the private key
        let point = public_point(&private);
        assert!(STARK_CURVE.contains(&point));
        assert_eq!(public, scalar_to_be32(&point.x));

        // deterministic
        let (private2, public2) = derive_key_from_seed(&seed, &path).unwrap();
        assert_eq!(*private, *private2);
        assert_eq!(public, public2);

        // sibling index derives a different key
        let sibling = [
            PURPOSE_INDEX,
            LAYER_INDEX,
            APPLICATION_INDEX,
            ETH_1_INDEX,
            ETH_2_INDEX,
            1,
        ];
        let (private3, _) = derive_key_from_seed(&seed, &sibling).unwrap();
        assert_ne!(*private, *private3);
    }
}

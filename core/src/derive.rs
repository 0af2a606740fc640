// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Derivation paths, the reconstructed seed, and key derivation helpers.
//!
//! Paths are validated once by the owning app's guard before any key
//! material touches them and never mutated afterwards. The [`Seed`] is the
//! 64-byte BIP39 output of the wallet reconstruction flow; it is owned by
//! exactly one signing session and zeroized on drop.

use core::fmt;
use core::ops::Deref;

use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::Error;
use vault_apps_proto::MAX_PATH_DEPTH;

/// Hardened-index bit (BIP32 bit 31)
pub const HARDENED: u32 = 0x8000_0000;

/// Reconstructed seed length
pub const SEED_SIZE: usize = 64;

/// True when `index` has the hardened bit set
pub fn is_hardened(index: u32) -> bool {
    index & HARDENED != 0
}

/// True when `index` does not have the hardened bit set
pub fn is_non_hardened(index: u32) -> bool {
    !is_hardened(index)
}

/// Set the hardened bit on `index`
pub const fn harden(index: u32) -> u32 {
    index | HARDENED
}

/// Validated, bounded-depth derivation path
#[derive(Clone, PartialEq, Eq)]
pub struct DerivationPath(heapless::Vec<u32, MAX_PATH_DEPTH>);

impl DerivationPath {
    /// Build a path from raw host-supplied indices, rejecting over-depth
    /// paths before any chain guard runs
    pub fn from_slice(path: &[u32]) -> Result<Self, Error> {
        if path.is_empty() {
            return Err(Error::InvalidPath);
        }
        heapless::Vec::from_slice(path)
            .map(Self)
            .map_err(|_| Error::InvalidPath)
    }
}

impl Deref for DerivationPath {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Debug for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for &i in self.0.iter() {
            if is_hardened(i) {
                write!(f, "/{}'", i & !HARDENED)?;
            } else {
                write!(f, "/{i}")?;
            }
        }
        Ok(())
    }
}

/// 64-byte seed reconstructed from the wallet's card shares.
///
/// Zeroized on drop; cloned only when handing ownership to a session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never log seed material
        write!(f, "Seed(..)")
    }
}

/// SLIP-0010 ED25519 derivation (Solana, Stellar).
///
/// Every step is hardened per SLIP-0010; the returned scalar is the raw
/// 32-byte private key, zeroized on drop.
pub fn derive_ed25519(seed: &Seed, path: &[u32]) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(slip10_ed25519::derive_ed25519_private_key(
        seed.as_bytes(),
        path,
    ))
}

/// Raw 32-byte ED25519 public key for a derived private scalar
pub fn ed25519_public_key(private: &[u8; 32]) -> [u8; 32] {
    let signing = SigningKey::from_bytes(private);
    signing.verifying_key().to_bytes()
}

/// BIP32 secp256k1 derivation (XRP, Starknet's intermediate key).
///
/// Mixed hardened / non-hardened steps per the path; failures collapse to a
/// derivation error with the caller's sub-code applied at the call site.
pub fn derive_secp256k1(seed: &Seed, path: &[u32]) -> Result<bip32::XPrv, Error> {
    let mut repr = String::from("m");
    for &i in path {
        if is_hardened(i) {
            repr.push_str(&format!("/{}'", i & !HARDENED));
        } else {
            repr.push_str(&format!("/{i}"));
        }
    }

    let path: bip32::DerivationPath = repr.parse().map_err(|_| Error::KeyDerivation(1))?;

    bip32::XPrv::derive_from_path(seed.as_bytes(), &path).map_err(|_| Error::KeyDerivation(1))
}

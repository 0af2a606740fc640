// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Field elements of the Starknet prime field (p = 2^251 + 17·2^192 + 1).
//!
//! A felt is stored as 4×64-bit little-endian limbs; the canonical
//! big-endian 32-byte representation converts to and from limbs via four
//! chunked 8-byte reads. Arithmetic reduces through [`num_bigint`].

use byteorder::{BigEndian, ByteOrder};
use lazy_static::lazy_static;
use num_bigint::BigUint;

/// Canonical encoded size
pub const FELT_SIZE: usize = 32;

lazy_static! {
    /// Field modulus, 2^251 + 17·2^192 + 1
    pub static ref FIELD_PRIME: BigUint = BigUint::parse_bytes(
        b"0800000000000011000000000000000000000000000000000000000000000001",
        16
    )
    .expect("field prime constant");
}

/// One element of the Starknet field, 4×u64 little-endian limbs
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Felt(pub [u64; 4]);

impl Felt {
    pub const ZERO: Felt = Felt([0; 4]);
    pub const ONE: Felt = Felt([1, 0, 0, 0]);

    pub fn from_u64(value: u64) -> Felt {
        Felt([value, 0, 0, 0])
    }

    /// Big-endian bytes (at most 32, left-padded) to felt
    pub fn from_be_bytes(bytes: &[u8]) -> Felt {
        let mut buf = [0u8; FELT_SIZE];
        let n = bytes.len().min(FELT_SIZE);
        buf[FELT_SIZE - n..].copy_from_slice(&bytes[bytes.len() - n..]);

        let mut limbs = [0u64; 4];
        for i in 0..4 {
            limbs[3 - i] = BigEndian::read_u64(&buf[i * 8..i * 8 + 8]);
        }
        Felt(limbs)
    }

    /// Felt to canonical big-endian 32 bytes
    pub fn to_be_bytes(&self) -> [u8; FELT_SIZE] {
        let mut out = [0u8; FELT_SIZE];
        for i in 0..4 {
            BigEndian::write_u64(&mut out[i * 8..i * 8 + 8], self.0[3 - i]);
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    pub(crate) fn to_biguint(self) -> BigUint {
        BigUint::from_bytes_be(&self.to_be_bytes())
    }

    /// Reduce an arbitrary-width value into the field
    pub(crate) fn from_biguint_reduced(value: BigUint) -> Felt {
        let reduced = value % &*FIELD_PRIME;
        let bytes = reduced.to_bytes_be();
        Felt::from_be_bytes(&bytes)
    }

    /// Modular addition
    pub fn add(&self, rhs: &Felt) -> Felt {
        Felt::from_biguint_reduced(self.to_biguint() + rhs.to_biguint())
    }

    /// Modular subtraction
    pub fn sub(&self, rhs: &Felt) -> Felt {
        let p = &*FIELD_PRIME;
        Felt::from_biguint_reduced(self.to_biguint() + p - rhs.to_biguint() % p)
    }

    /// Modular multiplication
    pub fn mul(&self, rhs: &Felt) -> Felt {
        Felt::from_biguint_reduced(self.to_biguint() * rhs.to_biguint())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_round_trip() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        // keep below the modulus
        bytes[0] = 0x01;

        let f = Felt::from_be_bytes(&bytes);
        assert_eq!(f.to_be_bytes(), bytes);
    }

    #[test]
    fn short_input_left_pads() {
        let f = Felt::from_be_bytes(&[0xab, 0xcd]);
        assert_eq!(f.0, [0xabcd, 0, 0, 0]);
        let mut expected = [0u8; 32];
        expected[30] = 0xab;
        expected[31] = 0xcd;
        assert_eq!(f.to_be_bytes(), expected);
    }

    #[test]
    fn limb_order_little_endian() {
        // value 2^64 occupies the second limb
        let mut bytes = [0u8; 32];
        bytes[23] = 1;
        let f = Felt::from_be_bytes(&bytes);
        assert_eq!(f.0, [0, 1, 0, 0]);
    }

    #[test]
    fn arithmetic_mod_p() {
        let one = Felt::ONE;
        let two = one.add(&one);
        assert_eq!(two.0, [2, 0, 0, 0]);

        // p - 1 + 2 wraps to 1
        let p_minus_1 = Felt::from_biguint_reduced(&*FIELD_PRIME - 1u32);
        assert_eq!(p_minus_1.add(&two), one);

        // 0 - 1 = p - 1
        assert_eq!(Felt::ZERO.sub(&one), p_minus_1);

        // multiplication reduces
        let big = Felt::from_biguint_reduced(&*FIELD_PRIME - 2u32);
        let sq = big.mul(&big);
        // (p-2)^2 = p^2 - 4p + 4 ≡ 4 (mod p)
        assert_eq!(sq.0, [4, 0, 0, 0]);
    }

    #[test]
    fn reduction_of_oversized_values() {
        let v = &*FIELD_PRIME + 7u32;
        assert_eq!(Felt::from_biguint_reduced(v).0, [7, 0, 0, 0]);
    }
}

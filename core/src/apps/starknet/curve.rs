// Copyright (c) 2022-2023 The MobileCoin Foundation

//! The Stark curve and its deterministic ECDSA signer.
//!
//! Curve: y² = x³ + x + b over the Starknet field. Nonces come from an
//! RFC6979 HMAC-SHA256 DRBG with the historical 4-bit right shift applied
//! to each candidate `k`; a random blinding multiplier decorrelates the
//! modular inversion from the nonce. `s` is canonicalised to the lower
//! half-order. Nonce-retry exhaustion is a fatal signing error, never an
//! endless loop.

use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::Error;

/// Signature component length
pub const SCALAR_SIZE: usize = 32;

/// Nonce candidates tried before giving up
const MAX_SIGN_RETRIES: usize = 10_000;

type HmacSha256 = Hmac<Sha256>;

lazy_static! {
    /// Curve parameters, parsed once
    pub static ref STARK_CURVE: StarkCurve = StarkCurve::new();
}

/// Affine point; (0, 0) encodes the point at infinity
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CurvePoint {
    pub x: BigUint,
    pub y: BigUint,
}

impl CurvePoint {
    pub fn infinity() -> Self {
        Self {
            x: BigUint::zero(),
            y: BigUint::zero(),
        }
    }

    pub fn is_infinity(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }
}

/// Stark curve domain parameters
pub struct StarkCurve {
    pub prime: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    pub order: BigUint,
    pub order_half: BigUint,
    pub g: CurvePoint,
}

fn parse_hex(s: &[u8]) -> BigUint {
    BigUint::parse_bytes(s, 16).expect("curve constant")
}

impl StarkCurve {
    fn new() -> Self {
        Self {
            prime: parse_hex(
                b"0800000000000011000000000000000000000000000000000000000000000001",
            ),
            a: BigUint::one(),
            b: parse_hex(
                b"06f21413efbe40de150e596d72f7a8c5609ad26c15c915c1f4cdfcb99cee9e89",
            ),
            order: parse_hex(
                b"0800000000000010ffffffffffffffffb781126dcae7b2321e66a241adc64d2f",
            ),
            order_half: parse_hex(
                b"04000000000000087fffffffffffffffdbc08936e573d9190f335120d6e32697",
            ),
            g: CurvePoint {
                x: parse_hex(
                    b"01ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca",
                ),
                y: parse_hex(
                    b"005668060aa49730b7be4801df46ec62de53ecd11abe43a32873000c36e8dc1f",
                ),
            },
        }
    }

    fn mod_sub(&self, a: &BigUint, b: &BigUint) -> BigUint {
        ((a % &self.prime) + &self.prime - (b % &self.prime)) % &self.prime
    }

    /// Modular inverse in the field (prime modulus, Fermat)
    fn field_inverse(&self, a: &BigUint) -> BigUint {
        a.modpow(&(&self.prime - 2u32), &self.prime)
    }

    /// Point doubling, tangent rule
    pub fn point_double(&self, p: &CurvePoint) -> CurvePoint {
        if p.is_infinity() || p.y.is_zero() {
            return CurvePoint::infinity();
        }

        // lambda = (3x^2 + a) / 2y
        let num = ((&p.x * &p.x) * 3u32 + &self.a) % &self.prime;
        let den = self.field_inverse(&((&p.y * 2u32) % &self.prime));
        let lambda = (num * den) % &self.prime;

        let xr = self.mod_sub(&((&lambda * &lambda) % &self.prime), &(&p.x * 2u32));
        let yr = self.mod_sub(&(&lambda * self.mod_sub(&p.x, &xr) % &self.prime), &p.y);

        CurvePoint { x: xr, y: yr }
    }

    /// Point addition, chord rule
    pub fn point_add(&self, p: &CurvePoint, q: &CurvePoint) -> CurvePoint {
        if p.is_infinity() {
            return q.clone();
        }
        if q.is_infinity() {
            return p.clone();
        }
        if p.x == q.x {
            if (&p.y + &q.y) % &self.prime == BigUint::zero() {
                return CurvePoint::infinity();
            }
            return self.point_double(p);
        }

        let lambda =
            (self.mod_sub(&q.y, &p.y) * self.field_inverse(&self.mod_sub(&q.x, &p.x)))
                % &self.prime;

        let xr = self.mod_sub(
            &self.mod_sub(&((&lambda * &lambda) % &self.prime), &p.x),
            &q.x,
        );
        let yr = self.mod_sub(&(&lambda * self.mod_sub(&p.x, &xr) % &self.prime), &p.y);

        CurvePoint { x: xr, y: yr }
    }

    /// Scalar multiplication, least-significant-bit double-and-add
    pub fn point_multiply(&self, k: &BigUint, p: &CurvePoint) -> CurvePoint {
        let mut result = CurvePoint::infinity();
        let mut addend = p.clone();

        for i in 0..k.bits() {
            if k.bit(i) {
                result = self.point_add(&addend, &result);
            }
            addend = self.point_double(&addend);
        }

        result
    }

    /// True when `p` satisfies the curve equation
    pub fn contains(&self, p: &CurvePoint) -> bool {
        if p.is_infinity() {
            return false;
        }
        let lhs = (&p.y * &p.y) % &self.prime;
        let rhs = ((&p.x * &p.x * &p.x) + (&self.a * &p.x) + &self.b) % &self.prime;
        lhs == rhs
    }
}

/// RFC6979 HMAC-SHA256 deterministic-nonce generator
struct Rfc6979 {
    k: [u8; 32],
    v: [u8; 32],
}

fn hmac_sha256(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    for p in parts {
        mac.update(p);
    }
    mac.finalize().into_bytes().into()
}

impl Rfc6979 {
    fn new(private_key: &[u8; 32], digest: &[u8; 32]) -> Self {
        let mut k = [0u8; 32];
        let mut v = [1u8; 32];

        k = hmac_sha256(&k, &[&v, &[0x00], private_key, digest]);
        v = hmac_sha256(&k, &[&v]);
        k = hmac_sha256(&k, &[&v, &[0x01], private_key, digest]);
        v = hmac_sha256(&k, &[&v]);

        Self { k, v }
    }

    /// Produce the next candidate nonce bytes
    fn next(&mut self) -> [u8; 32] {
        self.v = hmac_sha256(&self.k, &[&self.v]);
        let out = self.v;

        // re-key for the following candidate
        self.k = hmac_sha256(&self.k, &[&self.v, &[0x00]]);
        self.v = hmac_sha256(&self.k, &[&self.v]);

        out
    }
}

impl Drop for Rfc6979 {
    fn drop(&mut self) {
        self.k.zeroize();
        self.v.zeroize();
    }
}

/// Left-pad a scalar to 32 big-endian bytes
pub(crate) fn scalar_to_be32(value: &BigUint) -> [u8; SCALAR_SIZE] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; SCALAR_SIZE];
    out[SCALAR_SIZE - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Uniform nonzero scalar below `n`, for the blinding multiplier
fn random_scalar(rng: &mut impl CryptoRngCore, n: &BigUint) -> BigUint {
    loop {
        let mut bytes = [0u8; SCALAR_SIZE];
        rng.fill_bytes(&mut bytes);
        let candidate = BigUint::from_bytes_be(&bytes);
        bytes.zeroize();
        if !candidate.is_zero() && candidate < *n {
            return candidate;
        }
    }
}

/// Public point for a private scalar
pub fn public_point(private_key: &[u8; SCALAR_SIZE]) -> CurvePoint {
    let curve = &*STARK_CURVE;
    let k = BigUint::from_bytes_be(private_key);
    curve.point_multiply(&k, &curve.g)
}

/// X coordinate of the public point, the Starknet public-key encoding
pub fn public_key_x(private_key: &[u8; SCALAR_SIZE]) -> [u8; SCALAR_SIZE] {
    scalar_to_be32(&public_point(private_key).x)
}

/// Sign a 32-byte digest, returning `r ‖ s` (64 bytes).
///
/// Each RFC6979 candidate is shifted right by four bits before the range
/// check; candidates producing zero or out-of-range `k`, `r` or `s` are
/// skipped. Exhausting the retry budget fails the session.
pub fn sign_digest(
    private_key: &[u8; SCALAR_SIZE],
    digest: &[u8; SCALAR_SIZE],
    rng: &mut impl CryptoRngCore,
) -> Result<[u8; 64], Error> {
    let curve = &*STARK_CURVE;
    let n = &curve.order;

    let x = BigUint::from_bytes_be(private_key);
    let z = BigUint::from_bytes_be(digest);

    let mut drbg = Rfc6979::new(private_key, digest);

    for _ in 0..MAX_SIGN_RETRIES {
        let mut candidate = drbg.next();
        let k = BigUint::from_bytes_be(&candidate) >> 4u32;
        candidate.zeroize();

        if k.is_zero() || k >= *n {
            continue;
        }

        let r_point = curve.point_multiply(&k, &curve.g);
        let r = &r_point.x % n;
        if r.is_zero() {
            continue;
        }

        // blind the inversion against side-channel observation
        let blind = random_scalar(rng, n);
        let k_blinded = (&k * &blind) % n;
        let k_inv = k_blinded.modpow(&(n - 2u32), n);

        let mut s = (&x * &r + &z) % n;
        s = (s * k_inv) % n;
        s = (s * blind) % n;
        if s.is_zero() {
            continue;
        }

        if s > curve.order_half {
            s = n - s;
        }

        let mut out = [0u8; 64];
        out[..SCALAR_SIZE].copy_from_slice(&scalar_to_be32(&r));
        out[SCALAR_SIZE..].copy_from_slice(&scalar_to_be32(&s));
        return Ok(out);
    }

    log::error!("stark signing exhausted nonce retries");
    Err(Error::SignError(2))
}

/// ECDSA verification over the Stark curve
pub fn verify_digest(
    public: &CurvePoint,
    digest: &[u8; SCALAR_SIZE],
    signature: &[u8; 64],
) -> bool {
    let curve = &*STARK_CURVE;
    let n = &curve.order;

    let r = BigUint::from_bytes_be(&signature[..SCALAR_SIZE]);
    let s = BigUint::from_bytes_be(&signature[SCALAR_SIZE..]);
    if r.is_zero() || s.is_zero() || r >= *n || s >= *n {
        return false;
    }

    let z = BigUint::from_bytes_be(digest);
    let w = s.modpow(&(n - 2u32), n);
    let u1 = (&z * &w) % n;
    let u2 = (&r * &w) % n;

    let p1 = curve.point_multiply(&u1, &curve.g);
    let p2 = curve.point_multiply(&u2, public);
    let rp = curve.point_add(&p1, &p2);

    !rp.is_infinity() && (&rp.x % n) == r
}

#[cfg(test)]
mod test {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn generator_is_on_curve() {
        let curve = &*STARK_CURVE;
        assert!(curve.contains(&curve.g));
    }

    #[test]
    fn point_arithmetic_consistency() {
        let curve = &*STARK_CURVE;

        // 2G computed both ways
        let double = curve.point_double(&curve.g);
        let added = curve.point_add(&curve.g, &curve.g);
        assert_eq!(double, added);
        assert!(curve.contains(&double));

        // 3G = 2G + G = G * 3
        let triple = curve.point_add(&double, &curve.g);
        let by_scalar = curve.point_multiply(&BigUint::from(3u32), &curve.g);
        assert_eq!(triple, by_scalar);

        // n * G = infinity
        let at_order = curve.point_multiply(&curve.order, &curve.g);
        assert!(at_order.is_infinity());
    }

    #[test]
    fn sign_verify_round_trip() {
        let private = [0x41u8; 32];
        let digest = [0x07u8; 32];

        let sig = sign_digest(&private, &digest, &mut OsRng).unwrap();
        let public = public_point(&private);

        assert!(verify_digest(&public, &digest, &sig));

        // wrong digest fails
        let other = [0x08u8; 32];
        assert!(!verify_digest(&public, &other, &sig));

        // wrong key fails
        let wrong = public_point(&[0x42u8; 32]);
        assert!(!verify_digest(&wrong, &digest, &sig));
    }

    #[test]
    fn signatures_are_deterministic_in_r() {
        // the blinding multiplier must not affect the signature value
        let private = [0x11u8; 32];
        let digest = [0x22u8; 32];

        let a = sign_digest(&private, &digest, &mut OsRng).unwrap();
        let b = sign_digest(&private, &digest, &mut OsRng).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn s_is_canonical() {
        let curve = &*STARK_CURVE;
        for seed in 1u8..=8 {
            let private = [seed; 32];
            let digest = [seed.wrapping_mul(3); 32];
            let sig = sign_digest(&private, &digest, &mut OsRng).unwrap();
            let s = BigUint::from_bytes_be(&sig[32..]);
            assert!(s <= curve.order_half, "non-canonical s for seed {seed}");
        }
    }

    #[test]
    fn rfc6979_stream_is_deterministic() {
        let mut a = Rfc6979::new(&[1u8; 32], &[2u8; 32]);
        let mut b = Rfc6979::new(&[1u8; 32], &[2u8; 32]);
        assert_eq!(a.next(), b.next());
        assert_eq!(a.next(), b.next());

        let mut c = Rfc6979::new(&[1u8; 32], &[3u8; 32]);
        assert_ne!(a.next(), c.next());
    }
}

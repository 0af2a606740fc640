// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Poseidon hash over the Starknet field (Hades permutation, width 3).
//!
//! The sponge absorbs two felts per permutation; inputs are padded with a
//! single one-felt then zeros to a multiple of the rate. Round constants
//! are the canonical "nothing up my sleeve" values: `sha256("Hades" ‖ i)`
//! reduced into the field, three per round; the mix layer is the fixed
//! matrix `[[3, 1, 1], [1, -1, 1], [1, 1, -2]]`.

use lazy_static::lazy_static;
use num_bigint::BigUint;
use sha2::{Digest, Sha256};

use super::felt::Felt;

/// Sponge width
pub const STATE_WIDTH: usize = 3;

/// Sponge rate (absorbed felts per permutation)
pub const RATE: usize = 2;

/// Full rounds (half applied before, half after the partial rounds)
const FULL_ROUNDS: usize = 8;

/// Partial rounds
const PARTIAL_ROUNDS: usize = 83;

const ROUNDS: usize = FULL_ROUNDS + PARTIAL_ROUNDS;

lazy_static! {
    /// Per-round constants, generated once
    static ref ROUND_CONSTANTS: Vec<[Felt; STATE_WIDTH]> = generate_round_constants();
}

fn generate_round_constant(index: usize) -> Felt {
    let digest = Sha256::digest(format!("Hades{index}").as_bytes());
    Felt::from_biguint_reduced(BigUint::from_bytes_be(&digest))
}

fn generate_round_constants() -> Vec<[Felt; STATE_WIDTH]> {
    (0..ROUNDS)
        .map(|round| {
            [
                generate_round_constant(STATE_WIDTH * round),
                generate_round_constant(STATE_WIDTH * round + 1),
                generate_round_constant(STATE_WIDTH * round + 2),
            ]
        })
        .collect()
}

fn cube(x: &Felt) -> Felt {
    x.mul(x).mul(x)
}

/// MDS mix: t = s0 + s1 + s2; (t + 2·s0, t − 2·s1, t − 3·s2)
fn mix(state: &mut [Felt; STATE_WIDTH]) {
    let t = state[0].add(&state[1]).add(&state[2]);
    let s0 = t.add(&state[0].add(&state[0]));
    let s1 = t.sub(&state[1].add(&state[1]));
    let s2 = t.sub(&state[2].add(&state[2]).add(&state[2]));
    *state = [s0, s1, s2];
}

/// The Hades permutation over a width-3 state
pub fn permutation_3(state: &mut [Felt; STATE_WIDTH]) {
    for (round, constants) in ROUND_CONSTANTS.iter().enumerate() {
        for (lane, rc) in state.iter_mut().zip(constants.iter()) {
            *lane = lane.add(rc);
        }

        let full = round < FULL_ROUNDS / 2 || round >= FULL_ROUNDS / 2 + PARTIAL_ROUNDS;
        if full {
            for lane in state.iter_mut() {
                *lane = cube(lane);
            }
        } else {
            state[STATE_WIDTH - 1] = cube(&state[STATE_WIDTH - 1]);
        }

        mix(state);
    }
}

/// Hash a sequence of felts, order-sensitive.
///
/// Pads with one `1` felt then zeros to a multiple of the rate, absorbs
/// two felts at a time, and truncates to the first lane.
pub fn poseidon_hash_many(input: &[Felt]) -> Felt {
    let mut padded = input.to_vec();
    padded.push(Felt::ONE);
    while padded.len() % RATE != 0 {
        padded.push(Felt::ZERO);
    }

    let mut state = [Felt::ZERO; STATE_WIDTH];
    for pair in padded.chunks(RATE) {
        state[0] = state[0].add(&pair[0]);
        state[1] = state[1].add(&pair[1]);
        permutation_3(&mut state);
    }

    state[0]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_constants_are_stable() {
        // derivation is deterministic and in-field
        let a = generate_round_constant(0);
        let b = generate_round_constant(0);
        assert_eq!(a, b);
        assert_ne!(a, generate_round_constant(1));
        assert_eq!(ROUND_CONSTANTS.len(), ROUNDS);
    }

    #[test]
    fn hash_is_deterministic() {
        let input = [Felt::from_u64(1), Felt::from_u64(2), Felt::from_u64(3)];
        assert_eq!(poseidon_hash_many(&input), poseidon_hash_many(&input));
    }

    #[test]
    fn hash_is_order_sensitive() {
        let a = [Felt::from_u64(1), Felt::from_u64(2)];
        let b = [Felt::from_u64(2), Felt::from_u64(1)];
        assert_ne!(poseidon_hash_many(&a), poseidon_hash_many(&b));
    }

    #[test]
    fn padding_distinguishes_lengths() {
        // an explicit trailing zero must hash differently from its absence
        let a = [Felt::from_u64(5)];
        let b = [Felt::from_u64(5), Felt::ZERO];
        assert_ne!(poseidon_hash_many(&a), poseidon_hash_many(&b));

        // and the empty input is well-defined
        let empty = poseidon_hash_many(&[]);
        assert_ne!(empty, poseidon_hash_many(&[Felt::ZERO]));
    }

    #[test]
    fn permutation_changes_state() {
        let mut state = [Felt::ZERO; STATE_WIDTH];
        permutation_3(&mut state);
        assert_ne!(state, [Felt::ZERO; STATE_WIDTH]);

        // deterministic
        let mut again = [Felt::ZERO; STATE_WIDTH];
        permutation_3(&mut again);
        assert_eq!(state, again);
    }
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Shared test driver for engine walks.

#![allow(dead_code)]

use vault_apps_core::derive::{Seed, SEED_SIZE};
use vault_apps_core::driver::Driver;
use vault_apps_proto::WalletId;

/// Wallet id the driver recognises
pub const WALLET_ID: WalletId = [7u8; 32];

/// Wallet id the driver reports as unknown
pub const UNKNOWN_WALLET_ID: WalletId = [0xffu8; 32];

/// Fixed seed from the firmware regression vectors
pub const TEST_SEED_HEX: &str = "0090ed0e7eccc22e9d60396e3debb38c\
                                 95128186493bb4d67750d7b2babf99fc\
                                 c9ca81fd0ae7719982611a0a28cf46b2\
                                 db1309c81f62be189bd2d1e5d06cd6fe";

/// Driver implementation for test use
pub struct TestDriver {
    pub seed: [u8; SEED_SIZE],
    pub reconstructions: usize,
}

impl TestDriver {
    /// Driver seeded with the regression-vector seed
    pub fn new() -> Self {
        let mut seed = [0u8; SEED_SIZE];
        let hex_str: String = TEST_SEED_HEX.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode_to_slice(&hex_str, &mut seed).expect("test seed");
        Self {
            seed,
            reconstructions: 0,
        }
    }

    pub fn seed(&self) -> Seed {
        Seed::from_bytes(self.seed)
    }
}

impl Driver for TestDriver {
    fn reconstruct_seed(&mut self, wallet_id: &WalletId) -> Option<Seed> {
        if *wallet_id == UNKNOWN_WALLET_ID {
            return None;
        }
        self.reconstructions += 1;
        Some(Seed::from_bytes(self.seed))
    }

    fn wallet_name(&self, wallet_id: &WalletId) -> Option<String> {
        if *wallet_id == UNKNOWN_WALLET_ID {
            return None;
        }
        Some("ada".to_string())
    }
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host protocol definitions for the vault coin apps.
//!
//! This crate models the *decoded* request / response exchange between the
//! host companion app and the per-chain signing engines in
//! `vault-apps-core`. The USB framing and the length-prefixed protobuf wire
//! encoding live in the transport layer and are not reproduced here; what
//! the engines consume are the tagged unions below, one request enum and one
//! response enum per chain app, plus the shared chunk-payload and error-code
//! types.
//!
//! Each multi-message flow (`sign_txn`, `get_public_keys`) is expressed as a
//! sum type whose variants correspond one-to-one with the protocol's
//! `which_request` discriminants, so an engine matching on an unexpected
//! variant is exactly the original firmware's tag-mismatch protocol error.

pub mod chunk;
pub mod error;

pub mod exchange;
pub mod solana;
pub mod starknet;
pub mod stellar;
pub mod xrp;

/// Length of a wallet identifier (SHA-256 of the wallet's card share set)
pub const WALLET_ID_SIZE: usize = 32;

/// Wallet identifier, opaque to the coin apps
pub type WalletId = [u8; WALLET_ID_SIZE];

/// Maximum derivation path depth accepted over the wire
pub const MAX_PATH_DEPTH: usize = 6;

/// Applet identifiers, used by the exchange flow to sequence coin apps
pub mod applet {
    pub const EXCHANGE: u32 = 24;
    pub const SOLANA: u32 = 14;
    pub const STARKNET: u32 = 21;
    pub const STELLAR: u32 = 22;
    pub const XRP: u32 = 16;
}

/// Common `get_public_keys` / `get_user_verified_public_key` initiate
/// request: one wallet, one or more derivation paths.
#[derive(Clone, PartialEq, Debug)]
pub struct GetPublicKeysInitiate {
    pub wallet_id: WalletId,
    pub derivation_paths: Vec<Vec<u32>>,
}

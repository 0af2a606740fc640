// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Starknet app protocol objects.
//!
//! Unlike the chains with opaque transaction buffers, a Starknet unsigned
//! transaction arrives as one structured request (the host already splits
//! it into felt-sized fields); the engine hashes it with Poseidon and signs
//! on the Stark curve.

use crate::{GetPublicKeysInitiate, WalletId};

/// Size of a Starknet big number / felt encoding
pub const BIGNUM_SIZE: usize = 32;

/// Stark-curve signature length (r ‖ s)
pub const SIGNATURE_SIZE: usize = 64;

/// Maximum calldata felts carried per transaction
pub const MAX_CALLDATA: usize = 10;

/// Top-level Starknet query
#[derive(Clone, PartialEq, Debug)]
pub enum StarknetRequest {
    GetPublicKeys(GetPublicKeysInitiate),
    GetUserVerifiedPublicKey(GetPublicKeysInitiate),
    SignTxn(SignTxnRequest),
}

/// `sign_txn` request steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnRequest {
    Initiate(SignTxnInitiate),
    Txn(UnsignedTxn),
    Signature,
}

/// `sign_txn` initiate snapshot
#[derive(Clone, PartialEq, Debug)]
pub struct SignTxnInitiate {
    pub wallet_id: WalletId,
    pub derivation_path: Vec<u32>,
}

/// Unsigned transaction union (`which_type` discriminant)
#[derive(Clone, PartialEq, Debug)]
pub enum UnsignedTxn {
    Invoke(InvokeTxn),
    DeployAccount(DeployAccountTxn),
}

/// V3 resource bound for one gas level
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ResourceBound {
    /// Big-endian max gas amount, up to 8 bytes
    pub max_amount: Vec<u8>,
    /// Big-endian max price per unit, up to 16 bytes
    pub max_price_per_unit: Vec<u8>,
}

/// L1/L2 resource bounds of a V3 transaction
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ResourceBounds {
    pub level_1: ResourceBound,
    pub level_2: ResourceBound,
}

/// V3 invoke transaction fields
#[derive(Clone, PartialEq, Debug)]
pub struct InvokeTxn {
    pub sender_address: [u8; BIGNUM_SIZE],
    pub version: u8,
    /// Big-endian chain id, up to 32 bytes
    pub chain_id: Vec<u8>,
    /// Big-endian nonce, up to 32 bytes
    pub nonce: Vec<u8>,
    pub tip: u8,
    pub resource_bounds: ResourceBounds,
    pub nonce_data_availability_mode: u8,
    pub fee_data_availability_mode: u8,
    /// Calldata felts, big-endian, each up to 32 bytes
    pub calldata: Vec<Vec<u8>>,
}

/// V3 deploy-account transaction fields
#[derive(Clone, PartialEq, Debug)]
pub struct DeployAccountTxn {
    pub contract_address: [u8; BIGNUM_SIZE],
    pub class_hash: [u8; BIGNUM_SIZE],
    pub salt: [u8; BIGNUM_SIZE],
    pub version: u8,
    pub chain_id: Vec<u8>,
    pub nonce: Vec<u8>,
    pub tip: u8,
    pub resource_bounds: ResourceBounds,
    pub nonce_data_availability_mode: u8,
    pub fee_data_availability_mode: u8,
    pub constructor_call_data: Vec<Vec<u8>>,
}

/// Top-level Starknet response
#[derive(Clone, PartialEq, Debug)]
pub enum StarknetResponse {
    PublicKeys(Vec<[u8; BIGNUM_SIZE]>),
    SignTxn(SignTxnResponse),
}

/// `sign_txn` response steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnResponse {
    Confirmation,
    UnsignedTxnAccepted,
    Signature([u8; SIGNATURE_SIZE]),
}

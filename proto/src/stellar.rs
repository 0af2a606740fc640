// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Stellar app protocol objects.

use crate::{
    chunk::{ChunkAck, ChunkPayload},
    GetPublicKeysInitiate, WalletId,
};

/// Stellar raw public key length
pub const PUB_KEY_SIZE: usize = 32;

/// ED25519 signature length
pub const SIGNATURE_SIZE: usize = 64;

/// Top-level Stellar query
#[derive(Clone, PartialEq, Debug)]
pub enum StellarRequest {
    GetPublicKeys(GetPublicKeysInitiate),
    GetUserVerifiedPublicKey(GetPublicKeysInitiate),
    SignTxn(SignTxnRequest),
}

/// `sign_txn` request steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnRequest {
    Initiate(SignTxnInitiate),
    TxnData(ChunkPayload),
    Signature,
}

/// `sign_txn` initiate snapshot
#[derive(Clone, PartialEq, Debug)]
pub struct SignTxnInitiate {
    pub wallet_id: WalletId,
    pub derivation_path: Vec<u32>,
    pub transaction_size: u32,
}

/// Top-level Stellar response
#[derive(Clone, PartialEq, Debug)]
pub enum StellarResponse {
    PublicKeys(Vec<[u8; PUB_KEY_SIZE]>),
    SignTxn(SignTxnResponse),
}

/// `sign_txn` response steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnResponse {
    Confirmation,
    DataAccepted(ChunkAck),
    Signature([u8; SIGNATURE_SIZE]),
}

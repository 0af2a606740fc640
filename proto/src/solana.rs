// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana app protocol objects.
//!
//! Flows: `get_public_keys` / `get_user_verified_public_key` (one request,
//! batched response) and `sign_txn` (initiate → chunked transaction data →
//! verify → signature, see the engine state machine in `vault-apps-core`).

use crate::{
    chunk::{ChunkAck, ChunkPayload},
    GetPublicKeysInitiate, WalletId,
};

/// Solana raw public key length
pub const PUB_KEY_SIZE: usize = 32;

/// Solana blockhash length
pub const BLOCKHASH_SIZE: usize = 32;

/// ED25519 signature length
pub const SIGNATURE_SIZE: usize = 64;

/// Top-level Solana query
#[derive(Clone, PartialEq, Debug)]
pub enum SolanaRequest {
    /// Export public keys for a list of derivation paths
    GetPublicKeys(GetPublicKeysInitiate),
    /// Export one public key, verifying the address on-device
    GetUserVerifiedPublicKey(GetPublicKeysInitiate),
    /// Multi-step transaction signing flow
    SignTxn(SignTxnRequest),
}

/// `sign_txn` request steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnRequest {
    Initiate(SignTxnInitiate),
    TxnData(ChunkPayload),
    /// Host acknowledgement of the on-device verification, gates seed
    /// reconstruction
    Verify,
    /// Carries the latest blockhash to substitute before signing
    Signature { blockhash: [u8; BLOCKHASH_SIZE] },
}

/// `sign_txn` initiate snapshot, retained for the whole session
#[derive(Clone, PartialEq, Debug)]
pub struct SignTxnInitiate {
    pub wallet_id: WalletId,
    pub derivation_path: Vec<u32>,
    /// Declared size of the unsigned transaction, bounds the single
    /// buffer allocation
    pub transaction_size: u32,
}

/// Top-level Solana response
#[derive(Clone, PartialEq, Debug)]
pub enum SolanaResponse {
    PublicKeys(Vec<[u8; PUB_KEY_SIZE]>),
    SignTxn(SignTxnResponse),
}

/// `sign_txn` response steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnResponse {
    /// Initiate accepted, user confirmed the send
    Confirmation,
    /// One chunk consumed
    DataAccepted(ChunkAck),
    /// Seed reconstructed, ready for the signature request
    Verify,
    /// Final transaction signature
    Signature([u8; SIGNATURE_SIZE]),
}

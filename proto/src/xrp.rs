// Copyright (c) 2022-2023 The MobileCoin Foundation

//! XRP app protocol objects.

use crate::{
    chunk::{ChunkAck, ChunkPayload},
    GetPublicKeysInitiate, WalletId,
};

/// Compressed secp256k1 public key length
pub const PUB_KEY_SIZE: usize = 33;

/// Maximum DER-encoded ECDSA signature length
pub const MAX_DER_SIGNATURE_SIZE: usize = 72;

/// Top-level XRP query
#[derive(Clone, PartialEq, Debug)]
pub enum XrpRequest {
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

/// Top-level XRP response
#[derive(Clone, PartialEq, Debug)]
pub enum XrpResponse {
    PublicKeys(Vec<[u8; PUB_KEY_SIZE]>),
    SignTxn(SignTxnResponse),
}

/// `sign_txn` response steps
#[derive(Clone, PartialEq, Debug)]
pub enum SignTxnResponse {
    Confirmation,
    DataAccepted(ChunkAck),
    /// DER-encoded low-s ECDSA signature
    Signature(Vec<u8>),
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Exchange (swap) app protocol objects.
//!
//! The exchange app sequences a multi-asset swap across coin apps through
//! the composable app queue; see `vault-apps-core::apps::exchange`.

use crate::WalletId;

/// Opaque per-entry parameter block carried in the composable app queue
pub const CAQ_PARAMS_SIZE: usize = 128;

/// Session-signature length returned by `get_signature`
pub const SESSION_SIGNATURE_SIZE: usize = 64;

/// Top-level exchange query
#[derive(Clone, PartialEq, Debug)]
pub enum ExchangeRequest {
    /// Start a swap: seed the composable app queue with both legs
    InitiateFlow(InitiateFlow),
    /// Fetch the session signature over the receive address
    GetSignature,
    /// Tear down the swap flow, clearing the queue
    CloseFlow,
}

/// One leg of a swap flow
#[derive(Clone, PartialEq, Debug)]
pub struct FlowLeg {
    pub applet_id: u32,
    pub wallet_id: WalletId,
}

/// Swap initiation: funds move `from` one chain app `to` another
#[derive(Clone, PartialEq, Debug)]
pub struct InitiateFlow {
    pub from: FlowLeg,
    pub to: FlowLeg,
}

/// Top-level exchange response
#[derive(Clone, PartialEq, Debug)]
pub enum ExchangeResponse {
    FlowInitiated,
    Signature {
        signature: [u8; SESSION_SIGNATURE_SIZE],
        index: u32,
    },
    FlowClosed,
}

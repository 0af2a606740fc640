// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Exchange (swap) app: sequences a multi-asset swap across coin apps.
//!
//! `initiate_flow` seeds the composable app queue with the receive leg, the
//! exchange app's own signature bookkeeping steps, and the send leg; each
//! coin app then consumes its token when its turn comes. The send leg's
//! destination is cross-checked against the receive address recorded during
//! the receive leg, so a swap can never be redirected between legs.

pub mod queue;

pub use queue::{AppQueue, CaqEntry, FlowTag};

use vault_apps_proto::applet;
use vault_apps_proto::exchange::{
    ExchangeRequest, ExchangeResponse, InitiateFlow, SESSION_SIGNATURE_SIZE,
};
use vault_apps_proto::WalletId;

use crate::error::Error;

/// Shared swap state: the queue plus the cross-leg receive-address record.
///
/// Owned by the platform and passed by reference into each engine update;
/// cleared explicitly at flow start and close.
#[derive(Clone, Debug)]
pub struct ExchangeContext {
    pub queue: AppQueue,
    /// Receive address recorded by the receive leg, verified by the send leg
    stored_address: Option<String>,
    /// Session signature material returned by `get_signature`
    session_signature: [u8; SESSION_SIGNATURE_SIZE],
}

impl Default for ExchangeContext {
    fn default() -> Self {
        Self {
            queue: AppQueue::new(),
            stored_address: None,
            session_signature: [0u8; SESSION_SIGNATURE_SIZE],
        }
    }
}

impl ExchangeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a coin app's receive flow to record the address the swap
    /// pays out to
    pub fn store_address(&mut self, address: &str) {
        self.stored_address = Some(address.to_string());
    }

    /// Send-leg cross-check: the rendered destination must equal the
    /// recorded receive address
    pub fn validate_stored_address(&self, address: &str) -> bool {
        self.stored_address.as_deref() == Some(address)
    }

    /// Install the session signature material (set by the platform's
    /// session layer)
    pub fn set_session_signature(&mut self, signature: [u8; SESSION_SIGNATURE_SIZE]) {
        self.session_signature = signature;
    }

    /// Consume this app's send-leg token if it is next in the queue.
    ///
    /// Returns true when the token matched; the caller must then verify
    /// the destination against the stored receive address before signing.
    pub fn validate_send(&mut self, applet_id: u32, wallet_id: &WalletId) -> bool {
        let expected = CaqEntry::flow_leg(applet_id, wallet_id, FlowTag::Send);
        self.queue.validate(&expected)
    }

    /// Consume this app's receive-leg token if it is next in the queue
    pub fn validate_receive(&mut self, applet_id: u32, wallet_id: &WalletId) -> bool {
        let expected = CaqEntry::flow_leg(applet_id, wallet_id, FlowTag::Receive);
        self.queue.validate(&expected)
    }
}

/// Exchange app request handler.
///
/// Every exchange request is a single round trip, so unlike the coin apps
/// there is no session state machine here.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExchangeEngine;

impl ExchangeEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(
        &self,
        req: ExchangeRequest,
        ctx: &mut ExchangeContext,
    ) -> Result<ExchangeResponse, Error> {
        match req {
            ExchangeRequest::InitiateFlow(flow) => Ok(self.initiate_flow(flow, ctx)),

            ExchangeRequest::GetSignature => {
                // consume our own fetch-signature token when present
                let expected =
                    CaqEntry::exchange_step(applet::EXCHANGE, FlowTag::FetchSignature);
                ctx.queue.validate(&expected);

                Ok(ExchangeResponse::Signature {
                    signature: ctx.session_signature,
                    index: 0,
                })
            }

            ExchangeRequest::CloseFlow => {
                ctx.queue.clear();
                ctx.stored_address = None;
                Ok(ExchangeResponse::FlowClosed)
            }
        }
    }

    fn initiate_flow(&self, flow: InitiateFlow, ctx: &mut ExchangeContext) -> ExchangeResponse {
        // a new swap supersedes any stale flow state
        ctx.queue.clear();
        ctx.stored_address = None;

        ctx.queue.push(CaqEntry::flow_leg(
            flow.to.applet_id,
            &flow.to.wallet_id,
            FlowTag::Receive,
        ));
        ctx.queue.push(CaqEntry::exchange_step(
            applet::EXCHANGE,
            FlowTag::FetchSignature,
        ));
        ctx.queue.push(CaqEntry::exchange_step(
            applet::EXCHANGE,
            FlowTag::StoreSignature,
        ));
        ctx.queue.push(CaqEntry::flow_leg(
            flow.from.applet_id,
            &flow.from.wallet_id,
            FlowTag::Send,
        ));

        log::info!(
            "swap flow initiated: {} -> {}",
            flow.from.applet_id,
            flow.to.applet_id
        );

        ExchangeResponse::FlowInitiated
    }
}

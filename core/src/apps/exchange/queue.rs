// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Composable app queue (CAQ).
//!
//! A FIFO of "expected next action" tokens chaining a multi-asset swap
//! across coin apps: each entry names the applet expected to run next plus
//! an opaque parameter block (wallet id, flow tag). Entries are consumed
//! at most once via peek-compare-pop. The queue is owned by the caller and
//! passed by reference into each engine; nothing runs concurrently with a
//! session step, so the operations need no locking.

use std::collections::VecDeque;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use vault_apps_proto::exchange::CAQ_PARAMS_SIZE;
use vault_apps_proto::WalletId;

/// Flow tags stored in `params[32]` of swap-leg entries (or `params[0]`
/// for the exchange app's own bookkeeping entries)
#[derive(Copy, Clone, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FlowTag {
    Receive = 1,
    Send = 2,
    FetchSignature = 3,
    StoreSignature = 4,
}

/// One queued expectation
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct CaqEntry {
    pub applet_id: u32,
    pub params: [u8; CAQ_PARAMS_SIZE],
}

impl CaqEntry {
    /// Entry for a coin-app swap leg: wallet id in `params[0..32]`, flow
    /// tag at `params[32]`
    pub fn flow_leg(applet_id: u32, wallet_id: &WalletId, tag: FlowTag) -> Self {
        let mut params = [0u8; CAQ_PARAMS_SIZE];
        params[..32].copy_from_slice(wallet_id);
        params[32] = tag as u8;
        Self { applet_id, params }
    }

    /// Entry for an exchange-app internal step: flow tag at `params[0]`
    pub fn exchange_step(applet_id: u32, tag: FlowTag) -> Self {
        let mut params = [0u8; CAQ_PARAMS_SIZE];
        params[0] = tag.into();
        Self { applet_id, params }
    }

    /// Flow tag of a swap-leg entry, `None` for malformed bytes
    pub fn leg_tag(&self) -> Option<FlowTag> {
        FlowTag::try_from(self.params[32]).ok()
    }
}

/// Process-wide swap sequencing queue
#[derive(Clone, Debug, Default)]
pub struct AppQueue {
    entries: VecDeque<CaqEntry>,
}

impl AppQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CaqEntry) {
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<CaqEntry> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&CaqEntry> {
        self.entries.front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Peek-compare-pop: consume the front entry only when it matches
    /// `expected` exactly. A mismatch leaves the queue untouched.
    pub fn validate(&mut self, expected: &CaqEntry) -> bool {
        match self.peek() {
            Some(front) if front == expected => {
                self.pop();
                true
            }
            _ => false,
        }
    }
}

// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Platform integration trait and screen model.
//!
//! The engines never talk to the card, the flash wallet table, or the
//! display directly: the platform supplies a [`Driver`] and renders the
//! [`Screen`]s the engines emit, feeding the user's decision back in as an
//! approve / deny event.

use crate::derive::Seed;
use vault_apps_proto::WalletId;

/// Content for one on-device prompt.
///
/// The engines produce human-readable summaries only; fatal internal errors
/// are rendered by the platform as a generic failure screen, never as raw
/// error codes.
#[derive(Clone, PartialEq, Debug)]
pub enum Screen {
    /// Accept / reject confirmation with a short message
    Confirm(String),
    /// Scrollable titled value (addresses and other long strings)
    ScrollPage { title: String, value: String },
}

impl Screen {
    pub fn confirm(msg: impl Into<String>) -> Self {
        Self::Confirm(msg.into())
    }

    pub fn scroll(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ScrollPage {
            title: title.into(),
            value: value.into(),
        }
    }
}

/// Platform support required by the signing engines.
///
/// `reconstruct_seed` runs the whole PIN / passphrase / card interaction
/// internally and is called at most once per signing session; the returned
/// [`Seed`] is owned by the session and zeroized when the session ends.
pub trait Driver {
    /// Rebuild the wallet seed from its card shares, `None` on failure or
    /// user abort of the reconstruction flow
    fn reconstruct_seed(&mut self, wallet_id: &WalletId) -> Option<Seed>;

    /// Look up the display name for a wallet id, `None` when the wallet is
    /// not present on this device
    fn wallet_name(&self, wallet_id: &WalletId) -> Option<String>;
}

impl<T: Driver> Driver for &mut T {
    fn reconstruct_seed(&mut self, wallet_id: &WalletId) -> Option<Seed> {
        T::reconstruct_seed(self, wallet_id)
    }

    fn wallet_name(&self, wallet_id: &WalletId) -> Option<String> {
        T::wallet_name(self, wallet_id)
    }
}

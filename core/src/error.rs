// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Engine errors and their mapping to host-facing error codes.

use vault_apps_proto::error::{DataFlowError, HostError, UserRejection};

/// Engine errors shared by every coin app.
///
/// The first failing step short-circuits the session: the engine clears its
/// context (zeroizing key material) before returning, and the caller relays
/// [`Error::host_error`] to the companion app. None of these are retried:
/// data-flow errors indicate a host bug or malicious input, and retrying
/// deterministic derivation would reproduce the same failure.
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum Error {
    /// Request tag does not match the expected protocol step
    #[error("unexpected request for current state")]
    UnexpectedRequest,

    /// Approve/deny decision arrived without a pending prompt
    #[error("no prompt pending")]
    UnexpectedDecision,

    /// Derivation path failed the chain's guard
    #[error("invalid derivation path")]
    InvalidPath,

    /// Wallet id not present on this device
    #[error("unknown wallet")]
    UnknownWallet,

    /// Chunk accounting violation during transaction transfer
    #[error("chunked transfer accounting violation")]
    DataFlow,

    /// Transaction decode or whitelist validation failure; the code is the
    /// chain-specific reason (see each app's `TxnError`)
    #[error("transaction rejected (code {0})")]
    InvalidTxn(u32),

    /// Swap destination does not match the exchange flow's recorded
    /// receive address
    #[error("swap destination mismatch")]
    ExchangeMismatch,

    /// Seed reconstruction flow failed or was aborted
    #[error("seed reconstruction failed")]
    SeedRecovery,

    /// Key derivation failure, sub-code distinguishes call sites
    #[error("key derivation failed ({0})")]
    KeyDerivation(u32),

    /// Signing failure (nonce-retry exhaustion etc.), sub-coded
    #[error("signing failed ({0})")]
    SignError(u32),

    /// User declined a confirmation or verification screen
    #[error("user rejected the operation")]
    Rejected(UserRejection),

    /// Priority-zero event: host abort or device removal
    #[error("session cancelled")]
    Cancelled,
}

impl Error {
    /// Structured error to relay to the host, if any.
    ///
    /// Cancellation produces no response: the host initiated the abort and
    /// no signature is ever sent for a cancelled session.
    pub fn host_error(&self) -> Option<HostError> {
        use Error::*;

        match self {
            UnexpectedRequest | UnexpectedDecision => {
                Some(HostError::CorruptData(DataFlowError::InvalidRequest))
            }
            InvalidPath | UnknownWallet | DataFlow | InvalidTxn(_) | ExchangeMismatch => {
                Some(HostError::CorruptData(DataFlowError::InvalidData))
            }
            SeedRecovery => None,
            KeyDerivation(c) | SignError(c) => Some(HostError::Unknown(*c)),
            Rejected(r) => Some(HostError::UserRejection(*r)),
            Cancelled => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cancellation_is_silent() {
        assert_eq!(Error::Cancelled.host_error(), None);
    }

    #[test]
    fn data_errors_report_corrupt_data() {
        assert_eq!(
            Error::InvalidTxn(7).host_error(),
            Some(HostError::CorruptData(DataFlowError::InvalidData))
        );
        assert_eq!(
            Error::UnexpectedRequest.host_error(),
            Some(HostError::CorruptData(DataFlowError::InvalidRequest))
        );
    }

    #[test]
    fn crypto_errors_carry_sub_code() {
        assert_eq!(
            Error::KeyDerivation(1).host_error(),
            Some(HostError::Unknown(1))
        );
        assert_eq!(Error::SignError(2).host_error(), Some(HostError::Unknown(2)));
    }
}

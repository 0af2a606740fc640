// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Host-facing structured error codes.
//!
//! Mirrors the firmware error taxonomy: data-flow errors indicate a host bug
//! or malicious input and always abort the session, user rejections are a
//! normal negative outcome, and "unknown" errors carry a small sub-code
//! distinguishing internal (cryptographic / derivation) call sites.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Data-flow error codes, sent when a request fails protocol or data
/// validation.
#[derive(Copy, Clone, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum DataFlowError {
    /// Top-level query tag not recognised by the app
    InvalidQuery = 1,
    /// Request tag does not match the expected protocol step
    InvalidRequest = 2,
    /// Request contents failed validation (path, chunk accounting, decode)
    InvalidData = 3,
    /// Query decoding itself failed
    DecodingFailed = 4,
}

/// User rejection codes, distinguishing which screen was declined.
#[derive(Copy, Clone, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum UserRejection {
    /// Initial send/derive confirmation declined
    Confirmation = 1,
    /// Transaction verification screen declined
    Verification = 2,
}

/// Structured error reported to the host companion app.
///
/// The on-device display never shows these codes; the host renders them.
#[derive(Copy, Clone, PartialEq, Debug, thiserror::Error)]
pub enum HostError {
    /// Corrupt or out-of-protocol data from the host
    #[error("corrupt data: {0:?}")]
    CorruptData(DataFlowError),

    /// User declined the operation
    #[error("user rejection: {0:?}")]
    UserRejection(UserRejection),

    /// Internal failure; sub-code identifies the call site
    #[error("unknown error ({0})")]
    Unknown(u32),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_flow_codes_round_trip() {
        for code in 1u32..=4 {
            let e = DataFlowError::try_from(code).unwrap();
            assert_eq!(u32::from(e), code);
        }
        assert!(DataFlowError::try_from(0u32).is_err());
        assert!(DataFlowError::try_from(5u32).is_err());
    }
}

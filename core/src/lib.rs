// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Multi-chain hardware wallet signing engines.
//!
//! This crate provides one event-driven engine per coin app (Solana,
//! Starknet, Stellar, XRP) plus the exchange/swap queue that sequences
//! multi-asset flows across them. Each engine follows the same shape:
//! host requests (and user approve/deny decisions) arrive as events, the
//! engine advances an explicit state machine and returns the response to
//! transmit and/or the screen to display:
//!
//! ```text
//! AwaitInitiate -> Confirm (user) -> AwaitTxnData (chunked) ->
//! DecodeAndValidate -> Verify (user, n screens) -> seed reconstruction ->
//! derive -> sign -> AwaitSignatureReq -> respond -> Complete
//! ```
//!
//! Platform integration happens through the [`Driver`][driver::Driver]
//! trait (seed reconstruction, wallet metadata); the USB transport and
//! protobuf codecs live outside this crate and exchange the request /
//! response sum types defined in [`vault_apps_proto`].
//!
//! Session state is owned by the engine and dropped (zeroizing all key
//! material) on every exit path: completion, validation failure, user
//! rejection, or host-side cancellation.

pub use vault_apps_proto as proto;

pub mod abi;
pub mod cursor;
pub mod derive;
pub mod driver;
pub mod error;
pub mod format;
pub mod transfer;

pub mod apps;

pub use driver::{Driver, Screen};
pub use error::Error;

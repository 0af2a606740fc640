// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Per-chain signing engines and the exchange/swap orchestrator.

pub mod exchange;
pub mod solana;
pub mod starknet;
pub mod stellar;
pub mod xrp;

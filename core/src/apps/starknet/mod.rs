// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Starknet coin app.
//!
//! The unsigned transaction arrives as one structured request; the engine
//! Poseidon-hashes it, grinds the BIP32-derived intermediate key into the
//! Stark scalar field, and signs the hash on the Stark curve with a
//! deterministic nonce.

pub mod curve;
pub mod felt;
pub mod hash;
pub mod keys;
pub mod poseidon;

use num_bigint::BigUint;
use rand_core::{CryptoRngCore, OsRng};
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use vault_apps_proto::applet;
use vault_apps_proto::error::UserRejection;
use vault_apps_proto::starknet::{
    ResourceBound, SignTxnInitiate, SignTxnRequest, SignTxnResponse, StarknetRequest,
    StarknetResponse, UnsignedTxn, BIGNUM_SIZE,
};
use vault_apps_proto::GetPublicKeysInitiate;

use crate::apps::exchange::ExchangeContext;
use crate::derive::DerivationPath;
use crate::driver::{Driver, Screen};
use crate::error::Error;
use crate::format::{format_units_be, STARKNET_DECIMALS};
use crate::transfer::MAX_TXN_SIZE;

pub use keys::derivation_path_guard;

/// Display name / ticker
pub const STARKNET_NAME: &str = "Starknet";
pub const STARKNET_LUNIT: &str = "STRK";

/// Invoke calldata layout: recipient and amount indices used for display
const CALLDATA_RECIPIENT_INDEX: usize = 4;
const CALLDATA_AMOUNT_INDEX: usize = 5;

/// Fraction digits shown for STRK amounts
const AMOUNT_FRAC_DIGITS: usize = 6;

/// Engine input events
#[derive(Clone, Debug)]
pub enum StarknetEvent {
    Host(StarknetRequest),
    Approve,
    Deny,
    Cancel,
}

/// Engine output: the response to transmit and/or the screen to display
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StarknetOutput {
    pub response: Option<StarknetResponse>,
    pub prompt: Option<Screen>,
}

impl StarknetOutput {
    fn none() -> Self {
        Self::default()
    }

    fn respond(response: StarknetResponse) -> Self {
        Self {
            response: Some(response),
            prompt: None,
        }
    }

    fn prompt(screen: Screen) -> Self {
        Self {
            response: None,
            prompt: Some(screen),
        }
    }
}

/// Engine state enumeration
#[derive(Copy, Clone, PartialEq, Debug, EnumString, Display, EnumVariantNames, EnumIter)]
pub enum State {
    Init,
    PubkeysConfirm,
    PubkeysVerify,
    SignConfirm,
    SignAwaitTxn,
    SignVerify(usize),
    SignAwaitSignature,
    Complete,
    Denied,
    Failed,
}

struct PubkeysContext {
    init: GetPublicKeysInitiate,
    verified: bool,
    keys: Vec<[u8; BIGNUM_SIZE]>,
}

struct SignContext {
    init: SignTxnInitiate,
    txn: Option<UnsignedTxn>,
    screens: Vec<Screen>,
    swap_verification: bool,
    signature: Option<[u8; 64]>,
}

/// Starknet signing engine
pub struct StarknetEngine<DRV: Driver, RNG: CryptoRngCore = OsRng> {
    state: State,
    sign: Option<SignContext>,
    pubkeys: Option<PubkeysContext>,
    drv: DRV,
    rng: RNG,
}

impl<DRV: Driver> StarknetEngine<DRV> {
    /// Create a new engine with the default [OsRng]
    pub fn new(drv: DRV) -> Self {
        Self::new_with_rng(drv, OsRng)
    }
}

impl<DRV: Driver, RNG: CryptoRngCore> StarknetEngine<DRV, RNG> {
    /// Create a new engine with the provided driver and rng
    pub fn new_with_rng(drv: DRV, rng: RNG) -> Self {
        Self {
            state: State::Init,
            sign: None,
            pubkeys: None,
            drv,
            rng,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn update(
        &mut self,
        evt: StarknetEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<StarknetOutput, Error> {
        let r = self.step(evt, exchange);
        if let Err(e) = &r {
            self.abort(e);
        }
        r
    }

    fn abort(&mut self, e: &Error) {
        log::warn!("starknet session aborted: {e}");
        self.sign = None;
        self.pubkeys = None;
        self.state = match e {
            Error::Rejected(_) | Error::Cancelled => State::Denied,
            _ => State::Failed,
        };
    }

    fn step(
        &mut self,
        evt: StarknetEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<StarknetOutput, Error> {
        use StarknetEvent::*;

        match (self.state, evt) {
            (_, Cancel) => Err(Error::Cancelled),

            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StarknetRequest::GetPublicKeys(init)),
            ) => self.pubkeys_init(init, false),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StarknetRequest::GetUserVerifiedPublicKey(init)),
            ) => self.pubkeys_init(init, true),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StarknetRequest::SignTxn(SignTxnRequest::Initiate(init))),
            ) => self.sign_init(init, exchange),

            (State::PubkeysConfirm, Approve) => self.pubkeys_derive(),
            (State::PubkeysConfirm, Deny) => {
                Err(Error::Rejected(UserRejection::Confirmation))
            }
            (State::PubkeysVerify, Approve) => self.pubkeys_respond(),
            (State::PubkeysVerify, Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (State::SignConfirm, Approve) => self.sign_confirmed(),
            (State::SignConfirm, Deny) => Err(Error::Rejected(UserRejection::Confirmation)),

            (State::SignAwaitTxn, Host(StarknetRequest::SignTxn(SignTxnRequest::Txn(txn)))) => {
                self.sign_txn_received(txn, exchange)
            }

            (State::SignVerify(n), Approve) => self.sign_verify_step(n),
            (State::SignVerify(_), Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (
                State::SignAwaitSignature,
                Host(StarknetRequest::SignTxn(SignTxnRequest::Signature)),
            ) => self.sign_respond(),

            (_, Approve | Deny) => Err(Error::UnexpectedDecision),
            (_state, Host(_req)) => {
                log::error!("unexpected starknet request in state {_state:?}");
                Err(Error::UnexpectedRequest)
            }
        }
    }

    fn pubkeys_init(
        &mut self,
        init: GetPublicKeysInitiate,
        verified: bool,
    ) -> Result<StarknetOutput, Error> {
        if init.derivation_paths.is_empty() || (verified && init.derivation_paths.len() != 1) {
            return Err(Error::InvalidPath);
        }
        for raw in &init.derivation_paths {
            let path = DerivationPath::from_slice(raw)?;
            if !derivation_path_guard(&path) {
                return Err(Error::InvalidPath);
            }
        }

        let name = self
            .drv
            .wallet_name(&init.wallet_id)
            .ok_or(Error::UnknownWallet)?;
        let msg = if verified {
            format!("Verify {STARKNET_NAME} address for wallet {name}?")
        } else {
            format!("Add {STARKNET_NAME} account to wallet {name}?")
        };

        self.pubkeys = Some(PubkeysContext {
            init,
            verified,
            keys: Vec::new(),
        });
        self.state = State::PubkeysConfirm;

        Ok(StarknetOutput::prompt(Screen::confirm(msg)))
    }

    fn pubkeys_derive(&mut self) -> Result<StarknetOutput, Error> {
        let ctx = self.pubkeys.as_mut().ok_or(Error::UnexpectedDecision)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        for raw in &ctx.init.derivation_paths {
            let (private, public) = keys::derive_key_from_seed(&seed, raw)?;
            drop(private);
            ctx.keys.push(public);
        }
        drop(seed);

        if ctx.verified {
            let address = format!("0x{}", hex::encode(ctx.keys[0]));
            self.state = State::PubkeysVerify;
            Ok(StarknetOutput::prompt(Screen::scroll(
                "Verify address",
                address,
            )))
        } else {
            self.pubkeys_respond()
        }
    }

    fn pubkeys_respond(&mut self) -> Result<StarknetOutput, Error> {
        let ctx = self.pubkeys.take().ok_or(Error::UnexpectedDecision)?;
        self.state = State::Complete;
        Ok(StarknetOutput::respond(StarknetResponse::PublicKeys(
            ctx.keys,
        )))
    }

    fn sign_init(
        &mut self,
        init: SignTxnInitiate,
        exchange: &mut ExchangeContext,
    ) -> Result<StarknetOutput, Error> {
        let path = DerivationPath::from_slice(&init.derivation_path)?;
        if !derivation_path_guard(&path) {
            return Err(Error::InvalidPath);
        }

        let swap_verification = exchange.validate_send(applet::STARKNET, &init.wallet_id);

        let name = self
            .drv
            .wallet_name(&init.wallet_id)
            .ok_or(Error::UnknownWallet)?;
        let msg = format!("Sign {STARKNET_NAME} transaction using wallet {name}?");

        self.sign = Some(SignContext {
            init,
            txn: None,
            screens: Vec::new(),
            swap_verification,
            signature: None,
        });
        self.state = State::SignConfirm;

        Ok(StarknetOutput::prompt(Screen::confirm(msg)))
    }

    fn sign_confirmed(&mut self) -> Result<StarknetOutput, Error> {
        if self.sign.is_none() {
            return Err(Error::UnexpectedDecision);
        }
        self.state = State::SignAwaitTxn;
        Ok(StarknetOutput::respond(StarknetResponse::SignTxn(
            SignTxnResponse::Confirmation,
        )))
    }

    fn sign_txn_received(
        &mut self,
        txn: UnsignedTxn,
        exchange: &mut ExchangeContext,
    ) -> Result<StarknetOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;

        validate_txn(&txn)?;
        let screens = verify_screens(&txn)?;

        if ctx.swap_verification {
            let to_address = display_address(&txn)?;
            if !exchange.validate_stored_address(&to_address) {
                return Err(Error::ExchangeMismatch);
            }
        }

        ctx.txn = Some(txn);
        ctx.screens = screens;

        self.state = State::SignVerify(0);
        let mut out = StarknetOutput::respond(StarknetResponse::SignTxn(
            SignTxnResponse::UnsignedTxnAccepted,
        ));
        out.prompt = Some(self.sign.as_ref().map(|c| c.screens[0].clone()).ok_or(
            Error::UnexpectedRequest,
        )?);
        Ok(out)
    }

    fn sign_verify_step(&mut self, n: usize) -> Result<StarknetOutput, Error> {
        let next = n + 1;
        let screens_len = self
            .sign
            .as_ref()
            .ok_or(Error::UnexpectedDecision)?
            .screens
            .len();

        if next < screens_len {
            let screen = self.sign.as_ref().map(|c| c.screens[next].clone());
            self.state = State::SignVerify(next);
            return Ok(StarknetOutput {
                response: None,
                prompt: screen,
            });
        }

        self.sign_txn()?;
        self.state = State::SignAwaitSignature;
        Ok(StarknetOutput::none())
    }

    fn sign_txn(&mut self) -> Result<(), Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;
        let txn = ctx.txn.as_ref().ok_or(Error::UnexpectedRequest)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        let (private, _public) = keys::derive_key_from_seed(&seed, &ctx.init.derivation_path)?;
        drop(seed);

        let hash = hash::txn_hash(txn).to_be_bytes();

        let signature = curve::sign_digest(&private, &hash, &mut self.rng)?;
        drop(private);

        ctx.signature = Some(signature);
        Ok(())
    }

    fn sign_respond(&mut self) -> Result<StarknetOutput, Error> {
        let ctx = self.sign.take().ok_or(Error::UnexpectedRequest)?;
        let signature = ctx.signature.ok_or(Error::SignError(1))?;

        self.state = State::Complete;
        Ok(StarknetOutput::respond(StarknetResponse::SignTxn(
            SignTxnResponse::Signature(signature),
        )))
    }
}

/// Structural validation of the incoming transaction fields
fn validate_txn(txn: &UnsignedTxn) -> Result<(), Error> {
    let check_bound = |b: &ResourceBound| -> bool {
        b.max_amount.len() <= 8 && b.max_price_per_unit.len() <= 16
    };

    let (chain_id, nonce, bounds, felts): (_, _, _, &Vec<Vec<u8>>) = match txn {
        UnsignedTxn::Invoke(t) => {
            if t.calldata.len() <= CALLDATA_AMOUNT_INDEX {
                return Err(Error::InvalidTxn(1));
            }
            if t.calldata[CALLDATA_RECIPIENT_INDEX].len() != BIGNUM_SIZE {
                return Err(Error::InvalidTxn(2));
            }
            (&t.chain_id, &t.nonce, &t.resource_bounds, &t.calldata)
        }
        UnsignedTxn::DeployAccount(t) => (
            &t.chain_id,
            &t.nonce,
            &t.resource_bounds,
            &t.constructor_call_data,
        ),
    };

    if chain_id.len() > BIGNUM_SIZE || nonce.len() > BIGNUM_SIZE {
        return Err(Error::InvalidTxn(3));
    }
    if !check_bound(&bounds.level_1) || !check_bound(&bounds.level_2) {
        return Err(Error::InvalidTxn(4));
    }
    if felts.len() > MAX_TXN_SIZE / BIGNUM_SIZE || felts.iter().any(|f| f.len() > BIGNUM_SIZE) {
        return Err(Error::InvalidTxn(5));
    }

    Ok(())
}

/// Destination rendered for display and swap cross-checking
fn display_address(txn: &UnsignedTxn) -> Result<String, Error> {
    match txn {
        UnsignedTxn::Invoke(t) => Ok(format!(
            "0x{}",
            hex::encode(&t.calldata[CALLDATA_RECIPIENT_INDEX])
        )),
        UnsignedTxn::DeployAccount(t) => {
            Ok(format!("0x{}", hex::encode(t.contract_address)))
        }
    }
}

/// L1 max fee: `max_amount * max_price_per_unit`
fn max_fee_bytes(bound: &ResourceBound) -> Vec<u8> {
    let fee =
        BigUint::from_bytes_be(&bound.max_amount) * BigUint::from_bytes_be(&bound.max_price_per_unit);
    fee.to_bytes_be()
}

/// Build the ordered verification screens for a validated transaction
fn verify_screens(txn: &UnsignedTxn) -> Result<Vec<Screen>, Error> {
    let mut screens = Vec::new();

    match txn {
        UnsignedTxn::Invoke(t) => {
            screens.push(Screen::scroll("Verify address", display_address(txn)?));
            screens.push(Screen::confirm(format!(
                "Verify amount\n{} {STARKNET_LUNIT}",
                format_units_be(
                    &t.calldata[CALLDATA_AMOUNT_INDEX],
                    STARKNET_DECIMALS,
                    AMOUNT_FRAC_DIGITS
                )
            )));
            screens.push(Screen::confirm(format!(
                "Verify max fee\n{} {STARKNET_LUNIT}",
                format_units_be(
                    &max_fee_bytes(&t.resource_bounds.level_1),
                    STARKNET_DECIMALS,
                    AMOUNT_FRAC_DIGITS
                )
            )));
        }
        UnsignedTxn::DeployAccount(t) => {
            screens.push(Screen::scroll("Verify address", display_address(txn)?));
            screens.push(Screen::confirm(format!(
                "Verify max fee\n{} {STARKNET_LUNIT}",
                format_units_be(
                    &max_fee_bytes(&t.resource_bounds.level_1),
                    STARKNET_DECIMALS,
                    AMOUNT_FRAC_DIGITS
                )
            )));
        }
    }

    Ok(screens)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validate_rejects_short_invoke_calldata() {
        let mut txn = hash::test::sample_invoke();
        txn.calldata.truncate(3);
        assert!(validate_txn(&UnsignedTxn::Invoke(txn)).is_err());
    }

    #[test]
    fn validate_rejects_bad_recipient_width() {
        let mut txn = hash::test::sample_invoke();
        txn.calldata[CALLDATA_RECIPIENT_INDEX] = vec![0xaa; 16];
        assert!(validate_txn(&UnsignedTxn::Invoke(txn)).is_err());
    }

    #[test]
    fn invoke_screens_cover_address_amount_fee() {
        let txn = UnsignedTxn::Invoke(hash::test::sample_invoke());
        validate_txn(&txn).unwrap();

        let screens = verify_screens(&txn).unwrap();
        assert_eq!(screens.len(), 3);

        match &screens[0] {
            Screen::ScrollPage { value, .. } => {
                assert_eq!(value, &format!("0x{}", hex::encode([0xaau8; 32])));
            }
            s => panic!("unexpected screen {s:?}"),
        }
        match &screens[2] {
            Screen::Confirm(s) => assert!(s.starts_with("Verify max fee")),
            s => panic!("unexpected screen {s:?}"),
        }
    }

    #[test]
    fn max_fee_is_product() {
        let bound = ResourceBound {
            max_amount: vec![0x02],
            max_price_per_unit: vec![0x03],
        };
        assert_eq!(max_fee_bytes(&bound), vec![0x06]);
    }
}

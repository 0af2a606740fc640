// Copyright (c) 2022-2023 The MobileCoin Foundation

//! XRP coin app.
//!
//! Signing digests the full received buffer (network prefix included) with
//! SHA-512-half, then produces a DER-encoded low-s ECDSA signature with the
//! secp256k1 key at `m/44'/144'/0'/0/i`.

pub mod address;
pub mod txn;

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature};
use sha2::{Digest, Sha512};
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use vault_apps_proto::applet;
use vault_apps_proto::chunk::ChunkPayload;
use vault_apps_proto::error::UserRejection;
use vault_apps_proto::xrp::{
    SignTxnInitiate, SignTxnRequest, SignTxnResponse, XrpRequest, XrpResponse, PUB_KEY_SIZE,
};
use vault_apps_proto::GetPublicKeysInitiate;

use crate::apps::exchange::ExchangeContext;
use crate::derive::{derive_secp256k1, harden, is_non_hardened, DerivationPath};
use crate::driver::{Driver, Screen};
use crate::error::Error;
use crate::format::{format_units_u64, XRP_DECIMALS};
use crate::transfer::ChunkedReceiver;

/// Display name / ticker
pub const XRP_NAME: &str = "XRP";
pub const XRP_LUNIT: &str = "XRP";

/// `m/44'`
pub const PURPOSE_INDEX: u32 = harden(44);
/// `m/44'/144'`
pub const COIN_INDEX: u32 = harden(144);
/// Fixed account level, `0'`
pub const ACCOUNT_INDEX: u32 = harden(0);
/// Fixed external-chain level, `0`
pub const CHANGE_INDEX: u32 = 0;

/// Accepted account paths: exactly `m/44'/144'/0'/0/i` with a
/// non-hardened address index
pub fn derivation_path_guard(path: &[u32]) -> bool {
    match path {
        [purpose, coin, account, change, address] => {
            *purpose == PURPOSE_INDEX
                && *coin == COIN_INDEX
                && *account == ACCOUNT_INDEX
                && *change == CHANGE_INDEX
                && is_non_hardened(*address)
        }
        _ => false,
    }
}

/// SHA-512-half: the first 32 bytes of SHA-512 over the signing data
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Engine input events
#[derive(Clone, Debug)]
pub enum XrpEvent {
    Host(XrpRequest),
    Approve,
    Deny,
    Cancel,
}

/// Engine output: the response to transmit and/or the screen to display
#[derive(Clone, PartialEq, Debug, Default)]
pub struct XrpOutput {
    pub response: Option<XrpResponse>,
    pub prompt: Option<Screen>,
}

impl XrpOutput {
    fn none() -> Self {
        Self::default()
    }

    fn respond(response: XrpResponse) -> Self {
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
    SignAwaitData,
    SignVerify(usize),
    SignAwaitSignature,
    Complete,
    Denied,
    Failed,
}

struct PubkeysContext {
    init: GetPublicKeysInitiate,
    verified: bool,
    keys: Vec<[u8; PUB_KEY_SIZE]>,
}

struct SignContext {
    init: SignTxnInitiate,
    receiver: Option<ChunkedReceiver>,
    transaction: Vec<u8>,
    screens: Vec<Screen>,
    swap_verification: bool,
    signature: Option<Vec<u8>>,
}

/// XRP signing engine
pub struct XrpEngine<DRV: Driver> {
    state: State,
    sign: Option<SignContext>,
    pubkeys: Option<PubkeysContext>,
    drv: DRV,
}

impl<DRV: Driver> XrpEngine<DRV> {
    pub fn new(drv: DRV) -> Self {
        Self {
            state: State::Init,
            sign: None,
            pubkeys: None,
            drv,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn update(
        &mut self,
        evt: XrpEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<XrpOutput, Error> {
        let r = self.step(evt, exchange);
        if let Err(e) = &r {
            self.abort(e);
        }
        r
    }

    fn abort(&mut self, e: &Error) {
        log::warn!("xrp session aborted: {e}");
        self.sign = None;
        self.pubkeys = None;
        self.state = match e {
            Error::Rejected(_) | Error::Cancelled => State::Denied,
            _ => State::Failed,
        };
    }

    fn step(
        &mut self,
        evt: XrpEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<XrpOutput, Error> {
        use XrpEvent::*;

        match (self.state, evt) {
            (_, Cancel) => Err(Error::Cancelled),

            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(XrpRequest::GetPublicKeys(init)),
            ) => self.pubkeys_init(init, false),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(XrpRequest::GetUserVerifiedPublicKey(init)),
            ) => self.pubkeys_init(init, true),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(XrpRequest::SignTxn(SignTxnRequest::Initiate(init))),
            ) => self.sign_init(init, exchange),

            (State::PubkeysConfirm, Approve) => self.pubkeys_derive(),
            (State::PubkeysConfirm, Deny) => {
                Err(Error::Rejected(UserRejection::Confirmation))
            }
            (State::PubkeysVerify, Approve) => self.pubkeys_respond(),
            (State::PubkeysVerify, Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (State::SignConfirm, Approve) => self.sign_confirmed(),
            (State::SignConfirm, Deny) => Err(Error::Rejected(UserRejection::Confirmation)),

            (State::SignAwaitData, Host(XrpRequest::SignTxn(SignTxnRequest::TxnData(p)))) => {
                self.sign_data(p, exchange)
            }

            (State::SignVerify(n), Approve) => self.sign_verify_step(n),
            (State::SignVerify(_), Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (
                State::SignAwaitSignature,
                Host(XrpRequest::SignTxn(SignTxnRequest::Signature)),
            ) => self.sign_respond(),

            (_, Approve | Deny) => Err(Error::UnexpectedDecision),
            (_state, Host(_req)) => {
                log::error!("unexpected xrp request in state {_state:?}");
                Err(Error::UnexpectedRequest)
            }
        }
    }

    fn pubkeys_init(
        &mut self,
        init: GetPublicKeysInitiate,
        verified: bool,
    ) -> Result<XrpOutput, Error> {
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
            format!("Verify {XRP_NAME} address for wallet {name}?")
        } else {
            format!("Add {XRP_NAME} account to wallet {name}?")
        };

        self.pubkeys = Some(PubkeysContext {
            init,
            verified,
            keys: Vec::new(),
        });
        self.state = State::PubkeysConfirm;

        Ok(XrpOutput::prompt(Screen::confirm(msg)))
    }

    fn pubkeys_derive(&mut self) -> Result<XrpOutput, Error> {
        let ctx = self.pubkeys.as_mut().ok_or(Error::UnexpectedDecision)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        for raw in &ctx.init.derivation_paths {
            let xprv = derive_secp256k1(&seed, raw)?;

            use bip32::PublicKey as _;
            ctx.keys.push(xprv.public_key().public_key().to_bytes());
        }
        drop(seed);

        if ctx.verified {
            let id = address::account_id(&ctx.keys[0]);
            let addr = address::classic_address(&id);
            self.state = State::PubkeysVerify;
            Ok(XrpOutput::prompt(Screen::scroll("Verify address", addr)))
        } else {
            self.pubkeys_respond()
        }
    }

    fn pubkeys_respond(&mut self) -> Result<XrpOutput, Error> {
        let ctx = self.pubkeys.take().ok_or(Error::UnexpectedDecision)?;
        self.state = State::Complete;
        Ok(XrpOutput::respond(XrpResponse::PublicKeys(ctx.keys)))
    }

    fn sign_init(
        &mut self,
        init: SignTxnInitiate,
        exchange: &mut ExchangeContext,
    ) -> Result<XrpOutput, Error> {
        let path = DerivationPath::from_slice(&init.derivation_path)?;
        if !derivation_path_guard(&path) {
            return Err(Error::InvalidPath);
        }

        let swap_verification = exchange.validate_send(applet::XRP, &init.wallet_id);

        let name = self
            .drv
            .wallet_name(&init.wallet_id)
            .ok_or(Error::UnknownWallet)?;
        let msg = format!("Sign {XRP_NAME} transaction using wallet {name}?");

        self.sign = Some(SignContext {
            init,
            receiver: None,
            transaction: Vec::new(),
            screens: Vec::new(),
            swap_verification,
            signature: None,
        });
        self.state = State::SignConfirm;

        Ok(XrpOutput::prompt(Screen::confirm(msg)))
    }

    fn sign_confirmed(&mut self) -> Result<XrpOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;

        ctx.receiver = Some(ChunkedReceiver::new(ctx.init.transaction_size)?);
        self.state = State::SignAwaitData;

        Ok(XrpOutput::respond(XrpResponse::SignTxn(
            SignTxnResponse::Confirmation,
        )))
    }

    fn sign_data(
        &mut self,
        payload: ChunkPayload,
        exchange: &mut ExchangeContext,
    ) -> Result<XrpOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;

        let ack = match ctx.receiver.as_mut() {
            Some(rx) => rx.ingest(&payload)?,
            None => return Err(Error::UnexpectedRequest),
        };
        let mut out =
            XrpOutput::respond(XrpResponse::SignTxn(SignTxnResponse::DataAccepted(ack)));

        if ctx.receiver.as_ref().is_some_and(|rx| rx.is_complete()) {
            let buffer = match ctx.receiver.take() {
                Some(rx) => rx.finish()?,
                None => return Err(Error::DataFlow),
            };

            let decoded = txn::decode(&buffer)?;
            txn::validate(&decoded)?;

            // validate() ensures the display fields are present
            let destination = decoded.destination.ok_or(Error::DataFlow)?;
            let to_address = address::classic_address(&destination);

            if ctx.swap_verification && !exchange.validate_stored_address(&to_address) {
                return Err(Error::ExchangeMismatch);
            }

            ctx.screens = verify_screens(&decoded, &to_address);
            ctx.transaction = buffer;

            self.state = State::SignVerify(0);
            out.prompt = Some(ctx.screens[0].clone());
        }

        Ok(out)
    }

    fn sign_verify_step(&mut self, n: usize) -> Result<XrpOutput, Error> {
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
            return Ok(XrpOutput {
                response: None,
                prompt: screen,
            });
        }

        self.sign_txn()?;
        self.state = State::SignAwaitSignature;
        Ok(XrpOutput::none())
    }

    fn sign_txn(&mut self) -> Result<(), Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        let digest = sha512_half(&ctx.transaction);

        let xprv = derive_secp256k1(&seed, &ctx.init.derivation_path)?;
        drop(seed);

        let signature: Signature = xprv
            .private_key()
            .sign_prehash(&digest)
            .map_err(|_| Error::SignError(1))?;
        // canonical low-s form
        let signature = signature.normalize_s().unwrap_or(signature);

        ctx.signature = Some(signature.to_der().as_bytes().to_vec());
        drop(xprv);

        Ok(())
    }

    fn sign_respond(&mut self) -> Result<XrpOutput, Error> {
        let ctx = self.sign.take().ok_or(Error::UnexpectedRequest)?;
        let signature = ctx.signature.ok_or(Error::SignError(1))?;

        self.state = State::Complete;
        Ok(XrpOutput::respond(XrpResponse::SignTxn(
            SignTxnResponse::Signature(signature),
        )))
    }
}

/// Build the ordered verification screens for a validated payment
fn verify_screens(txn: &txn::UnsignedTxn, to_address: &str) -> Vec<Screen> {
    let mut screens = vec![
        Screen::scroll("Verify address", to_address.to_string()),
        Screen::confirm(format!(
            "Verify amount\n{} {XRP_LUNIT}",
            format_units_u64(txn.amount.unwrap_or(0), XRP_DECIMALS, XRP_DECIMALS)
        )),
    ];

    if let Some(tag) = txn.destination_tag {
        screens.push(Screen::confirm(format!("Verify destination tag\n{tag}")));
    }

    screens
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_guard() {
        assert!(derivation_path_guard(&[
            PURPOSE_INDEX,
            COIN_INDEX,
            ACCOUNT_INDEX,
            CHANGE_INDEX,
            0
        ]));
        assert!(derivation_path_guard(&[
            PURPOSE_INDEX,
            COIN_INDEX,
            ACCOUNT_INDEX,
            CHANGE_INDEX,
            41
        ]));

        // hardened address index
        assert!(!derivation_path_guard(&[
            PURPOSE_INDEX,
            COIN_INDEX,
            ACCOUNT_INDEX,
            CHANGE_INDEX,
            harden(0)
        ]));
        // wrong change level
        assert!(!derivation_path_guard(&[
            PURPOSE_INDEX,
            COIN_INDEX,
            ACCOUNT_INDEX,
            1,
            0
        ]));
        // bad depth
        assert!(!derivation_path_guard(&[PURPOSE_INDEX, COIN_INDEX, ACCOUNT_INDEX]));
    }

    #[test]
    fn sha512_half_prefix() {
        let full = Sha512::digest(b"hello");
        assert_eq!(sha512_half(b"hello"), full[..32]);
        assert_ne!(sha512_half(b"hello"), sha512_half(b"hellp"));
    }

    #[test]
    fn verify_screens_include_destination_tag() {
        let bytes = txn::test::build_payment_txn([1; 20], [2; 20], 1_500_000, 12, Some(7));
        let decoded = txn::decode(&bytes).unwrap();
        let screens = verify_screens(&decoded, "rDEST");

        assert_eq!(screens.len(), 3);
        match &screens[1] {
            Screen::Confirm(s) => assert!(s.contains("1.5 XRP"), "amount screen: {s}"),
            s => panic!("unexpected screen {s:?}"),
        }
        match &screens[2] {
            Screen::Confirm(s) => assert!(s.contains('7')),
            s => panic!("unexpected screen {s:?}"),
        }
    }
}

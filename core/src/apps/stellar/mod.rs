// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Stellar coin app.
//!
//! Signing hashes the envelope's signature base (SHA-256 of the network
//! passphrase followed by the signature-relevant XDR prefix) and produces
//! an ED25519 signature with the key at `m/44'/148'/i'`. When the session
//! is the send leg of a swap, the destination must match the receive
//! address recorded by the exchange flow.

pub mod strkey;
pub mod xdr;

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use vault_apps_proto::applet;
use vault_apps_proto::chunk::ChunkPayload;
use vault_apps_proto::error::UserRejection;
use vault_apps_proto::stellar::{
    SignTxnInitiate, SignTxnRequest, SignTxnResponse, StellarRequest, StellarResponse,
    SIGNATURE_SIZE,
};
use vault_apps_proto::GetPublicKeysInitiate;

use crate::apps::exchange::ExchangeContext;
use crate::derive::{derive_ed25519, ed25519_public_key, harden, is_hardened, DerivationPath};
use crate::driver::{Driver, Screen};
use crate::error::Error;
use crate::format::{format_units_u64, STELLAR_DECIMALS};
use crate::transfer::ChunkedReceiver;

/// Display name / ticker
pub const STELLAR_NAME: &str = "Stellar";
pub const STELLAR_LUNIT: &str = "XLM";

/// Signature-network binding for the public network
pub const NETWORK_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// `m/44'`
pub const PURPOSE_INDEX: u32 = harden(44);
/// `m/44'/148'`
pub const COIN_INDEX: u32 = harden(148);

/// Accepted account paths: exactly `m/44'/148'/i'`
pub fn derivation_path_guard(path: &[u32]) -> bool {
    match path {
        [purpose, coin, account] => {
            *purpose == PURPOSE_INDEX && *coin == COIN_INDEX && is_hardened(*account)
        }
        _ => false,
    }
}

/// SHA-256 of the network passphrase, the prefix of every signature base
pub fn network_id() -> [u8; 32] {
    Sha256::digest(NETWORK_PASSPHRASE.as_bytes()).into()
}

/// Hash signed by the device: SHA-256 over
/// `network_id ‖ envelope[0..tagged_txn_len)`
pub fn transaction_hash(tagged_txn: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(network_id());
    hasher.update(tagged_txn);
    hasher.finalize().into()
}

/// Engine input events
#[derive(Clone, Debug)]
pub enum StellarEvent {
    Host(StellarRequest),
    Approve,
    Deny,
    Cancel,
}

/// Engine output: the response to transmit and/or the screen to display
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StellarOutput {
    pub response: Option<StellarResponse>,
    pub prompt: Option<Screen>,
}

impl StellarOutput {
    fn none() -> Self {
        Self::default()
    }

    fn respond(response: StellarResponse) -> Self {
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
    keys: Vec<[u8; 32]>,
}

struct SignContext {
    init: SignTxnInitiate,
    receiver: Option<ChunkedReceiver>,
    transaction: Vec<u8>,
    decoded: Option<xdr::DecodedTxn>,
    screens: Vec<Screen>,
    /// Send-leg swap token consumed at initiate: destination must match
    /// the exchange flow's stored receive address
    swap_verification: bool,
    signature: Option<[u8; SIGNATURE_SIZE]>,
}

/// Stellar signing engine
pub struct StellarEngine<DRV: Driver> {
    state: State,
    sign: Option<SignContext>,
    pubkeys: Option<PubkeysContext>,
    drv: DRV,
}

impl<DRV: Driver> StellarEngine<DRV> {
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

    /// Handle one event; the exchange context carries the swap queue and
    /// the cross-leg receive-address record
    pub fn update(
        &mut self,
        evt: StellarEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<StellarOutput, Error> {
        let r = self.step(evt, exchange);
        if let Err(e) = &r {
            self.abort(e);
        }
        r
    }

    fn abort(&mut self, e: &Error) {
        log::warn!("stellar session aborted: {e}");
        self.sign = None;
        self.pubkeys = None;
        self.state = match e {
            Error::Rejected(_) | Error::Cancelled => State::Denied,
            _ => State::Failed,
        };
    }

    fn step(
        &mut self,
        evt: StellarEvent,
        exchange: &mut ExchangeContext,
    ) -> Result<StellarOutput, Error> {
        use StellarEvent::*;

        match (self.state, evt) {
            (_, Cancel) => Err(Error::Cancelled),

            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StellarRequest::GetPublicKeys(init)),
            ) => self.pubkeys_init(init, false),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StellarRequest::GetUserVerifiedPublicKey(init)),
            ) => self.pubkeys_init(init, true),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(StellarRequest::SignTxn(SignTxnRequest::Initiate(init))),
            ) => self.sign_init(init, exchange),

            (State::PubkeysConfirm, Approve) => self.pubkeys_derive(),
            (State::PubkeysConfirm, Deny) => {
                Err(Error::Rejected(UserRejection::Confirmation))
            }
            (State::PubkeysVerify, Approve) => self.pubkeys_respond(),
            (State::PubkeysVerify, Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (State::SignConfirm, Approve) => self.sign_confirmed(),
            (State::SignConfirm, Deny) => Err(Error::Rejected(UserRejection::Confirmation)),

            (
                State::SignAwaitData,
                Host(StellarRequest::SignTxn(SignTxnRequest::TxnData(payload))),
            ) => self.sign_data(payload, exchange),

            (State::SignVerify(n), Approve) => self.sign_verify_step(n),
            (State::SignVerify(_), Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (
                State::SignAwaitSignature,
                Host(StellarRequest::SignTxn(SignTxnRequest::Signature)),
            ) => self.sign_respond(),

            (_, Approve | Deny) => Err(Error::UnexpectedDecision),
            (_state, Host(_req)) => {
                log::error!("unexpected stellar request in state {_state:?}");
                Err(Error::UnexpectedRequest)
            }
        }
    }

    fn pubkeys_init(
        &mut self,
        init: GetPublicKeysInitiate,
        verified: bool,
    ) -> Result<StellarOutput, Error> {
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
            format!("Verify {STELLAR_NAME} address for wallet {name}?")
        } else {
            format!("Add {STELLAR_NAME} account to wallet {name}?")
        };

        self.pubkeys = Some(PubkeysContext {
            init,
            verified,
            keys: Vec::new(),
        });
        self.state = State::PubkeysConfirm;

        Ok(StellarOutput::prompt(Screen::confirm(msg)))
    }

    fn pubkeys_derive(&mut self) -> Result<StellarOutput, Error> {
        let ctx = self.pubkeys.as_mut().ok_or(Error::UnexpectedDecision)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        for raw in &ctx.init.derivation_paths {
            let private = derive_ed25519(&seed, raw);
            ctx.keys.push(ed25519_public_key(&private));
        }
        drop(seed);

        if ctx.verified {
            let address = strkey::encode_account_id(&ctx.keys[0]);
            self.state = State::PubkeysVerify;
            Ok(StellarOutput::prompt(Screen::scroll(
                "Verify address",
                address,
            )))
        } else {
            self.pubkeys_respond()
        }
    }

    fn pubkeys_respond(&mut self) -> Result<StellarOutput, Error> {
        let ctx = self.pubkeys.take().ok_or(Error::UnexpectedDecision)?;
        self.state = State::Complete;
        Ok(StellarOutput::respond(StellarResponse::PublicKeys(
            ctx.keys,
        )))
    }

    fn sign_init(
        &mut self,
        init: SignTxnInitiate,
        exchange: &mut ExchangeContext,
    ) -> Result<StellarOutput, Error> {
        let path = DerivationPath::from_slice(&init.derivation_path)?;
        if !derivation_path_guard(&path) {
            return Err(Error::InvalidPath);
        }

        // consume this app's send-leg token if a swap flow is running
        let swap_verification = exchange.validate_send(applet::STELLAR, &init.wallet_id);

        let name = self
            .drv
            .wallet_name(&init.wallet_id)
            .ok_or(Error::UnknownWallet)?;
        let msg = format!("Sign {STELLAR_NAME} transaction using wallet {name}?");

        self.sign = Some(SignContext {
            init,
            receiver: None,
            transaction: Vec::new(),
            decoded: None,
            screens: Vec::new(),
            swap_verification,
            signature: None,
        });
        self.state = State::SignConfirm;

        Ok(StellarOutput::prompt(Screen::confirm(msg)))
    }

    fn sign_confirmed(&mut self) -> Result<StellarOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;

        ctx.receiver = Some(ChunkedReceiver::new(ctx.init.transaction_size)?);
        self.state = State::SignAwaitData;

        Ok(StellarOutput::respond(StellarResponse::SignTxn(
            SignTxnResponse::Confirmation,
        )))
    }

    fn sign_data(
        &mut self,
        payload: ChunkPayload,
        exchange: &mut ExchangeContext,
    ) -> Result<StellarOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;

        let ack = match ctx.receiver.as_mut() {
            Some(rx) => rx.ingest(&payload)?,
            None => return Err(Error::UnexpectedRequest),
        };
        let mut out = StellarOutput::respond(StellarResponse::SignTxn(
            SignTxnResponse::DataAccepted(ack),
        ));

        if ctx.receiver.as_ref().is_some_and(|rx| rx.is_complete()) {
            let buffer = match ctx.receiver.take() {
                Some(rx) => rx.finish()?,
                None => return Err(Error::DataFlow),
            };

            let decoded = xdr::decode(&buffer)?;

            let to_address = strkey::encode_account_id(decoded.operation.destination());
            if ctx.swap_verification && !exchange.validate_stored_address(&to_address) {
                return Err(Error::ExchangeMismatch);
            }

            ctx.screens = verify_screens(&decoded, &to_address);
            ctx.transaction = buffer;
            ctx.decoded = Some(decoded);

            self.state = State::SignVerify(0);
            out.prompt = Some(ctx.screens[0].clone());
        }

        Ok(out)
    }

    fn sign_verify_step(&mut self, n: usize) -> Result<StellarOutput, Error> {
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
            return Ok(StellarOutput {
                response: None,
                prompt: screen,
            });
        }

        // all screens approved: reconstruct the seed and sign now, the
        // host collects the signature with its next request
        self.sign_txn()?;
        self.state = State::SignAwaitSignature;
        Ok(StellarOutput::none())
    }

    fn sign_txn(&mut self) -> Result<(), Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;
        let decoded = ctx.decoded.as_ref().ok_or(Error::UnexpectedRequest)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;

        let private = derive_ed25519(&seed, &ctx.init.derivation_path);
        drop(seed);

        let hash = transaction_hash(&ctx.transaction[..decoded.tagged_txn_len]);

        let signing = SigningKey::from_bytes(&private);
        ctx.signature = Some(signing.sign(&hash).to_bytes());

        drop(private);
        drop(signing);
        Ok(())
    }

    fn sign_respond(&mut self) -> Result<StellarOutput, Error> {
        let ctx = self.sign.take().ok_or(Error::UnexpectedRequest)?;
        let signature = ctx.signature.ok_or(Error::SignError(1))?;

        self.state = State::Complete;
        Ok(StellarOutput::respond(StellarResponse::SignTxn(
            SignTxnResponse::Signature(signature),
        )))
    }
}

/// Build the ordered verification screens for a decoded envelope
fn verify_screens(tx: &xdr::DecodedTxn, to_address: &str) -> Vec<Screen> {
    let from_address = strkey::encode_account_id(&tx.source_account);

    let mut screens = vec![
        Screen::confirm(format!("Operation: {}", tx.operation.name())),
        Screen::scroll("From", from_address),
        Screen::scroll("Verify address", to_address.to_string()),
        Screen::confirm(format!(
            "Verify amount\n{} {STELLAR_LUNIT}",
            format_units_u64(tx.operation.amount(), STELLAR_DECIMALS, STELLAR_DECIMALS)
        )),
        Screen::confirm(format!("Fee: {} stroops", tx.fee)),
        Screen::confirm(format!("Sequence: {}", tx.sequence_number)),
    ];

    screens.push(match &tx.memo {
        xdr::Memo::None => Screen::confirm("Memo: (none)".to_string()),
        xdr::Memo::Text(t) => Screen::confirm(format!("Memo: \"{t}\"")),
        xdr::Memo::Id(id) => Screen::confirm(format!("Memo ID: {id}")),
        xdr::Memo::Hash(h) | xdr::Memo::Return(h) => {
            Screen::confirm(format!("Memo Hash: {}", hex::encode(h)))
        }
    });

    screens
}

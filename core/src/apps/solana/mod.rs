// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Solana coin app.
//!
//! Two host flows drive the [`SolanaEngine`]: public-key export and
//! transaction signing. Signing walks the shared shape: initiate, consent,
//! chunked transaction transfer, decode + whitelist validation, per-field
//! verification screens, seed reconstruction, then an ED25519 signature
//! over the raw transaction bytes after the latest blockhash has been
//! substituted in.

pub mod txn;

use ed25519_dalek::{Signer, SigningKey};
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use vault_apps_proto::chunk::ChunkPayload;
use vault_apps_proto::error::UserRejection;
use vault_apps_proto::solana::{
    SignTxnInitiate, SignTxnRequest, SignTxnResponse, SolanaRequest, SolanaResponse,
};
use vault_apps_proto::GetPublicKeysInitiate;

use crate::derive::{
    derive_ed25519, ed25519_public_key, harden, is_hardened, DerivationPath, Seed,
};
use crate::driver::{Driver, Screen};
use crate::error::Error;
use crate::format::{format_units_u128, format_units_u64, SOLANA_DECIMALS};
use crate::transfer::ChunkedReceiver;

/// Display name / ticker
pub const SOLANA_NAME: &str = "Solana";
pub const SOLANA_LUNIT: &str = "SOL";

/// `m/44'`
pub const PURPOSE_INDEX: u32 = harden(44);
/// `m/44'/501'`
pub const COIN_INDEX: u32 = harden(501);
/// Block-explorer change level, `0'`
pub const CHANGE_INDEX: u32 = harden(0);

/// Accepted account paths: `m/44'/501'`, `m/44'/501'/i'` or
/// `m/44'/501'/i'/0'`
pub fn derivation_path_guard(path: &[u32]) -> bool {
    match path {
        [purpose, coin] => *purpose == PURPOSE_INDEX && *coin == COIN_INDEX,
        [purpose, coin, account] => {
            *purpose == PURPOSE_INDEX && *coin == COIN_INDEX && is_hardened(*account)
        }
        [purpose, coin, account, change] => {
            *purpose == PURPOSE_INDEX
                && *coin == COIN_INDEX
                && is_hardened(*account)
                && *change == CHANGE_INDEX
        }
        _ => false,
    }
}

/// Engine input events: host requests plus user decisions and the
/// priority-zero cancellation
#[derive(Clone, Debug)]
pub enum SolanaEvent {
    Host(SolanaRequest),
    Approve,
    Deny,
    Cancel,
}

/// Engine output: the response to transmit and/or the screen to display
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SolanaOutput {
    pub response: Option<SolanaResponse>,
    pub prompt: Option<Screen>,
}

impl SolanaOutput {
    fn none() -> Self {
        Self::default()
    }

    fn respond(response: SolanaResponse) -> Self {
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
    /// Idle, no session running
    Init,
    /// Public-key export consent pending
    PubkeysConfirm,
    /// Address verification pending (user-verified export)
    PubkeysVerify,
    /// Send consent pending
    SignConfirm,
    /// Receiving chunked transaction data
    SignAwaitData,
    /// Verification screen `n` pending approval
    SignVerify(usize),
    /// Awaiting the host verify request (gates seed reconstruction)
    SignAwaitVerify,
    /// Awaiting the signature request carrying the latest blockhash
    SignAwaitSignature,
    /// Session finished successfully
    Complete,
    /// Session ended by rejection or cancellation
    Denied,
    /// Session ended by error
    Failed,
}

/// Per-session public-key export context
struct PubkeysContext {
    init: GetPublicKeysInitiate,
    verified: bool,
    keys: Vec<[u8; 32]>,
}

/// Per-session signing context; dropped (zeroizing the seed) on every exit
struct SignContext {
    init: SignTxnInitiate,
    receiver: Option<ChunkedReceiver>,
    transaction: Vec<u8>,
    decoded: Option<txn::UnsignedMessage>,
    screens: Vec<Screen>,
    seed: Option<Seed>,
}

/// Solana signing engine
pub struct SolanaEngine<DRV: Driver> {
    state: State,
    sign: Option<SignContext>,
    pubkeys: Option<PubkeysContext>,
    drv: DRV,
}

impl<DRV: Driver> SolanaEngine<DRV> {
    pub fn new(drv: DRV) -> Self {
        Self {
            state: State::Init,
            sign: None,
            pubkeys: None,
            drv,
        }
    }

    /// Fetch current engine state
    pub fn state(&self) -> State {
        self.state
    }

    /// Handle one event; on error the session context is dropped and all
    /// key material zeroized before returning
    pub fn update(&mut self, evt: SolanaEvent) -> Result<SolanaOutput, Error> {
        let r = self.step(evt);
        if let Err(e) = &r {
            self.abort(e);
        }
        r
    }

    fn abort(&mut self, e: &Error) {
        log::warn!("solana session aborted: {e}");
        self.sign = None;
        self.pubkeys = None;
        self.state = match e {
            Error::Rejected(_) | Error::Cancelled => State::Denied,
            _ => State::Failed,
        };
    }

    fn step(&mut self, evt: SolanaEvent) -> Result<SolanaOutput, Error> {
        use SolanaEvent::*;

        match (self.state, evt) {
            // P0 event: abort from any state, no signature is ever sent
            (_, Cancel) => Err(Error::Cancelled),

            // Fresh flows start only when no session is outstanding
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(SolanaRequest::GetPublicKeys(init)),
            ) => self.pubkeys_init(init, false),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(SolanaRequest::GetUserVerifiedPublicKey(init)),
            ) => self.pubkeys_init(init, true),
            (
                State::Init | State::Complete | State::Denied | State::Failed,
                Host(SolanaRequest::SignTxn(SignTxnRequest::Initiate(init))),
            ) => self.sign_init(init),

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
                Host(SolanaRequest::SignTxn(SignTxnRequest::TxnData(payload))),
            ) => self.sign_data(payload),

            (State::SignVerify(n), Approve) => self.sign_verify_step(n),
            (State::SignVerify(_), Deny) => Err(Error::Rejected(UserRejection::Verification)),

            (State::SignAwaitVerify, Host(SolanaRequest::SignTxn(SignTxnRequest::Verify))) => {
                self.sign_fetch_seed()
            }

            (
                State::SignAwaitSignature,
                Host(SolanaRequest::SignTxn(SignTxnRequest::Signature { blockhash })),
            ) => self.sign_and_respond(blockhash),

            (_, Approve | Deny) => Err(Error::UnexpectedDecision),
            (_state, Host(_req)) => {
                log::error!("unexpected solana request in state {_state:?}");
                Err(Error::UnexpectedRequest)
            }
        }
    }

    fn pubkeys_init(
        &mut self,
        init: GetPublicKeysInitiate,
        verified: bool,
    ) -> Result<SolanaOutput, Error> {
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
            format!("Verify {SOLANA_NAME} address for wallet {name}?")
        } else {
            format!("Add {SOLANA_NAME} account to wallet {name}?")
        };

        self.pubkeys = Some(PubkeysContext {
            init,
            verified,
            keys: Vec::new(),
        });
        self.state = State::PubkeysConfirm;

        Ok(SolanaOutput::prompt(Screen::confirm(msg)))
    }

    fn pubkeys_derive(&mut self) -> Result<SolanaOutput, Error> {
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
            let address = bs58::encode(&ctx.keys[0]).into_string();
            self.state = State::PubkeysVerify;
            Ok(SolanaOutput::prompt(Screen::scroll("Verify address", address)))
        } else {
            self.pubkeys_respond()
        }
    }

    fn pubkeys_respond(&mut self) -> Result<SolanaOutput, Error> {
        let ctx = self.pubkeys.take().ok_or(Error::UnexpectedDecision)?;
        self.state = State::Complete;
        Ok(SolanaOutput::respond(SolanaResponse::PublicKeys(ctx.keys)))
    }

    fn sign_init(&mut self, init: SignTxnInitiate) -> Result<SolanaOutput, Error> {
        let path = DerivationPath::from_slice(&init.derivation_path)?;
        if !derivation_path_guard(&path) {
            return Err(Error::InvalidPath);
        }

        let name = self
            .drv
            .wallet_name(&init.wallet_id)
            .ok_or(Error::UnknownWallet)?;
        let msg = format!("Send {SOLANA_LUNIT} ({SOLANA_NAME}) using wallet {name}?");

        self.sign = Some(SignContext {
            init,
            receiver: None,
            transaction: Vec::new(),
            decoded: None,
            screens: Vec::new(),
            seed: None,
        });
        self.state = State::SignConfirm;

        Ok(SolanaOutput::prompt(Screen::confirm(msg)))
    }

    fn sign_confirmed(&mut self) -> Result<SolanaOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedDecision)?;

        // single allocation for the whole transfer, bounded in new()
        ctx.receiver = Some(ChunkedReceiver::new(ctx.init.transaction_size)?);
        self.state = State::SignAwaitData;

        Ok(SolanaOutput::respond(SolanaResponse::SignTxn(
            SignTxnResponse::Confirmation,
        )))
    }

    fn sign_data(&mut self, payload: ChunkPayload) -> Result<SolanaOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;

        let ack = match ctx.receiver.as_mut() {
            Some(rx) => rx.ingest(&payload)?,
            None => return Err(Error::UnexpectedRequest),
        };
        let mut out = SolanaOutput::respond(SolanaResponse::SignTxn(
            SignTxnResponse::DataAccepted(ack),
        ));

        if ctx.receiver.as_ref().is_some_and(|rx| rx.is_complete()) {
            let buffer = match ctx.receiver.take() {
                Some(rx) => rx.finish()?,
                None => return Err(Error::DataFlow),
            };

            let decoded = txn::decode(&buffer)?;
            txn::validate(&decoded)?;

            ctx.screens = verify_screens(&decoded);
            ctx.transaction = buffer;
            ctx.decoded = Some(decoded);

            self.state = State::SignVerify(0);
            out.prompt = Some(ctx.screens[0].clone());
        }

        Ok(out)
    }

    fn sign_verify_step(&mut self, n: usize) -> Result<SolanaOutput, Error> {
        let ctx = self.sign.as_ref().ok_or(Error::UnexpectedDecision)?;

        let next = n + 1;
        if next < ctx.screens.len() {
            self.state = State::SignVerify(next);
            Ok(SolanaOutput::prompt(ctx.screens[next].clone()))
        } else {
            self.state = State::SignAwaitVerify;
            Ok(SolanaOutput::none())
        }
    }

    fn sign_fetch_seed(&mut self) -> Result<SolanaOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;
        let wallet_id = ctx.init.wallet_id;

        let seed = self
            .drv
            .reconstruct_seed(&wallet_id)
            .ok_or(Error::SeedRecovery)?;
        ctx.seed = Some(seed);

        self.state = State::SignAwaitSignature;
        Ok(SolanaOutput::respond(SolanaResponse::SignTxn(
            SignTxnResponse::Verify,
        )))
    }

    fn sign_and_respond(&mut self, blockhash: [u8; 32]) -> Result<SolanaOutput, Error> {
        let ctx = self.sign.as_mut().ok_or(Error::UnexpectedRequest)?;
        let decoded = ctx.decoded.as_ref().ok_or(Error::UnexpectedRequest)?;

        // substitute the latest blockhash before signing
        txn::update_blockhash(&mut ctx.transaction, decoded.blockhash_offset, &blockhash)?;

        let seed = ctx.seed.as_ref().ok_or(Error::SeedRecovery)?;
        let private = derive_ed25519(seed, &ctx.init.derivation_path);
        let signing = SigningKey::from_bytes(&private);

        let signature = signing.sign(&ctx.transaction).to_bytes();

        // key material cleared before the response leaves the engine
        drop(private);
        drop(signing);
        ctx.seed = None;

        self.sign = None;
        self.state = State::Complete;

        Ok(SolanaOutput::respond(SolanaResponse::SignTxn(
            SignTxnResponse::Signature(signature),
        )))
    }
}

/// Build the ordered verification screens for a validated message
fn verify_screens(msg: &txn::UnsignedMessage) -> Vec<Screen> {
    let mut screens = Vec::new();

    match msg.transfer() {
        Some(txn::InstructionKind::Transfer(t)) => {
            screens.push(Screen::scroll(
                "Verify address",
                bs58::encode(t.recipient_account).into_string(),
            ));
            screens.push(Screen::confirm(format!(
                "Verify amount\n{} {SOLANA_LUNIT}",
                format_units_u64(t.lamports, SOLANA_DECIMALS, SOLANA_DECIMALS)
            )));
        }
        Some(txn::InstructionKind::TransferChecked(t)) => {
            screens.push(Screen::scroll(
                "Verify token",
                bs58::encode(t.token_mint).into_string(),
            ));
            screens.push(Screen::scroll(
                "Verify address",
                bs58::encode(t.destination).into_string(),
            ));
            screens.push(Screen::confirm(format!(
                "Verify amount\n{}",
                format_units_u64(t.amount, t.decimals as usize, t.decimals as usize)
            )));
        }
        // validate() guarantees a transfer is present
        _ => (),
    }

    if msg.compute_unit_price_micro_lamports > 0 {
        // price is micro-lamports per compute unit: 15 decimals to SOL
        screens.push(Screen::confirm(format!(
            "Priority fee\n{} {SOLANA_LUNIT}",
            format_units_u128(msg.priority_fee_micro_lamports(), SOLANA_DECIMALS + 6, 9)
        )));
    }

    screens
}

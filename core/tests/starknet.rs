// Copyright (c) 2022-2023 The MobileCoin Foundation

//! End-to-end Starknet engine walks.

mod common;

use common::{TestDriver, WALLET_ID};

use vault_apps_core::apps::exchange::ExchangeContext;
use vault_apps_core::apps::starknet::{
    curve, hash, keys, State, StarknetEngine, StarknetEvent,
};
use vault_apps_core::error::Error;
use vault_apps_core::proto::starknet::{
    DeployAccountTxn, InvokeTxn, ResourceBound, ResourceBounds, SignTxnInitiate,
    SignTxnRequest, SignTxnResponse, StarknetRequest, StarknetResponse, UnsignedTxn,
};

fn sign_path() -> Vec<u32> {
    vec![
        keys::PURPOSE_INDEX,
        keys::LAYER_INDEX,
        keys::APPLICATION_INDEX,
        keys::ETH_1_INDEX,
        keys::ETH_2_INDEX,
        0,
    ]
}

fn sample_bounds() -> ResourceBounds {
    ResourceBounds {
        level_1: ResourceBound {
            max_amount: vec![0x00, 0x20],
            max_price_per_unit: vec![0x01, 0x00, 0x00],
        },
        level_2: ResourceBound {
            max_amount: vec![],
            max_price_per_unit: vec![],
        },
    }
}

fn sample_invoke() -> InvokeTxn {
    InvokeTxn {
        sender_address: [0x05; 32],
        version: 3,
        chain_id: b"SN_MAIN".to_vec(),
        nonce: vec![0x17],
        tip: 0,
        resource_bounds: sample_bounds(),
        nonce_data_availability_mode: 0,
        fee_data_availability_mode: 0,
        calldata: vec![
            vec![0x01],
            vec![0x02],
            vec![0x03],
            vec![0x00],
            vec![0xaa; 32],
            vec![0x10],
        ],
    }
}

fn run_sign_flow(
    engine: &mut StarknetEngine<TestDriver>,
    exchange: &mut ExchangeContext,
    txn: UnsignedTxn,
) -> Result<[u8; 64], Error> {
    let init = SignTxnInitiate {
        wallet_id: WALLET_ID,
        derivation_path: sign_path(),
    };
    engine.update(
        StarknetEvent::Host(StarknetRequest::SignTxn(SignTxnRequest::Initiate(init))),
        exchange,
    )?;
    engine.update(StarknetEvent::Approve, exchange)?;

    let out = engine.update(
        StarknetEvent::Host(StarknetRequest::SignTxn(SignTxnRequest::Txn(txn))),
        exchange,
    )?;
    assert_eq!(
        out.response,
        Some(StarknetResponse::SignTxn(SignTxnResponse::UnsignedTxnAccepted))
    );

    while matches!(engine.state(), State::SignVerify(_)) {
        engine.update(StarknetEvent::Approve, exchange)?;
    }
    assert_eq!(engine.state(), State::SignAwaitSignature);

    let out = engine.update(
        StarknetEvent::Host(StarknetRequest::SignTxn(SignTxnRequest::Signature)),
        exchange,
    )?;
    match out.response {
        Some(StarknetResponse::SignTxn(SignTxnResponse::Signature(sig))) => Ok(sig),
        r => panic!("unexpected response: {r:?}"),
    }
}

#[test]
fn sign_invoke_end_to_end() {
    let drv = TestDriver::new();
    let seed = drv.seed();
    let mut engine = StarknetEngine::new(drv);
    let mut exchange = ExchangeContext::new();

    let txn = sample_invoke();
    let expected_hash = hash::invoke_txn_hash(&txn).to_be_bytes();

    let signature = run_sign_flow(&mut engine, &mut exchange, UnsignedTxn::Invoke(txn)).unwrap();
    assert_eq!(engine.state(), State::Complete);

    // verify against the independently derived public point
    let (private, _public) = keys::derive_key_from_seed(&seed, &sign_path()).unwrap();
    let point = curve::public_point(&private);
    assert!(curve::verify_digest(&point, &expected_hash, &signature));
}

#[test]
fn sign_deploy_account_end_to_end() {
    let drv = TestDriver::new();
    let seed = drv.seed();
    let mut engine = StarknetEngine::new(drv);
    let mut exchange = ExchangeContext::new();

    let txn = DeployAccountTxn {
        contract_address: [0x09; 32],
        class_hash: [0x01; 32],
        salt: [0x02; 32],
        version: 3,
        chain_id: b"SN_MAIN".to_vec(),
        nonce: vec![0x00],
        tip: 0,
        resource_bounds: sample_bounds(),
        nonce_data_availability_mode: 0,
        fee_data_availability_mode: 0,
        constructor_call_data: vec![vec![0x01], vec![0x02]],
    };
    let expected_hash = hash::deploy_account_txn_hash(&txn).to_be_bytes();

    let signature =
        run_sign_flow(&mut engine, &mut exchange, UnsignedTxn::DeployAccount(txn)).unwrap();

    let (private, _public) = keys::derive_key_from_seed(&seed, &sign_path()).unwrap();
    let point = curve::public_point(&private);
    assert!(curve::verify_digest(&point, &expected_hash, &signature));
}

#[test]
fn get_public_keys_returns_ground_key() {
    let drv = TestDriver::new();
    let seed = drv.seed();
    let mut engine = StarknetEngine::new(drv);
    let mut exchange = ExchangeContext::new();

    let init = vault_apps_core::proto::GetPublicKeysInitiate {
        wallet_id: WALLET_ID,
        derivation_paths: vec![sign_path()],
    };
    engine
        .update(
            StarknetEvent::Host(StarknetRequest::GetPublicKeys(init)),
            &mut exchange,
        )
        .expect("initiate");
    let out = engine
        .update(StarknetEvent::Approve, &mut exchange)
        .expect("approve");

    let keys_out = match out.response {
        Some(StarknetResponse::PublicKeys(keys)) => keys,
        r => panic!("unexpected response: {r:?}"),
    };

    let (_private, public) = keys::derive_key_from_seed(&seed, &sign_path()).unwrap();
    assert_eq!(keys_out[0], public);
}

#[test]
fn malformed_invoke_calldata_aborts() {
    let mut engine = StarknetEngine::new(TestDriver::new());
    let mut exchange = ExchangeContext::new();

    let mut txn = sample_invoke();
    txn.calldata.truncate(2);

    let r = run_sign_flow(&mut engine, &mut exchange, UnsignedTxn::Invoke(txn));
    assert!(matches!(r, Err(Error::InvalidTxn(_))));
    assert_eq!(engine.state(), State::Failed);
}

#[test]
fn signature_request_before_txn_is_protocol_error() {
    let mut engine = StarknetEngine::new(TestDriver::new());
    let mut exchange = ExchangeContext::new();

    let init = SignTxnInitiate {
        wallet_id: WALLET_ID,
        derivation_path: sign_path(),
    };
    engine
        .update(
            StarknetEvent::Host(StarknetRequest::SignTxn(SignTxnRequest::Initiate(init))),
            &mut exchange,
        )
        .unwrap();
    engine.update(StarknetEvent::Approve, &mut exchange).unwrap();

    let r = engine.update(
        StarknetEvent::Host(StarknetRequest::SignTxn(SignTxnRequest::Signature)),
        &mut exchange,
    );
    assert_eq!(r, Err(Error::UnexpectedRequest));
    assert_eq!(engine.state(), State::Failed);
}

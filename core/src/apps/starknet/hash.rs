// Copyright (c) 2022-2023 The MobileCoin Foundation

//! V3 transaction hashing (invoke and deploy-account).
//!
//! The overall hash chains a fixed ASCII prefix, the fee field hash, the
//! data-availability-mode hash, and per-type additional data through one
//! Poseidon sponge. Resource bounds pack the gas name, max amount and max
//! price per unit into a single felt:
//! `name << 192 | max_amount << 128 | max_price_per_unit`.

use num_bigint::BigUint;

use super::felt::Felt;
use super::poseidon::poseidon_hash_many;
use vault_apps_proto::starknet::{DeployAccountTxn, InvokeTxn, ResourceBound, UnsignedTxn};

/// Prefix felt for invoke transactions
const INVOKE_TXN_PREFIX: &[u8] = b"invoke";

/// Prefix felt for deploy-account transactions
const DEPLOY_ACCOUNT_PREFIX: &[u8] = b"deploy_account";

/// Gas-name constants packed into the resource-bounds felts
const L1_GAS_NAME: &[u8] = b"L1_GAS";
const L2_GAS_NAME: &[u8] = b"L2_GAS";

const MAX_PRICE_PER_UNIT_BITS: u32 = 128;
const MAX_AMOUNT_BITS: u32 = 64;
const RESOURCE_VALUE_OFFSET: u32 = MAX_AMOUNT_BITS + MAX_PRICE_PER_UNIT_BITS;
const DATA_AVAILABILITY_MODE_BITS: u32 = 32;

/// Pack one gas level's bounds into a felt
fn encode_resource_bounds(gas_name: &[u8], bound: &ResourceBound) -> Felt {
    let mut value = BigUint::from_bytes_be(gas_name) << RESOURCE_VALUE_OFFSET;
    value += BigUint::from_bytes_be(&bound.max_amount) << MAX_PRICE_PER_UNIT_BITS;
    value += BigUint::from_bytes_be(&bound.max_price_per_unit);
    Felt::from_biguint_reduced(value)
}

/// `poseidon([tip, l1_bounds, l2_bounds])`
fn hash_fee_field(
    tip: u8,
    level_1: &ResourceBound,
    level_2: &ResourceBound,
) -> Felt {
    let state = [
        Felt::from_u64(tip as u64),
        encode_resource_bounds(L1_GAS_NAME, level_1),
        encode_resource_bounds(L2_GAS_NAME, level_2),
    ];
    poseidon_hash_many(&state)
}

/// `(nonce_mode << 32) + fee_mode` as a felt
fn hash_da_mode(nonce_da_mode: u8, fee_da_mode: u8) -> Felt {
    let value = (BigUint::from(nonce_da_mode) << DATA_AVAILABILITY_MODE_BITS)
        + BigUint::from(fee_da_mode);
    Felt::from_biguint_reduced(value)
}

/// Hash a list of big-endian byte strings as felts
fn hash_felt_list(values: &[Vec<u8>]) -> Felt {
    let felts: Vec<Felt> = values.iter().map(|v| Felt::from_be_bytes(v)).collect();
    poseidon_hash_many(&felts)
}

#[allow(clippy::too_many_arguments)]
fn transaction_hash_common(
    prefix: &[u8],
    tip: u8,
    level_1: &ResourceBound,
    level_2: &ResourceBound,
    nonce_da_mode: u8,
    fee_da_mode: u8,
    version: u8,
    sender_address: &[u8; 32],
    chain_id: &[u8],
    nonce: &[u8],
    additional_data: &[Felt],
) -> Felt {
    let mut state = vec![
        Felt::from_be_bytes(prefix),
        Felt::from_u64(version as u64),
        Felt::from_be_bytes(sender_address),
        hash_fee_field(tip, level_1, level_2),
        // paymaster_data, reserved for future use
        poseidon_hash_many(&[]),
        Felt::from_be_bytes(chain_id),
        Felt::from_be_bytes(nonce),
        hash_da_mode(nonce_da_mode, fee_da_mode),
    ];
    state.extend_from_slice(additional_data);

    poseidon_hash_many(&state)
}

/// Hash an invoke transaction
pub fn invoke_txn_hash(txn: &InvokeTxn) -> Felt {
    let additional_data = [
        // account_deployment_data, currently unused
        poseidon_hash_many(&[]),
        hash_felt_list(&txn.calldata),
    ];

    transaction_hash_common(
        INVOKE_TXN_PREFIX,
        txn.tip,
        &txn.resource_bounds.level_1,
        &txn.resource_bounds.level_2,
        txn.nonce_data_availability_mode,
        txn.fee_data_availability_mode,
        txn.version,
        &txn.sender_address,
        &txn.chain_id,
        &txn.nonce,
        &additional_data,
    )
}

/// Hash a deploy-account transaction
pub fn deploy_account_txn_hash(txn: &DeployAccountTxn) -> Felt {
    let additional_data = [
        hash_felt_list(&txn.constructor_call_data),
        Felt::from_be_bytes(&txn.class_hash),
        Felt::from_be_bytes(&txn.salt),
    ];

    transaction_hash_common(
        DEPLOY_ACCOUNT_PREFIX,
        txn.tip,
        &txn.resource_bounds.level_1,
        &txn.resource_bounds.level_2,
        txn.nonce_data_availability_mode,
        txn.fee_data_availability_mode,
        txn.version,
        &txn.contract_address,
        &txn.chain_id,
        &txn.nonce,
        &additional_data,
    )
}

/// Dispatch on the transaction union
pub fn txn_hash(txn: &UnsignedTxn) -> Felt {
    match txn {
        UnsignedTxn::Invoke(t) => invoke_txn_hash(t),
        UnsignedTxn::DeployAccount(t) => deploy_account_txn_hash(t),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use vault_apps_proto::starknet::ResourceBounds;

    pub fn sample_bounds() -> ResourceBounds {
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

    pub fn sample_invoke() -> InvokeTxn {
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

    #[test]
    fn resource_bounds_packing() {
        let bound = ResourceBound {
            max_amount: vec![0x01],
            max_price_per_unit: vec![0x02],
        };
        let felt = encode_resource_bounds(L1_GAS_NAME, &bound);

        let expected = (BigUint::from_bytes_be(L1_GAS_NAME) << 192u32)
            + (BigUint::from(1u32) << 128u32)
            + BigUint::from(2u32);
        assert_eq!(felt, Felt::from_biguint_reduced(expected));
    }

    #[test]
    fn da_mode_packing() {
        let felt = hash_da_mode(1, 1);
        let expected = (BigUint::from(1u32) << 32u32) + BigUint::from(1u32);
        assert_eq!(felt, Felt::from_biguint_reduced(expected));

        assert_ne!(hash_da_mode(0, 1), hash_da_mode(1, 0));
    }

    #[test]
    fn invoke_hash_sensitivity() {
        let txn = sample_invoke();
        let base = invoke_txn_hash(&txn);

        // deterministic
        assert_eq!(base, invoke_txn_hash(&txn));

        // every signed field moves the hash
        let mut t = sample_invoke();
        t.nonce = vec![0x18];
        assert_ne!(base, invoke_txn_hash(&t));

        let mut t = sample_invoke();
        t.calldata[5] = vec![0x11];
        assert_ne!(base, invoke_txn_hash(&t));

        let mut t = sample_invoke();
        t.tip = 1;
        assert_ne!(base, invoke_txn_hash(&t));

        let mut t = sample_invoke();
        t.chain_id = b"SN_SEPOLIA".to_vec();
        assert_ne!(base, invoke_txn_hash(&t));
    }

    #[test]
    fn invoke_and_deploy_prefixes_differ() {
        let invoke = sample_invoke();

        let deploy = DeployAccountTxn {
            contract_address: invoke.sender_address,
            class_hash: [0x01; 32],
            salt: [0x02; 32],
            version: 3,
            chain_id: invoke.chain_id.clone(),
            nonce: invoke.nonce.clone(),
            tip: 0,
            resource_bounds: sample_bounds(),
            nonce_data_availability_mode: 0,
            fee_data_availability_mode: 0,
            constructor_call_data: vec![],
        };

        assert_ne!(
            invoke_txn_hash(&invoke),
            deploy_account_txn_hash(&deploy)
        );
    }
}

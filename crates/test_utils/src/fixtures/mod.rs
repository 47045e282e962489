// Path: crates/test_utils/src/fixtures/mod.rs
//! Deterministic identifiers, keys and provider payloads.
//!
//! Every fixture is a pure function of a small seed, so two tests using the
//! same seed see the same bytes.

use mnq_crypto::sign::bls::BlsSecretKey;
use mnq_types::app::{ChainTx, ProRegTx, ProUpServTx, ProviderTx, TxOut};
use mnq_types::{BlsPublicKeyBytes, Hash256, KeyId, NevmAddress, OutPoint, Script, ServiceAddr};

/// A hash whose every byte is `seed`.
pub fn hash(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// A hash spreading `n` over its first bytes, for fixtures needing more than 256 ids.
pub fn hash_n(n: u32) -> Hash256 {
    let mut bytes = [0x5a; 32];
    bytes[..4].copy_from_slice(&n.to_be_bytes());
    Hash256(bytes)
}

pub fn key_id(seed: u8) -> KeyId {
    KeyId([seed; 20])
}

pub fn service_addr(seed: u8) -> ServiceAddr {
    ServiceAddr::from_ipv4([10, 0, 0, seed], 8369)
}

pub fn nevm(seed: u8) -> NevmAddress {
    NevmAddress(vec![seed; NevmAddress::LEN])
}

/// A BLS operator key derived from `seed`.
#[allow(clippy::expect_used)]
pub fn bls_key(seed: u64) -> BlsSecretKey {
    let mut ikm = [0x42u8; 32];
    ikm[..8].copy_from_slice(&seed.to_le_bytes());
    BlsSecretKey::from_seed(&ikm).expect("32 bytes of ikm")
}

pub fn operator_key(seed: u64) -> BlsPublicKeyBytes {
    bls_key(seed).public_key().compress()
}

/// A registration using its own output 0 as collateral.
pub fn pro_reg(seed: u8) -> ProRegTx {
    ProRegTx {
        version: 1,
        collateral_outpoint: OutPoint::new(Hash256::ZERO, 0),
        service_addr: service_addr(seed),
        owner_key_id: key_id(seed),
        operator_pubkey: operator_key(u64::from(seed)),
        voting_key_id: key_id(seed),
        operator_reward_bps: 0,
        payout_script: Script(vec![0x76, seed]),
    }
}

/// The transaction carrying `reg`, with a collateral output of `amount`. Its hash is `hash(seed)`.
pub fn pro_reg_tx(seed: u8, reg: ProRegTx, amount: u64) -> ChainTx {
    ChainTx {
        hash: hash(seed),
        inputs: Vec::new(),
        outputs: vec![TxOut {
            value: amount,
            script: Script::default(),
        }],
        payload: Some(ProviderTx::Register(reg)),
    }
}

pub fn pro_up_serv(pro_tx_hash: Hash256, addr: ServiceAddr, nevm_address: NevmAddress) -> ProUpServTx {
    ProUpServTx {
        pro_tx_hash,
        service_addr: addr,
        operator_payout_script: Script::default(),
        nevm_address,
    }
}

/// A payload-only transaction with hash `hash(seed)`.
pub fn payload_tx(seed: u8, payload: ProviderTx) -> ChainTx {
    ChainTx {
        hash: hash(seed),
        inputs: Vec::new(),
        outputs: Vec::new(),
        payload: Some(payload),
    }
}

/// A plain transaction spending `inputs`.
pub fn spend_tx(seed: u8, inputs: Vec<OutPoint>) -> ChainTx {
    ChainTx {
        hash: hash(seed),
        inputs,
        outputs: Vec::new(),
        payload: None,
    }
}

pub fn coinbase(height: u32) -> ChainTx {
    ChainTx {
        hash: hash_n(height ^ 0xc0ff_ee00),
        inputs: Vec::new(),
        outputs: Vec::new(),
        payload: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic_and_distinct() {
        assert_eq!(operator_key(1), operator_key(1));
        assert_ne!(operator_key(1), operator_key(2));
        assert!(!operator_key(3).is_null());
    }
}

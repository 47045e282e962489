// Path: crates/types/src/app/provider.rs
//! Provider transaction payloads.
//!
//! Signature and structural checks on these payloads are performed by the
//! transaction-validation layer before a block reaches membership processing.
//! Here they are plain typed records whose effects are applied to masternode
//! state.

use crate::app::commitment::FinalCommitmentTxPayload;
use crate::primitives::{BlsPublicKeyBytes, Hash256, KeyId, NevmAddress, OutPoint, Script, ServiceAddr};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Registers a new masternode.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProRegTx {
    /// Payload version.
    pub version: u16,
    /// External collateral. A zero `txid` means the collateral is output
    /// `collateral_outpoint.index` of the registering transaction itself.
    pub collateral_outpoint: OutPoint,
    /// Initial service address. A null address registers the node in a banned state.
    pub service_addr: ServiceAddr,
    /// Owner key id.
    pub owner_key_id: KeyId,
    /// Operator BLS public key.
    pub operator_pubkey: BlsPublicKeyBytes,
    /// Voting key id.
    pub voting_key_id: KeyId,
    /// Operator reward share in basis points.
    pub operator_reward_bps: u16,
    /// Owner payout script.
    pub payout_script: Script,
}

/// Updates a masternode's service fields. Signed by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProUpServTx {
    /// The masternode being updated.
    pub pro_tx_hash: Hash256,
    /// New service address.
    pub service_addr: ServiceAddr,
    /// New operator payout script.
    pub operator_payout_script: Script,
    /// New auxiliary-chain address. Empty clears it.
    pub nevm_address: NevmAddress,
}

/// Updates a masternode's registrar fields. Signed by the owner.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProUpRegTx {
    /// Payload version, adopted as the operator key version on key change.
    pub version: u16,
    /// The masternode being updated.
    pub pro_tx_hash: Hash256,
    /// New operator key.
    pub operator_pubkey: BlsPublicKeyBytes,
    /// New voting key id.
    pub voting_key_id: KeyId,
    /// New owner payout script.
    pub payout_script: Script,
}

/// Revokes the operator of a masternode. Signed by the operator.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProUpRevTx {
    /// The masternode being revoked.
    pub pro_tx_hash: Hash256,
    /// Revocation reason code.
    pub reason: u16,
}

/// A decoded special-transaction payload.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum ProviderTx {
    /// Masternode registration.
    Register(ProRegTx),
    /// Service update.
    UpdateService(ProUpServTx),
    /// Registrar update.
    UpdateRegistrar(ProUpRegTx),
    /// Operator revocation.
    Revoke(ProUpRevTx),
    /// A mined quorum final commitment.
    QuorumCommitment(FinalCommitmentTxPayload),
}

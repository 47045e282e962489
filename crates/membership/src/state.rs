// Path: crates/membership/src/state.rs
//! Per-masternode mutable state and field-level deltas between two states.

use bitflags::bitflags;
use mnq_crypto::algorithms::hash::sha256;
use mnq_types::app::ProRegTx;
use mnq_types::{BlsPublicKeyBytes, Hash256, KeyId, NevmAddress, Script, ServiceAddr};
use parity_scale_codec::{Decode, Encode, Error as CodecError, Input, Output};
use serde::Serialize;

/// Revocation reason recorded when no reason was given.
pub const REASON_NOT_SPECIFIED: u16 = 0;
/// Operator key version of records that never changed their operator key.
pub const LEGACY_BLS_VERSION: u16 = 1;

/// The mutable part of a masternode record.
///
/// A state published into a ledger is never modified. Mutations clone the
/// state, patch the clone and swap it into a new record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize)]
pub struct MasternodeState {
    pub version: u16,
    pub registered_height: u32,
    pub collateral_height: u32,
    pub last_paid_height: u32,
    pub pose_penalty: u32,
    pub pose_revived_height: Option<u32>,
    pub pose_ban_height: Option<u32>,
    pub revocation_reason: u16,
    /// Hash of the block at which the record was confirmed. Null until then.
    pub confirmed_hash: Hash256,
    /// `sha256(proTxHash ‖ confirmedHash)`, precomputed for quorum scoring.
    pub confirmed_hash_with_pro_reg_tx_hash: Hash256,
    pub owner_key_id: KeyId,
    pub operator_pubkey: BlsPublicKeyBytes,
    pub voting_key_id: KeyId,
    pub service_addr: ServiceAddr,
    pub payout_script: Script,
    pub operator_payout_script: Script,
    pub nevm_address: NevmAddress,
}

impl MasternodeState {
    /// The initial state described by a registration payload.
    pub fn from_registration(tx: &ProRegTx) -> Self {
        Self {
            version: tx.version,
            owner_key_id: tx.owner_key_id,
            operator_pubkey: tx.operator_pubkey,
            voting_key_id: tx.voting_key_id,
            service_addr: tx.service_addr,
            payout_script: tx.payout_script.clone(),
            ..Self::default()
        }
    }

    pub fn is_banned(&self) -> bool {
        self.pose_ban_height.is_some()
    }

    /// Clears everything the operator controls. The NEVM address goes with it.
    pub fn reset_operator_fields(&mut self) {
        self.version = LEGACY_BLS_VERSION;
        self.operator_pubkey = BlsPublicKeyBytes::ZERO;
        self.service_addr = ServiceAddr::default();
        self.operator_payout_script = Script::default();
        self.revocation_reason = REASON_NOT_SPECIFIED;
        self.nevm_address = NevmAddress::default();
    }

    /// Bans the record at `height`. Returns false if it was already banned.
    pub fn ban_if_not_banned(&mut self, height: u32) -> bool {
        if self.is_banned() {
            return false;
        }
        self.pose_ban_height = Some(height);
        self.nevm_address = NevmAddress::default();
        true
    }

    pub fn revive(&mut self, height: u32) {
        self.pose_penalty = 0;
        self.pose_ban_height = None;
        self.pose_revived_height = Some(height);
    }

    /// Records the confirmation block. The combined hash is a single SHA-256.
    pub fn update_confirmed_hash(&mut self, pro_tx_hash: &Hash256, confirmed_hash: Hash256) {
        self.confirmed_hash = confirmed_hash;
        self.confirmed_hash_with_pro_reg_tx_hash =
            sha256([pro_tx_hash.as_bytes(), confirmed_hash.as_bytes()].concat());
    }

    /// The height used to order records in the payment queue.
    pub fn payment_queue_height(&self) -> u32 {
        match self.pose_revived_height {
            Some(revived) if revived > self.last_paid_height => revived,
            _ if self.last_paid_height == 0 => self.registered_height,
            _ => self.last_paid_height,
        }
    }
}

bitflags! {
    /// The fields carried by a [`StateDelta`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StateFields: u32 {
        const REGISTERED_HEIGHT = 0x0001;
        const LAST_PAID_HEIGHT = 0x0002;
        const POSE_PENALTY = 0x0004;
        const POSE_REVIVED_HEIGHT = 0x0008;
        const POSE_BAN_HEIGHT = 0x0010;
        const REVOCATION_REASON = 0x0020;
        const CONFIRMED_HASH = 0x0040;
        const CONFIRMED_HASH_WITH_PRO_REG_TX_HASH = 0x0080;
        const OWNER_KEY_ID = 0x0100;
        const OPERATOR_PUBKEY = 0x0200;
        const VOTING_KEY_ID = 0x0400;
        const SERVICE_ADDR = 0x0800;
        const PAYOUT_SCRIPT = 0x1000;
        const OPERATOR_PAYOUT_SCRIPT = 0x2000;
        const COLLATERAL_HEIGHT = 0x4000;
        const VERSION = 0x8000;
        const NEVM_ADDRESS = 0x10000;
    }
}

// Invokes `$m!(args.., FLAG, field)` for every delta field, in wire order.
macro_rules! for_each_state_field {
    ($m:ident $(, $arg:ident)*) => {
        $m!($($arg,)* REGISTERED_HEIGHT, registered_height);
        $m!($($arg,)* LAST_PAID_HEIGHT, last_paid_height);
        $m!($($arg,)* POSE_PENALTY, pose_penalty);
        $m!($($arg,)* POSE_REVIVED_HEIGHT, pose_revived_height);
        $m!($($arg,)* POSE_BAN_HEIGHT, pose_ban_height);
        $m!($($arg,)* REVOCATION_REASON, revocation_reason);
        $m!($($arg,)* CONFIRMED_HASH, confirmed_hash);
        $m!($($arg,)* CONFIRMED_HASH_WITH_PRO_REG_TX_HASH, confirmed_hash_with_pro_reg_tx_hash);
        $m!($($arg,)* OWNER_KEY_ID, owner_key_id);
        $m!($($arg,)* OPERATOR_PUBKEY, operator_pubkey);
        $m!($($arg,)* VOTING_KEY_ID, voting_key_id);
        $m!($($arg,)* SERVICE_ADDR, service_addr);
        $m!($($arg,)* PAYOUT_SCRIPT, payout_script);
        $m!($($arg,)* OPERATOR_PAYOUT_SCRIPT, operator_payout_script);
        $m!($($arg,)* COLLATERAL_HEIGHT, collateral_height);
        $m!($($arg,)* VERSION, version);
        $m!($($arg,)* NEVM_ADDRESS, nevm_address);
    };
}

/// The fields that differ between two states, with their new values.
///
/// Only the fields named in `fields` are meaningful in `state`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub fields: StateFields,
    pub state: MasternodeState,
}

impl StateDelta {
    /// Computes the delta that turns `from` into `to`.
    ///
    /// An operator key change always carries the key version along.
    pub fn between(from: &MasternodeState, to: &MasternodeState) -> Self {
        let mut delta = Self::default();
        macro_rules! diff_field {
            ($a:ident, $b:ident, $d:ident, $flag:ident, $f:ident) => {
                if $a.$f != $b.$f {
                    $d.state.$f = $b.$f.clone();
                    $d.fields |= StateFields::$flag;
                }
            };
        }
        for_each_state_field!(diff_field, from, to, delta);
        if delta.fields.contains(StateFields::OPERATOR_PUBKEY) {
            delta.state.version = to.version;
            delta.fields |= StateFields::VERSION;
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copies the carried fields onto `target`.
    pub fn apply_to(&self, target: &mut MasternodeState) {
        macro_rules! apply_field {
            ($d:ident, $t:ident, $flag:ident, $f:ident) => {
                if $d.fields.contains(StateFields::$flag) {
                    $t.$f = $d.state.$f.clone();
                }
            };
        }
        let delta = self;
        for_each_state_field!(apply_field, delta, target);
    }
}

impl Encode for StateDelta {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        self.fields.bits().encode_to(dest);
        macro_rules! encode_field {
            ($d:ident, $out:ident, $flag:ident, $f:ident) => {
                if $d.fields.contains(StateFields::$flag) {
                    $d.state.$f.encode_to($out);
                }
            };
        }
        let delta = self;
        for_each_state_field!(encode_field, delta, dest);
    }
}

impl Decode for StateDelta {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let bits = u32::decode(input)?;
        let fields = StateFields::from_bits(bits).ok_or_else(|| CodecError::from("unknown state delta field"))?;
        let mut delta = Self {
            fields,
            state: MasternodeState::default(),
        };
        macro_rules! decode_field {
            ($d:ident, $inp:ident, $flag:ident, $f:ident) => {
                if $d.fields.contains(StateFields::$flag) {
                    $d.state.$f = Decode::decode($inp)?;
                }
            };
        }
        for_each_state_field!(decode_field, delta, input);
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> MasternodeState {
        MasternodeState {
            version: 2,
            registered_height: 10,
            owner_key_id: KeyId([1; 20]),
            operator_pubkey: BlsPublicKeyBytes([2; 48]),
            voting_key_id: KeyId([3; 20]),
            service_addr: ServiceAddr::from_ipv4([10, 0, 0, 1], 8369),
            nevm_address: NevmAddress(vec![9; 20]),
            ..MasternodeState::default()
        }
    }

    #[test]
    fn delta_carries_only_changed_fields() {
        let a = registered();
        let mut b = a.clone();
        b.pose_penalty = 5;
        b.last_paid_height = 42;
        let delta = StateDelta::between(&a, &b);
        assert_eq!(delta.fields, StateFields::POSE_PENALTY | StateFields::LAST_PAID_HEIGHT);

        let mut patched = a.clone();
        delta.apply_to(&mut patched);
        assert_eq!(patched, b);
    }

    #[test]
    fn operator_key_change_drags_version_along() {
        let a = registered();
        let mut b = a.clone();
        b.operator_pubkey = BlsPublicKeyBytes([7; 48]);
        let delta = StateDelta::between(&a, &b);
        assert!(delta.fields.contains(StateFields::OPERATOR_PUBKEY | StateFields::VERSION));
    }

    #[test]
    fn delta_encoding_is_sparse_and_decodes() {
        let a = registered();
        let mut b = a.clone();
        b.pose_ban_height = Some(77);
        b.nevm_address = NevmAddress::default();
        let delta = StateDelta::between(&a, &b);
        let bytes = delta.encode();
        // bits + Option<u32> + empty vec
        assert_eq!(bytes.len(), 4 + 5 + 1);
        let back = StateDelta::decode(&mut &bytes[..]).unwrap();
        assert_eq!(back, delta);
    }

    #[test]
    fn ban_clears_nevm_and_is_idempotent() {
        let mut s = registered();
        assert!(s.ban_if_not_banned(50));
        assert!(s.nevm_address.is_empty());
        assert!(!s.ban_if_not_banned(60));
        assert_eq!(s.pose_ban_height, Some(50));
        s.revive(70);
        assert!(!s.is_banned());
        assert_eq!(s.pose_revived_height, Some(70));
    }

    #[test]
    fn payment_queue_height_prefers_revival_then_registration() {
        let mut s = registered();
        assert_eq!(s.payment_queue_height(), 10);
        s.last_paid_height = 30;
        assert_eq!(s.payment_queue_height(), 30);
        s.pose_revived_height = Some(40);
        assert_eq!(s.payment_queue_height(), 40);
    }
}

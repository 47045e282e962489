// Path: crates/membership/src/processor.rs
//! Derivation of a block's ledger from its parent's ledger.
//!
//! [`build_new_list_from_block`] is a pure function of the parent ledger, the
//! block and the chain/coin views. It never touches the store, so the manager
//! can run it for validation only and discard the result.

use crate::ledger::MembershipLedger;
use crate::penalty::{decreases_at, DKG_FAILURE_PERCENT};
use crate::record::MasternodeRecord;
use crate::state::MasternodeState;
use crate::unique::PropertyKey;
use mnq_api::chain::{ChainView, CoinView};
use mnq_telemetry::membership_metrics;
use mnq_types::app::{
    Block, BlockRef, ChainTx, FinalCommitmentTxPayload, ProRegTx, ProUpRegTx, ProUpRevTx, ProUpServTx,
    ProviderTx,
};
use mnq_types::config::ConsensusParams;
use mnq_types::error::MembershipError;
use mnq_types::{Hash256, NevmAddress, OutPoint};
use std::sync::Arc;

/// The members of the quorum based at a block, in selection order.
pub type QuorumMembers = Arc<Vec<Arc<MasternodeRecord>>>;

/// Read-only collaborators needed to process one block.
pub struct BlockContext<'a> {
    pub params: &'a ConsensusParams,
    pub chain: &'a dyn ChainView,
    pub coins: &'a dyn CoinView,
}

/// Applies every membership effect of `block` to a copy of `old_list`.
///
/// `prev` is the parent of `block` and the block `old_list` belongs to.
/// `quorum_members` resolves the members of the quorum based at a block and
/// is consulted for every final commitment in the block.
pub fn build_new_list_from_block(
    ctx: &BlockContext<'_>,
    block: &Block,
    prev: &BlockRef,
    old_list: &MembershipLedger,
    quorum_members: &dyn Fn(&BlockRef) -> Result<QuorumMembers, MembershipError>,
) -> Result<MembershipLedger, MembershipError> {
    let height = block.header.height;
    let mut new_list = old_list.clone();
    new_list.set_block(block.header.hash, height);

    // 1. Confirm records that have waited long enough.
    let min_confirmations = 2 * u64::try_from(old_list.valid_count()).unwrap_or(u64::MAX);
    let to_confirm: Vec<Hash256> = new_list
        .iter(false)
        .filter(|r| r.state.confirmed_hash.is_null())
        .filter(|r| {
            u64::from(prev.height.saturating_sub(r.state.registered_height)) >= min_confirmations
        })
        .map(|r| r.pro_tx_hash)
        .collect();
    for pro_tx_hash in to_confirm {
        let mut state = current_state(&new_list, &pro_tx_hash)?;
        state.update_confirmed_hash(&pro_tx_hash, prev.hash);
        new_list.update_record(&pro_tx_hash, state)?;
    }

    // 2. Decay penalties.
    if decreases_at(ctx.params, height) {
        let penalised: Vec<Hash256> = new_list
            .iter(true)
            .filter(|r| r.state.pose_penalty > 0)
            .map(|r| r.pro_tx_hash)
            .collect();
        for pro_tx_hash in penalised {
            new_list.pose_decrease(&pro_tx_hash)?;
        }
    }

    // 3. Commitments punish their failed members before any provider payload runs.
    for tx in block.non_coinbase() {
        if let Some(ProviderTx::QuorumCommitment(qc)) = &tx.payload {
            apply_quorum_commitment(ctx, &mut new_list, prev, qc, quorum_members)?;
        }
    }

    // 4. Provider payloads, in block order.
    for tx in block.non_coinbase() {
        match &tx.payload {
            Some(ProviderTx::Register(reg)) => apply_register(ctx, &mut new_list, tx, reg, height)?,
            Some(ProviderTx::UpdateService(upserv)) => apply_update_service(&mut new_list, upserv, height)?,
            Some(ProviderTx::UpdateRegistrar(upreg)) => apply_update_registrar(&mut new_list, upreg, height)?,
            Some(ProviderTx::Revoke(uprev)) => apply_revoke(&mut new_list, uprev, height)?,
            Some(ProviderTx::QuorumCommitment(_)) | None => {}
        }
    }

    // 5. Collateral spends, once every payload of the block has been applied.
    for input in block.non_coinbase().flat_map(|tx| tx.inputs.iter()) {
        let spent = new_list.get_by_collateral(input).map(|r| r.pro_tx_hash);
        if let Some(pro_tx_hash) = spent {
            if new_list.get(&pro_tx_hash).is_some_and(|r| !r.state.nevm_address.is_empty()) {
                new_list.mark_nevm_changed();
            }
            new_list.remove_record(&pro_tx_hash)?;
            tracing::debug!(
                target: "membership",
                event = "collateral_spent",
                pro_tx_hash = %pro_tx_hash,
                height
            );
        }
    }

    // 6. The parent's payee has been paid by this block.
    if let Some(payee) = old_list.payee() {
        if new_list.contains(&payee.pro_tx_hash) {
            let mut state = current_state(&new_list, &payee.pro_tx_hash)?;
            state.last_paid_height = height;
            new_list.update_record(&payee.pro_tx_hash, state)?;
        }
    }

    Ok(new_list)
}

/// True if `tx` registers a masternode whose collateral is its own output `index`.
pub fn is_pro_tx_with_collateral(tx: &ChainTx, index: u32) -> bool {
    let Some(ProviderTx::Register(reg)) = &tx.payload else {
        return false;
    };
    if !reg.collateral_outpoint.txid.is_null() {
        return false;
    }
    reg.collateral_outpoint.index == index
        && usize::try_from(index)
            .ok()
            .and_then(|i| tx.outputs.get(i))
            .is_some()
}

fn current_state(list: &MembershipLedger, pro_tx_hash: &Hash256) -> Result<MasternodeState, MembershipError> {
    list.get(pro_tx_hash)
        .map(|r| (*r.state).clone())
        .ok_or_else(|| MembershipError::violation("bad-protx-hash", format!("unknown masternode {}", pro_tx_hash)))
}

fn held_by_other(list: &MembershipLedger, key: Option<PropertyKey>, owner: &Hash256) -> bool {
    key.and_then(|k| list.property_holder(&k).map(|r| r.pro_tx_hash))
        .is_some_and(|holder| holder != *owner)
}

fn apply_register(
    ctx: &BlockContext<'_>,
    list: &mut MembershipLedger,
    tx: &ChainTx,
    reg: &ProRegTx,
    height: u32,
) -> Result<(), MembershipError> {
    let pro_tx_hash = tx.hash;
    let external = !reg.collateral_outpoint.txid.is_null();
    let collateral = if external {
        reg.collateral_outpoint
    } else {
        OutPoint::new(tx.hash, reg.collateral_outpoint.index)
    };

    let collateral_height = if external {
        match ctx.coins.coin(&collateral) {
            Some(coin) if !coin.spent && coin.value == ctx.params.collateral_amount => coin.height,
            _ => {
                return Err(MembershipError::violation(
                    "bad-protx-collateral",
                    format!("collateral {} is missing, spent or of the wrong value", collateral),
                ))
            }
        }
    } else {
        let output = usize::try_from(collateral.index)
            .ok()
            .and_then(|i| tx.outputs.get(i));
        match output {
            Some(out) if out.value == ctx.params.collateral_amount => height,
            _ => {
                return Err(MembershipError::violation(
                    "bad-protx-collateral",
                    format!("output {} is missing or of the wrong value", collateral),
                ))
            }
        }
    };

    // A registration reusing a collateral replaces the record holding it.
    if let Some(replaced) = list.get_by_collateral(&collateral).map(|r| r.pro_tx_hash) {
        if list.get(&replaced).is_some_and(|r| !r.state.nevm_address.is_empty()) {
            list.mark_nevm_changed();
        }
        list.remove_record(&replaced)?;
        tracing::info!(
            target: "membership",
            event = "collateral_reused",
            replaced = %replaced,
            pro_tx_hash = %pro_tx_hash
        );
    }

    if held_by_other(list, PropertyKey::service_addr(&reg.service_addr), &pro_tx_hash) {
        return Err(MembershipError::violation(
            "bad-protx-dup-addr",
            format!("{} is already registered", reg.service_addr),
        ));
    }
    if held_by_other(list, PropertyKey::owner_key(&reg.owner_key_id), &pro_tx_hash)
        || held_by_other(list, PropertyKey::operator_key(&reg.operator_pubkey), &pro_tx_hash)
    {
        return Err(MembershipError::violation(
            "bad-protx-dup-key",
            format!("owner or operator key of {} is already registered", pro_tx_hash),
        ));
    }

    let mut state = MasternodeState::from_registration(reg);
    state.registered_height = height;
    state.collateral_height = collateral_height;
    if reg.service_addr.is_null() {
        // Without a service address the node cannot serve; it starts banned.
        state.ban_if_not_banned(height);
    }

    let internal_id = list.total_registered_count();
    let record = MasternodeRecord::new(pro_tx_hash, internal_id, collateral, reg.operator_reward_bps, state);
    list.add_record(record, true)?;
    tracing::info!(
        target: "membership",
        event = "registered",
        pro_tx_hash = %pro_tx_hash,
        internal_id,
        collateral = %collateral,
        height
    );
    Ok(())
}

fn apply_update_service(
    list: &mut MembershipLedger,
    upserv: &ProUpServTx,
    height: u32,
) -> Result<(), MembershipError> {
    let pro_tx_hash = upserv.pro_tx_hash;
    if held_by_other(list, PropertyKey::service_addr(&upserv.service_addr), &pro_tx_hash) {
        return Err(MembershipError::violation(
            "bad-protx-dup-addr",
            format!("{} is already registered", upserv.service_addr),
        ));
    }
    let mut state = current_state(list, &pro_tx_hash)?;
    state.service_addr = upserv.service_addr;
    state.operator_payout_script = upserv.operator_payout_script.clone();

    let nevm = &upserv.nevm_address;
    if !nevm.is_empty() {
        if nevm.0.len() != NevmAddress::LEN {
            return Err(MembershipError::violation(
                "bad-protx-invalid-nevmaddress-size",
                format!("nevm address of {} bytes", nevm.0.len()),
            ));
        }
        if held_by_other(list, PropertyKey::nevm_address(&nevm.0), &pro_tx_hash) {
            return Err(MembershipError::violation(
                "bad-protx-dup-nevm-address",
                format!("{:?} is already registered", nevm),
            ));
        }
    }
    if *nevm != state.nevm_address {
        if state.confirmed_hash.is_null() {
            return Err(MembershipError::violation(
                "bad-protx-unconfirmed-nevm-address",
                format!("masternode {} is not confirmed", pro_tx_hash),
            ));
        }
        if state.is_banned() {
            return Err(MembershipError::violation(
                "bad-protx-banned-nevm-address",
                format!("masternode {} is banned", pro_tx_hash),
            ));
        }
        state.nevm_address = nevm.clone();
        list.mark_nevm_changed();
    }

    if state.is_banned()
        && !state.operator_pubkey.is_null()
        && !state.voting_key_id.is_null()
        && !state.owner_key_id.is_null()
    {
        state.revive(height);
        tracing::info!(target: "membership", event = "revived", pro_tx_hash = %pro_tx_hash, height);
    }

    list.update_record(&pro_tx_hash, state)?;
    Ok(())
}

fn apply_update_registrar(
    list: &mut MembershipLedger,
    upreg: &ProUpRegTx,
    height: u32,
) -> Result<(), MembershipError> {
    let pro_tx_hash = upreg.pro_tx_hash;
    let mut state = current_state(list, &pro_tx_hash)?;
    if state.operator_pubkey != upreg.operator_pubkey {
        if held_by_other(list, PropertyKey::operator_key(&upreg.operator_pubkey), &pro_tx_hash) {
            return Err(MembershipError::violation(
                "bad-protx-dup-key",
                format!("operator key for {} is already registered", pro_tx_hash),
            ));
        }
        if !state.nevm_address.is_empty() {
            list.mark_nevm_changed();
        }
        state.reset_operator_fields();
        state.ban_if_not_banned(height);
        state.version = upreg.version;
        state.operator_pubkey = upreg.operator_pubkey;
    }
    state.voting_key_id = upreg.voting_key_id;
    state.payout_script = upreg.payout_script.clone();
    list.update_record(&pro_tx_hash, state)?;
    Ok(())
}

fn apply_revoke(list: &mut MembershipLedger, uprev: &ProUpRevTx, height: u32) -> Result<(), MembershipError> {
    let pro_tx_hash = uprev.pro_tx_hash;
    let mut state = current_state(list, &pro_tx_hash)?;
    if !state.nevm_address.is_empty() {
        list.mark_nevm_changed();
    }
    state.reset_operator_fields();
    state.ban_if_not_banned(height);
    state.revocation_reason = uprev.reason;
    list.update_record(&pro_tx_hash, state)?;
    tracing::info!(
        target: "membership",
        event = "revoked",
        pro_tx_hash = %pro_tx_hash,
        reason = uprev.reason,
        height
    );
    Ok(())
}

fn apply_quorum_commitment(
    ctx: &BlockContext<'_>,
    list: &mut MembershipLedger,
    prev: &BlockRef,
    qc: &FinalCommitmentTxPayload,
    quorum_members: &dyn Fn(&BlockRef) -> Result<QuorumMembers, MembershipError>,
) -> Result<(), MembershipError> {
    if qc.commitment.is_null() {
        return Ok(());
    }
    let interval = ctx.params.llmq.dkg_interval.max(1);
    let quorum_height = qc.height - qc.height % interval;
    let base = ctx
        .chain
        .ancestor(prev, quorum_height)
        .filter(|b| b.hash == qc.commitment.quorum_hash)
        .ok_or_else(|| {
            MembershipError::violation(
                "bad-qc-quorum-hash",
                format!(
                    "quorum hash {} is not the block at height {}",
                    qc.commitment.quorum_hash, quorum_height
                ),
            )
        })?;

    let members = quorum_members(&base)?;
    for (member, valid) in members.iter().zip(qc.commitment.valid_members.iter()) {
        if *valid || !list.contains(&member.pro_tx_hash) {
            continue;
        }
        membership_metrics().inc_pose_punishments();
        let had_nevm = list.get(&member.pro_tx_hash).is_some_and(|r| !r.state.nevm_address.is_empty());
        if list.pose_punish(&member.pro_tx_hash, DKG_FAILURE_PERCENT)? {
            membership_metrics().inc_pose_bans();
            if had_nevm {
                list.mark_nevm_changed();
            }
        }
    }
    Ok(())
}

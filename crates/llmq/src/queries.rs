// Path: crates/llmq/src/queries.rs
//! Operator queries over quorums, DKG status and recovered signatures.
//!
//! Every query answers with JSON. Hash arguments are hex strings.

use crate::debug::DkgDebugManager;
use crate::quorums::{verify_with_quorum, Quorum, QuorumManager, RecoveredSigVerdict, SIGN_HEIGHT_OFFSET};
use crate::signing::SigningManager;
use mnq_crypto::sign::bls::BlsSignature;
use mnq_types::error::QueryError;
use mnq_types::{BlsSignatureBytes, Hash256};
use serde_json::{json, Value};
use std::sync::Arc;

fn parse_hash(value: &str, name: &str) -> Result<Hash256, QueryError> {
    Hash256::from_hex(value).ok_or_else(|| QueryError::InvalidParameter(format!("{name} must be a 32-byte hex hash")))
}

fn parse_sig(value: &str) -> Result<BlsSignature, QueryError> {
    BlsSignatureBytes::from_hex(value)
        .and_then(|bytes| BlsSignature::from_compressed(&bytes).ok())
        .ok_or_else(|| QueryError::InvalidParameter("signature must be a valid 96-byte BLS signature".into()))
}

fn quorum_json(quorum: &Quorum, include_members: bool) -> Value {
    let mut out = json!({
        "height": quorum.base.height,
        "quorumHash": quorum.quorum_hash().to_hex(),
        "minedBlock": quorum.mined_block_hash.to_hex(),
        "quorumPublicKey": quorum.commitment.quorum_public_key.to_hex(),
    });
    if include_members {
        let members: Vec<Value> = quorum
            .members
            .iter()
            .map(|m| {
                json!({
                    "proTxHash": m.pro_tx_hash.to_hex(),
                    "pubKeyOperator": m.state.operator_pubkey.to_hex(),
                    "valid": quorum.is_valid_member(&m.pro_tx_hash),
                })
            })
            .collect();
        out["members"] = Value::Array(members);
    }
    out
}

/// The query surface handed to an RPC or CLI front end.
pub struct QuorumQueries {
    quorums: Arc<QuorumManager>,
    signing: Arc<SigningManager>,
    debug: Arc<DkgDebugManager>,
    local_pro_tx_hash: Option<Hash256>,
}

impl QuorumQueries {
    pub fn new(
        quorums: Arc<QuorumManager>,
        signing: Arc<SigningManager>,
        debug: Arc<DkgDebugManager>,
        local_pro_tx_hash: Option<Hash256>,
    ) -> Self {
        Self {
            quorums,
            signing,
            debug,
            local_pro_tx_hash,
        }
    }

    /// Hashes of the newest `count` quorums, by quorum type name.
    pub fn quorum_list(&self, count: Option<usize>) -> Value {
        let llmq = &self.quorums.params().llmq;
        let count = count.unwrap_or(llmq.signing_active_quorum_count);
        let hashes: Vec<String> = self
            .quorums
            .scan_quorums_at_tip(count)
            .iter()
            .map(|q| q.quorum_hash().to_hex())
            .collect();
        let mut out = serde_json::Map::new();
        out.insert(llmq.name.clone(), Value::from(hashes));
        Value::Object(out)
    }

    pub fn quorum_info(&self, quorum_hash: &str, include_members: bool) -> Result<Value, QueryError> {
        let hash = parse_hash(quorum_hash, "quorumHash")?;
        let quorum = self
            .quorums
            .get_quorum(&hash)
            .ok_or_else(|| QueryError::NotFound(format!("quorum {hash}")))?;
        Ok(quorum_json(&quorum, include_members))
    }

    pub fn quorum_dkg_status(&self) -> Result<Value, QueryError> {
        let session = serde_json::to_value(self.debug.status()).map_err(|e| QueryError::Internal(e.to_string()))?;
        Ok(json!({
            "proTxHash": self.local_pro_tx_hash.map(|h| h.to_hex()),
            "session": session,
        }))
    }

    /// The quorums among the newest `scan_count` that `pro_tx_hash` belongs to.
    pub fn quorum_member_of(&self, pro_tx_hash: &str, scan_count: Option<usize>) -> Result<Value, QueryError> {
        let member = parse_hash(pro_tx_hash, "proTxHash")?;
        let count = scan_count.unwrap_or(self.quorums.params().llmq.signing_active_quorum_count);
        let found: Vec<Value> = self
            .quorums
            .scan_quorums_at_tip(count)
            .iter()
            .filter_map(|q| {
                let index = q.member_index(&member)?;
                let mut info = quorum_json(q, false);
                info["isValidMember"] = Value::Bool(q.is_valid_member(&member));
                info["memberIndex"] = Value::from(index);
                Some(info)
            })
            .collect();
        Ok(Value::Array(found))
    }

    /// The quorum responsible for signing request `id` at the tip.
    pub fn quorum_select(&self, id: &str) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let quorum = self
            .quorums
            .select_quorum_for_signing(&id, None, SIGN_HEIGHT_OFFSET)
            .ok_or_else(|| QueryError::NotFound("no quorum available for signing".into()))?;
        Ok(json!({ "quorumHash": quorum.quorum_hash().to_hex() }))
    }

    pub fn quorum_sign(&self, id: &str, msg_hash: &str, quorum_hash: Option<&str>) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let msg_hash = parse_hash(msg_hash, "msgHash")?;
        let quorum_hash = quorum_hash.map(|h| parse_hash(h, "quorumHash")).transpose()?;
        Ok(Value::Bool(self.signing.async_sign_if_member(&id, &msg_hash, quorum_hash, false)))
    }

    pub fn quorum_has_recsig(&self, id: &str, msg_hash: &str) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let msg_hash = parse_hash(msg_hash, "msgHash")?;
        Ok(Value::Bool(self.signing.has_recovered_sig(&id, &msg_hash)))
    }

    pub fn quorum_get_recsig(&self, id: &str, msg_hash: &str) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let msg_hash = parse_hash(msg_hash, "msgHash")?;
        self.signing
            .get_recovered_sig_for_id(&id, &msg_hash)
            .map(|sig| sig.to_json())
            .ok_or_else(|| QueryError::NotFound("recovered signature".into()))
    }

    pub fn quorum_is_conflicting(&self, id: &str, msg_hash: &str) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let msg_hash = parse_hash(msg_hash, "msgHash")?;
        Ok(Value::Bool(self.signing.is_conflicting(&id, &msg_hash)))
    }

    /// Checks a threshold signature, against `quorum_hash` if given or else
    /// against the quorum selected for `id` at `sign_height`.
    pub fn quorum_verify(
        &self,
        id: &str,
        msg_hash: &str,
        sig: &str,
        quorum_hash: Option<&str>,
        sign_height: Option<u32>,
    ) -> Result<Value, QueryError> {
        let id = parse_hash(id, "id")?;
        let msg_hash = parse_hash(msg_hash, "msgHash")?;
        let sig = parse_sig(sig)?;
        let verdict = match quorum_hash {
            Some(hash) => {
                let hash = parse_hash(hash, "quorumHash")?;
                let quorum = self
                    .quorums
                    .get_quorum(&hash)
                    .ok_or_else(|| QueryError::NotFound(format!("quorum {hash}")))?;
                verify_with_quorum(&quorum, &id, &msg_hash, &sig)
            }
            None => self
                .quorums
                .verify_recovered_sig(sign_height, &id, &msg_hash, &sig, SIGN_HEIGHT_OFFSET),
        };
        Ok(Value::Bool(verdict == RecoveredSigVerdict::Valid))
    }
}

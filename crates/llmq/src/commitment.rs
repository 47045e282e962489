// Path: crates/llmq/src/commitment.rs
//! Final commitment hashing and verification.

use crate::utils::pack_bits;
use mnq_crypto::algorithms::hash::HashWriter;
use mnq_crypto::sign::bls::{is_valid_public_key, verify_secure_aggregated, BlsPublicKey, BlsSignature};
use mnq_membership::MasternodeRecord;
use mnq_types::app::{BlockRef, FinalCommitment};
use mnq_types::config::LlmqParams;
use mnq_types::error::CommitmentError;
use mnq_types::{BlsPublicKeyBytes, Hash256};
use std::sync::Arc;

/// The hash signed by both the members and the quorum.
pub fn build_commitment_hash(
    quorum_hash: &Hash256,
    valid_members: &[bool],
    quorum_public_key: &BlsPublicKeyBytes,
    vvec_hash: &Hash256,
) -> Hash256 {
    let mut w = HashWriter::new();
    w.write_encoded(quorum_hash)
        .write_encoded(&pack_bits(valid_members))
        .write_encoded(quorum_public_key)
        .write_encoded(vvec_hash);
    w.finalize()
}

/// The commitment hash of `commitment`.
pub fn commitment_hash(commitment: &FinalCommitment) -> Hash256 {
    build_commitment_hash(
        &commitment.quorum_hash,
        &commitment.valid_members,
        &commitment.quorum_public_key,
        &commitment.vvec_hash,
    )
}

fn check_header(commitment: &FinalCommitment, params: &LlmqParams, base: &BlockRef) -> Result<(), CommitmentError> {
    if commitment.version == 0 {
        return Err(CommitmentError::Version(commitment.version));
    }
    if commitment.quorum_hash != base.hash {
        return Err(CommitmentError::QuorumHash {
            expected: base.hash,
            got: commitment.quorum_hash,
        });
    }
    for (field, bits) in [("signers", &commitment.signers), ("validMembers", &commitment.valid_members)] {
        if bits.len() != params.size {
            return Err(CommitmentError::Size {
                field,
                expected: params.size,
                got: bits.len(),
            });
        }
    }
    Ok(())
}

fn check_no_bits_beyond(field: &'static str, bits: &[bool], members: usize) -> Result<(), CommitmentError> {
    match bits.iter().enumerate().skip(members).find(|(_, set)| **set) {
        Some((index, _)) => Err(CommitmentError::BitBeyondMembers { field, index }),
        None => Ok(()),
    }
}

/// Verifies a non-null commitment for the quorum based at `base`.
///
/// `members` is the deterministic member list of that quorum. Signature
/// checks are skipped when `check_sigs` is false.
pub fn verify(
    commitment: &FinalCommitment,
    params: &LlmqParams,
    base: &BlockRef,
    members: &[Arc<MasternodeRecord>],
    check_sigs: bool,
) -> Result<(), CommitmentError> {
    check_header(commitment, params, base)?;

    let valid = commitment.count_valid_members();
    if valid < params.min_size {
        return Err(CommitmentError::TooFew {
            field: "validMembers",
            got: valid,
            min: params.min_size,
        });
    }
    let signers = commitment.count_signers();
    if signers < params.min_size {
        return Err(CommitmentError::TooFew {
            field: "signers",
            got: signers,
            min: params.min_size,
        });
    }

    if !is_valid_public_key(&commitment.quorum_public_key) {
        return Err(CommitmentError::Malformed("quorumPublicKey"));
    }
    if commitment.vvec_hash.is_null() {
        return Err(CommitmentError::Malformed("quorumVvecHash"));
    }
    let members_sig =
        BlsSignature::from_compressed(&commitment.members_sig).map_err(|_| CommitmentError::Malformed("membersSig"))?;
    let quorum_sig =
        BlsSignature::from_compressed(&commitment.quorum_sig).map_err(|_| CommitmentError::Malformed("quorumSig"))?;

    check_no_bits_beyond("validMembers", &commitment.valid_members, members.len())?;
    check_no_bits_beyond("signers", &commitment.signers, members.len())?;

    if !check_sigs {
        return Ok(());
    }

    let hash = commitment_hash(commitment);
    let mut keys = Vec::with_capacity(signers);
    for (member, _) in members.iter().zip(&commitment.signers).filter(|(_, signed)| **signed) {
        let key = BlsPublicKey::from_compressed(&member.state.operator_pubkey)
            .map_err(|_| CommitmentError::BadSignature("membersSig"))?;
        keys.push(key);
    }
    if !verify_secure_aggregated(&members_sig, &keys, &hash) {
        return Err(CommitmentError::BadSignature("membersSig"));
    }

    let quorum_key = BlsPublicKey::from_compressed(&commitment.quorum_public_key)
        .map_err(|_| CommitmentError::Malformed("quorumPublicKey"))?;
    if !quorum_key.verify_hash(&hash, &quorum_sig) {
        return Err(CommitmentError::BadSignature("quorumSig"));
    }
    Ok(())
}

/// Verifies a null commitment: correct sizes and nothing else set.
pub fn verify_null(commitment: &FinalCommitment, params: &LlmqParams, base: &BlockRef) -> Result<(), CommitmentError> {
    if !commitment.is_null() {
        return Err(CommitmentError::Null);
    }
    check_header(commitment, params, base)
}

// Path: crates/crypto/src/sign/bls/mod.rs
//! BLS12-381 signatures using `blst` (min_pk: public keys in G1, signatures in G2).
//!
//! Operator keys sign DKG messages and commitments; quorum keys verify
//! recovered signatures. Messages are always 32-byte hashes.
//!
//! "Insecure" aggregation is plain point addition. It is only sound when each
//! aggregated message hash is unique or when the keys carry a proof of
//! possession, which callers guarantee by grouping on the sign hash.

use crate::error::CryptoError;
use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use mnq_api::crypto::{CompressedPoint, HashSigner, HashVerifier};
use mnq_types::{BlsPublicKeyBytes, BlsSignatureBytes, Hash256};
use rand::rngs::OsRng;
use rand::RngCore;

/// Domain separation tag for all operator and quorum signatures.
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// A BLS secret key.
#[derive(Clone)]
pub struct BlsSecretKey {
    inner: SecretKey,
}

impl BlsSecretKey {
    /// Generates a new random key.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut ikm = [0u8; 32];
        OsRng.fill_bytes(&mut ikm);
        Self::from_seed(&ikm)
    }

    /// Derives a key from at least 32 bytes of input key material.
    pub fn from_seed(ikm: &[u8]) -> Result<Self, CryptoError> {
        SecretKey::key_gen(ikm, &[])
            .map(|inner| Self { inner })
            .map_err(|e| CryptoError::Bls(format!("key_gen: {:?}", e)))
    }

    /// The matching public key.
    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey {
            inner: self.inner.sk_to_pk(),
        }
    }

    /// Signs a 32-byte hash.
    pub fn sign_hash(&self, hash: &Hash256) -> BlsSignature {
        BlsSignature {
            inner: self.inner.sign(hash.as_bytes(), DST, &[]),
        }
    }
}

impl std::fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlsSecretKey(..)")
    }
}

impl HashSigner for BlsSecretKey {
    type Signature = BlsSignature;

    fn sign_hash(&self, hash: &Hash256) -> BlsSignature {
        BlsSecretKey::sign_hash(self, hash)
    }
}

/// A validated BLS public key.
#[derive(Clone, Debug, PartialEq)]
pub struct BlsPublicKey {
    inner: PublicKey,
}

impl BlsPublicKey {
    /// Decompresses and validates a public key.
    pub fn from_compressed(bytes: &BlsPublicKeyBytes) -> Result<Self, CryptoError> {
        if bytes.is_null() {
            return Err(CryptoError::InvalidKey);
        }
        let inner = PublicKey::key_validate(bytes.as_bytes()).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// The compressed encoding.
    pub fn compress(&self) -> BlsPublicKeyBytes {
        BlsPublicKeyBytes(self.inner.compress())
    }

    /// Verifies a signature over a 32-byte hash.
    pub fn verify_hash(&self, hash: &Hash256, sig: &BlsSignature) -> bool {
        sig.inner.verify(true, hash.as_bytes(), DST, &[], &self.inner, false) == BLST_ERROR::BLST_SUCCESS
    }
}

/// Returns true if the bytes decode to a valid, non-identity public key.
pub fn is_valid_public_key(bytes: &BlsPublicKeyBytes) -> bool {
    BlsPublicKey::from_compressed(bytes).is_ok()
}

impl CompressedPoint for BlsPublicKey {
    type Bytes = BlsPublicKeyBytes;

    fn compress(&self) -> BlsPublicKeyBytes {
        BlsPublicKey::compress(self)
    }

    fn decompress(bytes: &BlsPublicKeyBytes) -> Result<Self, CryptoError> {
        Self::from_compressed(bytes)
    }
}

impl HashVerifier for BlsPublicKey {
    type Signature = BlsSignature;

    fn verify_hash(&self, hash: &Hash256, sig: &BlsSignature) -> bool {
        BlsPublicKey::verify_hash(self, hash, sig)
    }
}

/// A BLS signature.
#[derive(Clone, Debug, PartialEq)]
pub struct BlsSignature {
    inner: Signature,
}

impl BlsSignature {
    /// Decompresses a signature. Subgroup checks happen at verification time.
    pub fn from_compressed(bytes: &BlsSignatureBytes) -> Result<Self, CryptoError> {
        let inner = Signature::from_bytes(bytes.as_bytes()).map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self { inner })
    }

    /// The compressed encoding.
    pub fn compress(&self) -> BlsSignatureBytes {
        BlsSignatureBytes(self.inner.compress())
    }
}

/// Returns true if the bytes decode to a signature point.
pub fn is_valid_signature(bytes: &BlsSignatureBytes) -> bool {
    BlsSignature::from_compressed(bytes).is_ok()
}

impl CompressedPoint for BlsSignature {
    type Bytes = BlsSignatureBytes;

    fn compress(&self) -> BlsSignatureBytes {
        BlsSignature::compress(self)
    }

    fn decompress(bytes: &BlsSignatureBytes) -> Result<Self, CryptoError> {
        Self::from_compressed(bytes)
    }
}

/// Adds signatures together.
pub fn aggregate_signatures_insecure(sigs: &[BlsSignature]) -> Result<BlsSignature, CryptoError> {
    let refs: Vec<&Signature> = sigs.iter().map(|s| &s.inner).collect();
    if refs.is_empty() {
        return Err(CryptoError::EmptyAggregate);
    }
    AggregateSignature::aggregate(&refs, false)
        .map(|agg| BlsSignature {
            inner: agg.to_signature(),
        })
        .map_err(|e| CryptoError::Bls(format!("aggregate signatures: {:?}", e)))
}

/// Adds public keys together.
pub fn aggregate_public_keys_insecure(keys: &[BlsPublicKey]) -> Result<BlsPublicKey, CryptoError> {
    let refs: Vec<&PublicKey> = keys.iter().map(|k| &k.inner).collect();
    if refs.is_empty() {
        return Err(CryptoError::EmptyAggregate);
    }
    AggregatePublicKey::aggregate(&refs, false)
        .map(|agg| BlsPublicKey {
            inner: agg.to_public_key(),
        })
        .map_err(|e| CryptoError::Bls(format!("aggregate public keys: {:?}", e)))
}

/// Verifies an aggregate signature where `keys[i]` signed `hashes[i]`.
///
/// Hashes must be pairwise distinct; callers aggregate the keys of identical
/// hashes before calling.
pub fn verify_insecure_aggregated(sig: &BlsSignature, keys: &[BlsPublicKey], hashes: &[Hash256]) -> bool {
    if keys.is_empty() || keys.len() != hashes.len() {
        return false;
    }
    let msgs: Vec<&[u8]> = hashes.iter().map(|h| h.as_bytes()).collect();
    let pks: Vec<&PublicKey> = keys.iter().map(|k| &k.inner).collect();
    sig.inner.aggregate_verify(true, &msgs, DST, &pks, false) == BLST_ERROR::BLST_SUCCESS
}

/// Verifies an aggregate signature where every key in `keys` signed the same `hash`.
pub fn verify_secure_aggregated(sig: &BlsSignature, keys: &[BlsPublicKey], hash: &Hash256) -> bool {
    if keys.is_empty() {
        return false;
    }
    let pks: Vec<&PublicKey> = keys.iter().map(|k| &k.inner).collect();
    sig.inner.fast_aggregate_verify(true, hash.as_bytes(), DST, &pks) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> BlsSecretKey {
        BlsSecretKey::from_seed(&[seed; 32]).unwrap()
    }

    #[test]
    fn sign_and_verify_hash() {
        let sk = key(1);
        let msg = Hash256([42u8; 32]);
        let sig = sk.sign_hash(&msg);
        assert!(sk.public_key().verify_hash(&msg, &sig));
        assert!(!sk.public_key().verify_hash(&Hash256([43u8; 32]), &sig));
        assert!(!key(2).public_key().verify_hash(&msg, &sig));
    }

    #[test]
    fn compressed_roundtrip() {
        let sk = key(3);
        let pk = sk.public_key();
        assert_eq!(BlsPublicKey::from_compressed(&pk.compress()).unwrap(), pk);
        let sig = sk.sign_hash(&Hash256::ZERO);
        assert_eq!(BlsSignature::from_compressed(&sig.compress()).unwrap(), sig);
        assert!(BlsPublicKey::from_compressed(&BlsPublicKeyBytes::ZERO).is_err());
    }

    #[test]
    fn insecure_aggregate_over_distinct_hashes() {
        let keys: Vec<BlsSecretKey> = (1..=3).map(key).collect();
        let hashes: Vec<Hash256> = (0..3u8).map(|i| Hash256([i; 32])).collect();
        let sigs: Vec<BlsSignature> = keys.iter().zip(&hashes).map(|(k, h)| k.sign_hash(h)).collect();
        let pks: Vec<BlsPublicKey> = keys.iter().map(|k| k.public_key()).collect();
        let agg = aggregate_signatures_insecure(&sigs).unwrap();
        assert!(verify_insecure_aggregated(&agg, &pks, &hashes));

        let mut swapped = hashes.clone();
        swapped.swap(0, 1);
        assert!(!verify_insecure_aggregated(&agg, &pks, &swapped));
    }

    #[test]
    fn secure_aggregate_over_one_hash() {
        let keys: Vec<BlsSecretKey> = (4..=6).map(key).collect();
        let hash = Hash256([7u8; 32]);
        let sigs: Vec<BlsSignature> = keys.iter().map(|k| k.sign_hash(&hash)).collect();
        let pks: Vec<BlsPublicKey> = keys.iter().map(|k| k.public_key()).collect();
        let agg = aggregate_signatures_insecure(&sigs).unwrap();
        assert!(verify_secure_aggregated(&agg, &pks, &hash));
        assert!(!verify_secure_aggregated(&agg, &pks[..2], &hash));
    }

    fn sign_over_the_wire<S, V>(signer: &S, verifier_bytes: &V::Bytes, hash: &Hash256) -> bool
    where
        S: HashSigner,
        S::Signature: CompressedPoint,
        V: HashVerifier<Signature = S::Signature> + CompressedPoint,
    {
        let sig = signer.sign_hash(hash).compress();
        let sig = <S::Signature as CompressedPoint>::decompress(&sig).unwrap();
        V::decompress(verifier_bytes).unwrap().verify_hash(hash, &sig)
    }

    #[test]
    fn traits_cover_the_wire_path() {
        let sk = key(8);
        let pk = sk.public_key().compress();
        assert!(sign_over_the_wire::<_, BlsPublicKey>(&sk, &pk, &Hash256([9; 32])));
        assert!(!sign_over_the_wire::<_, BlsPublicKey>(&key(9), &pk, &Hash256([9; 32])));
    }

    #[test]
    fn aggregate_of_nothing_fails() {
        assert_eq!(aggregate_signatures_insecure(&[]), Err(CryptoError::EmptyAggregate));
    }
}

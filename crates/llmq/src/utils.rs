// Path: crates/llmq/src/utils.rs
//! Deterministic connection planning and bitset helpers shared by quorum code.

use mnq_crypto::algorithms::hash::HashWriter;
use mnq_types::Hash256;
use std::collections::BTreeSet;

/// Packs a bitset into bytes, least significant bit first within each byte.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, byte) in out.iter_mut().enumerate() {
        for bit in 0..8 {
            if bits.get(i * 8 + bit).copied().unwrap_or(false) {
                *byte |= 1 << bit;
            }
        }
    }
    out
}

/// Hex form of a bitset as shown to operators.
pub fn bits_to_hex(bits: &[bool]) -> String {
    hex::encode(pack_bits(bits))
}

/// Which of two members opens the connection between them.
///
/// Both sides compute the same answer, so exactly one of them dials.
pub fn deterministic_outbound_connection(a: &Hash256, b: &Hash256) -> Hash256 {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let score = |who: &Hash256| {
        let mut w = HashWriter::new();
        w.write_encoded(lo).write_encoded(hi).write_encoded(who);
        w.finalize()
    };
    if score(a).cmp_as_uint(&score(b)).is_lt() {
        *a
    } else {
        *b
    }
}

/// Ring neighbours of the member at `index`: indices `index + 2^k` mod n.
fn ring_outbound(members: &[Hash256], index: usize) -> BTreeSet<Hash256> {
    let mut out = BTreeSet::new();
    let n = members.len();
    if n <= 1 {
        return out;
    }
    let Some(me) = members.get(index) else {
        return out;
    };
    let mut gap = 1usize;
    let mut gap_max = n - 1;
    let mut k = 0u32;
    loop {
        gap_max >>= 1;
        if gap_max == 0 && k > 1 {
            break;
        }
        let idx = (index + gap) % n;
        gap <<= 1;
        k += 1;
        match members.get(idx) {
            Some(other) if other != me => {
                out.insert(*other);
            }
            _ => {}
        }
    }
    out
}

/// Members `for_member` relays recovered signatures and DKG messages to.
///
/// With `only_outbound` unset the result also contains members whose own ring
/// reaches `for_member`.
pub fn relay_members(members: &[Hash256], for_member: &Hash256, only_outbound: bool) -> BTreeSet<Hash256> {
    let Some(index) = members.iter().position(|m| m == for_member) else {
        return BTreeSet::new();
    };
    let mut out = ring_outbound(members, index);
    if !only_outbound {
        for (i, other) in members.iter().enumerate() {
            if other != for_member && ring_outbound(members, i).contains(for_member) {
                out.insert(*other);
            }
        }
    }
    out
}

/// The members `for_member` keeps connections to while the quorum is active.
pub fn quorum_connections(
    members: &[Hash256],
    for_member: &Hash256,
    all_members_connected: bool,
    only_outbound: bool,
) -> BTreeSet<Hash256> {
    if !all_members_connected {
        return relay_members(members, for_member, only_outbound);
    }
    members
        .iter()
        .filter(|other| *other != for_member)
        .filter(|other| !only_outbound || deterministic_outbound_connection(for_member, other) == **other)
        .copied()
        .collect()
}

/// Indices into a member list of size `list_size` that a non-member watches for `base_hash`.
pub fn watch_connections(seed: Hash256, base_hash: &Hash256, list_size: usize, count: usize) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    if list_size == 0 {
        return out;
    }
    let mut rnd = seed;
    for _ in 0..count {
        let mut w = HashWriter::new();
        w.write_encoded(&rnd).write_encoded(base_hash);
        rnd = w.finalize();
        let low = rnd.as_bytes().first_chunk::<8>().copied().unwrap_or_default();
        out.insert((u64::from_le_bytes(low) % list_size as u64) as usize);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> Vec<Hash256> {
        (1..=n).map(|i| Hash256([i; 32])).collect()
    }

    #[test]
    fn bits_pack_lsb_first() {
        assert_eq!(bits_to_hex(&[true, false, false, false, false, false, false, false, false, true]), "0102");
        assert_eq!(bits_to_hex(&[]), "");
    }

    #[test]
    fn outbound_choice_is_symmetric() {
        let (a, b) = (Hash256([1; 32]), Hash256([2; 32]));
        assert_eq!(deterministic_outbound_connection(&a, &b), deterministic_outbound_connection(&b, &a));
    }

    #[test]
    fn ring_uses_power_of_two_gaps() {
        let members = ids(10);
        let out = relay_members(&members, &members[0], true);
        let expected: BTreeSet<_> = [1usize, 2, 4].iter().map(|i| members[*i]).collect();
        assert_eq!(out, expected);
        assert!(relay_members(&members[..1], &members[0], false).is_empty());
    }

    #[test]
    fn inbound_relays_are_included_when_requested() {
        let members = ids(10);
        let both = relay_members(&members, &members[0], false);
        // Member 9 reaches member 0 with a gap of one.
        assert!(both.contains(&members[9]));
        assert!(!relay_members(&members, &members[0], true).contains(&members[9]));
    }

    #[test]
    fn full_mesh_splits_outbound_between_pairs() {
        let members = ids(5);
        let mut outbound_pairs = 0;
        for m in &members {
            outbound_pairs += quorum_connections(&members, m, true, true).len();
            assert_eq!(quorum_connections(&members, m, true, false).len(), 4);
        }
        assert_eq!(outbound_pairs, 10);
    }

    #[test]
    fn watch_indices_are_in_range_and_deterministic() {
        let a = watch_connections(Hash256([9; 32]), &Hash256([3; 32]), 7, 4);
        assert_eq!(a, watch_connections(Hash256([9; 32]), &Hash256([3; 32]), 7, 4));
        assert!(a.iter().all(|i| *i < 7));
        assert!(watch_connections(Hash256::ZERO, &Hash256::ZERO, 0, 4).is_empty());
    }
}

//! Translation between the three coordinate systems a block speaks:
//! consensus (`C`), gapped-consensus (`G`), and per-member (`M`).
//!
//! Free functions over the raw consensus/gap/edit data rather than methods
//! on `Block`, keeping coordinate arithmetic separate from the type that
//! owns the data it operates on.

use super::{DelMap, InsMap, SnpMap};
use crate::Sequence;
use std::collections::BTreeMap;

/// `Ξ(x) = x + Σ_{p < x} gaps[p]`: consensus position `x` (1-based) to its
/// gapped-coordinate column (1-based).
pub(crate) fn c_to_g(gaps: &BTreeMap<usize, usize>, x: usize) -> usize {
    let preceding_gaps: usize = gaps.range(..x).map(|(_, g)| *g).sum();
    x + preceding_gaps
}

/// Total length of the gapped-consensus coordinate space.
pub(crate) fn gapped_len(consensus_len: usize, gaps: &BTreeMap<usize, usize>) -> usize {
    consensus_len + gaps.values().sum::<usize>()
}

/// The consensus threaded with `-` runs from the gap map.
pub(crate) fn gapped_consensus(consensus: &[u8], gaps: &BTreeMap<usize, usize>) -> Sequence {
    let mut out = Vec::with_capacity(gapped_len(consensus.len(), gaps));
    for (i, &byte) in consensus.iter().enumerate() {
        out.push(byte);
        let p = i + 1;
        if let Some(&g) = gaps.get(&p) {
            out.extend(std::iter::repeat_n(b'-', g));
        }
    }
    out
}

/// Reconstruct one member's row over the gapped-consensus coordinate space:
/// at every column, either the consensus byte, a SNP, `-` for a deletion, or
/// an inserted byte filling part of a gap cluster.
pub(crate) fn member_gapped(
    consensus: &[u8],
    gaps: &BTreeMap<usize, usize>,
    snp: &SnpMap,
    ins: &InsMap,
    del: &DelMap,
) -> Sequence {
    let l = consensus.len();
    let mut deleted = vec![false; l];
    for (&pos, &len) in del {
        for p in pos..pos + len {
            if p >= 1 && p <= l {
                deleted[p - 1] = true;
            }
        }
    }

    let mut out = Vec::with_capacity(gapped_len(l, gaps));
    for (i, &cbyte) in consensus.iter().enumerate() {
        let p = i + 1;
        if deleted[i] {
            out.push(b'-');
        } else if let Some(&b) = snp.get(&p) {
            out.push(b);
        } else {
            out.push(cbyte);
        }
        if let Some(&g) = gaps.get(&p) {
            let mut cluster = vec![b'-'; g];
            for ((_, off), bytes) in ins.range((p, 0)..=(p, usize::MAX)) {
                cluster[*off..*off + bytes.len()].copy_from_slice(bytes);
            }
            out.extend(cluster);
        }
    }
    out
}

/// Strip gap columns from a gapped byte sequence.
pub(crate) fn ungap(gapped: &[u8]) -> Sequence {
    gapped.iter().copied().filter(|&b| b != b'-').collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn c_to_g_with_no_gaps_is_identity() {
        let gaps = BTreeMap::new();
        assert_eq!(c_to_g(&gaps, 1), 1);
        assert_eq!(c_to_g(&gaps, 5), 5);
    }

    #[test]
    fn c_to_g_accounts_for_preceding_gaps() {
        let gaps = BTreeMap::from([(2usize, 3usize)]);
        assert_eq!(c_to_g(&gaps, 1), 1);
        assert_eq!(c_to_g(&gaps, 2), 2);
        assert_eq!(c_to_g(&gaps, 3), 6); // position 3 sits after the 3-column cluster
    }

    #[test]
    fn gapped_consensus_threads_gap_runs() {
        let gaps = BTreeMap::from([(4usize, 2usize)]);
        assert_eq!(gapped_consensus(b"ACGTACGT", &gaps), b"ACGT--ACGT");
    }

    #[test]
    fn member_gapped_scenario_three() {
        // spec scenario 3: gaps={4:2}, ins={(4,0):"GG"}, no snp
        let gaps = BTreeMap::from([(4usize, 2usize)]);
        let snp = SnpMap::new();
        let ins = InsMap::from([((4usize, 0usize), b"GG".to_vec())]);
        let del = DelMap::new();
        let row = member_gapped(b"ACGTACGT", &gaps, &snp, &ins, &del);
        assert_eq!(row, b"ACGTGGACGT");
        assert_eq!(ungap(&row), b"ACGTGGACGT");
    }

    #[test]
    fn member_gapped_with_deletion() {
        // spec scenario 4: del={5:2} on top of scenario 2
        let gaps = BTreeMap::new();
        let snp = SnpMap::from([(3usize, b'T')]);
        let ins = InsMap::new();
        let del = DelMap::from([(5usize, 2usize)]);
        let row = member_gapped(b"ACGTACGT", &gaps, &snp, &ins, &del);
        assert_eq!(ungap(&row), b"ACTTGT");
    }
}

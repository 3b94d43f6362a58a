//! Recompute a block's consensus from the plurality nucleotide per column
//! and re-encode every member's edits against it.
//!
//! Builds the full result in locals and hands it back for the caller to
//! swap in atomically — nothing here ever touches `Block`'s fields
//! directly, so a caller that decides not to apply the result (depth <= 2)
//! leaves the block untouched.

use super::{coord, Block, DelMap, InsMap, SnpMap};
use crate::arena::NodeId;
use crate::nucl::tie_break_rank;
use crate::Sequence;
use ahash::AHashMap;
use indexmap::IndexMap;
use std::collections::BTreeMap;

pub(crate) struct Staged {
    pub consensus: Sequence,
    pub gaps: BTreeMap<usize, usize>,
    pub mutate: IndexMap<NodeId, SnpMap>,
    pub insert: IndexMap<NodeId, InsMap>,
    pub delete: IndexMap<NodeId, DelMap>,
}

fn plurality_byte(column: &[u8]) -> u8 {
    // A handful of distinct bytes per column regardless of depth, so a
    // fast-hashing map beats a tree here once depth grows into the
    // hundreds of members.
    let mut counts: AHashMap<u8, usize> = AHashMap::with_capacity(5);
    for &b in column {
        *counts.entry(b).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(b, c)| (c, std::cmp::Reverse(tie_break_rank(b))))
        .map(|(b, _)| b)
        .unwrap_or(b'-')
}

pub(crate) fn compute(block: &Block) -> Staged {
    let members: Vec<NodeId> = block.mutate.keys().copied().collect();
    let g_len = coord::gapped_len(block.consensus.len(), &block.gaps);
    log::trace!(
        "reconsensus: depth={} gapped_len={}",
        members.len(),
        g_len
    );
    let rows: Vec<Sequence> = members
        .iter()
        .map(|&n| {
            coord::member_gapped(
                &block.consensus,
                &block.gaps,
                &block.mutate[&n],
                &block.insert[&n],
                &block.delete[&n],
            )
        })
        .collect();

    let plurality: Vec<u8> = (0..g_len)
        .map(|col| plurality_byte(&rows.iter().map(|r| r[col]).collect::<Vec<_>>()))
        .collect();

    let mut new_consensus = Sequence::new();
    let mut new_gaps = BTreeMap::new();
    let mut c_pos = 0usize;

    let mut mutate: Vec<SnpMap> = vec![SnpMap::new(); members.len()];
    let mut insert: Vec<InsMap> = vec![InsMap::new(); members.len()];
    let mut delete: Vec<DelMap> = vec![DelMap::new(); members.len()];
    let mut del_open: Vec<Option<(usize, usize)>> = vec![None; members.len()];

    let mut col = 0usize;
    while col < g_len {
        if plurality[col] != b'-' {
            c_pos += 1;
            new_consensus.push(plurality[col]);
            for (i, row) in rows.iter().enumerate() {
                let b = row[col];
                if b == plurality[col] {
                    if let Some((start, len)) = del_open[i].take() {
                        delete[i].insert(start, len);
                    }
                } else if b == b'-' {
                    del_open[i] = Some(match del_open[i] {
                        Some((start, len)) => (start, len + 1),
                        None => (c_pos, 1),
                    });
                } else {
                    if let Some((start, len)) = del_open[i].take() {
                        delete[i].insert(start, len);
                    }
                    mutate[i].insert(c_pos, b);
                }
            }
            col += 1;
        } else {
            let cluster_start = col;
            while col < g_len && plurality[col] == b'-' {
                col += 1;
            }
            let cluster_end = col;
            let cluster_len = cluster_end - cluster_start;
            new_gaps.insert(c_pos, cluster_len);

            for (i, row) in rows.iter().enumerate() {
                let mut run_start: Option<usize> = None;
                for local in 0..cluster_len {
                    let b = row[cluster_start + local];
                    if b != b'-' {
                        run_start.get_or_insert(local);
                    } else if let Some(rs) = run_start.take() {
                        let bytes: Sequence =
                            (rs..local).map(|l| row[cluster_start + l]).collect();
                        insert[i].insert((c_pos, rs), bytes);
                    }
                }
                if let Some(rs) = run_start.take() {
                    let bytes: Sequence =
                        (rs..cluster_len).map(|l| row[cluster_start + l]).collect();
                    insert[i].insert((c_pos, rs), bytes);
                }
            }
        }
    }
    for (i, open) in del_open.into_iter().enumerate() {
        if let Some((start, len)) = open {
            delete[i].insert(start, len);
        }
    }

    let mut mutate_map = IndexMap::new();
    let mut insert_map = IndexMap::new();
    let mut delete_map = IndexMap::new();
    for (i, node) in members.into_iter().enumerate() {
        mutate_map.insert(node, std::mem::take(&mut mutate[i]));
        insert_map.insert(node, std::mem::take(&mut insert[i]));
        delete_map.insert(node, std::mem::take(&mut delete[i]));
    }
    log::trace!(
        "reconsensus: new consensus length={} gap clusters={}",
        new_consensus.len(),
        new_gaps.len()
    );

    Staged {
        consensus: new_consensus,
        gaps: new_gaps,
        mutate: mutate_map,
        insert: insert_map,
        delete: delete_map,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::Block;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn reconsensus_matches_plurality_with_tie_break() {
        // three members: two say 'C', one says 'G' at the single column —
        // plurality is 'C'.
        let mut b = Block::new(b"A".to_vec());
        b.append(NodeId::new(1), SnpMap::from([(1, b'C')]), InsMap::new(), DelMap::new())
            .unwrap();
        b.append(NodeId::new(2), SnpMap::from([(1, b'C')]), InsMap::new(), DelMap::new())
            .unwrap();
        b.append(NodeId::new(3), SnpMap::from([(1, b'G')]), InsMap::new(), DelMap::new())
            .unwrap();
        let staged = compute(&b);
        assert_eq!(staged.consensus, b"C");
        assert_eq!(staged.mutate[&NodeId::new(3)], SnpMap::from([(1, b'G')]));
        assert!(staged.mutate[&NodeId::new(1)].is_empty());
    }

    #[test]
    fn reconsensus_preserves_member_sequences() {
        let mut b = Block::new(b"ACGT".to_vec());
        b.append(NodeId::new(1), SnpMap::new(), InsMap::new(), DelMap::new())
            .unwrap();
        b.append(
            NodeId::new(2),
            SnpMap::from([(2, b'T')]),
            InsMap::new(),
            DelMap::from([(4, 1)]),
        )
        .unwrap();
        b.append(
            NodeId::new(3),
            SnpMap::from([(2, b'T')]),
            InsMap::new(),
            DelMap::new(),
        )
        .unwrap();
        let before: Vec<_> = [NodeId::new(1), NodeId::new(2), NodeId::new(3)]
            .iter()
            .map(|n| b.sequence_of(*n, false).unwrap())
            .collect();
        b.reconsensus().unwrap();
        let after: Vec<_> = [NodeId::new(1), NodeId::new(2), NodeId::new(3)]
            .iter()
            .map(|n| b.sequence_of(*n, false).unwrap())
            .collect();
        assert_eq!(before, after);
    }
}

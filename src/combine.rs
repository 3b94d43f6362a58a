//! Fuse two overlapping blocks along a pairwise alignment.
//!
//! Translates through an alignment record and produces one result value;
//! never mutates the inputs.

use crate::arena::NodeId;
use crate::block::{Block, DelMap, Error, InsMap, SnpMap};
use crate::cigar::{self, CigarString, QryCoord, Segment};
use crate::interval::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Forward,
    Reverse,
}

/// The pairwise alignment `combine` merges two blocks along. `qry_interval`
/// and `ref_interval` are 1-based and half-open — `[1, L+1)` spans an
/// entire length-`L` block — matching the position numbering the rest of
/// the coordinate engine uses, unlike `Interval`'s usual 0-based convention.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub cigar: CigarString,
    pub orientation: Orientation,
    pub qry_interval: Interval,
    pub ref_interval: Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    RefOnly,
    QryOnly,
    Shared,
}

#[derive(Debug, Clone)]
pub struct Child {
    pub kind: ChildKind,
    pub block: Block,
}

fn check_bounds(iv: &Interval, len: usize) -> Result<(), Error> {
    if iv.lo < 1 || iv.hi - 1 > len || iv.lo >= iv.hi {
        return Err(Error::AlignmentOutOfRange { lo: iv.lo, hi: iv.hi, len });
    }
    Ok(())
}

/// Translate a query-local consensus position (0 = before the first base,
/// `qry_map.len()` = after the last) into this segment's reference-local
/// numbering. Positions 0 and the segment's own length are anchor points
/// that always line up between the two sides, since every `Shared` segment
/// starts and ends on a boundary where query and reference realign.
fn remap_pos(qry_map: &[QryCoord], ref_len: usize, p: usize) -> Result<usize, Error> {
    if p == 0 {
        return Ok(0);
    }
    if p == qry_map.len() {
        return Ok(ref_len);
    }
    match qry_map.get(p - 1) {
        Some(QryCoord::Ref(rp)) => Ok(*rp),
        Some(QryCoord::Gap(_, _)) => Err(Error::InvariantViolation(format!(
            "query position {p} falls inside an absorbed insertion; its private edit cannot be remapped"
        ))),
        None => Err(Error::InvariantViolation(format!(
            "query position {p} outside this segment"
        ))),
    }
}

/// Remap one query member's own edits (keyed in `Q_slice`'s local
/// consensus coordinates) into the shared segment's reference-local
/// coordinates, then union in the segment's global snp/ins/del. Fails if
/// the member already carries a different value at a key the global edits
/// also touch.
fn remap_and_merge(
    node: NodeId,
    qry_map: &[QryCoord],
    ref_len: usize,
    private_snp: &SnpMap,
    private_ins: &InsMap,
    private_del: &DelMap,
    global_snp: &SnpMap,
    global_ins: &InsMap,
    global_del: &DelMap,
) -> Result<(SnpMap, InsMap, DelMap), Error> {
    let mut snp = SnpMap::new();
    for (&p, &b) in private_snp {
        snp.insert(remap_pos(qry_map, ref_len, p)?, b);
    }
    let mut del = DelMap::new();
    for (&p, &len) in private_del {
        del.insert(remap_pos(qry_map, ref_len, p)?, len);
    }
    let mut ins = InsMap::new();
    for (&(p, off), bytes) in private_ins {
        let rp = remap_pos(qry_map, ref_len, p)?;
        ins.insert((rp, off), bytes.clone());
    }

    for (&p, &b) in global_snp {
        match snp.get(&p) {
            Some(&existing) if existing != b => {
                return Err(Error::EditCollision { node, key: format!("{p}") })
            }
            _ => {
                snp.insert(p, b);
            }
        }
    }
    for (&p, &len) in global_del {
        match del.get(&p) {
            Some(&existing) if existing != len => {
                return Err(Error::EditCollision { node, key: format!("{p}") })
            }
            _ => {
                del.insert(p, len);
            }
        }
    }
    for (&key, bytes) in global_ins {
        match ins.get(&key) {
            Some(existing) if existing != bytes => {
                return Err(Error::EditCollision {
                    node,
                    key: format!("({}, {})", key.0, key.1),
                })
            }
            _ => {
                ins.insert(key, bytes.clone());
            }
        }
    }

    Ok((snp, ins, del))
}

/// Merge `q` and `r` along `alignment`, producing the ordered list of
/// ref-only / qry-only / shared children.
pub fn combine(q: &Block, r: &Block, alignment: &Alignment, maxgap: usize) -> Result<Vec<Child>, Error> {
    log::debug!(
        "combine({}, {}): qry={} ref={} orientation={:?}",
        q.id(),
        r.id(),
        alignment.qry_interval,
        alignment.ref_interval,
        alignment.orientation
    );
    check_bounds(&alignment.qry_interval, q.length())?;
    check_bounds(&alignment.ref_interval, r.length())?;

    let q_len = q.length();
    let (qiv_lo, qiv_hi) = (alignment.qry_interval.lo - 1, alignment.qry_interval.hi - 1);
    let (riv_lo, riv_hi) = (alignment.ref_interval.lo - 1, alignment.ref_interval.hi - 1);

    let mut children = Vec::new();

    if riv_lo > 0 {
        children.push(Child { kind: ChildKind::RefOnly, block: r.slice(0, riv_lo)? });
    }
    if qiv_lo > 0 {
        children.push(Child { kind: ChildKind::QryOnly, block: q.slice(0, qiv_lo)? });
    }

    let q_oriented = match alignment.orientation {
        Orientation::Forward => q.clone(),
        Orientation::Reverse => q.reverse_complement()?,
    };
    let (al_q_lo, al_q_hi) = match alignment.orientation {
        Orientation::Forward => (qiv_lo, qiv_hi),
        Orientation::Reverse => (q_len - qiv_hi, q_len - qiv_lo),
    };

    let q_slice = q_oriented.slice(al_q_lo, al_q_hi)?;
    let r_slice = r.slice(riv_lo, riv_hi)?;

    let segments = cigar::partition(&alignment.cigar, q_slice.sequence(), r_slice.sequence(), maxgap)?;

    for seg in segments {
        match seg {
            Segment::QryOnly { qry } => {
                children.push(Child { kind: ChildKind::QryOnly, block: q_slice.slice(qry.lo, qry.hi)? });
            }
            Segment::RefOnly { ref_ } => {
                children.push(Child { kind: ChildKind::RefOnly, block: r_slice.slice(ref_.lo, ref_.hi)? });
            }
            Segment::Shared { qry, ref_, snp, ins, del, qry_map, .. } => {
                // reference members already sit relative to this span's
                // consensus — their own edits and gap clusters carry over
                // unchanged, we only need to layer in the gap clusters this
                // segment's absorbed insertions introduce.
                let mut new_block = r_slice.slice(ref_.lo, ref_.hi)?;
                for (&(p, off), bytes) in &ins {
                    new_block.merge_gap_cluster(p, off + bytes.len())?;
                }

                let q_slice_segment = q_slice.slice(qry.lo, qry.hi)?;
                let seg_ref_len = ref_.len();
                for node in q_slice_segment.members() {
                    let private_snp = q_slice_segment.raw_snp(node)?;
                    let private_ins = q_slice_segment.raw_ins(node)?;
                    let private_del = q_slice_segment.raw_del(node)?;
                    let (merged_snp, merged_ins, merged_del) = remap_and_merge(
                        node,
                        &qry_map,
                        seg_ref_len,
                        private_snp,
                        private_ins,
                        private_del,
                        &snp,
                        &ins,
                        &del,
                    )?;
                    new_block.append(node, merged_snp, merged_ins, merged_del)?;
                }

                new_block.reconsensus()?;
                children.push(Child { kind: ChildKind::Shared, block: new_block });
            }
        }
    }

    if qiv_hi < q_len {
        children.push(Child { kind: ChildKind::QryOnly, block: q.slice(qiv_hi, q_len)? });
    }
    if riv_hi < r.length() {
        children.push(Child { kind: ChildKind::RefOnly, block: r.slice(riv_hi, r.length())? });
    }

    log::debug!("combine: produced {} children", children.len());
    Ok(children)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arena::NodeId;
    use crate::block::Block;
    use crate::cigar::parse_cigar_string;
    use pretty_assertions::assert_eq;
    use test_log::test;

    #[test]
    fn scenario_6_full_span_combine() {
        let mut q = Block::new(b"ACGT".to_vec());
        q.append(NodeId::new(1), SnpMap::new(), InsMap::new(), DelMap::new())
            .unwrap();
        let mut r = Block::new(b"ACCT".to_vec());
        r.append(NodeId::new(2), SnpMap::new(), InsMap::new(), DelMap::new())
            .unwrap();

        let alignment = Alignment {
            cigar: parse_cigar_string("4M").unwrap(),
            orientation: Orientation::Forward,
            qry_interval: Interval::new(1, 5),
            ref_interval: Interval::new(1, 5),
        };

        let children = combine(&q, &r, &alignment, 10).unwrap();
        assert_eq!(children.len(), 1);
        let shared = &children[0];
        assert_eq!(shared.kind, ChildKind::Shared);
        assert_eq!(shared.block.depth(), 2);
        assert_eq!(
            shared.block.sequence_of(NodeId::new(1), false).unwrap(),
            b"ACGT"
        );
        assert_eq!(
            shared.block.sequence_of(NodeId::new(2), false).unwrap(),
            b"ACCT"
        );
    }

    #[test]
    fn out_of_range_alignment_is_rejected() {
        let q = Block::new(b"ACGT".to_vec());
        let r = Block::new(b"ACCT".to_vec());
        let alignment = Alignment {
            cigar: parse_cigar_string("4M").unwrap(),
            orientation: Orientation::Forward,
            qry_interval: Interval::new(1, 9),
            ref_interval: Interval::new(1, 5),
        };
        assert!(combine(&q, &r, &alignment, 10).is_err());
    }

    /// P5: for a partial-overlap alignment, every shared child's members
    /// round-trip to the sequence they carried before the merge, restricted
    /// to the span that child covers; the leading/trailing unmatched spans
    /// survive untouched as their own ref-only/qry-only children.
    #[test]
    fn property_p5_partial_overlap_preserves_member_sequences() -> anyhow::Result<()> {
        let mut q = Block::new(b"TTACGTACGTGG".to_vec());
        q.append(NodeId::new(1), SnpMap::new(), InsMap::new(), DelMap::new())?;
        let mut r = Block::new(b"ACGTACCTCCCC".to_vec());
        r.append(NodeId::new(2), SnpMap::new(), InsMap::new(), DelMap::new())?;

        // q's middle 8bp (positions 3..10) aligns to r's leading 8bp
        // (positions 1..8); q has a 2bp prefix and r a 4bp suffix outside
        // the alignment.
        let alignment = Alignment {
            cigar: parse_cigar_string("8M").unwrap(),
            orientation: Orientation::Forward,
            qry_interval: Interval::new(3, 11),
            ref_interval: Interval::new(1, 9),
        };

        let children = combine(&q, &r, &alignment, 10)?;
        let q_seq = q.sequence_of(NodeId::new(1), false)?;
        let r_seq = r.sequence_of(NodeId::new(2), false)?;

        let mut saw_shared = false;
        for child in &children {
            match child.kind {
                ChildKind::Shared => {
                    saw_shared = true;
                    assert_eq!(child.block.depth(), 2);
                    assert_eq!(
                        child.block.sequence_of(NodeId::new(1), false)?,
                        q_seq[2..10]
                    );
                    assert_eq!(
                        child.block.sequence_of(NodeId::new(2), false)?,
                        r_seq[0..8]
                    );
                }
                ChildKind::QryOnly => {
                    assert_eq!(child.block.sequence().len(), 2);
                }
                ChildKind::RefOnly => {
                    assert_eq!(child.block.sequence(), &r_seq[8..12]);
                }
            }
        }
        assert!(saw_shared, "expected a shared child");
        Ok(())
    }

    #[test]
    fn reverse_orientation_revcomps_query_before_merging() -> anyhow::Result<()> {
        let mut q = Block::new(b"ACGT".to_vec());
        q.append(NodeId::new(1), SnpMap::new(), InsMap::new(), DelMap::new())?;
        // revcomp(ACGT) = ACGT (palindrome), so a reverse-oriented full-span
        // alignment against the same reference still merges cleanly.
        let mut r = Block::new(b"ACGT".to_vec());
        r.append(NodeId::new(2), SnpMap::new(), InsMap::new(), DelMap::new())?;

        let alignment = Alignment {
            cigar: parse_cigar_string("4M").unwrap(),
            orientation: Orientation::Reverse,
            qry_interval: Interval::new(1, 5),
            ref_interval: Interval::new(1, 5),
        };
        let children = combine(&q, &r, &alignment, 10)?;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].block.depth(), 2);
        Ok(())
    }
}

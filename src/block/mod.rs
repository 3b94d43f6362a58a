//! The `Block`: a compressed multi-genome alignment. One consensus
//! sequence, a gap map threading `-` runs through it, and per-member
//! SNP/insertion/deletion edit maps that reconstruct each genome's own
//! sequence from the consensus.

pub mod error;
mod coord;
mod reconsensus;

pub use error::Error;

pub use crate::arena::NodeId;
use crate::Sequence;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Substitutions: consensus position -> replacement nucleotide.
pub type SnpMap = BTreeMap<usize, u8>;
/// Insertions: (consensus position, 0-based offset into its gap cluster) -> bytes.
pub type InsMap = BTreeMap<(usize, usize), Sequence>;
/// Deletions: consensus position -> run length.
pub type DelMap = BTreeMap<usize, usize>;

static NEXT_UUID: AtomicU64 = AtomicU64::new(0);

fn fresh_uuid() -> String {
    format!("b{}", NEXT_UUID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    uuid: String,
    consensus: Sequence,
    gaps: BTreeMap<usize, usize>,
    mutate: IndexMap<NodeId, SnpMap>,
    insert: IndexMap<NodeId, InsMap>,
    delete: IndexMap<NodeId, DelMap>,
}

impl Block {
    /// A depth-0 block wrapping a raw consensus sequence, no gap clusters.
    pub fn new(consensus: impl Into<Sequence>) -> Block {
        Self::with_gaps(consensus, BTreeMap::new())
    }

    /// A depth-0 block with a pre-established gap map — used by `combine`
    /// to seed `B_new`'s gap clusters before any member is appended, since
    /// `append!` requires a gap cluster to already exist before an
    /// insertion into it can validate.
    pub fn with_gaps(consensus: impl Into<Sequence>, gaps: BTreeMap<usize, usize>) -> Block {
        Block {
            uuid: fresh_uuid(),
            consensus: consensus.into(),
            gaps,
            mutate: IndexMap::new(),
            insert: IndexMap::new(),
            delete: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.uuid
    }

    pub fn depth(&self) -> usize {
        self.mutate.len()
    }

    pub fn length(&self) -> usize {
        self.consensus.len()
    }

    pub fn length_of(&self, node: NodeId) -> Result<usize, Error> {
        Ok(self.sequence_of(node, false)?.len())
    }

    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.mutate.keys().copied()
    }

    /// The gap-free consensus bytes.
    pub fn sequence(&self) -> &[u8] {
        &self.consensus
    }

    /// The consensus threaded with gap-column runs.
    pub fn sequence_gapped(&self) -> Sequence {
        coord::gapped_consensus(&self.consensus, &self.gaps)
    }

    /// A member's own sequence, gapped or not.
    pub fn sequence_of(&self, node: NodeId, gaps: bool) -> Result<Sequence, Error> {
        let row = self.member_row(node)?;
        Ok(if gaps { row } else { coord::ungap(&row) })
    }

    fn member_row(&self, node: NodeId) -> Result<Sequence, Error> {
        let snp = self
            .mutate
            .get(&node)
            .ok_or_else(|| Error::InvariantViolation(format!("no such member: {node}")))?;
        Ok(coord::member_gapped(
            &self.consensus,
            &self.gaps,
            snp,
            &self.insert[&node],
            &self.delete[&node],
        ))
    }

    fn validate_edits(&self, snp: &SnpMap, ins: &InsMap, del: &DelMap) -> Result<(), Error> {
        let l = self.length();
        for &p in snp.keys() {
            if p < 1 || p > l {
                return Err(Error::InvariantViolation(format!(
                    "snp position {p} outside [1, {l}]"
                )));
            }
        }
        for (&p, &len) in del.iter() {
            if p < 1 || p + len - 1 > l {
                return Err(Error::InvariantViolation(format!(
                    "deletion at {p} of length {len} runs past consensus length {l}"
                )));
            }
        }
        for ((p, off), bytes) in ins.iter() {
            let cluster_len = *self.gaps.get(p).ok_or_else(|| {
                Error::InvariantViolation(format!("insertion at {p} has no gap cluster"))
            })?;
            if off + bytes.len() > cluster_len {
                return Err(Error::InvariantViolation(format!(
                    "insertion at ({p}, {off}) of length {} exceeds gap cluster length {cluster_len}",
                    bytes.len()
                )));
            }
        }
        Ok(())
    }

    /// Register a new member with its edits relative to this block's
    /// consensus. Fails if `node` is already present or an edit references
    /// a position outside the consensus or an oversized gap cluster.
    pub fn append(
        &mut self,
        node: NodeId,
        snp: SnpMap,
        ins: InsMap,
        del: DelMap,
    ) -> Result<(), Error> {
        if self.mutate.contains_key(&node) {
            return Err(Error::DuplicateMember(node));
        }
        self.validate_edits(&snp, &ins, &del)?;
        self.mutate.insert(node, snp);
        self.insert.insert(node, ins);
        self.delete.insert(node, del);
        Ok(())
    }

    /// Relabel a single member.
    pub fn swap_one(&mut self, old: NodeId, new: NodeId) -> Result<(), Error> {
        if old == new {
            return Ok(());
        }
        if !self.mutate.contains_key(&old) {
            return Err(Error::InvariantViolation(format!("no such member: {old}")));
        }
        if self.mutate.contains_key(&new) {
            return Err(Error::DuplicateMember(new));
        }
        let snp = self.mutate.shift_remove(&old).unwrap();
        let ins = self.insert.shift_remove(&old).unwrap();
        let del = self.delete.shift_remove(&old).unwrap();
        self.mutate.insert(new, snp);
        self.insert.insert(new, ins);
        self.delete.insert(new, del);
        Ok(())
    }

    /// Coalesce several member nodes into one, merging their edit maps.
    /// Fails with `EditCollision` if two of them disagree at the same key,
    /// or if any two carry an insertion at the same `(pos, offset)` at all
    /// (even an identical one — the intent behind two separate insertions
    /// landing on one slot is ambiguous).
    pub fn swap_many(&mut self, olds: &[NodeId], new: NodeId) -> Result<(), Error> {
        for &old in olds {
            if !self.mutate.contains_key(&old) {
                return Err(Error::InvariantViolation(format!("no such member: {old}")));
            }
        }
        if !olds.contains(&new) && self.mutate.contains_key(&new) {
            return Err(Error::DuplicateMember(new));
        }

        let mut snp = SnpMap::new();
        let mut del = DelMap::new();
        let mut ins = InsMap::new();
        for &old in olds {
            for (&k, &v) in &self.mutate[&old] {
                if let Some(&existing) = snp.get(&k) {
                    if existing != v {
                        return Err(Error::EditCollision { node: new, key: format!("{k}") });
                    }
                } else {
                    snp.insert(k, v);
                }
            }
            for (&k, &v) in &self.delete[&old] {
                if let Some(&existing) = del.get(&k) {
                    if existing != v {
                        return Err(Error::EditCollision { node: new, key: format!("{k}") });
                    }
                } else {
                    del.insert(k, v);
                }
            }
            for (&k, v) in &self.insert[&old] {
                if ins.contains_key(&k) {
                    return Err(Error::EditCollision {
                        node: new,
                        key: format!("({}, {})", k.0, k.1),
                    });
                }
                ins.insert(k, v.clone());
            }
        }

        for &old in olds {
            self.mutate.shift_remove(&old);
            self.insert.shift_remove(&old);
            self.delete.shift_remove(&old);
        }
        self.mutate.insert(new, snp);
        self.insert.insert(new, ins);
        self.delete.insert(new, del);
        Ok(())
    }

    /// A new block whose consensus is `self.consensus[lo..hi)` (0-based,
    /// half-open), with every edit and gap cluster whose key falls in that
    /// span retained and shifted by `-lo`.
    pub fn slice(&self, lo: usize, hi: usize) -> Result<Block, Error> {
        let l = self.length();
        if !(lo < hi && hi <= l) {
            return Err(Error::InvariantViolation(format!(
                "slice [{lo}, {hi}) invalid for length {l}"
            )));
        }
        let consensus = self.consensus[lo..hi].to_vec();
        let in_range = |p: &usize| *p > lo && *p <= hi;
        let gaps = self
            .gaps
            .iter()
            .filter(|(p, _)| in_range(p))
            .map(|(&p, &g)| (p - lo, g))
            .collect();

        let mut out = Block::with_gaps(consensus, gaps);
        for node in self.members() {
            let snp: SnpMap = self.mutate[&node]
                .iter()
                .filter(|(p, _)| in_range(p))
                .map(|(&p, &b)| (p - lo, b))
                .collect();
            let del: DelMap = self.delete[&node]
                .iter()
                .filter(|(p, _)| in_range(p))
                .map(|(&p, &len)| (p - lo, len))
                .collect();
            let ins: InsMap = self.insert[&node]
                .iter()
                .filter(|((p, _), _)| in_range(p))
                .map(|(&(p, off), bytes)| ((p - lo, off), bytes.clone()))
                .collect();
            out.append(node, snp, ins, del)?;
        }
        Ok(out)
    }

    /// Concatenate blocks that all share the exact same member-node set.
    pub fn concat(blocks: &[Block]) -> Result<Block, Error> {
        let first_members: std::collections::BTreeSet<NodeId> =
            blocks.first().map(|b| b.members().collect()).unwrap_or_default();
        for b in blocks {
            let members: std::collections::BTreeSet<NodeId> = b.members().collect();
            if members != first_members {
                return Err(Error::MemberSetMismatch);
            }
        }

        let mut consensus = Sequence::new();
        let mut gaps = BTreeMap::new();
        let mut snp: IndexMap<NodeId, SnpMap> = IndexMap::new();
        let mut ins: IndexMap<NodeId, InsMap> = IndexMap::new();
        let mut del: IndexMap<NodeId, DelMap> = IndexMap::new();
        for &node in &first_members {
            snp.insert(node, SnpMap::new());
            ins.insert(node, InsMap::new());
            del.insert(node, DelMap::new());
        }

        let mut prefix = 0usize;
        for b in blocks {
            consensus.extend_from_slice(&b.consensus);
            for (&p, &g) in &b.gaps {
                gaps.insert(p + prefix, g);
            }
            for &node in &first_members {
                for (&p, &nuc) in &b.mutate[&node] {
                    snp[&node].insert(p + prefix, nuc);
                }
                for (&p, &len) in &b.delete[&node] {
                    del[&node].insert(p + prefix, len);
                }
                for (&(p, off), bytes) in &b.insert[&node] {
                    ins[&node].insert((p + prefix, off), bytes.clone());
                }
            }
            prefix += b.consensus.len();
        }

        Ok(Block {
            uuid: fresh_uuid(),
            consensus,
            gaps,
            mutate: snp,
            insert: ins,
            delete: del,
        })
    }

    /// Reverse-complement this block: reverses the consensus, the gap map,
    /// and every member's edits. Fails if any member carries an insertion
    /// into the trailing gap cluster at `p == L` — reversed, that cluster
    /// would have to sit before consensus position 1, a key outside `[1, L]`
    /// that cannot be represented, so silently dropping its bytes would
    /// violate the insert-map's position invariant instead of just losing a
    /// cluster that happened to be empty.
    pub fn reverse_complement(&self) -> Result<Block, Error> {
        let l = self.length();
        let consensus = crate::nucl::revcomp(&self.consensus);

        // gaps[p] sits after consensus position p; reversed, it sits
        // before the mirrored position l - p, i.e. after l - p - 1... but a
        // gap after position 0 has no predecessor, so it maps to the
        // cluster that now precedes position l (keyed at l - p when p < l,
        // and dropped when p == l since it would sit before position 0).
        let gaps: BTreeMap<usize, usize> = self
            .gaps
            .iter()
            .filter_map(|(&p, &g)| (p < l).then_some((l - p, g)))
            .collect();

        let mut mutate = IndexMap::new();
        let mut insert = IndexMap::new();
        let mut delete = IndexMap::new();
        for node in self.members() {
            for &(p, _) in self.insert[&node].keys() {
                if p == l {
                    return Err(Error::InvariantViolation(format!(
                        "member {node} has an insertion into the trailing gap cluster at {l}; \
                         reverse-complementing it would lose that data"
                    )));
                }
            }

            let snp: SnpMap = self.mutate[&node]
                .iter()
                .map(|(&p, &b)| (l - p + 1, crate::nucl::revcomp(&[b])[0]))
                .collect();
            let del: DelMap = self.delete[&node]
                .iter()
                .map(|(&p, &len)| (l - p - len + 2, len))
                .collect();
            let ins: InsMap = self.insert[&node]
                .iter()
                .map(|(&(p, off), bytes)| {
                    let g = self.gaps[&p];
                    let new_p = l - p;
                    let new_off = g - off - bytes.len();
                    (((new_p, new_off)), crate::nucl::revcomp(bytes))
                })
                .collect();
            mutate.insert(node, snp);
            insert.insert(node, ins);
            delete.insert(node, del);
        }

        Ok(Block {
            uuid: fresh_uuid(),
            consensus,
            gaps,
            mutate,
            insert,
            delete,
        })
    }

    /// The raw gap map: consensus position -> gap cluster length.
    pub(crate) fn raw_gaps(&self) -> &BTreeMap<usize, usize> {
        &self.gaps
    }

    /// Raw per-member edit maps, keyed to this block's own consensus.
    /// `combine` uses these to move a member's edits into a freshly built
    /// block without re-deriving them from sequence data.
    pub(crate) fn raw_snp(&self, node: NodeId) -> Result<&SnpMap, Error> {
        self.mutate
            .get(&node)
            .ok_or_else(|| Error::InvariantViolation(format!("no such member: {node}")))
    }

    pub(crate) fn raw_ins(&self, node: NodeId) -> Result<&InsMap, Error> {
        self.insert
            .get(&node)
            .ok_or_else(|| Error::InvariantViolation(format!("no such member: {node}")))
    }

    pub(crate) fn raw_del(&self, node: NodeId) -> Result<&DelMap, Error> {
        self.delete
            .get(&node)
            .ok_or_else(|| Error::InvariantViolation(format!("no such member: {node}")))
    }

    /// Register a gap cluster discovered after construction — `combine`
    /// needs this when a `Shared` segment absorbs a short insertion that
    /// didn't exist in the reference slice this block was built from.
    /// Fails if a cluster already exists at `pos` with a different length.
    pub(crate) fn merge_gap_cluster(&mut self, pos: usize, len: usize) -> Result<(), Error> {
        match self.gaps.get(&pos) {
            Some(&existing) if existing != len => Err(Error::InvariantViolation(format!(
                "gap cluster at {pos} already has length {existing}, cannot merge length {len}"
            ))),
            _ => {
                self.gaps.insert(pos, len);
                Ok(())
            }
        }
    }

    /// Recompute consensus/gaps/edit maps from the plurality nucleotide per
    /// column. Always computed; only swapped in (returning `true`) when
    /// `depth() > 2` — at depth <= 2 the plurality is arbitrary among ties
    /// and churning the encoding buys nothing.
    pub fn reconsensus(&mut self) -> Result<bool, Error> {
        let staged = reconsensus::compute(self);
        if self.depth() <= 2 {
            log::debug!("reconsensus({}): depth <= 2, leaving block unchanged", self.uuid);
            return Ok(false);
        }
        self.consensus = staged.consensus;
        self.gaps = staged.gaps;
        self.mutate = staged.mutate;
        self.insert = staged.insert;
        self.delete = staged.delete;
        Ok(true)
    }
}

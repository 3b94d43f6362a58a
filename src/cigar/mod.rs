//! CIGAR parsing and partitioning.
//!
//! A `CigarString` describes how a query sequence aligns to a reference.
//! [`partition`] walks one and splits it at long indels, classifying each
//! resulting piece as query-only, reference-only, or shared — and for
//! shared pieces, extracting the SNP/INS/DEL edits of the query relative to
//! the reference consensus.

pub mod error;

pub use error::Error;

use crate::interval::Interval;
use crate::Sequence;
use std::collections::BTreeMap;
use std::fmt::Display;

/// A single CIGAR operation, as usually defined for pairwise alignments.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum CigarOp {
    /// M — alignment match (sequence may or may not be identical)
    Match,
    /// = — sequence match
    Eq,
    /// X — sequence mismatch
    Mismatch,
    /// I — insertion to the reference
    Ins,
    /// D — deletion from the reference
    Del,
    /// S — soft clip (consumes query only)
    Soft,
    /// H — hard clip (consumes neither)
    Hard,
}

impl CigarOp {
    pub fn consumes_query(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Eq | CigarOp::Mismatch | CigarOp::Ins | CigarOp::Soft
        )
    }

    pub fn consumes_ref(&self) -> bool {
        matches!(
            self,
            CigarOp::Match | CigarOp::Eq | CigarOp::Mismatch | CigarOp::Del
        )
    }
}

impl TryFrom<char> for CigarOp {
    type Error = Error;

    fn try_from(value: char) -> Result<Self, Error> {
        Ok(match value {
            'M' => Self::Match,
            '=' => Self::Eq,
            'X' => Self::Mismatch,
            'I' => Self::Ins,
            'D' => Self::Del,
            'S' => Self::Soft,
            'H' => Self::Hard,
            _ => return Err(Error::InvalidOp(value)),
        })
    }
}

impl From<CigarOp> for char {
    fn from(val: CigarOp) -> Self {
        match val {
            CigarOp::Match => 'M',
            CigarOp::Eq => '=',
            CigarOp::Mismatch => 'X',
            CigarOp::Ins => 'I',
            CigarOp::Del => 'D',
            CigarOp::Soft => 'S',
            CigarOp::Hard => 'H',
        }
    }
}

impl Display for CigarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", std::convert::Into::<char>::into(*self))
    }
}

/// A CIGAR element: a run length plus the operation it applies to.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct CigarElement {
    pub count: u32,
    pub op: CigarOp,
}

impl Display for CigarElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.count, self.op)
    }
}

impl CigarElement {
    fn from_strs(count: &str, op: &str) -> Result<CigarElement, Error> {
        let count = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| Error::InvalidCount(count.to_string()))?
        };
        let op = op
            .chars()
            .next()
            .ok_or_else(|| Error::InvalidCount(op.to_string()))?
            .try_into()?;
        Ok(CigarElement { count, op })
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Default, Clone)]
pub struct CigarString {
    pub elems: Vec<CigarElement>,
}

impl CigarString {
    pub fn new(elems: Vec<CigarElement>) -> Self {
        Self { elems }
    }
}

impl std::ops::Deref for CigarString {
    type Target = Vec<CigarElement>;
    fn deref(&self) -> &Self::Target {
        &self.elems
    }
}

impl std::ops::DerefMut for CigarString {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.elems
    }
}

impl Display for CigarString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for item in &self.elems {
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

mod parse {
    use super::{CigarElement, Error};
    use nom::{
        bytes::complete::take_while_m_n, character::complete::digit0, sequence::pair, IResult,
    };

    fn is_cigar_op_char(c: char) -> bool {
        "=XIDMSH".contains(c)
    }

    pub fn cigar_element(input: &str) -> IResult<&str, Result<CigarElement, Error>> {
        pair(digit0, take_while_m_n(1, 1, is_cigar_op_char))(input)
            .map(|(rest, (count, op))| (rest, CigarElement::from_strs(count, op)))
    }
}

/// Parse a CIGAR string such as `"4M2I10M"` into a [`CigarString`].
pub fn parse_cigar_string(input: &str) -> Result<CigarString, Error> {
    let (rest, elems) = nom::combinator::all_consuming(nom::multi::many0(parse::cigar_element))(
        input,
    )
    .map_err(|e| Error::ParseFailed(input.to_string(), e.to_string()))?;
    let elems = elems.into_iter().collect::<Result<Vec<_>, _>>()?;
    debug_assert!(rest.is_empty());
    Ok(CigarString::new(elems))
}

/// Where a query-local position (1-based, within one `Shared` segment)
/// lands once the segment's consensus is taken from the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QryCoord {
    /// Aligns directly to this reference-local consensus position.
    Ref(usize),
    /// Falls inside the gap cluster following reference-local position
    /// `.0`, at local offset `.1` — this query base was an absorbed
    /// insertion, so it has no reference-local consensus position of its
    /// own.
    Gap(usize, usize),
}

/// One piece of a partitioned alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Query sequence not matched by the alignment (a long insertion).
    QryOnly { qry: Interval },
    /// Reference sequence not matched by the alignment (a long deletion).
    RefOnly { ref_: Interval },
    /// A jointly-aligned region. `consensus` is the reference's bytes over
    /// `ref_`; `snp`/`ins`/`del` are the query's edits relative to it, keyed
    /// by position local to this segment (1-based, matching `Block`'s own
    /// consensus-position convention; `ins`'s cluster position may be 0,
    /// meaning "before the first base of this segment"). `qry_map[i]`
    /// gives where query-local position `i + 1` lands in that same space.
    Shared {
        qry: Interval,
        ref_: Interval,
        consensus: Sequence,
        snp: BTreeMap<usize, u8>,
        ins: BTreeMap<(usize, usize), Sequence>,
        del: BTreeMap<usize, usize>,
        qry_map: Vec<QryCoord>,
    },
}

struct Accum {
    qry_start: usize,
    ref_start: usize,
    snp: BTreeMap<usize, u8>,
    ins: BTreeMap<(usize, usize), Sequence>,
    del: BTreeMap<usize, usize>,
    qry_map: Vec<QryCoord>,
}

impl Accum {
    fn new(qry_start: usize, ref_start: usize) -> Self {
        Self {
            qry_start,
            ref_start,
            snp: BTreeMap::new(),
            ins: BTreeMap::new(),
            del: BTreeMap::new(),
            qry_map: Vec::new(),
        }
    }

    fn finish(self, qry_pos: usize, ref_pos: usize, ref_seq: &[u8]) -> Option<Segment> {
        if qry_pos == self.qry_start && ref_pos == self.ref_start {
            return None;
        }
        Some(Segment::Shared {
            qry: Interval::new(self.qry_start, qry_pos),
            ref_: Interval::new(self.ref_start, ref_pos),
            consensus: ref_seq[self.ref_start..ref_pos].to_vec(),
            snp: self.snp,
            ins: self.ins,
            del: self.del,
            qry_map: self.qry_map,
        })
    }
}

/// Partition a CIGAR alignment between `qry` and `ref_` into segments,
/// splitting any indel run of length `>= maxgap` out of the shared region.
///
/// `qry`/`ref_` must be exactly the bytes the CIGAR aligns (i.e. already
/// sliced to the alignment's intervals); segment intervals are local to
/// these slices.
pub fn partition(
    cigar: &CigarString,
    qry: &[u8],
    ref_: &[u8],
    maxgap: usize,
) -> Result<Vec<Segment>, Error> {
    let mut segments = Vec::new();
    let mut qry_pos = 0usize;
    let mut ref_pos = 0usize;
    let mut accum = Accum::new(0, 0);

    for elem in cigar.elems.iter() {
        let count = elem.count as usize;
        match elem.op {
            CigarOp::Match | CigarOp::Eq | CigarOp::Mismatch => {
                for _ in 0..count {
                    let q = *qry
                        .get(qry_pos)
                        .ok_or(Error::QueryLengthMismatch { consumed: qry_pos + 1, expected: qry.len() })?;
                    let r = *ref_
                        .get(ref_pos)
                        .ok_or(Error::RefLengthMismatch { consumed: ref_pos + 1, expected: ref_.len() })?;
                    if q != r {
                        accum.snp.insert(ref_pos - accum.ref_start + 1, q);
                    }
                    accum.qry_map.push(QryCoord::Ref(ref_pos - accum.ref_start + 1));
                    qry_pos += 1;
                    ref_pos += 1;
                }
            }
            CigarOp::Ins => {
                if count >= maxgap {
                    let taken = std::mem::replace(&mut accum, Accum::new(qry_pos, ref_pos));
                    if let Some(seg) = taken.finish(qry_pos, ref_pos, ref_) {
                        segments.push(seg);
                    }
                    segments.push(Segment::QryOnly {
                        qry: Interval::new(qry_pos, qry_pos + count),
                    });
                    qry_pos += count;
                    accum = Accum::new(qry_pos, ref_pos);
                } else {
                    let bytes = qry[qry_pos..qry_pos + count].to_vec();
                    let gap_pos = ref_pos - accum.ref_start;
                    for off in 0..count {
                        accum.qry_map.push(QryCoord::Gap(gap_pos, off));
                    }
                    accum.ins.insert((gap_pos, 0), bytes);
                    qry_pos += count;
                }
            }
            CigarOp::Del => {
                if count >= maxgap {
                    let taken = std::mem::replace(&mut accum, Accum::new(qry_pos, ref_pos));
                    if let Some(seg) = taken.finish(qry_pos, ref_pos, ref_) {
                        segments.push(seg);
                    }
                    segments.push(Segment::RefOnly {
                        ref_: Interval::new(ref_pos, ref_pos + count),
                    });
                    ref_pos += count;
                    accum = Accum::new(qry_pos, ref_pos);
                } else {
                    accum.del.insert(ref_pos - accum.ref_start + 1, count);
                    ref_pos += count;
                }
            }
            CigarOp::Soft => {
                qry_pos += count;
            }
            CigarOp::Hard => {}
        }
    }

    if let Some(seg) = accum.finish(qry_pos, ref_pos, ref_) {
        segments.push(seg);
    }

    if qry_pos != qry.len() {
        return Err(Error::QueryLengthMismatch {
            consumed: qry_pos,
            expected: qry.len(),
        });
    }
    if ref_pos != ref_.len() {
        return Err(Error::RefLengthMismatch {
            consumed: ref_pos,
            expected: ref_.len(),
        });
    }

    Ok(segments)
}

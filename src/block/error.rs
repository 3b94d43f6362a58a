//! Error type for the block container, coordinate engine, reconsensus, and
//! combine — the taxonomy a caller actually needs to distinguish.

use crate::arena::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("member sets do not match")]
    MemberSetMismatch,
    #[error("member {0} is already present")]
    DuplicateMember(NodeId),
    #[error("edit collision for member {node} at {key}")]
    EditCollision { node: NodeId, key: String },
    #[error("alignment interval [{lo}, {hi}) exceeds parent consensus length {len}")]
    AlignmentOutOfRange { lo: usize, hi: usize, len: usize },
    #[error("malformed CIGAR")]
    MalformedCigar(#[from] crate::cigar::Error),
}

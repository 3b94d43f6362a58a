//! Error type for CIGAR parsing and partitioning.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid CIGAR operation character: {0:?}")]
    InvalidOp(char),
    #[error("invalid CIGAR run length: {0:?}")]
    InvalidCount(String),
    #[error("could not parse CIGAR string {0:?}: {1}")]
    ParseFailed(String, String),
    #[error("CIGAR consumes {consumed} query bases but qry_interval has length {expected}")]
    QueryLengthMismatch { consumed: usize, expected: usize },
    #[error("CIGAR consumes {consumed} reference bases but ref_interval has length {expected}")]
    RefLengthMismatch { consumed: usize, expected: usize },
}

//! Byte-level DNA sequence primitives.

pub use crate::nucl::error::Error;
use crate::Sequence;
use md5::{Digest, Md5};

mod error {
    /// Error type for sequence primitives.
    #[derive(thiserror::Error, Debug, Clone)]
    pub enum Error {
        #[error("hamming distance requires equal-length sequences: {0} vs {1}")]
        LengthMismatch(usize, usize),
    }
}

/// Plurality tie-break order used by reconsensus when two nucleotides tie
/// for the most common byte in a column: `A < C < G < T < N`, with `-`
/// (gap) always losing to any real nucleotide.
pub const TIE_BREAK_ORDER: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

/// Returns the tie-break rank of a byte: lower is preferred. Gaps (`-`)
/// rank behind every real nucleotide; anything else ranks last of all.
pub fn tie_break_rank(b: u8) -> usize {
    if let Some(pos) = TIE_BREAK_ORDER.iter().position(|&c| c == b) {
        pos
    } else if b == b'-' {
        TIE_BREAK_ORDER.len()
    } else {
        TIE_BREAK_ORDER.len() + 1
    }
}

/// Reverse-complement a DNA byte sequence (`A<->T`, `C<->G`, `N<->N`,
/// `-<->-`).
pub fn revcomp(seq: &[u8]) -> Sequence {
    bio::alphabets::dna::revcomp(seq)
}

/// Count mismatching positions between two equal-length sequences.
pub fn hamming(a: &[u8], b: &[u8]) -> Result<usize, Error> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch(a.len(), b.len()));
    }
    Ok(a.iter().zip(b.iter()).filter(|(x, y)| x != y).count())
}

/// MD5 hex digest of a raw byte sequence, used to cheaply recognize
/// byte-identical consensus sequences.
pub fn content_hash(seq: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(seq);
    let hash = hasher.finalize();
    let mut buf = [0u8; 64];
    let checksum =
        base16ct::lower::encode_str(&hash, &mut buf).expect("cannot perform base16 encoding");
    checksum.to_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn revcomp_cases() {
        assert_eq!(revcomp(b""), b"");
        assert_eq!(revcomp(b"A"), b"T");
        assert_eq!(revcomp(b"AG"), b"CT");
        assert_eq!(revcomp(b"CGAG"), b"CTCG");
        assert_eq!(revcomp(b"ACGT"), b"ACGT"); // palindrome, scenario 5
    }

    #[test]
    fn hamming_cases() -> Result<(), Error> {
        assert_eq!(hamming(b"ACGT", b"ACGT")?, 0);
        assert_eq!(hamming(b"ACGT", b"ACGA")?, 1);
        assert!(hamming(b"ACGT", b"ACG").is_err());
        Ok(())
    }

    #[test]
    fn tie_break_prefers_acgt_over_gap_and_other() {
        assert!(tie_break_rank(b'A') < tie_break_rank(b'C'));
        assert!(tie_break_rank(b'T') < tie_break_rank(b'N'));
        assert!(tie_break_rank(b'N') < tie_break_rank(b'-'));
        assert!(tie_break_rank(b'-') < tie_break_rank(b'?'));
    }

    #[test]
    fn content_hash_stable() {
        assert_eq!(content_hash(b"ACGT"), content_hash(b"ACGT"));
        assert_ne!(content_hash(b"ACGT"), content_hash(b"ACGA"));
    }
}

// <LICENSE>
// Copyright 2023 hgvs-rs Contributors
// Copyright 2014 Bioutils Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// </LICENSE>

//! Block (de)serialization. The only place this crate touches I/O — every
//! other external surface (files, FASTA, the CLI) is the caller's job.

pub mod error;
pub mod json;

pub use error::Error;

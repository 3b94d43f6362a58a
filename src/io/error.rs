//! Error type for the canonical JSON serializer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("block data is not ASCII")]
    NonAscii,
    #[error("malformed key: {0:?}")]
    MalformedKey(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Block(#[from] crate::block::Error),
}

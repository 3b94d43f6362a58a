pub mod arena;
pub mod block;
pub mod cigar;
pub mod combine;
pub mod interval;
pub mod io;
pub mod nucl;

pub use block::{Block, NodeId};
pub use combine::{combine, Alignment, Child, ChildKind, Orientation};

pub(crate) type Sequence = Vec<u8>;

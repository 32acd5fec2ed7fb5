//! Cardinality metadata gathered from dataset descriptions.

mod index;

pub use index::{CardinalityIndex, IndexedMetadata};

//! Weir Runtime: adaptive multi-way joins over streams of solution mappings.
//!
//! An adaptive join starts executing with the cardinality estimates known up
//! front and restarts once, mid-stream, when better estimates arrive. The
//! restart is invisible to the consumer: results already delivered are not
//! delivered again.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ AdaptiveJoinCoordinator  │──── JoinMediator (phase one, phase two)
//! └────────────┬─────────────┘
//!              │
//!     ┌────────┴─────────┐
//!     │ PhaseSwitchStream│ ◄── SwapTrigger / timeout
//!     └──────────────────┘
//! ```
//!
//! Cardinalities come from each entry's [`join::entry::MetadataSource`], for
//! instance an [`metadata::IndexedMetadata`] lookup into a shared
//! [`metadata::CardinalityIndex`].

pub mod bindings;
pub mod cardinality;
pub mod context;
pub mod join;
pub mod metadata;

pub use cardinality::{Cardinality, CardinalityKind};
pub use context::ExecutionContext;
pub use join::adaptive::AdaptiveJoinCoordinator;
pub use join::phase_switch::PhaseSwitchStream;

//! Join actors, the mediator seam, and the adaptive join machinery.
//!
//! - **accumulate**: merging cardinalities through a join tree.
//! - **sort**: ordering join entries by cardinality.
//! - **adaptive**: the two-phase adaptive join actor.
//! - **phase_switch**: the duplicate-suppressing stream swap.
//! - **nested_loop**: a reference join mediator.

pub mod accumulate;
pub mod adaptive;
pub mod entry;
pub mod nested_loop;
pub mod phase_switch;
pub mod sort;
pub mod swap;

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use weir_error::Result;

use crate::bindings::Bindings;
use crate::cardinality::Cardinality;
use crate::context::ExecutionContext;
use entry::JoinEntry;

/// A lazy stream of solution mappings.
pub type BindingsStream = BoxStream<'static, Result<Bindings>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Optional,
    Minus,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "inner"),
            JoinKind::Optional => write!(f, "optional"),
            JoinKind::Minus => write!(f, "minus"),
        }
    }
}

/// A request to join a set of entries.
#[derive(Debug)]
pub struct JoinAction {
    pub kind: JoinKind,
    pub entries: Vec<JoinEntry>,
    pub context: ExecutionContext,
}

impl JoinAction {
    pub fn new(kind: JoinKind, entries: Vec<JoinEntry>, context: ExecutionContext) -> Self {
        Self {
            kind,
            entries,
            context,
        }
    }

    /// Same kind, fresh cursors over the same entries, different context.
    pub fn clone_with_context(&self, context: ExecutionContext) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.iter().map(JoinEntry::clone_entry).collect(),
            context,
        }
    }
}

/// Metadata of a join result.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinMetadata {
    pub cardinality: Cardinality,
    pub variables: Vec<String>,
}

pub struct JoinOutput {
    pub bindings: BindingsStream,
    pub metadata: JoinMetadata,
}

impl fmt::Debug for JoinOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOutput")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Cost estimate reported by a join actor during negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JoinCoefficients {
    pub iterations: f64,
    pub persisted_items: f64,
    pub blocking_items: f64,
    pub request_time: f64,
}

impl JoinCoefficients {
    /// Coefficients that make an actor win any comparison.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Executes a join with whatever algorithm it selects. May be re-entered.
#[async_trait]
pub trait JoinMediator: Send + Sync {
    async fn mediate(&self, action: JoinAction) -> Result<JoinOutput>;
}

/// A join strategy taking part in actor negotiation.
#[async_trait]
pub trait JoinActor: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with a recoverable error when the actor cannot handle `action`.
    async fn test(&self, action: &JoinAction) -> Result<JoinCoefficients>;

    async fn run(&self, action: JoinAction) -> Result<JoinOutput>;
}

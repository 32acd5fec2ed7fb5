//! Ordering join entries by cardinality.

use std::cmp::Ordering;

use crate::cardinality::{Cardinality, CardinalityKind};
use crate::context::{keys, ExecutionContext};
use crate::join::entry::JoinEntry;

/// A join entry paired with its resolved cardinality.
#[derive(Debug)]
pub struct ResolvedEntry {
    pub entry: JoinEntry,
    pub cardinality: Cardinality,
}

/// Sorts entries by ascending cardinality, trusting index statistics over
/// exact local counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryOrderer;

impl EntryOrderer {
    /// Index-sourced entries go before exact ones whatever their values: an
    /// exact count may only describe a local fragment, while an index
    /// describes the whole remote dataset. Everything else is ascending by value.
    pub fn compare(left: &Cardinality, right: &Cardinality) -> Ordering {
        match (left.kind(), right.kind()) {
            (CardinalityKind::Index, CardinalityKind::Exact) => Ordering::Less,
            (CardinalityKind::Exact, CardinalityKind::Index) => Ordering::Greater,
            _ => left.value().total_cmp(&right.value()),
        }
    }

    /// Stable sort by [`EntryOrderer::compare`].
    ///
    /// The comparator is not transitive once estimates are mixed with index
    /// and exact entries, so this is an insertion sort, which only ever swaps
    /// adjacent elements and cannot fail on an inconsistent order. Join
    /// entry counts are small.
    pub fn order<T, F>(mut items: Vec<T>, cardinality: F) -> Vec<T>
    where
        F: Fn(&T) -> &Cardinality,
    {
        for i in 1..items.len() {
            let mut j = i;
            while j > 0
                && Self::compare(cardinality(&items[j - 1]), cardinality(&items[j]))
                    == Ordering::Greater
            {
                items.swap(j - 1, j);
                j -= 1;
            }
        }
        items
    }

    pub fn order_entries(entries: Vec<ResolvedEntry>) -> Vec<ResolvedEntry> {
        Self::order(entries, |resolved| &resolved.cardinality)
    }

    /// Apply the cardinality order only when the context requests it.
    pub fn order_for_context(
        entries: Vec<ResolvedEntry>,
        context: &ExecutionContext,
    ) -> Vec<ResolvedEntry> {
        if context.flag(&keys::SORT_BY_CARDINALITY) {
            Self::order_entries(entries)
        } else {
            entries
        }
    }
}

//! Cardinality accumulation through a join tree.
//!
//! Merging is monotone with priority `Index > dataset-scoped > summation` and
//! `+inf` as the absorbing top element.

use crate::cardinality::{Cardinality, CardinalityKind};

/// Merges running cardinality estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardinalityAccumulator;

impl CardinalityAccumulator {
    /// The value before any merge: `{Exact, 0}`.
    pub fn initial() -> Cardinality {
        Cardinality::exact(0.0)
    }

    /// Merge `appending` into `accumulated`, producing a new value.
    pub fn merge(accumulated: &Cardinality, appending: Option<&Cardinality>) -> Cardinality {
        // An index-sourced estimate is authoritative and never diluted.
        if accumulated.kind() == CardinalityKind::Index {
            return accumulated.clone();
        }
        if let Some(appending) = appending {
            if appending.kind() == CardinalityKind::Index {
                return appending.clone();
            }
        }

        let mut accumulated = accumulated.clone();
        let disjoint_scopes = match (accumulated.dataset(), appending.and_then(Cardinality::dataset)) {
            (Some(scope), Some(other)) => Some(scope != other),
            (Some(_), None) => Some(false),
            (None, _) => None,
        };
        match disjoint_scopes {
            // The union of two disjoint scopes is scoped to neither.
            Some(true) => accumulated = accumulated.without_dataset(),
            Some(false) => return accumulated,
            None => {}
        }

        let appending = match appending {
            Some(appending) if appending.is_finite() => appending,
            _ => return Cardinality::unknown(),
        };

        let sum = accumulated.value() + appending.value();
        if accumulated.kind() == CardinalityKind::Estimate
            || appending.kind() == CardinalityKind::Estimate
        {
            Cardinality::estimate(sum)
        } else {
            Cardinality::exact(sum)
        }
    }

    /// Fold a sequence of (possibly absent) cardinalities from [`Self::initial`].
    pub fn accumulate<'a, I>(cardinalities: I) -> Cardinality
    where
        I: IntoIterator<Item = Option<&'a Cardinality>>,
    {
        cardinalities
            .into_iter()
            .fold(Self::initial(), |acc, next| Self::merge(&acc, next))
    }
}

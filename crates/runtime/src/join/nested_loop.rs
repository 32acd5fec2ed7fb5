//! A nested-loop join mediator.
//!
//! Materializes every operand and joins them pairwise. Meant as the plain
//! collaborator behind the adaptive join in demos and tests, not as a fast
//! join algorithm.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};
use weir_error::Result;

use crate::bindings::Bindings;
use crate::cardinality::Cardinality;
use crate::join::accumulate::CardinalityAccumulator;
use crate::join::sort::{EntryOrderer, ResolvedEntry};
use crate::join::{BindingsStream, JoinAction, JoinKind, JoinMediator, JoinMetadata, JoinOutput};

#[derive(Debug, Clone, Default)]
pub struct NestedLoopMediator {
    mediations: Arc<AtomicUsize>,
}

impl NestedLoopMediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `mediate` calls served so far.
    pub fn mediations(&self) -> usize {
        self.mediations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JoinMediator for NestedLoopMediator {
    async fn mediate(&self, action: JoinAction) -> Result<JoinOutput> {
        self.mediations.fetch_add(1, Ordering::SeqCst);

        let mut resolved = Vec::with_capacity(action.entries.len());
        for entry in action.entries {
            let cardinality = entry.cardinality().await.unwrap_or_else(|e| {
                warn!(target: "adaptive_join", error = %e, "Metadata probe failed");
                Cardinality::unknown()
            });
            resolved.push(ResolvedEntry { entry, cardinality });
        }

        // Only inner joins commute.
        if action.kind == JoinKind::Inner {
            resolved = EntryOrderer::order_for_context(resolved, &action.context);
        }

        let cardinality =
            CardinalityAccumulator::accumulate(resolved.iter().map(|r| Some(&r.cardinality)));
        let mut variables: Vec<String> = resolved
            .iter()
            .flat_map(|r| r.entry.operation.variables())
            .map(str::to_string)
            .collect();
        variables.sort();
        variables.dedup();

        debug!(
            target: "adaptive_join",
            kind = %action.kind,
            entries = resolved.len(),
            %cardinality,
            "Nested loop join"
        );

        let kind = action.kind;
        let operands: Vec<BindingsStream> = resolved
            .into_iter()
            .map(|r| r.entry.into_stream())
            .collect();
        let bindings = stream::once(join_operands(kind, operands))
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok)))
            .try_flatten()
            .boxed();

        Ok(JoinOutput {
            bindings,
            metadata: JoinMetadata {
                cardinality,
                variables,
            },
        })
    }
}

async fn join_operands(kind: JoinKind, operands: Vec<BindingsStream>) -> Result<Vec<Bindings>> {
    let mut operands = operands.into_iter();
    let mut solutions: Vec<Bindings> = match operands.next() {
        Some(first) => first.try_collect().await?,
        None => return Ok(vec![Bindings::new()]),
    };

    for operand in operands {
        let right: Vec<Bindings> = operand.try_collect().await?;
        solutions = match kind {
            JoinKind::Inner => solutions
                .iter()
                .flat_map(|left| right.iter().filter_map(move |r| left.merge(r)))
                .collect(),
            JoinKind::Optional => solutions
                .into_iter()
                .flat_map(|left| {
                    let merged: Vec<_> = right.iter().filter_map(|r| left.merge(r)).collect();
                    if merged.is_empty() {
                        vec![left]
                    } else {
                        merged
                    }
                })
                .collect(),
            JoinKind::Minus => solutions
                .into_iter()
                .filter(|left| {
                    !right
                        .iter()
                        .any(|r| shares_variable(left, r) && left.merge(r).is_some())
                })
                .collect(),
        };
    }
    Ok(solutions)
}

fn shares_variable(left: &Bindings, right: &Bindings) -> bool {
    left.variables().any(|v| right.get(v).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Term;
    use crate::context::{keys, ExecutionContext};
    use crate::join::entry::{JoinEntry, Pattern, PatternTerm};

    fn person(s: &str, name: &str) -> Bindings {
        Bindings::new()
            .with("s", Term::iri(s))
            .with("name", Term::literal(name))
    }

    fn friend(s: &str, f: &str) -> Bindings {
        Bindings::new().with("s", Term::iri(s)).with("f", Term::iri(f))
    }

    fn entry(predicate: &str, object: &str, rows: Vec<Bindings>, card: Cardinality) -> JoinEntry {
        JoinEntry::from_bindings(
            Pattern::new(
                PatternTerm::var("s"),
                PatternTerm::iri(predicate),
                PatternTerm::var(object),
            ),
            rows,
            card,
        )
    }

    fn names_and_friends(names_card: Cardinality, friends_card: Cardinality) -> Vec<JoinEntry> {
        vec![
            entry(
                "http://ex/name",
                "name",
                vec![person("http://ex/a", "Alice"), person("http://ex/b", "Bob")],
                names_card,
            ),
            entry(
                "http://ex/knows",
                "f",
                vec![friend("http://ex/a", "http://ex/b"), friend("http://ex/c", "http://ex/a")],
                friends_card,
            ),
        ]
    }

    #[tokio::test]
    async fn test_inner_join() {
        let mediator = NestedLoopMediator::new();
        let action = JoinAction::new(
            JoinKind::Inner,
            names_and_friends(Cardinality::exact(2.0), Cardinality::exact(2.0)),
            ExecutionContext::new(),
        );

        let output = mediator.mediate(action).await.unwrap();
        assert_eq!(output.metadata.cardinality, Cardinality::exact(4.0));
        assert_eq!(output.metadata.variables, vec!["f", "name", "s"]);

        let rows: Vec<_> = output.bindings.try_collect().await.unwrap();
        assert_eq!(
            rows,
            vec![person("http://ex/a", "Alice").with("f", Term::iri("http://ex/b"))]
        );
        assert_eq!(mediator.mediations(), 1);
    }

    #[tokio::test]
    async fn test_sorting_changes_order_not_result() {
        let mediator = NestedLoopMediator::new();
        let context = ExecutionContext::new().set(&keys::SORT_BY_CARDINALITY, true);
        let action = JoinAction::new(
            JoinKind::Inner,
            names_and_friends(Cardinality::exact(500.0), Cardinality::index(10.0, "http://ex/")),
            context,
        );

        let output = mediator.mediate(action).await.unwrap();
        // Index cardinalities take over the accumulation.
        assert!(output.metadata.cardinality.is_index());
        let rows: Vec<_> = output.bindings.try_collect().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Term::literal("Alice")));
    }

    #[tokio::test]
    async fn test_optional_keeps_unmatched() {
        let mediator = NestedLoopMediator::new();
        let action = JoinAction::new(
            JoinKind::Optional,
            names_and_friends(Cardinality::exact(2.0), Cardinality::exact(2.0)),
            ExecutionContext::new(),
        );

        let rows: Vec<_> = mediator
            .mediate(action)
            .await
            .unwrap()
            .bindings
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], person("http://ex/b", "Bob"));
    }

    #[tokio::test]
    async fn test_minus_removes_compatible() {
        let mediator = NestedLoopMediator::new();
        let action = JoinAction::new(
            JoinKind::Minus,
            names_and_friends(Cardinality::exact(2.0), Cardinality::exact(2.0)),
            ExecutionContext::new(),
        );

        let rows: Vec<_> = mediator
            .mediate(action)
            .await
            .unwrap()
            .bindings
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows, vec![person("http://ex/b", "Bob")]);
    }

    #[tokio::test]
    async fn test_no_entries_yields_single_empty_solution() {
        let mediator = NestedLoopMediator::new();
        let action = JoinAction::new(JoinKind::Inner, Vec::new(), ExecutionContext::new());
        let rows: Vec<_> = mediator
            .mediate(action)
            .await
            .unwrap()
            .bindings
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows, vec![Bindings::new()]);
    }
}

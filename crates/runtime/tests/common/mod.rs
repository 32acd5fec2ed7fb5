#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use weir_error::{ErrorCode, Result, WeirError};
use weir_runtime::bindings::{Bindings, Term};
use weir_runtime::cardinality::Cardinality;
use weir_runtime::context::ExecutionContext;
use weir_runtime::join::entry::{ClonableBindings, JoinEntry, MetadataSource, Pattern, PatternTerm};
use weir_runtime::join::nested_loop::NestedLoopMediator;
use weir_runtime::join::{JoinAction, JoinMediator, JoinOutput};

pub const NAME: &str = "http://xmlns.com/foaf/0.1/name";
pub const KNOWS: &str = "http://xmlns.com/foaf/0.1/knows";

pub fn iri(local: &str) -> Term {
    Term::iri(format!("http://pod.example/{}", local))
}

pub fn entry(predicate: &str, object: &str, rows: Vec<Bindings>, metadata: Arc<dyn MetadataSource>) -> JoinEntry {
    JoinEntry::new(
        Pattern::new(
            PatternTerm::var("s"),
            PatternTerm::iri(predicate),
            PatternTerm::var(object),
        ),
        ClonableBindings::from_vec(rows),
        metadata,
    )
}

/// `?s foaf:name ?name` over alice, bob and carol.
pub fn names(cardinality: Cardinality) -> JoinEntry {
    let rows = ["alice", "bob", "carol"]
        .iter()
        .map(|n| Bindings::new().with("s", iri(n)).with("name", Term::literal(n)))
        .collect();
    entry(NAME, "name", rows, Arc::new(cardinality))
}

/// `?s foaf:knows ?friend`: alice knows bob, bob knows carol.
pub fn knows(cardinality: Cardinality) -> JoinEntry {
    let rows = vec![
        Bindings::new().with("s", iri("alice")).with("friend", iri("bob")),
        Bindings::new().with("s", iri("bob")).with("friend", iri("carol")),
    ];
    entry(KNOWS, "friend", rows, Arc::new(cardinality))
}

/// Metadata whose probe always fails.
pub struct BrokenMetadata;

#[async_trait]
impl MetadataSource for BrokenMetadata {
    async fn cardinality(&self) -> Result<Cardinality> {
        Err(WeirError::new(
            ErrorCode::MetadataUnavailable,
            "description could not be dereferenced",
        ))
    }
}

/// Sorted canonical keys, for comparing results regardless of order.
pub fn keys(rows: &[Bindings]) -> Vec<String> {
    let mut keys: Vec<_> = rows.iter().map(Bindings::canonical_key).collect();
    keys.sort();
    keys
}

#[derive(Debug, Clone, Copy, Default)]
pub enum Behavior {
    #[default]
    Plain,
    /// Fire the swap trigger while the first result passes through.
    FireOnFirstResult,
    /// Stall the first mediation forever after its results.
    StallFirst,
}

/// Delegates to a nested loop join, recording every context it sees.
#[derive(Default)]
pub struct RecordingMediator {
    inner: NestedLoopMediator,
    behavior: Behavior,
    contexts: Mutex<Vec<ExecutionContext>>,
}

impl RecordingMediator {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.inner.mediations()
    }

    pub fn contexts(&self) -> Vec<ExecutionContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JoinMediator for RecordingMediator {
    async fn mediate(&self, action: JoinAction) -> Result<JoinOutput> {
        let first_call = {
            let mut contexts = self.contexts.lock().unwrap();
            contexts.push(action.context.clone());
            contexts.len() == 1
        };
        let trigger = action.context.swap_trigger().cloned();
        let mut output = self.inner.mediate(action).await?;

        match (self.behavior, trigger) {
            (Behavior::FireOnFirstResult, Some(trigger)) => {
                output.bindings = output
                    .bindings
                    .inspect(move |_| {
                        trigger.fire();
                    })
                    .boxed();
            }
            (Behavior::StallFirst, _) if first_call => {
                output.bindings = output.bindings.chain(stream::pending()).boxed();
            }
            _ => {}
        }
        Ok(output)
    }
}

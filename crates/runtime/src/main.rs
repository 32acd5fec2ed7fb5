//! Weir runtime demo.
//!
//! Loads configuration, installs tracing, and runs a three-way join over
//! in-memory entries through the adaptive join actor. The mediator fires the
//! swap trigger as soon as the first phase produces a result, so both phases
//! show up in the logs.
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use weir_common::config::AppConfig;
use weir_error::Result;
use weir_runtime::bindings::{Bindings, Term};
use weir_runtime::cardinality::Cardinality;
use weir_runtime::context::ExecutionContext;
use weir_runtime::join::adaptive::AdaptiveJoinCoordinator;
use weir_runtime::join::entry::{ClonableBindings, JoinEntry, Pattern, PatternTerm};
use weir_runtime::join::nested_loop::NestedLoopMediator;
use weir_runtime::join::{JoinAction, JoinActor, JoinKind, JoinMediator, JoinOutput};
use weir_runtime::metadata::{CardinalityIndex, IndexedMetadata};

const POD: &str = "http://pod.example/alice/";
const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";
const FOAF_KNOWS: &str = "http://xmlns.com/foaf/0.1/knows";
const FOAF_MBOX: &str = "http://xmlns.com/foaf/0.1/mbox";

#[derive(clap::Parser)]
#[command(name = "weir-runtime")]
#[command(about = "Run a demo adaptive join", long_about = None)]
struct Args {
    #[arg(long, default_value = "config/weir.yaml")]
    config: String,
}

/// Swaps the adaptive join as soon as the first phase yields a result.
struct EagerSwapMediator {
    inner: NestedLoopMediator,
}

#[async_trait]
impl JoinMediator for EagerSwapMediator {
    async fn mediate(&self, action: JoinAction) -> Result<JoinOutput> {
        let trigger = action.context.swap_trigger().cloned();
        let mut output = self.inner.mediate(action).await?;
        if let Some(trigger) = trigger {
            output.bindings = output
                .bindings
                .inspect(move |_| {
                    trigger.fire();
                })
                .boxed();
        }
        Ok(output)
    }
}

fn person(name: &str) -> Term {
    Term::iri(format!("{}{}#me", POD, name))
}

fn entry(predicate: &str, object: &str, rows: Vec<Bindings>, metadata: IndexedMetadata) -> JoinEntry {
    JoinEntry::new(
        Pattern::new(
            PatternTerm::var("s"),
            PatternTerm::iri(predicate),
            PatternTerm::var(object),
        ),
        ClonableBindings::from_vec(rows),
        Arc::new(metadata),
    )
}

async fn demo_entries(index: &CardinalityIndex) -> Vec<JoinEntry> {
    index.record(POD, FOAF_NAME, 3.0).await;
    index.record(POD, FOAF_KNOWS, 2.0).await;

    let names = ["alice", "bob", "carol"]
        .iter()
        .map(|n| {
            Bindings::new()
                .with("s", person(n))
                .with("name", Term::literal(n))
        })
        .collect();
    let knows = vec![
        Bindings::new()
            .with("s", person("alice"))
            .with("friend", person("bob")),
        Bindings::new()
            .with("s", person("bob"))
            .with("friend", person("carol")),
    ];
    let mboxes = ["alice", "carol"]
        .iter()
        .map(|n| {
            Bindings::new()
                .with("s", person(n))
                .with("mbox", Term::iri(format!("mailto:{}@pod.example", n)))
        })
        .collect();

    let profile = format!("{}profile/card", POD);
    vec![
        entry(FOAF_NAME, "name", names, IndexedMetadata::new(index.clone(), &profile, FOAF_NAME)),
        entry(FOAF_KNOWS, "friend", knows, IndexedMetadata::new(index.clone(), &profile, FOAF_KNOWS)),
        // No published count for mailboxes.
        entry(FOAF_MBOX, "mbox", mboxes, IndexedMetadata::new(index.clone(), &profile, FOAF_MBOX)),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    let app_config = AppConfig::from_file(&args.config).unwrap_or_default();
    weir_common::telemetry::init_tracing(&app_config.telemetry)?;

    tracing::info!(config = %args.config, "Tracing initialized");

    let index = CardinalityIndex::new();
    let entries = demo_entries(&index).await;
    for entry in &entries {
        let cardinality = entry.cardinality().await.unwrap_or_else(|_| Cardinality::unknown());
        tracing::info!(operation = %entry.operation, %cardinality, "Join entry");
    }

    let mediator = Arc::new(EagerSwapMediator {
        inner: NestedLoopMediator::new(),
    });
    let actor = AdaptiveJoinCoordinator::new(mediator, app_config.adaptive_join.clone());

    let action = JoinAction::new(JoinKind::Inner, entries, ExecutionContext::new());
    actor.test(&action).await?;
    let output = actor.run(action).await?;
    tracing::info!(cardinality = %output.metadata.cardinality, "Join planned");

    let mut bindings = output.bindings;
    let mut count = 0usize;
    while let Some(result) = bindings.next().await {
        let row = result?;
        count += 1;
        tracing::info!(bindings = %row, "Result");
    }
    tracing::info!(count, "Join finished");

    weir_common::telemetry::shutdown_telemetry();
    Ok(())
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{keys, knows, names, Behavior, BrokenMetadata, RecordingMediator};
use futures::TryStreamExt;
use weir_common::config::AdaptiveJoinSettings;
use weir_error::ErrorCode;
use weir_runtime::bindings::Bindings;
use weir_runtime::cardinality::Cardinality;
use weir_runtime::context::{keys as context_keys, ExecutionContext};
use weir_runtime::join::adaptive::AdaptiveJoinCoordinator;
use weir_runtime::join::nested_loop::NestedLoopMediator;
use weir_runtime::join::{JoinAction, JoinActor, JoinKind, JoinMediator};

async fn plain_join(entries: Vec<weir_runtime::join::entry::JoinEntry>) -> Vec<Bindings> {
    let action = JoinAction::new(JoinKind::Inner, entries, ExecutionContext::new());
    NestedLoopMediator::new()
        .mediate(action)
        .await
        .unwrap()
        .bindings
        .try_collect()
        .await
        .unwrap()
}

fn mixed_entries() -> Vec<weir_runtime::join::entry::JoinEntry> {
    vec![
        names(Cardinality::exact(3.0)),
        knows(Cardinality::index(2.0, "http://pod.example/")),
    ]
}

#[tokio::test]
async fn test_all_indexed_executes_once_without_swap() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::FireOnFirstResult);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());

    let entries = vec![
        names(Cardinality::index(3.0, "http://pod.example/")),
        knows(Cardinality::index(2.0, "http://pod.example/")),
    ];
    let action = JoinAction::new(JoinKind::Inner, entries, ExecutionContext::new());
    let rows: Vec<_> = actor.run(action).await?.bindings.try_collect().await?;

    assert_eq!(keys(&rows), keys(&plain_join(mixed_entries()).await));
    assert_eq!(mediator.calls(), 1);
    let contexts = mediator.contexts();
    assert!(contexts[0].swap_trigger().is_none());
    assert!(contexts[0].flag(&context_keys::SORT_BY_CARDINALITY));
    Ok(())
}

#[tokio::test]
async fn test_first_phase_completion_never_swaps() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::Plain);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());

    let action = JoinAction::new(JoinKind::Inner, mixed_entries(), ExecutionContext::new());
    let rows: Vec<_> = actor.run(action).await?.bindings.try_collect().await?;

    assert_eq!(keys(&rows), keys(&plain_join(mixed_entries()).await));
    assert_eq!(mediator.calls(), 1);
    let contexts = mediator.contexts();
    let trigger = contexts[0]
        .swap_trigger()
        .expect("callback context carries a trigger");
    // The stream is gone, so a late trigger reaches nobody.
    assert!(!trigger.fire());
    Ok(())
}

#[tokio::test]
async fn test_trigger_swaps_without_duplicates() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::FireOnFirstResult);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());

    let action = JoinAction::new(JoinKind::Inner, mixed_entries(), ExecutionContext::new());
    let output = actor.run(action).await?;
    assert_eq!(output.metadata.cardinality, Cardinality::index(2.0, "http://pod.example/"));

    let rows: Vec<_> = output.bindings.try_collect().await?;
    let expected = plain_join(mixed_entries()).await;
    assert_eq!(rows.len(), expected.len());
    assert_eq!(keys(&rows), keys(&expected));

    assert_eq!(mediator.calls(), 2);
    let contexts = mediator.contexts();
    assert!(contexts[0].swap_trigger().is_some());
    assert!(contexts[1].swap_trigger().is_none());
    for context in &contexts {
        assert_eq!(context.adaptive_depth(), 1);
        assert!(context.is_adaptive_join_disabled());
        assert!(context.flag(&context_keys::SKIP_ADAPTIVE_JOIN));
        assert!(context.flag(&context_keys::SORT_BY_CARDINALITY));
        assert_eq!(context.get(&context_keys::SORT_ZERO_KNOWLEDGE), Some(&false));
    }
    Ok(())
}

#[tokio::test]
async fn test_no_trigger_without_callback() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::FireOnFirstResult);
    let settings = AdaptiveJoinSettings {
        use_callback: false,
        ..Default::default()
    };
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), settings);

    let action = JoinAction::new(JoinKind::Inner, mixed_entries(), ExecutionContext::new());
    let rows: Vec<_> = actor.run(action).await?.bindings.try_collect().await?;

    assert_eq!(rows.len(), 2);
    assert_eq!(mediator.calls(), 1);
    assert!(mediator.contexts()[0].swap_trigger().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_swaps_stalled_first_phase() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::StallFirst);
    let settings = AdaptiveJoinSettings {
        use_timeout: true,
        swap_timeout_ms: 250,
        ..Default::default()
    };
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), settings);

    let action = JoinAction::new(JoinKind::Inner, mixed_entries(), ExecutionContext::new());
    let rows: Vec<_> = tokio::time::timeout(
        Duration::from_secs(10),
        actor.run(action).await?.bindings.try_collect::<Vec<_>>(),
    )
    .await??;

    assert_eq!(keys(&rows), keys(&plain_join(mixed_entries()).await));
    assert_eq!(mediator.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_broken_metadata_counts_as_unknown() -> anyhow::Result<()> {
    let mediator = RecordingMediator::new(Behavior::Plain);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());

    let broken = common::entry(
        common::KNOWS,
        "friend",
        Vec::new(),
        Arc::new(BrokenMetadata),
    );
    let entries = vec![names(Cardinality::index(3.0, "http://pod.example/")), broken];
    let action = JoinAction::new(JoinKind::Inner, entries, ExecutionContext::new());
    let output = actor.run(action).await?;

    assert_eq!(output.metadata.cardinality, Cardinality::index(3.0, "http://pod.example/"));
    let rows: Vec<_> = output.bindings.try_collect().await?;
    assert!(rows.is_empty());
    // Not every entry was indexed, so a trigger was installed.
    assert!(mediator.contexts()[0].swap_trigger().is_some());
    Ok(())
}

#[tokio::test]
async fn test_nested_adaptive_join_is_refused() {
    let mediator = RecordingMediator::new(Behavior::Plain);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());

    let action = JoinAction::new(JoinKind::Inner, mixed_entries(), ExecutionContext::new());
    actor.run(action).await.unwrap();

    let inner = JoinAction::new(JoinKind::Inner, mixed_entries(), mediator.contexts()[0].clone());
    let err = actor.test(&inner).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AdaptiveJoinDisabled);
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_index_records_switch_off_adaptivity() -> anyhow::Result<()> {
    use weir_runtime::metadata::{CardinalityIndex, IndexedMetadata};

    let index = CardinalityIndex::new();
    let profile = "http://pod.example/alice/profile/card";
    let indexed_entries = |index: &CardinalityIndex| {
        vec![
            common::entry(
                common::NAME,
                "name",
                Vec::new(),
                Arc::new(IndexedMetadata::new(index.clone(), profile, common::NAME)),
            ),
            common::entry(
                common::KNOWS,
                "friend",
                Vec::new(),
                Arc::new(IndexedMetadata::new(index.clone(), profile, common::KNOWS)),
            ),
        ]
    };

    let mediator = RecordingMediator::new(Behavior::Plain);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());
    let action = JoinAction::new(JoinKind::Inner, indexed_entries(&index), ExecutionContext::new());
    actor.run(action).await?;
    assert!(mediator.contexts()[0].swap_trigger().is_some());

    index.record("http://pod.example/alice/", common::NAME, 3.0).await;
    index.record("http://pod.example/alice/", common::KNOWS, 2.0).await;

    let mediator = RecordingMediator::new(Behavior::Plain);
    let actor = AdaptiveJoinCoordinator::new(mediator.clone(), AdaptiveJoinSettings::default());
    let action = JoinAction::new(JoinKind::Inner, indexed_entries(&index), ExecutionContext::new());
    let output = actor.run(action).await?;
    assert!(output.metadata.cardinality.is_index());
    assert!(mediator.contexts()[0].swap_trigger().is_none());
    Ok(())
}

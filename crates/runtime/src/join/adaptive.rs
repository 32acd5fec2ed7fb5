//! The two-phase adaptive join actor.
//!
//! Phase one runs the join as planned with whatever cardinalities are known up
//! front. When better cardinalities arrive (signalled through the swap trigger
//! installed in the child context) or the swap timeout elapses, the join is
//! re-planned from scratch over fresh cursors of the same entries. The
//! [`PhaseSwitchStream`] hides the restart from the consumer by suppressing
//! results that phase one already delivered.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::StreamExt;
use tracing::{debug, info, warn};
use weir_common::config::AdaptiveJoinSettings;
use weir_error::{ErrorCode, ErrorContext, JoinPhase, Result, WeirError};

use crate::cardinality::Cardinality;
use crate::context::{keys, ExecutionContext};
use crate::join::phase_switch::{PhaseSwitchStream, SwitchOptions};
use crate::join::swap::{swap_channel, SwapSignal};
use crate::join::{JoinAction, JoinActor, JoinCoefficients, JoinMediator, JoinOutput};

pub const ACTOR_NAME: &str = "inner-multi-adaptive-destroy";

pub struct AdaptiveJoinCoordinator {
    mediator: Arc<dyn JoinMediator>,
    settings: AdaptiveJoinSettings,
}

impl AdaptiveJoinCoordinator {
    pub fn new(mediator: Arc<dyn JoinMediator>, settings: AdaptiveJoinSettings) -> Self {
        Self { mediator, settings }
    }

    pub fn settings(&self) -> &AdaptiveJoinSettings {
        &self.settings
    }

    fn admit(&self, context: &ExecutionContext) -> Result<()> {
        if self.settings.skip_adaptive_join {
            return Err(WeirError::adaptive_join_disabled(
                ACTOR_NAME,
                "disabled by configuration",
            ));
        }
        if context.adaptive_depth() > 0 {
            return Err(WeirError::adaptive_join_disabled(
                ACTOR_NAME,
                "already inside an adaptive join",
            ));
        }
        if context.flag(&keys::SKIP_ADAPTIVE_JOIN) {
            return Err(WeirError::adaptive_join_disabled(
                ACTOR_NAME,
                "disabled by the execution context",
            ));
        }
        Ok(())
    }

    /// Context for everything executed below this join. Nested adaptive
    /// joining is off and entries are ordered by cardinality.
    fn child_context(parent: &ExecutionContext) -> ExecutionContext {
        parent
            .nested_adaptive()
            .set(&keys::SKIP_ADAPTIVE_JOIN, true)
            .set(&keys::SORT_BY_CARDINALITY, true)
            .set(&keys::SORT_ZERO_KNOWLEDGE, false)
    }

    async fn all_indexed(action: &JoinAction) -> bool {
        if action.entries.is_empty() {
            return false;
        }
        for entry in &action.entries {
            let cardinality = entry.cardinality().await.unwrap_or_else(|e| {
                warn!(
                    target: "adaptive_join",
                    operation = %entry.operation,
                    error = %e,
                    "Metadata probe failed, assuming unknown cardinality"
                );
                Cardinality::unknown()
            });
            if !cardinality.is_index() {
                return false;
            }
        }
        true
    }

    /// Run `action` adaptively. Does not check admission; see [`JoinActor::run`].
    #[tracing::instrument(skip_all, fields(kind = %action.kind, entries = action.entries.len()))]
    pub async fn execute(&self, action: JoinAction) -> Result<JoinOutput> {
        let base = Self::child_context(&action.context);
        let entries = action.entries.len();
        let in_first_phase = move |e: WeirError| {
            e.or_context(ErrorContext::Join {
                phase: JoinPhase::First,
                entries,
            })
        };

        if Self::all_indexed(&action).await {
            debug!(target: "adaptive_join", "All entries indexed, executing once");
            return self
                .mediator
                .mediate(action.clone_with_context(base))
                .await
                .map_err(in_first_phase);
        }

        let (first_context, signal) = if self.settings.use_callback {
            let (trigger, signal) = swap_channel();
            (base.set(&keys::SWAP_CALLBACK, trigger), signal)
        } else {
            (base.clone(), SwapSignal::never())
        };

        let first = self
            .mediator
            .mediate(action.clone_with_context(first_context))
            .await
            .map_err(in_first_phase)?;

        let timeout = self.settings.swap_timeout();
        info!(
            target: "adaptive_join",
            callback = self.settings.use_callback,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "First join phase started"
        );

        let mediator = self.mediator.clone();
        let deferred = move || async move {
            mediator
                .mediate(action.clone_with_context(base))
                .await
                .map(|second| second.bindings)
                .map_err(|e| {
                    WeirError::new(
                        ErrorCode::SwapFailed,
                        format!("Second join phase could not start: {}", e),
                    )
                    .with_context(ErrorContext::Join {
                        phase: JoinPhase::Second,
                        entries,
                    })
                })
        };

        let bindings = PhaseSwitchStream::new(
            first.bindings,
            deferred,
            SwitchOptions { signal, timeout },
        )
        .boxed();

        Ok(JoinOutput {
            bindings,
            metadata: first.metadata,
        })
    }
}

#[async_trait]
impl JoinActor for AdaptiveJoinCoordinator {
    fn name(&self) -> &str {
        ACTOR_NAME
    }

    async fn test(&self, action: &JoinAction) -> Result<JoinCoefficients> {
        self.admit(&action.context)?;
        Ok(JoinCoefficients::minimal())
    }

    async fn run(&self, action: JoinAction) -> Result<JoinOutput> {
        self.admit(&action.context)?;
        self.execute(action).await
    }
}

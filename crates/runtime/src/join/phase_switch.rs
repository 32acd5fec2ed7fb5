//! A bindings stream that swaps its upstream at most once.
//!
//! The stream starts on a first-phase upstream. When the swap signal fires or
//! the optional timeout elapses while phase one is still live, phase one is
//! dropped, the deferred constructor produces the second-phase upstream, and
//! emission continues from there. Every binding emitted during phase one is
//! counted by its canonical key; during phase two a binding is suppressed while
//! its key still has a positive count, so phase two only tops up phase one.
//!
//! A swap request does not cut phase one off mid-flight. Phase one is polled
//! exactly once more: if it ends there, the stream ends without a swap; if it
//! is pending, the swap starts at once; if it yields a binding, that binding is
//! emitted and the swap starts on the next poll. A trigger that lands between
//! phase one's last binding and its end therefore never restarts the join.
//!
//! If phase one ends before any swap, the stream ends and the deferred
//! constructor is never invoked.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FusedStream, Stream, StreamExt};
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};
use weir_error::Result;

use crate::bindings::Bindings;
use crate::join::swap::SwapSignal;
use crate::join::BindingsStream;

type DeferredSource = Box<dyn FnOnce() -> BoxFuture<'static, Result<BindingsStream>> + Send>;

/// Observable phase of a [`PhaseSwitchStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    First,
    /// Waiting for the deferred constructor.
    Swapping,
    Second,
    Done,
}

/// What may arm the swap.
#[derive(Debug)]
pub struct SwitchOptions {
    pub signal: SwapSignal,
    /// Swap after this long, measured from stream construction.
    pub timeout: Option<Duration>,
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self {
            signal: SwapSignal::never(),
            timeout: None,
        }
    }
}

enum State {
    First(BindingsStream),
    Swapping(BoxFuture<'static, Result<BindingsStream>>),
    Second(BindingsStream),
    Done,
}

pub struct PhaseSwitchStream {
    state: State,
    deferred: Option<DeferredSource>,
    signal: SwapSignal,
    deadline: Option<Instant>,
    timer: Option<Pin<Box<Sleep>>>,
    /// Emission counts per canonical key, recorded during phase one.
    pushed: HashMap<String, usize>,
    suppressed: usize,
    swapped: bool,
    /// A swap was requested while phase one was live.
    swap_armed: bool,
    /// Phase one still gets its last poll before the swap.
    last_poll_due: bool,
}

impl PhaseSwitchStream {
    pub fn new<F, Fut>(first: BindingsStream, deferred: F, options: SwitchOptions) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<BindingsStream>> + Send + 'static,
    {
        Self {
            state: State::First(first),
            deferred: Some(Box::new(move || deferred().boxed())),
            signal: options.signal,
            deadline: options.timeout.map(|timeout| Instant::now() + timeout),
            timer: None,
            pushed: HashMap::new(),
            suppressed: 0,
            swapped: false,
            swap_armed: false,
            last_poll_due: false,
        }
    }

    pub fn phase(&self) -> SwitchPhase {
        match self.state {
            State::First(_) => SwitchPhase::First,
            State::Swapping(_) => SwitchPhase::Swapping,
            State::Second(_) => SwitchPhase::Second,
            State::Done => SwitchPhase::Done,
        }
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Number of phase-two bindings dropped as already delivered.
    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    /// Cancel whichever phase is active and clear the timer. Idempotent; the
    /// deferred constructor is never invoked afterwards.
    pub fn destroy(&mut self) {
        if !matches!(self.state, State::Done) {
            debug!(target: "adaptive_join", phase = ?self.phase(), "Destroying phase switch stream");
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.state = State::Done;
        self.deferred = None;
        self.timer = None;
        self.signal.disarm();
    }

    /// Whether the trigger fired or the timeout elapsed. Registers the task
    /// with both when neither is ready.
    fn swap_requested(&mut self, cx: &mut Context<'_>) -> bool {
        if let Poll::Ready(true) = self.signal.poll_fired(cx) {
            return true;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        let timer = self
            .timer
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        timer.as_mut().poll(cx).is_ready()
    }

    fn begin_swap(&mut self) {
        // Dropping the first-phase upstream releases whatever it holds.
        let first = std::mem::replace(&mut self.state, State::Done);
        drop(first);
        self.timer = None;
        self.deadline = None;
        self.signal.disarm();
        self.swapped = true;

        match self.deferred.take() {
            Some(deferred) => {
                info!(
                    target: "adaptive_join",
                    delivered = self.pushed.values().sum::<usize>(),
                    "Swapping to second join phase"
                );
                self.state = State::Swapping(deferred());
            }
            None => warn!(target: "adaptive_join", "Swap requested without a second phase"),
        }
    }

    fn record(&mut self, bindings: &Bindings) {
        *self.pushed.entry(bindings.canonical_key()).or_insert(0) += 1;
    }

    /// Consume one recorded emission for `bindings`, if any remain.
    fn already_delivered(&mut self, bindings: &Bindings) -> bool {
        match self.pushed.get_mut(&bindings.canonical_key()) {
            Some(count) if *count > 0 => {
                *count -= 1;
                self.suppressed += 1;
                true
            }
            _ => false,
        }
    }
}

impl Stream for PhaseSwitchStream {
    type Item = Result<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, State::First(_)) {
                if !this.swap_armed && this.swap_requested(cx) {
                    debug!(target: "adaptive_join", "Swap requested, polling first join phase once more");
                    this.swap_armed = true;
                    this.last_poll_due = true;
                } else if this.swap_armed && !this.last_poll_due {
                    this.begin_swap();
                    continue;
                }
            }

            match &mut this.state {
                State::First(upstream) => {
                    let polled = upstream.poll_next_unpin(cx);
                    this.last_poll_due = false;
                    match polled {
                        Poll::Ready(Some(Ok(bindings))) => {
                            this.record(&bindings);
                            return Poll::Ready(Some(Ok(bindings)));
                        }
                        Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                        Poll::Ready(None) => {
                            debug!(
                                target: "adaptive_join",
                                swap_requested = this.swap_armed,
                                "First join phase completed without swap"
                            );
                            this.finish();
                            return Poll::Ready(None);
                        }
                        Poll::Pending if this.swap_armed => this.begin_swap(),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                State::Swapping(pending) => match pending.poll_unpin(cx) {
                    Poll::Ready(Ok(second)) => {
                        debug!(target: "adaptive_join", "Second join phase started");
                        this.state = State::Second(second);
                    }
                    Poll::Ready(Err(e)) => {
                        warn!(target: "adaptive_join", error = %e, "Second join phase failed to start");
                        this.finish();
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Second(upstream) => match upstream.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(bindings))) => {
                        if !this.already_delivered(&bindings) {
                            return Poll::Ready(Some(Ok(bindings)));
                        }
                    }
                    Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                    Poll::Ready(None) => {
                        debug!(
                            target: "adaptive_join",
                            suppressed = this.suppressed,
                            "Second join phase completed"
                        );
                        this.finish();
                        return Poll::Ready(None);
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for PhaseSwitchStream {
    fn is_terminated(&self) -> bool {
        matches!(self.state, State::Done)
    }
}

impl fmt::Debug for PhaseSwitchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseSwitchStream")
            .field("phase", &self.phase())
            .field("swapped", &self.swapped)
            .field("suppressed", &self.suppressed)
            .finish()
    }
}

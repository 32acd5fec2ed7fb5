//! One-shot signal used to start the second phase of an adaptive join.
//!
//! The coordinator creates the pair once: the [`SwapSignal`] goes into the
//! [`PhaseSwitchStream`](super::phase_switch::PhaseSwitchStream), the
//! [`SwapTrigger`] into the execution context of the first phase, where any
//! collaborator that learns better cardinalities can fire it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// Sending half. Cloneable; firing more than once is a no-op.
#[derive(Clone)]
pub struct SwapTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

/// Receiving half, polled by the phase switch stream.
#[derive(Debug)]
pub struct SwapSignal {
    receiver: Option<oneshot::Receiver<()>>,
}

/// Create a connected trigger/signal pair.
pub fn swap_channel() -> (SwapTrigger, SwapSignal) {
    let (tx, rx) = oneshot::channel();
    (
        SwapTrigger {
            sender: Arc::new(Mutex::new(Some(tx))),
        },
        SwapSignal { receiver: Some(rx) },
    )
}

impl SwapTrigger {
    /// Ask the stream to swap. Returns whether this call delivered the signal.
    pub fn fire(&self) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                let delivered = tx.send(()).is_ok();
                tracing::debug!(target: "adaptive_join", delivered, "Swap trigger fired");
                delivered
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl fmt::Debug for SwapTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapTrigger")
            .field("fired", &self.is_fired())
            .finish()
    }
}

impl SwapSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_armed(&self) -> bool {
        self.receiver.is_some()
    }

    /// `Ready(true)` once fired. When every trigger is dropped without firing,
    /// the signal disarms itself and stays `Pending` forever.
    pub fn poll_fired(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(receiver).poll(cx) {
            Poll::Ready(Ok(())) => {
                self.receiver = None;
                Poll::Ready(true)
            }
            Poll::Ready(Err(_)) => {
                self.receiver = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Stop listening; later triggers become no-ops.
    pub fn disarm(&mut self) {
        self.receiver = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    #[test]
    fn test_fire_once() {
        let (trigger, mut signal) = swap_channel();
        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(signal.poll_fired(&mut cx).is_pending());
        assert!(trigger.fire());
        assert!(trigger.is_fired());
        assert!(!trigger.clone().fire());
        assert_eq!(signal.poll_fired(&mut cx), Poll::Ready(true));
        assert!(!signal.is_armed());
    }

    #[test]
    fn test_dropped_trigger_disarms() {
        let (trigger, mut signal) = swap_channel();
        let mut cx = Context::from_waker(noop_waker_ref());
        drop(trigger);
        assert!(signal.poll_fired(&mut cx).is_pending());
        assert!(!signal.is_armed());
    }

    #[test]
    fn test_fire_after_disarm_is_noop() {
        let (trigger, mut signal) = swap_channel();
        signal.disarm();
        assert!(!trigger.fire());
    }

    #[test]
    fn test_never_signal() {
        let mut signal = SwapSignal::never();
        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(!signal.is_armed());
        assert!(signal.poll_fired(&mut cx).is_pending());
    }
}

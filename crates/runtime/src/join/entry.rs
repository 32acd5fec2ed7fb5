//! Join entries: one operand of a multi-way join.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use futures::task::{waker_ref, ArcWake};
use tokio::sync::watch;
use weir_error::{ErrorContext, Result};

use crate::bindings::{Bindings, Term};
use crate::cardinality::Cardinality;
use crate::join::BindingsStream;

/// A position in a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternTerm {
    Variable(Arc<str>),
    Term(Term),
}

impl PatternTerm {
    pub fn var(name: impl AsRef<str>) -> Self {
        PatternTerm::Variable(Arc::from(name.as_ref()))
    }

    pub fn iri(value: impl AsRef<str>) -> Self {
        PatternTerm::Term(Term::iri(value))
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternTerm::Variable(name) => write!(f, "?{}", name),
            PatternTerm::Term(term) => write!(f, "{}", term),
        }
    }
}

/// The operation a join entry evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl Pattern {
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// The predicate IRI, if the predicate is not a variable.
    pub fn predicate_iri(&self) -> Option<&str> {
        match &self.predicate {
            PatternTerm::Term(Term::NamedNode(iri)) => Some(iri),
            _ => None,
        }
    }

    pub fn variables(&self) -> Vec<&str> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|t| match t {
                PatternTerm::Variable(name) => Some(name.as_ref()),
                PatternTerm::Term(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// Async accessor for an entry's current cardinality.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn cardinality(&self) -> Result<Cardinality>;
}

#[async_trait]
impl MetadataSource for Cardinality {
    async fn cardinality(&self) -> Result<Cardinality> {
        Ok(self.clone())
    }
}

/// Metadata that is refined while the query runs.
#[derive(Debug, Clone)]
pub struct LiveMetadata {
    receiver: watch::Receiver<Cardinality>,
}

impl LiveMetadata {
    /// Returns the publishing half together with the metadata source.
    pub fn channel(initial: Cardinality) -> (watch::Sender<Cardinality>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { receiver: rx })
    }
}

#[async_trait]
impl MetadataSource for LiveMetadata {
    async fn cardinality(&self) -> Result<Cardinality> {
        Ok(self.receiver.borrow().clone())
    }
}

/// Wakes every cursor waiting on the shared upstream.
#[derive(Default)]
struct WakerSet {
    wakers: Mutex<Vec<Waker>>,
}

impl WakerSet {
    fn register(&self, waker: &Waker) {
        let mut wakers = lock(&self.wakers);
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    fn wake_all(&self) {
        let wakers = std::mem::take(&mut *lock(&self.wakers));
        for waker in wakers {
            waker.wake();
        }
    }
}

impl ArcWake for WakerSet {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.wake_all();
    }
}

struct SharedSource {
    /// `None` once the upstream is exhausted.
    upstream: Option<BindingsStream>,
    history: Vec<Result<Bindings>>,
    wakers: Arc<WakerSet>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A bindings stream that can be read by several independent cursors.
///
/// Items pulled from the upstream are kept in a history buffer; every cursor
/// starts at the beginning of that history, so one consumer never steals items
/// from another.
pub struct ClonableBindings {
    shared: Arc<Mutex<SharedSource>>,
    position: usize,
}

impl ClonableBindings {
    pub fn new(upstream: BindingsStream) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedSource {
                upstream: Some(upstream),
                history: Vec::new(),
                wakers: Arc::new(WakerSet::default()),
            })),
            position: 0,
        }
    }

    pub fn from_vec(items: Vec<Bindings>) -> Self {
        Self::new(stream::iter(items.into_iter().map(Ok)).boxed())
    }

    /// A new cursor positioned at the start of the stream.
    pub fn cursor(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            position: 0,
        }
    }

    /// Number of items pulled from the upstream so far.
    pub fn buffered(&self) -> usize {
        lock(&self.shared).history.len()
    }

    pub fn into_stream(self) -> BindingsStream {
        self.boxed()
    }
}

impl Stream for ClonableBindings {
    type Item = Result<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut shared = lock(&this.shared);

        if let Some(item) = shared.history.get(this.position) {
            let item = item.clone();
            this.position += 1;
            return Poll::Ready(Some(item));
        }

        let wakers = shared.wakers.clone();
        let Some(upstream) = shared.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        wakers.register(cx.waker());
        let waker = waker_ref(&wakers);
        let mut upstream_cx = Context::from_waker(&waker);

        match upstream.poll_next_unpin(&mut upstream_cx) {
            Poll::Ready(Some(item)) => {
                shared.history.push(item.clone());
                this.position += 1;
                drop(shared);
                wakers.wake_all();
                Poll::Ready(Some(item))
            }
            Poll::Ready(None) => {
                shared.upstream = None;
                drop(shared);
                wakers.wake_all();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for ClonableBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClonableBindings")
            .field("position", &self.position)
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// One operand of a multi-way join.
///
/// Read-only to the join core: joins consume [`JoinEntry::clone_entry`]
/// copies, never the entry's own cursor.
pub struct JoinEntry {
    pub operation: Pattern,
    output: ClonableBindings,
    metadata: Arc<dyn MetadataSource>,
}

impl JoinEntry {
    pub fn new(
        operation: Pattern,
        output: ClonableBindings,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            operation,
            output,
            metadata,
        }
    }

    /// An entry over a fixed list of bindings with a static cardinality.
    pub fn from_bindings(
        operation: Pattern,
        bindings: Vec<Bindings>,
        cardinality: Cardinality,
    ) -> Self {
        Self::new(
            operation,
            ClonableBindings::from_vec(bindings),
            Arc::new(cardinality),
        )
    }

    /// A copy whose stream is a fresh, independent cursor.
    pub fn clone_entry(&self) -> Self {
        Self {
            operation: self.operation.clone(),
            output: self.output.cursor(),
            metadata: self.metadata.clone(),
        }
    }

    /// Probe the entry's metadata. Failures are tagged with the operation.
    pub async fn cardinality(&self) -> Result<Cardinality> {
        self.metadata.cardinality().await.map_err(|e| {
            e.or_context(ErrorContext::Metadata {
                operation: self.operation.to_string(),
            })
        })
    }

    pub fn into_stream(self) -> BindingsStream {
        self.output.into_stream()
    }
}

impl fmt::Debug for JoinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinEntry")
            .field("operation", &self.operation.to_string())
            .field("output", &self.output)
            .finish()
    }
}

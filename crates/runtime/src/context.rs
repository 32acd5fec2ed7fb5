//! Immutable, chained execution context passed down mediation calls.
//!
//! Deriving a child with [`ExecutionContext::set`] never mutates the parent:
//! the child gets its own copy of the entry table, and values are shared
//! through `Arc`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::join::swap::SwapTrigger;

/// A typed key into an [`ExecutionContext`].
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Keys consumed and produced by the join core.
pub mod keys {
    use super::ContextKey;
    use crate::join::swap::SwapTrigger;

    /// Adaptive joining must not be attempted.
    pub const SKIP_ADAPTIVE_JOIN: ContextKey<bool> = ContextKey::new("weir:join:skipAdaptiveJoin");
    /// Entry sorting should use cardinality estimates.
    pub const SORT_BY_CARDINALITY: ContextKey<bool> =
        ContextKey::new("weir:join-entries-sort:sortByCardinality");
    /// Entry sorting should use the zero-knowledge heuristic.
    pub const SORT_ZERO_KNOWLEDGE: ContextKey<bool> =
        ContextKey::new("weir:join-entries-sort:sortZeroKnowledge");
    /// Starts phase two of the enclosing adaptive join.
    pub const SWAP_CALLBACK: ContextKey<SwapTrigger> = ContextKey::new("weir:join:swapCallback");
}

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct ExecutionContext {
    entries: Arc<HashMap<&'static str, Value>>,
    /// Number of enclosing adaptive joins.
    adaptive_depth: u32,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child context with `key` set to `value`.
    pub fn set<T: Any + Send + Sync>(&self, key: &ContextKey<T>, value: T) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(key.name, Arc::new(value));
        Self {
            entries: Arc::new(entries),
            adaptive_depth: self.adaptive_depth,
        }
    }

    /// Derive a child context without `key`.
    pub fn delete<T>(&self, key: &ContextKey<T>) -> Self {
        if !self.entries.contains_key(key.name) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(key.name);
        Self {
            entries: Arc::new(entries),
            adaptive_depth: self.adaptive_depth,
        }
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &ContextKey<T>) -> Option<&T> {
        self.entries
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn has<T>(&self, key: &ContextKey<T>) -> bool {
        self.entries.contains_key(key.name)
    }

    /// A boolean key, absent meaning `false`.
    pub fn flag(&self, key: &ContextKey<bool>) -> bool {
        self.get(key).copied().unwrap_or(false)
    }

    pub fn adaptive_depth(&self) -> u32 {
        self.adaptive_depth
    }

    /// Derive the context for executions nested inside an adaptive join.
    pub fn nested_adaptive(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            adaptive_depth: self.adaptive_depth.saturating_add(1),
        }
    }

    /// Adaptive joining is off when explicitly skipped or when already nested
    /// inside an adaptive join.
    pub fn is_adaptive_join_disabled(&self) -> bool {
        self.adaptive_depth > 0 || self.flag(&keys::SKIP_ADAPTIVE_JOIN)
    }

    pub fn swap_trigger(&self) -> Option<&SwapTrigger> {
        self.get(&keys::SWAP_CALLBACK)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ExecutionContext")
            .field("keys", &names)
            .field("adaptive_depth", &self.adaptive_depth)
            .finish()
    }
}

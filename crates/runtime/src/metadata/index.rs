use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use weir_error::Result;

use crate::cardinality::Cardinality;
use crate::join::entry::MetadataSource;

/// Predicate counts per dataset scope, as published in dataset descriptions.
///
/// Cheap to clone; clones share the same store. Owned by whoever runs the
/// query session and handed to the entries that need it.
#[derive(Debug, Clone, Default)]
pub struct CardinalityIndex {
    scopes: Arc<RwLock<BTreeMap<String, HashMap<String, f64>>>>,
}

impl CardinalityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` to the recorded count of `predicate` within `dataset`.
    /// Repeated descriptions of the same partition accumulate.
    pub async fn record(&self, dataset: impl Into<String>, predicate: impl Into<String>, count: f64) {
        if !(count.is_finite() && count >= 0.0) {
            debug!(target: "adaptive_join", count, "Ignoring unusable predicate count");
            return;
        }
        let mut scopes = self.scopes.write().await;
        let predicates = scopes.entry(dataset.into()).or_default();
        *predicates.entry(predicate.into()).or_insert(0.0) += count;
    }

    /// Whether some known scope already applies to `url`.
    pub async fn covers(&self, url: &str) -> bool {
        self.scopes
            .read()
            .await
            .keys()
            .any(|scope| url.starts_with(scope.as_str()))
    }

    /// The index cardinality of `predicate` at `url`.
    ///
    /// Among the scopes that prefix `url` and know `predicate`, the longest
    /// wins. Falls back to [`Cardinality::unknown`].
    pub async fn lookup(&self, url: &str, predicate: &str) -> Cardinality {
        let scopes = self.scopes.read().await;
        scopes
            .iter()
            .filter(|(scope, _)| url.starts_with(scope.as_str()))
            .filter_map(|(scope, predicates)| {
                predicates.get(predicate).map(|count| (scope, *count))
            })
            .max_by_key(|(scope, _)| scope.len())
            .map(|(scope, count)| Cardinality::index(count, scope.as_str()))
            .unwrap_or_else(Cardinality::unknown)
    }

    pub async fn scope_count(&self) -> usize {
        self.scopes.read().await.len()
    }
}

/// Exposes one index lookup as a join entry's metadata.
///
/// The lookup runs on every probe, so counts ingested after the entry was
/// built are picked up.
#[derive(Debug, Clone)]
pub struct IndexedMetadata {
    index: CardinalityIndex,
    url: String,
    predicate: String,
}

impl IndexedMetadata {
    pub fn new(index: CardinalityIndex, url: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            predicate: predicate.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for IndexedMetadata {
    async fn cardinality(&self) -> Result<Cardinality> {
        Ok(self.index.lookup(&self.url, &self.predicate).await)
    }
}

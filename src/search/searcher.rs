use crate::item::Item;
use crate::search::{SearchHit, SearchSpec, SourceRegistry};
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Runs a search across every registered source.
///
/// A failing or panicking source contributes nothing; a predicate that panics on an item counts
/// as a non-match for that item only. Results keep source registration order, then each
/// source's traversal order, and the first source to report an item wins.
#[derive(Clone)]
pub struct InventorySearcher {
    registry: Arc<SourceRegistry>,
}

impl InventorySearcher {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn search(&self, spec: &SearchSpec<'_>) -> Vec<SearchHit> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for source in self.registry.sources() {
            let hits = match catch_unwind(AssertUnwindSafe(|| source.enumerate(spec))) {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    log::warn!("Item source '{}' failed: {}", source.name(), e);
                    continue;
                }
                Err(_) => {
                    log::error!("Item source '{}' panicked", source.name());
                    continue;
                }
            };

            for hit in hits {
                if seen.contains(&hit.item.id) || !Self::matches(spec, &hit.item) {
                    continue;
                }
                seen.insert(hit.item.id);
                results.push(hit);
            }
        }

        results
    }

    pub(crate) fn matches(spec: &SearchSpec<'_>, item: &Item) -> bool {
        catch_unwind(AssertUnwindSafe(|| (spec.predicate)(item))).unwrap_or_else(|_| {
            log::warn!("Match predicate panicked on item {} ({})", item.id, item.name);
            false
        })
    }
}

use crate::item::{Item, ItemId};
use crate::search::{ItemLocation, SearchHit, SearchSpec};
use crate::sys::host::{CollectionId, Inventory};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("collection {0} is no longer alive")]
    DeadCollection(CollectionId),
    #[error("collection is already borrowed elsewhere")]
    Busy,
    #[error("{0}")]
    Other(String),
}

/// Something that can enumerate candidate items for a search.
///
/// Sources yield every candidate they can reach; filtering against the search predicate is the
/// searcher's job.
pub trait ItemSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn enumerate(&self, spec: &SearchSpec<'_>) -> Result<Vec<SearchHit>, SourceError>;
}

/// Top-level items of every candidate collection, then one level of nested container slots.
#[derive(Debug, Default)]
pub struct InventorySource;

impl ItemSource for InventorySource {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn enumerate(&self, spec: &SearchSpec<'_>) -> Result<Vec<SearchHit>, SourceError> {
        let mut hits = Vec::new();

        for candidate in &spec.candidates {
            let inv = candidate.try_borrow().map_err(|_| SourceError::Busy)?;
            if !inv.is_alive() {
                log::warn!("Skipping dead collection {}", inv.id());
                continue;
            }
            let id = inv.id();

            for index in 0..inv.capacity() {
                let Some(item) = inv.get_at(index) else {
                    continue;
                };
                let nested = spec
                    .include_nested
                    .then(|| inv.nested_slots(&item))
                    .flatten();

                hits.push(SearchHit::new(item, ItemLocation::top(id, index)));

                for (sub, slot) in nested.into_iter().flatten().enumerate() {
                    if let Some(child) = slot {
                        hits.push(SearchHit::new(child, ItemLocation::nested(id, index, sub)));
                    }
                }
            }
        }

        Ok(hits)
    }
}

/// Walks nested containers to any depth, for hosts whose containers hold containers.
///
/// Deeper items keep the top-level index of their outermost ancestor and report the sub-slot
/// of their immediate parent.
#[derive(Debug, Default)]
pub struct ExtraSlotsSource;

impl ExtraSlotsSource {
    fn walk(
        inv: &dyn Inventory,
        container: &Item,
        top_index: usize,
        visited: &mut HashSet<ItemId>,
        hits: &mut Vec<SearchHit>,
    ) {
        if !visited.insert(container.id) {
            log::warn!("Container cycle through item {}", container.id);
            return;
        }
        let Some(slots) = inv.nested_slots(container) else {
            return;
        };
        for (sub, child) in slots.into_iter().enumerate() {
            let Some(child) = child else { continue };
            hits.push(SearchHit::new(
                child.clone(),
                ItemLocation::nested(inv.id(), top_index, sub),
            ));
            Self::walk(inv, &child, top_index, visited, hits);
        }
    }
}

impl ItemSource for ExtraSlotsSource {
    fn name(&self) -> &'static str {
        "extra-slots"
    }

    fn enumerate(&self, spec: &SearchSpec<'_>) -> Result<Vec<SearchHit>, SourceError> {
        if !spec.include_nested {
            return Ok(Vec::new());
        }
        let mut hits = Vec::new();

        for candidate in &spec.candidates {
            let inv = candidate.try_borrow().map_err(|_| SourceError::Busy)?;
            if !inv.is_alive() {
                return Err(SourceError::DeadCollection(inv.id()));
            }
            let mut visited = HashSet::new();
            for index in 0..inv.capacity() {
                if let Some(item) = inv.get_at(index) {
                    Self::walk(&*inv, &item, index, &mut visited, &mut hits);
                }
            }
        }

        Ok(hits)
    }
}

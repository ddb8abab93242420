pub mod collector;
pub mod location;
pub mod registry;
pub mod searcher;
pub mod source;

pub use collector::{CollectOptions, CollectRequest, ItemCollector};
pub use location::{Holder, ItemLocation, Scope};
pub use registry::SourceRegistry;
pub use searcher::InventorySearcher;
pub use source::{ExtraSlotsSource, InventorySource, ItemSource, SourceError};

use crate::item::{Item, ItemId};
use crate::sys::host::{Actor, Shared, SharedInventory};

pub type Predicate<'a> = &'a dyn Fn(&Item) -> bool;

/// What to look for and where.
pub struct SearchSpec<'a> {
    pub candidates: Vec<SharedInventory>,
    pub predicate: Predicate<'a>,
    pub include_nested: bool,
    pub requesting_actor: Option<Shared<dyn Actor>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub item: Item,
    pub location: ItemLocation,
}

impl SearchHit {
    pub fn new(item: Item, location: ItemLocation) -> Self {
        Self { item, location }
    }
}

/// One wheel entry: an item, where it is, and every same-type item it stands for when stacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedItemInfo {
    pub item: Item,
    pub location: ItemLocation,
    members: Vec<SearchHit>,
}

impl CollectedItemInfo {
    pub fn single(hit: SearchHit) -> Self {
        Self {
            item: hit.item.clone(),
            location: hit.location,
            members: vec![hit],
        }
    }

    /// Groups hits under the first one. Returns `None` for an empty group.
    pub fn stacked(members: Vec<SearchHit>) -> Option<Self> {
        let first = members.first()?.clone();
        Some(Self {
            item: first.item,
            location: first.location,
            members,
        })
    }

    pub fn stack_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_stacked(&self) -> bool {
        self.members.len() > 1
    }

    pub fn all_locations(&self) -> impl Iterator<Item = &ItemLocation> {
        self.members.iter().map(|m| &m.location)
    }

    pub fn members(&self) -> &[SearchHit] {
        &self.members
    }

    pub fn last_member(&self) -> &SearchHit {
        // `members` is never empty: both constructors guarantee at least one hit.
        &self.members[self.members.len() - 1]
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.members.iter().any(|m| m.item.id == id)
    }

    /// Moves the primary member to a new top-level index after an in-place swap.
    pub(crate) fn relocate(&mut self, top_index: usize) {
        self.location.top_index = top_index;
        if let Some(first) = self.members.first_mut() {
            first.location.top_index = top_index;
        }
    }
}

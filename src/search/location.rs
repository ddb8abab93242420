use crate::sys::host::{CollectionId, EquipSlot};

/// What holds an item: a collection, or one of the actor's equip slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Holder {
    Collection(CollectionId),
    Equip(EquipSlot),
}

/// Where one item sits right now. Recomputed on every refresh, never kept across one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemLocation {
    pub holder: Holder,
    pub top_index: usize,
    /// Sub-slot inside the container at `top_index`; `None` for top-level items.
    pub nested_index: Option<usize>,
}

/// The collections the wheel treats as its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub primary: CollectionId,
    pub secondary: Option<CollectionId>,
}

impl ItemLocation {
    pub fn top(collection: CollectionId, index: usize) -> Self {
        Self {
            holder: Holder::Collection(collection),
            top_index: index,
            nested_index: None,
        }
    }

    pub fn nested(collection: CollectionId, index: usize, sub_index: usize) -> Self {
        Self {
            holder: Holder::Collection(collection),
            top_index: index,
            nested_index: Some(sub_index),
        }
    }

    pub fn equipped(slot: EquipSlot) -> Self {
        Self {
            holder: Holder::Equip(slot),
            top_index: 0,
            nested_index: None,
        }
    }

    pub fn collection(&self) -> Option<CollectionId> {
        match self.holder {
            Holder::Collection(id) => Some(id),
            Holder::Equip(_) => None,
        }
    }

    pub fn equip_slot(&self) -> Option<EquipSlot> {
        match self.holder {
            Holder::Equip(slot) => Some(slot),
            Holder::Collection(_) => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.nested_index.is_some()
    }

    pub fn is_equipped(&self) -> bool {
        matches!(self.holder, Holder::Equip(_))
    }

    pub fn is_from_secondary(&self, scope: &Scope) -> bool {
        scope.secondary.is_some() && self.collection() == scope.secondary
    }

    /// Only top-level items of the primary collection may be drag-reordered.
    pub fn is_reorderable(&self, scope: &Scope) -> bool {
        !self.is_nested()
            && !self.is_from_secondary(scope)
            && self.collection() == Some(scope.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: CollectionId = CollectionId::new(1);
    const COMPANION: CollectionId = CollectionId::new(2);

    fn scope() -> Scope {
        Scope {
            primary: PRIMARY,
            secondary: Some(COMPANION),
        }
    }

    #[test]
    fn test_reorderable_only_for_primary_top_level() {
        assert!(ItemLocation::top(PRIMARY, 3).is_reorderable(&scope()));
        assert!(!ItemLocation::nested(PRIMARY, 3, 0).is_reorderable(&scope()));
        assert!(!ItemLocation::top(COMPANION, 0).is_reorderable(&scope()));
        assert!(!ItemLocation::equipped(EquipSlot::Melee).is_reorderable(&scope()));
    }

    #[test]
    fn test_secondary_identity() {
        let loc = ItemLocation::top(COMPANION, 0);
        assert!(loc.is_from_secondary(&scope()));

        let no_companion = Scope {
            primary: PRIMARY,
            secondary: None,
        };
        assert!(!loc.is_from_secondary(&no_companion));
        assert!(!ItemLocation::equipped(EquipSlot::Totem).is_from_secondary(&no_companion));
    }
}

use crate::category::Category;
use crate::item::TypeKey;
use crate::search::{
    CollectedItemInfo, InventorySearcher, ItemLocation, Predicate, SearchHit, SearchSpec,
};
use crate::sys::host::{Actor, EquipSlot, Equipment, Shared, SharedInventory};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectOptions {
    pub include_nested: bool,
    pub include_secondary: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            include_nested: true,
            include_secondary: false,
        }
    }
}

pub struct CollectRequest<'a> {
    pub primary: SharedInventory,
    pub secondary: Option<SharedInventory>,
    pub equipment: Option<Shared<dyn Equipment>>,
    pub actor: Option<Shared<dyn Actor>>,
    pub category: Category,
    pub predicate: Predicate<'a>,
    pub options: CollectOptions,
    pub enable_stacking: bool,
}

/// Turns search hits into wheel entries.
///
/// Collection is unbounded; deciding what fits on the wheel happens downstream.
#[derive(Clone)]
pub struct ItemCollector {
    searcher: InventorySearcher,
}

impl ItemCollector {
    pub fn new(searcher: InventorySearcher) -> Self {
        Self { searcher }
    }

    pub fn searcher(&self) -> &InventorySearcher {
        &self.searcher
    }

    pub fn collect(&self, req: &CollectRequest<'_>) -> Vec<CollectedItemInfo> {
        let mut candidates = vec![req.primary.clone()];
        if req.options.include_secondary
            && let Some(secondary) = &req.secondary
        {
            candidates.push(secondary.clone());
        }

        let spec = SearchSpec {
            candidates,
            predicate: req.predicate,
            include_nested: req.options.include_nested,
            requesting_actor: req.actor.clone(),
        };

        let mut hits = self.equipped_hits(req, &spec);
        for hit in self.searcher.search(&spec) {
            if !hits.iter().any(|h| h.item.id == hit.item.id) {
                hits.push(hit);
            }
        }

        log::debug!(
            "Collected {} candidate(s) for {} (stacking: {})",
            hits.len(),
            req.category,
            req.enable_stacking
        );

        if req.enable_stacking {
            Self::stack(hits)
        } else {
            hits.into_iter().map(CollectedItemInfo::single).collect()
        }
    }

    fn equipped_hits(&self, req: &CollectRequest<'_>, spec: &SearchSpec<'_>) -> Vec<SearchHit> {
        let Some(equipment) = &req.equipment else {
            return Vec::new();
        };

        req.category
            .equip_slots()
            .iter()
            .filter_map(|&slot| Self::probe(equipment, slot))
            .filter(|hit| InventorySearcher::matches(spec, &hit.item))
            .collect()
    }

    fn probe(equipment: &Shared<dyn Equipment>, slot: EquipSlot) -> Option<SearchHit> {
        let content = catch_unwind(AssertUnwindSafe(|| {
            equipment.try_borrow().map(|e| e.content(slot))
        }));

        match content {
            Ok(Ok(item)) => item.map(|item| SearchHit::new(item, ItemLocation::equipped(slot))),
            Ok(Err(_)) => {
                log::warn!("Equip slot {} is busy, skipping probe", slot);
                None
            }
            Err(_) => {
                log::error!("Probing equip slot {} panicked", slot);
                None
            }
        }
    }

    /// One entry per type key, ordered by the lowest top-level index in each group.
    fn stack(hits: Vec<SearchHit>) -> Vec<CollectedItemInfo> {
        let mut order: Vec<TypeKey> = Vec::new();
        let mut groups: HashMap<TypeKey, Vec<SearchHit>> = HashMap::new();

        for hit in hits {
            let key = hit.item.type_key.clone();
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(hit);
        }

        let mut stacked: Vec<(usize, CollectedItemInfo)> = order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .filter_map(|members| {
                let min_index = members.iter().map(|m| m.location.top_index).min()?;
                CollectedItemInfo::stacked(members).map(|info| (min_index, info))
            })
            .collect();

        stacked.sort_by_key(|(min_index, _)| *min_index);
        stacked.into_iter().map(|(_, info)| info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Classifier;
    use crate::item::{Item, ItemId};
    use crate::search::{Holder, SourceRegistry};
    use crate::sys::host::{CollectionId, shared};
    use crate::sys::memory::{MemoryEquipment, MemoryInventory};
    use std::sync::Arc;

    fn collector() -> ItemCollector {
        ItemCollector::new(InventorySearcher::new(Arc::new(SourceRegistry::default())))
    }

    fn grenade(id: u64) -> Item {
        Item::new(id, "grenade_f1", "F-1").tagged("Grenade")
    }

    fn request<'a>(
        primary: SharedInventory,
        category: Category,
        predicate: Predicate<'a>,
        stacking: bool,
    ) -> CollectRequest<'a> {
        CollectRequest {
            primary,
            secondary: None,
            equipment: None,
            actor: None,
            category,
            predicate,
            options: CollectOptions::default(),
            enable_stacking: stacking,
        }
    }

    fn scattered_grenades() -> SharedInventory {
        let mut inv = MemoryInventory::new(1, 8);
        inv.put(1, grenade(1));
        inv.put(4, grenade(2));
        inv.put(6, grenade(3));
        inv.put(2, Item::new(4, "grenade_rgd5", "RGD-5").tagged("Grenade"));
        shared(inv)
    }

    #[test]
    fn test_stacking_conserves_every_location() {
        let classifier = Classifier::default();
        let pred = |i: &Item| classifier.matches(i, Category::Explosive);
        let infos = collector().collect(&request(scattered_grenades(), Category::Explosive, &pred, true));

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].item.type_key.as_str(), "grenade_f1");
        assert_eq!(infos[0].stack_count(), 3);
        assert_eq!(infos[0].all_locations().count(), 3);
        assert_eq!(infos[0].location.top_index, 1);
        assert_eq!(infos[1].stack_count(), 1);
    }

    #[test]
    fn test_non_stacking_keeps_one_entry_per_item() {
        let classifier = Classifier::default();
        let pred = |i: &Item| classifier.matches(i, Category::Explosive);
        let infos = collector().collect(&request(scattered_grenades(), Category::Explosive, &pred, false));

        assert_eq!(infos.len(), 4);
        assert!(infos.iter().all(|i| i.stack_count() == 1));
        let order: Vec<usize> = infos.iter().map(|i| i.location.top_index).collect();
        assert_eq!(order, vec![1, 2, 4, 6]);
    }

    #[test]
    fn test_last_location_is_the_highest_index() {
        let mut inv = MemoryInventory::new(1, 6);
        inv.put(1, grenade(1));
        inv.put(4, grenade(2));
        let classifier = Classifier::default();
        let pred = |i: &Item| classifier.matches(i, Category::Explosive);
        let infos = collector().collect(&request(shared(inv), Category::Explosive, &pred, true));

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].stack_count(), 2);
        assert_eq!(infos[0].last_member().location.top_index, 4);
        assert_eq!(infos[0].last_member().item.id, ItemId::new(2));
    }

    #[test]
    fn test_equipped_melee_is_spliced_in_once() {
        let knife = Item::new(20, "knife", "Knife").tagged("MeleeWeapon");
        let axe = Item::new(21, "axe", "Axe").tagged("MeleeWeapon");
        let mut inv = MemoryInventory::new(1, 4);
        inv.put(0, axe);
        let equipment = shared(MemoryEquipment::default().with(EquipSlot::Melee, knife));

        let classifier = Classifier::default();
        let pred = |i: &Item| classifier.matches(i, Category::Melee);
        let mut req = request(shared(inv), Category::Melee, &pred, false);
        req.equipment = Some(equipment);
        let infos = collector().collect(&req);

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].item.id, ItemId::new(20));
        assert_eq!(infos[0].location.holder, Holder::Equip(EquipSlot::Melee));
        assert_eq!(infos[1].location.holder, Holder::Collection(CollectionId::new(1)));
    }

    #[test]
    fn test_secondary_store_only_when_enabled() {
        let mut primary = MemoryInventory::new(1, 2);
        primary.put(0, Item::new(1, "bandage", "Bandage").tagged("Medic"));
        let mut companion = MemoryInventory::new(2, 2);
        companion.put(1, Item::new(2, "medkit", "Medkit").tagged("Medic"));

        let classifier = Classifier::default();
        let pred = |i: &Item| classifier.matches(i, Category::Medical);
        let mut req = request(shared(primary), Category::Medical, &pred, false);
        req.secondary = Some(shared(companion));

        assert_eq!(collector().collect(&req).len(), 1);

        req.options.include_secondary = true;
        let infos = collector().collect(&req);
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].location.collection(), Some(CollectionId::new(2)));
    }
}

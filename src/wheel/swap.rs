//! Drag-reordering on the wheel, and moving items between the inventory and equip slots.

use crate::category::Category;
use crate::item::{Item, ItemName};
use crate::search::{Holder, ItemLocation, Scope};
use crate::sys::host::{CollectionId, EquipSlot, Host, HostError, SharedInventory};
use crate::wheel::engine::{SwapGuard, WheelEngine, scope_of};
use crate::wheel::model::{CategoryWheel, DragDenied};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EquipError {
    #[error("{slot} refused '{item}'")]
    Refused { slot: EquipSlot, item: ItemName },
    #[error("'{0}' sits inside a container and cannot be equipped from there")]
    NotDetachable(ItemName),
    #[error("'{0}' is no longer where the wheel saw it")]
    Moved(ItemName),
    #[error("nothing in {0} to exchange with")]
    EmptySlot(EquipSlot),
    #[error("collection {0} is not part of this session")]
    UnknownCollection(CollectionId),
    #[error("collaborator is busy")]
    Busy,
    #[error("no room anywhere for '{}'", .0.name)]
    Exhausted(Item),
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Denied(#[from] DragDenied),
    #[error("no session is active")]
    NoSession,
    #[error("there is no {0} wheel")]
    NoWheel(Category),
    #[error("slot {0} no longer matches the inventory")]
    StaleMapping(usize),
    #[error("inventory is busy")]
    Busy,
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Equip(#[from] EquipError),
}

fn collection_of(host: &Host, id: CollectionId) -> Option<SharedInventory> {
    if host.primary_id() == id {
        return Some(host.primary.clone());
    }
    host.secondary
        .as_ref()
        .filter(|s| s.try_borrow().is_ok_and(|s| s.id() == id))
        .cloned()
}

/// Puts `item` back into `collection` as close to `index` as possible: the original slot, then
/// anywhere in the primary collection, then the actor. Hands the item back if nothing took it.
fn stow(host: &Host, collection: &SharedInventory, index: usize, item: Item) -> Result<(), Item> {
    let item = match collection.try_borrow_mut() {
        Ok(mut inv) => match inv.add_at(item, index) {
            Ok(()) => return Ok(()),
            Err(item) => item,
        },
        Err(_) => item,
    };
    let item = match host.primary.try_borrow_mut() {
        Ok(mut primary) => match primary.add_anywhere(item) {
            Ok(at) => {
                log::debug!("Stowed displaced item at primary index {}", at);
                return Ok(());
            }
            Err(item) => item,
        },
        Err(_) => item,
    };
    match host.actor.try_borrow_mut() {
        Ok(mut actor) => actor.give(item),
        Err(_) => Err(item),
    }
}

/// Plugs `item`, currently at `origin`, into `slot`. Whatever `slot` held goes back to the
/// inventory; if nothing will take it the exchange is rolled back.
pub(crate) fn insert_evict(
    host: &Host,
    slot: EquipSlot,
    item: &Item,
    origin: ItemLocation,
) -> Result<(), EquipError> {
    if origin.is_nested() {
        return Err(EquipError::NotDetachable(item.name.clone()));
    }
    match origin.holder {
        Holder::Equip(from) => exchange_slots(host, from, slot, item),
        Holder::Collection(id) => {
            let collection = collection_of(host, id).ok_or(EquipError::UnknownCollection(id))?;
            evict_into(host, &collection, origin.top_index, slot, item)
        }
    }
}

fn evict_into(
    host: &Host,
    collection: &SharedInventory,
    index: usize,
    slot: EquipSlot,
    item: &Item,
) -> Result<(), EquipError> {
    let detached = collection
        .try_borrow_mut()
        .map_err(|_| EquipError::Busy)?
        .detach(index);
    let detached = match detached {
        Some(found) if found.is_same(item) => found,
        Some(other) => {
            if let Err(lost) = stow(host, collection, index, other) {
                log::error!("Could not put '{}' back at {}", lost.name, index);
            }
            return Err(EquipError::Moved(item.name.clone()));
        }
        None => return Err(EquipError::Moved(item.name.clone())),
    };

    let plugged = match host.equipment.try_borrow_mut() {
        Ok(mut equipment) => equipment.plug(slot, detached),
        Err(_) => {
            if let Err(lost) = stow(host, collection, index, detached) {
                log::error!("Could not restore '{}'", lost.name);
            }
            return Err(EquipError::Busy);
        }
    };
    let displaced = match plugged {
        Ok(displaced) => displaced,
        Err(refused) => {
            if let Err(lost) = stow(host, collection, index, refused) {
                log::error!("Could not put refused '{}' back", lost.name);
            }
            return Err(EquipError::Refused {
                slot,
                item: item.name.clone(),
            });
        }
    };

    if let Some(old) = displaced
        && let Err(old) = stow(host, collection, index, old)
    {
        rollback(host, collection, index, slot, old.clone());
        return Err(EquipError::Exhausted(old));
    }

    if let Ok(mut inv) = collection.try_borrow_mut() {
        inv.notify_changed(index);
        inv.recalculate_derived_weight();
    }
    log::info!("Equipped '{}' into {}", item.name, slot);
    Ok(())
}

/// Undoes an eviction whose displaced item found no home.
fn rollback(host: &Host, collection: &SharedInventory, index: usize, slot: EquipSlot, old: Item) {
    let restored = host
        .equipment
        .try_borrow_mut()
        .ok()
        .and_then(|mut e| e.plug(slot, old).ok())
        .flatten();
    if let Some(new) = restored
        && let Err(lost) = stow(host, collection, index, new)
    {
        log::error!("Rollback could not return '{}' to the inventory", lost.name);
    }
}

fn exchange_slots(
    host: &Host,
    from: EquipSlot,
    to: EquipSlot,
    item: &Item,
) -> Result<(), EquipError> {
    let mut equipment = host.equipment.try_borrow_mut().map_err(|_| EquipError::Busy)?;
    if !equipment.content(from).is_some_and(|e| e.is_same(item)) {
        return Err(EquipError::Moved(item.name.clone()));
    }
    if equipment.content(to).is_none() {
        return Err(EquipError::EmptySlot(to));
    }
    let previous = match equipment.plug(to, item.clone()) {
        Ok(Some(previous)) => previous,
        Ok(None) => return Err(EquipError::EmptySlot(to)),
        Err(refused) => {
            return Err(EquipError::Refused {
                slot: to,
                item: refused.name,
            });
        }
    };
    if let Err(refused) = equipment.plug(from, previous) {
        let name = refused.name.clone();
        if equipment.plug(to, refused).is_err() {
            log::error!("Could not return '{}' to {}", name, to);
        }
        return Err(EquipError::Refused { slot: from, item: name });
    }
    Ok(())
}

/// An equipped endpoint dropped onto a draggable one: the draggable item goes into the equip slot.
fn equip_route(
    wheel: &CategoryWheel,
    a: usize,
    b: usize,
    scope: &Scope,
) -> Option<(EquipSlot, Item, ItemLocation)> {
    let slot_of = |i: usize| wheel.displayed(i).and_then(|info| info.location.equip_slot());
    let (slot, other) = match (slot_of(a), slot_of(b)) {
        (Some(slot), None) => (slot, b),
        (None, Some(slot)) => (slot, a),
        _ => return None,
    };
    wheel.can_drag(other, scope).ok()?;
    let info = wheel.displayed(other)?;
    Some((slot, info.item.clone(), info.location))
}

impl WheelEngine {
    /// The user dragged wheel slot `a` onto `b`. The items swap places in the primary
    /// collection without leaving it, and the wheel follows without a full rebuild.
    pub fn on_slots_swapped(
        &mut self,
        category: Category,
        a: usize,
        b: usize,
    ) -> Result<(), SwapError> {
        self.pump_events();
        let result = self.try_swap(category, a, b);
        if let Err(e) = &result {
            log::info!("Swap of {} slots {} and {} refused: {}", category, a, b, e);
            if let Some(host) = self.host()
                && let Ok(mut view) = host.view.try_borrow_mut()
            {
                view.notify(&e.to_string());
            }
            self.push_view(category);
        }
        result
    }

    fn try_swap(&mut self, category: Category, a: usize, b: usize) -> Result<(), SwapError> {
        let host = self.host().ok_or(SwapError::NoSession)?;
        if a == b {
            return Err(DragDenied::SameSlot.into());
        }
        let scope = scope_of(&host);
        let wheel = self.wheels.get(&category).ok_or(SwapError::NoWheel(category))?;

        if let Some((slot, item, origin)) = equip_route(wheel, a, b, &scope) {
            {
                let _guard = SwapGuard::enter(&self.state);
                insert_evict(&host, slot, &item, origin)?;
            }
            self.discard_self_changes();
            self.refresh(category, false, false);
            return Ok(());
        }

        wheel.can_drag(a, &scope)?;
        wheel.can_drag(b, &scope)?;
        let inv_a = wheel.wheel_to_inventory(a).ok_or(DragDenied::NotMapped(a))?;
        let inv_b = wheel.wheel_to_inventory(b).ok_or(DragDenied::NotMapped(b))?;
        let expected = [(a, inv_a, wheel.slot(a).cloned()), (b, inv_b, wheel.slot(b).cloned())];

        let stale = {
            let primary = host.primary.try_borrow().map_err(|_| SwapError::Busy)?;
            if !primary.is_alive() {
                return Err(HostError::Dead(scope.primary).into());
            }
            expected
                .iter()
                .find(|(_, inv, shown)| {
                    !primary
                        .get_at(*inv)
                        .zip(shown.as_ref())
                        .is_some_and(|(live, shown)| live.is_same(shown))
                })
                .map(|(slot, ..)| *slot)
        };
        if let Some(slot) = stale {
            self.refresh(category, false, false);
            return Err(SwapError::StaleMapping(slot));
        }

        {
            let _guard = SwapGuard::enter(&self.state);
            let mut primary = host.primary.try_borrow_mut().map_err(|_| SwapError::Busy)?;
            primary.swap_in_place(inv_a, inv_b)?;
            primary.notify_changed(inv_a);
            primary.notify_changed(inv_b);
            primary.recalculate_derived_weight();
        }
        if let Some(wheel) = self.wheels.get_mut(&category) {
            wheel.apply_swap(a, b, &scope);
        }
        self.discard_self_changes();

        log::debug!(
            "Swapped {} slots {} and {} (inventory {} <-> {})",
            category,
            a,
            b,
            inv_a,
            inv_b
        );
        self.push_view(category);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::item::ItemId;
    use crate::sys::host::{Equipment, Inventory};
    use crate::sys::memory::MemoryEquipment;
    use crate::sys::memory::rig::Rig;
    use crate::wheel::SyncState;

    fn medkit(id: u64) -> Item {
        Item::new(id, format!("medkit_{id}"), format!("Medkit {id}")).tagged("Medic")
    }

    fn started(rig: &Rig) -> WheelEngine {
        let mut engine = WheelEngine::new(Settings::default());
        engine.start_session(rig.host());
        engine
    }

    #[test]
    fn test_swap_moves_items_in_place() {
        let rig = Rig::new(8);
        for (index, id) in [(0, 1), (2, 2), (5, 3)] {
            rig.primary.borrow_mut().put(index, medkit(id));
        }
        let mut engine = started(&rig);
        engine.confirm_selection(Category::Medical, 0);

        engine.on_slots_swapped(Category::Medical, 0, 2).unwrap();

        let inv = rig.primary.borrow();
        assert_eq!(inv.get_at(0).map(|i| i.id), Some(ItemId::new(3)));
        assert_eq!(inv.get_at(5).map(|i| i.id), Some(ItemId::new(1)));
        assert_eq!(inv.notifications, vec![0, 5]);
        assert_eq!(inv.weight_recalculations, 1);
        drop(inv);

        let wheel = engine.wheel(Category::Medical).unwrap();
        assert_eq!(wheel.slot(0).map(|i| i.id), Some(ItemId::new(3)));
        assert_eq!(wheel.slot(2).map(|i| i.id), Some(ItemId::new(1)));
        assert_eq!(wheel.wheel_to_inventory(0), Some(0));
        assert_eq!(wheel.wheel_to_inventory(2), Some(5));
        assert!(wheel.mapping_is_symmetric());
        assert_eq!(wheel.last_confirmed, Some(2));
        assert_eq!(engine.sync_state(), SyncState::Idle);

        // the swap's own notifications were absorbed; the next tick keeps the layout
        engine.tick();
        let wheel = engine.wheel(Category::Medical).unwrap();
        assert_eq!(wheel.slot(2).map(|i| i.id), Some(ItemId::new(1)));
    }

    #[test]
    fn test_nested_drag_is_refused_without_mutation() {
        let rig = Rig::new(4);
        let pouch = Item::new(50, "pouch", "Pouch");
        rig.primary.borrow_mut().put(0, medkit(1));
        rig.primary
            .borrow_mut()
            .put_container(1, pouch, vec![Some(medkit(2)), None]);
        let mut engine = started(&rig);

        let wheel = engine.wheel(Category::Medical).unwrap();
        assert!(wheel.is_from_nested(1));

        let err = engine.on_slots_swapped(Category::Medical, 0, 1).unwrap_err();
        assert!(matches!(err, SwapError::Denied(DragDenied::Nested)));
        assert!(rig.primary.borrow().notifications.is_empty());
        assert_eq!(rig.primary.borrow().get_at(0).map(|i| i.id), Some(ItemId::new(1)));
        assert_eq!(rig.view.borrow().messages.len(), 1);
    }

    #[test]
    fn test_center_and_same_slot_are_refused() {
        let rig = Rig::new(4);
        rig.primary.borrow_mut().put(0, medkit(1));
        let mut engine = started(&rig);

        assert!(matches!(
            engine.on_slots_swapped(Category::Medical, 0, 8),
            Err(SwapError::Denied(DragDenied::CenterSlot))
        ));
        assert!(matches!(
            engine.on_slots_swapped(Category::Medical, 0, 0),
            Err(SwapError::Denied(DragDenied::SameSlot))
        ));
    }

    #[test]
    fn test_stale_mapping_refreshes_instead_of_swapping() {
        let rig = Rig::new(4);
        rig.primary.borrow_mut().put(0, medkit(1));
        rig.primary.borrow_mut().put(1, medkit(2));
        let mut engine = started(&rig);

        // moved behind the engine's back, without a notification
        let moved = rig.primary.borrow_mut().detach(1).unwrap();
        rig.primary.borrow_mut().put(3, moved);

        let err = engine.on_slots_swapped(Category::Medical, 0, 1).unwrap_err();
        assert!(matches!(err, SwapError::StaleMapping(1)));
        assert_eq!(engine.wheel(Category::Medical).unwrap().wheel_to_inventory(1), Some(3));
    }

    #[test]
    fn test_dragging_onto_equipped_gun_exchanges() {
        let rig = Rig::new(4);
        let ak = Item::new(30, "ak", "AK").tagged("Gun");
        let svd = Item::new(31, "svd", "SVD").tagged("Gun");
        *rig.equipment.borrow_mut() =
            MemoryEquipment::default().with(EquipSlot::PrimaryWeapon, ak.clone());
        rig.primary.borrow_mut().put(2, svd.clone());
        let mut engine = started(&rig);

        engine.on_slots_swapped(Category::Gun, 1, 0).unwrap();

        assert_eq!(rig.equipment.borrow().content(EquipSlot::PrimaryWeapon), Some(svd));
        assert_eq!(rig.primary.borrow().get_at(2), Some(ak));
        let wheel = engine.wheel(Category::Gun).unwrap();
        assert_eq!(wheel.slot(0).map(|i| i.id), Some(ItemId::new(31)));
    }

    #[test]
    fn test_stow_falls_back_to_free_slot_then_actor() {
        let rig = Rig::new(2);
        rig.primary.borrow_mut().put(0, medkit(1));
        let host = rig.host();
        let ak = Item::new(30, "ak", "AK");
        let svd = Item::new(31, "svd", "SVD");

        stow(&host, &host.primary, 0, ak.clone()).unwrap();
        assert_eq!(rig.primary.borrow().get_at(1), Some(ak));

        stow(&host, &host.primary, 0, svd.clone()).unwrap();
        assert_eq!(rig.actor.borrow().pocket, vec![svd]);
    }

    #[test]
    fn test_refused_item_is_put_back() {
        let rig = Rig::new(2);
        let svd = Item::new(31, "svd", "SVD");
        rig.equipment.borrow_mut().locked.push(EquipSlot::PrimaryWeapon);
        rig.primary.borrow_mut().put(1, svd.clone());

        let err = insert_evict(
            &rig.host(),
            EquipSlot::PrimaryWeapon,
            &svd,
            ItemLocation::top(CollectionId::new(1), 1),
        )
        .unwrap_err();
        assert!(matches!(err, EquipError::Refused { .. }));
        assert_eq!(rig.primary.borrow().get_at(1), Some(svd));
    }

    #[test]
    fn test_exchange_rolls_back_when_old_item_has_nowhere_to_go() {
        let rig = Rig::new(2);
        let ak = Item::new(30, "ak", "AK");
        let svd = Item::new(31, "svd", "SVD");
        *rig.equipment.borrow_mut() =
            MemoryEquipment::default().with(EquipSlot::PrimaryWeapon, ak.clone());
        rig.primary.borrow_mut().put(0, svd.clone());
        rig.primary.borrow_mut().put(1, medkit(1));
        rig.primary.borrow_mut().rejects.push(ak.id);
        rig.actor.borrow_mut().pocket_full = true;

        let err = insert_evict(
            &rig.host(),
            EquipSlot::PrimaryWeapon,
            &svd,
            ItemLocation::top(CollectionId::new(1), 0),
        )
        .unwrap_err();

        assert!(matches!(err, EquipError::Exhausted(ref old) if old.is_same(&ak)));
        assert_eq!(rig.equipment.borrow().content(EquipSlot::PrimaryWeapon), Some(ak));
        assert_eq!(rig.primary.borrow().get_at(0), Some(svd));
        assert_eq!(rig.primary.borrow().get_at(1).map(|i| i.id), Some(ItemId::new(1)));
        assert!(rig.actor.borrow().pocket.is_empty());
        assert!(rig.primary.borrow().notifications.is_empty());
    }

    #[test]
    fn test_nested_origin_is_not_detachable() {
        let rig = Rig::new(2);
        let svd = Item::new(31, "svd", "SVD");
        let err = insert_evict(
            &rig.host(),
            EquipSlot::PrimaryWeapon,
            &svd,
            ItemLocation::nested(CollectionId::new(1), 0, 2),
        )
        .unwrap_err();
        assert!(matches!(err, EquipError::NotDetachable(_)));
    }
}

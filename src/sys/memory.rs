//! In-memory collaborators. Used by the demo binary and the test suites, and a reference for
//! what a host has to provide.

use crate::category::Category;
use crate::events::{InventoryChange, WheelEvent};
use crate::item::{Item, ItemId};
use crate::sys::host::{
    Actor, CollectionId, EquipSlot, Equipment, HostError, Inventory, QuickSlots, WheelView,
};
use async_channel::Sender;
use std::collections::HashMap;

pub struct MemoryInventory {
    id: CollectionId,
    slots: Vec<Option<Item>>,
    containers: HashMap<ItemId, Vec<Option<Item>>>,
    listener: Option<Sender<WheelEvent>>,
    /// Items this collection will not take in.
    pub rejects: Vec<ItemId>,
    pub notifications: Vec<usize>,
    pub weight_recalculations: usize,
    pub alive: bool,
}

impl MemoryInventory {
    pub fn new(id: u32, capacity: usize) -> Self {
        Self {
            id: CollectionId::new(id),
            slots: vec![None; capacity],
            containers: HashMap::new(),
            listener: None,
            rejects: Vec::new(),
            notifications: Vec::new(),
            weight_recalculations: 0,
            alive: true,
        }
    }

    /// Sets a slot without notifying, for building fixtures.
    pub fn put(&mut self, index: usize, item: Item) {
        self.slots[index] = Some(item);
    }

    pub fn put_container(&mut self, index: usize, item: Item, contents: Vec<Option<Item>>) {
        self.containers.insert(item.id, contents);
        self.put(index, item);
    }

    pub fn set_container_contents(&mut self, container: ItemId, contents: Vec<Option<Item>>) {
        self.containers.insert(container, contents);
    }

    /// Removes an item the way host gameplay would, including the change notification.
    pub fn remove(&mut self, index: usize) -> Option<Item> {
        let item = self.slots.get_mut(index)?.take();
        self.notify_changed(index);
        item
    }

    pub fn insert(&mut self, index: usize, item: Item) {
        self.put(index, item);
        self.notify_changed(index);
    }

    pub fn slots(&self) -> &[Option<Item>] {
        &self.slots
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|i| i.id == id))
    }

    fn accepts(&self, item: &Item) -> bool {
        !self.rejects.contains(&item.id)
    }
}

impl Inventory for MemoryInventory {
    fn id(&self) -> CollectionId {
        self.id
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn get_at(&self, index: usize) -> Option<Item> {
        self.slots.get(index).cloned().flatten()
    }

    fn nested_slots(&self, container: &Item) -> Option<Vec<Option<Item>>> {
        self.containers.get(&container.id).cloned()
    }

    fn detach(&mut self, index: usize) -> Option<Item> {
        self.slots.get_mut(index)?.take()
    }

    fn add_at(&mut self, item: Item, index: usize) -> Result<(), Item> {
        if !self.accepts(&item) {
            return Err(item);
        }
        match self.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(item);
                Ok(())
            }
            _ => Err(item),
        }
    }

    fn add_anywhere(&mut self, item: Item) -> Result<usize, Item> {
        if !self.accepts(&item) {
            return Err(item);
        }
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(item);
                Ok(index)
            }
            None => Err(item),
        }
    }

    fn swap_in_place(&mut self, a: usize, b: usize) -> Result<(), HostError> {
        for index in [a, b] {
            if index >= self.slots.len() {
                return Err(HostError::OutOfRange {
                    collection: self.id,
                    index,
                });
            }
        }
        self.slots.swap(a, b);
        Ok(())
    }

    fn notify_changed(&mut self, index: usize) {
        self.notifications.push(index);
        if let Some(tx) = &self.listener {
            let change = InventoryChange {
                collection: self.id,
                index,
            };
            if tx.try_send(WheelEvent::InventoryChanged(change)).is_err() {
                log::warn!("Change listener for collection {} is gone", self.id);
            }
        }
    }

    fn recalculate_derived_weight(&mut self) {
        self.weight_recalculations += 1;
    }

    fn subscribe(&mut self, listener: Sender<WheelEvent>) {
        self.listener = Some(listener);
    }

    fn unsubscribe(&mut self) {
        self.listener = None;
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Default)]
pub struct MemoryEquipment {
    slots: HashMap<EquipSlot, Item>,
    pub locked: Vec<EquipSlot>,
}

impl MemoryEquipment {
    pub fn with(mut self, slot: EquipSlot, item: Item) -> Self {
        self.slots.insert(slot, item);
        self
    }
}

impl Equipment for MemoryEquipment {
    fn content(&self, slot: EquipSlot) -> Option<Item> {
        self.slots.get(&slot).cloned()
    }

    fn plug(&mut self, slot: EquipSlot, item: Item) -> Result<Option<Item>, Item> {
        if self.locked.contains(&slot) {
            return Err(item);
        }
        Ok(self.slots.insert(slot, item))
    }
}

#[derive(Default)]
pub struct MemoryQuickSlots {
    slots: HashMap<usize, Item>,
    pub writes: usize,
}

impl QuickSlots for MemoryQuickSlots {
    fn set(&mut self, index: usize, item: Option<&Item>) {
        self.writes += 1;
        match item {
            Some(item) => self.slots.insert(index, item.clone()),
            None => self.slots.remove(&index),
        };
    }

    fn get(&self, index: usize) -> Option<Item> {
        self.slots.get(&index).cloned()
    }
}

#[derive(Default)]
pub struct MemoryActor {
    pub used: Vec<(Item, Category)>,
    pub equipped: Vec<Item>,
    pub held: Option<Item>,
    pub pocket: Vec<Item>,
    pub pocket_full: bool,
    pub weapon_slot: Option<EquipSlot>,
}

impl Actor for MemoryActor {
    fn use_item(&mut self, item: &Item, category: Category) -> Result<(), HostError> {
        self.used.push((item.clone(), category));
        Ok(())
    }

    fn equip_to_hand(&mut self, item: &Item) -> Result<(), HostError> {
        self.equipped.push(item.clone());
        self.held = Some(item.clone());
        Ok(())
    }

    fn held_item(&self) -> Option<Item> {
        self.held.clone()
    }

    fn active_weapon_slot(&self) -> EquipSlot {
        self.weapon_slot.unwrap_or(EquipSlot::PrimaryWeapon)
    }

    fn give(&mut self, item: Item) -> Result<(), Item> {
        if self.pocket_full {
            return Err(item);
        }
        self.pocket.push(item);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingView {
    pub category: Option<Category>,
    pub slots: Vec<Option<Item>>,
    pub selected: Option<usize>,
    pub visible: bool,
    pub executed_on_hide: Option<bool>,
    pub messages: Vec<String>,
}

impl WheelView for RecordingView {
    fn set_slots(&mut self, category: Category, slots: &[Option<Item>]) {
        self.category = Some(category);
        self.slots = slots.to_vec();
    }

    fn set_selected_index(&mut self, index: Option<usize>) {
        self.selected = index;
    }

    fn show(&mut self, category: Category) {
        self.category = Some(category);
        self.visible = true;
    }

    fn hide(&mut self, execute_selection_on_hide: bool) {
        self.visible = false;
        self.executed_on_hide = Some(execute_selection_on_hide);
    }

    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_in_place_keeps_items_attached() {
        let mut inv = MemoryInventory::new(1, 4);
        inv.put(0, Item::new(1, "a", "A"));
        inv.put(3, Item::new(2, "b", "B"));

        inv.swap_in_place(0, 3).unwrap();
        assert_eq!(inv.get_at(0).map(|i| i.id), Some(ItemId::new(2)));
        assert_eq!(inv.get_at(3).map(|i| i.id), Some(ItemId::new(1)));
        assert!(inv.notifications.is_empty());
        assert!(inv.swap_in_place(0, 9).is_err());
    }

    #[test]
    fn test_notifications_reach_listener() {
        let (tx, rx) = async_channel::unbounded();
        let mut inv = MemoryInventory::new(3, 2);
        inv.subscribe(tx);
        inv.insert(1, Item::new(5, "x", "X"));

        match rx.try_recv() {
            Ok(WheelEvent::InventoryChanged(change)) => {
                assert_eq!(change.collection, CollectionId::new(3));
                assert_eq!(change.index, 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_add_at_refuses_taken_slot() {
        let mut inv = MemoryInventory::new(1, 2);
        inv.put(0, Item::new(1, "a", "A"));
        let back = inv.add_at(Item::new(2, "b", "B"), 0).unwrap_err();
        assert_eq!(back.id, ItemId::new(2));
        assert_eq!(inv.add_anywhere(back), Ok(1));
    }
}

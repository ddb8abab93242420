use crate::category::Category;
use crate::item::{Item, ItemId};
use crate::search::{CollectedItemInfo, ItemLocation, Scope};
use crate::wheel::{BUFFER_LEN, CENTER_SLOT, SLOT_COUNT};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DragDenied {
    #[error("the center of the wheel holds nothing")]
    CenterSlot,
    #[error("slot {0} does not exist")]
    OutOfRange(usize),
    #[error("slot {0} is empty")]
    Empty(usize),
    #[error("stacked items cannot be rearranged")]
    Stacked,
    #[error("items inside containers cannot be rearranged")]
    Nested,
    #[error("items in the companion's inventory cannot be rearranged")]
    SecondaryStore,
    #[error("equipped items cannot be rearranged")]
    Equipped,
    #[error("slot {0} is not linked to an inventory position")]
    NotMapped(usize),
    #[error("an item cannot be swapped with itself")]
    SameSlot,
}

/// Per-category wheel state.
///
/// `slots` is what the presentation layer renders; index [`CENTER_SLOT`] is never filled.
/// Only items from reorderable locations get an entry in the two index maps, so every
/// `wheel_to_inventory[i] == Some(n)` has `inventory_to_wheel[n] == i`.
#[derive(Debug, Clone)]
pub struct CategoryWheel {
    pub category: Category,
    slots: [Option<Item>; BUFFER_LEN],
    displayed: [Option<CollectedItemInfo>; BUFFER_LEN],
    from_nested: [bool; BUFFER_LEN],
    wheel_to_inventory: [Option<usize>; SLOT_COUNT],
    inventory_to_wheel: HashMap<usize, usize>,
    collected: HashMap<ItemLocation, CollectedItemInfo>,
    pub last_confirmed: Option<usize>,
    pub last_selected: Option<Item>,
    pub hover_index: Option<usize>,
    pub is_first_load: bool,
}

impl CategoryWheel {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            slots: std::array::from_fn(|_| None),
            displayed: std::array::from_fn(|_| None),
            from_nested: [false; BUFFER_LEN],
            wheel_to_inventory: [None; SLOT_COUNT],
            inventory_to_wheel: HashMap::new(),
            collected: HashMap::new(),
            last_confirmed: None,
            last_selected: None,
            hover_index: None,
            is_first_load: true,
        }
    }

    pub fn slots(&self) -> &[Option<Item>; BUFFER_LEN] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Item> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn displayed(&self, index: usize) -> Option<&CollectedItemInfo> {
        self.displayed.get(index).and_then(Option::as_ref)
    }

    pub fn is_from_nested(&self, index: usize) -> bool {
        self.from_nested.get(index).copied().unwrap_or(false)
    }

    pub fn wheel_to_inventory(&self, index: usize) -> Option<usize> {
        self.wheel_to_inventory.get(index).copied().flatten()
    }

    pub fn inventory_to_wheel(&self, inventory_index: usize) -> Option<usize> {
        self.inventory_to_wheel.get(&inventory_index).copied()
    }

    pub fn collected(&self, location: &ItemLocation) -> Option<&CollectedItemInfo> {
        self.collected.get(location)
    }

    pub fn collected_len(&self) -> usize {
        self.collected.len()
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        index < SLOT_COUNT && self.slots[index].is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn filled_slot_indices(&self) -> Vec<usize> {
        (0..SLOT_COUNT).filter(|&i| self.is_occupied(i)).collect()
    }

    pub fn first_available(&self) -> Option<usize> {
        (0..SLOT_COUNT).find(|&i| self.is_occupied(i))
    }

    pub fn stack_count(&self, index: usize) -> usize {
        self.displayed(index).map_or(0, CollectedItemInfo::stack_count)
    }

    pub fn clear(&mut self) {
        self.slots = std::array::from_fn(|_| None);
        self.displayed = std::array::from_fn(|_| None);
        self.from_nested = [false; BUFFER_LEN];
        self.wheel_to_inventory = [None; SLOT_COUNT];
        self.inventory_to_wheel.clear();
        self.collected.clear();
    }

    /// Lays `infos` out on the ring in order and rebuilds every derived table from scratch.
    /// Entries beyond [`SLOT_COUNT`] are kept in the collected map but not shown.
    pub fn rebuild(&mut self, infos: Vec<CollectedItemInfo>, scope: &Scope) {
        self.clear();

        let mut placed = 0;
        for info in infos {
            if placed < SLOT_COUNT {
                debug_assert_ne!(placed, CENTER_SLOT);
                self.place(placed, &info, scope);
                placed += 1;
            }
            self.collected.insert(info.location, info);
        }
    }

    fn place(&mut self, index: usize, info: &CollectedItemInfo, scope: &Scope) {
        self.slots[index] = Some(info.item.clone());
        self.displayed[index] = Some(info.clone());
        self.from_nested[index] = info.location.is_nested();

        if !info.is_stacked() && info.location.is_reorderable(scope) {
            let inv = info.location.top_index;
            self.wheel_to_inventory[index] = Some(inv);
            self.inventory_to_wheel.insert(inv, index);
        }
    }

    pub fn find_by_identity(&self, id: ItemId) -> Option<usize> {
        (0..SLOT_COUNT).find(|&i| {
            self.displayed[i]
                .as_ref()
                .is_some_and(|info| info.contains(id))
        })
    }

    pub fn find_by_type(&self, item: &Item) -> Option<usize> {
        (0..SLOT_COUNT).find(|&i| self.slots[i].as_ref().is_some_and(|s| s.is_same_type(item)))
    }

    /// Identity first, then type key.
    pub fn locate(&self, item: &Item) -> Option<usize> {
        self.find_by_identity(item.id)
            .or_else(|| self.find_by_type(item))
    }

    pub fn contains_item(&self, id: ItemId) -> bool {
        self.find_by_identity(id).is_some()
    }

    /// Whether slot `index` shows the item the user chose, either itself or as a stack member.
    fn shows_chosen(&self, index: usize) -> bool {
        let Some(shown) = self.slot(index) else {
            return false;
        };
        match &self.last_selected {
            Some(chosen) => {
                shown.is_same(chosen) || self.displayed(index).is_some_and(|info| info.contains(chosen.id))
            }
            None => true,
        }
    }

    /// The confirmed index, if it still shows the chosen item. A different item that slid into
    /// the slot does not count.
    pub fn valid_selection(&self) -> Option<usize> {
        self.last_confirmed.filter(|&i| self.shows_chosen(i))
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.valid_selection().and_then(|i| self.slot(i))
    }

    pub fn select(&mut self, index: usize) -> bool {
        if !self.is_occupied(index) {
            return false;
        }
        self.last_confirmed = Some(index);
        self.last_selected = self.slots[index].clone();
        true
    }

    /// Next occupied slot `steps` positions away, wrapping around the ring.
    pub fn step_selection(&self, steps: i32) -> Option<usize> {
        let filled = self.filled_slot_indices();
        if filled.is_empty() {
            return None;
        }
        let current = self
            .valid_selection()
            .and_then(|sel| filled.iter().position(|&i| i == sel))
            .unwrap_or(0) as i64;
        let len = filled.len() as i64;
        let next = (current + steps as i64).rem_euclid(len) as usize;
        Some(filled[next])
    }

    pub fn can_drag(&self, index: usize, scope: &Scope) -> Result<(), DragDenied> {
        if index == CENTER_SLOT {
            return Err(DragDenied::CenterSlot);
        }
        if index >= SLOT_COUNT {
            return Err(DragDenied::OutOfRange(index));
        }
        let info = self.displayed(index).ok_or(DragDenied::Empty(index))?;

        if info.is_stacked() {
            Err(DragDenied::Stacked)
        } else if info.location.is_equipped() {
            Err(DragDenied::Equipped)
        } else if info.location.is_nested() {
            Err(DragDenied::Nested)
        } else if info.location.is_from_secondary(scope) {
            Err(DragDenied::SecondaryStore)
        } else if self.wheel_to_inventory(index).is_none() {
            Err(DragDenied::NotMapped(index))
        } else {
            Ok(())
        }
    }

    /// Mirrors an in-place inventory swap of the items behind wheel slots `a` and `b`.
    pub(crate) fn apply_swap(&mut self, a: usize, b: usize, scope: &Scope) {
        let (Some(inv_a), Some(inv_b)) = (self.wheel_to_inventory(a), self.wheel_to_inventory(b))
        else {
            return;
        };

        self.slots.swap(a, b);
        self.displayed.swap(a, b);
        self.from_nested.swap(a, b);

        let old_a = ItemLocation::top(scope.primary, inv_a);
        let old_b = ItemLocation::top(scope.primary, inv_b);
        let moved_b = self.collected.remove(&old_b);
        let moved_a = self.collected.remove(&old_a);

        for (slot, inv, moved) in [(a, inv_a, moved_b), (b, inv_b, moved_a)] {
            if let Some(info) = self.displayed[slot].as_mut() {
                info.relocate(inv);
            }
            if let Some(mut info) = moved {
                info.relocate(inv);
                self.collected.insert(info.location, info);
            }
            self.wheel_to_inventory[slot] = Some(inv);
            self.inventory_to_wheel.insert(inv, slot);
        }

        self.last_confirmed = match self.last_confirmed {
            Some(i) if i == a => Some(b),
            Some(i) if i == b => Some(a),
            other => other,
        };
    }

    pub fn mapping_is_symmetric(&self) -> bool {
        let forward = self
            .wheel_to_inventory
            .iter()
            .enumerate()
            .filter_map(|(w, inv)| inv.map(|inv| (w, inv)))
            .all(|(w, inv)| self.inventory_to_wheel.get(&inv) == Some(&w));
        let backward = self
            .inventory_to_wheel
            .iter()
            .all(|(&inv, &w)| self.wheel_to_inventory(w) == Some(inv));
        forward && backward
    }
}

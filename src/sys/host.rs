//! Collaborator interfaces the engine consumes. The host game implements these; the engine only
//! ever reaches a collaborator through the methods below.

use crate::category::Category;
use crate::events::WheelEvent;
use crate::item::Item;
use async_channel::Sender;
use derive_more::{Display, From, Into};
use std::cell::RefCell;
use std::rc::Rc;
use strum::{Display as StrumDisplay, EnumIter};
use thiserror::Error;

pub type Shared<T> = Rc<RefCell<T>>;
pub type SharedInventory = Shared<dyn Inventory>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
pub struct CollectionId(u32);

impl CollectionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay)]
pub enum EquipSlot {
    Melee,
    PrimaryWeapon,
    SecondaryWeapon,
    Totem,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("collection {0} is no longer alive")]
    Dead(CollectionId),
    #[error("index {index} is out of range for collection {collection}")]
    OutOfRange {
        collection: CollectionId,
        index: usize,
    },
    #[error("host refused '{item}': {reason}")]
    Refused { item: String, reason: String },
}

/// Ordered, index-addressable item collection owned by the host.
pub trait Inventory {
    fn id(&self) -> CollectionId;

    fn capacity(&self) -> usize;

    fn get_at(&self, index: usize) -> Option<Item>;

    /// Sub-slots of a container item held anywhere in this collection, or `None` when the item
    /// is not a container.
    fn nested_slots(&self, container: &Item) -> Option<Vec<Option<Item>>>;

    fn detach(&mut self, index: usize) -> Option<Item>;

    /// Places `item` at `index`. Hands the item back when the slot is taken or out of range.
    fn add_at(&mut self, item: Item, index: usize) -> Result<(), Item>;

    fn add_anywhere(&mut self, item: Item) -> Result<usize, Item>;

    /// Exchanges two entries in the backing storage without detaching either item. Raises no
    /// change notification.
    fn swap_in_place(&mut self, a: usize, b: usize) -> Result<(), HostError>;

    /// Fires the collection's change notification for `index`.
    fn notify_changed(&mut self, index: usize);

    fn recalculate_derived_weight(&mut self) {}

    /// Routes this collection's change notifications into `listener` from now on.
    fn subscribe(&mut self, listener: Sender<WheelEvent>);

    fn unsubscribe(&mut self);

    fn is_alive(&self) -> bool {
        true
    }
}

pub trait Equipment {
    fn content(&self, slot: EquipSlot) -> Option<Item>;

    /// Puts `item` into `slot`, returning whatever the slot held before. A refused item is
    /// handed back in `Err`.
    fn plug(&mut self, slot: EquipSlot, item: Item) -> Result<Option<Item>, Item>;
}

pub trait QuickSlots {
    fn set(&mut self, index: usize, item: Option<&Item>);

    fn get(&self, index: usize) -> Option<Item>;
}

/// The player character: the narrow set of host-game actions handlers invoke.
pub trait Actor {
    fn use_item(&mut self, item: &Item, category: Category) -> Result<(), HostError>;

    fn equip_to_hand(&mut self, item: &Item) -> Result<(), HostError>;

    fn held_item(&self) -> Option<Item>;

    /// Weapon slot guns are equipped into.
    fn active_weapon_slot(&self) -> EquipSlot {
        EquipSlot::PrimaryWeapon
    }

    /// Last-resort placement for an item nothing else would take.
    fn give(&mut self, item: Item) -> Result<(), Item>;
}

/// Rendering side of a wheel. Receives state; the engine receives its callbacks.
pub trait WheelView {
    fn set_slots(&mut self, category: Category, slots: &[Option<Item>]);

    fn set_selected_index(&mut self, index: Option<usize>);

    fn show(&mut self, category: Category);

    fn hide(&mut self, execute_selection_on_hide: bool);

    /// Short user-facing message, e.g. why a drag was refused.
    fn notify(&mut self, message: &str);
}

/// Everything the engine talks to during one session.
#[derive(Clone)]
pub struct Host {
    pub primary: SharedInventory,
    pub secondary: Option<SharedInventory>,
    pub equipment: Shared<dyn Equipment>,
    pub quick_slots: Shared<dyn QuickSlots>,
    pub actor: Shared<dyn Actor>,
    pub view: Shared<dyn WheelView>,
}

impl Host {
    pub fn primary_id(&self) -> CollectionId {
        self.primary.borrow().id()
    }

    pub fn secondary_id(&self) -> Option<CollectionId> {
        self.secondary.as_ref().map(|s| s.borrow().id())
    }
}

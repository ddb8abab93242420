use crate::category::Category;
use crate::item::ItemId;
use crate::sys::host::CollectionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InventoryChange {
    pub collection: CollectionId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Pressed,
    /// The press crossed the host's hold threshold.
    Held,
    Released,
    Cancelled,
    Scroll(i32),
}

#[derive(Debug, Clone)]
pub enum WheelEvent {
    InventoryChanged(InventoryChange),
    ItemRemoved(ItemId),
    Trigger(Category, TriggerEvent),
    SettingsReload,
}

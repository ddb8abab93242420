//! What picking or using an item actually does, per category.

use crate::category::Category;
use crate::item::{Item, ItemName};
use crate::search::{ItemLocation, Scope};
use crate::sys::host::{EquipSlot, Host, HostError};
use crate::wheel::model::CategoryWheel;
use crate::wheel::swap::{EquipError, insert_evict};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Equip(#[from] EquipError),
    #[error("'{0}' is not on the wheel")]
    NotOnWheel(ItemName),
    #[error("collaborator is busy")]
    Busy,
}

pub struct HandlerContext<'a> {
    pub host: &'a Host,
    pub category: Category,
    pub scope: Scope,
}

impl<'a> HandlerContext<'a> {
    pub fn new(host: &'a Host, category: Category, scope: Scope) -> Self {
        Self {
            host,
            category,
            scope,
        }
    }

    fn equipped(&self, slot: EquipSlot) -> Option<Item> {
        self.host
            .equipment
            .try_borrow()
            .ok()
            .and_then(|e| e.content(slot))
    }

    fn held(&self) -> Option<Item> {
        self.host.actor.try_borrow().ok().and_then(|a| a.held_item())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemHandler {
    /// Hand the item to the actor to consume.
    Consume,
    /// Put the item in the actor's hand.
    EquipToHand,
    /// Like [`Self::EquipToHand`], but for a stacked entry takes the last item of the stack.
    StackEquip,
    /// Plug the item into one of these equip slots, returning the previous occupant to the
    /// inventory.
    SlotExchange(&'static [EquipSlot]),
}

impl ItemHandler {
    pub fn use_item(
        &self,
        item: &Item,
        ctx: &HandlerContext<'_>,
        wheel: &CategoryWheel,
    ) -> Result<(), HandlerError> {
        match self {
            Self::Consume => {
                let mut actor = ctx.host.actor.try_borrow_mut().map_err(|_| HandlerError::Busy)?;
                actor.use_item(item, ctx.category)?;
            }
            Self::EquipToHand => {
                let mut actor = ctx.host.actor.try_borrow_mut().map_err(|_| HandlerError::Busy)?;
                actor.equip_to_hand(item)?;
            }
            Self::StackEquip => {
                let target = wheel
                    .find_by_identity(item.id)
                    .and_then(|i| wheel.displayed(i))
                    .map(|info| info.last_member().item.clone())
                    .ok_or_else(|| HandlerError::NotOnWheel(item.name.clone()))?;
                let mut actor = ctx.host.actor.try_borrow_mut().map_err(|_| HandlerError::Busy)?;
                actor.equip_to_hand(&target)?;
            }
            Self::SlotExchange(slots) => {
                let slot = self.target_slot(slots, ctx);
                if ctx.equipped(slot).is_some_and(|e| e.is_same(item)) {
                    log::debug!("'{}' is already in {}", item.name, slot);
                    return Ok(());
                }
                let origin: ItemLocation = wheel
                    .find_by_identity(item.id)
                    .and_then(|i| wheel.displayed(i))
                    .map(|info| info.location)
                    .ok_or_else(|| HandlerError::NotOnWheel(item.name.clone()))?;
                insert_evict(ctx.host, slot, item, origin)?;
            }
        }
        Ok(())
    }

    /// Called when the user confirms `item` on the wheel. Equipment is equipped right away;
    /// consumables only become the quick selection.
    pub fn on_item_selected(
        &self,
        item: &Item,
        index: usize,
        ctx: &HandlerContext<'_>,
        wheel: &CategoryWheel,
    ) -> Result<(), HandlerError> {
        match self {
            Self::Consume => {
                log::debug!("{} quick selection is now slot {} ('{}')", ctx.category, index, item.name);
                Ok(())
            }
            _ => self.use_item(item, ctx, wheel),
        }
    }

    pub fn on_wheel_shown(&self, wheel: &mut CategoryWheel, ctx: &HandlerContext<'_>) {
        if let Some(i) = self.preferred_index(wheel, ctx)
            && wheel.valid_selection() != Some(i)
        {
            log::debug!("{} wheel snaps to equipped slot {}", ctx.category, i);
            wheel.select(i);
        }
    }

    /// A selection this category insists on, overriding generic reconciliation.
    pub fn preferred_index(&self, wheel: &CategoryWheel, ctx: &HandlerContext<'_>) -> Option<usize> {
        let current = match self {
            Self::EquipToHand => ctx.held().or_else(|| {
                ctx.category
                    .equip_slots()
                    .iter()
                    .find_map(|&slot| ctx.equipped(slot))
            }),
            Self::SlotExchange(slots) => ctx.equipped(self.target_slot(slots, ctx)),
            Self::Consume | Self::StackEquip => None,
        }?;
        wheel.find_by_identity(current.id)
    }

    /// Whether using an item rearranges the primary collection.
    pub fn mutates_inventory(&self) -> bool {
        matches!(self, Self::SlotExchange(_))
    }

    fn target_slot(&self, slots: &[EquipSlot], ctx: &HandlerContext<'_>) -> EquipSlot {
        let active = ctx
            .host
            .actor
            .try_borrow()
            .map(|a| a.active_weapon_slot())
            .unwrap_or(EquipSlot::PrimaryWeapon);
        if slots.contains(&active) {
            active
        } else {
            slots.first().copied().unwrap_or(active)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{CollectedItemInfo, SearchHit};
    use crate::sys::host::{CollectionId, Equipment, Inventory};
    use crate::sys::memory::MemoryEquipment;
    use crate::sys::memory::rig::Rig;

    const PRIMARY: CollectionId = CollectionId::new(1);

    fn rig(equipment: MemoryEquipment) -> Rig {
        let rig = Rig::new(6);
        *rig.equipment.borrow_mut() = equipment;
        rig
    }

    fn scope() -> Scope {
        Scope {
            primary: PRIMARY,
            secondary: None,
        }
    }

    #[test]
    fn test_stack_equip_takes_last_location() {
        let rig = rig(MemoryEquipment::default());
        let first = Item::new(1, "f1", "F-1");
        let last = Item::new(2, "f1", "F-1");
        let mut wheel = CategoryWheel::new(Category::Explosive);
        wheel.rebuild(
            vec![
                CollectedItemInfo::stacked(vec![
                    SearchHit::new(first.clone(), ItemLocation::top(PRIMARY, 1)),
                    SearchHit::new(last.clone(), ItemLocation::top(PRIMARY, 4)),
                ])
                .unwrap(),
            ],
            &scope(),
        );

        let host = rig.host();

        let ctx = HandlerContext::new(&host, Category::Explosive, scope());
        ItemHandler::StackEquip.use_item(&first, &ctx, &wheel).unwrap();

        assert_eq!(rig.actor.borrow().equipped, vec![last]);
    }

    #[test]
    fn test_consume_selection_does_not_use() {
        let rig = rig(MemoryEquipment::default());
        let bandage = Item::new(1, "bandage", "Bandage");
        let wheel = CategoryWheel::new(Category::Medical);
        let host = rig.host();
        let ctx = HandlerContext::new(&host, Category::Medical, scope());

        ItemHandler::Consume.on_item_selected(&bandage, 0, &ctx, &wheel).unwrap();
        assert!(rig.actor.borrow().used.is_empty());

        ItemHandler::Consume.use_item(&bandage, &ctx, &wheel).unwrap();
        assert_eq!(rig.actor.borrow().used.len(), 1);
    }

    #[test]
    fn test_slot_exchange_returns_old_gun_to_origin() {
        let old = Item::new(30, "ak", "AK").tagged("Gun");
        let new = Item::new(31, "svd", "SVD").tagged("Gun");
        let rig = rig(MemoryEquipment::default().with(EquipSlot::PrimaryWeapon, old.clone()));
        rig.primary.borrow_mut().put(3, new.clone());

        let mut wheel = CategoryWheel::new(Category::Gun);
        wheel.rebuild(
            vec![
                CollectedItemInfo::single(SearchHit::new(
                    old.clone(),
                    ItemLocation::equipped(EquipSlot::PrimaryWeapon),
                )),
                CollectedItemInfo::single(SearchHit::new(new.clone(), ItemLocation::top(PRIMARY, 3))),
            ],
            &scope(),
        );
        let host = rig.host();
        let ctx = HandlerContext::new(&host, Category::Gun, scope());
        let handler = Category::Gun.handler();

        assert_eq!(handler.preferred_index(&wheel, &ctx), Some(0));
        handler.use_item(&new, &ctx, &wheel).unwrap();

        assert_eq!(rig.equipment.borrow().content(EquipSlot::PrimaryWeapon), Some(new));
        assert_eq!(rig.primary.borrow().get_at(3), Some(old));
    }

    #[test]
    fn test_melee_prefers_item_in_hand() {
        let knife = Item::new(20, "knife", "Knife");
        let axe = Item::new(21, "axe", "Axe");
        let rig = rig(MemoryEquipment::default());
        rig.actor.borrow_mut().held = Some(axe.clone());

        let mut wheel = CategoryWheel::new(Category::Melee);
        wheel.rebuild(
            vec![
                CollectedItemInfo::single(SearchHit::new(knife, ItemLocation::top(PRIMARY, 0))),
                CollectedItemInfo::single(SearchHit::new(axe, ItemLocation::top(PRIMARY, 1))),
            ],
            &scope(),
        );
        wheel.select(0);
        let host = rig.host();
        let ctx = HandlerContext::new(&host, Category::Melee, scope());

        ItemHandler::EquipToHand.on_wheel_shown(&mut wheel, &ctx);
        assert_eq!(wheel.last_confirmed, Some(1));
    }
}

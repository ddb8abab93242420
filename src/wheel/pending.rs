use crate::category::Category;
use crate::item::Item;
use crate::wheel::DISAPPEARANCE_WAIT_TICKS;
use crate::wheel::engine::{WheelEngine, push_quick_slot};
use std::collections::BTreeMap;

/// A selected item that vanished from its wheel and is being given time to come back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDisappearance {
    pub category: Category,
    pub item: Item,
    pub age_in_ticks: u32,
}

impl PendingDisappearance {
    pub fn is_due(&self) -> bool {
        self.age_in_ticks >= DISAPPEARANCE_WAIT_TICKS
    }
}

/// At most one record per category.
#[derive(Debug, Default)]
pub struct PendingQueue {
    records: BTreeMap<Category, PendingDisappearance>,
}

impl PendingQueue {
    /// Starts waiting on `item`. Returns `false` if it was already being waited on, in which
    /// case its age is left alone; a different item replaces the old record.
    pub fn enqueue(&mut self, category: Category, item: Item) -> bool {
        if self.records.get(&category).is_some_and(|r| r.item.is_same(&item)) {
            return false;
        }
        self.records.insert(
            category,
            PendingDisappearance {
                category,
                item,
                age_in_ticks: 0,
            },
        );
        true
    }

    pub fn remove(&mut self, category: Category) -> Option<PendingDisappearance> {
        self.records.remove(&category)
    }

    pub fn get(&self, category: Category) -> Option<&PendingDisappearance> {
        self.records.get(&category)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn age_all(&mut self) {
        for record in self.records.values_mut() {
            record.age_in_ticks = record.age_in_ticks.saturating_add(1);
        }
    }

    pub fn take_all(&mut self) -> Vec<PendingDisappearance> {
        std::mem::take(&mut self.records).into_values().collect()
    }
}

impl WheelEngine {
    /// Ages every pending record, restoring selections whose item came back and moving on from
    /// the ones that have waited long enough.
    pub(crate) fn advance_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let Some(host) = self.host() else {
            self.pending.clear();
            return;
        };

        self.pending.age_all();
        for record in self.pending.take_all() {
            let category = record.category;
            let quick_slot = self.quick_slot_index(category);
            let Some(wheel) = self.wheels.get_mut(&category) else {
                continue;
            };

            if let Some(index) = wheel.find_by_identity(record.item.id) {
                wheel.select(index);
                log::debug!("'{}' is back on the {} wheel", record.item.name, category);
                push_quick_slot(&host, quick_slot, wheel.slot(index));
                self.push_view(category);
                continue;
            }

            if self.item_in_scope(&host, category, &record.item) {
                log::debug!("'{}' is still in scope, keeping selection", record.item.name);
                continue;
            }

            if !record.is_due() {
                self.pending.records.insert(category, record);
                continue;
            }

            let Some(wheel) = self.wheels.get_mut(&category) else {
                continue;
            };
            let replacement = match wheel.first_available() {
                Some(index) => {
                    wheel.select(index);
                    wheel.slot(index).cloned()
                }
                None => {
                    wheel.last_confirmed = None;
                    wheel.last_selected = None;
                    None
                }
            };
            log::info!(
                "'{}' is gone from the {} wheel, selection moves to {:?}",
                record.item.name,
                category,
                replacement.as_ref().map(|i| i.name.as_str())
            );
            push_quick_slot(&host, quick_slot, replacement.as_ref());
            self.push_view(category);
        }
    }
}

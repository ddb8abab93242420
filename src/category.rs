use crate::handler::ItemHandler;
use crate::item::{Item, TagName};
use crate::sys::host::EquipSlot;
use serde::Serialize;
use serde_with::DeserializeFromStr;
use std::collections::HashMap;
use strum::{Display as StrumDisplay, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    DeserializeFromStr,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[strum(serialize = "Medical", serialize = "med", serialize = "medic")]
    Medical,
    #[strum(serialize = "Stimulant", serialize = "stim", serialize = "injector")]
    Stimulant,
    #[strum(serialize = "Food", serialize = "drink")]
    Food,
    #[strum(serialize = "Explosive", serialize = "grenade")]
    Explosive,
    #[strum(serialize = "Melee", serialize = "knife")]
    Melee,
    #[strum(serialize = "Ammo", serialize = "ammunition", serialize = "bullet")]
    Ammo,
    #[strum(serialize = "Totem", serialize = "talisman")]
    Totem,
    #[strum(serialize = "Gun", serialize = "weapon")]
    Gun,
}

impl Category {
    pub fn as_index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::iter().nth(idx)
    }

    /// Shortcut index the wheel mirrors its selection to, unless settings override it.
    pub fn default_quick_slot(&self) -> usize {
        self.as_index()
    }

    pub fn stacks_by_default(&self) -> bool {
        matches!(self, Self::Explosive)
    }

    /// Equip slots probed directly during collection. A generic inventory walk never sees them.
    pub fn equip_slots(&self) -> &'static [EquipSlot] {
        match self {
            Self::Melee => &[EquipSlot::Melee],
            Self::Gun => &[EquipSlot::PrimaryWeapon, EquipSlot::SecondaryWeapon],
            _ => &[],
        }
    }

    pub fn handler(&self) -> ItemHandler {
        match self {
            Self::Medical | Self::Stimulant | Self::Food | Self::Ammo => ItemHandler::Consume,
            Self::Explosive => ItemHandler::StackEquip,
            Self::Melee => ItemHandler::EquipToHand,
            Self::Gun => ItemHandler::SlotExchange(&[EquipSlot::PrimaryWeapon, EquipSlot::SecondaryWeapon]),
            Self::Totem => ItemHandler::SlotExchange(&[EquipSlot::Totem]),
        }
    }
}

const DEFAULT_TAGS: &[(&str, Category)] = &[
    ("Medic", Category::Medical),
    ("Healing", Category::Medical),
    ("Injector", Category::Stimulant),
    ("Food", Category::Food),
    ("Drink", Category::Food),
    ("Explosive", Category::Explosive),
    ("Grenade", Category::Explosive),
    ("MeleeWeapon", Category::Melee),
    ("Bullet", Category::Ammo),
    ("Totem", Category::Totem),
    ("Gun", Category::Gun),
];

/// Tag name to category lookup.
#[derive(Debug, Clone)]
pub struct Classifier {
    table: HashMap<String, Category>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            table: DEFAULT_TAGS
                .iter()
                .map(|(tag, cat)| (tag.to_ascii_lowercase(), *cat))
                .collect(),
        }
    }
}

impl Classifier {
    pub fn with_rules<'a>(rules: impl IntoIterator<Item = (&'a TagName, Category)>) -> Self {
        let mut classifier = Self::default();
        for (tag, category) in rules {
            classifier.insert(tag, category);
        }
        classifier
    }

    pub fn insert(&mut self, tag: &TagName, category: Category) {
        self.table.insert(tag.to_ascii_lowercase(), category);
    }

    pub fn category_of_tag(&self, tag: &TagName) -> Option<Category> {
        self.table.get(&tag.to_ascii_lowercase()).copied()
    }

    /// First category any of the item's tags maps to.
    pub fn classify(&self, item: &Item) -> Option<Category> {
        item.tags.iter().find_map(|t| self.category_of_tag(t))
    }

    pub fn matches(&self, item: &Item, category: Category) -> bool {
        item.tags
            .iter()
            .any(|t| self.category_of_tag(t) == Some(category))
    }
}

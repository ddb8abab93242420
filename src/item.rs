use derive_more::{AsRef, Deref, Display, From, Into};
use palette::Srgba;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

/// Identity of a single item instance. Two items with the same id are the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
pub struct ItemId(u64);

impl ItemId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Stable type key. Items sharing a key are interchangeable for stacking.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct TypeKey(String);

crate::impl_string_newtype!(TypeKey);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Deref, From, Into, AsRef)]
pub struct ItemName(String);

crate::impl_string_newtype!(ItemName);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct TagName(String);

crate::impl_string_newtype!(TagName);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    EnumString,
    EnumIter,
    StrumDisplay,
)]
#[strum(ascii_case_insensitive)]
pub enum Quality {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Quality {
    /// Background tint used by the presentation layer for a slot holding an item of this quality.
    pub fn color(&self) -> Srgba<f64> {
        match self {
            Self::Common => Srgba::new(0.15, 0.15, 0.15, 0.5),
            Self::Uncommon => Srgba::new(0.2, 0.45, 0.2, 0.6),
            Self::Rare => Srgba::new(0.2, 0.3, 0.7, 0.6),
            Self::Epic => Srgba::new(0.45, 0.2, 0.65, 0.7),
            Self::Legendary => Srgba::new(0.8, 0.55, 0.1, 0.75),
        }
    }
}

/// A snapshot of one host-owned item.
///
/// The wheel never owns items. It holds these clones only until the next refresh and compares
/// them by [`ItemId`] first, then by [`TypeKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub type_key: TypeKey,
    pub name: ItemName,
    pub tags: Vec<TagName>,
    pub quality: Quality,
}

impl Item {
    pub fn new(id: u64, type_key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            type_key: TypeKey::new(type_key),
            name: ItemName::new(name),
            tags: Vec::new(),
            quality: Quality::default(),
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tags.push(TagName::from(tag));
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn is_same(&self, other: &Item) -> bool {
        self.id == other.id
    }

    pub fn is_same_type(&self, other: &Item) -> bool {
        self.type_key == other.type_key
    }
}

//! Catalog records and the views rendered from them.
//!
//! The hierarchy is Menu -> Submenu -> Dish. Records are what the store
//! holds; views are what the read path serializes into the cache.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid price: {0:?}")]
pub struct PriceError(pub String);

/// Decimal price held as an exact number of cents.
///
/// Rendered with exactly two fractional digits. Parsing rounds half-up on the
/// third fractional digit, matching a `DECIMAL(15, 2)` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price {
    cents: i64,
}

impl Price {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Parse a price that may use a comma as decimal separator ("10,50").
    pub fn parse_localized(raw: &str) -> Result<Self, PriceError> {
        raw.trim().replace(',', ".").parse()
    }

    /// Price after taking `percent` off, rounded to the nearest cent.
    ///
    /// The cent amount is exact, so half a cent rounds away from zero:
    /// 0.15 at 50% is 0.08, not the 0.07 a binary float would print.
    pub fn discounted(&self, percent: f64) -> Self {
        let remaining = self.cents as f64 * (100.0 - percent) / 100.0;
        Self {
            cents: remaining.round() as i64,
        }
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PriceError(s.to_string());
        let s = s.trim();

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let units: i64 = int_part.parse().map_err(|_| err())?;
        let frac = frac_part.as_bytes();
        let digit = |i: usize| frac.get(i).map(|b| (b - b'0') as i64).unwrap_or(0);
        let mut cents = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            cents += 1;
        }

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(Price::from_cents)
            .ok_or_else(err)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submenu {
    pub id: String,
    pub menu_id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub submenu_id: String,
    pub title: String,
    pub description: String,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDraft {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuDraft {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishDraft {
    pub title: String,
    pub description: String,
    pub price: Price,
}

/// A fully-formed record (id already minted) written during a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogRecord {
    Menu(Menu),
    Submenu(Submenu),
    Dish(Dish),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Menu,
    Submenu,
    Dish,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Menu => write!(f, "menu"),
            EntityKind::Submenu => write!(f, "submenu"),
            EntityKind::Dish => write!(f, "dish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    /// Creations and deletions change the aggregate counts of the parents.
    pub fn alters_counts(&self) -> bool {
        matches!(self, ChangeKind::Created | ChangeKind::Deleted)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// Addresses an entity together with the ancestors its cache keys embed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Menu {
        menu_id: String,
    },
    Submenu {
        menu_id: String,
        submenu_id: String,
    },
    Dish {
        menu_id: String,
        submenu_id: String,
        dish_id: String,
    },
}

impl EntityRef {
    pub fn menu(menu_id: impl Into<String>) -> Self {
        EntityRef::Menu {
            menu_id: menu_id.into(),
        }
    }

    pub fn submenu(menu_id: impl Into<String>, submenu_id: impl Into<String>) -> Self {
        EntityRef::Submenu {
            menu_id: menu_id.into(),
            submenu_id: submenu_id.into(),
        }
    }

    pub fn dish(
        menu_id: impl Into<String>,
        submenu_id: impl Into<String>,
        dish_id: impl Into<String>,
    ) -> Self {
        EntityRef::Dish {
            menu_id: menu_id.into(),
            submenu_id: submenu_id.into(),
            dish_id: dish_id.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Menu { .. } => EntityKind::Menu,
            EntityRef::Submenu { .. } => EntityKind::Submenu,
            EntityRef::Dish { .. } => EntityKind::Dish,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::Menu { menu_id } => menu_id,
            EntityRef::Submenu { submenu_id, .. } => submenu_id,
            EntityRef::Dish { dish_id, .. } => dish_id,
        }
    }
}

/// Menu with the number of submenus and dishes beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub submenus_count: u64,
    pub dishes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuDetail {
    pub id: String,
    pub menu_id: String,
    pub title: String,
    pub description: String,
    pub dishes_count: u64,
}

/// Dish as shown to readers: the price already has any discount applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishView {
    pub id: String,
    pub submenu_id: String,
    pub title: String,
    pub description: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuTree {
    pub id: String,
    pub menu_id: String,
    pub title: String,
    pub description: String,
    pub dishes_count: u64,
    pub dishes: Vec<DishView>,
}

/// One node of the aggregate "every menu with everything under it" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTree {
    pub id: String,
    pub title: String,
    pub description: String,
    pub submenus: Vec<SubmenuTree>,
}

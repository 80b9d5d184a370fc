//! Cache key layout.
//!
//! Entity ids are UUIDs (hex and `-` only), so `_` is a safe separator and a
//! bare id can never equal one of the fixed names below. The layout is also
//! what a persisted Redis instance holds on disk; changing it orphans entries.

use std::fmt;

use crate::catalog::model::EntityRef;

pub const ALL_MENUS_KEY: &str = "menus";
pub const MENUS_DETAIL_KEY: &str = "menus_detail";
pub const SNAPSHOT_KEY: &str = "table_cache";
pub const DISCOUNT_PREFIX: &str = "discount_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey<'a> {
    /// List of every menu.
    AllMenus,
    /// Every menu with its submenus and dishes.
    MenusDetail,
    /// Last ingested external table.
    Snapshot,
    /// Menu detail with counts.
    Menu { menu_id: &'a str },
    /// Submenus of a menu.
    Submenus { menu_id: &'a str },
    /// Submenu detail with dish count.
    Submenu { submenu_id: &'a str },
    /// Dishes of a submenu.
    Dishes { menu_id: &'a str, submenu_id: &'a str },
    Dish {
        menu_id: &'a str,
        submenu_id: &'a str,
        dish_id: &'a str,
    },
    Discount { dish_id: &'a str },
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllMenus => f.write_str(ALL_MENUS_KEY),
            CacheKey::MenusDetail => f.write_str(MENUS_DETAIL_KEY),
            CacheKey::Snapshot => f.write_str(SNAPSHOT_KEY),
            CacheKey::Menu { menu_id } => f.write_str(menu_id),
            CacheKey::Submenus { menu_id } => write!(f, "{}_submenus", menu_id),
            CacheKey::Submenu { submenu_id } => f.write_str(submenu_id),
            CacheKey::Dishes {
                menu_id,
                submenu_id,
            } => write!(f, "{}_{}_dishes", menu_id, submenu_id),
            CacheKey::Dish {
                menu_id,
                submenu_id,
                dish_id,
            } => write!(f, "{}_{}_{}", menu_id, submenu_id, dish_id),
            CacheKey::Discount { dish_id } => write!(f, "{}{}", DISCOUNT_PREFIX, dish_id),
        }
    }
}

/// Detail key of an entity.
pub fn key_for(entity: &EntityRef) -> String {
    match entity {
        EntityRef::Menu { menu_id } => CacheKey::Menu { menu_id }.to_string(),
        EntityRef::Submenu { submenu_id, .. } => CacheKey::Submenu { submenu_id }.to_string(),
        EntityRef::Dish {
            menu_id,
            submenu_id,
            dish_id,
        } => CacheKey::Dish {
            menu_id,
            submenu_id,
            dish_id,
        }
        .to_string(),
    }
}

/// Key of the list of an entity's children; dishes have none.
pub fn key_for_children(parent: &EntityRef) -> Option<String> {
    match parent {
        EntityRef::Menu { menu_id } => Some(CacheKey::Submenus { menu_id }.to_string()),
        EntityRef::Submenu {
            menu_id,
            submenu_id,
        } => Some(
            CacheKey::Dishes {
                menu_id,
                submenu_id,
            }
            .to_string(),
        ),
        EntityRef::Dish { .. } => None,
    }
}

pub fn discount_key(dish_id: &str) -> String {
    CacheKey::Discount { dish_id }.to_string()
}

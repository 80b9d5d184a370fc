// src/cache/invalidation.rs
//
// Works out which cached views a mutation made stale and deletes them.
//
// The store cascades a menu or submenu delete to its descendants, but their
// cache entries stay behind. Deletions are therefore planned in two steps:
// `plan` walks the subtree while it still exists, the caller deletes the
// rows, then `apply` removes the keys.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::keys::{CacheKey, ALL_MENUS_KEY, MENUS_DETAIL_KEY, SNAPSHOT_KEY};
use super::ReadThroughCache;
use crate::catalog::model::{ChangeKind, EntityRef};
use crate::db::store::CatalogStore;
use crate::monitoring::metrics::CACHE_KEYS_INVALIDATED_TOTAL;

/// Set of keys to delete for one mutation. Order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    keys: BTreeSet<String>,
}

impl InvalidationPlan {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn add(&mut self, key: impl ToString) {
        self.keys.insert(key.to_string());
    }
}

#[derive(Clone)]
pub struct InvalidationEngine {
    cache: ReadThroughCache,
    store: CatalogStore,
}

impl InvalidationEngine {
    pub fn new(cache: ReadThroughCache, store: CatalogStore) -> Self {
        Self { cache, store }
    }

    /// Mutation hook for write paths: plan and apply in one go.
    ///
    /// For `Deleted` this must run before the rows are removed, otherwise the
    /// descendant walk finds nothing. Callers that delete first should use
    /// `plan` + `apply` around the delete.
    pub async fn invalidate(&self, target: &EntityRef, change: ChangeKind) -> usize {
        let plan = self.plan(target, change);
        self.apply(&plan).await
    }

    pub fn plan(&self, target: &EntityRef, change: ChangeKind) -> InvalidationPlan {
        let mut plan = InvalidationPlan::default();

        // A manual write makes the last external table a stale diff basis.
        plan.add(SNAPSHOT_KEY);
        plan.add(MENUS_DETAIL_KEY);

        match target {
            EntityRef::Menu { menu_id } => {
                plan.add(CacheKey::Menu { menu_id });
                plan.add(ALL_MENUS_KEY);
                if change == ChangeKind::Deleted {
                    self.walk_menu(&mut plan, menu_id);
                }
            }
            EntityRef::Submenu {
                menu_id,
                submenu_id,
            } => {
                self.add_submenu_keys(&mut plan, menu_id, submenu_id);
                if change.alters_counts() {
                    plan.add(CacheKey::Menu { menu_id });
                }
                if change == ChangeKind::Deleted {
                    self.walk_submenu(&mut plan, menu_id, submenu_id);
                }
            }
            EntityRef::Dish {
                menu_id,
                submenu_id,
                dish_id,
            } => {
                self.add_dish_keys(&mut plan, menu_id, submenu_id, dish_id);
                plan.add(CacheKey::Dishes {
                    menu_id,
                    submenu_id,
                });
                if change.alters_counts() {
                    plan.add(CacheKey::Submenu { submenu_id });
                    plan.add(CacheKey::Submenus { menu_id });
                    plan.add(CacheKey::Menu { menu_id });
                }
                if change == ChangeKind::Deleted {
                    plan.add(CacheKey::Discount { dish_id });
                }
            }
        }

        debug!(
            kind = %target.kind(),
            id = target.id(),
            change = %change,
            keys = plan.len(),
            "Invalidation planned"
        );
        plan
    }

    /// Delete every planned key. A failed delete is logged and skipped; the
    /// mutation that caused it stands. Returns the number of acknowledged deletes.
    pub async fn apply(&self, plan: &InvalidationPlan) -> usize {
        let mut deleted = 0;
        for key in plan.keys() {
            if self.cache.delete(key).await {
                deleted += 1;
            }
        }
        CACHE_KEYS_INVALIDATED_TOTAL.inc_by(deleted as u64);
        if deleted < plan.len() {
            warn!(
                planned = plan.len(),
                deleted, "Some cache keys could not be invalidated"
            );
        }
        deleted
    }

    /// Drop every cached entry, including discounts and the snapshot.
    pub async fn invalidate_all(&self) -> bool {
        let flushed = self.cache.delete_all().await;
        if flushed {
            info!("All cache entries invalidated");
        }
        flushed
    }

    fn add_submenu_keys(&self, plan: &mut InvalidationPlan, menu_id: &str, submenu_id: &str) {
        plan.add(CacheKey::Submenu { submenu_id });
        plan.add(CacheKey::Submenus { menu_id });
        plan.add(CacheKey::Dishes {
            menu_id,
            submenu_id,
        });
    }

    fn add_dish_keys(
        &self,
        plan: &mut InvalidationPlan,
        menu_id: &str,
        submenu_id: &str,
        dish_id: &str,
    ) {
        plan.add(CacheKey::Dish {
            menu_id,
            submenu_id,
            dish_id,
        });
    }

    /// Every submenu of the menu, and through them every dish.
    fn walk_menu(&self, plan: &mut InvalidationPlan, menu_id: &str) {
        plan.add(CacheKey::Submenus { menu_id });
        let submenus = match self.store.list_submenus(menu_id) {
            Ok(submenus) => submenus,
            Err(e) => {
                warn!(menu_id, error = %e, "Could not list submenus for invalidation");
                return;
            }
        };
        for submenu in submenus {
            self.add_submenu_keys(plan, menu_id, &submenu.id);
            self.walk_submenu(plan, menu_id, &submenu.id);
        }
    }

    /// Every dish of the submenu, with its discount entry.
    fn walk_submenu(&self, plan: &mut InvalidationPlan, menu_id: &str, submenu_id: &str) {
        let dishes = match self.store.list_dishes_of(submenu_id) {
            Ok(dishes) => dishes,
            Err(e) => {
                warn!(submenu_id, error = %e, "Could not list dishes for invalidation");
                return;
            }
        };
        for dish in dishes {
            self.add_dish_keys(plan, menu_id, submenu_id, &dish.id);
            plan.add(CacheKey::Discount { dish_id: &dish.id });
        }
    }
}

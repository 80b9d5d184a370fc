//! Write path. Every successful mutation is followed by invalidation of the
//! cached views it made stale; a mutation that finds nothing to change
//! invalidates nothing.

use tracing::info;

use crate::cache::InvalidationEngine;
use crate::catalog::model::{
    ChangeKind, Dish, DishDraft, EntityRef, Menu, MenuDraft, Submenu, SubmenuDraft,
};
use crate::db::store::{CatalogStore, Result};

#[derive(Clone)]
pub struct CatalogService {
    store: CatalogStore,
    invalidation: InvalidationEngine,
}

impl CatalogService {
    pub fn new(store: CatalogStore, invalidation: InvalidationEngine) -> Self {
        Self {
            store,
            invalidation,
        }
    }

    pub async fn create_menu(&self, draft: &MenuDraft) -> Result<Menu> {
        let menu = self.store.create_menu(draft)?;
        self.invalidation
            .invalidate(&EntityRef::menu(&menu.id), ChangeKind::Created)
            .await;
        Ok(menu)
    }

    pub async fn update_menu(&self, menu_id: &str, draft: &MenuDraft) -> Result<Option<Menu>> {
        let updated = self.store.update_menu(menu_id, draft)?;
        if updated.is_some() {
            self.invalidation
                .invalidate(&EntityRef::menu(menu_id), ChangeKind::Updated)
                .await;
        }
        Ok(updated)
    }

    /// Removes the menu with everything under it.
    pub async fn delete_menu(&self, menu_id: &str) -> Result<bool> {
        let target = EntityRef::menu(menu_id);
        let plan = self.invalidation.plan(&target, ChangeKind::Deleted);
        let deleted = self.store.delete_menu(menu_id)?;
        if deleted {
            let keys = self.invalidation.apply(&plan).await;
            info!(menu_id, keys, "Menu deleted");
        }
        Ok(deleted)
    }

    pub async fn create_submenu(
        &self,
        menu_id: &str,
        draft: &SubmenuDraft,
    ) -> Result<Option<Submenu>> {
        let created = self.store.create_submenu(menu_id, draft)?;
        if let Some(submenu) = &created {
            self.invalidation
                .invalidate(
                    &EntityRef::submenu(menu_id, &submenu.id),
                    ChangeKind::Created,
                )
                .await;
        }
        Ok(created)
    }

    pub async fn update_submenu(
        &self,
        menu_id: &str,
        submenu_id: &str,
        draft: &SubmenuDraft,
    ) -> Result<Option<Submenu>> {
        let updated = self.store.update_submenu(menu_id, submenu_id, draft)?;
        if updated.is_some() {
            self.invalidation
                .invalidate(
                    &EntityRef::submenu(menu_id, submenu_id),
                    ChangeKind::Updated,
                )
                .await;
        }
        Ok(updated)
    }

    pub async fn delete_submenu(&self, menu_id: &str, submenu_id: &str) -> Result<bool> {
        let target = EntityRef::submenu(menu_id, submenu_id);
        let plan = self.invalidation.plan(&target, ChangeKind::Deleted);
        let deleted = self.store.delete_submenu(menu_id, submenu_id)?;
        if deleted {
            let keys = self.invalidation.apply(&plan).await;
            info!(menu_id, submenu_id, keys, "Submenu deleted");
        }
        Ok(deleted)
    }

    pub async fn create_dish(
        &self,
        menu_id: &str,
        submenu_id: &str,
        draft: &DishDraft,
    ) -> Result<Option<Dish>> {
        let created = self.store.create_dish(menu_id, submenu_id, draft)?;
        if let Some(dish) = &created {
            self.invalidation
                .invalidate(
                    &EntityRef::dish(menu_id, submenu_id, &dish.id),
                    ChangeKind::Created,
                )
                .await;
        }
        Ok(created)
    }

    pub async fn update_dish(
        &self,
        menu_id: &str,
        submenu_id: &str,
        dish_id: &str,
        draft: &DishDraft,
    ) -> Result<Option<Dish>> {
        let updated = self
            .store
            .update_dish(menu_id, submenu_id, dish_id, draft)?;
        if updated.is_some() {
            self.invalidation
                .invalidate(
                    &EntityRef::dish(menu_id, submenu_id, dish_id),
                    ChangeKind::Updated,
                )
                .await;
        }
        Ok(updated)
    }

    pub async fn delete_dish(&self, menu_id: &str, submenu_id: &str, dish_id: &str) -> Result<bool> {
        let deleted = self.store.delete_dish(menu_id, submenu_id, dish_id)?;
        if deleted {
            // A dish has no descendants, so planning after the delete loses nothing.
            self.invalidation
                .invalidate(
                    &EntityRef::dish(menu_id, submenu_id, dish_id),
                    ChangeKind::Deleted,
                )
                .await;
        }
        Ok(deleted)
    }
}

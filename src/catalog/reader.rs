//! Read path over the catalog.
//!
//! Every view is looked up in the cache first and, on a miss, loaded from the
//! store and written back. Dishes are cached as stored records and the
//! discount is applied on the way out, so a discount written after a view was
//! cached still shows.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::cache::keys::{key_for, CacheKey};
use crate::cache::{DiscountStore, ReadThroughCache};
use crate::catalog::model::{
    Dish, DishView, EntityRef, Menu, MenuDetail, MenuTree, Submenu, SubmenuDetail, SubmenuTree,
};
use crate::db::store::{CatalogStore, Result};

/// Cached form of the aggregate view, before discounts are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMenuTree {
    menu: Menu,
    submenus: Vec<StoredSubmenuTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSubmenuTree {
    submenu: Submenu,
    dishes: Vec<Dish>,
}

#[derive(Clone)]
pub struct CatalogReader {
    store: CatalogStore,
    cache: ReadThroughCache,
    discounts: DiscountStore,
}

impl CatalogReader {
    pub fn new(store: CatalogStore, cache: ReadThroughCache) -> Self {
        let discounts = DiscountStore::new(cache.clone());
        Self {
            store,
            cache,
            discounts,
        }
    }

    /// Cached value under `key`, else `load()` written back when it found something.
    async fn read_through<T, F>(&self, key: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&CatalogStore) -> Result<Option<T>>,
    {
        if let Some(value) = self.cache.get_json(key).await {
            return Ok(Some(value));
        }
        let loaded = load(&self.store)?;
        match &loaded {
            Some(value) => self.cache.set(key, value).await,
            None => debug!(key, "Not found, nothing cached"),
        }
        Ok(loaded)
    }

    pub async fn menus(&self) -> Result<Vec<Menu>> {
        let menus = self
            .read_through(&CacheKey::AllMenus.to_string(), |store| {
                store.list_menus().map(Some)
            })
            .await?;
        Ok(menus.unwrap_or_default())
    }

    pub async fn menu(&self, menu_id: &str) -> Result<Option<MenuDetail>> {
        self.read_through(&key_for(&EntityRef::menu(menu_id)), |store| {
            store.menu_detail(menu_id)
        })
        .await
    }

    pub async fn submenus(&self, menu_id: &str) -> Result<Vec<SubmenuDetail>> {
        let key = CacheKey::Submenus { menu_id }.to_string();
        let submenus = self
            .read_through(&key, |store| store.list_submenu_details(menu_id).map(Some))
            .await?;
        Ok(submenus.unwrap_or_default())
    }

    pub async fn submenu(&self, menu_id: &str, submenu_id: &str) -> Result<Option<SubmenuDetail>> {
        let key = key_for(&EntityRef::submenu(menu_id, submenu_id));
        let detail: Option<SubmenuDetail> = self
            .read_through(&key, |store| store.submenu_detail(menu_id, submenu_id))
            .await?;
        // The key carries no menu id; a hit for another menu's submenu is a miss.
        Ok(detail.filter(|d| d.menu_id == menu_id))
    }

    pub async fn dishes(&self, menu_id: &str, submenu_id: &str) -> Result<Vec<DishView>> {
        let key = CacheKey::Dishes {
            menu_id,
            submenu_id,
        }
        .to_string();
        let dishes: Vec<Dish> = self
            .read_through(&key, |store| store.list_dishes(menu_id, submenu_id).map(Some))
            .await?
            .unwrap_or_default();
        Ok(self.discounts.render_all(&dishes).await)
    }

    pub async fn dish(
        &self,
        menu_id: &str,
        submenu_id: &str,
        dish_id: &str,
    ) -> Result<Option<DishView>> {
        let key = key_for(&EntityRef::dish(menu_id, submenu_id, dish_id));
        let dish: Option<Dish> = self
            .read_through(&key, |store| store.get_dish(menu_id, submenu_id, dish_id))
            .await?;
        match dish {
            Some(dish) => Ok(Some(self.discounts.render(&dish).await)),
            None => Ok(None),
        }
    }

    /// Every menu with its submenus and their dishes.
    pub async fn menus_detail(&self) -> Result<Vec<MenuTree>> {
        let trees: Vec<StoredMenuTree> = self
            .read_through(&CacheKey::MenusDetail.to_string(), |store| {
                load_trees(store).map(Some)
            })
            .await?
            .unwrap_or_default();

        let mut rendered = Vec::with_capacity(trees.len());
        for tree in trees {
            let mut submenus = Vec::with_capacity(tree.submenus.len());
            for sub in tree.submenus {
                submenus.push(SubmenuTree {
                    dishes_count: sub.dishes.len() as u64,
                    dishes: self.discounts.render_all(&sub.dishes).await,
                    id: sub.submenu.id,
                    menu_id: sub.submenu.menu_id,
                    title: sub.submenu.title,
                    description: sub.submenu.description,
                });
            }
            rendered.push(MenuTree {
                id: tree.menu.id,
                title: tree.menu.title,
                description: tree.menu.description,
                submenus,
            });
        }
        Ok(rendered)
    }
}

fn load_trees(store: &CatalogStore) -> Result<Vec<StoredMenuTree>> {
    let mut trees = Vec::new();
    for menu in store.list_menus()? {
        let mut submenus = Vec::new();
        for submenu in store.list_submenus(&menu.id)? {
            let dishes = store.list_dishes_of(&submenu.id)?;
            submenus.push(StoredSubmenuTree { submenu, dishes });
        }
        trees.push(StoredMenuTree { menu, submenus });
    }
    Ok(trees)
}

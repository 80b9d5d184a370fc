//! SQLite-backed catalog store.
//!
//! Every lookup of a child is scoped by its parent ids, so a submenu id paired
//! with the wrong menu id reads as "not found". Deleting a menu or submenu
//! relies on the schema's `ON DELETE CASCADE`; cached views of the removed
//! descendants are the invalidation engine's business, not the store's.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::model::{
    CatalogRecord, Dish, DishDraft, Menu, MenuDetail, MenuDraft, Price, Submenu, SubmenuDetail,
    SubmenuDraft,
};
use crate::db::schema_init::SchemaInitializer;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CatalogCounts {
    pub menus: u64,
    pub submenus: u64,
    pub dishes: u64,
}

#[derive(Clone)]
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        SchemaInitializer::open(path)
            .map(Self::from_connection)
            .map_err(db_err)
    }

    pub fn open_in_memory() -> Result<Self> {
        SchemaInitializer::open_in_memory()
            .map(Self::from_connection)
            .map_err(db_err)
    }

    /// Wrap a connection that already has the schema applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    // ---- menus ----

    pub fn create_menu(&self, draft: &MenuDraft) -> Result<Menu> {
        let menu = Menu {
            id: new_id(),
            title: draft.title.clone(),
            description: draft.description.clone(),
        };
        let conn = self.conn.lock();
        insert_menu(&conn, &menu)?;
        debug!(menu_id = %menu.id, "Menu created");
        Ok(menu)
    }

    pub fn list_menus(&self) -> Result<Vec<Menu>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, title, description FROM menus ORDER BY rowid")
            .map_err(db_err)?;
        let menus = stmt
            .query_map([], menu_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(menus)
    }

    pub fn get_menu(&self, menu_id: &str) -> Result<Option<Menu>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, title, description FROM menus WHERE id = ?1",
            [menu_id],
            menu_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn menu_detail(&self, menu_id: &str) -> Result<Option<MenuDetail>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT m.id, m.title, m.description,
                    (SELECT COUNT(*) FROM submenus s WHERE s.menu_id = m.id),
                    (SELECT COUNT(*) FROM dishes d
                       JOIN submenus s ON d.submenu_id = s.id
                      WHERE s.menu_id = m.id)
               FROM menus m WHERE m.id = ?1",
            [menu_id],
            |row| {
                Ok(MenuDetail {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    submenus_count: row.get::<_, i64>(3)? as u64,
                    dishes_count: row.get::<_, i64>(4)? as u64,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    pub fn update_menu(&self, menu_id: &str, draft: &MenuDraft) -> Result<Option<Menu>> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE menus SET title = ?1, description = ?2 WHERE id = ?3",
                params![draft.title, draft.description, menu_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(Menu {
            id: menu_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
        }))
    }

    pub fn delete_menu(&self, menu_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM menus WHERE id = ?1", [menu_id])
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    // ---- submenus ----

    /// Returns `None` when the parent menu does not exist.
    pub fn create_submenu(&self, menu_id: &str, draft: &SubmenuDraft) -> Result<Option<Submenu>> {
        let conn = self.conn.lock();
        if !exists(&conn, "SELECT 1 FROM menus WHERE id = ?1", params![menu_id])? {
            return Ok(None);
        }
        let submenu = Submenu {
            id: new_id(),
            menu_id: menu_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
        };
        insert_submenu(&conn, &submenu)?;
        debug!(menu_id, submenu_id = %submenu.id, "Submenu created");
        Ok(Some(submenu))
    }

    pub fn list_submenus(&self, menu_id: &str) -> Result<Vec<Submenu>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, menu_id, title, description FROM submenus
                  WHERE menu_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;
        let submenus = stmt
            .query_map([menu_id], submenu_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(submenus)
    }

    pub fn list_submenu_details(&self, menu_id: &str) -> Result<Vec<SubmenuDetail>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.menu_id, s.title, s.description,
                        (SELECT COUNT(*) FROM dishes d WHERE d.submenu_id = s.id)
                   FROM submenus s WHERE s.menu_id = ?1 ORDER BY s.rowid",
            )
            .map_err(db_err)?;
        let details = stmt
            .query_map([menu_id], submenu_detail_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(details)
    }

    pub fn get_submenu(&self, menu_id: &str, submenu_id: &str) -> Result<Option<Submenu>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, menu_id, title, description FROM submenus
              WHERE menu_id = ?1 AND id = ?2",
            params![menu_id, submenu_id],
            submenu_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn submenu_detail(&self, menu_id: &str, submenu_id: &str) -> Result<Option<SubmenuDetail>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT s.id, s.menu_id, s.title, s.description,
                    (SELECT COUNT(*) FROM dishes d WHERE d.submenu_id = s.id)
               FROM submenus s WHERE s.menu_id = ?1 AND s.id = ?2",
            params![menu_id, submenu_id],
            submenu_detail_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn update_submenu(
        &self,
        menu_id: &str,
        submenu_id: &str,
        draft: &SubmenuDraft,
    ) -> Result<Option<Submenu>> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE submenus SET title = ?1, description = ?2
                  WHERE menu_id = ?3 AND id = ?4",
                params![draft.title, draft.description, menu_id, submenu_id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(Submenu {
            id: submenu_id.to_string(),
            menu_id: menu_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
        }))
    }

    pub fn delete_submenu(&self, menu_id: &str, submenu_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM submenus WHERE menu_id = ?1 AND id = ?2",
                params![menu_id, submenu_id],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    // ---- dishes ----

    /// Returns `None` when the submenu does not exist under `menu_id`.
    pub fn create_dish(
        &self,
        menu_id: &str,
        submenu_id: &str,
        draft: &DishDraft,
    ) -> Result<Option<Dish>> {
        let conn = self.conn.lock();
        if !exists(
            &conn,
            "SELECT 1 FROM submenus WHERE menu_id = ?1 AND id = ?2",
            params![menu_id, submenu_id],
        )? {
            return Ok(None);
        }
        let dish = Dish {
            id: new_id(),
            submenu_id: submenu_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            price: draft.price,
        };
        insert_dish(&conn, &dish)?;
        debug!(submenu_id, dish_id = %dish.id, "Dish created");
        Ok(Some(dish))
    }

    pub fn list_dishes(&self, menu_id: &str, submenu_id: &str) -> Result<Vec<Dish>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.submenu_id, d.title, d.description, d.price_cents
                   FROM dishes d JOIN submenus s ON d.submenu_id = s.id
                  WHERE s.menu_id = ?1 AND d.submenu_id = ?2
                  ORDER BY d.rowid",
            )
            .map_err(db_err)?;
        let dishes = stmt
            .query_map(params![menu_id, submenu_id], dish_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(dishes)
    }

    /// Dishes of a submenu without checking which menu owns it.
    pub fn list_dishes_of(&self, submenu_id: &str) -> Result<Vec<Dish>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, submenu_id, title, description, price_cents
                   FROM dishes WHERE submenu_id = ?1 ORDER BY rowid",
            )
            .map_err(db_err)?;
        let dishes = stmt
            .query_map([submenu_id], dish_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(dishes)
    }

    pub fn get_dish(&self, menu_id: &str, submenu_id: &str, dish_id: &str) -> Result<Option<Dish>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT d.id, d.submenu_id, d.title, d.description, d.price_cents
               FROM dishes d JOIN submenus s ON d.submenu_id = s.id
              WHERE s.menu_id = ?1 AND d.submenu_id = ?2 AND d.id = ?3",
            params![menu_id, submenu_id, dish_id],
            dish_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    pub fn update_dish(
        &self,
        menu_id: &str,
        submenu_id: &str,
        dish_id: &str,
        draft: &DishDraft,
    ) -> Result<Option<Dish>> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE dishes SET title = ?1, description = ?2, price_cents = ?3
                  WHERE id = ?4 AND submenu_id = ?5
                    AND submenu_id IN (SELECT id FROM submenus WHERE menu_id = ?6)",
                params![
                    draft.title,
                    draft.description,
                    draft.price.cents(),
                    dish_id,
                    submenu_id,
                    menu_id
                ],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Ok(None);
        }
        Ok(Some(Dish {
            id: dish_id.to_string(),
            submenu_id: submenu_id.to_string(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            price: draft.price,
        }))
    }

    pub fn delete_dish(&self, menu_id: &str, submenu_id: &str, dish_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM dishes
                  WHERE id = ?1 AND submenu_id = ?2
                    AND submenu_id IN (SELECT id FROM submenus WHERE menu_id = ?3)",
                params![dish_id, submenu_id, menu_id],
            )
            .map_err(db_err)?;
        Ok(deleted > 0)
    }

    // ---- whole catalog ----

    /// Wipe the catalog and write `records` in their given order, atomically.
    ///
    /// Parents must precede their children in `records`. On any failure the
    /// transaction rolls back and the previous catalog is left as it was.
    pub fn replace_catalog(&self, records: &[CatalogRecord]) -> Result<CatalogCounts> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;

        let wiped = tx.execute("DELETE FROM menus", []).map_err(db_err)?;

        let mut counts = CatalogCounts::default();
        for record in records {
            match record {
                CatalogRecord::Menu(menu) => {
                    insert_menu(&tx, menu)?;
                    counts.menus += 1;
                }
                CatalogRecord::Submenu(submenu) => {
                    insert_submenu(&tx, submenu)?;
                    counts.submenus += 1;
                }
                CatalogRecord::Dish(dish) => {
                    insert_dish(&tx, dish)?;
                    counts.dishes += 1;
                }
            }
        }

        tx.commit().map_err(db_err)?;
        info!(
            wiped_menus = wiped,
            menus = counts.menus,
            submenus = counts.submenus,
            dishes = counts.dishes,
            "Catalog replaced"
        );
        Ok(counts)
    }

    pub fn counts(&self) -> Result<CatalogCounts> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(db_err)
        };
        Ok(CatalogCounts {
            menus: count("menus")?,
            submenus: count("submenus")?,
            dishes: count("dishes")?,
        })
    }
}

fn exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
    conn.query_row(sql, params, |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(db_err)
}

fn insert_menu(conn: &Connection, menu: &Menu) -> Result<()> {
    conn.execute(
        "INSERT INTO menus (id, title, description) VALUES (?1, ?2, ?3)",
        params![menu.id, menu.title, menu.description],
    )
    .map_err(db_err)?;
    Ok(())
}

fn insert_submenu(conn: &Connection, submenu: &Submenu) -> Result<()> {
    conn.execute(
        "INSERT INTO submenus (id, menu_id, title, description) VALUES (?1, ?2, ?3, ?4)",
        params![submenu.id, submenu.menu_id, submenu.title, submenu.description],
    )
    .map_err(db_err)?;
    Ok(())
}

fn insert_dish(conn: &Connection, dish: &Dish) -> Result<()> {
    conn.execute(
        "INSERT INTO dishes (id, submenu_id, title, description, price_cents)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            dish.id,
            dish.submenu_id,
            dish.title,
            dish.description,
            dish.price.cents()
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn menu_from_row(row: &Row<'_>) -> rusqlite::Result<Menu> {
    Ok(Menu {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
    })
}

fn submenu_from_row(row: &Row<'_>) -> rusqlite::Result<Submenu> {
    Ok(Submenu {
        id: row.get(0)?,
        menu_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
    })
}

fn submenu_detail_from_row(row: &Row<'_>) -> rusqlite::Result<SubmenuDetail> {
    Ok(SubmenuDetail {
        id: row.get(0)?,
        menu_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        dishes_count: row.get::<_, i64>(4)? as u64,
    })
}

fn dish_from_row(row: &Row<'_>) -> rusqlite::Result<Dish> {
    Ok(Dish {
        id: row.get(0)?,
        submenu_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: Price::from_cents(row.get(4)?),
    })
}

// src/db/schema_init.rs
use rusqlite::{Connection, Result as SqlResult};
use std::path::Path;
use tracing::info;

pub struct SchemaInitializer;

impl SchemaInitializer {
    /// Create the catalog tables if missing and turn on foreign keys.
    ///
    /// `foreign_keys` is a per-connection pragma, so this must run on every
    /// connection that deletes menus or submenus, or the cascade is skipped.
    pub fn init(db_conn: &Connection) -> SqlResult<()> {
        info!("Initializing catalog schema");
        let schema_sql = include_str!("schema.sql");
        db_conn.execute_batch(schema_sql)?;
        info!("Catalog schema initialized");
        Ok(())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Connection> {
        let path = path.as_ref();
        info!("Opening catalog database at: {}", path.display());
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(conn)
    }

    pub fn open_in_memory() -> SqlResult<Connection> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(conn)
    }
}

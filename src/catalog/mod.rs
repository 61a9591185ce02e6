// SPDX-License-Identifier: MIT OR Apache-2.0
//! The embedded Firmware Catalog: a `rusqlite` database under the per-user
//! configuration directory, with tables for boards, firmwares, and a schema
//! version marker.
//!
//! This is the newest of the schema variants described in the design notes --
//! composite keys, a foreign key from firmwares to boards, no flat legacy
//! table. The catalog is opened through short, scoped transactions; there is
//! no long-lived transaction held across worklist items.

pub mod board;
pub mod firmware;
pub mod rewrite;

use std::path::Path;

use rusqlite::Connection;

use crate::error::{ErrorKind, Result};

pub use board::Board;
pub use firmware::Firmware;

const SCHEMA_VERSION: &str = "2";

pub struct Catalog
{
    conn: Connection,
}

impl Catalog
{
    /// Open (creating if necessary) the catalog database at `path`, running the
    /// schema migration if this is a fresh file.
    pub fn open(path: &Path) -> Result<Self>
    {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|_| ErrorKind::CatalogUnavailable.error())?;
        let catalog = Self { conn };
        catalog.migrate()?;
        Ok(catalog)
    }

    /// An in-memory catalog, used by tests and by `list`/`flash --force` dry runs.
    pub fn open_in_memory() -> Result<Self>
    {
        let conn = Connection::open_in_memory()?;
        let catalog = Self { conn };
        catalog.migrate()?;
        Ok(catalog)
    }

    fn migrate(&self) -> Result<()>
    {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
                name  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS boards (
                board_id    TEXT NOT NULL,
                version     TEXT NOT NULL,
                board_name  TEXT NOT NULL,
                mcu         TEXT NOT NULL,
                variant     TEXT NOT NULL DEFAULT '',
                port        TEXT NOT NULL,
                path        TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                family      TEXT NOT NULL DEFAULT 'micropython',
                custom      INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (board_id, version)
            );
            CREATE TABLE IF NOT EXISTS firmwares (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                board_id      TEXT NOT NULL,
                version       TEXT NOT NULL,
                port          TEXT NOT NULL,
                description   TEXT NOT NULL DEFAULT '',
                firmware_file TEXT NOT NULL UNIQUE,
                source        TEXT NOT NULL DEFAULT '',
                build         INTEGER NOT NULL DEFAULT 0,
                custom        INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (board_id, version) REFERENCES boards (board_id, version)
            );
            CREATE INDEX IF NOT EXISTS idx_firmwares_board_version ON firmwares (board_id, version);
            ",
        )?;

        self.conn.execute(
            "INSERT INTO metadata (name, value) VALUES ('schema_version', ?1)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            [SCHEMA_VERSION],
        )?;

        Ok(())
    }

    pub(crate) fn connection(&self) -> &Connection
    {
        &self.conn
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn fresh_catalog_records_schema_version()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        let version: String = catalog
            .connection()
            .query_row("SELECT value FROM metadata WHERE name = 'schema_version'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}

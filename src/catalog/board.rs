// SPDX-License-Identifier: MIT OR Apache-2.0
//! Board Registry (§4.3): the `boards` table and description-based resolution.

use rusqlite::{params, OptionalExtension};

use super::Catalog;
use crate::error::Result;

pub const UNKNOWN_BOARD: &str = "UNKNOWN_BOARD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board
{
    pub board_id: String,
    pub version: String,
    pub board_name: String,
    pub mcu: String,
    pub variant: String,
    pub port: String,
    pub path: String,
    pub description: String,
    pub family: String,
    pub custom: bool,
}

impl Catalog
{
    pub fn upsert_board(&self, board: &Board) -> Result<()>
    {
        self.connection().execute(
            "INSERT INTO boards (board_id, version, board_name, mcu, variant, port, path, description, family, custom)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(board_id, version) DO UPDATE SET
                board_name = excluded.board_name, mcu = excluded.mcu, variant = excluded.variant,
                port = excluded.port, path = excluded.path, description = excluded.description,
                family = excluded.family, custom = excluded.custom",
            params![
                board.board_id,
                board.version,
                board.board_name,
                board.mcu,
                board.variant,
                board.port,
                board.path,
                board.description,
                board.family,
                board.custom as i64,
            ],
        )?;
        Ok(())
    }

    pub fn find_board_by_identifier(&self, board_id: &str, version: &str) -> Result<Vec<Board>>
    {
        let mut stmt = self.connection().prepare(
            "SELECT board_id, version, board_name, mcu, variant, port, path, description, family, custom
             FROM boards WHERE board_id = ?1 AND version = ?2
             ORDER BY board_id ASC, version DESC",
        )?;
        let rows = stmt.query_map(params![board_id, version], row_to_board)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn known_ports(&self, version: &str) -> Result<Vec<String>>
    {
        let mut stmt = self.connection().prepare("SELECT DISTINCT port FROM boards WHERE version = ?1 ORDER BY port")?;
        let rows = stmt.query_map([version], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn known_boards_for_port(&self, port: &str, version: &str) -> Result<Vec<Board>>
    {
        let mut stmt = self.connection().prepare(
            "SELECT board_id, version, board_name, mcu, variant, port, path, description, family, custom
             FROM boards WHERE port = ?1 AND version = ?2
             ORDER BY board_id ASC, version DESC",
        )?;
        let rows = stmt.query_map(params![port, version], row_to_board)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Resolve a board identifier from a device-reported description, per §4.3.
    ///
    /// Tries `{description, short_description}` and their `Generic `-stripped
    /// variants at `version` first, then retries at any version. Returns
    /// [UNKNOWN_BOARD] rather than an error on total failure.
    pub fn resolve_by_description(&self, description: &str, short_description: &str, version: &str) -> Result<String>
    {
        let candidates = description_candidates(description, short_description);

        if let Some(id) = self.find_board_id_by_descriptions(&candidates, version)? {
            return Ok(id);
        }
        if let Some(id) = self.find_board_id_by_descriptions(&candidates, "%")? {
            return Ok(id);
        }
        Ok(UNKNOWN_BOARD.to_string())
    }

    fn find_board_id_by_descriptions(&self, candidates: &[String], version: &str) -> Result<Option<String>>
    {
        let version_clause = if version == "%" { "description = ?1" } else { "description = ?1 AND version = ?2" };
        let sql = format!(
            "SELECT board_id FROM boards WHERE {} ORDER BY board_id ASC, version DESC LIMIT 1",
            version_clause
        );

        for candidate in candidates {
            let mut stmt = self.connection().prepare(&sql)?;
            let id: Option<String> = if version == "%" {
                stmt.query_row(params![candidate], |row| row.get(0)).optional()?
            } else {
                stmt.query_row(params![candidate, version], |row| row.get(0)).optional()?
            };
            if id.is_some() {
                return Ok(id);
            }
        }
        Ok(None)
    }
}

/// Build the `{descr, short_descr, descr without "Generic ", short without "Generic "}`
/// candidate list, preserving order and skipping duplicates.
fn description_candidates(description: &str, short_description: &str) -> Vec<String>
{
    const GENERIC_PREFIX: &str = "Generic ";
    let mut candidates = Vec::new();

    for candidate in [description, short_description] {
        if candidate.is_empty() {
            continue;
        }
        if !candidates.contains(&candidate.to_string()) {
            candidates.push(candidate.to_string());
        }
        if let Some(stripped) = candidate.strip_prefix(GENERIC_PREFIX) {
            if !candidates.iter().any(|c| c == stripped) {
                candidates.push(stripped.to_string());
            }
        }
    }

    candidates
}

fn row_to_board(row: &rusqlite::Row) -> rusqlite::Result<Board>
{
    Ok(Board {
        board_id: row.get(0)?,
        version: row.get(1)?,
        board_name: row.get(2)?,
        mcu: row.get(3)?,
        variant: row.get(4)?,
        port: row.get(5)?,
        path: row.get(6)?,
        description: row.get(7)?,
        family: row.get(8)?,
        custom: row.get::<_, i64>(9)? != 0,
    })
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn sample_board(description: &str) -> Board
    {
        Board {
            board_id: "NUCLEO_WB55".to_string(),
            version: "1.22.0".to_string(),
            board_name: "NUCLEO-WB55".to_string(),
            mcu: "STM32WB55RGV6".to_string(),
            variant: String::new(),
            port: "stm32".to_string(),
            path: "boards/NUCLEO_WB55".to_string(),
            description: description.to_string(),
            family: "micropython".to_string(),
            custom: false,
        }
    }

    #[test]
    fn description_candidates_include_generic_stripped_variants()
    {
        let candidates = description_candidates("Generic ESP32 module", "ESP32");
        assert_eq!(candidates, vec!["Generic ESP32 module", "ESP32 module", "ESP32"]);
    }

    #[test]
    fn resolves_exact_description_at_version()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.upsert_board(&sample_board("NUCLEO-WB55 with STM32WB55RGV6")).unwrap();

        let resolved = catalog.resolve_by_description("NUCLEO-WB55 with STM32WB55RGV6", "", "1.22.0").unwrap();
        assert_eq!(resolved, "NUCLEO_WB55");
    }

    #[test]
    fn falls_back_to_any_version_then_unknown()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.upsert_board(&sample_board("NUCLEO-WB55 with STM32WB55RGV6")).unwrap();

        // Wrong version at first, but any-version retry should still find it.
        let resolved = catalog.resolve_by_description("NUCLEO-WB55 with STM32WB55RGV6", "", "9.9.9").unwrap();
        assert_eq!(resolved, "NUCLEO_WB55");

        let unresolved = catalog.resolve_by_description("totally unknown board", "", "1.22.0").unwrap();
        assert_eq!(unresolved, UNKNOWN_BOARD);
    }
}

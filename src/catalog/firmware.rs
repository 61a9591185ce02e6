// SPDX-License-Identifier: MIT OR Apache-2.0
//! Firmware Catalog (§4.4): the `firmwares` table, preview-version selection,
//! and the alternate-board-identifier retry.

use std::path::Path;

use rusqlite::{params, OptionalExtension};

use super::rewrite::alternate_board_id;
use super::Catalog;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firmware
{
    pub id: i64,
    pub board_id: String,
    pub version: String,
    pub port: String,
    pub description: String,
    pub firmware_file: String,
    pub source: String,
    pub build: i64,
    pub custom: bool,
}

impl Firmware
{
    /// True if the artifact path contains the substring `preview`.
    pub fn preview(&self) -> bool
    {
        self.firmware_file.contains("preview")
    }

    /// The file suffix of the artifact path, including the leading dot.
    pub fn ext(&self) -> &str
    {
        match Path::new(&self.firmware_file).extension() {
            Some(ext) => {
                let offset = self.firmware_file.len() - ext.len();
                &self.firmware_file[offset - 1..]
            },
            None => "",
        }
    }
}

impl Catalog
{
    pub fn upsert_firmware(&self, board: &super::Board, firmware: &Firmware) -> Result<()>
    {
        self.upsert_board(board)?;
        self.connection().execute(
            "INSERT INTO firmwares (board_id, version, port, description, firmware_file, source, build, custom)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(firmware_file) DO UPDATE SET
                board_id = excluded.board_id, version = excluded.version, port = excluded.port,
                description = excluded.description, source = excluded.source, build = excluded.build,
                custom = excluded.custom",
            params![
                firmware.board_id,
                firmware.version,
                firmware.port,
                firmware.description,
                firmware.firmware_file,
                firmware.source,
                firmware.build,
                firmware.custom as i64,
            ],
        )?;
        Ok(())
    }

    /// Primary match plus the alternate-board-identifier retry (§4.4).
    pub fn find_firmware(&self, board_id: &str, version: &str, port: &str) -> Result<Vec<Firmware>>
    {
        let primary = self.find_firmware_exact(board_id, version)?;
        if !primary.is_empty() {
            return Ok(primary);
        }

        match alternate_board_id(board_id, port) {
            Some(alternate) => self.find_firmware_exact(&alternate, version),
            None => Ok(Vec::new()),
        }
    }

    fn find_firmware_exact(&self, board_id: &str, version: &str) -> Result<Vec<Firmware>>
    {
        if version.contains("preview") {
            let mut stmt = self.connection().prepare(
                "SELECT id, board_id, version, port, description, firmware_file, source, build, custom
                 FROM firmwares
                 WHERE board_id = ?1 AND firmware_file LIKE '%preview%'
                 ORDER BY build DESC LIMIT 1",
            )?;
            let found = stmt.query_row(params![board_id], row_to_firmware).optional()?;
            return Ok(found.into_iter().collect());
        }

        let mut stmt = self.connection().prepare(
            "SELECT id, board_id, version, port, description, firmware_file, source, build, custom
             FROM firmwares WHERE board_id = ?1 AND version = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![board_id, version], row_to_firmware)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn row_to_firmware(row: &rusqlite::Row) -> rusqlite::Result<Firmware>
{
    Ok(Firmware {
        id: row.get(0)?,
        board_id: row.get(1)?,
        version: row.get(2)?,
        port: row.get(3)?,
        description: row.get(4)?,
        firmware_file: row.get(5)?,
        source: row.get(6)?,
        build: row.get(7)?,
        custom: row.get::<_, i64>(8)? != 0,
    })
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::catalog::Board;

    fn sample_board() -> Board
    {
        Board {
            board_id: "ESP32_GENERIC".to_string(),
            version: "preview".to_string(),
            board_name: "ESP32 generic".to_string(),
            mcu: "ESP32".to_string(),
            variant: String::new(),
            port: "esp32".to_string(),
            path: String::new(),
            description: String::new(),
            family: "micropython".to_string(),
            custom: false,
        }
    }

    fn firmware(file: &str, build: i64) -> Firmware
    {
        Firmware {
            id: 0,
            board_id: "ESP32_GENERIC".to_string(),
            version: "preview".to_string(),
            port: "esp32".to_string(),
            description: String::new(),
            firmware_file: file.to_string(),
            source: "https://example.invalid".to_string(),
            build,
            custom: false,
        }
    }

    #[test]
    fn preview_version_returns_only_highest_build()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.upsert_firmware(&sample_board(), &firmware("esp32/preview/ESP32_GENERIC-1234.bin", 1234)).unwrap();
        catalog.upsert_firmware(&sample_board(), &firmware("esp32/preview/ESP32_GENERIC-1240.bin", 1240)).unwrap();

        let found = catalog.find_firmware("ESP32_GENERIC", "preview", "esp32").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].build, 1240);
        assert!(found[0].preview());
    }

    #[test]
    fn rewrite_retry_finds_firmware_under_alternate_id()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        let mut board = sample_board();
        board.board_id = "RPI_PICO".to_string();
        board.version = "1.22.0".to_string();
        board.port = "rp2".to_string();
        let mut fw = firmware("rp2/RPI_PICO-1.22.0.uf2", 0);
        fw.board_id = "RPI_PICO".to_string();
        fw.version = "1.22.0".to_string();
        fw.port = "rp2".to_string();
        catalog.upsert_firmware(&board, &fw).unwrap();

        let found = catalog.find_firmware("PICO", "1.22.0", "rp2").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].firmware_file, "rp2/RPI_PICO-1.22.0.uf2");
    }

    #[test]
    fn extension_and_upsert_roundtrip()
    {
        let catalog = Catalog::open_in_memory().unwrap();
        let mut board = sample_board();
        board.version = "1.22.0".to_string();
        let mut fw = firmware("stm32/NUCLEO_WB55-1.22.0.dfu", 0);
        fw.board_id = "NUCLEO_WB55".to_string();
        fw.version = "1.22.0".to_string();
        board.board_id = "NUCLEO_WB55".to_string();
        catalog.upsert_firmware(&board, &fw).unwrap();

        let found = catalog.find_firmware("NUCLEO_WB55", "1.22.0", "stm32").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ext(), ".dfu");
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! `download`: fetch firmware into the local catalog without flashing anything.

use clap::Args;
use color_eyre::eyre::Result;
use log::info;
use mpflash::catalog::{Board, Catalog, Firmware};
use mpflash::config::Config;
use mpflash::firmware_download;
use reqwest::blocking::Client;

#[derive(Args)]
pub struct DownloadArguments
{
    /// MicroPython version to download: a semver, "stable", or "preview"
    #[arg(long = "version", default_value = "stable")]
    pub version: String,

    /// Restrict to these MicroPython ports
    #[arg(long = "port")]
    pub port: Vec<String>,

    /// Restrict to this board identifier
    #[arg(long = "board")]
    pub board: Option<String>,

    /// Release-index URL to fetch board/firmware metadata from
    #[arg(long = "index-url", default_value = "https://micropython.org/resources/firmware/index.json")]
    pub index_url: String,

    /// Mark the downloaded firmware as custom in the catalog
    #[arg(long = "custom", default_value_t = false)]
    pub custom: bool,
}

pub fn run(config: &Config, args: &DownloadArguments) -> Result<()>
{
    let catalog = Catalog::open(&config.catalog_path())?;
    let client = Client::builder().build()?;

    let index_path = config.config_dir.join("release_index.json");
    let changed = firmware_download::download_cached(&client, &args.index_url, &index_path)?;
    if !changed {
        info!("release index is already up to date");
    }

    let index: Vec<IndexEntry> = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;

    for entry in index.into_iter().filter(|e| matches(e, args)) {
        let artifact_destination = config.resolve_artifact(&entry.firmware_file);
        firmware_download::download_cached(&client, &entry.url, &artifact_destination)?;

        let board = Board {
            board_id: entry.board_id.clone(),
            version: entry.version.clone(),
            board_name: entry.board_name.clone(),
            mcu: entry.mcu.clone(),
            variant: entry.variant.clone().unwrap_or_default(),
            port: entry.port.clone(),
            path: entry.path.clone().unwrap_or_default(),
            description: entry.description.clone(),
            family: "micropython".to_string(),
            custom: args.custom,
        };
        let firmware = Firmware {
            id: 0,
            board_id: entry.board_id.clone(),
            version: entry.version.clone(),
            port: entry.port.clone(),
            description: entry.description.clone(),
            firmware_file: entry.firmware_file.clone(),
            source: entry.url.clone(),
            build: entry.build.unwrap_or(0),
            custom: args.custom,
        };

        catalog.upsert_firmware(&board, &firmware)?;
        info!("catalogued {} {} ({})", entry.board_id, entry.version, entry.port);
    }

    Ok(())
}

fn matches(entry: &IndexEntry, args: &DownloadArguments) -> bool
{
    if entry.version != args.version {
        return false;
    }
    if !args.port.is_empty() && !args.port.contains(&entry.port) {
        return false;
    }
    if let Some(board) = &args.board {
        if &entry.board_id != board {
            return false;
        }
    }
    true
}

#[derive(serde::Deserialize)]
struct IndexEntry
{
    board_id: String,
    version: String,
    board_name: String,
    mcu: String,
    variant: Option<String>,
    port: String,
    path: Option<String>,
    description: String,
    firmware_file: String,
    url: String,
    build: Option<i64>,
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! `list`: show known boards in the catalog, or devices currently attached.

use clap::Args;
use color_eyre::eyre::Result;
use log::info;
use mpflash::catalog::Catalog;
use mpflash::config::Config;
use mpflash::{enumerator, introspect};

use super::DeviceSelection;

#[derive(Args)]
pub struct ListArguments
{
    #[command(flatten)]
    pub selection: DeviceSelection,

    /// List catalog boards for this MicroPython version instead of attached devices
    #[arg(long = "catalog")]
    pub catalog_version: Option<String>,
}

pub fn run(config: &Config, args: &ListArguments) -> Result<()>
{
    if let Some(version) = &args.catalog_version {
        return list_catalog(config, version);
    }

    let include = if args.selection.serial.is_empty() { vec!["*".to_string()] } else { args.selection.serial.clone() };
    let mut ignore = config.ignore.clone();
    ignore.extend(args.selection.ignore.iter().cloned());

    let ports = enumerator::enumerate_ports(&include, &ignore, args.selection.bluetooth)?;
    if ports.is_empty() {
        println!("No matching serial ports found.");
        return Ok(());
    }

    for port in ports {
        match introspect::introspect(&port) {
            Ok(device) => {
                if super::port_allowed(&args.selection.port, &device.port) {
                    println!("{device}");
                }
            },
            Err(e) => println!("{port}: could not introspect ({e})"),
        }
    }

    Ok(())
}

fn list_catalog(config: &Config, version: &str) -> Result<()>
{
    let catalog = Catalog::open(&config.catalog_path())?;
    let ports = catalog.known_ports(version)?;
    if ports.is_empty() {
        println!("No boards known for version {version}.");
        return Ok(());
    }

    for port in ports {
        let boards = catalog.known_boards_for_port(&port, version)?;
        info!("{} ({} boards)", port, boards.len());
        for board in boards {
            println!("  {} -- {}", board.board_id, board.board_name);
        }
    }

    Ok(())
}

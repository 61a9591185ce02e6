// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive prompts (§2.1 ambient stack): probe disambiguation, `?`
//! wildcard resolution for `--board`/`--serial`, and the manual-bootloader
//! confirmation gate.

use color_eyre::eyre::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};

use crate::catalog::{Board, Catalog};

/// Ask the user to pick one of several ambiguous debug probes by display string.
pub fn select_probe(candidates: &[String]) -> Result<Option<String>>
{
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("More than one debug probe is attached, which one would you like to use?")
        .items(candidates)
        .interact_opt()?;
    Ok(selection.map(|index| candidates[index].clone()))
}

/// Resolve the `--serial ?` wildcard by letting the user pick among enumerated ports.
pub fn select_port(ports: &[String]) -> Result<Option<String>>
{
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which serial port would you like to use?")
        .items(ports)
        .interact_opt()?;
    Ok(selection.map(|index| ports[index].clone()))
}

/// Resolve the `--board ?` wildcard: first the MicroPython port, then the board
/// within it, mirroring the Board Registry's `known_ports`/`known_boards_for_port`.
pub fn select_board(catalog: &Catalog, version: &str) -> Result<Option<Board>>
{
    let ports = catalog.known_ports(version)?;
    if ports.is_empty() {
        return Ok(None);
    }

    let port_selection =
        Select::with_theme(&ColorfulTheme::default()).with_prompt("Which port?").items(&ports).interact_opt()?;
    let Some(port_index) = port_selection else {
        return Ok(None);
    };

    let boards = catalog.known_boards_for_port(&ports[port_index], version)?;
    if boards.is_empty() {
        return Ok(None);
    }
    let names: Vec<&str> = boards.iter().map(|board| board.board_id.as_str()).collect();

    let board_selection =
        Select::with_theme(&ColorfulTheme::default()).with_prompt("Which board?").items(&names).interact_opt()?;
    Ok(board_selection.map(|index| boards[index].clone()))
}

/// The `--bootloader manual` gate: print an instruction, block until confirmed.
pub fn confirm_manual_bootloader(instruction: &str) -> Result<bool>
{
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{instruction}\nPress Enter once the device is in bootloader mode"))
        .default(true)
        .interact()?)
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debug-probe driver (§4.8.4): two-stage programming via `probe-rs` — target
//! resolution (§4.9, [crate::target_resolution]), then connect/program/verify.

use std::path::Path;

use log::info;
use probe_rs::flashing::{DownloadOptions, FileDownloadError, Format};
use probe_rs::probe::list::Lister;
use probe_rs::Permissions;

use crate::error::{ErrorKind, Result};

/// Erase granularity for `--erase` (§4.8.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode
{
    Chip,
    Sector,
}

/// List display strings for all attached debug probes, for disambiguation prompts.
pub fn list_probes() -> Result<Vec<String>>
{
    let lister = Lister::new();
    let probes = lister.list_all();
    Ok(probes.iter().map(|info| format!("{} (VID:PID {:04x}:{:04x})", info.identifier, info.vendor_id, info.product_id)).collect())
}

/// Resolve `probe_id` (a whole or unique-prefix identifier) against the
/// attached probes, or auto-select when exactly one is attached.
pub fn resolve_probe_id(probe_id: Option<&str>) -> Result<usize>
{
    let lister = Lister::new();
    let probes = lister.list_all();

    match probe_id {
        Some(id) => {
            let matches: Vec<usize> = probes
                .iter()
                .enumerate()
                .filter(|(_, info)| info.identifier.contains(id))
                .map(|(index, _)| index)
                .collect();
            match matches.as_slice() {
                [single] => Ok(*single),
                [] => Err(ErrorKind::AmbiguousProbe(vec![format!("no probe matched {:?}", id)]).error()),
                _ => Err(ErrorKind::AmbiguousProbe(
                    matches.iter().map(|index| probes[*index].identifier.clone()).collect(),
                )
                .error()),
            }
        },
        None => match probes.len() {
            1 => Ok(0),
            0 => Err(ErrorKind::TransportFailed("no debug probes are attached".to_string()).error()),
            _ => Err(ErrorKind::AmbiguousProbe(probes.iter().map(|info| info.identifier.clone()).collect()).error()),
        },
    }
}

/// Connect to the probe at `probe_index`, attach to `target_name`, and
/// program `artifact`, with `erase`/`frequency_hz` options (§4.8.4c).
pub fn program(
    probe_index: usize,
    target_name: &str,
    artifact: &Path,
    erase: Option<EraseMode>,
    frequency_hz: u32,
) -> Result<()>
{
    let lister = Lister::new();
    let probes = lister.list_all();
    let probe_info = probes
        .get(probe_index)
        .ok_or_else(|| ErrorKind::TransportFailed("selected probe index is out of range".to_string()).error())?;

    let mut probe = probe_info.open().map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())?;
    probe.set_speed(frequency_hz / 1000);

    let mut session =
        probe.attach(target_name, Permissions::default()).map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())?;

    let mut options = DownloadOptions::default();
    options.do_chip_erase = matches!(erase, Some(EraseMode::Chip));
    options.verify = true;

    probe_rs::flashing::download_file_with_options(&mut session, artifact, Format::default(), options)
        .map_err(download_error)?;

    info!("programmed {} via {} at {} kHz", artifact.display(), target_name, frequency_hz / 1000);
    drop(session);
    Ok(())
}

fn download_error(error: FileDownloadError) -> crate::error::Error
{
    ErrorKind::TransportFailed(error.to_string()).error()
}

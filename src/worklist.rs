// SPDX-License-Identifier: MIT OR Apache-2.0
//! Worklist Builder (§4.5): pairs enumerated devices with catalog firmware
//! entries, selecting the preferred artifact extension for the requested
//! transport.

use log::warn;

use crate::catalog::{Catalog, Firmware};
use crate::device::Device;
use crate::error::Result;

/// One pairing of a device with an (optional) resolved firmware artifact.
#[derive(Debug, Clone)]
pub struct WorklistItem
{
    pub device: Device,
    pub firmware: Option<Firmware>,
}

/// Transport hints used when picking an extension preference (§4.5 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHint
{
    Probe,
    Dfu,
    Uf2,
    EspTool,
    Serial,
    Auto,
}

impl TransportHint
{
    fn preference(self) -> &'static [&'static str]
    {
        match self {
            TransportHint::Probe => &[".hex", ".bin", ".elf"],
            TransportHint::Dfu => &[".dfu"],
            TransportHint::Uf2 => &[".uf2"],
            TransportHint::EspTool => &[".bin"],
            TransportHint::Serial => &[".dfu", ".hex", ".bin", ".uf2"],
            TransportHint::Auto => &[".dfu", ".hex", ".bin", ".uf2", ".elf"],
        }
    }
}

/// Build the worklist for already-introspected devices against `version`.
pub fn auto_update_worklist(
    catalog: &Catalog,
    devices: Vec<Device>,
    version: &str,
    hint: TransportHint,
) -> Result<Vec<WorklistItem>>
{
    let mut items = Vec::with_capacity(devices.len());

    for mut device in devices {
        if !device.family.eligible_for_worklist() {
            warn!("skipping {} with unsupported family {}", device.serial_port, device.family);
            continue;
        }

        // Introspected devices report a free-form description, not a catalog
        // board id directly (§4.3); resolve it here unless it was already
        // supplied (the manual-worklist path attaches one directly).
        if device.board_id.is_empty() && !device.description.is_empty() {
            device.board_id = catalog.resolve_by_description(&device.description, "", version)?;
        }

        let candidates = catalog.find_firmware(&device.board_id, version, &device.port)?;
        if candidates.is_empty() {
            warn!("no firmware found for {} ({}) at version {}", device.serial_port, device.board_id, version);
            items.push(WorklistItem { device, firmware: None });
            continue;
        }

        let firmware = select_preferred(candidates, hint);
        items.push(WorklistItem { device, firmware: Some(firmware) });
    }

    Ok(items)
}

/// The manual worklist variant (§4.5): an explicit board id is attached to a
/// synthetic device per serial port, bypassing introspection-based resolution.
pub fn manual_worklist(
    catalog: &Catalog,
    ports: &[String],
    board_id: &str,
    port: &str,
    version: &str,
    hint: TransportHint,
) -> Result<Vec<WorklistItem>>
{
    let devices = ports.iter().map(|p| Device::manual(p, port, board_id)).collect();
    auto_update_worklist(catalog, devices, version, hint)
}

/// Select the first candidate whose extension appears earliest in the
/// transport's preference list; fall back to the last candidate if none
/// match, per §4.5.
fn select_preferred(candidates: Vec<Firmware>, hint: TransportHint) -> Firmware
{
    let preference = hint.preference();
    let mut best: Option<(usize, Firmware)> = None;

    for candidate in candidates {
        match preference.iter().position(|ext| *ext == candidate.ext()) {
            Some(rank) => {
                if best.as_ref().map(|(best_rank, _)| rank < *best_rank).unwrap_or(true) {
                    best = Some((rank, candidate));
                }
            },
            None => {
                if best.is_none() {
                    best = Some((usize::MAX, candidate));
                }
            },
        }
    }

    best.expect("select_preferred is only called with a non-empty candidate list").1
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn fw(file: &str) -> Firmware
    {
        Firmware {
            id: 0,
            board_id: "NUCLEO_WB55".to_string(),
            version: "1.22.0".to_string(),
            port: "stm32".to_string(),
            description: String::new(),
            firmware_file: file.to_string(),
            source: String::new(),
            build: 0,
            custom: false,
        }
    }

    #[test]
    fn probe_prefers_hex_over_dfu()
    {
        let candidates = vec![fw("stm32/NUCLEO_WB55-1.22.0.dfu"), fw("stm32/NUCLEO_WB55-1.22.0.hex")];
        let selected = select_preferred(candidates, TransportHint::Probe);
        assert_eq!(selected.ext(), ".hex");
    }

    #[test]
    fn unmatched_extension_falls_back_to_last_candidate()
    {
        let candidates = vec![fw("stm32/NUCLEO_WB55-1.22.0.zip")];
        let selected = select_preferred(candidates, TransportHint::Dfu);
        assert_eq!(selected.ext(), ".zip");
    }

    #[test]
    fn selection_is_deterministic_for_the_same_candidates()
    {
        let candidates = || vec![fw("a.bin"), fw("a.hex"), fw("a.elf")];
        let first = select_preferred(candidates(), TransportHint::Probe).ext().to_string();
        let second = select_preferred(candidates(), TransportHint::Probe).ext().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn auto_update_worklist_skips_non_micropython_devices()
    {
        use crate::catalog::Catalog;
        use crate::device::Family;

        let catalog = Catalog::open_in_memory().unwrap();
        let mut device = Device::new("/dev/ttyACM0");
        device.family = Family::Other("circuitpython".to_string());

        let items = auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Auto).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn empty_devices_yields_empty_worklist()
    {
        let catalog = crate::catalog::Catalog::open_in_memory().unwrap();
        let items = auto_update_worklist(&catalog, Vec::new(), "1.22.0", TransportHint::Auto).unwrap();
        assert!(items.is_empty());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flash Orchestrator (§4.10): single-threaded, strictly sequential driver of
//! the worklist through transport selection, bootloader entry, and
//! programming.

use std::path::Path;

use log::{error, info, warn};

use crate::bootloader::{self, BootloaderMethod};
use crate::config::Config;
use crate::error::Result;
use crate::transport::{self, ProgramOptions, Transport, TransportRequest};
use crate::worklist::WorklistItem;

/// The outcome of attempting to flash one worklist item.
#[derive(Debug)]
pub struct FlashOutcome
{
    pub serial_port: String,
    pub succeeded: bool,
    pub reason: Option<String>,
}

/// Flash every item in `worklist` in order, never aborting the batch on a
/// per-item failure (§4.10, §5 ordering guarantees).
pub fn run(
    config: &Config,
    worklist: Vec<WorklistItem>,
    bootloader_method: BootloaderMethod,
    transport_request: TransportRequest,
    options: ProgramOptions,
) -> Vec<FlashOutcome>
{
    let mut outcomes = Vec::with_capacity(worklist.len());

    for item in worklist {
        let outcome = flash_one(config, &item, bootloader_method, transport_request, &options);
        if outcome.succeeded {
            info!("{}: flashed successfully", outcome.serial_port);
        } else {
            warn!("{}: not flashed ({})", outcome.serial_port, outcome.reason.as_deref().unwrap_or("unknown reason"));
        }
        outcomes.push(outcome);
    }

    outcomes
}

fn flash_one(
    config: &Config,
    item: &WorklistItem,
    bootloader_method: BootloaderMethod,
    transport_request: TransportRequest,
    options: &ProgramOptions,
) -> FlashOutcome
{
    let serial_port = item.device.serial_port.clone();

    let Some(firmware) = &item.firmware else {
        return FlashOutcome { serial_port, succeeded: false, reason: Some("no firmware resolved for this device".to_string()) };
    };

    let artifact = config.resolve_artifact(&firmware.firmware_file);
    if !artifact.exists() {
        return FlashOutcome {
            serial_port,
            succeeded: false,
            reason: Some(format!("artifact {} is not present on disk", artifact.display())),
        };
    }

    let transport = match transport::select(&item.device, &artifact, transport_request) {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}: {}", serial_port, e);
            return FlashOutcome { serial_port, succeeded: false, reason: Some(e.to_string()) };
        },
    };

    if transport != Transport::EspTool {
        if let Err(e) = bootloader::enter(&item.device, bootloader_method, transport) {
            error!("{}: {}", serial_port, e);
            return FlashOutcome { serial_port, succeeded: false, reason: Some(e.to_string()) };
        }
    }

    if let Err(e) = program(transport, &item.device, &artifact, options) {
        error!("{}: {}", serial_port, e);
        return FlashOutcome { serial_port, succeeded: false, reason: Some(e.to_string()) };
    }

    if firmware.custom {
        note_custom_identity(&item.device, firmware);
    }

    FlashOutcome { serial_port, succeeded: true, reason: None }
}

fn program(transport: Transport, device: &crate::device::Device, artifact: &Path, options: &ProgramOptions) -> Result<()>
{
    use crate::transport::{dfu, esptool, probe, psoc6, uf2};

    match transport {
        Transport::Uf2 => {
            let mount = uf2::find_volume(&device.board_id)
                .ok_or_else(|| crate::error::ErrorKind::TransportFailed("no UF2 volume appeared".to_string()).error())?;
            uf2::program(&mount, artifact, options.erase, &device.port, None)
        },
        Transport::Dfu => dfu::program(artifact),
        Transport::EspTool => {
            let chip = if device.port == "esp8266" { "esp8266" } else { "esp32" };
            let flash_mode = parse_flash_mode(options.flash_mode.as_deref());
            esptool::program(chip, &device.serial_port, artifact, flash_mode)
        },
        Transport::Probe => {
            let probe_index = probe::resolve_probe_id(options.probe_id.as_deref())?;
            let identity = crate::target_resolution::McuIdentity::parse(&device.description, &device.cpu, &device.port);
            let targets = crate::target_resolution::list_targets().unwrap_or_default();
            let resolved = crate::target_resolution::resolve_target(&identity, &targets, options.auto_install_packs)?
                .ok_or_else(|| {
                    crate::error::ErrorKind::UnsuitableTransport(crate::target_resolution::unsupported_reason(&identity)).error()
                })?;
            let erase = if options.erase { Some(probe::EraseMode::Chip) } else { None };
            probe::program(probe_index, &resolved.name, artifact, erase, options.frequency_hz)
        },
        Transport::Psoc6 => psoc6::program(artifact),
    }
}

fn parse_flash_mode(raw: Option<&str>) -> crate::transport::esptool::FlashMode
{
    use crate::transport::esptool::FlashMode;
    match raw {
        Some("qio") => FlashMode::Qio,
        Some("qout") => FlashMode::Qout,
        Some("dio") => FlashMode::Dio,
        Some("dout") => FlashMode::Dout,
        _ => FlashMode::Keep,
    }
}

/// Write a small identity note onto the device after a custom firmware flash
/// (§4.10 step 5). Best-effort: failure here does not undo a successful flash.
fn note_custom_identity(device: &crate::device::Device, firmware: &crate::catalog::Firmware)
{
    use std::io::Write as _;
    use std::time::Duration;

    debug_assert!(firmware.custom);

    let write_script = format!(
        "\r\x01\
         with open('mpflash_custom.txt', 'w') as f:\n\
         \tf.write('{board_id} {version}')\n\x04\x02",
        board_id = firmware.board_id,
        version = firmware.version,
    );

    match serialport::new(&device.serial_port, 115200).timeout(Duration::from_secs(2)).open() {
        Ok(mut conn) => {
            if let Err(e) = conn.write_all(write_script.as_bytes()) {
                warn!("{}: could not write custom identity note: {}", device.serial_port, e);
            }
        },
        Err(e) => warn!("{}: could not reopen port to write custom identity note: {}", device.serial_port, e),
    }
}

/// Overall exit status per §6: zero iff at least one device succeeded.
pub fn exit_code(outcomes: &[FlashOutcome]) -> i32
{
    if outcomes.iter().any(|outcome| outcome.succeeded) {
        0
    } else {
        1
    }
}

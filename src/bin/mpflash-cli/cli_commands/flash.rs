// SPDX-License-Identifier: MIT OR Apache-2.0
//! `flash`: the main entry point -- enumerate, introspect, resolve firmware,
//! and program every matching device (§4.10).

use clap::Args;
use color_eyre::eyre::Result;
use log::{info, warn};
use mpflash::bootloader::BootloaderMethod;
use mpflash::catalog::Catalog;
use mpflash::config::Config;
use mpflash::device::Device;
use mpflash::error::ErrorKind;
use mpflash::orchestrator;
use mpflash::transport::{ProgramOptions, TransportRequest};
use mpflash::worklist::{self, TransportHint};
use mpflash::{enumerator, interactive, introspect};

use super::DeviceSelection;

#[derive(Args)]
pub struct FlashArguments
{
    #[command(flatten)]
    pub selection: DeviceSelection,

    /// MicroPython version to flash: a semver, "stable", "preview", or "?" to prompt
    #[arg(long = "version", default_value = "stable")]
    pub version: String,

    /// Explicit board identifier, or "?" to prompt
    #[arg(long = "board")]
    pub board: Option<String>,

    /// Board variant; "-" clears a previously stored variant
    #[arg(long = "variant")]
    pub variant: Option<String>,

    /// Override the detected chip string
    #[arg(long = "cpu")]
    pub cpu: Option<String>,

    /// Erase before writing, where the transport supports it
    #[arg(long = "erase", default_value_t = false)]
    pub erase: bool,

    #[arg(long = "bootloader", value_enum, default_value_t = BootloaderArg::Auto)]
    pub bootloader: BootloaderArg,

    #[arg(long = "method", value_enum, default_value_t = MethodArg::Auto)]
    pub method: MethodArg,

    /// Debug-probe identifier (whole or unique prefix); required if multiple probes and method=pyocd
    #[arg(long = "probe")]
    pub probe: Option<String>,

    #[arg(long = "auto-install-packs", default_value_t = true)]
    pub auto_install_packs: bool,

    /// Flash even if the catalog has no exact match, using the last candidate
    #[arg(long = "force", default_value_t = false)]
    pub force: bool,

    /// Trigger the external builder instead of using the catalog (delegated, out of scope here)
    #[arg(long = "build", default_value_t = false)]
    pub build: bool,

    #[arg(long = "flash_mode", value_enum, default_value_t = FlashModeArg::Keep)]
    pub flash_mode: FlashModeArg,

    /// Mark the resulting catalog entry (if newly downloaded) as custom
    #[arg(long = "custom", default_value_t = false)]
    pub custom: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum BootloaderArg
{
    Auto,
    Mpy,
    Touch,
    Manual,
    None,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum MethodArg
{
    Auto,
    Serial,
    Uf2,
    Dfu,
    Esptool,
    Pyocd,
    Psoc6,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum FlashModeArg
{
    Keep,
    Qio,
    Qout,
    Dio,
    Dout,
}

pub fn run(config: &Config, args: &FlashArguments) -> Result<i32>
{
    if args.build {
        let error = ErrorKind::ExternalToolMissing("mpbuild".to_string())
            .error()
            .with_ctx("--build delegates to the containerized firmware builder, which is not bundled with this tool");
        warn!("{error}");
        return Ok(1);
    }

    let catalog = Catalog::open(&config.catalog_path())?;

    let include = if args.selection.serial.iter().any(|s| s == "?") {
        let all_ports = enumerator::enumerate_ports(&["*".to_string()], &[], args.selection.bluetooth)?;
        match interactive::select_port(&all_ports)? {
            Some(port) => vec![port],
            None => return Ok(2),
        }
    } else if args.selection.serial.is_empty() {
        vec!["*".to_string()]
    } else {
        args.selection.serial.clone()
    };

    let mut ignore = config.ignore.clone();
    ignore.extend(args.selection.ignore.iter().cloned());

    let ports = enumerator::enumerate_ports(&include, &ignore, args.selection.bluetooth)?;
    if ports.is_empty() {
        println!("No matching serial ports found.");
        return Ok(1);
    }

    let board_id = match args.board.as_deref() {
        Some("?") => match interactive::select_board(&catalog, &args.version)? {
            Some(board) => Some(board.board_id),
            None => return Ok(2),
        },
        other => other.map(str::to_string),
    };

    let hint = transport_hint(args.method);

    let worklist = match board_id {
        Some(board_id) => {
            let mut items =
                worklist::manual_worklist(&catalog, &ports, &board_id, &resolve_port_tag(args), &args.version, hint)?;
            apply_variant_override(&mut items, args.variant.as_deref());
            items
        },
        None => {
            let devices: Vec<Device> = ports
                .iter()
                .map(|port| match introspect::introspect(port) {
                    Ok(device) => device,
                    Err(e) => {
                        warn!("{port}: {e}, treating as unknown");
                        Device::new(port.clone())
                    },
                })
                .filter(|device| super::port_allowed(&args.selection.port, &device.port))
                .collect();
            worklist::auto_update_worklist(&catalog, devices, &args.version, hint)?
        },
    };

    let mut worklist = worklist;
    if args.custom {
        for item in worklist.iter_mut() {
            if let Some(firmware) = item.firmware.as_mut() {
                firmware.custom = true;
            }
        }
    }

    let unresolved = worklist.iter().filter(|item| item.firmware.is_none()).count();
    if unresolved > 0 && !args.force {
        warn!("{unresolved} device(s) have no resolved firmware and will be skipped (use --force to flash partial matches)");
    }

    let bootloader_method = match args.bootloader {
        BootloaderArg::Auto => BootloaderMethod::Auto,
        BootloaderArg::Mpy => BootloaderMethod::Mpy,
        BootloaderArg::Touch => BootloaderMethod::Touch,
        BootloaderArg::Manual => BootloaderMethod::Manual,
        BootloaderArg::None => BootloaderMethod::None,
    };

    let transport_request = match args.method {
        MethodArg::Auto => TransportRequest::Auto,
        MethodArg::Serial => TransportRequest::Serial,
        MethodArg::Uf2 => TransportRequest::Uf2,
        MethodArg::Dfu => TransportRequest::Dfu,
        MethodArg::Esptool => TransportRequest::EspTool,
        MethodArg::Pyocd => TransportRequest::Probe,
        MethodArg::Psoc6 => TransportRequest::Psoc6,
    };

    let options = ProgramOptions {
        erase: args.erase,
        frequency_hz: 4_000_000,
        probe_id: args.probe.clone(),
        flash_mode: Some(flash_mode_str(args.flash_mode).to_string()),
        auto_install_packs: args.auto_install_packs,
    };

    let outcomes = orchestrator::run(config, worklist, bootloader_method, transport_request, options);
    for outcome in &outcomes {
        if outcome.succeeded {
            info!("{}: flashed", outcome.serial_port);
        }
    }

    Ok(orchestrator::exit_code(&outcomes))
}

fn transport_hint(method: MethodArg) -> TransportHint
{
    match method {
        MethodArg::Auto => TransportHint::Auto,
        MethodArg::Serial => TransportHint::Serial,
        MethodArg::Uf2 => TransportHint::Uf2,
        MethodArg::Dfu => TransportHint::Dfu,
        MethodArg::Esptool => TransportHint::EspTool,
        MethodArg::Pyocd | MethodArg::Psoc6 => TransportHint::Probe,
    }
}

fn flash_mode_str(mode: FlashModeArg) -> &'static str
{
    match mode {
        FlashModeArg::Keep => "keep",
        FlashModeArg::Qio => "qio",
        FlashModeArg::Qout => "qout",
        FlashModeArg::Dio => "dio",
        FlashModeArg::Dout => "dout",
    }
}

/// Apply `--variant`: `-` clears a previously resolved variant, anything else sets it.
fn apply_variant_override(items: &mut [mpflash::worklist::WorklistItem], variant: Option<&str>)
{
    let Some(variant) = variant else {
        return;
    };
    for item in items.iter_mut() {
        item.device.variant = if variant == "-" { None } else { Some(variant.to_string()) };
    }
}

/// The manual worklist path needs an architecture-family "port" tag even
/// though the user only supplied a board identifier; derive it from `--cpu`
/// when present, else leave it for the catalog's rewrite-table retry to fill in.
fn resolve_port_tag(args: &FlashArguments) -> String
{
    args.cpu.clone().unwrap_or_default()
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transport Drivers (§4.8) and the Transport Selector (§4.6).

pub mod dfu;
pub mod esptool;
pub mod probe;
pub mod psoc6;
pub mod uf2;

use std::path::Path;

use log::debug;

use crate::device::Device;
use crate::error::{ErrorKind, Result};

const UF2_CAPABLE_PORTS: &[&str] = &["rp2", "samd"];

/// A concrete transport, picked by the user or by [select].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport
{
    Uf2,
    Dfu,
    EspTool,
    Probe,
    Psoc6,
}

/// The `--method` CLI value: either a pinned transport or automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRequest
{
    Auto,
    Serial,
    Uf2,
    Dfu,
    EspTool,
    Probe,
    Psoc6,
}

/// Options common to every transport's [Transport::program] call.
#[derive(Debug, Clone)]
pub struct ProgramOptions
{
    pub erase: bool,
    pub frequency_hz: u32,
    pub probe_id: Option<String>,
    pub flash_mode: Option<String>,
    pub auto_install_packs: bool,
}

impl Default for ProgramOptions
{
    fn default() -> Self
    {
        Self { erase: false, frequency_hz: 4_000_000, probe_id: None, flash_mode: None, auto_install_packs: true }
    }
}

/// Choose a transport for `device` and `artifact`, honoring an explicit
/// request or falling back to the §4.6 automatic dispatch rules.
pub fn select(device: &Device, artifact: &Path, requested: TransportRequest) -> Result<Transport>
{
    let extension = artifact.extension().and_then(|ext| ext.to_str()).unwrap_or("");

    match requested {
        TransportRequest::Uf2 => validate(device, Transport::Uf2, extension),
        TransportRequest::Dfu => validate(device, Transport::Dfu, extension),
        TransportRequest::EspTool => validate(device, Transport::EspTool, extension),
        TransportRequest::Probe => validate(device, Transport::Probe, extension),
        TransportRequest::Psoc6 => validate(device, Transport::Psoc6, extension),
        TransportRequest::Serial => auto_select(device, extension),
        TransportRequest::Auto => auto_select(device, extension),
    }
}

fn auto_select(device: &Device, extension: &str) -> Result<Transport>
{
    if UF2_CAPABLE_PORTS.contains(&device.port.as_str()) && extension == "uf2" {
        return Ok(Transport::Uf2);
    }
    if device.port == "stm32" {
        return Ok(Transport::Dfu);
    }
    if device.port == "esp32" || device.port == "esp8266" {
        return Ok(Transport::EspTool);
    }

    Err(ErrorKind::UnsuitableTransport(format!(
        "no automatic transport for port {:?} with artifact extension {:?}",
        device.port, extension
    ))
    .error())
}

fn validate(device: &Device, transport: Transport, extension: &str) -> Result<Transport>
{
    let suitable = match transport {
        Transport::Uf2 => extension == "uf2" && UF2_CAPABLE_PORTS.contains(&device.port.as_str()),
        Transport::Dfu => extension == "dfu" || extension == "bin",
        Transport::EspTool => (device.port == "esp32" || device.port == "esp8266") && extension == "bin",
        Transport::Probe => extension == "hex" || extension == "bin" || extension == "elf",
        Transport::Psoc6 => extension == "hex" || extension == "elf",
    };

    if !suitable {
        debug!("requested transport {:?} rejected for port {} / .{}", transport, device.port, extension);
        return Err(ErrorKind::UnsuitableTransport(format!(
            "{:?} cannot program a .{} artifact on port {:?}",
            transport, extension, device.port
        ))
        .error());
    }
    Ok(transport)
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bootloader Driver (§4.7): drives a device from its running application into
//! the mode its transport driver needs to program it.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serialport::DataBits;

use crate::device::Device;
use crate::error::{ErrorKind, Result};
use crate::interactive;
use crate::transport::Transport;

const ENTRY_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to get the device into the state its transport driver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootloaderMethod
{
    /// Pick a method based on the device's port (§4.7 default dispatch).
    Auto,
    /// Send MicroPython's `machine.bootloader()` over the serial REPL.
    Mpy,
    /// 1200-baud touch reset, for boards whose bootloader responds to it.
    Touch,
    /// Print an instruction and block on a confirmation prompt.
    Manual,
    /// The device is already in the required state; do nothing.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootloaderState
{
    Running,
    Entering,
    InBootloader,
    Failed,
}

/// Drive `device` into its bootloader using `method`, returning once detected
/// or failing with [ErrorKind::BootloaderFailed]. `transport` picks the
/// detection signal (§4.7): UF2 and DFU have their own observable markers of a
/// successful entry, distinct from "the old serial port went away".
pub fn enter(device: &Device, method: BootloaderMethod, transport: Transport) -> Result<()>
{
    let method = resolve_auto(device, method);
    let mut state = BootloaderState::Running;

    state = match method {
        BootloaderMethod::None => BootloaderState::InBootloader,
        BootloaderMethod::Mpy => enter_via_mpy(device, transport)?,
        BootloaderMethod::Touch => enter_via_touch(device, transport)?,
        BootloaderMethod::Manual => enter_via_manual(device)?,
        BootloaderMethod::Auto => unreachable!("resolve_auto never returns Auto"),
    };

    if state != BootloaderState::InBootloader {
        return Err(ErrorKind::BootloaderFailed.error());
    }

    info!("{} entered bootloader mode", device.serial_port);
    Ok(())
}

/// Dispatch `Auto` to a concrete method based on the device's port (§4.7).
fn resolve_auto(device: &Device, method: BootloaderMethod) -> BootloaderMethod
{
    if method != BootloaderMethod::Auto {
        return method;
    }

    match device.port.as_str() {
        "rp2" | "samd" => BootloaderMethod::Touch,
        "stm32" | "esp32" | "esp8266" => BootloaderMethod::Mpy,
        _ => BootloaderMethod::Manual,
    }
}

fn enter_via_mpy(device: &Device, transport: Transport) -> Result<BootloaderState>
{
    debug!("{}: entering bootloader via machine.bootloader()", device.serial_port);
    let mut conn = serialport::new(&device.serial_port, 115200).timeout(Duration::from_secs(2)).open()?;
    conn.write_all(b"\r\x03\x03import machine\r\nmachine.bootloader()\r\n").ok();
    drop(conn);

    Ok(poll_for_entry(device, transport))
}

/// 1200-baud touch: open and promptly close the port at 1200 baud, which many
/// RP2/SAMD bootloaders treat as a reset-to-bootloader signal.
fn enter_via_touch(device: &Device, transport: Transport) -> Result<BootloaderState>
{
    debug!("{}: entering bootloader via 1200-baud touch", device.serial_port);
    {
        let mut conn =
            serialport::new(&device.serial_port, 1200).data_bits(DataBits::Eight).timeout(Duration::from_millis(200)).open()?;
        conn.set_dtr(false).ok();
    }

    Ok(poll_for_entry(device, transport))
}

fn enter_via_manual(device: &Device) -> Result<BootloaderState>
{
    let instruction = match device.port.as_str() {
        "stm32" => "Hold BOOT0, press and release RESET, then release BOOT0.",
        "rp2" => "Hold BOOTSEL, plug in (or press RESET), then release BOOTSEL.",
        _ => "Put the device into its bootloader mode using its hardware button combination.",
    };

    match interactive::confirm_manual_bootloader(instruction) {
        Ok(true) => Ok(BootloaderState::InBootloader),
        _ => Ok(BootloaderState::Failed),
    }
}

/// Poll for the transport-specific signal that bootloader entry succeeded
/// (§4.7): a UF2 mass-storage volume reporting this device's `board_id`, a DFU
/// device re-enumerating on the USB bus, or -- for any other transport -- the
/// application's old serial port disappearing.
fn poll_for_entry(device: &Device, transport: Transport) -> BootloaderState
{
    match transport {
        Transport::Uf2 => poll_for_uf2_volume(&device.board_id),
        Transport::Dfu => poll_for_dfu_reenumeration(),
        _ => poll_for_disappearance(&device.serial_port),
    }
}

/// Poll for the UF2 mass-storage volume to appear and report this device's
/// `board_id` (or `Unknown`, which `transport::uf2::find_volume` also accepts).
fn poll_for_uf2_volume(board_id: &str) -> BootloaderState
{
    let deadline = Instant::now() + ENTRY_TIMEOUT;
    while Instant::now() < deadline {
        if crate::transport::uf2::find_volume(board_id).is_some() {
            return BootloaderState::InBootloader;
        }
        thread::sleep(POLL_INTERVAL);
    }
    BootloaderState::Failed
}

/// Poll for a DFU-mode USB device to re-enumerate, which is the observable
/// signal a DFU-bound bootloader entry worked (no mass-storage volume, no
/// reliably-named serial port).
fn poll_for_dfu_reenumeration() -> BootloaderState
{
    let deadline = Instant::now() + ENTRY_TIMEOUT;
    while Instant::now() < deadline {
        if crate::transport::dfu::enumerate().map(|devices| !devices.is_empty()).unwrap_or(false) {
            return BootloaderState::InBootloader;
        }
        thread::sleep(POLL_INTERVAL);
    }
    BootloaderState::Failed
}

/// Poll for the serial port disappearing (application reboot into a different
/// USB identity), the fallback signal for transports with no richer marker.
fn poll_for_disappearance(port: &str) -> BootloaderState
{
    let deadline = Instant::now() + ENTRY_TIMEOUT;
    while Instant::now() < deadline {
        let still_present = serialport::available_ports()
            .map(|ports| ports.iter().any(|info| info.port_name == port))
            .unwrap_or(false);
        if !still_present {
            return BootloaderState::InBootloader;
        }
        thread::sleep(POLL_INTERVAL);
    }
    BootloaderState::Failed
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn device_with_port(port: &str) -> Device
    {
        let mut device = Device::new("/dev/ttyACM0");
        device.port = port.to_string();
        device
    }

    #[test]
    fn auto_dispatches_rp2_to_touch()
    {
        assert_eq!(resolve_auto(&device_with_port("rp2"), BootloaderMethod::Auto), BootloaderMethod::Touch);
    }

    #[test]
    fn auto_dispatches_stm32_to_mpy()
    {
        assert_eq!(resolve_auto(&device_with_port("stm32"), BootloaderMethod::Auto), BootloaderMethod::Mpy);
    }

    #[test]
    fn auto_dispatches_unknown_port_to_manual()
    {
        assert_eq!(resolve_auto(&device_with_port("weird"), BootloaderMethod::Auto), BootloaderMethod::Manual);
    }

    #[test]
    fn explicit_method_is_not_overridden()
    {
        assert_eq!(resolve_auto(&device_with_port("rp2"), BootloaderMethod::Manual), BootloaderMethod::Manual);
    }
}

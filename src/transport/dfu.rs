// SPDX-License-Identifier: MIT OR Apache-2.0
//! DFU driver (§4.8.2): programs a device already in DFU mode via `dfu-core`/
//! `dfu-nusb`, reusing the descriptor parsing from [crate::usb] directly.

use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use crate::error::{ErrorKind, Result};
use crate::usb::{InterfaceClass, InterfaceSubClass};

const RESTART_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A DFU-mode USB device candidate, reported by [enumerate].
#[derive(Debug, Clone)]
pub struct DfuDevice
{
    pub bus_number: u8,
    pub address: u8,
    pub vid: u16,
    pub pid: u16,
}

/// Enumerate attached devices presenting a DFU-class application-specific
/// interface in DFU operating mode.
pub fn enumerate() -> Result<Vec<DfuDevice>>
{
    let mut found = Vec::new();
    for device in nusb::list_devices().map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())? {
        let has_dfu_interface = device.interfaces().any(|interface| {
            interface.class() == InterfaceClass::APPLICATION_SPECIFIC.0 && interface.subclass() == InterfaceSubClass::DFU.0
        });
        if has_dfu_interface {
            found.push(DfuDevice {
                bus_number: device.bus_id().parse().unwrap_or(0),
                address: device.device_address(),
                vid: device.vendor_id(),
                pid: device.product_id(),
            });
        }
    }
    Ok(found)
}

/// Program `artifact` onto the first enumerated DFU device, then wait for it
/// to restart out of DFU mode.
pub fn program(artifact: &Path) -> Result<()>
{
    let candidates = enumerate()?;
    let target =
        candidates.first().ok_or_else(|| ErrorKind::TransportFailed("no device in DFU mode was found".to_string()).error())?;

    let firmware = fs::read(artifact)?;
    let handle = nusb::list_devices()
        .map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())?
        .find(|d| d.vendor_id() == target.vid && d.product_id() == target.pid)
        .ok_or_else(|| ErrorKind::TransportFailed("DFU device disappeared before programming".to_string()).error())?
        .open()
        .map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())?;

    let mut dfu_dev = dfu_nusb::DfuNusb::open(handle, 0, 0)?;

    let progress_bar = ProgressBar::new(firmware.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template(" {percent:>3}% |{bar:50}| {bytes}/{total_bytes} [{binary_bytes_per_sec} {elapsed}]")
            .unwrap(),
    );
    let progress_bar = Rc::new(progress_bar);
    let enclosed = Rc::clone(&progress_bar);

    dfu_dev.with_progress(move |delta| enclosed.inc(delta as u64));
    let length = firmware.len() as u32;
    dfu_dev.download(std::io::Cursor::new(firmware), length)?;
    progress_bar.finish();

    info!("wrote {} via DFU to VID:PID {:04x}:{:04x}", artifact.display(), target.vid, target.pid);

    if wait_for_restart(target.vid, target.pid) {
        Ok(())
    } else {
        Err(ErrorKind::TransportFailed("device did not restart after DFU programming".to_string()).error())
    }
}

fn wait_for_restart(vid: u16, pid: u16) -> bool
{
    let deadline = Instant::now() + RESTART_TIMEOUT;
    while Instant::now() < deadline {
        let still_in_dfu = nusb::list_devices()
            .map(|mut devices| devices.any(|d| d.vendor_id() == vid && d.product_id() == pid))
            .unwrap_or(false);
        if !still_in_dfu {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    false
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn dfu_device_carries_bus_and_address()
    {
        let device = DfuDevice { bus_number: 1, address: 5, vid: 0x0483, pid: 0xdf11 };
        assert_eq!(device.vid, 0x0483);
        assert_eq!(device.pid, 0xdf11);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! UF2 driver (§4.8.1): copies a firmware file onto a mass-storage volume
//! identified by an `INFO_UF2.TXT` marker file.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use sysinfo::Disks;

use crate::error::{ErrorKind, Result};

const INFO_FILE: &str = "INFO_UF2.TXT";
const DISAPPEARANCE_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The erase ports known to accept a universal-flash-nuke image first.
const ERASE_CAPABLE_PORTS: &[&str] = &["rp2"];

/// Find the mount point of the UF2 volume reporting `board_id`, if one is
/// currently attached. Returns `Unknown` identifiers too (§6 UF2 volume contract).
pub fn find_volume(board_id: &str) -> Option<PathBuf>
{
    let disks = Disks::new_with_refreshed_list();
    disks.iter().find_map(|disk| {
        let mount = disk.mount_point();
        let reported = read_board_id(mount)?;
        if reported == board_id || reported == "Unknown" {
            Some(mount.to_path_buf())
        } else {
            None
        }
    })
}

fn read_board_id(mount: &Path) -> Option<String>
{
    let contents = fs::read_to_string(mount.join(INFO_FILE)).ok()?;
    contents.lines().find_map(|line| line.strip_prefix("Board-ID: ").map(str::trim).map(str::to_string))
}

/// Program `artifact` onto the volume at `mount`, optionally erasing first,
/// then wait for the volume to disappear as the board reboots.
pub fn program(mount: &Path, artifact: &Path, erase: bool, port: &str, erase_image: Option<&Path>) -> Result<()>
{
    if erase {
        if !ERASE_CAPABLE_PORTS.contains(&port) {
            return Err(ErrorKind::UnsuitableTransport(format!("port {} does not support UF2 erase", port)).error());
        }
        let image = erase_image
            .ok_or_else(|| ErrorKind::TransportFailed("erase requested but no erase image is available".to_string()).error())?;
        copy_and_sync(image, mount)?;
        info!("wrote erase image to {}", mount.display());
    }

    copy_and_sync(artifact, mount)?;
    info!("wrote {} to {}", artifact.display(), mount.display());

    if wait_for_disappearance(mount) {
        Ok(())
    } else {
        Err(ErrorKind::TransportFailed(format!("UF2 volume at {} did not disappear after programming", mount.display())).error())
    }
}

fn copy_and_sync(source: &Path, mount: &Path) -> Result<()>
{
    let file_name = source.file_name().ok_or_else(|| ErrorKind::TransportFailed("artifact has no file name".to_string()).error())?;
    let destination = mount.join(file_name);
    fs::copy(source, &destination)?;

    // POSIX hosts need an explicit unmount; the write above is otherwise
    // buffered and the reboot can race the flush.
    #[cfg(unix)]
    unmount(mount);

    Ok(())
}

#[cfg(unix)]
fn unmount(mount: &Path)
{
    use std::process::Command;
    let status = Command::new("umount").arg(mount).status();
    match status {
        Ok(s) if s.success() => debug!("unmounted {}", mount.display()),
        _ => warn!("failed to explicitly unmount {}, relying on the OS to flush on disappearance", mount.display()),
    }
}

fn wait_for_disappearance(mount: &Path) -> bool
{
    let deadline = Instant::now() + DISAPPEARANCE_TIMEOUT;
    while Instant::now() < deadline {
        let disks = Disks::new_with_refreshed_list();
        if !disks.iter().any(|disk| disk.mount_point() == mount) {
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
    fn read_board_id_parses_info_file()
    {
        let dir = std::env::temp_dir().join(format!("mpflash-uf2-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(INFO_FILE), "UF2 Bootloader v3.0\r\nModel: Pico\r\nBoard-ID: RPI_PICO\r\n").unwrap();

        assert_eq!(read_board_id(&dir), Some("RPI_PICO".to_string()));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_info_file_yields_none()
    {
        let dir = std::env::temp_dir().join(format!("mpflash-uf2-test-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert_eq!(read_board_id(&dir), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn erase_on_unsupported_port_is_rejected()
    {
        let dir = std::env::temp_dir();
        let result = program(&dir, Path::new("firmware.uf2"), true, "samd", None);
        assert!(result.is_err());
    }
}

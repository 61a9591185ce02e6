// SPDX-License-Identifier: MIT OR Apache-2.0
//! psoc6 / OpenOCD driver (§4.8.5, supplemented optional extension): shells
//! out to `openocd` with a generated PSoC6 interface/target configuration.
//! Only reachable via explicit `--method psoc6`, never from `auto`.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::{ErrorKind, Result};

const INTERFACE: &str = "interface/kitprog3.cfg";
const TARGET: &str = "target/psoc6.cfg";

/// Program `artifact` onto a PSoC6 target via `openocd`.
pub fn program(artifact: &Path) -> Result<()>
{
    let config = generate_config(artifact);
    let config_path = std::env::temp_dir().join(format!("mpflash-psoc6-{}.cfg", std::process::id()));
    fs::write(&config_path, &config)?;

    debug!("generated openocd config:\n{}", config);

    let status = Command::new("openocd")
        .arg("-f")
        .arg(&config_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .status()
        .map_err(|_| ErrorKind::ExternalToolMissing("openocd".to_string()).error());

    fs::remove_file(&config_path).ok();
    let status = status?;

    if !status.success() {
        return Err(ErrorKind::TransportFailed(format!("openocd exited with {}", status)).error());
    }

    info!("programmed {} via openocd (psoc6)", artifact.display());
    Ok(())
}

fn generate_config(artifact: &Path) -> String
{
    format!(
        "source [find {interface}]\n\
         source [find {target}]\n\
         init\n\
         reset init\n\
         program {{{firmware}}} verify reset exit\n",
        interface = INTERFACE,
        target = TARGET,
        firmware = artifact.display(),
    )
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn config_names_interface_and_target()
    {
        let config = generate_config(Path::new("/tmp/app.hex"));
        assert!(config.contains("kitprog3.cfg"));
        assert!(config.contains("psoc6.cfg"));
        assert!(config.contains("/tmp/app.hex"));
    }
}

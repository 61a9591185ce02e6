// SPDX-License-Identifier: MIT OR Apache-2.0
//! ESP-tool driver (§4.8.3): delegates to the external `esptool` binary,
//! streaming its output through the same line-classification loop as
//! introspection.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::error::{ErrorKind, Result};

/// `esptool.py --flash_mode` values (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode
{
    Keep,
    Qio,
    Qout,
    Dio,
    Dout,
}

impl FlashMode
{
    fn as_arg(self) -> &'static str
    {
        match self {
            FlashMode::Keep => "keep",
            FlashMode::Qio => "qio",
            FlashMode::Qout => "qout",
            FlashMode::Dio => "dio",
            FlashMode::Dout => "dout",
        }
    }
}

/// Program `artifact` onto `port` for `chip`, via the external ESP-tool.
pub fn program(chip: &str, port: &str, artifact: &Path, flash_mode: FlashMode) -> Result<()>
{
    let artifact_str = artifact.to_string_lossy().into_owned();
    let args = [
        "--chip",
        chip,
        "--port",
        port,
        "write_flash",
        "--flash_mode",
        flash_mode.as_arg(),
        "0x0",
        artifact_str.as_str(),
    ];

    debug!("invoking esptool {}", args.join(" "));

    let mut child = Command::new("esptool")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|_| ErrorKind::ExternalToolMissing("esptool".to_string()).error())?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(std::io::Result::ok) {
            classify_and_log(&line);
        }
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(ErrorKind::TransportFailed(format!("esptool exited with {}", status)).error());
    }

    info!("esptool wrote {} to {}", artifact.display(), port);
    Ok(())
}

fn classify_and_log(line: &str)
{
    if line.contains("Traceback") || line.contains("Error:") || line.contains("FatalError") {
        warn!("{}", line);
    } else {
        debug!("{}", line);
    }
}

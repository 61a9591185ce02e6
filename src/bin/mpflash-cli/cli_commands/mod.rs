// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand argument types and dispatch (§6 command surface).

pub mod download;
pub mod flash;
pub mod list;
pub mod probes;

use clap::{Args, Subcommand};
use clap_complete::Shell;

#[derive(Subcommand)]
pub enum Commands
{
    /// List known boards, or devices currently attached
    List(list::ListArguments),
    /// Download firmware into the local catalog without flashing anything
    Download(download::DownloadArguments),
    /// Flash attached devices with resolved or explicitly chosen firmware
    Flash(flash::FlashArguments),
    /// List attached debug probes
    ListProbes,
    /// Print information about the embedded debug-probe library
    PyocdInfo,
    /// List debug-probe target names known to the embedded probe library
    PyocdTargets,
    /// Generate shell completion data
    Completions(CompletionArguments),
}

#[derive(Args)]
pub struct CompletionArguments
{
    pub shell: Shell,
}

/// Arguments shared by every subcommand that touches the device fleet.
#[derive(Args, Clone)]
pub struct DeviceSelection
{
    /// Serial port glob(s); "*" means all, "?" prompts interactively
    #[arg(long = "serial", default_values_t = Vec::<String>::new())]
    pub serial: Vec<String>,

    /// Serial port glob(s) to exclude
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Include Bluetooth serial ports in enumeration
    #[arg(long = "bluetooth", default_value_t = false)]
    pub bluetooth: bool,

    /// Restrict to these MicroPython ports (stm32, rp2, esp32, ...)
    #[arg(long = "port")]
    pub port: Vec<String>,
}

/// Whether `device_port` (a MicroPython architecture port, e.g. `stm32`) passes
/// an empty-means-all `--port` restriction.
pub fn port_allowed(restrict_to: &[String], device_port: &str) -> bool
{
    restrict_to.is_empty() || restrict_to.iter().any(|p| p == device_port)
}

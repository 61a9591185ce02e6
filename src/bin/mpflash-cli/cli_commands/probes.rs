// SPDX-License-Identifier: MIT OR Apache-2.0
//! `list-probes`, `pyocd-info`, `pyocd-targets`: introspection into the
//! embedded debug-probe library, independent of any attached MicroPython device.

use color_eyre::eyre::Result;
use mpflash::target_resolution;
use mpflash::transport::probe;

pub fn list_probes() -> Result<()>
{
    let probes = probe::list_probes()?;
    if probes.is_empty() {
        println!("No debug probes attached.");
        return Ok(());
    }
    for (index, description) in probes.iter().enumerate() {
        println!("[{index}] {description}");
    }
    Ok(())
}

pub fn pyocd_info() -> Result<()>
{
    println!("embedded debug-probe library: probe-rs");
    println!("target catalog size: {}", target_resolution::list_targets().map(|t| t.len()).unwrap_or(0));
    Ok(())
}

pub fn pyocd_targets() -> Result<()>
{
    let targets = target_resolution::list_targets()?;
    for target in targets {
        println!("{:<24} {}", target.name, target.part_number);
    }
    Ok(())
}

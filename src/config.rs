// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide configuration, constructed once in `main` and passed by reference.
//!
//! No hidden globals: the catalog path and firmware root are plain fields on
//! [Config], following the "process-wide state is an explicit value" design note.

use std::env;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::error;

/// Environment variable that overrides the default ignore-list for device enumeration.
pub const ENV_IGNORE: &str = "MPFLASH_IGNORE";

/// Environment variable that overrides the per-user configuration directory.
pub const ENV_CONFIG_DIR: &str = "MPFLASH_CONFIG";

#[derive(Debug, Clone)]
pub struct Config
{
    /// Directory holding the catalog database, cached release metadata, and defaults.
    pub config_dir: PathBuf,
    /// Directory containing firmware artifacts; `firmware_file` paths in the catalog
    /// are relative to this root unless absolute.
    pub firmware_root: PathBuf,
    pub ignore: Vec<String>,
}

impl Config
{
    /// Resolve the process-wide configuration, honoring `MPFLASH_CONFIG` and
    /// `MPFLASH_IGNORE` overrides.
    pub fn resolve(config_dir_override: Option<PathBuf>) -> Self
    {
        let config_dir = config_dir_override
            .or_else(|| env::var_os(ENV_CONFIG_DIR).map(PathBuf::from))
            .unwrap_or_else(|| project_dirs().data_dir().to_path_buf());

        let firmware_root = config_dir.join("firmware");

        let ignore = env::var(ENV_IGNORE)
            .ok()
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self { config_dir, firmware_root, ignore }
    }

    pub fn catalog_path(&self) -> PathBuf
    {
        self.config_dir.join("mpflash.db")
    }

    /// Resolve a `firmwares.firmware_file` path against the configured root.
    pub fn resolve_artifact(&self, firmware_file: &str) -> PathBuf
    {
        let path = Path::new(firmware_file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.firmware_root.join(path)
        }
    }
}

fn project_dirs() -> ProjectDirs
{
    match ProjectDirs::from("org", "micropython", "mpflash") {
        Some(paths) => paths,
        None => {
            error!("failed to determine a configuration directory for this platform");
            std::process::exit(2);
        },
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn explicit_override_wins_over_platform_default()
    {
        let config = Config::resolve(Some(PathBuf::from("/tmp/mpflash-test")));
        assert_eq!(config.config_dir, PathBuf::from("/tmp/mpflash-test"));
        assert_eq!(config.catalog_path(), PathBuf::from("/tmp/mpflash-test/mpflash.db"));
    }

    #[test]
    fn artifact_resolution_is_relative_to_firmware_root()
    {
        let config = Config::resolve(Some(PathBuf::from("/tmp/mpflash-test")));
        assert_eq!(
            config.resolve_artifact("stm32/NUCLEO_WB55-1.22.0.dfu"),
            PathBuf::from("/tmp/mpflash-test/firmware/stm32/NUCLEO_WB55-1.22.0.dfu")
        );
        assert_eq!(config.resolve_artifact("/opt/custom.bin"), PathBuf::from("/opt/custom.bin"));
    }
}
